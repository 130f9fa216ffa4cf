//! The interrupt event channel of an open UIO device.
//!
//! The open device handle doubles as a 4-byte event counter: writing 1 or 0
//! toggles interrupt delivery, reading blocks until the counter advances.
//! Only the occurrence is delivered here; callers wanting the numeric count
//! read the raw handle themselves via `UioDevice::raw_fd`.

use std::convert::TryFrom;
use std::os::unix::io::RawFd;
use std::time::Duration;

use nix::sys::select::{select, FdSet};
use nix::sys::time::{TimeVal, TimeValLike};
use nix::unistd;

use crate::device::UioDevice;
use crate::{UioError, UioResult};

/// Width of one event counter word.
const EVENT_BYTES: usize = 4;

impl UioDevice {
    /// Enable interrupt delivery on the event channel.
    ///
    /// Requires an open descriptor; fails with `InvalidParam` (touching no
    /// I/O) otherwise.
    pub fn enable_irq(&self) -> UioResult<()> {
        self.write_event_word(1)
    }

    /// Disable interrupt delivery on the event channel.
    ///
    /// Requires an open descriptor; fails with `InvalidParam` (touching no
    /// I/O) otherwise.
    pub fn disable_irq(&self) -> UioResult<()> {
        self.write_event_word(0)
    }

    /// Block until the next interrupt event, or until `timeout` elapses.
    ///
    /// Without a timeout this reads the event counter directly and blocks
    /// indefinitely. With one, a readiness wait bounds the block first: an
    /// elapsed deadline reports the distinct [`UioError::TimedOut`] so
    /// callers can loop on it, while readiness proceeds to the counter
    /// read. The count consumed from the channel is discarded; a counter
    /// read of anything but exactly 4 bytes is a
    /// [`UioError::ShortTransfer`].
    pub fn wait_irq(&self, timeout: Option<Duration>) -> UioResult<()> {
        let fd = self.event_fd()?;
        if let Some(timeout) = timeout {
            let mut readfds = FdSet::new();
            readfds.insert(fd);
            let mut deadline = timeval_from(timeout);
            let ready = select(None, &mut readfds, None, None, &mut deadline)?;
            if ready == 0 {
                trace!("irq wait fd={}: no event within {:?}", fd, timeout);
                return Err(UioError::TimedOut);
            }
        }

        let mut count = [0u8; EVENT_BYTES];
        let read = unistd::read(fd, &mut count)?;
        trace!("irq wait fd={}: read {} bytes", fd, read);
        if read != EVENT_BYTES {
            // The counter word is all-or-nothing.
            return Err(UioError::ShortTransfer(read));
        }
        Ok(())
    }

    /// Handle for channel I/O; the channel only exists while open.
    fn event_fd(&self) -> UioResult<RawFd> {
        self.raw_fd().ok_or(UioError::InvalidParam)
    }

    fn write_event_word(&self, word: u32) -> UioResult<()> {
        let fd = self.event_fd()?;
        let written = unistd::write(fd, &word.to_ne_bytes())?;
        trace!("irq control fd={}: word={}, wrote {} bytes", fd, word, written);
        if written != EVENT_BYTES {
            return Err(UioError::ShortTransfer(written));
        }
        Ok(())
    }
}

fn timeval_from(timeout: Duration) -> TimeVal {
    let micros = i64::try_from(timeout.as_micros()).unwrap_or(i64::MAX);
    TimeVal::microseconds(micros)
}
