//! Mapped device memory regions.

use core::fmt;
use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::libc::{c_void, off_t};
use nix::sys::mman::{self, MapFlags, ProtFlags};

/// One established shared read-write mapping of a device memory region.
///
/// Owning a value of this type is the proof that the region is currently
/// mapped; dropping it releases the mapping. Values are created while
/// opening a device and live in its per-region slots until the device is
/// closed or dropped.
///
/// Access goes through volatile loads and stores; the bytes carry no
/// meaning at this layer.
pub struct MemMapping {
    ptr: *mut u8,
    len: usize,
}

impl MemMapping {
    /// Map `len` bytes of the open device `fd`, starting at byte `offset`.
    pub(crate) fn new(fd: RawFd, len: usize, offset: off_t) -> Result<Self, Errno> {
        let ptr = unsafe {
            mman::mmap(
                core::ptr::null_mut(),
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                offset,
            )
        }?;
        trace!(
            "mmap region: fd={}, offset={:#x}, len={:#x} -> {:p}",
            fd,
            offset,
            len,
            ptr
        );
        Ok(MemMapping {
            ptr: ptr as *mut u8,
            len,
        })
    }

    /// Base address of the region in this process.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Length of the region in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Volatile 32-bit load at byte `offset` into the region.
    ///
    /// Returns `None` when `offset` is not 4-byte aligned or the word would
    /// cross the end of the region.
    pub fn read32(&self, offset: usize) -> Option<u32> {
        if offset % 4 != 0 || self.len < 4 || offset > self.len - 4 {
            return None;
        }
        Some(unsafe { (self.ptr.add(offset) as *const u32).read_volatile() })
    }

    /// Volatile 32-bit store at byte `offset` into the region.
    ///
    /// Returns `false` (storing nothing) when `offset` is not 4-byte
    /// aligned or the word would cross the end of the region.
    pub fn write32(&self, offset: usize, value: u32) -> bool {
        if offset % 4 != 0 || self.len < 4 || offset > self.len - 4 {
            return false;
        }
        unsafe { (self.ptr.add(offset) as *mut u32).write_volatile(value) };
        true
    }
}

impl Drop for MemMapping {
    fn drop(&mut self) {
        if let Err(err) = unsafe { mman::munmap(self.ptr as *mut c_void, self.len) } {
            warn!("munmap {:p}, len={:#x} failed: {}", self.ptr, self.len, err);
        }
    }
}

impl fmt::Debug for MemMapping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemMapping")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
