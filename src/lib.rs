//! Userspace access to Linux UIO devices.
//!
//! A UIO driver exports a device to userspace as a `/dev/uioN` node plus a
//! sysfs directory describing its memory regions. This crate enumerates the
//! class entries, maps the regions into the process, and delivers the
//! interrupt events the node signals. Knowledge of any particular sysfs
//! layout stays behind the [`DeviceFactory`] seam; everything else consumes
//! the descriptors a factory builds.
//!
//! # Feature flags
//!
//! - `mock`: Exports the scripted device factory for downstream test code.

#![deny(warnings)]

#[macro_use]
extern crate log;

mod device;
mod discover;
mod error;
mod irq;
mod mapping;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use self::device::{UioDevice, UioMap};
pub use self::discover::{find_devices, DeviceFactory, Discovery, Enumerator, SYSFS_ROOT};
pub use self::error::*;
pub use self::mapping::MemMapping;

/// Physical address of a device memory region, as sysfs reports it.
pub type PhysAddr = usize;

/// Fallback mapping granularity for hosts that will not report a page size.
pub(crate) const PAGE_SIZE: usize = 0x1000;
