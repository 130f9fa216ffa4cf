//! Discovery of UIO devices from sysfs.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{UioDevice, UioError, UioResult};

/// Conventional sysfs mount point, the default scan root.
pub const SYSFS_ROOT: &str = "/sys";

/// Class directory enumerating UIO devices, relative to the sysfs root.
const UIO_CLASS: &str = "class/uio";

/// Builds one fully populated device descriptor per discovered entry.
///
/// Reading the per-device attribute files (name, version, device number,
/// region geometry, node path) is this collaborator's concern; the scanner
/// only hands it the class directory and the entry name, and keeps whatever
/// comes back.
pub trait DeviceFactory {
    /// Populate a descriptor for `entry` under `class_dir`, or report why
    /// this one entry cannot be described.
    fn create(&self, class_dir: &Path, entry: &str) -> UioResult<UioDevice>;
}

/// The result of one scan: a descriptor for every entry the factory could
/// describe, and an explicit record of the entries it could not.
///
/// Both lists preserve the deterministic scan order.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Successfully described devices, still closed.
    pub devices: Vec<UioDevice>,
    /// Entry name and failure for each entry the factory rejected.
    pub failures: Vec<(String, UioError)>,
}

/// Scans a sysfs tree for UIO devices.
///
/// The mount point travels with the scanner; there is no process-global
/// override.
#[derive(Debug, Clone)]
pub struct Enumerator {
    root: PathBuf,
}

impl Enumerator {
    /// Scanner over the conventional `/sys` mount point.
    pub fn new() -> Self {
        Enumerator {
            root: SYSFS_ROOT.into(),
        }
    }

    /// Scanner over an alternate sysfs mount point.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Enumerator { root: root.into() }
    }

    /// The sysfs mount point this scanner reads.
    pub fn sysfs_root(&self) -> &Path {
        &self.root
    }

    /// The class directory this scanner enumerates.
    pub fn class_dir(&self) -> PathBuf {
        self.root.join(UIO_CLASS)
    }

    /// Enumerate the class directory and run `factory` once per entry.
    ///
    /// Fails only when the directory itself cannot be listed, preserving
    /// the OS error; every per-entry problem degrades into
    /// [`Discovery::failures`]. Entries are visited in lexicographic name
    /// order, so one device set always scans to one result. Nothing is
    /// opened.
    pub fn scan(&self, factory: &dyn DeviceFactory) -> UioResult<Discovery> {
        let class_dir = self.class_dir();
        let mut names = Vec::new();
        for entry in fs::read_dir(&class_dir)? {
            names.push(entry?.file_name());
        }
        names.sort();

        let mut found = Discovery::default();
        for name in names {
            match name.to_str() {
                Some(entry) => match factory.create(&class_dir, entry) {
                    Ok(device) => found.devices.push(device),
                    Err(err) => found.failures.push((entry.to_owned(), err)),
                },
                // sysfs names are ASCII; anything else cannot name a device.
                None => found
                    .failures
                    .push((name.to_string_lossy().into_owned(), UioError::InvalidParam)),
            }
        }
        debug!(
            "scan {}: {} devices, {} failures",
            class_dir.display(),
            found.devices.len(),
            found.failures.len()
        );
        Ok(found)
    }
}

impl Default for Enumerator {
    fn default() -> Self {
        Enumerator::new()
    }
}

/// Discover devices under the conventional sysfs mount point.
pub fn find_devices(factory: &dyn DeviceFactory) -> UioResult<Discovery> {
    Enumerator::new().scan(factory)
}
