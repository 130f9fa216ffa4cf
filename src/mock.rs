//! Scripted device factory for tests.
//!
//! Stands in for the sysfs attribute reader so discovery and lifecycle
//! paths can run against fabricated device sets, with no UIO hardware and
//! no real `/sys`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nix::errno::Errno;

use crate::device::{UioDevice, UioMap};
use crate::discover::DeviceFactory;
use crate::{PhysAddr, UioError, UioResult};

/// Template from which the factory builds a fresh closed descriptor on
/// every `create` call.
#[derive(Debug, Clone)]
pub struct MockDevice {
    /// Driver name to report; an empty name defaults to the entry name.
    pub name: String,
    /// Version string to report.
    pub version: String,
    /// Node the descriptor will open.
    pub devnode: PathBuf,
    /// Composite device number.
    pub devid: u64,
    /// Region geometry per slot: physical address, size, in-page offset.
    pub maps: Vec<(PhysAddr, usize, usize)>,
}

impl MockDevice {
    /// Template with the given node and no regions.
    pub fn new(devnode: impl Into<PathBuf>) -> Self {
        MockDevice {
            name: String::new(),
            version: String::new(),
            devnode: devnode.into(),
            devid: 0,
            maps: Vec::new(),
        }
    }

    /// Append one region slot.
    pub fn map(mut self, addr: PhysAddr, size: usize, offset: usize) -> Self {
        self.maps.push((addr, size, offset));
        self
    }
}

/// Scripted [`DeviceFactory`]: each entry name resolves to a device
/// template or a canned failure. Entries off the script fail with
/// `ENOENT`, like a device that vanished between listing and description.
#[derive(Debug, Default)]
pub struct MockFactory {
    script: HashMap<String, Result<MockDevice, Errno>>,
}

impl MockFactory {
    pub fn new() -> Self {
        MockFactory::default()
    }

    /// Script a device template for `entry`.
    pub fn device(mut self, entry: &str, template: MockDevice) -> Self {
        self.script.insert(entry.to_owned(), Ok(template));
        self
    }

    /// Script a failure for `entry`.
    pub fn failure(mut self, entry: &str, errno: Errno) -> Self {
        self.script.insert(entry.to_owned(), Err(errno));
        self
    }
}

impl DeviceFactory for MockFactory {
    fn create(&self, _class_dir: &Path, entry: &str) -> UioResult<UioDevice> {
        match self.script.get(entry) {
            Some(Ok(template)) => {
                let name = if template.name.is_empty() {
                    entry
                } else {
                    template.name.as_str()
                };
                let maps = template
                    .maps
                    .iter()
                    .map(|&(addr, size, offset)| UioMap::new(addr, size, offset))
                    .collect();
                Ok(UioDevice::new(
                    name,
                    template.version.as_str(),
                    template.devnode.clone(),
                    template.devid,
                    maps,
                ))
            }
            Some(Err(errno)) => Err(UioError::Sys(*errno)),
            None => Err(UioError::Sys(Errno::ENOENT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_entries_resolve() {
        let template = MockDevice::new("/dev/uio7").map(0xfff0_0000, 0x1000, 0);
        let factory = MockFactory::new()
            .device("uio7", template)
            .failure("uio8", Errno::EACCES);
        let class_dir = Path::new("/sys/class/uio");

        let dev = factory.create(class_dir, "uio7").unwrap();
        assert_eq!(dev.name(), "uio7");
        assert_eq!(dev.devnode(), Path::new("/dev/uio7"));
        assert_eq!(dev.map_count(), 1);
        assert_eq!(dev.mem_addr(0), 0xfff0_0000);
        assert!(!dev.is_open());

        assert_eq!(
            factory.create(class_dir, "uio8").err(),
            Some(UioError::Sys(Errno::EACCES))
        );
        assert_eq!(
            factory.create(class_dir, "uio9").err(),
            Some(UioError::Sys(Errno::ENOENT))
        );
    }

    #[test]
    fn template_name_wins_over_entry() {
        let mut template = MockDevice::new("/dev/uio0");
        template.name = "gpio-irq".to_owned();
        let factory = MockFactory::new().device("uio0", template);

        let dev = factory.create(Path::new("/sys/class/uio"), "uio0").unwrap();
        assert_eq!(dev.name(), "gpio-irq");
    }
}
