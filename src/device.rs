//! UIO device descriptors.

use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use nix::libc::off_t;
use nix::sys::stat;
use nix::unistd::{sysconf, SysconfVar};

use crate::mapping::MemMapping;
use crate::{PhysAddr, UioError, UioResult, PAGE_SIZE};

/// One memory region of a UIO device.
///
/// A `size` of 0 marks a legitimately absent slot: opening the device skips
/// it and its mapping stays `None`. The physical address and the in-page
/// data offset are informational; region selection on open uses only the
/// slot index.
#[derive(Debug)]
pub struct UioMap {
    addr: PhysAddr,
    size: usize,
    offset: usize,
    mapping: Option<MemMapping>,
}

impl UioMap {
    /// Create an unmapped region record.
    pub fn new(addr: PhysAddr, size: usize, offset: usize) -> Self {
        UioMap {
            addr,
            size,
            offset,
            mapping: None,
        }
    }

    /// Physical base address of the region, as the description tree reports
    /// it. Never used to establish the mapping.
    pub fn addr(&self) -> PhysAddr {
        self.addr
    }

    /// Region length in bytes; 0 for an absent slot.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Byte offset of the region's data within its mapped page.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The established mapping, present while the owning device is open and
    /// mapping this region succeeded.
    pub fn mapping(&self) -> Option<&MemMapping> {
        self.mapping.as_ref()
    }
}

/// A UIO device descriptor.
///
/// A factory populates everything but the handle during discovery; `open`
/// acquires the character-device handle and one shared mapping per region,
/// `close` (or dropping the descriptor) releases them. A closed descriptor
/// is reusable for a subsequent `open`.
#[derive(Debug)]
pub struct UioDevice {
    name: String,
    version: String,
    devnode: PathBuf,
    devid: u64,
    // Declared before the handle: regions unmap before the node closes when
    // the whole descriptor drops.
    maps: Vec<UioMap>,
    fd: Option<File>,
}

impl UioDevice {
    /// Assemble a closed descriptor. The map list is final; slot order is
    /// the region index used by `open`.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        devnode: impl Into<PathBuf>,
        devid: u64,
        maps: Vec<UioMap>,
    ) -> Self {
        UioDevice {
            name: name.into(),
            version: version.into(),
            devnode: devnode.into(),
            devid,
            maps,
            fd: None,
        }
    }

    /// UIO driver name; empty when the device reports none.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver version string; empty when the device reports none.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Path of the character device node backing this descriptor.
    pub fn devnode(&self) -> &Path {
        &self.devnode
    }

    /// Composite device number of the node.
    pub fn devid(&self) -> u64 {
        self.devid
    }

    /// Major component of the device number.
    pub fn major(&self) -> u64 {
        stat::major(self.devid)
    }

    /// Minor component of the device number.
    pub fn minor(&self) -> u64 {
        stat::minor(self.devid)
    }

    /// Number of region slots, fixed at construction.
    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    /// Region records in index order.
    pub fn maps(&self) -> &[UioMap] {
        &self.maps
    }

    /// Region length at `map`, or 0 when the index is out of range.
    pub fn mem_size(&self, map: usize) -> usize {
        self.maps.get(map).map_or(0, UioMap::size)
    }

    /// In-page data offset of the region at `map`, or 0 when out of range.
    pub fn mem_offset(&self, map: usize) -> usize {
        self.maps.get(map).map_or(0, UioMap::offset)
    }

    /// Physical address of the region at `map`, or 0 when out of range.
    pub fn mem_addr(&self, map: usize) -> PhysAddr {
        self.maps.get(map).map_or(0, UioMap::addr)
    }

    /// The mapping of the region at `map`; `None` for unmapped, absent or
    /// out-of-range slots.
    pub fn mem_map(&self, map: usize) -> Option<&MemMapping> {
        self.maps.get(map).and_then(UioMap::mapping)
    }

    /// Whether the device node is currently open.
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Raw handle of the open device node, for callers that drive the raw
    /// event counter themselves. The handle stays owned by the descriptor.
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|file| file.as_raw_fd())
    }

    /// Open the device node read-write and establish one shared mapping per
    /// region, selecting region `i` through the `i`-th page of the node.
    ///
    /// A region whose mapping fails is left unmapped without failing the
    /// open; absent (`size == 0`) slots are never attempted. Callers check
    /// each slot via [`UioDevice::mem_map`] before use.
    pub fn open(&mut self) -> UioResult<()> {
        if self.fd.is_some() {
            return Err(UioError::InvalidParam);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.devnode)?;
        let fd = file.as_raw_fd();
        debug!("open {}: fd={}", self.devnode.display(), fd);
        // Handle first: the mapping loop and the event channel key off it.
        self.fd = Some(file);

        let page = page_size();
        for (i, map) in self.maps.iter_mut().enumerate() {
            if map.size == 0 {
                continue;
            }
            map.mapping = match MemMapping::new(fd, map.size, (i * page) as off_t) {
                Ok(mapping) => Some(mapping),
                Err(err) => {
                    warn!(
                        "map {} of {}: mmap failed: {}",
                        i,
                        self.devnode.display(),
                        err
                    );
                    None
                }
            };
        }
        Ok(())
    }

    /// Release every mapping and the device handle, returning the
    /// descriptor to its pre-open state. Idempotent; the descriptor may be
    /// opened again afterwards.
    pub fn close(&mut self) {
        for map in &mut self.maps {
            map.mapping = None;
        }
        if let Some(file) = self.fd.take() {
            trace!("close {}: fd={}", self.devnode.display(), file.as_raw_fd());
        }
    }
}

/// Host page granularity; the facility selects region `i` via the `i`-th
/// page of the node.
fn page_size() -> usize {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => size as usize,
        _ => PAGE_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    fn node_with_pages(dir: &tempfile::TempDir, pages: usize) -> PathBuf {
        let path = dir.path().join("uio0");
        let file = File::create(&path).unwrap();
        file.set_len((pages * page_size()) as u64).unwrap();
        path
    }

    fn pruss(devnode: impl Into<PathBuf>, maps: Vec<UioMap>) -> UioDevice {
        UioDevice::new("pruss_evt0", "0.2", devnode, stat::makedev(250, 3), maps)
    }

    #[test]
    fn accessors_are_total() {
        let dev = pruss(
            "/dev/uio0",
            vec![UioMap::new(0x4a30_0000, 0x2000, 0), UioMap::new(0, 0, 0)],
        );

        assert_eq!(dev.name(), "pruss_evt0");
        assert_eq!(dev.version(), "0.2");
        assert_eq!(dev.devnode(), Path::new("/dev/uio0"));
        assert_eq!(dev.major(), 250);
        assert_eq!(dev.minor(), 3);
        assert_eq!(dev.devid(), stat::makedev(250, 3));
        assert_eq!(dev.map_count(), 2);
        assert_eq!(dev.mem_size(0), 0x2000);
        assert_eq!(dev.mem_addr(0), 0x4a30_0000);
        assert_eq!(dev.mem_offset(0), 0);

        // Out-of-range indices answer with the neutral value, never panic.
        assert_eq!(dev.mem_size(2), 0);
        assert_eq!(dev.mem_offset(7), 0);
        assert_eq!(dev.mem_addr(usize::MAX), 0);
        assert!(dev.mem_map(2).is_none());
    }

    #[test]
    fn open_maps_regions_and_close_unmaps() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_with_pages(&dir, 1);
        let page = page_size();
        let mut dev = pruss(
            &node,
            vec![UioMap::new(0x8000_0000, page, 0), UioMap::new(0, 0, 0)],
        );

        dev.open().unwrap();
        assert!(dev.is_open());
        assert!(dev.raw_fd().is_some());

        // Only the sized slot gets a mapping; the absent one is skipped.
        let mapping = dev.mem_map(0).expect("region 0 should be mapped");
        assert_eq!(mapping.len(), page);
        assert!(dev.mem_map(1).is_none());
        assert_eq!(dev.mem_size(1), 0);

        // The mapping is shared: stores land in the backing node.
        assert!(mapping.write32(0, 0xcafe_f00d));
        dev.close();
        assert!(!dev.is_open());
        assert!(dev.raw_fd().is_none());
        assert!(dev.mem_map(0).is_none());

        let bytes = std::fs::read(&node).unwrap();
        assert_eq!(bytes[..4], 0xcafe_f00du32.to_ne_bytes());
    }

    #[test]
    fn reopen_round_trips_descriptor_state() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_with_pages(&dir, 1);
        let mut dev = pruss(&node, vec![UioMap::new(0x1000, page_size(), 0)]);

        dev.open().unwrap();
        dev.close();

        // Identity and geometry read back exactly as before the cycle.
        assert_eq!(dev.name(), "pruss_evt0");
        assert_eq!(dev.version(), "0.2");
        assert_eq!(dev.devnode(), node.as_path());
        assert_eq!(dev.map_count(), 1);
        assert_eq!(dev.mem_size(0), page_size());
        assert_eq!(dev.mem_addr(0), 0x1000);
        assert!(dev.mem_map(0).is_none());
        assert!(dev.raw_fd().is_none());

        // And the descriptor is reusable.
        dev.open().unwrap();
        assert!(dev.mem_map(0).is_some());
        dev.close();
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_with_pages(&dir, 1);
        let mut dev = pruss(&node, vec![UioMap::new(0, page_size(), 0)]);

        // Closing a never-opened descriptor is a no-op.
        dev.close();

        dev.open().unwrap();
        dev.close();
        dev.close();
        assert!(!dev.is_open());
        assert!(dev.mem_map(0).is_none());
    }

    #[test]
    fn open_twice_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_with_pages(&dir, 1);
        let mut dev = pruss(&node, vec![]);

        dev.open().unwrap();
        assert_eq!(dev.open().err(), Some(UioError::InvalidParam));
        // The first handle survives the rejected reopen.
        assert!(dev.is_open());
    }

    #[test]
    fn open_missing_node_preserves_errno() {
        let dir = tempfile::tempdir().unwrap();
        let mut dev = pruss(dir.path().join("nonexistent"), vec![]);

        assert_eq!(dev.open().err(), Some(UioError::Sys(Errno::ENOENT)));
        assert!(!dev.is_open());
    }

    #[test]
    fn partial_map_failure_leaves_device_open() {
        // /dev/null opens read-write but refuses mmap.
        let mut dev = pruss("/dev/null", vec![UioMap::new(0, page_size(), 0)]);

        dev.open().unwrap();
        assert!(dev.is_open());
        assert!(dev.mem_map(0).is_none());
        dev.close();
    }
}
