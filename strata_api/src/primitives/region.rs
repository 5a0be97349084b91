use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_BLOCK_SIZE;

use super::bytes::ByteCount;

/// A contiguous range of blocks on a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Region {
    /// First block.
    pub start: u64,

    /// Number of blocks.
    pub length: u64,

    #[serde(default = "default_block_size")]
    pub block_size: u32,
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

impl Region {
    pub fn new(start: u64, length: u64, block_size: u32) -> Self {
        Self {
            start,
            length,
            block_size,
        }
    }

    /// Builds a region from byte offsets, rounding the length down to whole blocks.
    pub fn from_bytes(start: ByteCount, size: ByteCount, block_size: u32) -> Self {
        let bs = u64::from(block_size);
        Self::new(start.bytes() / bs, size.bytes() / bs, block_size)
    }

    /// One past the last block.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    pub fn size(&self) -> ByteCount {
        ByteCount(self.length * u64::from(self.block_size))
    }

    pub fn start_bytes(&self) -> ByteCount {
        ByteCount(self.start * u64::from(self.block_size))
    }

    /// Returns a copy with the length adjusted so the region spans `size` bytes.
    pub fn with_size(&self, size: ByteCount) -> Self {
        Self::new(self.start, size.bytes() / u64::from(self.block_size), self.block_size)
    }

    /// Whether `other` lies completely inside this region.
    pub fn contains(&self, other: &Region) -> bool {
        other.start_bytes() >= self.start_bytes()
            && other.start_bytes() + other.size() <= self.start_bytes() + self.size()
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        let (a0, a1) = (self.start_bytes(), self.start_bytes() + self.size());
        let (b0, b1) = (other.start_bytes(), other.start_bytes() + other.size());
        a0 < b1 && b0 < a1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_size() {
        let region = Region::new(2048, 1024000, 512);
        assert_eq!(region.end(), 1026048);
        assert_eq!(region.size(), ByteCount::from_mib(500));
        assert_eq!(region.start_bytes(), ByteCount::from_mib(1));

        let grown = region.with_size(ByteCount::from_gib(1));
        assert_eq!(grown.start, 2048);
        assert_eq!(grown.size(), ByteCount::from_gib(1));
    }

    #[test]
    fn test_contains_and_overlaps() {
        let disk = Region::from_bytes(ByteCount(0), ByteCount::from_gib(10), 512);
        let a = Region::from_bytes(ByteCount::from_mib(1), ByteCount::from_mib(500), 512);
        let b = Region::from_bytes(ByteCount::from_mib(400), ByteCount::from_mib(500), 512);
        let c = Region::from_bytes(ByteCount::from_mib(501), ByteCount::from_mib(10), 512);

        assert!(disk.contains(&a));
        assert!(!a.contains(&disk));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_deserialize_default_block_size() {
        let region: Region = serde_yaml::from_str("start: 34\nlength: 100").unwrap();
        assert_eq!(region, Region::new(34, 100, DEFAULT_BLOCK_SIZE));
    }
}
