// Synthetic FAT32 images for tests
//
// Geometry: 512-byte sectors, 1 sector per cluster, 2 reserved sectors,
// 2 FATs of 1 sector each, 32 total sectors. Data clusters 2..30, root
// directory at cluster 2.

use std::io::Write;

use lazarus_core::DiskImage;
use tempfile::NamedTempFile;

use crate::dir::{ATTR_DIRECTORY, ATTR_LONG_NAME, DELETED_MARKER, DIR_ENTRY_SIZE};
use crate::fat::cluster_values::END_OF_CHAIN;

pub const BYTES_PER_SECTOR: u64 = 512;
pub const RESERVED_SECTORS: u64 = 2;
pub const NUM_FATS: u8 = 2;
pub const SECTORS_PER_FAT: u64 = 1;
pub const TOTAL_SECTORS: u64 = 32;
pub const ROOT_CLUSTER: u32 = 2;

const RECORDS_PER_CLUSTER: usize = BYTES_PER_SECTOR as usize / DIR_ENTRY_SIZE;
const ATTR_ARCHIVE: u8 = 0x20;

/// Pack an `BASE.EXT` style name into the space-padded 11-byte field, then
/// force the first byte (pass the deleted marker to fabricate a deleted
/// entry's on-disk state).
pub fn entry_name(name: &str, first: u8) -> [u8; 11] {
    let mut packed = [b' '; 11];
    let (base, ext) = match name.split_once('.') {
        Some((base, ext)) => (base, ext),
        None => (name, ""),
    };
    packed[..base.len()].copy_from_slice(base.as_bytes());
    packed[8..8 + ext.len()].copy_from_slice(ext.as_bytes());
    packed[0] = first;
    packed
}

pub struct ImageBuilder {
    data: Vec<u8>,
    root_chain: Vec<u32>,
    root_records: usize,
}

impl ImageBuilder {
    pub fn new() -> Self {
        let mut data = vec![0u8; (TOTAL_SECTORS * BYTES_PER_SECTOR) as usize];

        // BPB fields at their fixed offsets
        data[11..13].copy_from_slice(&(BYTES_PER_SECTOR as u16).to_le_bytes());
        data[13] = 1; // sectors per cluster
        data[14..16].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
        data[16] = NUM_FATS;
        data[32..36].copy_from_slice(&(TOTAL_SECTORS as u32).to_le_bytes());
        data[36..40].copy_from_slice(&(SECTORS_PER_FAT as u32).to_le_bytes());
        data[44..48].copy_from_slice(&ROOT_CLUSTER.to_le_bytes());
        data[510] = 0x55;
        data[511] = 0xAA;

        let mut builder = Self {
            data,
            root_chain: vec![ROOT_CLUSTER],
            root_records: 0,
        };
        // reserved slots 0 and 1, root directory terminator
        builder.set_fat(0, 0x0FFF_FFF8);
        builder.set_fat(1, END_OF_CHAIN);
        builder.set_fat(ROOT_CLUSTER, END_OF_CHAIN);
        builder
    }

    fn fat_slot(mirror: u8, cluster: u32) -> usize {
        ((RESERVED_SECTORS + mirror as u64 * SECTORS_PER_FAT) * BYTES_PER_SECTOR) as usize
            + cluster as usize * 4
    }

    fn cluster_start(cluster: u32) -> usize {
        ((RESERVED_SECTORS + NUM_FATS as u64 * SECTORS_PER_FAT + (cluster as u64 - 2))
            * BYTES_PER_SECTOR) as usize
    }

    fn set_fat(&mut self, cluster: u32, value: u32) {
        for mirror in 0..NUM_FATS {
            let slot = Self::fat_slot(mirror, cluster);
            self.data[slot..slot + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Set a FAT slot in both mirrors.
    pub fn fat(mut self, cluster: u32, value: u32) -> Self {
        self.set_fat(cluster, value);
        self
    }

    /// Link the root directory across the given clusters.
    pub fn root_chain(mut self, clusters: &[u32]) -> Self {
        for window in clusters.windows(2) {
            self.set_fat(window[0], window[1]);
        }
        if let Some(&last) = clusters.last() {
            self.set_fat(last, END_OF_CHAIN);
        }
        self.root_chain = clusters.to_vec();
        self
    }

    fn push_record(&mut self, record: [u8; DIR_ENTRY_SIZE]) {
        let cluster = self.root_chain[self.root_records / RECORDS_PER_CLUSTER];
        let offset = Self::cluster_start(cluster)
            + (self.root_records % RECORDS_PER_CLUSTER) * DIR_ENTRY_SIZE;
        self.data[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(&record);
        self.root_records += 1;
    }

    fn make_record(name: [u8; 11], attributes: u8, cluster: u32, size: u32) -> [u8; DIR_ENTRY_SIZE] {
        let mut record = [0u8; DIR_ENTRY_SIZE];
        record[0..11].copy_from_slice(&name);
        record[11] = attributes;
        record[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
        record[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
        record[28..32].copy_from_slice(&size.to_le_bytes());
        record
    }

    pub fn root_file(mut self, name: &str, cluster: u32, size: u32) -> Self {
        let first = name.as_bytes()[0];
        self.push_record(Self::make_record(
            entry_name(name, first),
            ATTR_ARCHIVE,
            cluster,
            size,
        ));
        self
    }

    pub fn root_deleted_file(mut self, name: &str, cluster: u32, size: u32) -> Self {
        self.push_record(Self::make_record(
            entry_name(name, DELETED_MARKER),
            ATTR_ARCHIVE,
            cluster,
            size,
        ));
        self
    }

    pub fn root_dir(mut self, name: &str, cluster: u32) -> Self {
        let first = name.as_bytes()[0];
        self.push_record(Self::make_record(
            entry_name(name, first),
            ATTR_DIRECTORY,
            cluster,
            0,
        ));
        self
    }

    pub fn root_long_name_fragment(mut self) -> Self {
        let mut name = [b'X'; 11];
        name[0] = 0x41;
        self.push_record(Self::make_record(name, ATTR_LONG_NAME, 0, 0));
        self
    }

    /// Fill a data cluster's leading bytes.
    pub fn data(mut self, cluster: u32, bytes: &[u8]) -> Self {
        let start = Self::cluster_start(cluster);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn build(self) -> (NamedTempFile, DiskImage) {
        let mut file = NamedTempFile::new().expect("create temp image");
        file.write_all(&self.data).expect("seed image");
        file.flush().expect("flush image");
        let image = DiskImage::open(file.path()).expect("open image");
        (file, image)
    }
}
