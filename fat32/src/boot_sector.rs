// FAT32 boot sector (BPB) decoding
// Fields are decoded from explicit byte offsets, never by overlaying structs
// onto the raw buffer

use lazarus_core::{DiskImage, LazarusError, LazarusResult};
use log::debug;

/// Byte offsets of the BPB fields inside the first sector.
const OFF_BYTES_PER_SECTOR: u64 = 11;
const OFF_SECTORS_PER_CLUSTER: u64 = 13;
const OFF_RESERVED_SECTORS: u64 = 14;
const OFF_NUM_FATS: u64 = 16;
const OFF_TOTAL_SECTORS_32: u64 = 32;
const OFF_SECTORS_PER_FAT_32: u64 = 36;
const OFF_ROOT_CLUSTER: u64 = 44;
const OFF_BOOT_SIGNATURE: u64 = 510;

const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Decoded FAT32 boot sector. Read once per operation, never mutated.
#[derive(Debug, Clone)]
pub struct BootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub total_sectors: u32,
    pub sectors_per_fat: u32,
    pub root_cluster: u32,
}

impl BootSector {
    /// Decode and validate the boot sector at the start of the image.
    pub fn parse(image: &DiskImage) -> LazarusResult<Self> {
        let read_u16 = |offset: u64| -> LazarusResult<u16> {
            let bytes = image.read_at(offset, 2)?;
            Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
        };

        let signature = image.read_at(OFF_BOOT_SIGNATURE, 2)?;
        if signature != BOOT_SIGNATURE {
            return Err(LazarusError::InvalidImage(format!(
                "bad boot signature: expected 55 AA, found {:02X} {:02X}",
                signature[0], signature[1]
            )));
        }

        let boot = Self {
            bytes_per_sector: read_u16(OFF_BYTES_PER_SECTOR)?,
            sectors_per_cluster: image.read_at(OFF_SECTORS_PER_CLUSTER, 1)?[0],
            reserved_sectors: read_u16(OFF_RESERVED_SECTORS)?,
            num_fats: image.read_at(OFF_NUM_FATS, 1)?[0],
            total_sectors: image.read_u32_at(OFF_TOTAL_SECTORS_32)?,
            sectors_per_fat: image.read_u32_at(OFF_SECTORS_PER_FAT_32)?,
            root_cluster: image.read_u32_at(OFF_ROOT_CLUSTER)?,
        };
        boot.validate()?;
        debug!("Boot sector: {:?}", boot);
        Ok(boot)
    }

    fn validate(&self) -> LazarusResult<()> {
        if ![512, 1024, 2048, 4096].contains(&self.bytes_per_sector) {
            return Err(LazarusError::InvalidImage(format!(
                "invalid bytes per sector: {}",
                self.bytes_per_sector
            )));
        }
        if !self.sectors_per_cluster.is_power_of_two() {
            return Err(LazarusError::InvalidImage(format!(
                "sectors per cluster not a power of 2: {}",
                self.sectors_per_cluster
            )));
        }
        if self.num_fats == 0 {
            return Err(LazarusError::InvalidImage(
                "number of FATs cannot be 0".to_string(),
            ));
        }
        if self.root_cluster < 2 {
            return Err(LazarusError::InvalidImage(format!(
                "invalid root cluster: {}",
                self.root_cluster
            )));
        }
        Ok(())
    }

    /// Cluster size in bytes.
    pub fn cluster_size(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    /// First sector of the data region (after the reserved area and all FATs).
    pub fn first_data_sector(&self) -> u64 {
        self.reserved_sectors as u64 + self.num_fats as u64 * self.sectors_per_fat as u64
    }

    /// Byte offset of the given FAT mirror.
    pub fn fat_offset(&self, mirror: u8) -> u64 {
        (self.reserved_sectors as u64 + mirror as u64 * self.sectors_per_fat as u64)
            * self.bytes_per_sector as u64
    }

    /// Byte offset of `cluster`'s 4-byte slot inside the given FAT mirror.
    pub fn fat_entry_offset(&self, mirror: u8, cluster: u32) -> u64 {
        self.fat_offset(mirror) + cluster as u64 * 4
    }

    /// Byte offset of `cluster`'s data. Clusters are numbered from 2.
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        (self.first_data_sector() + (cluster as u64 - 2) * self.sectors_per_cluster as u64)
            * self.bytes_per_sector as u64
    }

    /// Number of data clusters on the volume.
    pub fn total_clusters(&self) -> u32 {
        let data_sectors = (self.total_sectors as u64).saturating_sub(self.first_data_sector());
        (data_sectors / self.sectors_per_cluster as u64) as u32
    }

    /// One past the highest valid cluster number.
    pub fn max_cluster(&self) -> u32 {
        2 + self.total_clusters()
    }
}
