// Directory entry decoding and root directory scanning

use lazarus_core::{DiskImage, LazarusResult};

use crate::boot_sector::BootSector;

/// Size of one on-disk directory record.
pub const DIR_ENTRY_SIZE: usize = 32;

/// First name byte of a never-used record.
pub const FREE_MARKER: u8 = 0x00;
/// First name byte overwritten when a file is deleted.
pub const DELETED_MARKER: u8 = 0xE5;

pub const ATTR_LONG_NAME: u8 = 0x0F;
pub const ATTR_DIRECTORY: u8 = 0x10;

/// Record byte offsets within the 32-byte entry.
const OFF_ATTRIBUTES: usize = 11;
const OFF_FIRST_CLUSTER_HIGH: usize = 20;
const OFF_FIRST_CLUSTER_LOW: usize = 26;
const OFF_FILE_SIZE: usize = 28;

/// A decoded 32-byte directory record, together with the absolute image
/// offset it was read from so recovery can write the name byte back.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: [u8; 11],
    pub attributes: u8,
    pub first_cluster_high: u16,
    pub first_cluster_low: u16,
    pub file_size: u32,
    pub offset: u64,
}

impl DirEntry {
    /// Decode a record found at absolute image offset `offset`.
    pub fn decode(record: &[u8], offset: u64) -> Self {
        debug_assert!(record.len() >= DIR_ENTRY_SIZE);
        let mut name = [0u8; 11];
        name.copy_from_slice(&record[0..11]);
        Self {
            name,
            attributes: record[OFF_ATTRIBUTES],
            first_cluster_high: u16::from_le_bytes([
                record[OFF_FIRST_CLUSTER_HIGH],
                record[OFF_FIRST_CLUSTER_HIGH + 1],
            ]),
            first_cluster_low: u16::from_le_bytes([
                record[OFF_FIRST_CLUSTER_LOW],
                record[OFF_FIRST_CLUSTER_LOW + 1],
            ]),
            file_size: u32::from_le_bytes([
                record[OFF_FILE_SIZE],
                record[OFF_FILE_SIZE + 1],
                record[OFF_FILE_SIZE + 2],
                record[OFF_FILE_SIZE + 3],
            ]),
            offset,
        }
    }

    /// Starting cluster number; the high half is the FAT32 extension word.
    pub fn first_cluster(&self) -> u32 {
        ((self.first_cluster_high as u32) << 16) | self.first_cluster_low as u32
    }

    pub fn is_free(&self) -> bool {
        self.name[0] == FREE_MARKER
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == DELETED_MARKER
    }

    pub fn is_long_name(&self) -> bool {
        self.attributes == ATTR_LONG_NAME
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    /// The 8.3 name with padding trimmed and a `.` separating a non-empty
    /// extension, as raw bytes. The first byte of a deleted entry is the
    /// `0xE5` marker.
    pub fn rendered_name(&self) -> Vec<u8> {
        let base = trim_padding(&self.name[0..8]);
        let ext = trim_padding(&self.name[8..11]);

        let mut rendered = Vec::with_capacity(12);
        rendered.extend_from_slice(base);
        if !ext.is_empty() {
            rendered.push(b'.');
            rendered.extend_from_slice(ext);
        }
        rendered
    }

    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.rendered_name()).into_owned()
    }

    /// Compare against a requested 8.3 name, ignoring the first character of
    /// both (a deleted entry's first byte was overwritten on disk and the
    /// caller supplies a placeholder in its stead).
    pub fn name_matches_ignoring_first(&self, requested: &str) -> bool {
        let rendered = self.rendered_name();
        let requested = requested.as_bytes();
        !rendered.is_empty()
            && !requested.is_empty()
            && rendered[1..] == requested[1..]
    }
}

fn trim_padding(field: &[u8]) -> &[u8] {
    let end = field
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |pos| pos + 1);
    &field[..end]
}

/// How the scanner classified a yielded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone)]
pub struct ScannedEntry {
    pub kind: EntryKind,
    pub entry: DirEntry,
}

/// Lazy scan over every 32-byte record of a directory's cluster chain, in
/// on-disk order. Free records and long-name fragments are skipped; deleted
/// entries are yielded like live ones, since the reporter and the recovery
/// engine apply different deletion predicates over the same stream.
pub struct DirectoryScanner<'a> {
    image: &'a DiskImage,
    boot: &'a BootSector,
    chain: &'a [u32],
    cluster_index: usize,
    record_index: u32,
    failed: bool,
}

impl<'a> DirectoryScanner<'a> {
    pub fn new(image: &'a DiskImage, boot: &'a BootSector, chain: &'a [u32]) -> Self {
        Self {
            image,
            boot,
            chain,
            cluster_index: 0,
            record_index: 0,
            failed: false,
        }
    }

    fn records_per_cluster(&self) -> u32 {
        self.boot.cluster_size() / DIR_ENTRY_SIZE as u32
    }
}

impl<'a> Iterator for DirectoryScanner<'a> {
    type Item = LazarusResult<ScannedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let cluster = *self.chain.get(self.cluster_index)?;
            if self.record_index >= self.records_per_cluster() {
                self.cluster_index += 1;
                self.record_index = 0;
                continue;
            }

            let offset = self.boot.cluster_offset(cluster)
                + self.record_index as u64 * DIR_ENTRY_SIZE as u64;
            self.record_index += 1;

            let record = match self.image.read_at(offset, DIR_ENTRY_SIZE) {
                Ok(record) => record,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            let entry = DirEntry::decode(record, offset);

            if entry.is_free() || entry.is_long_name() {
                continue;
            }
            let kind = if entry.is_directory() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            return Some(Ok(ScannedEntry { kind, entry }));
        }
    }
}
