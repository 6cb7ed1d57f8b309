// Disk image access abstraction
// Holds the whole image in memory and writes mutations through to the file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};

use crate::error::{LazarusError, LazarusResult};

/// An exclusively-held, mutable view of a raw volume image.
///
/// The image is read into memory once at open time; every write updates the
/// in-memory copy and is immediately written through to the backing file at
/// the same byte offset. Readers (`read_at` and friends) borrow the image
/// immutably, so components that must not mutate the volume can be handed a
/// shared reference and are prevented from writing by construction.
pub struct DiskImage {
    file: File,
    data: Vec<u8>,
}

impl DiskImage {
    /// Open an image file for reading and in-place recovery writes.
    pub fn open<P: AsRef<Path>>(path: P) -> LazarusResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        debug!("Opened image {} ({} bytes)", path.display(), data.len());

        Ok(Self { file, data })
    }

    /// Total image size in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_range(&self, offset: u64, size: usize) -> LazarusResult<usize> {
        let end = offset
            .checked_add(size as u64)
            .filter(|&end| end <= self.len())
            .ok_or_else(|| {
                LazarusError::InvalidImage(format!(
                    "access of {} bytes at offset {:#x} is outside the {}-byte image",
                    size,
                    offset,
                    self.len()
                ))
            })?;
        Ok(end as usize)
    }

    /// Borrow `size` bytes starting at `offset`.
    pub fn read_at(&self, offset: u64, size: usize) -> LazarusResult<&[u8]> {
        let end = self.check_range(offset, size)?;
        Ok(&self.data[offset as usize..end])
    }

    /// Read a little-endian u32 at `offset`.
    pub fn read_u32_at(&self, offset: u64) -> LazarusResult<u32> {
        let bytes = self.read_at(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write bytes at `offset`, updating both the in-memory copy and the file.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> LazarusResult<()> {
        let end = self.check_range(offset, bytes.len())?;
        trace!("Writing {} bytes at offset {:#x}", bytes.len(), offset);

        self.data[offset as usize..end].copy_from_slice(bytes);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Write a single byte at `offset`.
    pub fn write_u8_at(&mut self, offset: u64, value: u8) -> LazarusResult<()> {
        self.write_at(offset, &[value])
    }

    /// Write a little-endian u32 at `offset`.
    pub fn write_u32_at(&mut self, offset: u64, value: u32) -> LazarusResult<()> {
        self.write_at(offset, &value.to_le_bytes())
    }
}
