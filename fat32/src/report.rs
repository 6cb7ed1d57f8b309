// Read-only reporting: volume parameters and root directory listings

use std::io::Write;

use lazarus_core::{DiskImage, LazarusResult};

use crate::boot_sector::BootSector;
use crate::chain;
use crate::dir::{DirectoryScanner, EntryKind};

/// Dump the volume parameters of the boot sector.
pub fn volume_info<W: Write>(out: &mut W, boot: &BootSector) -> LazarusResult<()> {
    writeln!(out, "Number of FATs = {}", boot.num_fats)?;
    writeln!(out, "Number of bytes per sector = {}", boot.bytes_per_sector)?;
    writeln!(out, "Number of sectors per cluster = {}", boot.sectors_per_cluster)?;
    writeln!(out, "Number of reserved sectors = {}", boot.reserved_sectors)?;
    Ok(())
}

/// List the visible entries of the root directory and their total count.
/// Deleted entries are filtered here, on top of the free/long-name skips the
/// scanner already applies.
pub fn list_root<W: Write>(
    out: &mut W,
    image: &DiskImage,
    boot: &BootSector,
) -> LazarusResult<()> {
    let root_chain = chain::walk_chain(image, boot, boot.root_cluster)?;
    let mut count = 0u32;

    for scanned in DirectoryScanner::new(image, boot, &root_chain) {
        let scanned = scanned?;
        if scanned.entry.is_deleted() {
            continue;
        }
        let entry = &scanned.entry;
        match scanned.kind {
            EntryKind::Directory => {
                writeln!(
                    out,
                    "{}/ (starting cluster = {})",
                    entry.display_name(),
                    entry.first_cluster()
                )?;
            }
            EntryKind::File => {
                if entry.file_size != 0 {
                    writeln!(
                        out,
                        "{} (size = {}, starting cluster = {})",
                        entry.display_name(),
                        entry.file_size,
                        entry.first_cluster()
                    )?;
                } else {
                    writeln!(out, "{} (size = 0)", entry.display_name())?;
                }
            }
        }
        count += 1;
    }

    writeln!(out, "Total number of entries = {}", count)?;
    Ok(())
}
