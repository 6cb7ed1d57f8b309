// FAT32 volume inspection and undelete
// Boot sector decoding, cluster chains, directory scanning, recovery

pub mod boot_sector;
pub mod chain;
pub mod dir;
pub mod fat;
pub mod recover;
pub mod report;

pub use boot_sector::BootSector;
pub use dir::{DirEntry, DirectoryScanner, EntryKind, ScannedEntry};
pub use fat::FatEntry;
pub use recover::{parse_sha1_hex, RecoveryEngine, RecoveryOutcome};

#[cfg(test)]
pub(crate) mod test_support;
