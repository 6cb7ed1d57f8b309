// Cluster chain traversal

use std::collections::HashSet;

use lazarus_core::{DiskImage, LazarusError, LazarusResult};
use log::trace;

use crate::boot_sector::BootSector;
use crate::fat::{self, FatEntry};

/// Follow the chain starting at `start`, returning the ordered cluster
/// numbers. The walk stops at an end-of-chain or bad-cluster value, or when
/// the next cluster number falls outside the data region. A revisited cluster
/// or a chain longer than the volume's cluster count is a corrupt image.
pub fn walk_chain(
    image: &DiskImage,
    boot: &BootSector,
    start: u32,
) -> LazarusResult<Vec<u32>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let max_steps = boot.total_clusters() as usize;
    let mut current = start;

    loop {
        if current < 2 || current >= boot.max_cluster() {
            break;
        }
        if !visited.insert(current) {
            return Err(LazarusError::CorruptChain(format!(
                "cluster {} appears twice in the chain from {}",
                current, start
            )));
        }
        if chain.len() >= max_steps {
            return Err(LazarusError::CorruptChain(format!(
                "chain from {} exceeds the volume's {} clusters",
                start, max_steps
            )));
        }
        chain.push(current);

        let next = fat::read_entry(image, boot, current)?;
        trace!("FAT[{}] = {:#x}", current, next);
        if FatEntry::classify(next).is_terminal() {
            break;
        }
        current = next;
    }

    Ok(chain)
}
