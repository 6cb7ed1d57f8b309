// Recovery engine: in-place undelete of root-directory entries
// All volume mutation funnels through this module

use std::collections::HashSet;

use lazarus_core::{DiskImage, LazarusError, LazarusResult};
use log::{debug, info};
use sha1::{Digest, Sha1};

use crate::boot_sector::BootSector;
use crate::chain;
use crate::dir::{DirEntry, DirectoryScanner, EntryKind};
use crate::fat;

pub const SHA1_LEN: usize = 20;

/// Cap on the candidate cluster pool for the non-contiguous search. The
/// search is exponential in the chain length, so it is only practical over a
/// small window of unreferenced clusters.
const MAX_SEARCH_CLUSTERS: usize = 20;

/// Outcome of a recovery attempt. Not-found and ambiguous are expected
/// answers, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    NotFound,
    Ambiguous,
    Recovered,
    RecoveredWithHash,
}

impl RecoveryOutcome {
    /// The console message for this outcome.
    pub fn message(&self, name: &str) -> String {
        match self {
            RecoveryOutcome::NotFound => format!("{}: file not found", name),
            RecoveryOutcome::Ambiguous => format!("{}: multiple candidates found", name),
            RecoveryOutcome::Recovered => format!("{}: successfully recovered", name),
            RecoveryOutcome::RecoveredWithHash => {
                format!("{}: successfully recovered with SHA-1", name)
            }
        }
    }
}

/// Parse a 40-character hex SHA-1 digest.
pub fn parse_sha1_hex(input: &str) -> LazarusResult<[u8; SHA1_LEN]> {
    let bytes = hex::decode(input)
        .map_err(|e| LazarusError::InvalidInput(format!("invalid SHA-1 hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| LazarusError::InvalidInput("a SHA-1 digest is 20 bytes".to_string()))
}

fn sha1_of(data: &[u8]) -> [u8; SHA1_LEN] {
    Sha1::digest(data).into()
}

/// Undeletes files by rewriting directory entries and FAT mirrors in place.
/// Holds the only mutable borrow of the image for its lifetime.
pub struct RecoveryEngine<'a> {
    image: &'a mut DiskImage,
    boot: BootSector,
}

impl<'a> RecoveryEngine<'a> {
    pub fn new(image: &'a mut DiskImage) -> LazarusResult<Self> {
        let boot = BootSector::parse(&*image)?;
        Ok(Self { image, boot })
    }

    /// Plain rename-undelete, assuming the file occupied contiguous clusters.
    pub fn undelete(&mut self, requested: &str) -> LazarusResult<RecoveryOutcome> {
        check_requested_name(requested)?;
        let candidates = self.deleted_file_candidates(requested)?;
        debug!("{} deleted candidate(s) named like {}", candidates.len(), requested);

        match candidates.as_slice() {
            [] => Ok(RecoveryOutcome::NotFound),
            [single] => {
                let entry = single.clone();
                self.restore_contiguous(&entry, requested)?;
                Ok(RecoveryOutcome::Recovered)
            }
            _ => Ok(RecoveryOutcome::Ambiguous),
        }
    }

    /// Hash-disambiguated undelete: among name-matching deleted entries, the
    /// one whose (assumed contiguous) content hashes to `digest` is restored.
    /// Two entries matching both name and hash are reported as ambiguous
    /// rather than silently recovering the first.
    pub fn undelete_with_hash(
        &mut self,
        requested: &str,
        digest: &[u8; SHA1_LEN],
    ) -> LazarusResult<RecoveryOutcome> {
        check_requested_name(requested)?;
        let mut matches = Vec::new();
        for entry in self.deleted_file_candidates(requested)? {
            if self.contiguous_content_matches(&entry, digest)? {
                matches.push(entry);
            }
        }

        match matches.as_slice() {
            [] => Ok(RecoveryOutcome::NotFound),
            [only] => {
                let entry = only.clone();
                self.restore_contiguous(&entry, requested)?;
                Ok(RecoveryOutcome::RecoveredWithHash)
            }
            _ => Ok(RecoveryOutcome::Ambiguous),
        }
    }

    /// Non-contiguous undelete: the chain may be scattered, so search ordered
    /// selections of unreferenced clusters whose concatenation hashes to
    /// `digest`. The first cluster is pinned to the entry's stored starting
    /// cluster, since the entry's cluster field is never rewritten.
    pub fn undelete_scattered(
        &mut self,
        requested: &str,
        digest: &[u8; SHA1_LEN],
    ) -> LazarusResult<RecoveryOutcome> {
        check_requested_name(requested)?;
        let candidates = self.deleted_file_candidates(requested)?;
        if candidates.is_empty() {
            return Ok(RecoveryOutcome::NotFound);
        }
        let pool = self.unreferenced_clusters()?;
        debug!("searching over {} unreferenced cluster(s)", pool.len());

        for entry in candidates {
            if entry.file_size == 0 {
                if *digest == sha1_of(&[]) {
                    self.restore_name(&entry, requested)?;
                    return Ok(RecoveryOutcome::RecoveredWithHash);
                }
                continue;
            }

            let start = entry.first_cluster();
            if start < 2 || start >= self.boot.max_cluster() {
                continue;
            }
            let cluster_count = self.cluster_count(entry.file_size);
            if cluster_count > MAX_SEARCH_CLUSTERS {
                debug!(
                    "skipping {}-cluster candidate at {:#x}: beyond the search cap",
                    cluster_count, entry.offset
                );
                continue;
            }

            if let Some(found) =
                self.search_chain(start, cluster_count, entry.file_size, &pool, digest)?
            {
                fat::write_chain(self.image, &self.boot, &found)?;
                self.restore_name(&entry, requested)?;
                info!("recovered scattered chain {:?}", found);
                return Ok(RecoveryOutcome::RecoveredWithHash);
            }
        }
        Ok(RecoveryOutcome::NotFound)
    }

    /// Deleted, name-matching regular files in the root directory.
    fn deleted_file_candidates(&self, requested: &str) -> LazarusResult<Vec<DirEntry>> {
        let root_chain = chain::walk_chain(&*self.image, &self.boot, self.boot.root_cluster)?;
        let mut candidates = Vec::new();
        for scanned in DirectoryScanner::new(&*self.image, &self.boot, &root_chain) {
            let scanned = scanned?;
            if scanned.kind != EntryKind::File {
                continue;
            }
            if scanned.entry.is_deleted() && scanned.entry.name_matches_ignoring_first(requested) {
                candidates.push(scanned.entry);
            }
        }
        Ok(candidates)
    }

    fn cluster_count(&self, file_size: u32) -> usize {
        let cluster_size = self.boot.cluster_size() as u64;
        ((file_size as u64 + cluster_size - 1) / cluster_size) as usize
    }

    /// Restore the overwritten first name byte.
    fn restore_name(&mut self, entry: &DirEntry, requested: &str) -> LazarusResult<()> {
        info!(
            "restoring entry at {:#x} as {}",
            entry.offset, requested
        );
        self.image.write_u8_at(entry.offset, requested.as_bytes()[0])
    }

    /// Rename plus, for non-empty files, a contiguous chain rebuild starting
    /// at the entry's stored cluster. Zero-size files own no cluster, so the
    /// FAT is untouched.
    fn restore_contiguous(&mut self, entry: &DirEntry, requested: &str) -> LazarusResult<()> {
        if entry.file_size > 0 {
            let start = entry.first_cluster();
            let count = self.cluster_count(entry.file_size) as u32;
            let rebuilt: Vec<u32> = (start..start + count).collect();
            fat::write_chain(self.image, &self.boot, &rebuilt)?;
        }
        self.restore_name(entry, requested)
    }

    /// Hash the `file_size` bytes at the entry's assumed-contiguous data
    /// region. A candidate whose data would fall outside the image cannot
    /// match.
    fn contiguous_content_matches(
        &self,
        entry: &DirEntry,
        digest: &[u8; SHA1_LEN],
    ) -> LazarusResult<bool> {
        if entry.file_size == 0 {
            return Ok(*digest == sha1_of(&[]));
        }
        let start = entry.first_cluster();
        if start < 2 {
            return Ok(false);
        }
        let offset = self.boot.cluster_offset(start);
        match self.image.read_at(offset, entry.file_size as usize) {
            Ok(content) => Ok(sha1_of(content) == *digest),
            Err(_) => {
                debug!("candidate at {:#x} points outside the image", entry.offset);
                Ok(false)
            }
        }
    }

    /// Clusters not claimed by the root directory or any live entry's chain,
    /// capped to the search window.
    fn unreferenced_clusters(&self) -> LazarusResult<Vec<u32>> {
        let root_chain = chain::walk_chain(&*self.image, &self.boot, self.boot.root_cluster)?;
        let mut referenced: HashSet<u32> = root_chain.iter().copied().collect();

        for scanned in DirectoryScanner::new(&*self.image, &self.boot, &root_chain) {
            let scanned = scanned?;
            if scanned.entry.is_deleted() {
                continue;
            }
            let start = scanned.entry.first_cluster();
            if start < 2 || start >= self.boot.max_cluster() {
                continue;
            }
            referenced.extend(chain::walk_chain(&*self.image, &self.boot, start)?);
        }

        Ok((2..self.boot.max_cluster())
            .filter(|cluster| !referenced.contains(cluster))
            .take(MAX_SEARCH_CLUSTERS)
            .collect())
    }

    /// The bytes of `cluster` that belong to the file when it sits at chain
    /// position `index`: a full cluster everywhere but the tail.
    fn chain_chunk(
        &self,
        cluster: u32,
        index: usize,
        cluster_count: usize,
        file_size: u32,
    ) -> LazarusResult<&[u8]> {
        let cluster_size = self.boot.cluster_size() as u64;
        let size = if index + 1 == cluster_count {
            file_size as u64 - index as u64 * cluster_size
        } else {
            cluster_size
        };
        self.image.read_at(self.boot.cluster_offset(cluster), size as usize)
    }

    /// Depth-first search over ordered selections from `pool`, first cluster
    /// pinned to `start`. The hasher is cloned down each branch so a shared
    /// prefix is only ever hashed once.
    fn search_chain(
        &self,
        start: u32,
        cluster_count: usize,
        file_size: u32,
        pool: &[u32],
        digest: &[u8; SHA1_LEN],
    ) -> LazarusResult<Option<Vec<u32>>> {
        let mut hasher = Sha1::new();
        match self.chain_chunk(start, 0, cluster_count, file_size) {
            Ok(chunk) => hasher.update(chunk),
            Err(_) => return Ok(None),
        }
        if cluster_count == 1 {
            let matched = hasher.finalize().as_slice() == digest.as_slice();
            return Ok(matched.then(|| vec![start]));
        }

        let mut path = vec![start];
        if self.extend_path(&mut path, hasher, cluster_count, file_size, pool, digest)? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }

    fn extend_path(
        &self,
        path: &mut Vec<u32>,
        hasher: Sha1,
        cluster_count: usize,
        file_size: u32,
        pool: &[u32],
        digest: &[u8; SHA1_LEN],
    ) -> LazarusResult<bool> {
        let depth = path.len();
        for &candidate in pool {
            if path.contains(&candidate) {
                continue;
            }
            let mut branch = hasher.clone();
            match self.chain_chunk(candidate, depth, cluster_count, file_size) {
                Ok(chunk) => branch.update(chunk),
                Err(_) => continue,
            }

            if depth + 1 == cluster_count {
                if branch.finalize().as_slice() == digest.as_slice() {
                    path.push(candidate);
                    return Ok(true);
                }
            } else {
                path.push(candidate);
                if self.extend_path(path, branch, cluster_count, file_size, pool, digest)? {
                    return Ok(true);
                }
                path.pop();
            }
        }
        Ok(false)
    }
}

fn check_requested_name(requested: &str) -> LazarusResult<()> {
    if requested.is_empty() {
        return Err(LazarusError::InvalidInput(
            "the filename to recover cannot be empty".to_string(),
        ));
    }
    Ok(())
}
