//! Size-bounded eviction.
//!
//! Files are deleted in order of how little they are likely to be needed:
//! files no known package downloads from go first, then files whose packages
//! are all incompatible, then everything else. Within each group the oldest
//! file goes first.

use super::file_cache::{hash_of, FileCache};
use crate::registry::{Package, Registry};
use crate::Result;

use std::fs::Metadata;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Decides whether a package is usable by a game instance.
pub trait CompatibilityCriteria {
    fn is_compatible(&self, package: &Package) -> bool;
}

impl<F> CompatibilityCriteria for F
where
    F: Fn(&Package) -> bool,
{
    fn is_compatible(&self, package: &Package) -> bool {
        self(package)
    }
}

impl FileCache {
    /// Deletes files until the cache holds at most `limit` bytes.
    ///
    /// A package counts as compatible if any of `criteria` accepts it.
    /// Returns the deleted paths in deletion order.
    pub fn enforce_size_limit(
        &self,
        limit: u64,
        registry: &dyn Registry,
        criteria: &[&dyn CompatibilityCriteria],
    ) -> Result<Vec<PathBuf>> {
        let files = self.all_files();
        let mut total: u64 = files.iter().map(|(_, m)| m.len()).sum();
        if total <= limit {
            return Ok(Vec::new());
        }
        info!("Cache holds {} bytes, limit is {}", total, limit);

        let index = registry.hash_index();
        let mut ranked: Vec<(u8, SystemTime, PathBuf, u64)> = files
            .into_iter()
            .map(|(path, metadata)| {
                let packages = hash_of(&path).and_then(|h| index.get(&h));
                let rank = match packages {
                    Some(packages) if !packages.is_empty() => {
                        let compatible = packages
                            .iter()
                            .any(|p| criteria.iter().any(|c| c.is_compatible(p)));
                        if compatible {
                            2
                        } else {
                            1
                        }
                    }
                    _ => 0,
                };
                (rank, age_of(&metadata), path, metadata.len())
            })
            .collect();
        ranked.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut removed = Vec::new();
        for (rank, _, path, len) in ranked {
            if total <= limit {
                break;
            }
            debug!("Evicting {} (rank {})", path.display(), rank);
            match self.remove_with_sidecars(&path) {
                Ok(()) => {
                    total = total.saturating_sub(len);
                    removed.push(path);
                }
                Err(e) => warn!("Failed to evict {}: {}", path.display(), e),
            }
        }

        self.notify_changed();
        self.clear_memo();
        info!("Evicted {} files", removed.len());
        Ok(removed)
    }
}

fn age_of(metadata: &Metadata) -> SystemTime {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
