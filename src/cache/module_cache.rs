use super::eviction::CompatibilityCriteria;
use super::file_cache::FileCache;
use super::hashing::{hash_file, HashKind};
use crate::archive::{validate_zip, ArchiveValidation};
use crate::registry::{Package, Registry};
use crate::{Error, Result};

use reqwest::Url;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why a downloaded file was refused by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionFailure {
    Missing,
    SizeMismatch { expected: u64, actual: u64 },
    InvalidArchive { entry: Option<String>, reason: String },
    Sha1Mismatch { expected: String, actual: String },
    Sha256Mismatch { expected: String, actual: String },
    /// The package has no download URL to key the file on.
    NoDownload,
}

impl fmt::Display for AdmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionFailure::Missing => f.write_str("file not found"),
            AdmissionFailure::SizeMismatch { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
            AdmissionFailure::InvalidArchive {
                entry: Some(entry),
                reason,
            } => write!(f, "invalid zip ({}: {})", entry, reason),
            AdmissionFailure::InvalidArchive {
                entry: None,
                reason,
            } => write!(f, "invalid zip ({})", reason),
            AdmissionFailure::Sha1Mismatch { expected, actual } => {
                write!(f, "SHA1 mismatch, expected {}, got {}", expected, actual)
            }
            AdmissionFailure::Sha256Mismatch { expected, actual } => {
                write!(f, "SHA256 mismatch, expected {}, got {}", expected, actual)
            }
            AdmissionFailure::NoDownload => f.write_str("package has no download URL"),
        }
    }
}

#[derive(Debug, Default)]
struct VerifiedHashes {
    sha1: Option<String>,
    sha256: Option<String>,
}

/// A [`FileCache`] keyed by packages.
///
/// Packages are looked up by their first download URL. Files are only
/// admitted after their size, archive and declared hashes check out.
#[derive(Debug)]
pub struct ModuleCache {
    cache: FileCache,
}

impl ModuleCache {
    pub fn new(cache: FileCache) -> Self {
        Self { cache }
    }

    pub fn file_cache(&self) -> &FileCache {
        &self.cache
    }

    pub fn is_cached(&self, package: &Package) -> bool {
        primary_url(package).is_some_and(|url| self.cache.is_cached(url))
    }

    /// Present and not older than the package's release date.
    pub fn is_maybe_cached_zip(&self, package: &Package) -> bool {
        primary_url(package)
            .is_some_and(|url| self.cache.is_maybe_cached_zip(url, package.release_date))
    }

    pub fn get_cached_filename(&self, package: &Package) -> Option<PathBuf> {
        primary_url(package).and_then(|url| self.cache.get_cached_filename(url, None))
    }

    pub fn get_cached_zip(&self, package: &Package) -> Result<Option<PathBuf>> {
        match primary_url(package) {
            Some(url) => self.cache.get_cached_zip(url),
            None => Ok(None),
        }
    }

    /// Checks that `path` is an acceptable download of `package` without
    /// touching the cache.
    pub fn check_admission(
        &self,
        package: &Arc<Package>,
        path: &Path,
        progress: &mut dyn FnMut(u8),
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.verify(package, path, progress, cancel).map(|_| ())
    }

    /// Validates `path` against `package` and, if it passes, moves or copies
    /// it into the cache under the package's standard name.
    ///
    /// `progress` receives 0-60 during archive validation, 60-80 while
    /// hashing SHA-1 and 80-100 while hashing SHA-256. A failed check leaves
    /// the cache untouched and returns [`Error::CacheAdmission`].
    pub fn store(
        &self,
        package: &Arc<Package>,
        path: &Path,
        progress: &mut dyn FnMut(u8),
        cancel: Option<&CancellationToken>,
        move_file: bool,
    ) -> Result<PathBuf> {
        let Some(url) = primary_url(package) else {
            return Err(rejected(package, path, AdmissionFailure::NoDownload));
        };
        let hashes = self.verify(package, path, progress, cancel)?;

        let stored = self
            .cache
            .store(url, path, Some(&package.standard_name()), move_file)?;
        if let Some(sha1) = &hashes.sha1 {
            self.cache.remember_hash(&stored, HashKind::Sha1, sha1);
        }
        if let Some(sha256) = &hashes.sha256 {
            self.cache.remember_hash(&stored, HashKind::Sha256, sha256);
        }

        info!("Cached {} as {}", package, stored.display());
        Ok(stored)
    }

    pub fn remove(&self, package: &Package) -> Result<bool> {
        match primary_url(package) {
            Some(url) => self.cache.remove(url),
            None => Ok(false),
        }
    }

    pub fn enforce_size_limit(
        &self,
        limit: u64,
        registry: &dyn Registry,
        criteria: &[&dyn CompatibilityCriteria],
    ) -> Result<Vec<PathBuf>> {
        self.cache.enforce_size_limit(limit, registry, criteria)
    }

    fn verify(
        &self,
        package: &Arc<Package>,
        path: &Path,
        progress: &mut dyn FnMut(u8),
        cancel: Option<&CancellationToken>,
    ) -> Result<VerifiedHashes> {
        let metadata = match fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            _ => return Err(rejected(package, path, AdmissionFailure::Missing)),
        };

        if package.download_size > 0 && metadata.len() != package.download_size {
            return Err(rejected(
                package,
                path,
                AdmissionFailure::SizeMismatch {
                    expected: package.download_size,
                    actual: metadata.len(),
                },
            ));
        }

        let validation = validate_zip(path, &mut |p| progress(scale(p, 0, 60)), cancel)?;
        if let ArchiveValidation::Invalid { entry, reason } = validation {
            return Err(rejected(
                package,
                path,
                AdmissionFailure::InvalidArchive { entry, reason },
            ));
        }
        check_cancel(cancel)?;

        let mut hashes = VerifiedHashes::default();
        if let Some(expected) = &package.sha1 {
            let actual = hash_file(path, HashKind::Sha1, &mut |p| progress(scale(p, 60, 80)))?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(rejected(
                    package,
                    path,
                    AdmissionFailure::Sha1Mismatch {
                        expected: expected.clone(),
                        actual,
                    },
                ));
            }
            hashes.sha1 = Some(actual);
        }
        progress(80);
        check_cancel(cancel)?;

        if let Some(expected) = &package.sha256 {
            let actual =
                hash_file(path, HashKind::Sha256, &mut |p| progress(scale(p, 80, 100)))?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(rejected(
                    package,
                    path,
                    AdmissionFailure::Sha256Mismatch {
                        expected: expected.clone(),
                        actual,
                    },
                ));
            }
            hashes.sha256 = Some(actual);
        }
        progress(100);

        debug!("{} passed admission checks for {}", path.display(), package);
        Ok(hashes)
    }
}

fn primary_url(package: &Package) -> Option<&Url> {
    package.download.first()
}

fn rejected(package: &Arc<Package>, path: &Path, reason: AdmissionFailure) -> Error {
    Error::CacheAdmission {
        package: package.clone(),
        path: path.to_path_buf(),
        reason,
    }
}

fn check_cancel(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Maps a 0-100 percentage into `from..to`.
fn scale(percent: u8, from: u8, to: u8) -> u8 {
    from + ((to - from) as u16 * percent.min(100) as u16 / 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale() {
        assert_eq!(scale(0, 0, 60), 0);
        assert_eq!(scale(50, 0, 60), 30);
        assert_eq!(scale(100, 60, 80), 80);
        assert_eq!(scale(100, 80, 100), 100);
    }

    #[test]
    fn test_admission_failure_display() {
        let failure = AdmissionFailure::SizeMismatch {
            expected: 10,
            actual: 4,
        };
        assert_eq!(failure.to_string(), "expected 10 bytes, got 4");
    }

    #[test]
    fn test_package_without_download_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModuleCache::new(FileCache::new(dir.path()).unwrap());
        let package = Arc::new(Package::new("NoDownload", "1.0"));
        assert!(!cache.is_cached(&package));
        assert!(matches!(
            cache.store(&package, dir.path(), &mut |_| {}, None, false),
            Err(Error::CacheAdmission {
                reason: AdmissionFailure::NoDownload,
                ..
            })
        ));
    }
}
