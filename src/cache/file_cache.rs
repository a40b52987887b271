use super::hashing::{
    hash_file, is_cache_file_name, sanitize_description, sidecar_path, url_hash, HashKind,
    URL_HASH_LEN,
};
use super::index::{CacheIndex, IndexEntries};
use crate::archive::validate_zip;
use crate::{Error, Result};

use parking_lot::Mutex;
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Name of the directory holding partial downloads.
pub const IN_PROGRESS_DIR: &str = "downloading";

/// A directory of downloaded files addressed by the hash of their URL.
///
/// Files are named `{hash}-{description}`. Content hashes are memoized in
/// `{file}.sha1` / `{file}.sha256` sidecars and in memory.
#[derive(Debug)]
pub struct FileCache {
    root: PathBuf,
    legacy_dirs: Vec<PathBuf>,
    index: CacheIndex,
    memo: Mutex<HashMap<(PathBuf, HashKind), String>>,
}

impl FileCache {
    /// Opens the cache at `root`, which must exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::CacheDirectoryNotFound(root));
        }
        fs::create_dir_all(root.join(IN_PROGRESS_DIR))?;
        debug!("Opened cache at {}", root.display());
        Ok(Self {
            root,
            legacy_dirs: Vec::new(),
            index: CacheIndex::new(),
            memo: Mutex::new(HashMap::new()),
        })
    }

    /// Additional read-only directories searched after the root.
    pub fn with_legacy_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.legacy_dirs = dirs;
        self.index.invalidate();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn legacy_dirs(&self) -> &[PathBuf] {
        &self.legacy_dirs
    }

    pub fn in_progress_dir(&self) -> PathBuf {
        self.root.join(IN_PROGRESS_DIR)
    }

    /// Tell the cache its directories changed behind its back.
    pub fn notify_changed(&self) {
        self.index.invalidate();
    }

    pub fn generation(&self) -> u64 {
        self.index.generation()
    }

    fn entries(&self) -> IndexEntries {
        self.index.entries(|| self.scan())
    }

    fn scan(&self) -> HashMap<String, PathBuf> {
        let mut entries = HashMap::new();
        for dir in std::iter::once(&self.root).chain(&self.legacy_dirs) {
            for path in cache_files(dir) {
                if let Some(hash) = hash_of(&path) {
                    // The root is scanned first and wins
                    entries.entry(hash).or_insert(path);
                }
            }
        }
        entries
    }

    /// The cached file for `url`, if any.
    ///
    /// With a `remote_timestamp`, a file older than it is stale: it is deleted
    /// along with its sidecars and `None` is returned.
    pub fn get_cached_filename(
        &self,
        url: &Url,
        remote_timestamp: Option<SystemTime>,
    ) -> Option<PathBuf> {
        let path = self.entries().get(&url_hash(url)).cloned()?;
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(_) => {
                self.notify_changed();
                return None;
            }
        };

        if let Some(remote) = remote_timestamp {
            let stale = metadata.modified().map(|m| remote > m).unwrap_or(false);
            if stale {
                info!("{} is older than the remote copy, purging", path.display());
                if let Err(e) = self.remove_with_sidecars(&path) {
                    warn!("Failed to purge {}: {}", path.display(), e);
                }
                self.notify_changed();
                return None;
            }
        }
        Some(path)
    }

    pub fn is_cached(&self, url: &Url) -> bool {
        self.get_cached_filename(url, None).is_some()
    }

    /// Whether a file for `url` is present and not stale. The archive is not
    /// validated.
    pub fn is_maybe_cached_zip(&self, url: &Url, remote_timestamp: Option<SystemTime>) -> bool {
        self.get_cached_filename(url, remote_timestamp).is_some()
    }

    /// The cached file for `url` if it is a valid zip. An invalid file is
    /// purged.
    pub fn get_cached_zip(&self, url: &Url) -> Result<Option<PathBuf>> {
        let Some(path) = self.get_cached_filename(url, None) else {
            return Ok(None);
        };
        let validation = validate_zip(&path, &mut |_| {}, None)?;
        if validation.is_valid() {
            return Ok(Some(path));
        }

        warn!("Purging invalid cached archive {}: {}", path.display(), validation);
        self.remove_with_sidecars(&path)?;
        self.notify_changed();
        Ok(None)
    }

    /// Puts `source` into the cache as the file for `url`, replacing any
    /// previous entry. `description` defaults to the URL's file name.
    pub fn store(
        &self,
        url: &Url,
        source: &Path,
        description: Option<&str>,
        move_file: bool,
    ) -> Result<PathBuf> {
        self.remove(url)?;

        let description = match description {
            Some(d) => d.to_string(),
            None => url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .unwrap_or_default()
                .to_string(),
        };
        let target = self
            .root
            .join(format!("{}-{}", url_hash(url), sanitize_description(&description)));

        if move_file {
            if fs::rename(source, &target).is_err() {
                // Across filesystems
                fs::copy(source, &target)?;
                fs::remove_file(source)?;
            }
        } else {
            fs::copy(source, &target)?;
        }

        debug!("Stored {} as {}", url, target.display());
        self.notify_changed();
        Ok(target)
    }

    /// Removes the entry for `url`. Returns whether there was one.
    pub fn remove(&self, url: &Url) -> Result<bool> {
        match self.get_cached_filename(url, None) {
            Some(path) => {
                self.remove_with_sidecars(&path)?;
                self.notify_changed();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deletes every file in the cache directories, partial downloads
    /// included. Returns the number of files removed.
    pub fn remove_all(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in self.all_dirs() {
            for path in plain_files(&dir) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        self.memo.lock().clear();
        self.notify_changed();
        info!("Removed {} files from the cache", removed);
        Ok(removed)
    }

    /// Migrates cache files from another directory. Files whose URL hash is
    /// already cached are deleted instead. Returns the number moved.
    pub fn move_from(&self, dir: &Path) -> Result<usize> {
        let mut known: HashSet<String> = self.entries().keys().cloned().collect();
        let mut moved = 0;

        for path in cache_files(dir) {
            let (Some(hash), Some(name)) = (hash_of(&path), path.file_name()) else {
                continue;
            };
            let sidecars = [HashKind::Sha1, HashKind::Sha256].map(|k| sidecar_path(&path, k));

            if known.insert(hash) {
                let target = self.root.join(name);
                move_file(&path, &target)?;
                for (kind, sidecar) in [HashKind::Sha1, HashKind::Sha256].iter().zip(&sidecars) {
                    if sidecar.exists() {
                        move_file(sidecar, &sidecar_path(&target, *kind))?;
                    }
                }
                moved += 1;
            } else {
                debug!("{} is already cached, deleting", path.display());
                fs::remove_file(&path)?;
                for sidecar in &sidecars {
                    remove_if_exists(sidecar)?;
                }
            }
        }

        self.notify_changed();
        info!("Moved {} files from {}", moved, dir.display());
        Ok(moved)
    }

    /// Number and total size of the cached files.
    pub fn size_info(&self) -> (usize, u64) {
        self.entries()
            .values()
            .filter_map(|path| fs::metadata(path).ok())
            .fold((0, 0), |(count, bytes), m| (count + 1, bytes + m.len()))
    }

    /// Where a partial download of `url` lives. An existing partial with the
    /// same URL hash is reused whatever its description.
    pub fn in_progress_path(&self, url: &Url, description: &str) -> PathBuf {
        let hash = url_hash(url);
        let dir = self.in_progress_dir();
        cache_files(&dir)
            .into_iter()
            .find(|path| hash_of(path).as_deref() == Some(hash.as_str()))
            .unwrap_or_else(|| dir.join(format!("{}-{}", hash, sanitize_description(description))))
    }

    /// SHA-1 of a file as upper-case hex, memoized in a sidecar.
    pub fn file_sha1(&self, path: &Path, progress: &mut dyn FnMut(u8)) -> Result<String> {
        self.file_hash(path, HashKind::Sha1, progress)
    }

    /// SHA-256 of a file as upper-case hex, memoized in a sidecar.
    pub fn file_sha256(&self, path: &Path, progress: &mut dyn FnMut(u8)) -> Result<String> {
        self.file_hash(path, HashKind::Sha256, progress)
    }

    fn file_hash(
        &self,
        path: &Path,
        kind: HashKind,
        progress: &mut dyn FnMut(u8),
    ) -> Result<String> {
        let key = (path.to_path_buf(), kind);
        if let Some(hash) = self.memo.lock().get(&key) {
            progress(100);
            return Ok(hash.clone());
        }

        let sidecar = sidecar_path(path, kind);
        if let Ok(stored) = fs::read_to_string(&sidecar) {
            let stored = stored.trim().to_ascii_uppercase();
            if !stored.is_empty() {
                progress(100);
                self.memo.lock().insert(key, stored.clone());
                return Ok(stored);
            }
        }

        let hash = hash_file(path, kind, progress)?;
        self.remember_hash(path, kind, &hash);
        Ok(hash)
    }

    /// Records a known hash for a cached file.
    pub(crate) fn remember_hash(&self, path: &Path, kind: HashKind, hash: &str) {
        if let Err(e) = fs::write(sidecar_path(path, kind), hash) {
            warn!("Failed to write {} sidecar for {}: {}", kind.extension(), path.display(), e);
        }
        self.memo
            .lock()
            .insert((path.to_path_buf(), kind), hash.to_string());
    }

    pub(crate) fn clear_memo(&self) {
        self.memo.lock().clear();
    }

    /// Deletes a file with its sidecars and forgets its hashes.
    pub(crate) fn remove_with_sidecars(&self, path: &Path) -> io::Result<()> {
        remove_if_exists(path)?;
        for kind in [HashKind::Sha1, HashKind::Sha256] {
            remove_if_exists(&sidecar_path(path, kind))?;
            self.memo.lock().remove(&(path.to_path_buf(), kind));
        }
        Ok(())
    }

    fn all_dirs(&self) -> Vec<PathBuf> {
        std::iter::once(self.root.clone())
            .chain(self.legacy_dirs.iter().cloned())
            .chain(std::iter::once(self.in_progress_dir()))
            .collect()
    }

    /// Every cache file, partial downloads included, with its metadata.
    pub(crate) fn all_files(&self) -> Vec<(PathBuf, Metadata)> {
        self.all_dirs()
            .iter()
            .flat_map(|dir| cache_files(dir))
            .filter_map(|path| fs::metadata(&path).ok().map(|m| (path, m)))
            .collect()
    }
}

/// The URL hash a cache file name starts with.
pub(crate) fn hash_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    is_cache_file_name(name).then(|| name[..URL_HASH_LEN].to_string())
}

fn plain_files(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn cache_files(dir: &Path) -> Vec<PathBuf> {
    plain_files(dir)
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_cache_file_name)
        })
        .collect()
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
