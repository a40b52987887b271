//! Downloading packages into the cache.
//!
//! [`ModuleDownloader`] turns packages into download targets, skips what is
//! already cached, and admits every finished download to a [`ModuleCache`]
//! before the batch counts it as a success.

use super::builder::DownloaderBuilder;
use super::downloader::Downloader;
use crate::cache::ModuleCache;
use crate::download::{DownloadTarget, Sink, Status};
use crate::error::{Error, FetchError, Result};
use crate::registry::Package;
use crate::report::Reporter;
use crate::utils::PreferredHostComparator;

use indicatif::HumanBytes;
use parking_lot::Mutex;
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Packages waiting for a download, keyed by the partial file they share.
type Pending = Arc<Mutex<HashMap<PathBuf, Vec<Arc<Package>>>>>;

/// Downloads packages and stores them in a [`ModuleCache`].
pub struct ModuleDownloader {
    downloader: Downloader,
    cache: Arc<ModuleCache>,
    pending: Pending,
    preferred_hosts: PreferredHostComparator,
    cache_limit: Option<u64>,
    reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for ModuleDownloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDownloader")
            .field("downloader", &self.downloader)
            .field("preferred_hosts", &self.preferred_hosts)
            .field("cache_limit", &self.cache_limit)
            .finish()
    }
}

impl ModuleDownloader {
    /// Builds the underlying [`Downloader`] from `builder`, installing a
    /// completion callback that admits each download to `cache`.
    pub fn new(builder: DownloaderBuilder, cache: Arc<ModuleCache>) -> Result<Self> {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reporter = builder.configured_reporter();

        let store_cache = cache.clone();
        let store_pending = pending.clone();
        let store_reporter = reporter.clone();
        let downloader = builder
            .on_complete(move |summary| {
                if *summary.status() != Status::Success {
                    return Ok(());
                }
                let Some(path) = summary.target().sink.path() else {
                    return Ok(());
                };
                let package = store_pending
                    .lock()
                    .get(path)
                    .and_then(|packages| packages.first().cloned());
                let Some(package) = package else {
                    return Ok(());
                };

                store_reporter.message(format_args!("Validating {}", package));
                match store_cache.store(&package, path, &mut |_| {}, None, true) {
                    Ok(stored) => {
                        debug!("{} admitted as {}", package, stored.display());
                        Ok(())
                    }
                    Err(e) => {
                        warn!("{} was not admitted to the cache: {}", package, e);
                        if let Err(e) = fs::remove_file(path) {
                            debug!("Could not remove {}: {}", path.display(), e);
                        }
                        Err(FetchError::Rejected(e.to_string()))
                    }
                }
            })
            .build()?;

        Ok(Self {
            downloader,
            cache,
            pending,
            preferred_hosts: PreferredHostComparator::default(),
            cache_limit: None,
            reporter,
        })
    }

    /// Order mirrors by host, see [`PreferredHostComparator`].
    pub fn with_preferred_hosts(mut self, hosts: Vec<Option<String>>) -> Self {
        self.preferred_hosts = PreferredHostComparator::new(hosts);
        self
    }

    /// Ask before starting a batch larger than `bytes`.
    pub fn with_cache_limit(mut self, bytes: u64) -> Self {
        self.cache_limit = Some(bytes);
        self
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Downloads every package that is not cached yet.
    ///
    /// Packages sharing a download URL share one transfer. Failures are
    /// reported per package as [`Error::ModuleDownload`].
    pub async fn download_modules(&self, packages: &[Arc<Package>]) -> Result<()> {
        let mut groups: Vec<(PathBuf, Vec<Arc<Package>>)> = Vec::new();
        let mut group_of: HashMap<Url, usize> = HashMap::new();

        for package in packages {
            if self.cache.is_maybe_cached_zip(package) {
                debug!("{} is already cached", package);
                continue;
            }
            let Some(url) = package.download.first() else {
                warn!("{} has no download URL, skipping", package);
                continue;
            };
            match group_of.get(url) {
                Some(&index) => groups[index].1.push(package.clone()),
                None => {
                    let sink = self
                        .cache
                        .file_cache()
                        .in_progress_path(url, &package.standard_name());
                    group_of.insert(url.clone(), groups.len());
                    groups.push((sink, vec![package.clone()]));
                }
            }
        }
        if groups.is_empty() {
            return Ok(());
        }

        let total: u64 = groups
            .iter()
            .filter_map(|(_, packages)| packages.first())
            .map(|p| p.download_size)
            .sum();
        if let Some(limit) = self.cache_limit {
            if total > limit {
                let prompt = format!(
                    "These downloads need {}, more than the cache limit of {}. Continue?",
                    HumanBytes(total),
                    HumanBytes(limit)
                );
                if !self.reporter.confirm(&prompt) {
                    info!("Download of {} modules declined", groups.len());
                    return Err(Error::Cancelled);
                }
            }
        }

        let mut targets = Vec::with_capacity(groups.len());
        for (sink, packages) in &groups {
            targets.push(self.target_for(sink, packages)?);
        }

        self.pending.lock().extend(groups.iter().cloned());
        info!("Downloading {} modules", groups.len());
        let result = self.downloader.download_and_wait(targets).await;
        {
            let mut pending = self.pending.lock();
            for (sink, _) in &groups {
                pending.remove(sink);
            }
        }

        match result {
            Err(Error::Download(errors)) => {
                let by_sink: HashMap<&Path, &Vec<Arc<Package>>> = groups
                    .iter()
                    .map(|(sink, packages)| (sink.as_path(), packages))
                    .collect();
                let failures = errors
                    .failures
                    .into_iter()
                    .flat_map(|(target, error)| {
                        target
                            .sink
                            .path()
                            .and_then(|path| by_sink.get(path))
                            .map(|packages| packages.to_vec())
                            .unwrap_or_default()
                            .into_iter()
                            .map(move |package| (package, error.clone()))
                    })
                    .collect();
                Err(Error::ModuleDownload(failures))
            }
            other => other,
        }
    }

    fn target_for(&self, sink: &Path, packages: &[Arc<Package>]) -> Result<DownloadTarget> {
        let mut seen = HashSet::new();
        let mut urls: Vec<Url> = packages
            .iter()
            .flat_map(|p| p.download.iter().cloned())
            .filter(|url| seen.insert(url.clone()))
            .collect();
        self.preferred_hosts.sort(&mut urls);

        let mut target = DownloadTarget::new(urls, Sink::File(sink.to_path_buf()))?;
        if let Some(first) = packages.first() {
            target = target.with_size(first.download_size);
            if let Some(mime) = &first.download_content_type {
                target = target.with_mime_type(mime);
            }
        }
        Ok(target)
    }

    /// Cancels the running batch.
    pub fn cancel(&self) {
        self.downloader.cancel();
    }
}
