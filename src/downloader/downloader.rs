//! Batch orchestration.
//!
//! A [`Downloader`] runs one batch at a time. Each target becomes a
//! [`DownloadPart`] stored in an arena keyed by [`PartId`]. At most one part
//! per host runs at a time; the others wait in a queue and are started as
//! soon as their host frees up. A failing part moves on to its next mirror
//! before it is reported as failed.
//!
//! All batch state lives behind a single lock that is never held across an
//! await. Completion callbacks run on the blocking pool, outside the lock.
//!
//! # Examples
//!
//! ```rust,no_run
//! use modcore::downloader::DownloaderBuilder;
//! use modcore::download::DownloadTarget;
//! use std::convert::TryFrom;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = DownloaderBuilder::new().directory("./downloads".into()).build()?;
//! let targets = vec![
//!     DownloadTarget::try_from("https://example.com/file1.zip")?,
//!     DownloadTarget::try_from("https://example.org/file2.zip")?,
//! ];
//!
//! downloader.download_and_wait(targets).await?;
//! # Ok(())
//! # }
//! ```

use super::config::DownloaderConfig;
use crate::download::{DownloadPart, DownloadTarget, PartId, PartState, Status, Summary};
use crate::error::{DownloadErrors, Error, FetchError, Result};
use crate::http::{FetchRequest, ProgressFn, Transport};
use crate::progress::percent_of;

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Represents the download controller.
///
/// Cloning is cheap; clones share the same batch.
#[derive(Clone)]
pub struct Downloader {
    inner: Arc<Inner>,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.inner.config)
            .field("running", &self.is_running())
            .finish()
    }
}

struct Inner {
    config: DownloaderConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<BatchState>,
}

/// How a batch ended.
#[derive(Debug)]
struct BatchOutcome {
    cancelled: bool,
    failures: Vec<(DownloadTarget, FetchError)>,
}

struct BatchState {
    parts: HashMap<PartId, DownloadPart>,
    /// Admission order, for reporting.
    order: Vec<PartId>,
    queue: VecDeque<PartId>,
    completed: usize,
    running: bool,
    cancelled: bool,
    /// Never reset, so ids stay unique across batches.
    next_id: u64,
    cancel: CancellationToken,
    done: watch::Sender<Option<Arc<BatchOutcome>>>,
}

type Start = (PartId, FetchRequest);

impl BatchState {
    fn new() -> Self {
        Self {
            parts: HashMap::new(),
            order: Vec::new(),
            queue: VecDeque::new(),
            completed: 0,
            running: false,
            cancelled: false,
            next_id: 0,
            cancel: CancellationToken::new(),
            done: watch::channel(None).0,
        }
    }

    /// Forget the previous batch.
    fn reset(&mut self) {
        self.parts.clear();
        self.order.clear();
        self.queue.clear();
        self.completed = 0;
        self.cancelled = false;
        self.cancel = CancellationToken::new();
        self.done = watch::channel(None).0;
    }

    fn insert(&mut self, target: DownloadTarget, interval: Duration) -> PartId {
        let id = PartId(self.next_id);
        self.next_id += 1;
        self.parts.insert(id, DownloadPart::new(id, target, interval));
        self.order.push(id);
        id
    }

    fn host_busy(&self, id: PartId, host: &Option<String>) -> bool {
        host.is_some()
            && self
                .parts
                .values()
                .any(|p| p.id != id && p.state == PartState::Running && &p.host() == host)
    }

    /// Start the part if no other part runs against its host, queue it
    /// otherwise.
    fn admit(&mut self, id: PartId, config: &DownloaderConfig) -> Option<Start> {
        let host = self.parts.get(&id)?.host();
        let busy = self.host_busy(id, &host);
        let part = self.parts.get_mut(&id)?;
        if busy {
            debug!("Queueing {} behind another download from {:?}", id, host);
            part.state = PartState::Queued;
            self.queue.push_back(id);
            None
        } else {
            part.state = PartState::Running;
            Some((id, request_for(part, config)))
        }
    }

    /// Start the first part queued for `host`.
    fn start_next(&mut self, host: &Option<String>, config: &DownloaderConfig) -> Option<Start> {
        if self.cancelled {
            return None;
        }
        let position = self
            .queue
            .iter()
            .position(|id| self.parts.get(id).is_some_and(|p| &p.host() == host))?;
        let id = self.queue.remove(position)?;
        let part = self.parts.get_mut(&id)?;
        part.state = PartState::Running;
        Some((id, request_for(part, config)))
    }

    /// Moves a failed part to its next mirror. Returns the parts to start,
    /// or `None` when the failure is final.
    fn fall_back(
        &mut self,
        id: PartId,
        error: &FetchError,
        config: &DownloaderConfig,
    ) -> Option<Vec<Start>> {
        if self.cancelled {
            return None;
        }
        let part = self.parts.get_mut(&id)?;
        let old_host = part.host();
        let failed_url = part.current_url().clone();
        if !part.advance_mirror() {
            return None;
        }
        warn!(
            "{} failed ({}), trying mirror {}",
            failed_url,
            error,
            part.current_url()
        );
        part.state = PartState::Queued;

        let mut starts = Vec::new();
        starts.extend(self.start_next(&old_host, config));
        starts.extend(self.admit(id, config));
        Some(starts)
    }

    /// Records the terminal status of a part and frees its host.
    fn finish(&mut self, id: PartId, status: &Status, config: &DownloaderConfig) -> Option<Start> {
        let part = self.parts.get_mut(&id)?;
        let host = part.host();
        match status {
            Status::Success => part.state = PartState::Succeeded,
            Status::Fail(error) => {
                part.state = PartState::Failed;
                part.error = Some(error.clone());
            }
            Status::Cancelled => part.state = PartState::Cancelled,
        }
        self.completed += 1;
        let next = self.start_next(&host, config);
        self.check_complete();
        next
    }

    /// Releases the waiters once every part has ended.
    fn check_complete(&mut self) {
        if !self.running || self.completed < self.parts.len() {
            return;
        }
        self.running = false;
        let failures = self
            .order
            .iter()
            .filter_map(|id| self.parts.get(id))
            .filter(|p| p.state == PartState::Failed)
            .filter_map(|p| p.error.clone().map(|e| (p.target.clone(), e)))
            .collect::<Vec<_>>();
        info!(
            "Batch finished: {} downloads, {} failed{}",
            self.parts.len(),
            failures.len(),
            if self.cancelled { ", cancelled" } else { "" }
        );
        self.done.send_replace(Some(Arc::new(BatchOutcome {
            cancelled: self.cancelled,
            failures,
        })));
    }

    /// `(percent, bytes_per_second, bytes_left)` over the whole batch.
    /// Queued parts count as entirely remaining, succeeded parts as done.
    /// Failed and cancelled parts drop out.
    fn aggregate(&self) -> (u8, u64, u64) {
        let (size, left, rate) = self.parts.values().fold((0u64, 0u64, 0u64), |acc, p| {
            match p.state {
                PartState::Queued => (acc.0 + p.size, acc.1 + p.bytes_left(), acc.2),
                PartState::Running => (
                    acc.0 + p.size,
                    acc.1 + p.bytes_left(),
                    acc.2 + p.bytes_per_second(),
                ),
                PartState::Succeeded => (acc.0 + p.size, acc.1, acc.2),
                PartState::Failed | PartState::Cancelled => acc,
            }
        });
        (percent_of(size, left), rate, left)
    }
}

fn request_for(part: &DownloadPart, config: &DownloaderConfig) -> FetchRequest {
    let auth_token = part
        .host()
        .and_then(|h| config.auth_tokens.get(&h.to_ascii_lowercase()).cloned());
    FetchRequest {
        url: part.current_url().clone(),
        sink: part.target.sink.resolve(&config.directory),
        mime_type: part.target.mime_type.clone(),
        auth_token,
    }
}

impl Inner {
    fn spawn_all(self: &Arc<Self>, starts: Vec<Start>, cancel: &CancellationToken) {
        for (id, request) in starts {
            self.spawn(id, request, cancel.clone());
        }
    }

    fn spawn(self: &Arc<Self>, id: PartId, request: FetchRequest, cancel: CancellationToken) {
        debug!("Starting {} from {}", id, request.url);
        let inner = self.clone();
        let progress_inner = self.clone();
        let progress: ProgressFn =
            Arc::new(move |received, total| progress_inner.on_part_progress(id, received, total));
        tokio::spawn(async move {
            let result = inner.transport.fetch(request, progress, cancel).await;
            inner.on_part_finished(id, result).await;
        });
    }

    fn on_part_progress(&self, id: PartId, received: u64, total: u64) {
        let (url, (percent, rate, left)) = {
            let mut state = self.state.lock();
            let Some(part) = state.parts.get_mut(&id) else {
                return;
            };
            if part.state != PartState::Running {
                return;
            }
            part.record_progress(received, total, Instant::now());
            let url = part.target.primary_url().clone();
            (url, state.aggregate())
        };

        self.config.reporter.progress(percent, rate, left);
        if let Some(ref callback) = self.config.on_progress {
            callback(&url, received, total);
        }
    }

    async fn on_part_finished(
        self: &Arc<Self>,
        id: PartId,
        result: std::result::Result<u64, FetchError>,
    ) {
        if let Err(error) = &result {
            if *error != FetchError::Cancelled {
                let fallback = {
                    let mut state = self.state.lock();
                    state
                        .fall_back(id, error, &self.config)
                        .map(|starts| (starts, state.cancel.clone()))
                };
                if let Some((starts, cancel)) = fallback {
                    self.spawn_all(starts, &cancel);
                    return;
                }
            }
        }

        let summary = {
            let state = self.state.lock();
            let Some(part) = state.parts.get(&id) else {
                return;
            };
            let size = *result.as_ref().unwrap_or(&part.bytes_received);
            let summary = Summary::new(part.target.clone(), part.current_url().clone(), size);
            match result {
                _ if state.cancelled => summary.cancelled(),
                Ok(_) => summary,
                Err(FetchError::Cancelled) => summary.cancelled(),
                Err(error) => summary.fail(error),
            }
        };
        match summary.status() {
            Status::Success => debug!("Finished {} ({} bytes)", summary.url(), summary.size()),
            Status::Fail(e) => warn!("Failed {}: {}", summary.url(), e),
            Status::Cancelled => debug!("Cancelled {}", summary.url()),
        }

        let status = self.run_callback(summary).await;

        let (next, cancel) = {
            let mut state = self.state.lock();
            let next = state.finish(id, &status, &self.config);
            (next, state.cancel.clone())
        };
        self.spawn_all(next.into_iter().collect(), &cancel);
    }

    /// Runs the completion callback, which may turn a success into a failure.
    async fn run_callback(&self, summary: Summary) -> Status {
        let status = summary.status().clone();
        let Some(callback) = self.config.on_complete.clone() else {
            return status;
        };

        let verdict = tokio::task::spawn_blocking(move || callback(&summary)).await;
        match (status, verdict) {
            (Status::Success, Ok(Err(rejection))) => {
                warn!("Download rejected: {}", rejection);
                Status::Fail(rejection)
            }
            (Status::Success, Err(e)) => {
                Status::Fail(FetchError::Rejected(format!("completion callback failed: {e}")))
            }
            (status, _) => status,
        }
    }

    fn into_result(&self, outcome: &BatchOutcome) -> Result<()> {
        if outcome.cancelled {
            return Err(Error::Cancelled);
        }
        if outcome.failures.is_empty() {
            return Ok(());
        }

        for (_, error) in &outcome.failures {
            if let FetchError::Certificate { url, .. } = error {
                return Err(Error::MissingCertificate { url: url.clone() });
            }
        }

        for (target, error) in &outcome.failures {
            if let FetchError::Status { url, status: 403 } = error {
                let info_url = target.urls().iter().find_map(|u| {
                    u.host_str()
                        .and_then(|h| self.config.throttled_hosts.get(&h.to_ascii_lowercase()))
                });
                if let Some(info_url) = info_url {
                    return Err(Error::DownloadThrottled {
                        url: url.clone(),
                        info_url: info_url.clone(),
                    });
                }
            }
        }

        Err(Error::Download(DownloadErrors {
            failures: outcome.failures.clone(),
        }))
    }
}

impl Downloader {
    /// Creates a new Downloader with the given configuration.
    pub(crate) fn new(config: DownloaderConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state: Mutex::new(BatchState::new()),
            }),
        }
    }

    /// Gets the directory relative file sinks are resolved against.
    pub fn directory(&self) -> &PathBuf {
        &self.inner.config.directory
    }

    /// Gets the number of retries per mirror.
    pub fn retries(&self) -> u32 {
        self.inner.config.retries
    }

    pub fn read_timeout(&self) -> Duration {
        self.inner.config.read_timeout
    }

    /// Whether a batch is in flight.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// A snapshot of the current (or last) batch's parts, in admission
    /// order.
    pub fn parts(&self) -> Vec<DownloadPart> {
        let state = self.inner.state.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.parts.get(id).cloned())
            .collect()
    }

    /// Downloads every target and waits for the whole batch to end.
    ///
    /// Calling this while a batch runs adds the targets to that batch and
    /// waits for it. A cancelled batch is drained before a new one starts.
    pub async fn download_and_wait(&self, targets: Vec<DownloadTarget>) -> Result<()> {
        loop {
            let draining = {
                let state = self.inner.state.lock();
                (state.running && state.cancelled).then(|| state.done.subscribe())
            };
            match draining {
                Some(mut rx) => {
                    debug!("Waiting for the cancelled batch to drain");
                    let _ = rx.wait_for(Option::is_some).await;
                }
                None => break,
            }
        }

        let (mut rx, starts, cancel) = {
            let mut state = self.inner.state.lock();
            if !state.running {
                if targets.is_empty() {
                    return Ok(());
                }
                state.reset();
                state.running = true;
                info!("Starting a batch of {} downloads", targets.len());
            } else {
                info!("Adding {} downloads to the running batch", targets.len());
            }

            let interval = self.inner.config.rate_sample_interval;
            let mut starts = Vec::new();
            for target in targets {
                let id = state.insert(target, interval);
                starts.extend(state.admit(id, &self.inner.config));
            }
            (state.done.subscribe(), starts, state.cancel.clone())
        };
        self.inner.spawn_all(starts, &cancel);

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        match outcome {
            Some(outcome) => self.inner.into_result(&outcome),
            None => Err(Error::Internal("download batch ended without an outcome".into())),
        }
    }

    /// Aborts the running batch.
    ///
    /// Running transfers are cancelled and report [`Status::Cancelled`];
    /// queued ones are dropped without a callback. Waiting callers get
    /// [`Error::Cancelled`].
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if !state.running || state.cancelled {
            return;
        }
        info!("Cancelling downloads");
        state.cancelled = true;
        state.cancel.cancel();

        let state = &mut *state;
        while let Some(id) = state.queue.pop_front() {
            if let Some(part) = state.parts.get_mut(&id) {
                part.state = PartState::Cancelled;
            }
            state.completed += 1;
        }
        state.check_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::Sink;
    use reqwest::Url;

    fn target(urls: &[&str]) -> DownloadTarget {
        let urls = urls.iter().map(|u| Url::parse(u).unwrap()).collect();
        DownloadTarget::new(urls, Sink::memory()).unwrap().with_size(10)
    }

    #[test]
    fn test_admission_is_exclusive_per_host() {
        let config = DownloaderConfig::default();
        let mut state = BatchState::new();
        state.running = true;

        let a = state.insert(target(&["https://github.com/a.zip"]), config.rate_sample_interval);
        let b = state.insert(target(&["https://github.com/b.zip"]), config.rate_sample_interval);
        let c = state.insert(
            target(&["https://spacedock.info/c.zip"]),
            config.rate_sample_interval,
        );

        assert!(state.admit(a, &config).is_some());
        assert!(state.admit(b, &config).is_none());
        assert!(state.admit(c, &config).is_some());
        assert_eq!(state.queue, VecDeque::from([b]));

        // Finishing a starts b
        let next = state.finish(a, &Status::Success, &config);
        assert_eq!(next.map(|(id, _)| id), Some(b));
        assert!(state.queue.is_empty());
    }

    #[test]
    fn test_fall_back_frees_old_host() {
        let config = DownloaderConfig::default();
        let mut state = BatchState::new();
        state.running = true;

        let a = state.insert(
            target(&["https://github.com/a.zip", "https://archive.org/a.zip"]),
            config.rate_sample_interval,
        );
        let b = state.insert(target(&["https://github.com/b.zip"]), config.rate_sample_interval);
        state.admit(a, &config);
        state.admit(b, &config);

        let error = FetchError::Status {
            url: "https://github.com/a.zip".into(),
            status: 500,
        };
        let starts = state.fall_back(a, &error, &config).unwrap();
        let started: Vec<_> = starts.iter().map(|(id, r)| (*id, r.url.to_string())).collect();
        assert_eq!(
            started,
            vec![
                (b, "https://github.com/b.zip".to_string()),
                (a, "https://archive.org/a.zip".to_string()),
            ]
        );

        // No mirrors left
        assert!(state.fall_back(a, &error, &config).is_none());
    }

    #[test]
    fn test_aggregate_ignores_failed_parts() {
        let config = DownloaderConfig::default();
        let mut state = BatchState::new();
        state.running = true;

        let a = state.insert(target(&["https://github.com/a.zip"]), config.rate_sample_interval);
        let b = state.insert(
            target(&["https://spacedock.info/b.zip"]),
            config.rate_sample_interval,
        );
        let c = state.insert(target(&["https://archive.org/c.zip"]), config.rate_sample_interval);
        state.admit(a, &config);
        state.admit(b, &config);
        assert_eq!(state.aggregate(), (0, 0, 30));

        state.finish(a, &Status::Success, &config);
        let error = FetchError::Status {
            url: "https://spacedock.info/b.zip".into(),
            status: 404,
        };
        state.finish(b, &Status::Fail(error), &config);
        assert_eq!(state.aggregate(), (50, 0, 10));

        state.admit(c, &config);
        state.finish(c, &Status::Success, &config);
        assert_eq!(state.aggregate(), (100, 0, 0));
    }

    #[test]
    fn test_completion_publishes_failures() {
        let config = DownloaderConfig::default();
        let mut state = BatchState::new();
        state.running = true;
        let rx = state.done.subscribe();

        let a = state.insert(target(&["https://github.com/a.zip"]), config.rate_sample_interval);
        state.admit(a, &config);
        let error = FetchError::Timeout {
            url: "https://github.com/a.zip".into(),
        };
        state.finish(a, &Status::Fail(error.clone()), &config);

        assert!(!state.running);
        let outcome = (*rx.borrow()).clone().unwrap();
        assert!(!outcome.cancelled);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].1, error);
    }

    #[test]
    fn test_auth_token_attached_by_host() {
        let mut config = DownloaderConfig::default();
        config
            .auth_tokens
            .insert("api.github.com".into(), "abc".into());
        let mut state = BatchState::new();
        let a = state.insert(
            target(&["https://api.github.com/repos/x/releases"]),
            config.rate_sample_interval,
        );
        let (_, request) = state.admit(a, &config).unwrap();
        assert_eq!(request.auth_token.as_deref(), Some("abc"));
    }
}
