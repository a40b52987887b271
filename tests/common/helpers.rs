#![allow(dead_code)]

use modcore::download::Sink;
use modcore::http::{FetchRequest, ProgressFn, Transport};
use modcore::registry::Package;
use modcore::{FetchError, Reporter};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use rand::Rng;
use reqwest::Url;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Routes `tracing` output to the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Creates a temporary directory for testing purposes
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

pub fn url(s: &str) -> Url {
    Url::parse(s).expect("Invalid test URL")
}

/// Creates random test content of the given size
pub fn random_content(size: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    (0..size).map(|_| rng.random::<u8>()).collect()
}

// === Zip Helpers ===

/// Builds an uncompressed zip in memory.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).expect("Failed to start zip entry");
        writer.write_all(content).expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip").into_inner()
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let bytes = zip_bytes(entries);
    fs::write(path, &bytes).expect("Failed to write zip");
    bytes
}

/// Flips the first byte of `needle` inside the file, breaking the CRC of
/// the stored entry that holds it.
pub fn corrupt_entry(path: &Path, needle: &[u8]) {
    let mut bytes = fs::read(path).expect("Failed to read zip");
    let position = bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("Entry content not found in zip");
    bytes[position] ^= 0xFF;
    fs::write(path, bytes).expect("Failed to write zip");
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode_upper(Sha1::digest(bytes))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(bytes))
}

/// A package downloadable from `urls` whose archive is `archive`.
pub fn zipped_package(identifier: &str, urls: &[&str], archive: &[u8]) -> Package {
    let mut package = Package::new(identifier, "1.0")
        .with_size(archive.len() as u64)
        .with_sha1(&sha1_hex(archive))
        .with_sha256(&sha256_hex(archive))
        .with_content_type("application/zip");
    for u in urls {
        package = package.with_download(url(u));
    }
    package
}

// === Mock Transport ===

/// What the mock answers for a URL.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Body(Vec<u8>),
    Fail(FetchError),
    /// Never finishes; only cancellation ends it.
    Hang,
}

#[derive(Default)]
struct MockState {
    responses: Mutex<HashMap<String, MockResponse>>,
    started: Mutex<Vec<String>>,
    running_per_host: Mutex<HashMap<String, usize>>,
    max_per_host: Mutex<HashMap<String, usize>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    delay: Mutex<Duration>,
    hold: AtomicBool,
}

/// An in-process [`Transport`] recording concurrency and start order.
///
/// Unknown URLs answer with the URL itself as the body.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport").finish()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transfer sleeps this long before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.state.delay.lock() = delay;
        self
    }

    pub fn respond(&self, url: &str, response: MockResponse) {
        self.state
            .responses
            .lock()
            .insert(url.to_string(), response);
    }

    pub fn fail(&self, url: &str, error: FetchError) {
        self.respond(url, MockResponse::Fail(error));
    }

    pub fn fail_status(&self, url: &str, status: u16) {
        self.fail(
            url,
            FetchError::Status {
                url: url.to_string(),
                status,
            },
        );
    }

    /// URLs in the order their transfers started.
    pub fn started(&self) -> Vec<String> {
        self.state.started.lock().clone()
    }

    pub fn max_running(&self) -> usize {
        self.state.max_running.load(Ordering::SeqCst)
    }

    pub fn max_running_for(&self, host: &str) -> usize {
        self.state
            .max_per_host
            .lock()
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    pub fn running(&self) -> usize {
        self.state.running.load(Ordering::SeqCst)
    }
}

impl MockState {
    fn enter(&self, host: &str, url: &str) {
        self.started.lock().push(url.to_string());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let mut per_host = self.running_per_host.lock();
        let count = per_host.entry(host.to_string()).or_insert(0);
        *count += 1;
        let mut max = self.max_per_host.lock();
        let entry = max.entry(host.to_string()).or_insert(0);
        *entry = (*entry).max(*count);
    }

    fn leave(&self, host: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        if let Some(count) = self.running_per_host.lock().get_mut(host) {
            *count -= 1;
        }
    }

    async fn answer(&self, request: &FetchRequest, progress: &ProgressFn) -> Result<u64, FetchError> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| MockResponse::Body(request.url.as_str().as_bytes().to_vec()));

        match response {
            MockResponse::Body(body) => {
                let len = body.len() as u64;
                progress(len / 2, len);
                match &request.sink {
                    Sink::File(path) => {
                        if let Some(parent) = path.parent() {
                            fs::create_dir_all(parent)?;
                        }
                        fs::write(path, &body)?;
                    }
                    Sink::Memory(buffer) => buffer.lock().extend_from_slice(&body),
                }
                progress(len, len);
                Ok(len)
            }
            MockResponse::Fail(error) => Err(error),
            MockResponse::Hang => futures::future::pending().await,
        }
    }
}

impl Transport for MockTransport {
    fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<u64, FetchError>> {
        let state = self.state.clone();
        async move {
            let host = request.url.host_str().unwrap_or_default().to_string();
            state.enter(&host, request.url.as_str());
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = state.answer(&request, &progress) => result,
            };
            state.leave(&host);
            result
        }
        .boxed()
    }
}

// === Reporter ===

/// A [`Reporter`] that records everything it is told.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub messages: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<(u8, u64, u64)>>,
    pub prompts: Mutex<Vec<String>>,
    pub answer: AtomicBool,
}

impl RecordingReporter {
    pub fn answering(answer: bool) -> Arc<Self> {
        let reporter = Self::default();
        reporter.answer.store(answer, Ordering::SeqCst);
        Arc::new(reporter)
    }
}

impl Reporter for RecordingReporter {
    fn message(&self, args: fmt::Arguments<'_>) {
        self.messages.lock().push(args.to_string());
    }

    fn progress(&self, percent: u8, bytes_per_second: u64, bytes_left: u64) {
        self.progress
            .lock()
            .push((percent, bytes_per_second, bytes_left));
    }

    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().push(prompt.to_string());
        self.answer.load(Ordering::SeqCst)
    }
}

/// Path of the only file in `dir` whose name starts with `prefix`.
pub fn find_file(dir: &Path, prefix: &str) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
        })
}
