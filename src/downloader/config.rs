//! Configuration structures and defaults for the downloader.
//!
//! # Examples
//!
//! ## Using Callbacks
//!
//! ```rust
//! use modcore::downloader::DownloadCallback;
//! use modcore::download::{Status, Summary};
//!
//! let callback: DownloadCallback = Box::new(|summary: &Summary| {
//!     match summary.status() {
//!         Status::Success => println!("Downloaded: {}", summary.url()),
//!         Status::Fail(e) => println!("Failed: {} - {}", summary.url(), e),
//!         Status::Cancelled => println!("Cancelled: {}", summary.url()),
//!     }
//!     Ok(())
//! });
//! ```

use crate::download::Summary;
use crate::error::FetchError;
use crate::http::Transport;
use crate::progress::DEFAULT_SAMPLE_INTERVAL;
use crate::report::{NullReporter, Reporter};

use reqwest::header::HeaderMap;
use reqwest::Url;
use std::collections::HashMap;
use std::env::current_dir;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Callback for download completion events.
///
/// Returning an error on a successful download rejects it: the target is
/// then reported as failed with that error.
pub type DownloadCallback = Box<dyn Fn(&Summary) -> Result<(), FetchError> + Send + Sync>;

/// Callback for per-target progress: `(primary_url, bytes_received, total)`.
pub type ProgressCallback = Box<dyn Fn(&Url, u64, u64) + Send + Sync>;

/// Host GitHub rate-limits unauthenticated downloads from.
pub const GITHUB_API_HOST: &str = "api.github.com";

/// Where to learn how to lift the GitHub rate limit.
pub const GITHUB_AUTH_TOKEN_HELP: &str =
    "https://github.com/KSP-CKAN/CKAN/wiki/Adding-a-GitHub-API-authtoken";

/// Configuration structure for the downloader.
#[derive(Clone)]
pub struct DownloaderConfig {
    /// Directory relative file sinks are resolved against.
    pub directory: PathBuf,
    /// Transient-failure retries per mirror.
    pub retries: u32,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Custom HTTP headers.
    pub headers: Option<HeaderMap>,
    pub proxy: Option<reqwest::Proxy>,
    /// Host to token, sent as `Authorization: token ...`.
    pub auth_tokens: HashMap<String, String>,
    /// Host to help URL. A 403 from one of these hosts means throttling.
    pub throttled_hosts: HashMap<String, String>,
    /// Longest wait for response headers or for the next body chunk.
    pub read_timeout: Duration,
    /// Minimum time between two rate samples of a transfer.
    pub rate_sample_interval: Duration,
    pub on_complete: Option<Arc<DownloadCallback>>,
    pub on_progress: Option<Arc<ProgressCallback>>,
    pub reporter: Arc<dyn Reporter>,
    /// Overrides the HTTP transport.
    pub transport: Option<Arc<dyn Transport>>,
}

impl std::fmt::Debug for DownloaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderConfig")
            .field("directory", &self.directory)
            .field("retries", &self.retries)
            .field("user_agent", &self.user_agent)
            .field("headers", &self.headers)
            .field("proxy", &self.proxy)
            .field("auth_tokens", &self.auth_tokens.keys().collect::<Vec<_>>())
            .field("throttled_hosts", &self.throttled_hosts)
            .field("read_timeout", &self.read_timeout)
            .field("rate_sample_interval", &self.rate_sample_interval)
            .field("on_complete", &self.on_complete.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            directory: current_dir().unwrap_or_default(),
            retries: 0,
            user_agent: None,
            headers: None,
            proxy: None,
            auth_tokens: HashMap::new(),
            throttled_hosts: HashMap::from([(
                GITHUB_API_HOST.to_string(),
                GITHUB_AUTH_TOKEN_HELP.to_string(),
            )]),
            read_timeout: Duration::from_secs(30),
            rate_sample_interval: DEFAULT_SAMPLE_INTERVAL,
            on_complete: None,
            on_progress: None,
            reporter: Arc::new(NullReporter),
            transport: None,
        }
    }
}
