//! Builder pattern implementation for creating Downloader instances.
//!
//! # Examples
//!
//! ## Basic Builder Usage
//!
//! ```rust
//! use modcore::downloader::DownloaderBuilder;
//! use std::path::PathBuf;
//!
//! # fn example() -> modcore::Result<()> {
//! let downloader = DownloaderBuilder::new()
//!     .directory(PathBuf::from("./downloads"))
//!     .retries(1)
//!     .auth_token("api.github.com", "ghp_0123456789")
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Advanced Configuration with Callbacks
//!
//! ```rust
//! use modcore::downloader::DownloaderBuilder;
//! use modcore::download::Status;
//! use reqwest::header::{HeaderMap, ACCEPT_LANGUAGE};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut headers = HeaderMap::new();
//! headers.insert(ACCEPT_LANGUAGE, "en".parse()?);
//!
//! let downloader = DownloaderBuilder::new()
//!     .headers(headers)
//!     .on_complete(|summary| {
//!         if let Status::Fail(e) = summary.status() {
//!             println!("Failed to download {}: {}", summary.url(), e);
//!         }
//!         Ok(())
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use super::{config::DownloaderConfig, downloader::Downloader};
use crate::download::Summary;
use crate::error::FetchError;
use crate::http::{create_http_client, HttpClientConfig, HttpTransport, Transport};
use crate::report::Reporter;
use crate::Result;

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A builder used to create a [`Downloader`].
///
/// ```rust
/// # fn main() -> modcore::Result<()> {
/// use modcore::downloader::DownloaderBuilder;
///
/// let d = DownloaderBuilder::new().retries(2).directory("downloads".into()).build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct DownloaderBuilder {
    config: DownloaderConfig,
}

impl DownloaderBuilder {
    /// Creates a builder with the default options.
    pub fn new() -> Self {
        DownloaderBuilder::default()
    }

    /// Sets the directory relative file sinks are resolved against.
    pub fn directory(mut self, directory: PathBuf) -> Self {
        self.config.directory = directory;
        self
    }

    /// Set the number of transient-failure retries per mirror.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.config.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn proxy(mut self, proxy: reqwest::Proxy) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Send `Authorization: token {token}` to `host`.
    pub fn auth_token(mut self, host: &str, token: &str) -> Self {
        self.config
            .auth_tokens
            .insert(host.to_ascii_lowercase(), token.to_string());
        self
    }

    /// Treat a 403 from `host` as throttling, pointing the user at
    /// `info_url`.
    pub fn throttled_host(mut self, host: &str, info_url: &str) -> Self {
        self.config
            .throttled_hosts
            .insert(host.to_ascii_lowercase(), info_url.to_string());
        self
    }

    /// Set how long to wait for response headers and for each body chunk.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the minimum time between two rate samples of a transfer.
    pub fn rate_sample_interval(mut self, interval: Duration) -> Self {
        self.config.rate_sample_interval = interval;
        self
    }

    /// Set callback for when each download completes.
    ///
    /// The callback is called once per target, as soon as it ends, on the
    /// blocking thread pool. Returning an error for a successful download
    /// marks the target as failed.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Summary) -> std::result::Result<(), FetchError> + Send + Sync + 'static,
    {
        self.config.on_complete = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Set callback receiving each target's `(bytes_received, total)`.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Url, u64, u64) + Send + Sync + 'static,
    {
        self.config.on_progress = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Set the reporter receiving aggregate progress.
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.config.reporter = reporter;
        self
    }

    /// Use `transport` instead of HTTP.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub(crate) fn configured_reporter(&self) -> Arc<dyn Reporter> {
        self.config.reporter.clone()
    }

    /// Helper method to get or create a new HeaderMap.
    fn new_header(&self) -> HeaderMap {
        match self.config.headers {
            Some(ref h) => h.to_owned(),
            _ => HeaderMap::new(),
        }
    }

    /// Add the http headers.
    ///
    /// You can call `.headers()` multiple times and all `HeaderMap` will be
    /// merged into a single one.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut new = self.new_header();
        new.extend(headers);

        self.config.headers = Some(new);
        self
    }

    /// Add the http header
    ///
    /// ```
    /// use reqwest::header::{self, HeaderValue};
    /// use modcore::downloader::DownloaderBuilder;
    ///
    /// let auth = HeaderValue::from_static("Basic aGk6MTIzNDU2Cg==");
    /// let builder = DownloaderBuilder::new().header(header::AUTHORIZATION, auth);
    /// ```
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        let mut new = self.new_header();

        new.insert(name, value);

        self.config.headers = Some(new);
        self
    }

    /// Create the [`Downloader`] with the specified options.
    pub fn build(mut self) -> Result<Downloader> {
        let transport = match self.config.transport.take() {
            Some(transport) => transport,
            None => {
                let defaults = HttpClientConfig::default();
                let client = create_http_client(HttpClientConfig {
                    retries: self.config.retries,
                    proxy: self.config.proxy.clone(),
                    headers: self.config.headers.clone(),
                    user_agent: self.config.user_agent.clone().or(defaults.user_agent),
                    connect_timeout: defaults.connect_timeout,
                })?;
                Arc::new(HttpTransport::new(client, self.config.read_timeout))
            }
        };
        Ok(Downloader::new(self.config, transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_config() {
        let downloader = DownloaderBuilder::new()
            .directory(PathBuf::from("/tmp/mods"))
            .retries(2)
            .auth_token("API.GitHub.com", "token")
            .read_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(downloader.directory(), &PathBuf::from("/tmp/mods"));
        assert_eq!(downloader.retries(), 2);
        assert_eq!(downloader.read_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_headers_merge() {
        let builder = DownloaderBuilder::new()
            .header(
                reqwest::header::ACCEPT_LANGUAGE,
                HeaderValue::from_static("en"),
            )
            .header(reqwest::header::DNT, HeaderValue::from_static("1"));
        assert_eq!(builder.config.headers.as_ref().map(HeaderMap::len), Some(2));
    }
}
