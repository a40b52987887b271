//! HTTP client setup and middleware configuration.
//!
//! The client is a reqwest client wrapped with tracing and retry middleware.
//! Retries default to zero: mirror fallback is the retry mechanism, and each
//! mirror is attempted once per target.
//!
//! # Examples
//!
//! ```rust
//! use modcore::http::{create_http_client, HttpClientConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpClientConfig {
//!     user_agent: Some("my-launcher/2.0".into()),
//!     ..HttpClientConfig::default()
//! };
//! let client = create_http_client(config)?;
//! # Ok(())
//! # }
//! ```

use reqwest::{header::HeaderMap, Proxy};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_tracing::TracingMiddleware;
use std::time::Duration;

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("modcore/", env!("CARGO_PKG_VERSION"));

/// Configuration for HTTP client setup.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Number of retries of transient failures against the same URL.
    pub retries: u32,
    /// Optional proxy configuration.
    pub proxy: Option<Proxy>,
    /// Default headers to include with all requests.
    pub headers: Option<HeaderMap>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retries: 0,
            proxy: None,
            headers: None,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Creates an HTTP client with middleware configuration.
///
/// The client traces every request and retries transient failures with
/// exponential backoff up to `config.retries` times.
pub fn create_http_client(
    config: HttpClientConfig,
) -> Result<ClientWithMiddleware, reqwest::Error> {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.retries);

    let mut inner_client_builder = reqwest::Client::builder();

    if let Some(proxy) = config.proxy {
        inner_client_builder = inner_client_builder.proxy(proxy);
    }

    if let Some(headers) = config.headers {
        inner_client_builder = inner_client_builder.default_headers(headers);
    }

    if let Some(user_agent) = config.user_agent {
        inner_client_builder = inner_client_builder.user_agent(user_agent);
    }

    if let Some(timeout) = config.connect_timeout {
        inner_client_builder = inner_client_builder.connect_timeout(timeout);
    }

    let inner_client = inner_client_builder.build()?;

    let client = ClientBuilder::new(inner_client)
        // Trace HTTP requests. See the tracing crate to make use of these traces.
        .with(TracingMiddleware::default())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, ACCEPT};

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.retries, 0);
        assert!(config.proxy.is_none());
        assert!(config.headers.is_none());
        assert!(config
            .user_agent
            .as_deref()
            .is_some_and(|ua| ua.starts_with("modcore/")));
    }

    #[test]
    fn test_create_http_client_with_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let config = HttpClientConfig {
            retries: 2,
            headers: Some(headers),
            ..HttpClientConfig::default()
        };

        assert!(create_http_client(config).is_ok());
    }
}
