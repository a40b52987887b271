//! HTTP module containing the client and the transfer transport.
//!
//! - [`client`] - HTTP client creation and middleware configuration
//! - [`transport`] - The [`Transport`] seam and its resumable HTTP implementation
//!
//! # Examples
//!
//! ```rust
//! use modcore::http::{create_http_client, HttpClientConfig, HttpTransport};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_http_client(HttpClientConfig::default())?;
//! let transport = HttpTransport::new(client, Duration::from_secs(30));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod transport;

pub use client::{create_http_client, HttpClientConfig, DEFAULT_USER_AGENT};
pub use transport::{FetchRequest, HttpTransport, ProgressFn, Transport};
