//! Shared utility functions.
//!
//! - [`content_length`] - Total size of a (possibly partial) HTTP response
//! - [`host`] - Mirror ordering by preferred host
//!
//! # Examples
//!
//! ```rust
//! use modcore::utils::parse_content_range_total;
//!
//! // Extract total size from a Content-Range header
//! assert_eq!(parse_content_range_total("bytes 1024-2047/2048"), Some(2048));
//! assert_eq!(parse_content_range_total("bytes 0-1023/*"), None);
//! ```

pub mod content_length;
pub mod host;

pub use content_length::{parse_content_range_total, total_length};
pub use host::PreferredHostComparator;
