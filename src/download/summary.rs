//! Download summary functionality.
//!
//! Every transfer ends with exactly one [`Summary`], handed to the
//! downloader's completion callback.
//!
//! # Examples
//!
//! ```rust
//! use modcore::download::{DownloadTarget, Status, Summary};
//! use modcore::FetchError;
//! use std::convert::TryFrom;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target = DownloadTarget::try_from("https://example.com/file.zip")?;
//! let url = target.primary_url().clone();
//! let summary = Summary::new(target, url, 1024);
//! assert!(summary.is_success());
//!
//! let failed = summary.fail(FetchError::Cancelled);
//! match failed.status() {
//!     Status::Fail(e) => println!("failed: {}", e),
//!     _ => unreachable!(),
//! }
//! # Ok(())
//! # }
//! ```

use super::target::DownloadTarget;
use crate::error::FetchError;

use reqwest::Url;

/// Terminal status of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Every byte arrived.
    Success,
    /// The last mirror failed with this error.
    Fail(FetchError),
    /// The batch was cancelled while this transfer was running.
    Cancelled,
}

/// Represents a [`DownloadTarget`] summary.
#[derive(Debug, Clone)]
pub struct Summary {
    /// Downloaded target.
    target: DownloadTarget,
    /// Mirror the transfer ended on.
    url: Url,
    /// Bytes in the sink.
    size: u64,
    /// Status.
    status: Status,
}

impl Summary {
    /// Create a successful [`Summary`].
    pub fn new(target: DownloadTarget, url: Url, size: u64) -> Self {
        Self {
            target,
            url,
            size,
            status: Status::Success,
        }
    }

    /// Attach a status to a [`Summary`].
    pub fn with_status(self, status: Status) -> Self {
        Self { status, ..self }
    }

    /// Get a reference to the summary's target.
    pub fn target(&self) -> &DownloadTarget {
        &self.target
    }

    /// The mirror the transfer ended on.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the summary's size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get a reference to the summary's status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Mark the summary as failed.
    pub fn fail(self, error: FetchError) -> Self {
        Self {
            status: Status::Fail(error),
            ..self
        }
    }

    /// Mark the summary as cancelled.
    pub fn cancelled(self) -> Self {
        Self {
            status: Status::Cancelled,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    fn create_test_summary() -> Summary {
        let target = DownloadTarget::try_from("http://example.com/test.zip").unwrap();
        let url = target.primary_url().clone();
        Summary::new(target, url, 1024)
    }

    #[test]
    fn test_summary_creation() {
        let summary = create_test_summary();

        assert_eq!(summary.size(), 1024);
        assert_eq!(summary.target().filename(), "test.zip");
        assert_eq!(summary.url().as_str(), "http://example.com/test.zip");
        assert_eq!(summary.status(), &Status::Success);
        assert!(summary.is_success());
    }

    #[test]
    fn test_summary_fail() {
        let summary = create_test_summary().fail(FetchError::Status {
            url: "http://example.com/test.zip".into(),
            status: 404,
        });

        match summary.status() {
            Status::Fail(FetchError::Status { status, .. }) => assert_eq!(*status, 404),
            _ => panic!("Expected Fail status"),
        }
        assert!(!summary.is_success());
    }

    #[test]
    fn test_summary_cancelled() {
        let summary = create_test_summary().cancelled();
        assert_eq!(summary.status(), &Status::Cancelled);
    }

    #[test]
    fn test_summary_with_status() {
        let summary = create_test_summary()
            .cancelled()
            .with_status(Status::Success);
        assert!(summary.is_success());
    }
}
