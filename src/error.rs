//! Error handling for modcore.
//!
//! This module provides the crate-wide [`Error`] enum and the transfer-level
//! [`FetchError`]. Resolution, download and cache operations all report
//! through [`Error`]; a single transfer reports through [`FetchError`], which
//! is cheap to clone so it can be attached to summaries and aggregates.

use crate::cache::AdmissionFailure;
use crate::download::DownloadTarget;
use crate::registry::{Package, RelationshipDescriptor};

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can happen when using modcore.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from an underlying system.
    ///
    /// Also used for internal invariant violations, which indicate a bug
    /// rather than a user error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Error from the underlying URL parser or the expected URL format.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// I/O Error.
    #[error("I/O error")]
    IOError {
        #[from]
        source: io::Error,
    },

    /// Error from the Reqwest library.
    #[error("Reqwest Error")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },

    /// A requested or required module is not available.
    #[error("Module not found: {identifier}{}", constraint_suffix(.constraint))]
    ModuleNotFound {
        identifier: String,
        constraint: Option<String>,
    },

    /// More than one package provides a virtual identifier and nothing
    /// decides between them.
    #[error("Too many modules provide {identifier}: {}", identifiers(.candidates))]
    AmbiguousProvider {
        identifier: String,
        candidates: Vec<Arc<Package>>,
    },

    /// A package declares a relationship kind the resolver refuses to handle.
    #[error("{identifier} declares unsupported relationship {kind}")]
    UnsupportedRelationship { identifier: String, kind: String },

    /// A relationship names a package whose chosen or installed version is
    /// outside the required bounds.
    #[error(
        "{identifier} {constraint} is required, but version {found} is {}",
        mismatch_place(.installed)
    )]
    VersionMismatch {
        identifier: String,
        constraint: String,
        found: String,
        installed: bool,
    },

    /// Resolved packages conflict with each other or with installed ones.
    #[error("Inconsistent install set: {}", conflict_list(.0))]
    Conflicts(Vec<(Arc<Package>, RelationshipDescriptor)>),

    /// A file failed validation and was not admitted to the cache.
    #[error("{} failed cache admission for {}: {reason}", .package.identifier, .path.display())]
    CacheAdmission {
        package: Arc<Package>,
        path: PathBuf,
        reason: AdmissionFailure,
    },

    /// The cache root does not exist.
    #[error("Cache directory not found: {}", .0.display())]
    CacheDirectoryNotFound(PathBuf),

    /// One or more targets of a batch failed on every mirror.
    #[error(transparent)]
    Download(DownloadErrors),

    /// One or more module downloads failed.
    #[error("{}", module_failures(.0))]
    ModuleDownload(Vec<(Arc<Package>, FetchError)>),

    /// TLS certificate validation failed; usually a missing root store.
    #[error("Certificate validation failed for {url}")]
    MissingCertificate { url: String },

    /// A rate-limited host refused the download.
    #[error("Download from {url} was throttled, see {info_url}")]
    DownloadThrottled { url: String, info_url: String },

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for operations that can fail with a modcore error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single transfer attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    /// TLS certificate validation failed.
    #[error("certificate validation failed for {url}: {message}")]
    Certificate { url: String, message: String },

    /// Connection or protocol failure.
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// No bytes arrived within the read timeout.
    #[error("timed out reading from {url}")]
    Timeout { url: String },

    /// Writing to the sink failed.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// The completion callback refused the downloaded content.
    #[error("download rejected: {0}")]
    Rejected(String),

    /// The transfer was cancelled.
    #[error("download cancelled")]
    Cancelled,
}

impl From<io::Error> for FetchError {
    fn from(e: io::Error) -> Self {
        FetchError::Io {
            message: e.to_string(),
        }
    }
}

/// Every target of a batch that failed, each with its last error.
#[derive(Debug, Clone, Default)]
pub struct DownloadErrors {
    pub failures: Vec<(DownloadTarget, FetchError)>,
}

impl DownloadErrors {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for DownloadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} download(s) failed", self.failures.len())?;
        for (target, error) in &self.failures {
            write!(f, "\n  {}: {}", target.describe(), error)?;
        }
        Ok(())
    }
}

impl std::error::Error for DownloadErrors {}

fn constraint_suffix(constraint: &Option<String>) -> String {
    match constraint {
        Some(c) => format!(" ({c})"),
        None => String::new(),
    }
}

fn mismatch_place(installed: &bool) -> &'static str {
    if *installed {
        "already installed"
    } else {
        "already being installed"
    }
}

fn identifiers(candidates: &[Arc<Package>]) -> String {
    candidates
        .iter()
        .map(|p| p.identifier.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn conflict_list(conflicts: &[(Arc<Package>, RelationshipDescriptor)]) -> String {
    conflicts
        .iter()
        .map(|(p, rel)| format!("{} conflicts with {}", p.identifier, rel))
        .collect::<Vec<_>>()
        .join("; ")
}

fn module_failures(failures: &[(Arc<Package>, FetchError)]) -> String {
    let mut out = format!("{} module download(s) failed", failures.len());
    for (package, error) in failures {
        out.push_str(&format!("\n  {} {}: {}", package.identifier, package.version, error));
    }
    out
}
