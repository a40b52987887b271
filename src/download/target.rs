//! Download targets.
//!
//! A [`DownloadTarget`] describes one artifact: its mirror URLs, the sink
//! the bytes go to, and optionally the expected size and mime type.
//!
//! # Examples
//!
//! ```rust
//! use modcore::download::{DownloadTarget, Sink};
//! use std::convert::TryFrom;
//!
//! // The file name is extracted from the URL.
//! let target = DownloadTarget::try_from("https://example.com/Kopernicus-1.12.zip")?;
//! assert_eq!(target.filename(), "Kopernicus-1.12.zip");
//!
//! // Several mirrors, written into memory.
//! let target = DownloadTarget::new(
//!     vec![
//!         "https://github.com/a.zip".parse()?,
//!         "https://archive.org/a.zip".parse()?,
//!     ],
//!     Sink::memory(),
//! )?;
//! assert_eq!(target.urls().len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::Error;

use parking_lot::Mutex;
use reqwest::Url;
use std::convert::TryFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where downloaded bytes are written.
#[derive(Debug, Clone)]
pub enum Sink {
    /// A file; relative paths are resolved against the downloader's
    /// directory. Existing content is resumed.
    File(PathBuf),
    /// A shared in-memory buffer.
    Memory(Arc<Mutex<Vec<u8>>>),
}

impl Sink {
    /// A new empty memory sink.
    pub fn memory() -> Self {
        Sink::Memory(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Sink::File(path) => Some(path),
            Sink::Memory(_) => None,
        }
    }

    /// A copy of the bytes of a memory sink.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        match self {
            Sink::File(_) => None,
            Sink::Memory(buffer) => Some(buffer.lock().clone()),
        }
    }

    pub(crate) fn resolve(&self, directory: &Path) -> Sink {
        match self {
            Sink::File(path) if path.is_relative() => Sink::File(directory.join(path)),
            other => other.clone(),
        }
    }
}

/// One artifact to fetch.
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    urls: Vec<Url>,
    /// Destination of the bytes.
    pub sink: Sink,
    /// Expected size in bytes; 0 when unknown.
    pub size: u64,
    /// Sent as the `Accept` header.
    pub mime_type: Option<String>,
}

impl DownloadTarget {
    /// Creates a target from its mirrors, tried in order.
    pub fn new(urls: Vec<Url>, sink: Sink) -> Result<Self, Error> {
        if urls.is_empty() {
            return Err(Error::InvalidUrl(
                "a download target needs at least one URL".into(),
            ));
        }
        Ok(Self {
            urls,
            sink,
            size: 0,
            mime_type: None,
        })
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    /// Mirror URLs in the order they are tried.
    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    /// The first mirror, which identifies the target.
    pub fn primary_url(&self) -> &Url {
        &self.urls[0]
    }

    /// File name derived from the primary URL.
    pub fn filename(&self) -> String {
        filename_from_url(self.primary_url()).unwrap_or_default()
    }

    pub(crate) fn describe(&self) -> String {
        self.primary_url().to_string()
    }
}

fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            form_urlencoded::parse(segment.as_bytes())
                .map(|(key, val)| [key, val].concat())
                .collect()
        })
}

impl TryFrom<&Url> for DownloadTarget {
    type Error = crate::error::Error;

    fn try_from(value: &Url) -> Result<Self, Self::Error> {
        let filename = filename_from_url(value).ok_or_else(|| {
            Error::InvalidUrl(format!("The url \"{}\" does not contain a filename", value))
        })?;
        DownloadTarget::new(vec![value.clone()], Sink::File(PathBuf::from(filename)))
    }
}

impl TryFrom<&str> for DownloadTarget {
    type Error = crate::error::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Url::parse(value)
            .map_err(|e| {
                Error::InvalidUrl(format!("The url \"{}\" cannot be parsed: {}", value, e))
            })
            .and_then(|u| DownloadTarget::try_from(&u))
    }
}
