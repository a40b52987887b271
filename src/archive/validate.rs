//! Full CRC validation of zip archives.

use crate::{Error, Result};

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of validating an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveValidation {
    Valid,
    /// The first problem found, with the entry it was found in when known.
    Invalid {
        entry: Option<String>,
        reason: String,
    },
}

impl ArchiveValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, ArchiveValidation::Valid)
    }

    fn invalid(entry: Option<String>, reason: impl fmt::Display) -> Self {
        ArchiveValidation::Invalid {
            entry,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ArchiveValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveValidation::Valid => f.write_str("valid"),
            ArchiveValidation::Invalid {
                entry: Some(entry),
                reason,
            } => write!(f, "error in {}: {}", entry, reason),
            ArchiveValidation::Invalid {
                entry: None,
                reason,
            } => f.write_str(reason),
        }
    }
}

/// Read every entry of the zip at `path` and check its CRC.
///
/// `progress` receives a percentage of compressed bytes checked. A missing,
/// unreadable or malformed file is reported as [`ArchiveValidation::Invalid`];
/// only cancellation is returned as an error.
pub fn validate_zip(
    path: &Path,
    progress: &mut dyn FnMut(u8),
    cancel: Option<&CancellationToken>,
) -> Result<ArchiveValidation> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => return Ok(ArchiveValidation::invalid(None, e)),
    };
    let mut archive = match zip::ZipArchive::new(BufReader::new(file)) {
        Ok(archive) => archive,
        Err(e) => return Ok(ArchiveValidation::invalid(None, e)),
    };

    let total: u64 = (0..archive.len())
        .filter_map(|i| archive.by_index_raw(i).ok().map(|e| e.compressed_size()))
        .sum();
    let mut checked = 0u64;
    let mut last_percent = 0u8;
    progress(0);

    for i in 0..archive.len() {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(Error::Cancelled);
        }

        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => return Ok(ArchiveValidation::invalid(None, e)),
        };
        let name = entry.name().to_string();
        let compressed = entry.compressed_size();

        // The CRC is checked when the reader reaches the end of the entry.
        if let Err(e) = io::copy(&mut entry, &mut io::sink()) {
            debug!("{} failed validation at {}: {}", path.display(), name, e);
            return Ok(ArchiveValidation::invalid(Some(name), e));
        }

        checked += compressed;
        let percent = if total > 0 {
            (checked.saturating_mul(100) / total).min(100) as u8
        } else {
            100
        };
        if percent > last_percent {
            last_percent = percent;
            progress(percent);
        }
    }

    if last_percent < 100 {
        progress(100);
    }
    Ok(ArchiveValidation::Valid)
}
