//! Live state of a target inside a running batch.

use super::target::DownloadTarget;
use crate::error::FetchError;
use crate::progress::RateCounter;

use reqwest::Url;
use std::fmt;
use std::time::{Duration, Instant};

/// Stable handle of a part, assigned at admission and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(pub(crate) u64);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a part is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartState {
    /// Waiting for its host to become free.
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl PartState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PartState::Succeeded | PartState::Failed | PartState::Cancelled
        )
    }
}

/// A target plus the fields that change while it downloads.
#[derive(Debug, Clone)]
pub struct DownloadPart {
    pub(crate) id: PartId,
    pub(crate) target: DownloadTarget,
    pub(crate) state: PartState,
    /// Index of the mirror currently in use.
    pub(crate) mirror: usize,
    /// Best known size, refined from the first response.
    pub(crate) size: u64,
    pub(crate) bytes_received: u64,
    pub(crate) error: Option<FetchError>,
    pub(crate) rate: RateCounter,
}

impl DownloadPart {
    pub(crate) fn new(id: PartId, target: DownloadTarget, interval: Duration) -> Self {
        let size = target.size;
        Self {
            id,
            target,
            state: PartState::Queued,
            mirror: 0,
            size,
            bytes_received: 0,
            error: None,
            rate: RateCounter::with_interval(interval, Instant::now()),
        }
    }

    pub fn id(&self) -> PartId {
        self.id
    }

    pub fn target(&self) -> &DownloadTarget {
        &self.target
    }

    pub fn state(&self) -> PartState {
        self.state
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    /// Number of mirrors attempted so far, including the current one.
    pub fn mirrors_tried(&self) -> usize {
        self.mirror + 1
    }

    pub fn current_url(&self) -> &Url {
        &self.target.urls()[self.mirror]
    }

    pub(crate) fn host(&self) -> Option<String> {
        self.current_url().host_str().map(str::to_string)
    }

    pub fn bytes_left(&self) -> u64 {
        self.size.saturating_sub(self.bytes_received)
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.rate.bytes_per_second()
    }

    /// Move to the next mirror. Returns false when none remain.
    pub(crate) fn advance_mirror(&mut self) -> bool {
        if self.mirror + 1 >= self.target.urls().len() {
            return false;
        }
        self.mirror += 1;
        self.bytes_received = 0;
        self.size = self.target.size;
        self.error = None;
        true
    }

    pub(crate) fn record_progress(&mut self, received: u64, total: u64, now: Instant) {
        if total > 0 {
            self.size = total;
        }
        self.bytes_received = received;
        self.rate.update_at(self.size, self.bytes_left(), now);
    }
}
