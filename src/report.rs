//! The reporting capability injected into the resolver and the downloader.
//!
//! The core never formats output for a particular surface. It only calls a
//! [`Reporter`], which a caller implements for a terminal, a GUI or a log.
//! [`ProgressDisplay`](crate::progress::ProgressDisplay) is the bundled
//! terminal implementation.

use std::fmt;

/// Receives user-facing messages, aggregate progress and confirmation
/// requests.
pub trait Reporter: Send + Sync {
    /// Show an informational message.
    fn message(&self, args: fmt::Arguments<'_>);

    /// Show aggregate progress of the current batch.
    fn progress(&self, percent: u8, bytes_per_second: u64, bytes_left: u64);

    /// Ask the user a yes/no question.
    fn confirm(&self, prompt: &str) -> bool;
}

/// A reporter that discards everything and answers yes to every question.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn message(&self, _args: fmt::Arguments<'_>) {}

    fn progress(&self, _percent: u8, _bytes_per_second: u64, _bytes_left: u64) {}

    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}
