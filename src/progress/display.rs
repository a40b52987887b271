//! Terminal [`Reporter`] built on indicatif.
//!
//! # Examples
//!
//! ```rust
//! use modcore::progress::{ProgressBarOpts, ProgressDisplay};
//! use modcore::Reporter;
//!
//! let display = ProgressDisplay::new(ProgressBarOpts::hidden()).with_assume_yes(true);
//! display.progress(40, 1024, 4096);
//! assert!(display.confirm("Download 2 GiB?"));
//! display.finish();
//! ```

use super::style::ProgressBarOpts;
use crate::report::Reporter;

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget};
use std::fmt;
use tracing::info;

/// One aggregate progress bar plus printed messages.
pub struct ProgressDisplay {
    multi: MultiProgress,
    main: ProgressBar,
    opts: ProgressBarOpts,
    assume_yes: bool,
}

impl fmt::Debug for ProgressDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressDisplay")
            .field("opts", &self.opts)
            .field("assume_yes", &self.assume_yes)
            .finish()
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new(ProgressBarOpts::default())
    }
}

impl ProgressDisplay {
    pub fn new(opts: ProgressBarOpts) -> Self {
        let multi = if opts.is_enabled() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        let main = multi.add(opts.clone().to_progress_bar(100));
        Self {
            multi,
            main,
            opts,
            assume_yes: false,
        }
    }

    /// A display that draws nothing.
    pub fn hidden() -> Self {
        Self::new(ProgressBarOpts::hidden())
    }

    /// Answer every confirmation with `assume_yes` instead of refusing.
    pub fn with_assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    pub fn position(&self) -> u64 {
        self.main.position()
    }

    /// Finish the bar, clearing or keeping it based on configuration.
    pub fn finish(&self) {
        if self.opts.clear {
            self.main.finish_and_clear();
        } else {
            self.main.finish();
        }
    }
}

impl Reporter for ProgressDisplay {
    fn message(&self, args: fmt::Arguments<'_>) {
        let line = args.to_string();
        if self.multi.println(&line).is_err() {
            info!("{}", line);
        }
    }

    fn progress(&self, percent: u8, bytes_per_second: u64, bytes_left: u64) {
        self.main.set_position(u64::from(percent.min(100)));
        self.main.set_message(format!(
            "{}/s, {} left",
            HumanBytes(bytes_per_second),
            HumanBytes(bytes_left)
        ));
    }

    /// Non-interactive: a terminal prompt belongs to the caller.
    fn confirm(&self, prompt: &str) -> bool {
        info!("{} -> {}", prompt, if self.assume_yes { "yes" } else { "no" });
        self.assume_yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_sets_position() {
        let display = ProgressDisplay::hidden();
        display.progress(55, 0, 100);
        assert_eq!(display.position(), 55);
        display.progress(200, 0, 0);
        assert_eq!(display.position(), 100);
    }

    #[test]
    fn test_confirm_follows_assume_yes() {
        assert!(!ProgressDisplay::hidden().confirm("continue?"));
        assert!(ProgressDisplay::hidden()
            .with_assume_yes(true)
            .confirm("continue?"));
    }
}
