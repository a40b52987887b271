//! Progress module containing progress reporting functionality.
//!
//! - `rate` - Per-transfer rate sampling and time-left estimation
//! - `style` - Progress bar styling options and templates
//! - `display` - [`ProgressDisplay`], a [`Reporter`](crate::Reporter) drawing
//!   one aggregate bar
//!
//! # Examples
//!
//! ```rust
//! use modcore::progress::{ProgressBarOpts, ProgressDisplay};
//! use std::sync::Arc;
//!
//! let opts = ProgressBarOpts::new(
//!     Some("[{bar:40.cyan/blue}] {pos}% {msg}".to_string()),
//!     Some(ProgressBarOpts::CHARS_LINE.to_string()),
//!     true,
//!     true,
//! );
//! let display = Arc::new(ProgressDisplay::new(opts));
//! ```

pub(crate) mod display;
pub(crate) mod rate;
pub(crate) mod style;

pub use display::ProgressDisplay;
pub use rate::{percent_of, RateCounter, DEFAULT_SAMPLE_INTERVAL};
pub use style::ProgressBarOpts;
