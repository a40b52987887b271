//! Download module containing the types a batch is made of.
//!
//! - [`target`] - What to download: mirrors, sink, expected size and type
//! - [`part`] - A target's live state inside a running batch
//! - [`summary`] - The terminal report of one transfer
//!
//! # Examples
//!
//! ```rust
//! use modcore::download::{DownloadTarget, Sink};
//!
//! let target = DownloadTarget::new(
//!     vec!["https://spacedock.info/mod/1/download".parse()?],
//!     Sink::File("mod.zip".into()),
//! )?
//! .with_size(1_048_576)
//! .with_mime_type("application/zip");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod part;
pub mod summary;
pub mod target;

pub use part::{DownloadPart, PartId, PartState};
pub use summary::{Status, Summary};
pub use target::{DownloadTarget, Sink};
