//! Downloader module containing the batch orchestrator, its builder and
//! configuration, and the package-aware front end.
//!
//! - `downloader` - [`Downloader`], which runs batches with per-host
//!   exclusivity and mirror fallback
//! - `builder` - [`DownloaderBuilder`] for configuring it
//! - `config` - Configuration structures and callback types
//! - `modules` - [`ModuleDownloader`], which feeds finished downloads into
//!   the cache
//!
//! # Examples
//!
//! ```rust,no_run
//! use modcore::downloader::DownloaderBuilder;
//! use modcore::download::{DownloadTarget, Sink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = DownloaderBuilder::new()
//!     .directory("./downloads".into())
//!     .on_complete(|summary| {
//!         println!("{}: {:?}", summary.url(), summary.status());
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let target = DownloadTarget::new(
//!     vec![
//!         "https://github.com/KSP-RO/RealismOverhaul/releases/download/v16.0/RO.zip".parse()?,
//!         "https://archive.org/download/RealismOverhaul-v16.0/RO.zip".parse()?,
//!     ],
//!     Sink::File("RO.zip".into()),
//! )?;
//! downloader.download_and_wait(vec![target]).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod downloader;
pub mod modules;

pub use builder::DownloaderBuilder;
pub use config::{DownloadCallback, DownloaderConfig, ProgressCallback};
pub use downloader::Downloader;
pub use modules::ModuleDownloader;
