//! modcore is the dependency-resolution, download and cache core of a game
//! mod manager.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use modcore::cache::{FileCache, ModuleCache};
//! use modcore::downloader::{DownloaderBuilder, ModuleDownloader};
//! use modcore::registry::{InMemoryRegistry, Package, RelationshipDescriptor};
//! use modcore::resolver::{resolve, ResolverOptions};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> modcore::Result<()> {
//! let mut registry = InMemoryRegistry::new();
//! registry.add(
//!     Package::new("Kopernicus", "1.12.1")
//!         .with_download("https://github.com/Kopernicus/Kopernicus/releases/download/1.12.1/Kopernicus.zip".parse().unwrap())
//!         .depends(RelationshipDescriptor::new("ModularFlightIntegrator")),
//! );
//! registry.add(
//!     Package::new("ModularFlightIntegrator", "1.2.10")
//!         .with_download("https://github.com/sarbian/ModularFlightIntegrator/releases/download/1.2.10/MFI.zip".parse().unwrap()),
//! );
//!
//! let install = resolve(&["Kopernicus"], ResolverOptions::default(), &registry)?;
//!
//! let cache = Arc::new(ModuleCache::new(FileCache::new("/var/cache/mods")?));
//! let downloader = ModuleDownloader::new(DownloaderBuilder::new(), cache)?;
//! downloader.download_modules(install.modules()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`registry`] - Packages, versions and the read-only [`Registry`] interface
//! - [`resolver`] - Turns requested identifiers into a consistent install set
//! - [`download`] - Download targets, live parts and summaries
//! - [`downloader`] - The batch [`Downloader`] and the package-aware [`ModuleDownloader`]
//! - [`http`] - HTTP client setup and the resumable [`Transport`]
//! - [`cache`] - The content-addressed cache and its package-aware façade
//! - [`archive`] - Zip validation
//! - [`progress`] - Rate sampling and progress display
//! - [`error`] - Centralized error handling with the `Error` enum
//! - [`utils`] - Shared utility functions

pub mod archive;
pub mod cache;
pub mod download;
pub mod downloader;
pub mod error;
pub mod http;
pub mod progress;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod utils;

pub use cache::{url_hash, CompatibilityCriteria, FileCache, ModuleCache};
pub use download::{DownloadTarget, Sink, Status, Summary};
pub use downloader::{Downloader, DownloaderBuilder, ModuleDownloader};
pub use error::{DownloadErrors, Error, FetchError, Result};
pub use http::{create_http_client, HttpClientConfig, HttpTransport, Transport};
pub use progress::{ProgressBarOpts, ProgressDisplay};
pub use registry::{InMemoryRegistry, ModuleVersion, Package, Registry, RelationshipDescriptor};
pub use report::{NullReporter, Reporter};
pub use resolver::{InstallSet, Resolver, ResolverOptions};
