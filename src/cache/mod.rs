//! Content-addressed download cache.
//!
//! [`FileCache`] stores files under the hash of the URL they came from and
//! answers "is this URL cached?" from a lazily rebuilt index.
//! [`ModuleCache`] layers package knowledge on top: it validates downloads
//! before admitting them and looks packages up by their download URL.
//!
//! # Examples
//!
//! ```rust,no_run
//! use modcore::cache::{FileCache, ModuleCache};
//!
//! # fn main() -> modcore::Result<()> {
//! let cache = ModuleCache::new(FileCache::new("/var/cache/mods")?);
//! let (files, bytes) = cache.file_cache().size_info();
//! println!("{files} files, {bytes} bytes");
//! # Ok(())
//! # }
//! ```

pub mod eviction;
pub mod file_cache;
pub mod hashing;
pub mod index;
pub mod module_cache;

pub use eviction::CompatibilityCriteria;
pub use file_cache::{FileCache, IN_PROGRESS_DIR};
pub use hashing::{sanitize_description, url_hash, HashKind};
pub use index::CacheIndex;
pub use module_cache::{AdmissionFailure, ModuleCache};
