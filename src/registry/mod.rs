//! The registry collaborator.
//!
//! The core only reads from a registry. [`Registry`] is the interface it
//! needs; [`InMemoryRegistry`] is a simple implementation backed by maps,
//! suitable for tests and for callers that load their registry up front.
//!
//! # Examples
//!
//! ```rust
//! use modcore::registry::{InMemoryRegistry, Lookup, Package, Registry, RelationshipDescriptor};
//!
//! let mut registry = InMemoryRegistry::new();
//! registry.add(Package::new("ModuleManager", "4.2.3"));
//! registry.add(Package::new("Scatterer", "0.0838").provides("AtmosphereRenderer"));
//!
//! assert!(matches!(
//!     registry.lookup(&RelationshipDescriptor::new("AtmosphereRenderer")),
//!     Lookup::FoundVirtual(_)
//! ));
//! ```

pub mod memory;
pub mod package;
pub mod version;

pub use memory::InMemoryRegistry;
pub use package::{Package, RelationshipDescriptor};
pub use version::ModuleVersion;

use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of looking up a relationship against a registry.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// A concrete package with the exact identifier.
    Found(Arc<Package>),
    /// No exact match, but these packages provide the identifier.
    FoundVirtual(Vec<Arc<Package>>),
    NotFound,
}

/// Read access to the available and installed packages.
pub trait Registry: Send + Sync {
    /// The newest available version of `identifier`.
    fn latest(&self, identifier: &str) -> Option<Arc<Package>>;

    /// The newest version of every package that lists `identifier` in its
    /// `provides`, ordered by identifier.
    fn providers_of(&self, identifier: &str) -> Vec<Arc<Package>>;

    /// The installed package with identifier `identifier`.
    fn installed(&self, identifier: &str) -> Option<Arc<Package>>;

    /// Every installed package.
    fn installed_packages(&self) -> Vec<Arc<Package>>;

    fn is_installed(&self, identifier: &str) -> bool {
        self.installed(identifier).is_some()
    }

    /// URL hash to the packages downloadable from that URL.
    fn hash_index(&self) -> HashMap<String, Vec<Arc<Package>>>;

    /// The newest available version satisfying `descriptor`'s constraints.
    fn latest_matching(&self, descriptor: &RelationshipDescriptor) -> Option<Arc<Package>> {
        self.latest(&descriptor.name)
            .filter(|p| descriptor.version_within_bounds(&p.version))
    }

    /// Resolve a descriptor to a concrete or virtual match.
    fn lookup(&self, descriptor: &RelationshipDescriptor) -> Lookup {
        if let Some(package) = self.latest_matching(descriptor) {
            return Lookup::Found(package);
        }
        let providers = self.providers_of(&descriptor.name);
        if providers.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::FoundVirtual(providers)
        }
    }
}
