use super::{Package, Registry, RelationshipDescriptor};
use crate::cache::url_hash;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A registry held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistry {
    /// Every version of every identifier, sorted newest first.
    available: BTreeMap<String, Vec<Arc<Package>>>,
    installed: BTreeMap<String, Arc<Package>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an available package and return the shared handle to it.
    pub fn add(&mut self, package: Package) -> Arc<Package> {
        let package = Arc::new(package);
        let versions = self.available.entry(package.identifier.clone()).or_default();
        versions.push(package.clone());
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        package
    }

    /// Mark the newest available version of `identifier` as installed.
    /// Returns false when no such package is known.
    pub fn mark_installed(&mut self, identifier: &str) -> bool {
        match self.latest(identifier) {
            Some(package) => {
                self.installed.insert(package.identifier.clone(), package);
                true
            }
            None => false,
        }
    }

    /// Record `package` as installed, whether or not it is available.
    pub fn install(&mut self, package: Package) -> Arc<Package> {
        let package = Arc::new(package);
        self.installed.insert(package.identifier.clone(), package.clone());
        package
    }

    /// Every available package, all versions.
    pub fn packages(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.available.values().flatten()
    }
}

impl Registry for InMemoryRegistry {
    fn latest(&self, identifier: &str) -> Option<Arc<Package>> {
        self.available
            .get(identifier)
            .and_then(|versions| versions.first())
            .cloned()
    }

    fn providers_of(&self, identifier: &str) -> Vec<Arc<Package>> {
        self.available
            .values()
            .filter_map(|versions| versions.first())
            .filter(|p| p.provides.iter().any(|name| name == identifier))
            .cloned()
            .collect()
    }

    fn installed(&self, identifier: &str) -> Option<Arc<Package>> {
        self.installed.get(identifier).cloned()
    }

    fn installed_packages(&self) -> Vec<Arc<Package>> {
        self.installed.values().cloned().collect()
    }

    fn hash_index(&self) -> HashMap<String, Vec<Arc<Package>>> {
        let mut index: HashMap<String, Vec<Arc<Package>>> = HashMap::new();
        for package in self.packages() {
            for url in &package.download {
                index.entry(url_hash(url)).or_default().push(package.clone());
            }
        }
        index
    }

    fn latest_matching(&self, descriptor: &RelationshipDescriptor) -> Option<Arc<Package>> {
        self.available
            .get(&descriptor.name)?
            .iter()
            .find(|p| descriptor.version_within_bounds(&p.version))
            .cloned()
    }
}
