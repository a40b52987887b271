//! Expansion of a request into its transitive install set.

use super::options::ResolverOptions;
use crate::registry::{Lookup, Package, Registry, RelationshipDescriptor};
use crate::report::{NullReporter, Reporter};
use crate::{Error, Result};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifier (including aliases) to concrete package, plus the concrete
/// packages in the order they were added.
#[derive(Debug, Default, Clone)]
pub struct InstallSet {
    by_name: HashMap<String, Arc<Package>>,
    modules: Vec<Arc<Package>>,
}

impl InstallSet {
    /// Whether `name` is satisfied, either concretely or by an alias.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Whether a package with identifier `name` itself is in the set.
    pub fn contains_concrete(&self, name: &str) -> bool {
        self.by_name.get(name).is_some_and(|p| p.identifier == name)
    }

    /// The package registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<Package>> {
        self.by_name.get(name)
    }

    /// Concrete packages, each once, in insertion order.
    pub fn modules(&self) -> &[Arc<Package>] {
        &self.modules
    }

    pub fn into_modules(self) -> Vec<Arc<Package>> {
        self.modules
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.modules.iter().map(|p| p.identifier.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn insert(&mut self, package: Arc<Package>) -> Result<()> {
        debug!("Adding {} {}", package.identifier, package.version);

        match self.by_name.get(&package.identifier) {
            Some(existing) if existing.identifier == package.identifier => {
                return Err(Error::Internal(format!(
                    "{} added twice during relationship resolution",
                    package.identifier
                )));
            }
            // An alias held the key; the concrete package takes it over.
            Some(_) | None => {
                self.by_name.insert(package.identifier.clone(), package.clone());
            }
        }

        for alias in &package.provides {
            if !self.by_name.contains_key(alias) {
                debug!("Adding {} providing {}", package.identifier, alias);
                self.by_name.insert(alias.clone(), package.clone());
            }
        }

        if !self.modules.iter().any(|p| Arc::ptr_eq(p, &package)) {
            self.modules.push(package);
        }
        Ok(())
    }
}

/// Resolves requested packages against a registry.
///
/// ```rust
/// use modcore::registry::{InMemoryRegistry, Package, RelationshipDescriptor};
/// use modcore::resolver::{Resolver, ResolverOptions};
///
/// # fn main() -> Result<(), modcore::Error> {
/// let mut registry = InMemoryRegistry::new();
/// registry.add(Package::new("A", "1.0").depends(RelationshipDescriptor::new("B")));
/// registry.add(Package::new("B", "1.0"));
///
/// let set = Resolver::new(&registry, ResolverOptions::default()).resolve(&["A"])?;
/// assert_eq!(set.identifiers(), vec!["A", "B"]);
/// # Ok(())
/// # }
/// ```
pub struct Resolver<'r> {
    registry: &'r dyn Registry,
    options: ResolverOptions,
    reporter: Arc<dyn Reporter>,
    set: InstallSet,
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("options", &self.options)
            .field("set", &self.set)
            .finish()
    }
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r dyn Registry, options: ResolverOptions) -> Self {
        Self {
            registry,
            options,
            reporter: Arc::new(NullReporter),
            set: InstallSet::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Resolve requested identifiers.
    pub fn resolve(self, requested: &[&str]) -> Result<InstallSet> {
        let descriptors: Vec<_> = requested
            .iter()
            .map(|id| RelationshipDescriptor::new(id))
            .collect();
        self.resolve_descriptors(&descriptors)
    }

    /// Resolve requested descriptors, honoring their version constraints.
    pub fn resolve_descriptors(
        mut self,
        requested: &[RelationshipDescriptor],
    ) -> Result<InstallSet> {
        // Every requested package goes in before any relationship is looked
        // at, so requested packages can satisfy each other's virtual
        // dependencies.
        let mut roots = Vec::with_capacity(requested.len());
        for descriptor in requested {
            let package = self.registry.latest_matching(descriptor).ok_or_else(|| {
                Error::ModuleNotFound {
                    identifier: descriptor.name.clone(),
                    constraint: descriptor.constraint(),
                }
            })?;
            if self.set.contains_concrete(&package.identifier) {
                continue;
            }
            self.set.insert(package.clone())?;
            roots.push(package);
        }

        for package in &roots {
            self.resolve_relationships(package, self.options, None)?;
        }

        if !self.options.without_enforce_consistency {
            let installed = self.registry.installed_packages();
            let conflicts = find_conflicts_with(self.set.modules(), &installed);
            if !conflicts.is_empty() {
                return Err(Error::Conflicts(conflicts));
            }
        }
        Ok(self.set)
    }

    /// Resolves the stanzas of `package`. `parent_stanza` is the stanza
    /// `package` itself was chosen from, used to break ties between
    /// providers.
    fn resolve_relationships(
        &mut self,
        package: &Package,
        options: ResolverOptions,
        parent_stanza: Option<&[RelationshipDescriptor]>,
    ) -> Result<()> {
        if !package.pre_depends.is_empty() {
            return Err(Error::UnsupportedRelationship {
                identifier: package.identifier.clone(),
                kind: "pre_depends".to_string(),
            });
        }

        let sub_options = options.for_dependencies();

        debug!("Resolving dependencies for {}", package.identifier);
        self.resolve_stanza(package, &package.depends, sub_options, false, parent_stanza)?;

        if options.with_recommends {
            debug!("Resolving recommends for {}", package.identifier);
            self.resolve_stanza(package, &package.recommends, sub_options, true, parent_stanza)?;
        }

        if options.follows_suggests() {
            debug!("Resolving suggests for {}", package.identifier);
            self.resolve_stanza(package, &package.suggests, sub_options, true, parent_stanza)?;
        }
        Ok(())
    }

    /// Resolves one stanza of `parent`.
    ///
    /// Optional stanzas (recommends, suggests) leave out entries that are
    /// unavailable or would conflict instead of failing.
    fn resolve_stanza(
        &mut self,
        parent: &Package,
        stanza: &[RelationshipDescriptor],
        options: ResolverOptions,
        optional: bool,
        parent_stanza: Option<&[RelationshipDescriptor]>,
    ) -> Result<()> {
        for descriptor in stanza {
            if let Some(existing) = self.set.get(&descriptor.name).cloned() {
                // Virtual names carry no version.
                if existing.identifier != descriptor.name
                    || descriptor.version_within_bounds(&existing.version)
                {
                    continue;
                }
                self.version_mismatch(parent, descriptor, &existing, false, options)?;
                continue;
            }
            if let Some(installed) = self.registry.installed(&descriptor.name) {
                if descriptor.version_within_bounds(&installed.version) {
                    debug!("{} is already installed, skipping", descriptor.name);
                } else {
                    self.version_mismatch(parent, descriptor, &installed, true, options)?;
                }
                continue;
            }

            let mut candidates = match self.registry.lookup(descriptor) {
                Lookup::Found(package) => vec![package],
                Lookup::FoundVirtual(candidates) => candidates,
                Lookup::NotFound => Vec::new(),
            };
            let candidate = if candidates.len() > 1 {
                match self.choose_provider(descriptor, candidates, options, parent_stanza)? {
                    Some(candidate) => candidate,
                    None => continue,
                }
            } else if let Some(candidate) = candidates.pop() {
                candidate
            } else if optional {
                info!(
                    "{} is recommended or suggested by {} but is not available",
                    descriptor, parent
                );
                continue;
            } else {
                return Err(Error::ModuleNotFound {
                    identifier: descriptor.name.clone(),
                    constraint: descriptor.constraint(),
                });
            };

            // A provider may already be in the set under its own name.
            if self.set.contains_concrete(&candidate.identifier) {
                continue;
            }

            if let Some((package, rel)) = self.conflict_with_fixed(&candidate) {
                if optional {
                    info!(
                        "{} would conflict with {} ({}), leaving it out",
                        candidate, package, rel
                    );
                    continue;
                }
                if !options.without_enforce_consistency {
                    return Err(Error::Conflicts(vec![(package, rel)]));
                }
                warn!("Adding {} despite its conflict with {}", candidate, package);
            }

            self.set.insert(candidate.clone())?;
            self.resolve_relationships(&candidate, options, Some(stanza))?;
        }
        Ok(())
    }

    /// Picks one of several providers of a virtual dependency.
    ///
    /// Returns `None` when the choice is left to the caller. A provider the
    /// parent stanza names directly wins; otherwise the dependency is
    /// ambiguous.
    fn choose_provider(
        &self,
        descriptor: &RelationshipDescriptor,
        candidates: Vec<Arc<Package>>,
        options: ResolverOptions,
        parent_stanza: Option<&[RelationshipDescriptor]>,
    ) -> Result<Option<Arc<Package>>> {
        if options.without_too_many_provides_error {
            self.reporter.message(format_args!(
                "Several modules provide {}, install one of them yourself: {}",
                descriptor.name,
                candidates
                    .iter()
                    .map(|p| p.identifier.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            return Ok(None);
        }

        if let Some(parent_stanza) = parent_stanza {
            let mut named = candidates
                .iter()
                .filter(|c| parent_stanza.iter().any(|rel| rel.name == c.identifier));
            if let (Some(choice), None) = (named.next(), named.next()) {
                debug!("Choosing {} to provide {}", choice.identifier, descriptor.name);
                return Ok(Some(choice.clone()));
            }
        }

        Err(Error::AmbiguousProvider {
            identifier: descriptor.name.clone(),
            candidates,
        })
    }

    /// First conflict between `candidate` and a package already chosen or
    /// installed.
    fn conflict_with_fixed(
        &self,
        candidate: &Arc<Package>,
    ) -> Option<(Arc<Package>, RelationshipDescriptor)> {
        let installed = self.registry.installed_packages();
        self.set
            .modules()
            .iter()
            .chain(installed.iter())
            .filter(|fixed| fixed.identifier != candidate.identifier)
            .find_map(|fixed| conflict_between(fixed, candidate))
    }

    fn version_mismatch(
        &self,
        parent: &Package,
        descriptor: &RelationshipDescriptor,
        found: &Package,
        installed: bool,
        options: ResolverOptions,
    ) -> Result<()> {
        let constraint = descriptor.constraint().unwrap_or_default();
        if options.without_enforce_consistency {
            warn!(
                "{} needs {} {}, but {} is chosen",
                parent, descriptor.name, constraint, found
            );
            return Ok(());
        }
        Err(Error::VersionMismatch {
            identifier: descriptor.name.clone(),
            constraint,
            found: found.version.to_string(),
            installed,
        })
    }
}

/// Resolve `requested` with the default reporter.
pub fn resolve(
    requested: &[&str],
    options: ResolverOptions,
    registry: &dyn Registry,
) -> Result<InstallSet> {
    Resolver::new(registry, options).resolve(requested)
}

/// Every `conflicts` entry of a resolved package that another resolved
/// package satisfies.
pub fn find_conflicts(modules: &[Arc<Package>]) -> Vec<(Arc<Package>, RelationshipDescriptor)> {
    find_conflicts_with(modules, &[])
}

/// Like [`find_conflicts`], also matching in both directions against
/// `installed`. An installed package with the identifier of a resolved one
/// is being replaced and is ignored.
pub fn find_conflicts_with(
    modules: &[Arc<Package>],
    installed: &[Arc<Package>],
) -> Vec<(Arc<Package>, RelationshipDescriptor)> {
    let kept: Vec<&Arc<Package>> = installed
        .iter()
        .filter(|i| !modules.iter().any(|m| m.identifier == i.identifier))
        .collect();

    let mut conflicts = Vec::new();
    for package in modules {
        for rel in &package.conflicts {
            let hit = modules
                .iter()
                .chain(kept.iter().copied())
                .any(|other| !Arc::ptr_eq(other, package) && rel.matches(other));
            if hit {
                conflicts.push((package.clone(), rel.clone()));
            }
        }
    }
    for package in kept {
        for rel in &package.conflicts {
            if modules.iter().any(|m| rel.matches(m)) {
                conflicts.push((package.clone(), rel.clone()));
            }
        }
    }
    conflicts
}

fn conflict_between(
    a: &Arc<Package>,
    b: &Arc<Package>,
) -> Option<(Arc<Package>, RelationshipDescriptor)> {
    let of = |x: &Arc<Package>, y: &Arc<Package>| {
        x.conflicts
            .iter()
            .find(|rel| rel.matches(y))
            .map(|rel| (x.clone(), rel.clone()))
    };
    of(a, b).or_else(|| of(b, a))
}
