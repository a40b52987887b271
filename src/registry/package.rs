//! Package metadata as seen by the core.

use super::version::ModuleVersion;

use reqwest::Url;
use std::fmt;
use std::time::SystemTime;

/// A reference from one package to another, with an optional version
/// constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    /// Identifier of the referenced package, or a virtual identifier.
    pub name: String,
    /// Exact version required.
    pub version: Option<ModuleVersion>,
    /// Inclusive lower bound.
    pub min_version: Option<ModuleVersion>,
    /// Inclusive upper bound.
    pub max_version: Option<ModuleVersion>,
}

impl RelationshipDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: None,
            min_version: None,
            max_version: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(ModuleVersion::new(version));
        self
    }

    pub fn with_min_version(mut self, version: &str) -> Self {
        self.min_version = Some(ModuleVersion::new(version));
        self
    }

    pub fn with_max_version(mut self, version: &str) -> Self {
        self.max_version = Some(ModuleVersion::new(version));
        self
    }

    /// Whether any version constraint is set.
    pub fn is_constrained(&self) -> bool {
        self.version.is_some() || self.min_version.is_some() || self.max_version.is_some()
    }

    /// Whether `version` satisfies the constraints.
    pub fn version_within_bounds(&self, version: &ModuleVersion) -> bool {
        if let Some(exact) = &self.version {
            return exact == version;
        }
        if let Some(min) = &self.min_version {
            if version < min {
                return false;
            }
        }
        if let Some(max) = &self.max_version {
            if version > max {
                return false;
            }
        }
        true
    }

    /// Whether `package` satisfies this descriptor, either by identifier
    /// and version or through its `provides` list.
    ///
    /// Virtual identifiers carry no version, so constraints only apply to
    /// identifier matches.
    pub fn matches(&self, package: &Package) -> bool {
        if package.identifier == self.name {
            return self.version_within_bounds(&package.version);
        }
        package.provides.iter().any(|p| *p == self.name)
    }

    /// Human readable constraint, if any.
    pub fn constraint(&self) -> Option<String> {
        if let Some(v) = &self.version {
            return Some(format!("= {v}"));
        }
        match (&self.min_version, &self.max_version) {
            (Some(min), Some(max)) => Some(format!(">= {min}, <= {max}")),
            (Some(min), None) => Some(format!(">= {min}")),
            (None, Some(max)) => Some(format!("<= {max}")),
            (None, None) => None,
        }
    }
}

impl fmt::Display for RelationshipDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.constraint() {
            Some(c) => write!(f, "{} {}", self.name, c),
            None => f.write_str(&self.name),
        }
    }
}

/// An installable package.
#[derive(Debug, Clone)]
pub struct Package {
    pub identifier: String,
    pub version: ModuleVersion,
    /// Mirror URLs for the same archive, in priority order.
    pub download: Vec<Url>,
    /// Expected size in bytes; 0 when unknown.
    pub download_size: u64,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub download_content_type: Option<String>,
    /// Virtual identifiers this package satisfies.
    pub provides: Vec<String>,
    pub depends: Vec<RelationshipDescriptor>,
    pub recommends: Vec<RelationshipDescriptor>,
    pub suggests: Vec<RelationshipDescriptor>,
    pub conflicts: Vec<RelationshipDescriptor>,
    /// Never resolved; the resolver rejects packages that declare any.
    pub pre_depends: Vec<RelationshipDescriptor>,
    pub release_date: Option<SystemTime>,
    /// Used only by torrent-based fetching, which lives outside the core.
    pub infohash: Option<String>,
}

impl Package {
    pub fn new(identifier: &str, version: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            version: ModuleVersion::new(version),
            download: Vec::new(),
            download_size: 0,
            sha1: None,
            sha256: None,
            download_content_type: None,
            provides: Vec::new(),
            depends: Vec::new(),
            recommends: Vec::new(),
            suggests: Vec::new(),
            conflicts: Vec::new(),
            pre_depends: Vec::new(),
            release_date: None,
            infohash: None,
        }
    }

    pub fn with_download(mut self, url: Url) -> Self {
        self.download.push(url);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.download_size = size;
        self
    }

    pub fn with_sha1(mut self, sha1: &str) -> Self {
        self.sha1 = Some(sha1.to_string());
        self
    }

    pub fn with_sha256(mut self, sha256: &str) -> Self {
        self.sha256 = Some(sha256.to_string());
        self
    }

    pub fn with_content_type(mut self, mime: &str) -> Self {
        self.download_content_type = Some(mime.to_string());
        self
    }

    pub fn with_release_date(mut self, date: SystemTime) -> Self {
        self.release_date = Some(date);
        self
    }

    pub fn provides(mut self, name: &str) -> Self {
        self.provides.push(name.to_string());
        self
    }

    pub fn depends(mut self, rel: RelationshipDescriptor) -> Self {
        self.depends.push(rel);
        self
    }

    pub fn recommends(mut self, rel: RelationshipDescriptor) -> Self {
        self.recommends.push(rel);
        self
    }

    pub fn suggests(mut self, rel: RelationshipDescriptor) -> Self {
        self.suggests.push(rel);
        self
    }

    pub fn conflicts(mut self, rel: RelationshipDescriptor) -> Self {
        self.conflicts.push(rel);
        self
    }

    pub fn pre_depends(mut self, rel: RelationshipDescriptor) -> Self {
        self.pre_depends.push(rel);
        self
    }

    /// Filesystem-safe name used as the cache description,
    /// `{identifier}-{version}.zip` with `:` replaced.
    pub fn standard_name(&self) -> String {
        format!("{}-{}.zip", self.identifier, self.version).replace(':', "-")
    }

    /// Whether this package is `name` or provides it.
    pub fn provides_name(&self, name: &str) -> bool {
        self.identifier == name || self.provides.iter().any(|p| p == name)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.identifier, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_name() {
        let package = Package::new("Astrogator", "1:0.9.2");
        assert_eq!(package.standard_name(), "Astrogator-1-0.9.2.zip");
    }

    #[test]
    fn test_descriptor_bounds() {
        let rel = RelationshipDescriptor::new("A")
            .with_min_version("1.0")
            .with_max_version("2.0");
        assert!(rel.version_within_bounds(&ModuleVersion::new("1.5")));
        assert!(rel.version_within_bounds(&ModuleVersion::new("2.0")));
        assert!(!rel.version_within_bounds(&ModuleVersion::new("2.1")));
        assert!(!rel.version_within_bounds(&ModuleVersion::new("0.9")));
        assert_eq!(rel.to_string(), "A >= 1.0, <= 2.0");
    }

    #[test]
    fn test_descriptor_matches_provides_without_version() {
        let rel = RelationshipDescriptor::new("Scatterer-config").with_version("9.9");
        let provider = Package::new("SVE", "1.0").provides("Scatterer-config");
        assert!(rel.matches(&provider));

        let exact = Package::new("Scatterer-config", "1.0");
        assert!(!rel.matches(&exact));
    }
}
