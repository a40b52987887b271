/// Switches controlling how far the resolver expands a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Resolve `recommends` stanzas.
    pub with_recommends: bool,
    /// Resolve `suggests` of the requested packages only.
    pub with_suggests: bool,
    /// Resolve `suggests` at every depth.
    pub with_all_suggests: bool,
    /// Leave a virtual dependency unresolved instead of failing when
    /// several packages provide it.
    pub without_too_many_provides_error: bool,
    /// Keep going past conflicts and version mismatches.
    pub without_enforce_consistency: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            with_recommends: true,
            with_suggests: false,
            with_all_suggests: false,
            without_too_many_provides_error: false,
            without_enforce_consistency: false,
        }
    }
}

impl ResolverOptions {
    /// Dependencies only.
    pub fn no_recommends() -> Self {
        Self {
            with_recommends: false,
            ..Self::default()
        }
    }

    /// Options applied below the top level: `suggests` of pulled-in packages
    /// are only followed when `with_all_suggests` is set.
    pub(crate) fn for_dependencies(self) -> Self {
        Self {
            with_suggests: false,
            ..self
        }
    }

    pub(crate) fn follows_suggests(&self) -> bool {
        self.with_suggests || self.with_all_suggests
    }
}
