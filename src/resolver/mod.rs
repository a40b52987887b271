//! Relationship resolution.
//!
//! The resolver turns a list of requested identifiers into the full set of
//! packages to install. It is synchronous and only reads the registry.
//!
//! - `depends` are always followed.
//! - `recommends` are followed when [`ResolverOptions::with_recommends`] is set.
//! - `suggests` are followed for the requested packages when
//!   [`ResolverOptions::with_suggests`] is set, and at every depth with
//!   [`ResolverOptions::with_all_suggests`].
//!
//! Dependencies that are already installed are skipped, as long as the
//! installed version fits. A recommended or suggested package that is not
//! available, or that would conflict, is left out instead of failing.
//!
//! A virtual dependency satisfied by several providers is settled by the
//! stanza that pulled in the depending package when it names exactly one of
//! them. Otherwise resolution stops with
//! [`Error::AmbiguousProvider`](crate::Error::AmbiguousProvider) so the
//! caller can ask the user which one to install.

pub mod options;
pub mod resolver;

pub use options::ResolverOptions;
pub use resolver::{find_conflicts, find_conflicts_with, resolve, InstallSet, Resolver};
