//! Backtracking dependency resolver, version-range algebra, and lockfile codec.

pub mod conflict;
pub mod graph;
pub mod installer;
pub mod lockfile;
pub mod project;
pub mod provider;
pub mod range;
pub mod registry;
pub mod resolver;
pub mod spec;
pub mod ui;
pub mod version;

pub use conflict::{Conflict, Conflicts, ResolveError};
pub use graph::Graph;
pub use provider::Provider;
pub use resolver::Resolver;
pub use spec::{Requirement, Specification};
pub use version::Version;
