//! Structured failure reporting: when the resolver exhausts every
//! possibility for a vertex, it records which requirements (and whose
//! activated payloads) disagreed, so the final error can show the
//! requirement trees rather than a bare "no solution" message.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::spec::{Requirement, Specification};

/// Everything the resolver knew about a name at the moment it gave up on
/// finding a version that satisfied all of its requirements.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub name: String,
    /// Every requirement, from every still-active vertex, that named this
    /// package.
    pub requirements: Vec<Requirement>,
    /// The specification that was activated elsewhere in the graph and
    /// which none of the candidates for `name` could be made compatible
    /// with, if any.
    pub activated_by: Option<Specification>,
    /// Possibilities that were tried and rejected, newest first.
    pub possibilities_exhausted: Vec<String>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Unable to satisfy requirements for package '{}':", self.name)?;
        for req in &self.requirements {
            writeln!(f, "  - {req}")?;
        }
        if let Some(spec) = &self.activated_by {
            writeln!(f, "  activated version: {spec}")?;
        }
        Ok(())
    }
}

/// Name-indexed conflicts gathered over a resolution attempt.
pub type Conflicts = BTreeMap<String, Conflict>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("version conflict:\n{}", render_conflicts(.0))]
    VersionConflict(Conflicts),

    #[error("circular dependency detected while resolving: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("no version of '{name}' satisfies requirement {requirement}")]
    Missing {
        name: String,
        requirement: Requirement,
    },

    #[error("resolution exceeded the iteration ceiling ({limit}); the dependency set may be unsatisfiable or pathologically large")]
    IterationLimitExceeded { limit: u64 },

    #[error("provider error: {0}")]
    Provider(String),
}

fn render_conflicts(conflicts: &Conflicts) -> String {
    conflicts
        .values()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;

    #[test]
    fn conflict_display_lists_requirements() {
        let conflict = Conflict {
            name: "serde".into(),
            requirements: vec![Requirement::new("serde", Range::parse(">=2.0.0").unwrap())],
            activated_by: None,
            possibilities_exhausted: vec!["1.9.0".into()],
        };
        let rendered = conflict.to_string();
        assert!(rendered.contains("serde"));
        assert!(rendered.contains(">=2.0.0"));
    }
}
