//! The oracle the resolver consults for candidate versions and their
//! dependencies. Kept as a narrow trait so the registry-backed
//! implementation ([`crate::registry::RegistryProvider`]) and the
//! in-memory test doubles share one contract.

use std::collections::BTreeMap;

use crate::conflict::Conflicts;
use crate::spec::{Requirement, Specification};

pub trait Provider {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Candidates for `requirement`, sorted ascending by preference (the
    /// best candidate last). The resolver pops from the tail, so it tries
    /// the most preferred candidate first.
    fn search_for(&self, requirement: &Requirement) -> Result<Vec<Specification>, Self::Error>;

    /// Whether `requirement` accepts `spec` — usually just range matching,
    /// but providers may special-case local/path overrides.
    fn is_requirement_satisfied_by(&self, requirement: &Requirement, spec: &Specification) -> bool {
        requirement.is_satisfied_by(&spec.version)
    }

    /// The transitive requirements `spec` introduces.
    fn dependencies_for(&self, spec: &Specification) -> Vec<Requirement> {
        spec.dependencies.clone()
    }

    /// Whether it's acceptable for `requirement` to go entirely unresolved
    /// (used for optional/platform-gated dependencies). Default: never.
    fn allow_missing(&self, _requirement: &Requirement) -> bool {
        false
    }

    /// Orders a batch of unresolved requirement names so the resolver
    /// tackles the most constrained ones first: names with an activated
    /// payload elsewhere in the graph, then names already carrying a
    /// conflict, then everything else, each group alphabetical for stable
    /// output.
    fn sort_dependencies(
        &self,
        names: &[String],
        conflicts: &Conflicts,
        activated: &BTreeMap<String, ()>,
    ) -> Vec<String> {
        let mut sorted = names.to_vec();
        sorted.sort_by(|a, b| {
            let a_key = sort_key(a, conflicts, activated);
            let b_key = sort_key(b, conflicts, activated);
            a_key.cmp(&b_key).then_with(|| a.cmp(b))
        });
        sorted
    }
}

fn sort_key(name: &str, conflicts: &Conflicts, activated: &BTreeMap<String, ()>) -> u8 {
    let has_conflict = conflicts.contains_key(name);
    let is_activated = activated.contains_key(name);
    match (is_activated, has_conflict) {
        (true, _) => 0,
        (false, true) => 1,
        (false, false) => 2,
    }
}
