//! The backtracking resolver: a push-down automaton over [`State`]s. Each
//! state tries one possibility for one requirement; when a possibility
//! turns out to conflict with something already activated, the resolver
//! unwinds to the most recent state that still has untried possibilities
//! and tries the next one, recording a [`Conflict`] along the way.

use std::collections::{BTreeMap, BTreeSet};

use crate::conflict::{Conflict, Conflicts, ResolveError};
use crate::graph::{Graph, VertexId, ROOT_VERTEX};
use crate::provider::Provider;
use crate::spec::{Requirement, Specification};
use crate::ui::{NullUi, Ui};

const DEFAULT_ITERATION_CEILING: u64 = 20_000;

/// A requirement still waiting to be worked on, paired with the vertex
/// that introduced it (so a fresh edge can be drawn when it's resolved).
#[derive(Debug, Clone)]
struct PendingRequirement {
    origin: VertexId,
    requirement: Requirement,
}

/// One frame of the resolver's backtracking stack.
#[derive(Clone)]
struct State {
    activated: Graph,
    requirements: Vec<PendingRequirement>,
    /// Remaining untried candidates for the requirement this state is
    /// working through, most-preferred last (so `pop()` tries it first).
    possibilities: Vec<Specification>,
    current: Option<PendingRequirement>,
    conflicts: Conflicts,
}

pub struct Resolver<P: Provider> {
    provider: P,
    ui: Box<dyn Ui>,
    iteration_ceiling: u64,
}

impl<P: Provider> Resolver<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            ui: Box::new(NullUi),
            iteration_ceiling: DEFAULT_ITERATION_CEILING,
        }
    }

    pub fn with_ui(mut self, ui: Box<dyn Ui>) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_iteration_ceiling(mut self, ceiling: u64) -> Self {
        self.iteration_ceiling = ceiling;
        self
    }

    /// Resolves `requirements`, optionally preferring the versions already
    /// present in `locked` (a name -> version pin from an existing
    /// lockfile) when they still satisfy everything.
    pub fn resolve(
        &mut self,
        requirements: Vec<Requirement>,
        locked: &BTreeMap<String, crate::version::Version>,
    ) -> Result<Graph, ResolveError> {
        self.ui.before_resolution();

        let mut root = Graph::new();
        let root_id = root.add_vertex(ROOT_VERTEX, true);

        let pending = requirements
            .into_iter()
            .map(|requirement| PendingRequirement {
                origin: root_id,
                requirement,
            })
            .collect();

        let mut stack = vec![State {
            activated: root,
            requirements: pending,
            possibilities: Vec::new(),
            current: None,
            conflicts: Conflicts::new(),
        }];

        let mut iterations: u64 = 0;
        let result = loop {
            iterations += 1;
            if iterations > self.iteration_ceiling {
                break Err(ResolveError::IterationLimitExceeded {
                    limit: self.iteration_ceiling,
                });
            }

            let Some(frame) = stack.last_mut() else {
                break Err(ResolveError::VersionConflict(Conflicts::new()));
            };

            if frame.possibilities.is_empty() && frame.current.is_none() {
                let Some(next) = pick_next(frame, &self.provider) else {
                    let mut graph = frame.activated.dup();
                    graph.detach_vertex_named(ROOT_VERTEX);
                    break Ok(graph);
                };
                self.ui
                    .indicate_progress(&format!("resolving {}", next.requirement.name()));

                match try_activate(frame, &next, &self.provider, locked) {
                    ActivateOutcome::AlreadySatisfied(graph) => {
                        frame.activated = graph;
                    }
                    ActivateOutcome::Swapped(graph, pending, dropped) => {
                        frame.activated = graph;
                        frame
                            .requirements
                            .retain(|p| !dropped.iter().any(|d| d == p.requirement.name()));
                        frame.requirements.extend(pending);
                    }
                    ActivateOutcome::NeedsPossibilities(candidates) => {
                        frame.current = Some(next);
                        frame.possibilities = candidates;
                    }
                    ActivateOutcome::Conflict(conflict) => {
                        frame.conflicts.insert(conflict.name.clone(), conflict);
                        if !unwind(&mut stack) {
                            let conflicts = stack.last().map(|f| f.conflicts.clone()).unwrap_or_default();
                            break Err(ResolveError::VersionConflict(conflicts));
                        }
                    }
                    ActivateOutcome::Circular(chain) => {
                        break Err(ResolveError::CircularDependency(chain));
                    }
                }
                continue;
            }

            if let Some(candidate) = frame.possibilities.pop() {
                let current = frame
                    .current
                    .clone()
                    .expect("possibility without a current requirement");
                let mut next_graph = frame.activated.dup();
                let vertex_id = next_graph.add_child_vertex(
                    current.requirement.name(),
                    current.origin,
                    current.requirement.clone(),
                );
                let deps = self.provider.dependencies_for(&candidate);
                next_graph
                    .vertex_named_mut(current.requirement.name())
                    .unwrap()
                    .payload = Some(candidate);

                // Wire the dependency edges in immediately (payload comes
                // later, once each one's own turn is worked) so a later
                // swap of this vertex's payload can tell which existing
                // children the old dependency set pulled in.
                for dep in &deps {
                    next_graph.add_child_vertex(dep.name(), vertex_id, dep.clone());
                }

                if let Some(cycle) = next_graph.cycle_through(current.requirement.name()) {
                    break Err(ResolveError::CircularDependency(cycle));
                }

                let mut next_requirements = frame.requirements.clone();
                next_requirements.extend(deps.into_iter().map(|requirement| PendingRequirement {
                    origin: vertex_id,
                    requirement,
                }));
                let next_conflicts = frame.conflicts.clone();

                stack.push(State {
                    activated: next_graph,
                    requirements: next_requirements,
                    possibilities: Vec::new(),
                    current: None,
                    conflicts: next_conflicts,
                });
            } else {
                // No possibilities left at this frame; it's a dead end.
                stack.pop();
                if !unwind(&mut stack) {
                    break Err(ResolveError::VersionConflict(Conflicts::new()));
                }
            }
        };

        self.ui.after_resolution();
        result
    }
}

enum ActivateOutcome {
    AlreadySatisfied(Graph),
    /// The activated payload was swapped for a replacement that satisfies
    /// every incoming requirement. `dropped` names no longer have a vertex
    /// and must be purged from the pending queue too; the fresh
    /// `PendingRequirement`s are the replacement's own dependencies.
    Swapped(Graph, Vec<PendingRequirement>, Vec<String>),
    NeedsPossibilities(Vec<Specification>),
    Conflict(Conflict),
    Circular(Vec<String>),
}

fn try_activate<P: Provider>(
    frame: &State,
    pending: &PendingRequirement,
    provider: &P,
    locked: &BTreeMap<String, crate::version::Version>,
) -> ActivateOutcome {
    let name = pending.requirement.name();

    if let Some(existing) = frame.activated.vertex_named(name) {
        if let Some(payload) = existing.payload.clone() {
            let mut graph = frame.activated.dup();
            graph.add_child_vertex(name, pending.origin, pending.requirement.clone());
            if let Some(cycle) = graph.cycle_through(name) {
                return ActivateOutcome::Circular(cycle);
            }

            if provider.is_requirement_satisfied_by(&pending.requirement, &payload) {
                return ActivateOutcome::AlreadySatisfied(graph);
            }

            if let Some((swapped, pending, dropped)) = attempt_swap(&graph, name, provider, locked) {
                return ActivateOutcome::Swapped(swapped, pending, dropped);
            }

            let requirements = graph_requirements_with(&frame.activated, name, &pending.requirement);
            return ActivateOutcome::Conflict(Conflict {
                name: name.to_string(),
                requirements,
                activated_by: Some(payload),
                possibilities_exhausted: Vec::new(),
            });
        }
    }

    let mut candidates = match provider.search_for(&pending.requirement) {
        Ok(candidates) => candidates,
        Err(err) => {
            return ActivateOutcome::Conflict(Conflict {
                name: name.to_string(),
                requirements: vec![pending.requirement.clone()],
                activated_by: None,
                possibilities_exhausted: vec![err.to_string()],
            });
        }
    };

    candidates.retain(|c| provider.is_requirement_satisfied_by(&pending.requirement, c));

    candidates.retain(|c| locked.get(name).is_none_or(|lv| &c.version == lv));

    if candidates.is_empty() {
        if provider.allow_missing(&pending.requirement) {
            return ActivateOutcome::NeedsPossibilities(Vec::new());
        }
        return ActivateOutcome::Conflict(Conflict {
            name: name.to_string(),
            requirements: vec![pending.requirement.clone()],
            activated_by: None,
            possibilities_exhausted: Vec::new(),
        });
    }

    // search_for returns candidates ascending by preference (best last);
    // popping that order directly already tries the best candidate first.
    ActivateOutcome::NeedsPossibilities(candidates)
}

/// When an already-activated vertex's payload no longer satisfies every
/// requirement pointing at it, look for a replacement candidate that
/// satisfies all of them (plus the locked pin, if any) before giving up
/// and reporting a conflict. `graph` already carries the new requirement's
/// edge, so `requirements_for(name)` reflects the full set to check against.
fn attempt_swap<P: Provider>(
    graph: &Graph,
    name: &str,
    provider: &P,
    locked: &BTreeMap<String, crate::version::Version>,
) -> Option<(Graph, Vec<PendingRequirement>, Vec<String>)> {
    let requirement_stub = graph.requirements_for(name).into_iter().next()?.clone();
    let mut candidates = provider.search_for(&requirement_stub).ok()?;

    let requirements = graph.requirements_for(name);
    candidates.retain(|c| requirements.iter().all(|req| provider.is_requirement_satisfied_by(req, c)));
    candidates.retain(|c| locked.get(name).is_none_or(|lv| &c.version == lv));

    let replacement = candidates.pop()?;
    let deps = provider.dependencies_for(&replacement);
    let keep: BTreeSet<String> = deps.iter().map(|d| d.name().to_string()).collect();

    let mut swapped = graph.dup();
    let vertex_id = swapped.vertex_named(name)?.id;
    swapped.vertex_named_mut(name).unwrap().payload = Some(replacement);
    let dropped = swapped.retain_children_of(vertex_id, &keep);

    for dep in &deps {
        swapped.add_child_vertex(dep.name(), vertex_id, dep.clone());
    }

    let pending = deps
        .into_iter()
        .map(|requirement| PendingRequirement {
            origin: vertex_id,
            requirement,
        })
        .collect();

    Some((swapped, pending, dropped))
}

fn graph_requirements_with(graph: &Graph, name: &str, extra: &Requirement) -> Vec<Requirement> {
    let mut reqs: Vec<Requirement> = graph.requirements_for(name).into_iter().cloned().collect();
    reqs.push(extra.clone());
    reqs
}

/// Picks the next requirement to work on, using the provider's ordering
/// policy over every name that still has pending requirements.
fn pick_next<P: Provider>(frame: &mut State, provider: &P) -> Option<PendingRequirement> {
    if frame.requirements.is_empty() {
        return None;
    }
    let activated: BTreeMap<String, ()> = frame
        .activated
        .vertices()
        .filter(|v| v.payload.is_some())
        .map(|v| (v.name.clone(), ()))
        .collect();
    let names: Vec<String> = frame
        .requirements
        .iter()
        .map(|p| p.requirement.name().to_string())
        .collect();
    let ordered = provider.sort_dependencies(&names, &frame.conflicts, &activated);
    let chosen_name = ordered.first()?.clone();
    let index = frame
        .requirements
        .iter()
        .position(|p| p.requirement.name() == chosen_name)?;
    Some(frame.requirements.remove(index))
}

/// Pops dead-end frames until one with an untried possibility remains on
/// top. Returns false if the stack is exhausted.
fn unwind(stack: &mut Vec<State>) -> bool {
    while let Some(frame) = stack.last() {
        if !frame.possibilities.is_empty() {
            return true;
        }
        stack.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use crate::version::Version;
    use std::collections::BTreeMap as Map;
    use std::convert::Infallible;

    struct FixtureProvider {
        packages: Map<&'static str, Vec<(&'static str, Vec<&'static str>)>>,
    }

    impl FixtureProvider {
        fn new() -> Self {
            Self { packages: Map::new() }
        }

        fn add(&mut self, name: &'static str, version: &'static str, deps: Vec<&'static str>) {
            self.packages.entry(name).or_default().push((version, deps));
        }
    }

    impl Provider for FixtureProvider {
        type Error = Infallible;

        fn search_for(&self, requirement: &Requirement) -> Result<Vec<Specification>, Self::Error> {
            let mut specs: Vec<Specification> = self
                .packages
                .get(requirement.name())
                .into_iter()
                .flatten()
                .map(|(version, deps)| {
                    let dependencies = deps.iter().map(|d| Requirement::parse(d).unwrap()).collect();
                    Specification::new(
                        requirement.name(),
                        Version::parse(version).unwrap(),
                        dependencies,
                        "fixture",
                    )
                })
                .collect();
            specs.sort_by(|a, b| a.version.compare(&b.version));
            Ok(specs)
        }
    }

    fn req(s: &str) -> Requirement {
        let (name, range) = s.split_once(' ').unwrap();
        Requirement::new(name, Range::parse(range).unwrap())
    }

    #[test]
    fn resolves_a_simple_chain() {
        let mut provider = FixtureProvider::new();
        provider.add("a", "1.0.0", vec!["b >=1.0.0"]);
        provider.add("b", "1.0.0", vec![]);

        let mut resolver = Resolver::new(provider);
        let graph = resolver.resolve(vec![req("a >=1.0.0")], &Map::new()).unwrap();

        assert_eq!(
            graph.vertex_named("a").unwrap().payload.as_ref().unwrap().version.to_string(),
            "1.0.0"
        );
        assert_eq!(
            graph.vertex_named("b").unwrap().payload.as_ref().unwrap().version.to_string(),
            "1.0.0"
        );
    }

    #[test]
    fn picks_highest_satisfying_version() {
        let mut provider = FixtureProvider::new();
        provider.add("a", "1.0.0", vec![]);
        provider.add("a", "1.5.0", vec![]);
        provider.add("a", "2.0.0", vec![]);

        let mut resolver = Resolver::new(provider);
        let graph = resolver
            .resolve(vec![req("a >=1.0.0, <2.0.0")], &Map::new())
            .unwrap();

        assert_eq!(
            graph.vertex_named("a").unwrap().payload.as_ref().unwrap().version.to_string(),
            "1.5.0"
        );
    }

    #[test]
    fn reports_conflict_when_nothing_satisfies_both_requirements() {
        let mut provider = FixtureProvider::new();
        provider.add("a", "1.0.0", vec!["shared >=2.0.0"]);
        provider.add("b", "1.0.0", vec!["shared <1.0.0"]);
        provider.add("shared", "1.5.0", vec![]);

        let mut resolver = Resolver::new(provider);
        let err = resolver
            .resolve(vec![req("a >=1.0.0"), req("b >=1.0.0")], &Map::new())
            .unwrap_err();

        assert!(matches!(err, ResolveError::VersionConflict(_)));
    }

    #[test]
    fn backtracks_to_a_lower_version_to_satisfy_a_later_constraint() {
        let mut provider = FixtureProvider::new();
        provider.add("a", "1.0.0", vec!["shared >=1.0.0"]);
        provider.add("b", "1.0.0", vec!["shared <2.0.0"]);
        provider.add("shared", "1.0.0", vec![]);
        provider.add("shared", "2.0.0", vec![]);

        let mut resolver = Resolver::new(provider);
        let graph = resolver
            .resolve(vec![req("a >=1.0.0"), req("b >=1.0.0")], &Map::new())
            .unwrap();

        assert_eq!(
            graph
                .vertex_named("shared")
                .unwrap()
                .payload
                .as_ref()
                .unwrap()
                .version
                .to_string(),
            "1.0.0"
        );
    }

    #[test]
    fn missing_package_is_reported() {
        let provider = FixtureProvider::new();
        let mut resolver = Resolver::new(provider);
        let err = resolver.resolve(vec![req("ghost >=1.0.0")], &Map::new()).unwrap_err();
        assert!(matches!(err, ResolveError::VersionConflict(_)));
    }

    #[test]
    fn reports_circular_dependency() {
        let mut provider = FixtureProvider::new();
        provider.add("a", "1.0.0", vec!["b >=1.0.0"]);
        provider.add("b", "1.0.0", vec!["a >=1.0.0"]);

        let mut resolver = Resolver::new(provider);
        let err = resolver.resolve(vec![req("a >=1.0.0")], &Map::new()).unwrap_err();
        assert!(matches!(err, ResolveError::CircularDependency(_)));
    }

    #[test]
    fn swaps_activated_payload_instead_of_conflicting() {
        let mut provider = FixtureProvider::new();
        provider.add("shared", "1.0.0", vec!["leaf-a >=1.0.0"]);
        provider.add("shared", "2.0.0", vec!["leaf-b >=1.0.0"]);
        provider.add("leaf-a", "1.0.0", vec![]);
        provider.add("leaf-b", "1.0.0", vec![]);
        provider.add("a", "1.0.0", vec!["shared >=1.0.0"]);
        provider.add("b", "1.0.0", vec!["shared <2.0.0"]);

        let mut resolver = Resolver::new(provider);
        let graph = resolver
            .resolve(vec![req("a >=1.0.0"), req("b >=1.0.0")], &Map::new())
            .unwrap();

        assert_eq!(
            graph.vertex_named("shared").unwrap().payload.as_ref().unwrap().version.to_string(),
            "1.0.0"
        );
        assert!(graph.vertex_named("leaf-a").is_some());
        assert!(graph.vertex_named("leaf-b").is_none());
    }
}
