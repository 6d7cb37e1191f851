use std::collections::BTreeMap;
use std::convert::Infallible;

use corral::provider::Provider;
use corral::range::Range;
use corral::resolver::{Resolver};
use corral::spec::{Requirement, Specification};
use corral::version::Version;

#[derive(Default)]
struct FixtureProvider {
    packages: BTreeMap<String, Vec<(&'static str, Vec<&'static str>)>>,
}

impl FixtureProvider {
    fn add(&mut self, name: &str, version: &'static str, deps: impl Into<Vec<&'static str>>) {
        self.packages
            .entry(name.to_string())
            .or_default()
            .push((version, deps.into()));
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
                let dependencies = deps.iter().copied().map(req).collect();
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
    let (name, range) = s.split_once(' ').unwrap_or((s, "*"));
    Requirement::new(name, Range::parse(range).unwrap())
}

#[test]
fn resolves_simple_dependency_tree() {
    let mut provider = FixtureProvider::default();
    provider.add("app", "1.0.0", vec!["lib-a >=1.0.0", "lib-b >=2.0.0"]);
    provider.add("lib-a", "1.0.0", vec!["lib-c >=1.0.0"]);
    provider.add("lib-b", "2.0.0", vec![]);
    provider.add("lib-c", "1.0.0", vec![]);

    let mut resolver = Resolver::new(provider);
    let graph = resolver.resolve(vec![req("app >=1.0.0")], &BTreeMap::new()).unwrap();

    let expect: BTreeMap<&str, &str> = BTreeMap::from([
        ("app", "1.0.0"),
        ("lib-a", "1.0.0"),
        ("lib-b", "2.0.0"),
        ("lib-c", "1.0.0"),
    ]);
    for (name, version) in expect {
        let spec = graph.vertex_named(name).and_then(|v| v.payload.as_ref()).unwrap();
        assert_eq!(spec.version.to_string(), version);
    }
}

#[test]
fn fails_on_missing_package() {
    let provider = FixtureProvider::default();
    let mut resolver = Resolver::new(provider);
    let err = resolver.resolve(vec![req("missing >=1.0.0")], &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, corral::conflict::ResolveError::VersionConflict(_)));
}

#[test]
fn detects_version_conflict_between_two_requirements_on_the_same_name() {
    let mut provider = FixtureProvider::default();
    provider.add("root-a", "1.0.0", vec!["lib ==1.0.0"]);
    provider.add("root-b", "1.0.0", vec!["lib ==2.0.0"]);
    provider.add("lib", "1.0.0", vec![]);
    provider.add("lib", "2.0.0", vec![]);

    let mut resolver = Resolver::new(provider);
    let err = resolver
        .resolve(vec![req("root-a >=1.0.0"), req("root-b >=1.0.0")], &BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, corral::conflict::ResolveError::VersionConflict(_)));
}

#[test]
fn selects_highest_version_for_minimum_requirement() {
    let mut provider = FixtureProvider::default();
    provider.add("app", "1.0.0", vec!["lib >=1.0.0"]);
    provider.add("lib", "1.0.0", vec![]);
    provider.add("lib", "1.5.0", vec![]);
    provider.add("lib", "2.0.0", vec![]);

    let mut resolver = Resolver::new(provider);
    let graph = resolver.resolve(vec![req("app >=1.0.0")], &BTreeMap::new()).unwrap();
    let lib = graph.vertex_named("lib").and_then(|v| v.payload.as_ref()).unwrap();
    assert_eq!(lib.version.to_string(), "2.0.0");
}

#[test]
fn errors_when_no_version_meets_minimum() {
    let mut provider = FixtureProvider::default();
    provider.add("app", "1.0.0", vec!["lib >=2.0.0"]);
    provider.add("lib", "1.5.0", vec![]);

    let mut resolver = Resolver::new(provider);
    let err = resolver.resolve(vec![req("app >=1.0.0")], &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, corral::conflict::ResolveError::VersionConflict(_)));
}
