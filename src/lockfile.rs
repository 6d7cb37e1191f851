//! TOML lockfile codec. The format is hand-formatted rather than left to
//! the serializer's default layout: dependency arrays are exploded one
//! entry per line so that `git diff` on a lockfile shows exactly the
//! packages that changed.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{Graph, ROOT_VERTEX};
use crate::spec::{Requirement, Specification};
use crate::version::Version;

const LOCK_FORMAT_VERSION: u32 = 1;
const PREAMBLE: &str = "# AUTO-GENERATED: Do not modify\n\n";

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("unsupported lockfile format version {0}, expected {LOCK_FORMAT_VERSION}")]
    UnsupportedVersion(u32),
    #[error("malformed package id {0:?}, expected \"name version\"")]
    MalformedPackageId(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml decode error: {0}")]
    Decode(#[from] toml::de::Error),
    #[error("toml encode error: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid requirement: {0}")]
    Requirement(#[from] crate::spec::RequirementParseError),
    #[error("invalid version: {0}")]
    Version(#[from] crate::version::VersionError),
}

pub type Result<T> = std::result::Result<T, LockfileError>;

/// Where a locked package came from: the ordinary case is a named
/// registry; the `Release` variant covers a pinned non-registry source
/// (git repo, local path) addressed as `repo://location#revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    Registry(String),
    Release { repo: String, revision: String },
}

impl PackageSource {
    fn encode(&self) -> String {
        match self {
            PackageSource::Registry(name) => name.clone(),
            PackageSource::Release { repo, revision } => format!("repo://{repo}#{revision}"),
        }
    }

    fn decode(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix("repo://") {
            if let Some((repo, revision)) = rest.split_once('#') {
                return PackageSource::Release {
                    repo: repo.to_string(),
                    revision: revision.to_string(),
                };
            }
        }
        PackageSource::Registry(raw.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectSection {
    requirements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PackageEntry {
    source: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncodedGraph {
    #[serde(rename = "_lockFormatVersion")]
    lock_format_version: u32,
    project: ProjectSection,
    packages: BTreeMap<String, PackageEntry>,
}

/// A decoded lockfile: the original root requirements plus every locked
/// package and the source/dependency metadata needed to reproduce them
/// without re-resolving.
#[derive(Debug, Clone)]
pub struct Lockfile {
    pub requirements: Vec<Requirement>,
    pub packages: Vec<LockedPackage>,
}

#[derive(Debug, Clone)]
pub struct LockedPackage {
    pub name: String,
    pub version: Version,
    pub source: PackageSource,
    pub dependencies: Vec<Requirement>,
}

impl Lockfile {
    /// Builds a lockfile from a resolved graph, pulling package sources
    /// from each vertex's activated [`Specification`].
    pub fn from_graph(requirements: Vec<Requirement>, graph: &Graph) -> Self {
        let mut packages = Vec::new();
        for vertex in graph.vertices() {
            let Some(payload) = &vertex.payload else { continue };
            packages.push(LockedPackage {
                name: vertex.name.clone(),
                version: payload.version.clone(),
                source: PackageSource::Registry(payload.source.clone()),
                dependencies: payload.dependencies.clone(),
            });
        }
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Self { requirements, packages }
    }

    /// Rebuilds the activated [`Graph`] this lockfile was derived from:
    /// a root vertex carrying the top-level requirements, one vertex per
    /// locked package with its [`Specification`] as payload, and an edge
    /// for every dependency (and every root requirement) pointing at the
    /// vertex it's satisfied by. The inverse of [`Lockfile::from_graph`],
    /// up to vertex ids.
    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        let root_id = graph.add_vertex(ROOT_VERTEX, true);

        for pkg in &self.packages {
            let vertex_id = graph.add_vertex(&pkg.name, false);
            let spec = Specification::new(
                pkg.name.clone(),
                pkg.version.clone(),
                pkg.dependencies.clone(),
                pkg.source.encode(),
            );
            graph.vertex_named_mut(&pkg.name).unwrap().payload = Some(spec);
            for dep in &pkg.dependencies {
                graph.add_child_vertex(dep.name(), vertex_id, dep.clone());
            }
        }

        for requirement in &self.requirements {
            graph.add_child_vertex(requirement.name(), root_id, requirement.clone());
        }

        graph
    }

    /// Name -> version map, the form the resolver consults to prefer
    /// previously-locked versions on the next resolve.
    pub fn pins(&self) -> BTreeMap<String, Version> {
        self.packages
            .iter()
            .map(|p| (p.name.clone(), p.version.clone()))
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&LockedPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let mut packages = BTreeMap::new();
        for pkg in &self.packages {
            let id = format!("{} {}", pkg.name, pkg.version);
            let mut dependencies: Vec<String> = pkg.dependencies.iter().map(|r| r.to_string()).collect();
            dependencies.sort();
            packages.insert(
                id,
                PackageEntry {
                    source: pkg.source.encode(),
                    dependencies,
                },
            );
        }
        let encoded = EncodedGraph {
            lock_format_version: LOCK_FORMAT_VERSION,
            project: ProjectSection {
                requirements: self.requirements.iter().map(|r| r.to_string()).collect(),
            },
            packages,
        };
        let body = toml::to_string_pretty(&encoded)?;
        Ok(format!("{PREAMBLE}{}", explode_dependency_arrays(&body)))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let decoded: EncodedGraph = toml::from_str(raw)?;
        if decoded.lock_format_version != LOCK_FORMAT_VERSION {
            return Err(LockfileError::UnsupportedVersion(decoded.lock_format_version));
        }

        let mut requirements = Vec::new();
        for raw_req in decoded.project.requirements {
            requirements.push(Requirement::parse(&raw_req)?);
        }

        let mut packages = Vec::new();
        for (id, entry) in decoded.packages {
            let (name, version) = id
                .split_once(' ')
                .ok_or_else(|| LockfileError::MalformedPackageId(id.clone()))?;
            let mut dependencies = Vec::new();
            for raw_dep in entry.dependencies {
                dependencies.push(Requirement::parse(&raw_dep)?);
            }
            packages.push(LockedPackage {
                name: name.to_string(),
                version: Version::parse(version)?,
                source: PackageSource::decode(&entry.source),
                dependencies,
            });
        }
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { requirements, packages })
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let body = self.to_toml_string()?;
        fs::write(path, body)?;
        Ok(())
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Splits `"a, b", "c, d"` on the commas that separate array entries,
/// ignoring commas that fall inside a quoted string (dependency entries
/// can themselves contain commas, e.g. a range like `">=1.0.0, <2.0.0"`).
fn split_top_level_commas(items: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    let bytes = items.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                entries.push(items[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = items[start..].trim();
    if !last.is_empty() {
        entries.push(last);
    }
    entries
}

/// Rewrites every `key = ["a", "b"]` inline array onto its own indented
/// lines so lockfile diffs stay package-at-a-time instead of line-at-a-time.
fn explode_dependency_arrays(body: &str) -> String {
    let inline_array = Regex::new(r#"(?m)^(\s*)(\w+) = \[(.*)\]$"#).unwrap();
    inline_array
        .replace_all(body, |caps: &regex::Captures| {
            let indent = &caps[1];
            let key = &caps[2];
            let items = caps[3].trim();
            if items.is_empty() {
                return format!("{indent}{key} = []");
            }
            let entries: Vec<&str> = split_top_level_commas(items);
            let mut out = format!("{indent}{key} = [\n");
            for entry in entries {
                out.push_str(&format!("{indent}  {entry},\n"));
            }
            out.push_str(&format!("{indent}]"));
            out
        })
        .into_owned()
}
