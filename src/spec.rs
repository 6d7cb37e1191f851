//! The two contracts the resolver is generic over: a [`Requirement`] (what a
//! dependency edge asks for) and a [`Specification`] (a concrete package
//! version a [`crate::provider::Provider`] can offer to satisfy one).
//!
//! The upstream design left these as open interfaces so any package
//! ecosystem could plug in; here they're closed enums covering the one
//! scheme this crate speaks (name + range), which keeps the resolver core
//! free of dynamic dispatch.

use std::fmt;

use crate::range::Range;
use crate::version::Version;

/// A named dependency constraint. The core only ever branches on three
/// shapes: an ordinary version-range dependency, a pin to one exact
/// version (used for baseline/lockfile pins and release co-resolution),
/// and a match by revision identifier rather than version — the `head`/
/// `**` sentinel (latest release or prerelease) or an explicit `#revision`.
#[derive(Debug, Clone)]
pub enum Requirement {
    Range { name: String, range: Range },
    Locked { name: String, version: Version },
    Revision { name: String, revision: Option<String> },
}

impl Requirement {
    pub fn new(name: impl Into<String>, range: Range) -> Self {
        Requirement::Range {
            name: name.into(),
            range,
        }
    }

    /// A pseudo-requirement satisfied only by an exact version match, as
    /// synthesised for baseline pins and for a release sub-spec forcing
    /// co-resolution of every sibling version-spec.
    pub fn locked(name: impl Into<String>, version: Version) -> Self {
        Requirement::Locked {
            name: name.into(),
            version,
        }
    }

    /// Canonical name for a release sub-specification shared by every
    /// version-spec coming from the same repository, namespaced so it
    /// can never collide with a regular package name.
    pub fn release_name(repo: &str) -> String {
        format!("repo://{repo}")
    }

    pub fn name(&self) -> &str {
        match self {
            Requirement::Range { name, .. } => name,
            Requirement::Locked { name, .. } => name,
            Requirement::Revision { name, .. } => name,
        }
    }

    /// Parses `"name op version, op version"`, splitting on the first run
    /// of whitespace so the remainder (which may itself contain spaces
    /// around comparators) is handed to the range parser whole. The
    /// remainder may instead be the `head`/`**` sentinel or a leading `#`
    /// revision identifier, in which case this yields a [`Requirement::Revision`].
    pub fn parse(raw: &str) -> Result<Self, RequirementParseError> {
        let trimmed = raw.trim();
        let split_at = trimmed
            .find(|c: char| c.is_whitespace())
            .unwrap_or(trimmed.len());
        let (name, rest) = trimmed.split_at(split_at);
        if name.is_empty() {
            return Err(RequirementParseError::MissingName(raw.to_string()));
        }
        let rest = rest.trim();

        if rest == "head" || rest == "**" {
            return Ok(Requirement::Revision {
                name: name.to_string(),
                revision: None,
            });
        }
        if let Some(revision) = rest.strip_prefix('#') {
            if revision.is_empty() {
                return Err(RequirementParseError::MissingRevision(raw.to_string()));
            }
            return Ok(Requirement::Revision {
                name: name.to_string(),
                revision: Some(revision.to_string()),
            });
        }

        let range = Range::parse(rest).map_err(|e| RequirementParseError::InvalidRange(raw.to_string(), e))?;
        Ok(Requirement::Range {
            name: name.to_string(),
            range,
        })
    }

    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        match self {
            Requirement::Range { range, .. } => range.matches(version),
            Requirement::Locked { version: locked, .. } => version == locked,
            Requirement::Revision { .. } => true,
        }
    }
}

/// Renders as `"name range"` for the common case, the same shape
/// [`Requirement::parse`] reads, so lockfile and project-file round-trips
/// go through one format.
impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Range { name, range } => write!(f, "{name} {range}"),
            Requirement::Locked { name, version } => write!(f, "{name} ={version}"),
            Requirement::Revision { name, revision: None } => write!(f, "{name} head"),
            Requirement::Revision { name, revision: Some(rev) } => write!(f, "{name} #{rev}"),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RequirementParseError {
    #[error("requirement {0:?} has no package name")]
    MissingName(String),
    #[error("requirement {0:?} has an invalid range: {1}")]
    InvalidRange(String, crate::range::RangeError),
    #[error("requirement {0:?} has an empty revision after '#'")]
    MissingRevision(String),
}

/// A concrete, installable version of a package that a provider can
/// propose to satisfy a [`Requirement`].
#[derive(Debug, Clone)]
pub struct Specification {
    pub name: String,
    pub version: Version,
    /// The dependencies this version itself pulls in.
    pub dependencies: Vec<Requirement>,
    /// Where this possibility came from, for conflict reporting
    /// (e.g. a registry name or "lockfile").
    pub source: String,
}

impl Specification {
    pub fn new(
        name: impl Into<String>,
        version: Version,
        dependencies: Vec<Requirement>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies,
            source: source.into(),
        }
    }
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
