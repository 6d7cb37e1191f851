//! Parsing and comparison for the loose, semver-ish version scheme used
//! throughout the resolver: `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]` where
//! every segment is optional and numeric parts compare numerically while
//! alphabetic parts compare lexically.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum VersionError {
    #[error("malformed version string: {0:?}")]
    Malformed(String),
}

/// A single dot-or-dash-separated identifier within a version segment.
///
/// Numeric identifiers compare by value; everything else compares as a
/// string. A numeric identifier is always considered lower than an
/// alphabetic one at the same position (mirrors semver precedence rules).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Numeric(u64),
    Alpha(String),
}

impl Part {
    fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) => Part::Numeric(n),
            Err(_) => Part::Alpha(raw.to_string()),
        }
    }
}

impl Ord for Part {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Part::Numeric(a), Part::Numeric(b)) => a.cmp(b),
            (Part::Alpha(a), Part::Alpha(b)) => a.cmp(b),
            (Part::Numeric(_), Part::Alpha(_)) => Ordering::Less,
            (Part::Alpha(_), Part::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Part {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Numeric(n) => write!(f, "{n}"),
            Part::Alpha(s) => write!(f, "{s}"),
        }
    }
}

fn split_parts(segment: &str) -> Vec<Part> {
    segment
        .split(|c| c == '.' || c == '-')
        .filter(|s| !s.is_empty())
        .map(Part::parse)
        .collect()
}

fn compare_parts(a: &[Part], b: &[Part]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let pa = a.get(i);
        let pb = b.get(i);
        let ord = match (pa, pb) {
            (Some(x), Some(y)) => x.cmp(y),
            // Missing trailing segments are treated as zero, so "1.0" == "1.0.0".
            (Some(Part::Numeric(x)), None) => x.cmp(&0),
            (None, Some(Part::Numeric(y))) => 0.cmp(y),
            (Some(Part::Alpha(_)), None) => Ordering::Greater,
            (None, Some(Part::Alpha(_))) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Controls how a [`Version`] renders back to a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Renders exactly the segments that were present on parse.
    #[default]
    Strict,
    /// Zero-pads the numeric core to three segments (rubygem-style), e.g.
    /// `"1.2"` displays as `"1.2.0"`.
    Lenient,
}

/// A parsed version: a numeric core, an optional prerelease segment, and
/// an optional build-metadata segment. Build metadata is carried for
/// display but never participates in ordering or equality.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    core: Vec<Part>,
    prerelease: Option<Vec<Part>>,
    build: Option<String>,
    display: DisplayMode,
}

impl Version {
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        Self::parse_with_display(raw, DisplayMode::Strict)
    }

    pub fn parse_lenient(raw: &str) -> Result<Self, VersionError> {
        Self::parse_with_display(raw, DisplayMode::Lenient)
    }

    pub fn parse_with_display(raw: &str, display: DisplayMode) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Malformed(raw.to_string()));
        }

        let (core_and_pre, build) = match trimmed.split_once('+') {
            Some((lhs, rhs)) => (lhs, Some(rhs.to_string())),
            None => (trimmed, None),
        };

        let (core_str, pre_str) = match core_and_pre.split_once('-') {
            Some((lhs, rhs)) => (lhs, Some(rhs)),
            None => (core_and_pre, None),
        };

        if core_str.is_empty() || !core_str.chars().next().unwrap().is_ascii_digit() {
            return Err(VersionError::Malformed(raw.to_string()));
        }

        let core = split_parts(core_str);
        if core.is_empty() || core.iter().any(|p| matches!(p, Part::Alpha(_))) {
            return Err(VersionError::Malformed(raw.to_string()));
        }

        let prerelease = pre_str.map(split_parts);

        Ok(Self {
            raw: trimmed.to_string(),
            core,
            prerelease,
            build,
            display,
        })
    }

    pub fn with_display(mut self, display: DisplayMode) -> Self {
        self.display = display;
        self
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// True when the version has exactly a major.minor.patch numeric core
    /// (ignoring prerelease/build) — the strict subset the range shortcuts
    /// ("~>" etc.) reason about.
    pub fn is_semver(&self) -> bool {
        self.core.len() == 3
    }

    fn segment(&self, index: usize) -> u64 {
        match self.core.get(index) {
            Some(Part::Numeric(n)) => *n,
            _ => 0,
        }
    }

    pub fn major(&self) -> u64 {
        self.segment(0)
    }

    pub fn minor(&self) -> u64 {
        self.segment(1)
    }

    pub fn patch(&self) -> u64 {
        self.segment(2)
    }

    /// The version that bumps the major segment and resets the rest:
    /// `1.2.3` -> `2.0.0`. Used to compute the exclusive upper bound of `^`.
    pub fn major_bump(&self) -> Version {
        Version {
            raw: String::new(),
            core: vec![Part::Numeric(self.major() + 1), Part::Numeric(0), Part::Numeric(0)],
            prerelease: None,
            build: None,
            display: self.display,
        }
    }

    /// The version that bumps the minor segment and resets the patch:
    /// `1.2.3` -> `1.3.0`. Used for `~>`/`~` shortcuts.
    pub fn minor_bump(&self) -> Version {
        Version {
            raw: String::new(),
            core: vec![
                Part::Numeric(self.major()),
                Part::Numeric(self.minor() + 1),
                Part::Numeric(0),
            ],
            prerelease: None,
            build: None,
            display: self.display,
        }
    }

    /// Compares ignoring prerelease-vs-release distinctions for equal
    /// numeric cores? No: prerelease always sorts below its release, per
    /// semver precedence (a prerelease is "less than" its final release).
    pub fn compare(&self, other: &Version) -> Ordering {
        let core_ord = compare_parts(&self.core, &other.core);
        if core_ord != Ordering::Equal {
            return core_ord;
        }
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => compare_parts(a, b),
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut core = self.core.clone();
        if self.display == DisplayMode::Lenient {
            while core.len() < 3 {
                core.push(Part::Numeric(0));
            }
        }
        let core_str = core
            .iter()
            .map(Part::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{core_str}")?;
        if let Some(pre) = &self.prerelease {
            let pre_str = pre.iter().map(Part::to_string).collect::<Vec<_>>().join(".");
            write!(f, "-{pre_str}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_core() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!((v.major(), v.minor(), v.patch()), (1, 2, 3));
        assert!(!v.is_prerelease());
    }

    #[test]
    fn rejects_leading_alpha() {
        assert!(Version::parse("v1.2.3").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn prerelease_sorts_below_release() {
        let pre = Version::parse("1.0.0-alpha").unwrap();
        let rel = Version::parse("1.0.0").unwrap();
        assert!(pre < rel);
    }

    #[test]
    fn prerelease_parts_compare_numeric_then_alpha() {
        let a = Version::parse("1.0.0-alpha.1").unwrap();
        let b = Version::parse("1.0.0-alpha.2").unwrap();
        let c = Version::parse("1.0.0-alpha.beta").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn missing_segments_treated_as_zero() {
        let a = Version::parse("1.0").unwrap();
        let b = Version::parse("1.0.0").unwrap();
        assert_eq!(a.compare(&b), Ordering::Equal);
    }

    #[test]
    fn build_metadata_ignored_in_ordering() {
        let a = Version::parse("1.0.0+001").unwrap();
        let b = Version::parse("1.0.0+002").unwrap();
        assert_eq!(a.compare(&b), Ordering::Equal);
    }

    #[test]
    fn lenient_display_pads_to_three() {
        let v = Version::parse_lenient("1.2").unwrap();
        assert_eq!(v.to_string(), "1.2.0");
    }

    #[test]
    fn strict_display_keeps_original_arity() {
        let v = Version::parse("1.2").unwrap();
        assert_eq!(v.to_string(), "1.2");
    }

    #[test]
    fn bumps() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v.major_bump().to_string(), "2.0.0");
        assert_eq!(v.minor_bump().to_string(), "1.3.0");
    }

    #[test]
    fn is_semver_requires_three_segments() {
        assert!(Version::parse("1.2.3").unwrap().is_semver());
        assert!(!Version::parse("1.2").unwrap().is_semver());
    }
}
