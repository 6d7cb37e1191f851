//! Version range algebra: parsing and evaluating requirement strings like
//! `">=1.2, <2.0"`, `"~> 1.4"`, `"^2.0.0 || ^3.0.0"`.
//!
//! A range is a disjunction (`||`) of clauses; a clause is a conjunction of
//! comparators joined by whitespace and/or a comma. `^` and `~`/`~>` are
//! shortcuts that expand to a conjunction of two comparators at parse time.

use std::fmt;

use thiserror::Error;

use crate::version::{Version, VersionError};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RangeError {
    #[error("empty comparator in range {0:?}")]
    EmptyComparator(String),
    #[error("unknown operator {0:?} in range {1:?}")]
    UnknownOperator(String, String),
    #[error("invalid version in range {1:?}: {0}")]
    InvalidVersion(VersionError, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn matches(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Op::Eq => ord == Equal,
            Op::Ne => ord != Equal,
            Op::Lt => ord == Less,
            Op::Le => ord != Greater,
            Op::Gt => ord == Greater,
            Op::Ge => ord != Less,
        }
    }
}

#[derive(Debug, Clone)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    /// A comparator matches `v` when the operator holds *and* the
    /// prerelease gate passes: a prerelease `v` is only let through by a
    /// bound that is itself a prerelease with the same major.minor.patch
    /// core (the common "opt-in to prereleases explicitly" convention).
    /// This gate applies per comparator, not once per clause, so each
    /// bound in `^`/`~`-expanded ranges is checked against the core it was
    /// itself built from.
    fn matches(&self, v: &Version) -> bool {
        self.op.matches(v.compare(&self.version)) && self.allows_prerelease_of(v)
    }

    fn allows_prerelease_of(&self, v: &Version) -> bool {
        let pre1 = v.is_prerelease();
        let pre2 = self.version.is_prerelease();
        if !pre1 {
            return true;
        }
        if pre2 {
            return v.major() == self.version.major()
                && v.minor() == self.version.minor()
                && v.patch() == self.version.patch();
        }
        false
    }
}

/// A single AND-conjunction of comparators.
#[derive(Debug, Clone)]
struct Clause(Vec<Comparator>);

impl Clause {
    fn matches(&self, v: &Version) -> bool {
        self.0.iter().all(|c| c.matches(v))
    }
}

/// A parsed version range: an OR of AND-clauses.
#[derive(Debug, Clone)]
pub struct Range {
    raw: String,
    clauses: Vec<Clause>,
}

impl Range {
    pub fn parse(raw: &str) -> Result<Self, RangeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Range {
                raw: raw.to_string(),
                clauses: vec![Clause(vec![Comparator {
                    op: Op::Ge,
                    version: Version::parse("0.0.0").unwrap(),
                }])],
            });
        }

        let mut clauses = Vec::new();
        for segment in split_or(trimmed) {
            clauses.push(parse_clause(segment, raw)?);
        }
        Ok(Range {
            raw: raw.to_string(),
            clauses,
        })
    }

    /// True when `version` satisfies at least one clause of the range.
    /// Prerelease versions are excluded unless the range explicitly
    /// mentions a prerelease with the same major.minor.patch core.
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses.iter().any(|clause| clause.matches(version))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn split_or(s: &str) -> Vec<&str> {
    s.split("||").map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn parse_clause(segment: &str, original: &str) -> Result<Clause, RangeError> {
    let mut comparators = Vec::new();
    for token in tokenize_comparators(segment) {
        comparators.extend(parse_comparator(token, original)?);
    }
    if comparators.is_empty() {
        return Err(RangeError::EmptyComparator(original.to_string()));
    }
    Ok(Clause(comparators))
}

/// Splits a clause into individual comparator tokens. Comparators are
/// separated by commas and/or runs of whitespace, except the whitespace
/// that immediately follows an operator (e.g. `"> 1.0"` is one token).
fn tokenize_comparators(segment: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = segment.trim();
    while !rest.is_empty() {
        rest = rest.trim_start_matches([',', ' ', '\t']);
        if rest.is_empty() {
            break;
        }
        let op_len = operator_len(rest);
        let after_op = &rest[op_len..];
        let after_op_trimmed = after_op.trim_start();
        let version_len = after_op_trimmed
            .find([',', ' ', '\t'])
            .unwrap_or(after_op_trimmed.len());
        let token_len = (rest.len() - after_op_trimmed.len()) + version_len;
        tokens.push(&rest[..token_len]);
        rest = &rest[token_len..];
    }
    tokens
}

/// Greedily matches the longest known operator prefix (two-char operators
/// before their one-char subsets, so `">="` isn't read as `">"` + `"="`).
fn operator_len(s: &str) -> usize {
    const TWO_CHAR: &[&str] = &["==", "!=", "<>", "<=", ">=", "~>"];
    for op in TWO_CHAR {
        if s.starts_with(op) {
            return op.len();
        }
    }
    const ONE_CHAR: &[char] = &['=', '!', '<', '>', '^', '~'];
    if let Some(c) = s.chars().next() {
        if ONE_CHAR.contains(&c) {
            return c.len_utf8();
        }
    }
    0
}

fn parse_comparator(token: &str, original: &str) -> Result<Vec<Comparator>, RangeError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(RangeError::EmptyComparator(original.to_string()));
    }

    let op_len = operator_len(token);
    let (op_str, version_str) = token.split_at(op_len);
    let version_str = version_str.trim();

    if version_str.is_empty() {
        return Err(RangeError::EmptyComparator(original.to_string()));
    }

    match op_str {
        "" | "=" | "==" => {
            let version = parse_version(version_str, original)?;
            Ok(vec![Comparator { op: Op::Eq, version }])
        }
        "!" | "!=" | "<>" => {
            let version = parse_version(version_str, original)?;
            Ok(vec![Comparator { op: Op::Ne, version }])
        }
        "<" => Ok(vec![Comparator {
            op: Op::Lt,
            version: parse_version(version_str, original)?,
        }]),
        "<=" => Ok(vec![Comparator {
            op: Op::Le,
            version: parse_version(version_str, original)?,
        }]),
        ">" => Ok(vec![Comparator {
            op: Op::Gt,
            version: parse_version(version_str, original)?,
        }]),
        ">=" => Ok(vec![Comparator {
            op: Op::Ge,
            version: parse_version(version_str, original)?,
        }]),
        "^" => {
            let version = parse_version(version_str, original)?;
            let upper = version.major_bump();
            Ok(vec![
                Comparator { op: Op::Ge, version },
                Comparator { op: Op::Lt, version: upper },
            ])
        }
        "~" | "~>" => {
            let version = parse_version(version_str, original)?;
            let upper = version.minor_bump();
            Ok(vec![
                Comparator { op: Op::Ge, version },
                Comparator { op: Op::Lt, version: upper },
            ])
        }
        other => Err(RangeError::UnknownOperator(
            other.to_string(),
            original.to_string(),
        )),
    }
}

fn parse_version(s: &str, original: &str) -> Result<Version, RangeError> {
    Version::parse(s).map_err(|e| RangeError::InvalidVersion(e, original.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn wildcard_matches_anything() {
        let r = Range::parse("*").unwrap();
        assert!(r.matches(&v("0.0.1")));
        assert!(r.matches(&v("99.0.0")));
    }

    #[test]
    fn empty_string_is_wildcard() {
        let r = Range::parse("").unwrap();
        assert!(r.matches(&v("1.2.3")));
    }

    #[test]
    fn simple_gte() {
        let r = Range::parse(">=1.2.0").unwrap();
        assert!(r.matches(&v("1.2.0")));
        assert!(r.matches(&v("1.3.0")));
        assert!(!r.matches(&v("1.1.9")));
    }

    #[test]
    fn implicit_and_via_comma() {
        let r = Range::parse(">=1.0.0, <2.0.0").unwrap();
        assert!(r.matches(&v("1.5.0")));
        assert!(!r.matches(&v("2.0.0")));
    }

    #[test]
    fn implicit_and_via_whitespace() {
        let r = Range::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(r.matches(&v("1.5.0")));
        assert!(!r.matches(&v("0.9.0")));
    }

    #[test]
    fn or_operator() {
        let r = Range::parse("^1.0.0 || ^3.0.0").unwrap();
        assert!(r.matches(&v("1.2.0")));
        assert!(r.matches(&v("3.0.5")));
        assert!(!r.matches(&v("2.0.0")));
    }

    #[test]
    fn caret_excludes_next_major() {
        let r = Range::parse("^1.2.0").unwrap();
        assert!(r.matches(&v("1.9.9")));
        assert!(!r.matches(&v("2.0.0")));
    }

    #[test]
    fn tilde_excludes_next_minor() {
        let r = Range::parse("~>1.2.0").unwrap();
        assert!(r.matches(&v("1.2.9")));
        assert!(!r.matches(&v("1.3.0")));
    }

    #[test]
    fn not_equal_operator() {
        let r = Range::parse("!=1.0.0").unwrap();
        assert!(!r.matches(&v("1.0.0")));
        assert!(r.matches(&v("1.0.1")));
    }

    #[test]
    fn prerelease_excluded_unless_explicit() {
        let r = Range::parse(">=1.0.0").unwrap();
        assert!(!r.matches(&v("1.0.0-alpha")));

        let explicit = Range::parse(">=1.0.0-alpha").unwrap();
        assert!(explicit.matches(&v("1.0.0-alpha")));
    }

    #[test]
    fn rejects_unknown_operator() {
        assert!(Range::parse("?1.0.0").is_err());
    }

    #[test]
    fn rejects_dangling_operator() {
        assert!(Range::parse(">=").is_err());
    }
}
