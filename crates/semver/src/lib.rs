//! Semantic version parsing and ordering
//!
//! Versions have the shape `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]`. Ordering
//! follows semver precedence:
//!
//! - major, minor and patch compare numerically
//! - a version without a pre-release sorts above the same version with one
//! - pre-release identifiers compare field by field: numeric identifiers
//!   compare numerically and sort below alphanumeric ones, alphanumeric ones
//!   compare in ASCII order, and with a common prefix the longer list wins
//!
//! Build metadata has no effect on precedence. [`SemverVersion`]'s `Ord` still
//! has to agree with `Eq`, so it breaks precedence ties by comparing build
//! metadata lexically; use [`SemverVersion::precedence_cmp`] for the pure
//! precedence comparison.

use std::{cmp::Ordering, fmt, str::FromStr};

/// Errors produced while parsing a version string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty version string")]
    Empty,

    #[error("expected MAJOR.MINOR.PATCH, found {0:?}")]
    MissingComponent(String),

    #[error("invalid numeric component {0:?}")]
    InvalidNumber(String),

    #[error("numeric component {0:?} has a leading zero")]
    LeadingZero(String),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
}

/// A parsed semantic version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemverVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre_release: Option<String>,
    build_metadata: Option<String>,
}

/// A single dot-separated pre-release identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identifier<'a> {
    Numeric(u64),
    AlphaNumeric(&'a str),
}

impl<'a> Identifier<'a> {
    fn classify(raw: &'a str) -> Self {
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            // validated at parse time, so this only overflows on absurd input
            match raw.parse() {
                Ok(n) => Identifier::Numeric(n),
                Err(_) => Identifier::AlphaNumeric(raw),
            }
        } else {
            Identifier::AlphaNumeric(raw)
        }
    }
}

impl Ord for Identifier<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::AlphaNumeric(_)) => Ordering::Less,
            (Identifier::AlphaNumeric(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::AlphaNumeric(a), Identifier::AlphaNumeric(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SemverVersion {
    /// Create a release version with no pre-release or build metadata
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: None,
            build_metadata: None,
        }
    }

    /// Parse a version string, tolerating a leading `v` or `=`
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('='))
            .unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let (rest, build_metadata) = match trimmed.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (trimmed, None),
        };
        let (core, pre_release) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let mut components = core.split('.');
        let mut next_component = || {
            components
                .next()
                .ok_or_else(|| ParseError::MissingComponent(core.to_string()))
                .and_then(parse_numeric)
        };
        let major = next_component()?;
        let minor = next_component()?;
        let patch = next_component()?;
        if components.next().is_some() {
            return Err(ParseError::MissingComponent(core.to_string()));
        }

        if let Some(pre) = pre_release {
            validate_identifiers(pre, true)?;
        }
        if let Some(build) = build_metadata {
            validate_identifiers(build, false)?;
        }

        Ok(Self {
            major,
            minor,
            patch,
            pre_release: pre_release.map(str::to_string),
            build_metadata: build_metadata.map(str::to_string),
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn pre_release(&self) -> Option<&str> {
        self.pre_release.as_deref()
    }

    pub fn build_metadata(&self) -> Option<&str> {
        self.build_metadata.as_deref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre_release.is_some()
    }

    pub fn has_build_metadata(&self) -> bool {
        self.build_metadata.is_some()
    }

    /// Compare by semver precedence only, ignoring build metadata
    pub fn precedence_cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| {
                compare_pre_release(self.pre_release.as_deref(), other.pre_release.as_deref())
            })
    }
}

fn parse_numeric(raw: &str) -> Result<u64, ParseError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber(raw.to_string()));
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return Err(ParseError::LeadingZero(raw.to_string()));
    }
    raw.parse()
        .map_err(|_| ParseError::InvalidNumber(raw.to_string()))
}

fn validate_identifiers(raw: &str, reject_leading_zero: bool) -> Result<(), ParseError> {
    for identifier in raw.split('.') {
        let valid_chars = identifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-');
        if identifier.is_empty() || !valid_chars {
            return Err(ParseError::InvalidIdentifier(raw.to_string()));
        }
        let numeric = identifier.bytes().all(|b| b.is_ascii_digit());
        if reject_leading_zero && numeric && identifier.len() > 1 && identifier.starts_with('0') {
            return Err(ParseError::LeadingZero(identifier.to_string()));
        }
    }
    Ok(())
}

fn compare_pre_release(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        // a release sorts above any of its pre-releases
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let lhs = a.split('.').map(Identifier::classify);
            let rhs = b.split('.').map(Identifier::classify);
            // lexicographic iterator ordering gives "longer wins on common prefix"
            lhs.cmp(rhs)
        }
    }
}

impl Ord for SemverVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence_cmp(other)
            .then_with(|| self.build_metadata.cmp(&other.build_metadata))
    }
}

impl PartialOrd for SemverVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for SemverVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build_metadata {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemverVersion {
        s.parse().unwrap()
    }

    #[test]
    fn parses_all_parts() {
        let version = v("1.2.3-beta.4+exp.sha.5114f85");
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.patch(), 3);
        assert_eq!(version.pre_release(), Some("beta.4"));
        assert_eq!(version.build_metadata(), Some("exp.sha.5114f85"));
        assert!(version.is_prerelease());
        assert!(version.has_build_metadata());
    }

    #[test]
    fn node_style_prefix() {
        assert_eq!(v("v6.11.0"), SemverVersion::new(6, 11, 0));
        assert_eq!(v(" =0.10.48\n"), SemverVersion::new(0, 10, 48));
    }

    #[test]
    fn precedence_chain() {
        let ordered = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
            "1.0.1",
            "1.1.0",
            "2.0.0",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }

        let mut shuffled: Vec<_> = ordered.iter().rev().map(|s| v(s)).collect();
        shuffled.sort();
        let sorted: Vec<_> = shuffled.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, ordered);
    }

    #[test]
    fn numeric_identifiers_compare_numerically() {
        assert!(v("1.0.0-2") < v("1.0.0-10"));
        assert!(v("1.0.0-10") < v("1.0.0-a"));
        assert!(v("1.10.0") > v("1.9.0"));
    }

    #[test]
    fn build_metadata_ignored_for_precedence() {
        let a = v("1.0.0+build.1");
        let b = v("1.0.0+build.2");
        assert_eq!(a.precedence_cmp(&b), Ordering::Equal);
        assert_ne!(a, b);
        assert!(a < b);
        assert!(v("1.0.0") < a);
    }

    #[test]
    fn display_round_trips() {
        for s in ["0.0.0", "1.2.3-x-y-z.-", "10.20.30+meta-valid"] {
            assert_eq!(v(s).to_string(), s);
        }
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(SemverVersion::parse(""), Err(ParseError::Empty));
        assert!(matches!(
            SemverVersion::parse("1.2"),
            Err(ParseError::MissingComponent(_))
        ));
        assert!(matches!(
            SemverVersion::parse("1.2.3.4"),
            Err(ParseError::MissingComponent(_))
        ));
        assert!(matches!(
            SemverVersion::parse("01.2.3"),
            Err(ParseError::LeadingZero(_))
        ));
        assert!(matches!(
            SemverVersion::parse("1.2.3-01"),
            Err(ParseError::LeadingZero(_))
        ));
        assert!(matches!(
            SemverVersion::parse("1.2.3-alpha..1"),
            Err(ParseError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            SemverVersion::parse("1.2.x"),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            SemverVersion::parse("1.2.3+b_d"),
            Err(ParseError::InvalidIdentifier(_))
        ));
    }
}
