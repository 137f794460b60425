// src/version.rs

//! Dotted-integer versions and dependency version ranges
//!
//! Versions are sequences of non-negative integers compared position by
//! position. When two versions agree on their shared prefix the longer one
//! is newer, so `1.2 < 1.2.1` and `1.0 < 1.0.0`.
//!
//! A [`VersionRange`] is a dependency constraint with optional bounds. An
//! absent minimum is the smallest real version (`0`); an absent maximum is
//! unbounded.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A dotted-integer version such as `4.5` or `1.2.3.4`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(Vec<u64>);

impl Version {
    /// Create a version from its components
    pub fn new(parts: Vec<u64>) -> Result<Self> {
        if parts.is_empty() {
            return Err(Error::InvalidVersion("empty version".to_string()));
        }
        Ok(Self(parts))
    }

    /// The smallest real version, used for an absent lower bound
    pub fn zero() -> Self {
        Self(vec![0])
    }

    pub fn parts(&self) -> &[u64] {
        &self.0
    }
}

/// Compare two versions
///
/// Positions are compared numerically from the left. If every shared
/// position ties, the shorter version is the older one.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.0.cmp(&b.0)
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidVersion("empty version".to_string()));
        }

        let parts = s
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidVersion(s.to_string()))?;

        Ok(Self(parts))
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
            first = false;
        }
        Ok(())
    }
}

/// One end of a range, with an unbounded maximum ordering after every version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Bound {
    Finite(Version),
    Unbounded,
}

impl Bound {
    fn into_version(self) -> Option<Version> {
        match self {
            Bound::Finite(v) => Some(v),
            Bound::Unbounded => None,
        }
    }
}

/// A dependency version constraint
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    pub min_version: Option<Version>,
    pub max_version: Option<Version>,
}

impl VersionRange {
    pub fn new(min_version: Option<Version>, max_version: Option<Version>) -> Self {
        Self {
            min_version,
            max_version,
        }
    }

    /// Parse a range from optional bound strings
    pub fn parse(min: Option<&str>, max: Option<&str>) -> Result<Self> {
        Ok(Self {
            min_version: min.map(str::parse::<Version>).transpose()?,
            max_version: max.map(str::parse::<Version>).transpose()?,
        })
    }

    fn lower(&self) -> Bound {
        Bound::Finite(self.min_version.clone().unwrap_or_else(Version::zero))
    }

    fn upper(&self) -> Bound {
        match &self.max_version {
            Some(v) => Bound::Finite(v.clone()),
            None => Bound::Unbounded,
        }
    }

    /// Whether a concrete version lies within this range (inclusive)
    pub fn contains(&self, version: &Version) -> bool {
        let v = Bound::Finite(version.clone());
        self.lower() <= v && v <= self.upper()
    }

    /// Symmetric interval-overlap test
    ///
    /// True when either range's minimum falls inside the other range.
    pub fn overlaps(&self, other: &VersionRange) -> bool {
        let (a_min, a_max) = (self.lower(), self.upper());
        let (b_min, b_max) = (other.lower(), other.upper());

        (a_min >= b_min && a_min <= b_max) || (b_min >= a_min && b_min <= a_max)
    }

    /// The tightest range satisfying both constraints
    ///
    /// Sorts the four bounds and keeps the two innermost. Returns `None` when
    /// the ranges do not overlap.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        if !self.overlaps(other) {
            return None;
        }

        let mut bounds = [self.lower(), self.upper(), other.lower(), other.upper()];
        bounds.sort();
        let [_, min, max, _] = bounds;

        Some(VersionRange {
            min_version: min.into_version(),
            max_version: max.into_version(),
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min_version, &self.max_version) {
            (Some(min), Some(max)) => write!(f, "[{}, {}]", min, max),
            (Some(min), None) => write!(f, "[{}, *)", min),
            (None, Some(max)) => write!(f, "[*, {}]", max),
            (None, None) => write!(f, "*"),
        }
    }
}
