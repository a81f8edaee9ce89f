//! Dotted version numbers (`major.minor[.build[.revision]]`).
//!
//! Logs, driver strings and release metadata all carry versions in this
//! shape. Missing trailing components compare lower than any present one, so
//! `1.2 < 1.2.0 < 1.2.0.0`.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build: Option<u32>,
    pub revision: Option<u32>,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            build: None,
            revision: None,
        }
    }

    pub const fn with_build(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build: Some(build),
            revision: None,
        }
    }

    pub const fn full(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build: Some(build),
            revision: Some(revision),
        }
    }

    /// Parses two to four dot-separated non-negative integers.
    pub fn parse(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input.trim().split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return None;
        }
        let mut numbers = Vec::with_capacity(parts.len());
        for part in parts {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            numbers.push(part.parse::<u32>().ok()?);
        }
        Some(Self {
            major: numbers[0],
            minor: numbers[1],
            build: numbers.get(2).copied(),
            revision: numbers.get(3).copied(),
        })
    }

    /// Build component, `0` when absent.
    pub fn build_or_zero(&self) -> u32 {
        self.build.unwrap_or(0)
    }

    /// Revision component, `0` when absent.
    pub fn revision_or_zero(&self) -> u32 {
        self.revision.unwrap_or(0)
    }

    fn key(&self) -> (i64, i64, i64, i64) {
        (
            i64::from(self.major),
            i64::from(self.minor),
            self.build.map_or(-1, i64::from),
            self.revision.map_or(-1, i64::from),
        )
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{}", build)?;
            if let Some(revision) = self.revision {
                write!(f, ".{}", revision)?;
            }
        }
        Ok(())
    }
}

/// Serialized in its dotted form.
impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_dotted_string() {
        let json = serde_json::to_string(&Some(Version::full(0, 0, 29, 15470))).unwrap();
        assert_eq!(json, r#""0.0.29.15470""#);
        assert_eq!(serde_json::to_string(&Version::new(4, 90)).unwrap(), r#""4.90""#);
    }

    #[test]
    fn parses_two_to_four_components() {
        assert_eq!(Version::parse("4.3"), Some(Version::new(4, 3)));
        assert_eq!(
            Version::parse("0.0.29.15470"),
            Some(Version::full(0, 0, 29, 15470))
        );
        assert_eq!(Version::parse("4"), None);
        assert_eq!(Version::parse("1.2.3.4.5"), None);
        assert_eq!(Version::parse("1.x"), None);
        assert_eq!(Version::parse("1..2"), None);
    }

    #[test]
    fn missing_components_sort_first() {
        assert!(Version::new(1, 2) < Version::with_build(1, 2, 0));
        assert!(Version::with_build(24, 2, 1) > Version::with_build(23, 12, 1));
        assert!(Version::full(0, 0, 21, 13432) < Version::full(0, 0, 29, 15470));
    }

    #[test]
    fn display_round_trips_components() {
        assert_eq!(Version::full(31, 0, 101, 4502).to_string(), "31.0.101.4502");
        assert_eq!(Version::new(512, 16).to_string(), "512.16");
    }
}
