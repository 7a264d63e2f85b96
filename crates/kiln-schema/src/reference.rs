//! Requirement references: `name/[constraint]@user/channel`.
//!
//! The version constraint is carried verbatim. Whether it is satisfiable is
//! for the package manager's solver to decide.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

use crate::types::PackageName;

static REFERENCE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^(?P<name>[A-Za-z0-9_][A-Za-z0-9_.+-]*)/(?P<constraint>\[[^\]]*\]|[^@/\s\[\]]+)(?:@(?P<user>[A-Za-z0-9_.+-]+)/(?P<channel>[A-Za-z0-9_.+-]+))?$",
    )
    .unwrap_or_else(|e| unreachable!("reference pattern is a literal: {e}"))
});

/// Errors produced when parsing a requirement reference.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// The text does not have the `name/version[@user/channel]` shape.
    #[error("malformed requirement reference '{0}' (expected name/version[@user/channel])")]
    Malformed(String),
}

/// A version or version range, kept exactly as written.
///
/// Ranges are written in brackets (`[>=1.69]`); a bare version pins exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionConstraint(String);

impl VersionConstraint {
    /// Wrap constraint text without interpreting it.
    pub fn new(text: &str) -> Self {
        Self(text.to_string())
    }

    /// The constraint as written, brackets included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a bracketed range rather than a pinned version.
    pub fn is_range(&self) -> bool {
        self.0.starts_with('[') && self.0.ends_with(']')
    }

    /// Best-effort semver view for consumers that want one.
    ///
    /// Returns `None` when the text is not a valid semver requirement;
    /// that is not an error at this layer.
    pub fn as_semver(&self) -> Option<semver::VersionReq> {
        let inner = if self.is_range() {
            &self.0[1..self.0.len() - 1]
        } else {
            self.0.as_str()
        };
        let req = if self.is_range() {
            inner
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            format!("={inner}")
        };
        semver::VersionReq::parse(&req).ok()
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `user/channel` pair a requirement is resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    /// Publishing user or organisation.
    pub user: String,
    /// Channel name (e.g. `stable`).
    pub channel: String,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user, self.channel)
    }
}

/// One required external package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DependencySpec {
    /// Required package.
    pub name: PackageName,
    /// Version or range the package must satisfy.
    pub constraint: VersionConstraint,
    /// Source channel, if the reference names one.
    pub channel: Option<Channel>,
}

impl std::fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.constraint)?;
        if let Some(channel) = &self.channel {
            write!(f, "@{channel}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DependencySpec {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = REFERENCE_RE
            .captures(s.trim())
            .ok_or_else(|| ReferenceError::Malformed(s.to_string()))?;

        let channel = match (caps.name("user"), caps.name("channel")) {
            (Some(user), Some(channel)) => Some(Channel {
                user: user.as_str().to_string(),
                channel: channel.as_str().to_string(),
            }),
            _ => None,
        };

        Ok(Self {
            name: PackageName::new(&caps["name"]),
            constraint: VersionConstraint::new(&caps["constraint"]),
            channel,
        })
    }
}

impl TryFrom<String> for DependencySpec {
    type Error = ReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DependencySpec> for String {
    fn from(spec: DependencySpec) -> Self {
        spec.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reference() {
        let spec: DependencySpec = "boost_format/[>=1.69]@bincrafters/stable".parse().unwrap();
        assert_eq!(spec.name, PackageName::new("boost_format"));
        assert_eq!(spec.constraint.as_str(), "[>=1.69]");
        assert!(spec.constraint.is_range());
        assert_eq!(
            spec.channel,
            Some(Channel {
                user: "bincrafters".to_string(),
                channel: "stable".to_string()
            })
        );
        assert_eq!(spec.to_string(), "boost_format/[>=1.69]@bincrafters/stable");
    }

    #[test]
    fn test_parse_pinned_without_channel() {
        let spec: DependencySpec = "zlib/1.2.11".parse().unwrap();
        assert_eq!(spec.constraint.as_str(), "1.2.11");
        assert!(!spec.constraint.is_range());
        assert!(spec.channel.is_none());
    }

    #[test]
    fn test_malformed_references() {
        for bad in ["", "gtest", "gtest/", "gtest/[>=1.8.1]@bincrafters", "a b/1.0"] {
            assert!(bad.parse::<DependencySpec>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_semver_view() {
        let range = VersionConstraint::new("[>=1.8.1]");
        let req = range.as_semver().unwrap();
        assert!(req.matches(&semver::Version::new(1, 10, 0)));
        assert!(!req.matches(&semver::Version::new(1, 8, 0)));

        let compound = VersionConstraint::new("[>=1.0 <2.0]");
        let req = compound.as_semver().unwrap();
        assert!(req.matches(&semver::Version::new(1, 5, 0)));
        assert!(!req.matches(&semver::Version::new(2, 0, 0)));

        assert!(VersionConstraint::new("[~=weird]").as_semver().is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let spec: DependencySpec = "gtest/[>=1.8.1]@bincrafters/stable".parse().unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, "\"gtest/[>=1.8.1]@bincrafters/stable\"");
        let back: DependencySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
