use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};

#[derive(Debug, thiserror::Error)]
#[error("invalid version constraint '{constraint}': {source}")]
pub struct VersionError {
    pub constraint: String,
    #[source]
    pub source: semver::Error,
}

/// A semver requirement a plugin declares against the core's API version
#[derive(Debug, Clone)]
pub struct VersionRange {
    constraint: String,
    req: VersionReq,
}

impl VersionRange {
    pub fn from_constraint(constraint: &str) -> Result<Self, VersionError> {
        let req = VersionReq::parse(constraint).map_err(|source| VersionError {
            constraint: constraint.to_string(),
            source,
        })?;
        Ok(Self {
            constraint: constraint.to_string(),
            req,
        })
    }

    pub fn includes(&self, version: &Version) -> bool {
        self.req.matches(version)
    }

    pub fn constraint(&self) -> &str {
        &self.constraint
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.constraint)
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::from_constraint(s)
    }
}
