//! Kubernetes version parsing
//!
//! Accepts the forms found in cluster specs and node status:
//! `1.30`, `1.30.2`, `v1.30.2`, `v1.30.2-gke.100`, `v1.30.2+k3s1`.
//! Pre-release and build suffixes are ignored for comparison.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A parsed `major.minor.patch` Kubernetes version
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KubernetesVersion {
    /// Major version
    pub major: u64,
    /// Minor version
    pub minor: u64,
    /// Patch version (0 when omitted)
    pub patch: u64,
}

impl KubernetesVersion {
    /// Create a version from its components
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns true if both versions share major and minor
    pub fn same_minor(&self, other: &KubernetesVersion) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl FromStr for KubernetesVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = bare.split(['-', '+']).next().unwrap_or_default();

        let mut parts = core.split('.');
        let parse = |part: Option<&str>, name: &str| -> Result<u64, Error> {
            let part = part.ok_or_else(|| Error::version(s, format!("missing {name} version")))?;
            part.parse()
                .map_err(|_| Error::version(s, format!("{name} version {part:?} is not a number")))
        };

        let major = parse(parts.next(), "major")?;
        let minor = parse(parts.next(), "minor")?;
        let patch = match parts.next() {
            Some(p) => parse(Some(p), "patch")?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(Error::version(s, "too many version components"));
        }

        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
