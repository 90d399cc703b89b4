//! DHIS2 server versions understood by the schema layer

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A supported DHIS2 release line, or [`RemoteVersion::Unknown`].
///
/// Known versions are totally ordered by release. `Unknown` has no position
/// in that order: it compares equal only to itself and is unordered against
/// every known version, so it never takes part in fallback resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RemoteVersion {
    V2_36,
    V2_37,
    V2_38,
    V2_39,
    V2_40,
    V2_41,
    Unknown,
}

impl RemoteVersion {
    /// Known versions, oldest first
    pub const KNOWN: [RemoteVersion; 6] = [
        RemoteVersion::V2_36,
        RemoteVersion::V2_37,
        RemoteVersion::V2_38,
        RemoteVersion::V2_39,
        RemoteVersion::V2_40,
        RemoteVersion::V2_41,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RemoteVersion::V2_36 => "2.36",
            RemoteVersion::V2_37 => "2.37",
            RemoteVersion::V2_38 => "2.38",
            RemoteVersion::V2_39 => "2.39",
            RemoteVersion::V2_40 => "2.40",
            RemoteVersion::V2_41 => "2.41",
            RemoteVersion::Unknown => "unknown",
        }
    }

    /// Position in release order; `None` for `Unknown`
    pub fn rank(self) -> Option<u8> {
        match self {
            RemoteVersion::V2_36 => Some(36),
            RemoteVersion::V2_37 => Some(37),
            RemoteVersion::V2_38 => Some(38),
            RemoteVersion::V2_39 => Some(39),
            RemoteVersion::V2_40 => Some(40),
            RemoteVersion::V2_41 => Some(41),
            RemoteVersion::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self.rank().is_some()
    }

    pub fn latest() -> Self {
        RemoteVersion::V2_41
    }

    fn from_minor(minor: u32) -> Self {
        u8::try_from(minor)
            .ok()
            .and_then(|m| Self::KNOWN.into_iter().find(|v| v.rank() == Some(m)))
            .unwrap_or(RemoteVersion::Unknown)
    }
}

impl PartialOrd for RemoteVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses `2.38`, `2.38.1`, `v2.38` or `2.38-SNAPSHOT`.
///
/// Anything unrecognized maps to `Unknown` rather than failing.
impl FromStr for RemoteVersion {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        let mut parts = trimmed.split('.');

        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().and_then(|p| {
            let digits: String = p.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        });

        Ok(match (major, minor) {
            (Some(2), Some(minor)) => Self::from_minor(minor),
            _ => RemoteVersion::Unknown,
        })
    }
}

impl From<String> for RemoteVersion {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }
}

impl From<RemoteVersion> for String {
    fn from(v: RemoteVersion) -> Self {
        v.as_str().to_string()
    }
}
