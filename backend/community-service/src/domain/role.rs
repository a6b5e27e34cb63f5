/// Role canonicalization
///
/// Historical records spell roles inconsistently ("club head", "Club Head",
/// "clubhead", "ClubHead", ...). Every role comparison in this crate goes
/// through [`canonicalize`]; raw role strings are never compared directly.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed role enumeration.
///
/// Serialized with the labels the identity provider writes for new accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Student")]
    Member,
    #[serde(rename = "ClubHead")]
    Organizer,
    #[serde(rename = "College")]
    Institution,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Member => "Student",
            Role::Organizer => "ClubHead",
            Role::Institution => "College",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of canonicalizing a raw role string.
///
/// `Missing` and `Unrecognized` are kept apart: both are rejected at the
/// request boundary, but garbled values are logged for data-quality triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalRole {
    Known(Role),
    Missing,
    Unrecognized,
}

impl CanonicalRole {
    pub fn from_optional(raw: Option<&str>) -> Self {
        canonicalize(raw.unwrap_or_default())
    }

    pub fn known(self) -> Option<Role> {
        match self {
            CanonicalRole::Known(role) => Some(role),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalRole::Known(role) => f.write_str(role.label()),
            CanonicalRole::Missing => Ok(()),
            CanonicalRole::Unrecognized => f.write_str("unrecognized"),
        }
    }
}

/// Map a raw role string onto the role enumeration.
///
/// Case, whitespace (leading, trailing and inner), `_` and `-` are ignored,
/// then the compacted key is matched against the synonym table. Total: never
/// fails, unknown input yields [`CanonicalRole::Unrecognized`].
pub fn canonicalize(raw: &str) -> CanonicalRole {
    let key: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();

    if key.is_empty() {
        return CanonicalRole::Missing;
    }

    match key.as_str() {
        "student" | "member" => CanonicalRole::Known(Role::Member),
        "clubhead" | "organizer" | "organiser" => CanonicalRole::Known(Role::Organizer),
        "college" | "collegeadmin" | "admin" | "institution" => {
            CanonicalRole::Known(Role::Institution)
        }
        _ => CanonicalRole::Unrecognized,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a recognized role")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        canonicalize(s).known().ok_or_else(|| UnknownRole(s.to_string()))
    }
}
