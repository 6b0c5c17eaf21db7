//! Entity kind tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Kind of entity a mutation or conflict refers to.
///
/// Each kind carries its local collection name and its path segment on the
/// remote API. Resolution policy lives in the resolver registry, so adding a
/// kind is one variant here plus a resolver registration; the sync manager
/// itself has no per-kind branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A logged training session, including its exercise sub-records
    Workout,
    /// Reference exercise definitions, edited centrally
    Exercise,
    /// The user's profile
    Profile,
    /// Application settings
    Settings,
}

impl EntityKind {
    /// All known entity kinds
    pub const ALL: [Self; 4] = [Self::Workout, Self::Exercise, Self::Profile, Self::Settings];

    /// Local store collection holding records of this kind
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Workout => "workouts",
            Self::Exercise => "exercises",
            Self::Profile => "profiles",
            Self::Settings => "settings",
        }
    }

    /// Path segment under `/api/` on the remote side
    #[must_use]
    pub const fn api_segment(self) -> &'static str {
        self.collection()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Workout => "workout",
            Self::Exercise => "exercise",
            Self::Profile => "profile",
            Self::Settings => "settings",
        };
        write!(f, "{name}")
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workout" => Ok(Self::Workout),
            "exercise" => Ok(Self::Exercise),
            "profile" => Ok(Self::Profile),
            "settings" => Ok(Self::Settings),
            other => Err(Error::UnknownEntity(other.to_string())),
        }
    }
}
