//! Sync conflict model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::EntityKind;

/// A unique identifier for a detected conflict, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Create a new unique conflict ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// How the local and remote sides diverged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides updated the same record
    UpdateConflict,
    /// The record was deleted locally but changed remotely
    DeleteConflict,
    /// A locally created record's id already exists remotely
    CreateConflict,
}

impl ConflictKind {
    /// Short label for logs and CLI output
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::UpdateConflict => "update_conflict",
            Self::DeleteConflict => "delete_conflict",
            Self::CreateConflict => "create_conflict",
        }
    }
}

/// Which side a resolution settles on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    LocalWins,
    RemoteWins,
    Merge,
    Manual,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocalWins => "local_wins",
            Self::RemoteWins => "remote_wins",
            Self::Merge => "merge",
            Self::Manual => "manual",
        };
        write!(f, "{name}")
    }
}

/// Outcome of resolving one conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub strategy: ResolutionStrategy,
    /// Merged record, present only for `Merge`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_data: Option<Value>,
    /// True only for `Manual`
    #[serde(default)]
    pub requires_user_input: bool,
}

impl ConflictResolution {
    #[must_use]
    pub const fn local_wins() -> Self {
        Self {
            strategy: ResolutionStrategy::LocalWins,
            resolved_data: None,
            requires_user_input: false,
        }
    }

    #[must_use]
    pub const fn remote_wins() -> Self {
        Self {
            strategy: ResolutionStrategy::RemoteWins,
            resolved_data: None,
            requires_user_input: false,
        }
    }

    #[must_use]
    pub const fn merge(resolved_data: Value) -> Self {
        Self {
            strategy: ResolutionStrategy::Merge,
            resolved_data: Some(resolved_data),
            requires_user_input: false,
        }
    }

    #[must_use]
    pub const fn manual() -> Self {
        Self {
            strategy: ResolutionStrategy::Manual,
            resolved_data: None,
            requires_user_input: true,
        }
    }
}

/// A detected divergence between local and remote state for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub id: ConflictId,
    pub entity: EntityKind,
    pub entity_id: String,
    /// Local snapshot at detection time
    pub local_data: Value,
    /// Remote snapshot at detection time
    pub remote_data: Value,
    pub local_timestamp: i64,
    pub remote_timestamp: i64,
    pub kind: ConflictKind,
    /// Set once a resolver or a manual actor decides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conflict_id_parse_round_trip() {
        let id = ConflictId::new();
        let parsed: ConflictId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn resolution_constructors_set_flags() {
        assert!(!ConflictResolution::local_wins().requires_user_input);
        assert!(ConflictResolution::manual().requires_user_input);
        assert_eq!(
            ConflictResolution::merge(json!({"a": 1})).resolved_data,
            Some(json!({"a": 1}))
        );
    }

    #[test]
    fn conflict_kind_serializes_snake_case() {
        let value = serde_json::to_value(ConflictKind::UpdateConflict).unwrap();
        assert_eq!(value, "update_conflict");
    }

    #[test]
    fn conflict_round_trips_through_json() {
        let conflict = SyncConflict {
            id: ConflictId::new(),
            entity: EntityKind::Workout,
            entity_id: "w1".to_string(),
            local_data: json!({"id": "w1", "name": "Push"}),
            remote_data: json!({"id": "w1", "name": "Pull"}),
            local_timestamp: 2000,
            remote_timestamp: 100,
            kind: ConflictKind::UpdateConflict,
            resolution: None,
            created_at: 3000,
        };
        let value = serde_json::to_value(&conflict).unwrap();
        let back: SyncConflict = serde_json::from_value(value).unwrap();
        assert_eq!(back, conflict);
    }
}
