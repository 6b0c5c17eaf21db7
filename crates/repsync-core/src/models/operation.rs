//! Sync operation model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::util::unix_millis_now;

/// A unique identifier for a sync operation, using UUID v7 (time-sortable)
///
/// Lexicographic id order is enqueue order, which is what the queue sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Create a new unique operation ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of local mutation an operation records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{name}")
    }
}

/// Processing state of an operation
///
/// `Failed` always carries the reason, so a failure without a diagnostic
/// message cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed { message: String },
}

impl OperationStatus {
    /// Short label for logs and CLI output
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A durable record of one locally originated mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    /// Unique identifier, assigned at creation
    pub id: OperationId,
    /// Kind of mutation
    pub kind: OperationKind,
    /// Entity kind the mutation applies to
    pub entity: EntityKind,
    /// Entity payload; carries the entity's `id` field
    pub data: Value,
    /// Local creation time (Unix ms), used for conflict tie-breaking
    pub timestamp: i64,
    /// Current processing state
    pub status: OperationStatus,
    /// Number of execution attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// When the last attempt was made (Unix ms)
    #[serde(default)]
    pub last_attempt_at: Option<i64>,
    /// When the operation completed (Unix ms)
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl SyncOperation {
    /// Create a pending operation for the given mutation.
    ///
    /// The payload must be a JSON object carrying a non-empty string `id`,
    /// so the remote record the mutation targets is always addressable.
    pub fn new(kind: OperationKind, entity: EntityKind, data: Value) -> Result<Self> {
        let id_field = data
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if id_field.is_empty() {
            return Err(Error::InvalidOperation(
                "payload must be an object with a non-empty string \"id\"".to_string(),
            ));
        }

        Ok(Self {
            id: OperationId::new(),
            kind,
            entity,
            data,
            timestamp: unix_millis_now(),
            status: OperationStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
            completed_at: None,
        })
    }

    /// Id of the entity this operation targets
    #[must_use]
    pub fn entity_id(&self) -> &str {
        self.data
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}
