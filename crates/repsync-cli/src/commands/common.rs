//! Shared helpers for CLI commands

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use repsync_core::gateway::{HttpGateway, RemoteConfig};
use repsync_core::store::SqliteStore;
use repsync_core::{
    Error as CoreError, OperationQueue, SyncConflict, SyncManager, SyncOperation,
};
use serde::Serialize;

use crate::error::CliError;

/// Resolve the database path: explicit flag first, else the platform data dir
pub fn resolve_db_path(override_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = override_path {
        return Ok(path);
    }
    let base = dirs::data_dir().ok_or(CliError::NoDataDir)?;
    Ok(base.join("repsync").join("repsync.db"))
}

pub fn open_store(db_path: &Path) -> Result<Arc<SqliteStore>, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Arc::new(SqliteStore::open(db_path)?))
}

pub fn open_queue(db_path: &Path) -> Result<OperationQueue<SqliteStore>, CliError> {
    Ok(OperationQueue::new(open_store(db_path)?))
}

/// Manager wired to the remote API configured through the environment
pub fn open_manager(db_path: &Path) -> Result<SyncManager<SqliteStore, HttpGateway>, CliError> {
    let config = match RemoteConfig::from_env() {
        Ok(config) => config,
        Err(CoreError::InvalidConfig(_)) => return Err(CliError::RemoteNotConfigured),
        Err(error) => return Err(error.into()),
    };
    let gateway = HttpGateway::new(config)?;
    Ok(SyncManager::new(open_store(db_path)?, gateway))
}

/// Parse the payload argument; `-` reads stdin
pub fn read_payload(data: &str) -> Result<serde_json::Value, CliError> {
    let raw = if data == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        data.to_string()
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyPayload);
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Render a unix-ms timestamp as a UTC date-time
pub fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| millis.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[derive(Serialize)]
pub struct OperationItem {
    pub id: String,
    pub kind: String,
    pub entity: String,
    pub entity_id: String,
    pub status: String,
    pub attempts: u32,
    pub timestamp: i64,
}

pub fn operation_to_item(operation: &SyncOperation) -> OperationItem {
    OperationItem {
        id: operation.id.to_string(),
        kind: operation.kind.to_string(),
        entity: operation.entity.to_string(),
        entity_id: operation.entity_id().to_string(),
        status: operation.status.label().to_string(),
        attempts: operation.attempts,
        timestamp: operation.timestamp,
    }
}

pub fn format_operation_lines(operations: &[SyncOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            format!(
                "{}  {}  {} {} ({}, attempts: {})",
                operation.id,
                format_timestamp(operation.timestamp),
                operation.kind,
                operation.entity,
                operation.status.label(),
                operation.attempts,
            )
        })
        .collect()
}

#[derive(Serialize)]
pub struct ConflictItem {
    pub id: String,
    pub entity: String,
    pub entity_id: String,
    pub kind: String,
    pub local_timestamp: i64,
    pub remote_timestamp: i64,
    pub created_at: i64,
}

pub fn conflict_to_item(conflict: &SyncConflict) -> ConflictItem {
    ConflictItem {
        id: conflict.id.to_string(),
        entity: conflict.entity.to_string(),
        entity_id: conflict.entity_id.clone(),
        kind: conflict.kind.label().to_string(),
        local_timestamp: conflict.local_timestamp,
        remote_timestamp: conflict.remote_timestamp,
        created_at: conflict.created_at,
    }
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {}  {} {} (local {}, remote {})",
                conflict.id,
                format_timestamp(conflict.created_at),
                conflict.entity,
                conflict.entity_id,
                format_timestamp(conflict.local_timestamp),
                format_timestamp(conflict.remote_timestamp),
            )
        })
        .collect()
}
