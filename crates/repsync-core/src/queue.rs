//! Durable operation queue
//!
//! Every locally originated mutation is recorded here before anything
//! touches the network. The queue is a thin repository over the store's
//! `syncQueue` collection; ordering comes from the UUID v7 operation ids.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{EntityKind, OperationId, OperationKind, OperationStatus, SyncOperation};
use crate::store::{collections, LocalStore};
use crate::util::unix_millis_now;

/// Maximum automatic execution attempts before an operation requires an
/// explicit [`OperationQueue::retry`].
pub const MAX_ATTEMPTS: u32 = 5;

/// Base delay before a failed operation becomes eligible again (doubles per
/// attempt, capped at [`RETRY_MAX_DELAY_MS`]).
pub const RETRY_BASE_DELAY_MS: i64 = 30_000;

/// Upper bound on the retry backoff delay.
pub const RETRY_MAX_DELAY_MS: i64 = 3_600_000;

/// Observability counters for the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueMetrics {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    /// completed / (completed + failed); 1.0 when nothing terminal yet
    pub success_rate: f64,
    /// Mean of (completion time - creation time) over completed operations
    pub avg_processing_ms: f64,
}

/// Durable, ordered record of outstanding local mutations.
pub struct OperationQueue<S> {
    store: Arc<S>,
}

impl<S: LocalStore> OperationQueue<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist a new pending operation. Durable write only; no network.
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        entity: EntityKind,
        data: serde_json::Value,
    ) -> Result<SyncOperation> {
        let operation = SyncOperation::new(kind, entity, data)?;
        self.persist(&operation).await?;
        debug!(operation = %operation.id, %kind, %entity, "operation enqueued");
        Ok(operation)
    }

    /// Fetch one operation by id
    pub async fn get(&self, id: OperationId) -> Result<Option<SyncOperation>> {
        match self
            .store
            .get(collections::SYNC_QUEUE, &id.to_string())
            .await?
        {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Every operation currently recorded, in enqueue order
    pub async fn all_operations(&self) -> Result<Vec<SyncOperation>> {
        self.store
            .get_all(collections::SYNC_QUEUE)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Error::from))
            .collect()
    }

    /// Operations eligible for the next sync pass, in enqueue order:
    /// everything `Pending`, plus `Failed` operations whose retry backoff has
    /// elapsed and that have attempts left. Never touches the network.
    pub async fn pending_operations(&self) -> Result<Vec<SyncOperation>> {
        let now = unix_millis_now();
        Ok(self
            .all_operations()
            .await?
            .into_iter()
            .filter(|operation| is_due(operation, now))
            .collect())
    }

    /// Transition an operation's status.
    ///
    /// Completion records `completed_at`; failure bumps the attempt counter
    /// and stamps `last_attempt_at` for the backoff schedule. Returns the
    /// updated operation.
    pub async fn update_status(
        &self,
        id: OperationId,
        status: OperationStatus,
    ) -> Result<SyncOperation> {
        let mut operation = self
            .get(id)
            .await?
            .ok_or_else(|| Error::OperationNotFound(id.to_string()))?;

        let now = unix_millis_now();
        match &status {
            OperationStatus::Completed => operation.completed_at = Some(now),
            OperationStatus::Failed { .. } => {
                operation.attempts = operation.attempts.saturating_add(1);
                operation.last_attempt_at = Some(now);
            }
            OperationStatus::Pending | OperationStatus::Processing => {}
        }
        operation.status = status;

        self.persist(&operation).await?;
        Ok(operation)
    }

    /// Re-arm a failed operation for immediate retry, clearing its attempt
    /// history. The manual escape hatch for operations past [`MAX_ATTEMPTS`].
    pub async fn retry(&self, id: OperationId) -> Result<SyncOperation> {
        let mut operation = self
            .get(id)
            .await?
            .ok_or_else(|| Error::OperationNotFound(id.to_string()))?;

        if !matches!(operation.status, OperationStatus::Failed { .. }) {
            return Err(Error::InvalidOperation(format!(
                "operation {id} is {}, only failed operations can be retried",
                operation.status.label()
            )));
        }

        operation.status = OperationStatus::Pending;
        operation.attempts = 0;
        operation.last_attempt_at = None;
        self.persist(&operation).await?;
        debug!(operation = %id, "operation re-armed for retry");
        Ok(operation)
    }

    /// Remove completed operations, returning how many were archived
    pub async fn prune_completed(&self) -> Result<usize> {
        let mut pruned = 0;
        for operation in self.all_operations().await? {
            if operation.status == OperationStatus::Completed {
                self.store
                    .delete(collections::SYNC_QUEUE, &operation.id.to_string())
                    .await?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    /// Queue counters for observability; not used for correctness
    pub async fn metrics(&self) -> Result<QueueMetrics> {
        let operations = self.all_operations().await?;

        let mut metrics = QueueMetrics {
            pending: 0,
            processing: 0,
            completed: 0,
            failed: 0,
            success_rate: 1.0,
            avg_processing_ms: 0.0,
        };
        let mut processing_total: i64 = 0;

        for operation in &operations {
            match &operation.status {
                OperationStatus::Pending => metrics.pending += 1,
                OperationStatus::Processing => metrics.processing += 1,
                OperationStatus::Completed => {
                    metrics.completed += 1;
                    if let Some(completed_at) = operation.completed_at {
                        processing_total += completed_at - operation.timestamp;
                    }
                }
                OperationStatus::Failed { .. } => metrics.failed += 1,
            }
        }

        let terminal = metrics.completed + metrics.failed;
        if terminal > 0 {
            metrics.success_rate = metrics.completed as f64 / terminal as f64;
        }
        if metrics.completed > 0 {
            metrics.avg_processing_ms = processing_total as f64 / metrics.completed as f64;
        }
        Ok(metrics)
    }

    async fn persist(&self, operation: &SyncOperation) -> Result<()> {
        let body = serde_json::to_value(operation)?;
        self.store
            .put(collections::SYNC_QUEUE, &operation.id.to_string(), &body)
            .await
    }
}

fn is_due(operation: &SyncOperation, now: i64) -> bool {
    match &operation.status {
        OperationStatus::Pending => true,
        OperationStatus::Failed { .. } => {
            operation.attempts < MAX_ATTEMPTS && now >= next_attempt_at(operation)
        }
        OperationStatus::Processing | OperationStatus::Completed => false,
    }
}

fn next_attempt_at(operation: &SyncOperation) -> i64 {
    let Some(last_attempt_at) = operation.last_attempt_at else {
        return 0;
    };
    let exponent = operation.attempts.saturating_sub(1).min(31);
    let delay = RETRY_BASE_DELAY_MS
        .saturating_mul(1_i64 << exponent)
        .min(RETRY_MAX_DELAY_MS);
    last_attempt_at.saturating_add(delay)
}
