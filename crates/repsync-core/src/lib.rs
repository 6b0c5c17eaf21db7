//! repsync-core - Offline sync engine for RepLog
//!
//! This crate contains the durable operation queue, conflict detection and
//! per-entity resolution, and the local/remote persistence boundaries shared
//! by all RepLog clients (mobile, web dashboard, CLI).

pub mod error;
pub mod gateway;
pub mod models;
pub mod queue;
pub mod resolve;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{
    ConflictId, ConflictKind, ConflictResolution, EntityKind, OperationId, OperationKind,
    OperationStatus, ResolutionStrategy, SyncConflict, SyncOperation,
};
pub use queue::{OperationQueue, QueueMetrics};
pub use sync::{SyncManager, SyncResult, VaultHealth};
