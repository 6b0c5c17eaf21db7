//! Shared models for the sync engine

mod conflict;
mod entity;
mod operation;

pub use conflict::{ConflictId, ConflictKind, ConflictResolution, ResolutionStrategy, SyncConflict};
pub use entity::EntityKind;
pub use operation::{OperationId, OperationKind, OperationStatus, SyncOperation};
