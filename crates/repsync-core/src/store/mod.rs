//! Local durable store abstraction
//!
//! The engine treats local persistence as a collaborator exposing
//! get/put/delete/get-all per named collection. Entity bodies are opaque
//! JSON documents; the engine never interprets them beyond their `id`.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde_json::Value;

use crate::error::Result;

/// Collection names reserved by the engine itself. Entity collections come
/// from [`EntityKind::collection`](crate::models::EntityKind::collection).
pub mod collections {
    /// Durable operation queue
    pub const SYNC_QUEUE: &str = "syncQueue";
    /// Holding area for conflicts awaiting manual resolution
    pub const SYNC_CONFLICTS: &str = "syncConflicts";
}

/// Durable key-value persistence, one JSON document per (collection, id).
#[allow(async_fn_in_trait)]
pub trait LocalStore: Send + Sync {
    /// Fetch one document, `None` when absent
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Upsert one document
    async fn put(&self, collection: &str, id: &str, value: &Value) -> Result<()>;

    /// Remove one document; removing an absent document is not an error
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// All documents in a collection, ordered by id
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>>;
}
