//! Per-entity conflict resolution policies
//!
//! Resolvers are pure decision functions: they look at one conflict and
//! return a resolution. Applying the resolution (writing either side) is the
//! sync manager's job.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ConflictResolution, EntityKind, SyncConflict};

/// Decides how a conflict for one entity kind is settled.
///
/// Implementations must be deterministic and side-effect free.
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, conflict: &SyncConflict) -> ConflictResolution;
}

impl<F> ConflictResolver for F
where
    F: Fn(&SyncConflict) -> ConflictResolution + Send + Sync,
{
    fn resolve(&self, conflict: &SyncConflict) -> ConflictResolution {
        self(conflict)
    }
}

/// Strategy map from entity kind to resolver.
///
/// The sync manager dispatches through this registry only; registering a
/// resolver for a kind overrides its policy without touching the manager.
pub struct ResolverRegistry {
    resolvers: HashMap<EntityKind, Arc<dyn ConflictResolver>>,
}

impl ResolverRegistry {
    /// Registry with the built-in policies for all entity kinds
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(EntityKind::Workout, Arc::new(WorkoutResolver));
        registry.register(EntityKind::Exercise, Arc::new(ExerciseResolver));
        registry.register(EntityKind::Profile, Arc::new(ProfileResolver));
        registry.register(EntityKind::Settings, Arc::new(SettingsResolver));
        registry
    }

    /// Registry with no policies; every conflict falls back to manual
    #[must_use]
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Add or override the resolver for an entity kind
    pub fn register(&mut self, kind: EntityKind, resolver: Arc<dyn ConflictResolver>) {
        self.resolvers.insert(kind, resolver);
    }

    /// Decide a conflict; kinds without a registered resolver go to manual
    #[must_use]
    pub fn resolve(&self, conflict: &SyncConflict) -> ConflictResolution {
        match self.resolvers.get(&conflict.entity) {
            Some(resolver) => resolver.resolve(conflict),
            None => ConflictResolution::manual(),
        }
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Workouts: the newer side wins outright; equal timestamps fall back to a
/// structural merge of the two sessions, and an unmergeable pair goes to
/// manual resolution.
pub struct WorkoutResolver;

impl ConflictResolver for WorkoutResolver {
    fn resolve(&self, conflict: &SyncConflict) -> ConflictResolution {
        if conflict.local_timestamp > conflict.remote_timestamp {
            return ConflictResolution::local_wins();
        }
        if conflict.remote_timestamp > conflict.local_timestamp {
            return ConflictResolution::remote_wins();
        }
        match merge_workouts(&conflict.local_data, &conflict.remote_data) {
            Ok(merged) => ConflictResolution::merge(merged),
            Err(error) => {
                debug!(entity_id = %conflict.entity_id, %error, "workout merge failed");
                ConflictResolution::manual()
            }
        }
    }
}

/// Exercises are reference data edited centrally: the remote always wins.
pub struct ExerciseResolver;

impl ConflictResolver for ExerciseResolver {
    fn resolve(&self, _conflict: &SyncConflict) -> ConflictResolution {
        ConflictResolution::remote_wins()
    }
}

/// Profiles: most recent timestamp wins, ties go remote. No merge attempted.
pub struct ProfileResolver;

impl ConflictResolver for ProfileResolver {
    fn resolve(&self, conflict: &SyncConflict) -> ConflictResolution {
        if conflict.local_timestamp > conflict.remote_timestamp {
            ConflictResolution::local_wins()
        } else {
            ConflictResolution::remote_wins()
        }
    }
}

/// Settings: shallow merge with local keys overriding remote; if either side
/// is not an object the local copy wins.
pub struct SettingsResolver;

impl ConflictResolver for SettingsResolver {
    fn resolve(&self, conflict: &SyncConflict) -> ConflictResolution {
        match (
            conflict.remote_data.as_object(),
            conflict.local_data.as_object(),
        ) {
            (Some(remote), Some(local)) => {
                let mut merged = remote.clone();
                for (key, value) in local {
                    merged.insert(key.clone(), value.clone());
                }
                ConflictResolution::merge(Value::Object(merged))
            }
            _ => ConflictResolution::local_wins(),
        }
    }
}

/// Structural merge of two workout sessions: union of exercise sub-records
/// by id, local fields winning on direct-field overlap, `updated_at` the max
/// of both sides.
fn merge_workouts(local: &Value, remote: &Value) -> Result<Value> {
    let local_map = as_object(local, "local workout")?;
    let remote_map = as_object(remote, "remote workout")?;

    let mut merged = remote_map.clone();
    for (key, value) in local_map {
        if key != "exercises" {
            merged.insert(key.clone(), value.clone());
        }
    }

    merged.insert(
        "exercises".to_string(),
        merge_exercise_lists(local_map.get("exercises"), remote_map.get("exercises"))?,
    );

    let updated_at = match (timestamp_field(local_map), timestamp_field(remote_map)) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    };
    if let Some(updated_at) = updated_at {
        merged.insert("updated_at".to_string(), Value::from(updated_at));
    }

    Ok(Value::Object(merged))
}

fn timestamp_field(map: &Map<String, Value>) -> Option<i64> {
    map.get("updated_at").and_then(Value::as_i64)
}

/// Union of two exercise lists keyed by record id, remote order first, local
/// records appended in order; overlapping records take local field values.
fn merge_exercise_lists(local: Option<&Value>, remote: Option<&Value>) -> Result<Value> {
    let local_records = as_record_list(local, "local exercises")?;
    let remote_records = as_record_list(remote, "remote exercises")?;

    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, Map<String, Value>> = HashMap::new();

    for (key, record) in remote_records {
        order.push(key.clone());
        merged.insert(key, record);
    }
    for (key, record) in local_records {
        match merged.get_mut(&key) {
            Some(existing) => {
                for (field, value) in record {
                    existing.insert(field, value);
                }
            }
            None => {
                order.push(key.clone());
                merged.insert(key, record);
            }
        }
    }

    Ok(Value::Array(
        order
            .into_iter()
            .filter_map(|key| merged.remove(&key).map(Value::Object))
            .collect(),
    ))
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::Merge(format!("{what} is not an object")))
}

fn as_record_list(value: Option<&Value>, what: &str) -> Result<Vec<(String, Map<String, Value>)>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| Error::Merge(format!("{what} is not an array")))?;

    items
        .iter()
        .map(|item| {
            let record = item
                .as_object()
                .ok_or_else(|| Error::Merge(format!("{what} entry is not an object")))?;
            let id = record
                .get("id")
                .ok_or_else(|| Error::Merge(format!("{what} entry is missing an id")))?;
            Ok((id.to_string(), record.clone()))
        })
        .collect()
}
