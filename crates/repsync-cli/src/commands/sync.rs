use std::path::Path;

use repsync_core::VaultHealth;

use crate::commands::common::open_manager;
use crate::error::CliError;

pub async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let manager = open_manager(db_path)?;
    let result = manager.perform_sync().await?;

    if result.success {
        println!("Sync completed: {} operation(s) synced", result.synced);
    } else {
        println!(
            "Sync finished with problems: {} synced, {} failed",
            result.synced, result.failed
        );
    }
    for conflict in &result.conflicts {
        let strategy = conflict
            .resolution
            .as_ref()
            .map_or_else(|| "unresolved".to_string(), |r| r.strategy.to_string());
        println!(
            "  conflict on {} {}: {strategy}",
            conflict.entity, conflict.entity_id
        );
    }
    for error in &result.errors {
        println!("  error: {error}");
    }
    if manager.vault_health() == VaultHealth::Degraded {
        println!(
            "Warning: conflict storage is degraded; unresolved conflicts are held in memory only"
        );
    }
    Ok(())
}
