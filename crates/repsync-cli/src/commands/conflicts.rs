use std::path::Path;

use repsync_core::sync::ConflictVault;
use repsync_core::{ConflictId, ConflictResolution};

use crate::cli::StrategyArg;
use crate::commands::common::{
    conflict_to_item, format_conflict_lines, open_manager, open_store, ConflictItem,
};
use crate::error::CliError;

pub async fn run_conflicts(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let vault = ConflictVault::new(open_store(db_path)?);
    let conflicts = vault.pending().await?;

    if as_json {
        let items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No conflicts awaiting manual resolution.");
        return Ok(());
    }
    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_resolve(id: &str, strategy: StrategyArg, db_path: &Path) -> Result<(), CliError> {
    let id: ConflictId = id
        .parse()
        .map_err(|_| CliError::InvalidId(id.to_string()))?;
    let resolution = match strategy {
        StrategyArg::LocalWins => ConflictResolution::local_wins(),
        StrategyArg::RemoteWins => ConflictResolution::remote_wins(),
    };

    let manager = open_manager(db_path)?;
    manager.resolve_conflict_manually(id, resolution).await?;
    println!("Conflict {id} resolved");
    Ok(())
}
