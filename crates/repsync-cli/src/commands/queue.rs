use std::path::Path;

use repsync_core::OperationId;

use crate::commands::common::{format_operation_lines, open_queue, operation_to_item, OperationItem};
use crate::error::CliError;

pub async fn run_pending(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let queue = open_queue(db_path)?;
    let operations = queue.pending_operations().await?;

    if as_json {
        let items = operations
            .iter()
            .map(operation_to_item)
            .collect::<Vec<OperationItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("No operations waiting for sync.");
        return Ok(());
    }
    for line in format_operation_lines(&operations) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_retry(id: &str, db_path: &Path) -> Result<(), CliError> {
    let id: OperationId = id
        .parse()
        .map_err(|_| CliError::InvalidId(id.to_string()))?;
    let queue = open_queue(db_path)?;
    let operation = queue.retry(id).await?;
    println!(
        "Operation {} re-armed ({} {})",
        operation.id,
        operation.kind,
        operation.entity_id()
    );
    Ok(())
}

pub async fn run_prune(db_path: &Path) -> Result<(), CliError> {
    let queue = open_queue(db_path)?;
    let pruned = queue.prune_completed().await?;
    println!("Archived {pruned} completed operation(s)");
    Ok(())
}
