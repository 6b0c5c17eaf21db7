use std::path::Path;

use repsync_core::sync::ConflictVault;

use crate::commands::common::{open_queue, open_store};
use crate::error::CliError;

pub async fn run_metrics(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let queue = open_queue(db_path)?;
    let metrics = queue.metrics().await?;
    let pending_conflicts = ConflictVault::new(store).pending().await?.len();

    if as_json {
        let payload = serde_json::json!({
            "queue": metrics,
            "pending_conflicts": pending_conflicts,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("Pending:             {}", metrics.pending);
    println!("Processing:          {}", metrics.processing);
    println!("Completed:           {}", metrics.completed);
    println!("Failed:              {}", metrics.failed);
    println!("Success rate:        {:.1}%", metrics.success_rate * 100.0);
    println!("Avg processing time: {:.0} ms", metrics.avg_processing_ms);
    println!("Pending conflicts:   {pending_conflicts}");
    Ok(())
}
