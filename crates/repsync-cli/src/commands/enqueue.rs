use std::path::Path;

use repsync_core::{EntityKind, OperationKind};

use crate::commands::common::{open_queue, read_payload};
use crate::error::CliError;

pub async fn run_enqueue(
    kind: OperationKind,
    entity: EntityKind,
    data: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let payload = read_payload(data)?;
    let queue = open_queue(db_path)?;
    let operation = queue.enqueue(kind, entity, payload).await?;

    println!(
        "Enqueued {} {} {} as {}",
        operation.kind,
        operation.entity,
        operation.entity_id(),
        operation.id
    );
    Ok(())
}
