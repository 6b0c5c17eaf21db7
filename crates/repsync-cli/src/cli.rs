use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use repsync_core::{EntityKind, OperationKind};

#[derive(Parser)]
#[command(name = "repsync")]
#[command(about = "Drive and inspect RepLog's offline sync engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a local mutation in the sync queue
    #[command(alias = "add")]
    Enqueue {
        /// Mutation kind
        #[arg(value_enum)]
        kind: OperationKindArg,
        /// Entity the mutation applies to
        #[arg(value_enum)]
        entity: EntityKindArg,
        /// JSON payload carrying the entity "id"; use '-' to read stdin
        #[arg(long, value_name = "JSON")]
        data: String,
    },
    /// List operations eligible for the next sync pass
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one synchronization pass against the remote API
    Sync,
    /// List conflicts awaiting manual resolution
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a parked conflict
    Resolve {
        /// Conflict ID
        id: String,
        /// Winning side
        #[arg(long, value_enum)]
        strategy: StrategyArg,
    },
    /// Re-arm a failed operation for immediate retry
    Retry {
        /// Operation ID
        id: String,
    },
    /// Archive completed operations
    Prune,
    /// Show queue metrics and conflict counts
    Metrics {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationKindArg {
    Create,
    Update,
    Delete,
}

impl From<OperationKindArg> for OperationKind {
    fn from(value: OperationKindArg) -> Self {
        match value {
            OperationKindArg::Create => Self::Create,
            OperationKindArg::Update => Self::Update,
            OperationKindArg::Delete => Self::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKindArg {
    Workout,
    Exercise,
    Profile,
    Settings,
}

impl From<EntityKindArg> for EntityKind {
    fn from(value: EntityKindArg) -> Self {
        match value {
            EntityKindArg::Workout => Self::Workout,
            EntityKindArg::Exercise => Self::Exercise,
            EntityKindArg::Profile => Self::Profile,
            EntityKindArg::Settings => Self::Settings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    LocalWins,
    RemoteWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Elvish,
    Fish,
    Powershell,
    Zsh,
}
