use clap::{Args, Parser, Subcommand};

use crate::types::{LogLevel, StorageKind};

#[derive(Parser, Debug)]
#[command(name = "mpm", about = "Personal media catalog", version)]
pub struct Cli {
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

/// Where and how the catalog is stored.
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Storage backend
    #[arg(
        long,
        value_enum,
        env = "MPM_STORAGE_TYPE",
        default_value = "json",
        global = true
    )]
    pub storage_type: StorageKind,

    /// Directory holding photos.json, albums.json and tags.json
    #[arg(long, env = "MPM_DATA_PATH", default_value = "~/.mpm/data", global = true)]
    pub data_path: String,

    /// How often pending changes are flushed (e.g. 500ms, 30s, 5m)
    #[arg(long, env = "MPM_SAVE_INTERVAL", default_value = "30s", global = true)]
    pub save_interval: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the service: autosave, monitor and scheduled generation until
    /// interrupted
    Run(RunArgs),

    /// Run the generation pipeline once and flush
    Generate,

    /// Show catalog counts
    Status,

    /// Print every record of one kind as JSON
    List {
        /// photos, albums or tags
        kind: String,
    },

    /// Print one record as JSON
    Show {
        /// photo, album or tag
        kind: String,
        id: i64,
    },

    /// Manage albums
    #[command(subcommand)]
    Albums(AlbumCommand),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Period between generation runs (default 30s)
    #[arg(long)]
    pub generate_interval: Option<String>,

    /// Generate once instead of on a schedule
    #[arg(long)]
    pub once: bool,
}

#[derive(Subcommand, Debug)]
pub enum AlbumCommand {
    /// List albums as JSON
    List,

    /// Create an album and print its id
    Add(AlbumFields),

    /// Replace an album's name, description and tags
    Update {
        id: i64,
        #[command(flatten)]
        fields: AlbumFields,
    },

    /// Delete an album
    Delete { id: i64 },
}

#[derive(Args, Debug, Clone)]
pub struct AlbumFields {
    /// Album name
    #[arg(long)]
    pub name: String,

    /// Album description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Tag to attach (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}
