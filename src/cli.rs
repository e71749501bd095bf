use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::danmaku::comment::CommentMode;
use crate::schema::EntityKind;

#[derive(Debug, Parser)]
#[command(
    name = "danmaku-store",
    version,
    about = "Store, migrate and validate danmaku records"
)]
pub struct Cli {
    /// Config file (default: <config dir>/danmaku-store/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file; overrides config and DANMAKU_STORE_DB
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import one stored record or a JSON array of them
    Import { kind: EntityKind, file: PathBuf },
    /// Replace an episode's comments with the contents of a comment file
    Comments { episode: String, file: PathBuf },
    /// Print a stored record migrated to its latest version
    Show { kind: EntityKind, key: String },
    List { kind: Option<EntityKind> },
    Remove { kind: EntityKind, key: String },
    /// Upgrade every stored record in place
    Migrate,
    /// Decode one `p` field
    Decode { p: String },
    /// Encode one `p` field
    Encode {
        #[arg(long)]
        time: f64,
        #[arg(long)]
        mode: CommentMode,
        #[arg(long, default_value = "#ffffff")]
        color: String,
        #[arg(long)]
        uid: Option<String>,
    },
    /// Print an episode's comments
    Danmaku { episode: String },
    /// Merge a JSON patch into the stored extension options
    SetOptions { file: PathBuf },
    /// Check that an episode belongs to a season of the same provider
    Check { episode: String, season: String },
    /// Search the configured VOD API
    Vod { query: String },
}
