use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "milestone",
    about = "Discover and maintain the beautiful dates of anchored events",
    version
)]
pub struct Cli {
    /// Log to stderr at this level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that generates milestones.
#[derive(clap::Args, Clone)]
pub struct EngineArgs {
    /// Engine configuration JSON (built-in catalog when omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Pin "today" instead of reading the system clock
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the candidates for one anchor without touching a database
    Preview {
        /// Anchor date (YYYY-MM-DD)
        #[arg(long)]
        anchor: NaiveDate,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Insert or update one event
    EventUpsert {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// Existing event id (a new one is generated when omitted)
        #[arg(long)]
        event_id: Option<Uuid>,

        /// Owning user id
        #[arg(long)]
        owner: i64,

        /// Anchor date (YYYY-MM-DD)
        #[arg(long)]
        anchor: NaiveDate,

        /// Store the event as inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Regenerate milestones of one event or of every event of an owner
    Regenerate {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// Event to regenerate
        #[arg(long, conflicts_with = "owner", required_unless_present = "owner")]
        event_id: Option<Uuid>,

        /// Owner whose events are regenerated
        #[arg(long)]
        owner: Option<i64>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Regenerate every active event with bounded parallelism
    RecomputeAll {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// Maximum worker threads
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// List milestones of active events due within an inclusive date range
    Due {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the range (defaults to `from`)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Page through an owner's upcoming milestones
    Feed {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// Owning user id
        #[arg(long)]
        owner: i64,

        /// Earliest target date (defaults to today)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Page size (default 10, max 50)
        #[arg(long)]
        limit: Option<u32>,

        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Resolve one milestone by its share token
    Share {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// Share token
        token: String,
    },
}
