use std::path::PathBuf;

use cadence_core::models::ItemKind;
use cadence_core::sync::Resolution;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Spaced repetition from the command line, synced through a shared snapshot")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the study config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the local database with an empty collection
    Init,
    /// Manage decks
    Deck {
        #[command(subcommand)]
        command: DeckCommands,
    },
    /// Manage items
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// Manage deck series
    Series {
        #[command(subcommand)]
        command: SeriesCommands,
    },
    /// List items due today
    Due {
        /// Number of items to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rate an item: fail|again, hard, good, easy, 1-4, or suspend
    Review {
        /// Item ID or unique ID prefix/suffix
        item: String,
        /// Rating
        rating: String,
    },
    /// Reset an item's scheduling progress
    Reset {
        /// Item ID or unique ID prefix/suffix
        item: String,
    },
    /// Project the daily review load
    Simulate {
        /// Number of days to project
        #[arg(long, default_value = "30")]
        days: u32,
        /// New items introduced per day (config default when omitted)
        #[arg(long, value_name = "N")]
        new_per_day: Option<u32>,
        /// Probability of recalling a due item (config default when omitted)
        #[arg(long, value_name = "P", conflicts_with = "from_history")]
        retention: Option<f64>,
        /// Use the retention observed in the review log
        #[arg(long)]
        from_history: bool,
        /// Seed for a reproducible projection
        #[arg(long)]
        seed: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync with a shared snapshot file or HTTP endpoint
    Sync {
        /// Snapshot file path or http(s) URL
        #[arg(long, value_name = "PATH|URL", env = "CADENCE_REMOTE")]
        remote: String,
        /// Resolve every conflict the same way instead of prompting
        #[arg(long, value_enum, value_name = "SIDE")]
        resolve_all: Option<ResolveSide>,
        /// Bearer token for HTTP remotes
        #[arg(long, env = "CADENCE_SYNC_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Skip the baseline and treat every difference as a conflict
        #[arg(long)]
        full: bool,
    },
    /// Export the collection as a JSON snapshot
    Export {
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Replace the collection with an exported snapshot
    Import {
        /// Snapshot JSON file
        path: PathBuf,
        /// Overwrite a non-empty collection
        #[arg(long)]
        force: bool,
    },
    /// Inspect or create the study config
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DeckCommands {
    /// Create a deck
    Add {
        /// Deck name
        name: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a deck (propagates to other devices on sync)
    Delete {
        /// Deck ID, unique ID prefix/suffix, or name
        deck: String,
    },
    /// Archive a deck so its items stop coming due
    Archive {
        /// Deck ID, unique ID prefix/suffix, or name
        deck: String,
        /// Unarchive instead
        #[arg(long)]
        undo: bool,
    },
    /// List decks
    List {
        /// Include archived decks
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Add an item to a deck
    Add {
        /// Deck ID, unique ID prefix/suffix, or name
        deck: String,
        /// Prompt side
        front: String,
        /// Answer side
        back: String,
        /// Item kind
        #[arg(long, value_enum, default_value_t = ItemKindArg::Flashcard)]
        kind: ItemKindArg,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum SeriesCommands {
    /// Create a series from existing decks
    Add {
        /// Series name
        name: String,
        /// Level as `TITLE=DECK[,DECK...]` (repeatable, in order)
        #[arg(short, long = "level", value_name = "TITLE=DECKS", required = true)]
        levels: Vec<String>,
    },
    /// Delete a series; its decks are kept
    Delete {
        /// Series ID, unique ID prefix/suffix, or name
        series: String,
    },
    /// Mark a deck of a series as completed
    Complete {
        /// Series ID, unique ID prefix/suffix, or name
        series: String,
        /// Deck ID, unique ID prefix/suffix, or name
        deck: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective config
    Show,
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolveSide {
    Local,
    Remote,
}

impl From<ResolveSide> for Resolution {
    fn from(side: ResolveSide) -> Self {
        match side {
            ResolveSide::Local => Self::KeepLocal,
            ResolveSide::Remote => Self::KeepRemote,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ItemKindArg {
    Flashcard,
    Question,
}

impl From<ItemKindArg> for ItemKind {
    fn from(kind: ItemKindArg) -> Self {
        match kind {
            ItemKindArg::Flashcard => Self::Flashcard,
            ItemKindArg::Question => Self::Question,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
