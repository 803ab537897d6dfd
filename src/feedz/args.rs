use std::path::PathBuf;

use clap::{Parser, Subcommand};

use feedz::model::{Collection, ItemStatus};
use feedz::ranking::{SortMode, TimeWindow};

#[derive(Parser, Debug)]
#[command(name = "feedz")]
#[command(about = "Administer a file-backed content feed store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to $DATA_DIR, then the platform data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a new published item
    Add {
        /// Target collection (tips or prompts)
        #[arg(short, long, default_value = "tips")]
        collection: Collection,

        /// Item id (allocated by you; must be unique per collection)
        #[arg(long)]
        id: u64,

        #[arg(long)]
        title: String,

        /// Markdown content
        #[arg(long)]
        content: String,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        username: Option<String>,
    },

    /// Edit fields of an existing item
    Edit {
        #[arg(short, long, default_value = "tips")]
        collection: Collection,

        #[arg(long)]
        id: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        /// Comma-separated tags (replaces the existing set)
        #[arg(long)]
        tags: Option<String>,

        /// draft, published or archived
        #[arg(long)]
        status: Option<ItemStatus>,

        #[arg(long)]
        username: Option<String>,
    },

    /// Archive an item (soft-delete; it leaves the published feed)
    Archive {
        #[arg(short, long, default_value = "tips")]
        collection: Collection,

        #[arg(long)]
        id: u64,
    },

    /// List the published feed as the server would rank it
    #[command(alias = "ls")]
    List {
        #[arg(short, long, default_value = "tips")]
        collection: Collection,

        /// hot, new or top
        #[arg(long, default_value = "hot")]
        sort: SortMode,

        /// all, 24h, 7d or 30d
        #[arg(long, default_value = "all")]
        window: TimeWindow,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Rebuild the collection snapshot from the per-item view files
    Rebuild {
        #[arg(short, long, default_value = "tips")]
        collection: Collection,
    },

    /// Bulk-load items from a JSON seed file
    Seed {
        /// Path to a JSON array of seed items
        #[arg(long)]
        file: PathBuf,

        #[arg(short, long, default_value = "tips")]
        collection: Collection,
    },
}
