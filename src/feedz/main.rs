use chrono::{DateTime, Utc};
use clap::Parser;
use colored::*;
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

use feedz::error::{FeedzError, Result};
use feedz::model::{Collection, ItemRecord, ItemStatus, ItemView};
use feedz::ranking::{SelectQuery, SortMode, TimeWindow};
use feedz::store::record::{ItemPatch, RecordStore};
use feedz::store::view::ViewStore;

mod args;
use args::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(&cli);

    match cli.command {
        Commands::Add {
            collection,
            id,
            title,
            content,
            tags,
            username,
        } => handle_add(&data_dir, collection, id, title, content, tags, username),
        Commands::Edit {
            collection,
            id,
            title,
            content,
            tags,
            status,
            username,
        } => handle_edit(&data_dir, collection, id, title, content, tags, status, username),
        Commands::Archive { collection, id } => handle_archive(&data_dir, collection, id),
        Commands::List {
            collection,
            sort,
            window,
            limit,
        } => handle_list(&data_dir, collection, sort, window, limit),
        Commands::Rebuild { collection } => handle_rebuild(&data_dir, collection),
        Commands::Seed { file, collection } => handle_seed(&data_dir, collection, &file),
    }
}

fn resolve_data_dir(cli: &Cli) -> PathBuf {
    if let Some(dir) = &cli.data_dir {
        return dir.clone();
    }
    if let Ok(dir) = std::env::var("DATA_DIR") {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("com", "feedz", "feedz")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn parse_tags(tags: Option<String>) -> Option<Vec<String>> {
    tags.map(|raw| {
        raw.split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    })
}

#[allow(clippy::too_many_arguments)]
fn handle_add(
    data_dir: &Path,
    collection: Collection,
    id: u64,
    title: String,
    content: String,
    tags: Option<String>,
    username: Option<String>,
) -> Result<()> {
    if title.trim().is_empty() {
        return Err(FeedzError::Store("Title cannot be empty".into()));
    }
    let store = RecordStore::new(data_dir, collection);
    let record = ItemRecord::published(
        id,
        title,
        content,
        parse_tags(tags).unwrap_or_default(),
        username,
    );
    let view = store.create(&record)?;
    println!(
        "{}",
        format!("Added {} {}: {}", collection.kind(), id, view.title).green()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_edit(
    data_dir: &Path,
    collection: Collection,
    id: u64,
    title: Option<String>,
    content: Option<String>,
    tags: Option<String>,
    status: Option<ItemStatus>,
    username: Option<String>,
) -> Result<()> {
    let store = RecordStore::new(data_dir, collection);
    let patch = ItemPatch {
        title,
        content,
        tags: parse_tags(tags),
        status,
        username,
    };
    let view = store.update(id, &patch)?;
    println!(
        "{}",
        format!("Edited {} {}: {}", collection.kind(), id, view.title).green()
    );
    Ok(())
}

fn handle_archive(data_dir: &Path, collection: Collection, id: u64) -> Result<()> {
    let store = RecordStore::new(data_dir, collection);
    store.archive(id)?;
    println!("{}", format!("Archived {} {}", collection.kind(), id).yellow());
    Ok(())
}

fn handle_list(
    data_dir: &Path,
    collection: Collection,
    sort: SortMode,
    window: TimeWindow,
    limit: usize,
) -> Result<()> {
    let store = ViewStore::open(data_dir, collection)?;
    let query = SelectQuery {
        sort,
        window,
        limit,
        ..Default::default()
    };
    let page = store.select(&query);
    print_items(&page.items);
    store.close()?;
    Ok(())
}

fn handle_rebuild(data_dir: &Path, collection: Collection) -> Result<()> {
    let store = ViewStore::open(data_dir, collection)?;
    let (slot, count) = store.rebuild()?;
    println!(
        "{}",
        format!("Rebuilt {} view -> slot {} ({} items)", collection, slot, count).green()
    );
    store.close()?;
    Ok(())
}

/// One entry of a seed file: a full item with optional bookkeeping fields.
#[derive(Debug, Deserialize)]
struct SeedItem {
    id: u64,
    title: String,
    content: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    status: Option<ItemStatus>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    username: Option<String>,
}

fn handle_seed(data_dir: &Path, collection: Collection, file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)?;
    let seeds: Vec<SeedItem> = serde_json::from_str(&raw)?;
    let store = RecordStore::new(data_dir, collection);

    let count = seeds.len();
    for seed in seeds {
        let now = Utc::now();
        let created_at = seed.created_at.unwrap_or(now);
        let record = ItemRecord {
            id: seed.id,
            title: seed.title,
            content: seed.content,
            tags: seed.tags,
            status: seed.status.unwrap_or(ItemStatus::Published),
            created_at,
            updated_at: seed.updated_at.unwrap_or(created_at),
            username: seed.username,
        };
        store.create(&record)?;
    }
    println!("{}", format!("Seeded {} {}", count, collection).green());
    Ok(())
}

const LINE_WIDTH: usize = 100;
const TIME_WIDTH: usize = 14;

fn print_items(items: &[ItemView]) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    for item in items {
        let idx_str = format!("{}. ", item.id);
        let votes = format!("{}↑ {}↓ ", item.love_count, item.meh_count);

        let content_preview: String = item
            .content
            .chars()
            .take(50)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        let title_content = if content_preview.is_empty() {
            item.title.clone()
        } else {
            format!("{} {}", item.title, content_preview)
        };

        let fixed_width = idx_str.width() + votes.width() + TIME_WIDTH + 4;
        let available = LINE_WIDTH.saturating_sub(fixed_width);
        let title_display = truncate_to_width(&title_content, available);
        let padding = available.saturating_sub(title_display.width());

        println!(
            "    {}{}{} {}{:>time_width$}",
            idx_str,
            title_display,
            " ".repeat(padding),
            votes.dimmed(),
            format_time_ago(item.created_at),
            time_width = TIME_WIDTH
        );
    }
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthChar;

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    formatter.convert(duration.to_std().unwrap_or_default())
}
