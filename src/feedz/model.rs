use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::FeedzError;

/// The two item collections served by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tips,
    Prompts,
}

impl Collection {
    /// Directory name under the data root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Collection::Tips => "tips",
            Collection::Prompts => "prompts",
        }
    }

    /// Singular file-name prefix for per-item files.
    pub fn kind(&self) -> &'static str {
        match self {
            Collection::Tips => "tip",
            Collection::Prompts => "prompt",
        }
    }
}

impl FromStr for Collection {
    type Err = FeedzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tips" => Ok(Collection::Tips),
            "prompts" => Ok(Collection::Prompts),
            other => Err(FeedzError::Store(format!("unknown collection: {}", other))),
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Draft,
    Published,
    Archived,
}

impl FromStr for ItemStatus {
    type Err = FeedzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ItemStatus::Draft),
            "published" => Ok(ItemStatus::Published),
            "archived" => Ok(ItemStatus::Archived),
            other => Err(FeedzError::Store(format!("unknown status: {}", other))),
        }
    }
}

/// A user's current vote on an item. Last write wins; `None` clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Vote {
    Meh,
    None,
    Love,
}

impl From<Vote> for i8 {
    fn from(vote: Vote) -> i8 {
        match vote {
            Vote::Meh => -1,
            Vote::None => 0,
            Vote::Love => 1,
        }
    }
}

impl TryFrom<i8> for Vote {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Vote::Meh),
            0 => Ok(Vote::None),
            1 => Ok(Vote::Love),
            other => Err(format!("invalid vote value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub love_count: u64,
    pub meh_count: u64,
}

/// The master record for an item. Authoritative; the view is derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: u64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub username: Option<String>,
}

impl ItemRecord {
    /// A freshly published record with now-timestamps, ready for `create`.
    pub fn published(
        id: u64,
        title: String,
        content: String,
        tags: Vec<String>,
        username: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            content,
            tags,
            status: ItemStatus::Published,
            created_at: now,
            updated_at: now,
            username,
        }
    }
}

/// The denormalized per-item view: the master fields plus display/computed
/// fields. This is what snapshots and the serving layer work with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    pub title: String,
    pub content: String,
    // Empty means "not rendered yet"; consumers re-derive it on demand.
    #[serde(default)]
    pub content_html: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub love_count: u64,
    #[serde(default)]
    pub meh_count: u64,
}

impl ItemView {
    pub fn from_record(record: &ItemRecord, content_html: String) -> Self {
        Self {
            id: record.id,
            slug: slugify(&record.title),
            title: record.title.clone(),
            content: record.content.clone(),
            content_html,
            tags: record.tags.clone(),
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
            username: record.username.clone(),
            love_count: 0,
            meh_count: 0,
        }
    }

    /// Net vote score.
    pub fn score(&self) -> i64 {
        self.love_count as i64 - self.meh_count as i64
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts {
            love_count: self.love_count,
            meh_count: self.meh_count,
        }
    }
}

/// A full materialized list of the published items of one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub item_count: usize,
    pub items: Vec<ItemView>,
}

pub const SNAPSHOT_VERSION: u32 = 1;

impl Snapshot {
    pub fn new(items: Vec<ItemView>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            item_count: items.len(),
            items,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// URL-safe slug derived from a title: lowercased, non-alphanumeric runs
/// collapsed to single dashes, no leading or trailing dash.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}
