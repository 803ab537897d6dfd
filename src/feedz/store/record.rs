//! Per-item persistence: the authoritative master record and the
//! denormalized view derived from it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use crate::error::{FeedzError, Result};
use crate::markdown::render_markdown;
use crate::model::{Collection, ItemRecord, ItemStatus, ItemView};
use crate::store::atomic::{atomic_write_json, atomic_write_str};
use crate::store::paths::{item_paths, ItemPaths};

/// A partial update: only provided fields change.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ItemStatus>,
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    data_dir: PathBuf,
    collection: Collection,
}

impl RecordStore {
    pub fn new(data_dir: impl Into<PathBuf>, collection: Collection) -> Self {
        Self {
            data_dir: data_dir.into(),
            collection,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub(crate) fn paths(&self, id: u64) -> ItemPaths {
        item_paths(&self.data_dir, self.collection, id)
    }

    /// Persist a new item: master record, freshly rendered view with zero
    /// counts, and an empty vote map. Re-creating an existing id overwrites
    /// it (id allocation is the authoring caller's job).
    pub fn create(&self, record: &ItemRecord) -> Result<ItemView> {
        let p = self.paths(record.id);
        fs::create_dir_all(&p.dir)?;

        atomic_write_json(&p.record, record)?;

        let view = ItemView::from_record(record, render_markdown(&record.content));
        atomic_write_json(&p.view, &view)?;

        // Seeding the vote map is a convenience, not a requirement; the
        // ledger treats a missing map as empty.
        if let Err(e) = atomic_write_str(&p.votes_map, "{}") {
            warn!(id = record.id, error = %e, "could not seed vote map");
        }

        Ok(view)
    }

    /// Load the master record.
    pub fn read(&self, id: u64) -> Result<ItemRecord> {
        let p = self.paths(id);
        let raw = match fs::read_to_string(&p.record) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(FeedzError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map_err(|e| FeedzError::Corrupt(format!("record {}: {}", p.record.display(), e)))
    }

    /// Read-modify-write the master, then refresh the view. Vote counts are
    /// carried over from the existing view; content_html is re-rendered only
    /// when the content changed (or the old view had none).
    pub fn update(&self, id: u64, patch: &ItemPatch) -> Result<ItemView> {
        let mut record = self.read(id)?;

        let content_changed = patch.content.is_some();
        if let Some(title) = &patch.title {
            record.title = title.clone();
        }
        if let Some(content) = &patch.content {
            record.content = content.clone();
        }
        if let Some(tags) = &patch.tags {
            record.tags = tags.clone();
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(username) = &patch.username {
            record.username = Some(username.clone());
        }
        record.updated_at = Utc::now();

        let p = self.paths(id);
        atomic_write_json(&p.record, &record)?;

        let (love, meh, old_html) = match self.try_read_view(&p) {
            Some(old) => (old.love_count, old.meh_count, old.content_html),
            None => (0, 0, String::new()),
        };
        let content_html = if content_changed || old_html.is_empty() {
            render_markdown(&record.content)
        } else {
            old_html
        };

        let mut view = ItemView::from_record(&record, content_html);
        view.love_count = love;
        view.meh_count = meh;
        atomic_write_json(&p.view, &view)?;

        Ok(view)
    }

    /// Soft-delete: flip the master's status and timestamp. The view flip is
    /// best-effort; a missing or corrupt view heals on the next read.
    pub fn archive(&self, id: u64) -> Result<()> {
        let mut record = self.read(id)?;
        record.status = ItemStatus::Archived;
        record.updated_at = Utc::now();

        let p = self.paths(id);
        atomic_write_json(&p.record, &record)?;

        if let Some(mut view) = self.try_read_view(&p) {
            view.status = ItemStatus::Archived;
            if let Err(e) = atomic_write_json(&p.view, &view) {
                warn!(id, error = %e, "could not update view on archive");
            }
        }

        Ok(())
    }

    /// The item's view, reconstructed from the master (with a fresh render
    /// and zero counts) when the view file is missing or corrupt.
    pub fn load_view_or_rebuild(&self, id: u64) -> Result<ItemView> {
        let p = self.paths(id);
        match fs::read_to_string(&p.view) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(view) => return Ok(view),
                Err(e) => {
                    warn!(id, error = %e, "corrupt view, reconstructing from master");
                }
            },
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            Err(_) => {}
        }
        let record = self.read(id)?;
        Ok(ItemView::from_record(&record, render_markdown(&record.content)))
    }

    fn try_read_view(&self, p: &ItemPaths) -> Option<ItemView> {
        let raw = fs::read_to_string(&p.view).ok()?;
        serde_json::from_str(&raw).ok()
    }
}
