//! Path resolution for the sharded layout. Pure functions, no I/O.

use std::path::{Path, PathBuf};

use crate::model::Collection;

/// Shard directory name for an id: `id % 1000`, zero-padded to 3 digits.
/// Bounds fan-out to 1000 directories per collection regardless of count.
pub fn shard(id: u64) -> String {
    format!("{:03}", id % 1000)
}

/// Every per-item file location.
#[derive(Debug, Clone)]
pub struct ItemPaths {
    pub dir: PathBuf,
    pub record: PathBuf,
    pub view: PathBuf,
    pub votes_map: PathBuf,
    pub votes_log: PathBuf,
}

pub fn item_paths(data_dir: &Path, collection: Collection, id: u64) -> ItemPaths {
    let dir = data_dir.join(collection.dir_name()).join(shard(id));
    let stem = format!("{}-{:06}", collection.kind(), id);
    ItemPaths {
        record: dir.join(format!("{}.record.json", stem)),
        view: dir.join(format!("{}.view.json", stem)),
        votes_map: dir.join(format!("{}.votemap.json", stem)),
        votes_log: dir.join(format!("{}.votelog.jsonl", stem)),
        dir,
    }
}

pub fn collection_dir(data_dir: &Path, collection: Collection) -> PathBuf {
    data_dir.join(collection.dir_name())
}

/// One of the two alternating snapshot slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::A => "a",
            Slot::B => "b",
        }
    }

    /// Lossy parse of a pointer file's contents. Anything that is not
    /// exactly `b` selects slot A, the fixed default.
    pub fn parse(s: &str) -> Slot {
        match s.trim() {
            "b" => Slot::B,
            _ => Slot::A,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn slot_path(data_dir: &Path, collection: Collection, slot: Slot) -> PathBuf {
    data_dir.join(format!("{}.view.{}.json", collection.dir_name(), slot.as_str()))
}

pub fn pointer_path(data_dir: &Path, collection: Collection) -> PathBuf {
    data_dir.join(format!("{}.view.ptr", collection.dir_name()))
}
