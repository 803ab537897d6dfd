//! # Storage Layer
//!
//! Everything that touches disk lives here. The store is a sharded flat-file
//! layout, not a database: each item owns a handful of small JSON files, and
//! each collection owns a double-buffered snapshot of its published items.
//!
//! ## On-Disk Layout
//!
//! ```text
//! <data>/
//! ├── tips/
//! │   ├── 042/                          # shard = id % 1000, zero-padded
//! │   │   ├── tip-000042.record.json    # master record (authoritative)
//! │   │   ├── tip-000042.view.json      # denormalized view + vote counts
//! │   │   ├── tip-000042.votemap.json   # user token -> last vote
//! │   │   └── tip-000042.votelog.jsonl  # append-only audit, never read
//! │   └── ...
//! ├── tips.view.a.json                  # snapshot slot A
//! ├── tips.view.b.json                  # snapshot slot B
//! ├── tips.view.ptr                     # "a" or "b": the active slot
//! └── prompts/...                       # same shape per collection
//! ```
//!
//! ## Write Discipline
//!
//! Every persisted payload — records, views, vote maps, snapshot slots, the
//! pointer itself — goes through write-to-temporary-then-rename
//! ([`atomic`]), so a reader never observes a half-written file. The
//! snapshot slots alternate: a flush fully writes the inactive slot, then
//! flips the pointer, so the previously active slot stays valid and
//! servable until the flip lands.
//!
//! ## Modules
//!
//! - [`paths`]: pure path math (sharding, file names, slot/pointer paths)
//! - [`atomic`]: temp-then-rename write helpers
//! - [`record`]: per-item master/view lifecycle (create, update, archive)
//! - [`votes`]: vote ledger with per-item fail-fast locking
//! - [`view`]: the double-buffered snapshot cache and its flush scheduler

pub mod atomic;
pub mod paths;
pub mod record;
pub mod view;
pub mod votes;
