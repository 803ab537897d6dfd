//! The double-buffered snapshot cache: one `ViewStore` per collection.
//!
//! ## Read/Write Split
//!
//! Reads (`select`, `get`) only touch the in-memory snapshot behind a
//! read lock — never the disk, never the per-item vote locks. Writes go
//! item-file-first through the [`VoteLedger`], then patch the in-memory
//! copy, so the memory image may lead the persisted slots but never lags a
//! write we have acknowledged.
//!
//! ## Publish Protocol
//!
//! The full item list is periodically serialized to whichever on-disk slot
//! is inactive, and the pointer file is rewritten to name it. The
//! previously active slot is never touched in place, so a crash at any
//! point leaves a valid, selected snapshot: before the pointer write the old
//! slot still serves; after it, the new one does. Whole-list writes bound
//! corruption exposure to one stale read cycle.
//!
//! ## Flush Debouncing
//!
//! Votes mark items dirty and arm a single debounce timer per collection; a
//! background worker performs the flush when the timer fires. `close`
//! bypasses the delay so in-memory-only deltas survive shutdown.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::markdown::render_markdown;
use crate::model::{Collection, ItemStatus, ItemView, Snapshot, Vote, VoteCounts};
use crate::ranking::{self, Page, SelectQuery};
use crate::store::atomic::{atomic_write_json, atomic_write_str};
use crate::store::paths::{collection_dir, pointer_path, slot_path, Slot};
use crate::store::record::RecordStore;
use crate::store::votes::{VoteLedger, VoteOutcome};

/// Idle delay between the first dirtying vote and the snapshot flush.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(15);

pub struct ViewStore {
    data_dir: PathBuf,
    collection: Collection,
    records: RecordStore,
    ledger: VoteLedger,
    mem: RwLock<Snapshot>,
    active: Mutex<Slot>,
    dirty: Mutex<HashSet<u64>>,
    // Serializes slot writes + pointer flips (flush vs. rebuild vs. close).
    publish: Mutex<()>,
    scheduler: FlushScheduler,
}

impl ViewStore {
    /// Open the store for one collection, loading the active snapshot slot
    /// or rebuilding it from the per-item view files.
    pub fn open(data_dir: impl Into<PathBuf>, collection: Collection) -> Result<Arc<Self>> {
        Self::open_with_delay(data_dir, collection, DEFAULT_FLUSH_DELAY)
    }

    pub fn open_with_delay(
        data_dir: impl Into<PathBuf>,
        collection: Collection,
        flush_delay: Duration,
    ) -> Result<Arc<Self>> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let records = RecordStore::new(&data_dir, collection);
        let ledger = VoteLedger::new(records.clone());
        let store = Arc::new(Self {
            data_dir,
            collection,
            records,
            ledger,
            mem: RwLock::new(Snapshot::empty()),
            active: Mutex::new(Slot::A),
            dirty: Mutex::new(HashSet::new()),
            publish: Mutex::new(()),
            scheduler: FlushScheduler::new(flush_delay),
        });

        store.init()?;
        store.scheduler.start(Arc::downgrade(&store))?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        let slot = fs::read_to_string(pointer_path(&self.data_dir, self.collection))
            .map(|raw| Slot::parse(&raw))
            .unwrap_or(Slot::A);
        *self.active.lock() = slot;

        let loaded = fs::read_to_string(slot_path(&self.data_dir, self.collection, slot))
            .ok()
            .and_then(|raw| serde_json::from_str::<Snapshot>(&raw).ok());
        match loaded {
            Some(snapshot) => {
                debug!(collection = %self.collection, %slot, items = snapshot.item_count, "loaded snapshot");
                *self.mem.write() = snapshot;
                Ok(())
            }
            None => {
                // Unreadable active slot: rebuild into the *other* slot and
                // flip; the possibly-valid file is never overwritten.
                self.rebuild().map(|_| ())
            }
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Generation timestamp of the in-memory snapshot, for cache headers.
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.mem.read().generated_at
    }

    pub fn item_count(&self) -> usize {
        self.mem.read().items.len()
    }

    pub fn active_slot(&self) -> Slot {
        *self.active.lock()
    }

    /// Ranked, filtered, paginated feed page. Memory only.
    pub fn select(&self, query: &SelectQuery) -> Page {
        ranking::select(&self.mem.read().items, query, Utc::now())
    }

    /// Single item lookup. Memory only.
    pub fn get(&self, id: u64) -> Option<ItemView> {
        self.mem.read().items.iter().find(|it| it.id == id).cloned()
    }

    /// Cast a vote: ledger + item files first, then the in-memory snapshot,
    /// then a debounced flush. Contended items fail fast with `Busy`.
    pub fn post_vote(&self, id: u64, user_token: &str, vote: Vote) -> Result<VoteCounts> {
        let VoteOutcome { counts, changed } = self.ledger.post_vote(id, user_token, vote)?;
        if changed {
            {
                let mut mem = self.mem.write();
                if let Some(item) = mem.items.iter_mut().find(|it| it.id == id) {
                    item.love_count = counts.love_count;
                    item.meh_count = counts.meh_count;
                }
            }
            self.dirty.lock().insert(id);
            self.scheduler.schedule();
        }
        Ok(counts)
    }

    /// Persist the in-memory snapshot if anything is dirty: whole list to
    /// the inactive slot, then the pointer flip.
    pub fn flush(&self) -> Result<()> {
        let _publish = self.publish.lock();

        // Drain up front: votes landing mid-flush re-dirty and reschedule
        // instead of being silently clean-flagged.
        let drained: HashSet<u64> = std::mem::take(&mut *self.dirty.lock());
        if drained.is_empty() {
            return Ok(());
        }

        let items: Vec<ItemView> = self
            .mem
            .read()
            .items
            .iter()
            .map(|it| with_rendered_html(it))
            .collect();
        let snapshot = Snapshot::new(items);
        let target = self.active.lock().other();

        if let Err(e) = self.publish_snapshot(&snapshot, target) {
            self.dirty.lock().extend(drained);
            return Err(e);
        }

        *self.active.lock() = target;
        {
            let mut mem = self.mem.write();
            mem.generated_at = snapshot.generated_at;
            mem.item_count = snapshot.item_count;
        }
        info!(collection = %self.collection, slot = %target, items = snapshot.item_count, "flushed snapshot");
        Ok(())
    }

    /// Rebuild the snapshot from every per-item view file on disk, publish
    /// it to the inactive slot, and flip. The recovery path for a missing
    /// or corrupt active slot, also exposed for administration.
    pub fn rebuild(&self) -> Result<(Slot, usize)> {
        let _publish = self.publish.lock();

        let snapshot = Snapshot::new(self.scan_views());
        let count = snapshot.item_count;
        let target = self.active.lock().other();

        self.publish_snapshot(&snapshot, target)?;

        *self.mem.write() = snapshot;
        *self.active.lock() = target;
        self.dirty.lock().clear();
        info!(collection = %self.collection, slot = %target, items = count, "rebuilt snapshot");
        Ok((target, count))
    }

    /// Forced flush (no idle delay) and scheduler shutdown. Call on
    /// controlled process exit so unflushed vote deltas are not lost.
    pub fn close(&self) -> Result<()> {
        self.scheduler.shutdown();
        self.flush()
    }

    fn publish_snapshot(&self, snapshot: &Snapshot, target: Slot) -> Result<()> {
        atomic_write_json(&slot_path(&self.data_dir, self.collection, target), snapshot)?;
        atomic_write_str(
            &pointer_path(&self.data_dir, self.collection),
            &format!("{}\n", target.as_str()),
        )?;
        Ok(())
    }

    /// All published per-item views across the shard tree. Missing or
    /// unlistable directories contribute nothing; unparsable views are
    /// skipped, never fatal.
    fn scan_views(&self) -> Vec<ItemView> {
        let dir = collection_dir(&self.data_dir, self.collection);
        let mut items = Vec::new();

        let shards = match fs::read_dir(&dir) {
            Ok(shards) => shards,
            Err(_) => return items,
        };
        for shard in shards.flatten() {
            let files = match fs::read_dir(shard.path()) {
                Ok(files) => files,
                Err(_) => continue,
            };
            for file in files.flatten() {
                let path = file.path();
                if !is_view_file(&path) {
                    continue;
                }
                let Ok(raw) = fs::read_to_string(&path) else {
                    continue;
                };
                match serde_json::from_str::<ItemView>(&raw) {
                    Ok(view) if view.status == ItemStatus::Published => {
                        items.push(with_rendered_html(&view));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unparsable view");
                    }
                }
            }
        }
        items
    }
}

impl Drop for ViewStore {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}

fn is_view_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(".view.json"))
        .unwrap_or(false)
}

fn with_rendered_html(view: &ItemView) -> ItemView {
    if !view.content_html.is_empty() || view.content.is_empty() {
        return view.clone();
    }
    let mut view = view.clone();
    view.content_html = render_markdown(&view.content);
    view
}

// ---------------------------------------------------------------------------
// Flush scheduling
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SchedulerState {
    deadline: Option<Instant>,
    shutdown: bool,
}

struct SchedulerShared {
    delay: Duration,
    state: Mutex<SchedulerState>,
    wakeup: Condvar,
}

/// Debounce timer for snapshot flushes. Arming is idempotent: while a
/// deadline is pending, further schedule calls are absorbed, so at most one
/// flush timer exists per collection.
struct FlushScheduler {
    shared: Arc<SchedulerShared>,
}

impl FlushScheduler {
    fn new(delay: Duration) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                delay,
                state: Mutex::new(SchedulerState::default()),
                wakeup: Condvar::new(),
            }),
        }
    }

    fn start(&self, store: Weak<ViewStore>) -> std::io::Result<()> {
        let shared = self.shared.clone();
        thread::Builder::new()
            .name("feedz-flush".to_string())
            .spawn(move || run_worker(shared, store))?;
        Ok(())
    }

    fn schedule(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown || state.deadline.is_some() {
            return;
        }
        state.deadline = Some(Instant::now() + self.shared.delay);
        self.shared.wakeup.notify_one();
    }

    fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        state.deadline = None;
        self.shared.wakeup.notify_one();
    }
}

fn run_worker(shared: Arc<SchedulerShared>, store: Weak<ViewStore>) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }
        match state.deadline {
            None => {
                shared.wakeup.wait(&mut state);
            }
            Some(deadline) => {
                if Instant::now() < deadline {
                    shared.wakeup.wait_until(&mut state, deadline);
                    continue;
                }
                state.deadline = None;
                drop(state);

                // The store may already be gone; the worker dies with it.
                let Some(store) = store.upgrade() else { return };
                if let Err(e) = store.flush() {
                    error!(collection = %store.collection(), error = %e, "debounced flush failed");
                }
                drop(store);

                state = shared.state.lock();
            }
        }
    }
}
