//! The vote ledger: per-item vote maps, exact tallies, and an append-only
//! audit log.
//!
//! Votes on one item serialize through a per-id lock that fails fast — a
//! contended caller gets [`FeedzError::Busy`] immediately and retries on its
//! own schedule. Votes on different items never contend. The ledger is the
//! only mutator of the counts carried on the view file.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FeedzError, Result};
use crate::model::{Vote, VoteCounts};
use crate::store::atomic::atomic_write_json;
use crate::store::record::RecordStore;

/// In-process replacement for a create-if-absent lock file: an id is locked
/// while it sits in the set, and the guard removes it on every exit path.
#[derive(Debug, Default)]
struct LockTable {
    held: Mutex<HashSet<u64>>,
}

struct ItemLock<'a> {
    table: &'a LockTable,
    id: u64,
}

impl LockTable {
    fn try_acquire(&self, id: u64) -> Option<ItemLock<'_>> {
        if self.held.lock().insert(id) {
            Some(ItemLock { table: self, id })
        } else {
            None
        }
    }
}

impl Drop for ItemLock<'_> {
    fn drop(&mut self) {
        self.table.held.lock().remove(&self.id);
    }
}

#[derive(Serialize)]
struct AuditEntry<'a> {
    user_token: &'a str,
    old: Vote,
    vote: Vote,
    ts: DateTime<Utc>,
}

/// The result of a vote: the item's counts afterwards, and whether anything
/// actually changed (a repeated identical vote is a no-op).
#[derive(Debug, Clone, Copy)]
pub struct VoteOutcome {
    pub counts: VoteCounts,
    pub changed: bool,
}

#[derive(Debug)]
pub struct VoteLedger {
    records: RecordStore,
    locks: LockTable,
}

impl VoteLedger {
    pub fn new(records: RecordStore) -> Self {
        Self {
            records,
            locks: LockTable::default(),
        }
    }

    /// Record `user_token`'s vote on an item and update its view counts.
    ///
    /// Fails with [`FeedzError::Busy`] when another vote on the same item is
    /// in flight; never waits. A vote equal to the user's stored vote
    /// returns the current counts unchanged.
    pub fn post_vote(&self, id: u64, user_token: &str, vote: Vote) -> Result<VoteOutcome> {
        let _lock = self.locks.try_acquire(id).ok_or(FeedzError::Busy(id))?;

        let p = self.records.paths(id);
        fs::create_dir_all(&p.dir)?;

        // Missing or corrupt maps start over empty; the view still carries
        // the running tallies.
        let mut map: HashMap<String, Vote> = fs::read_to_string(&p.votes_map)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        let old = map.get(user_token).copied().unwrap_or(Vote::None);
        if old == vote {
            let view = self.records.load_view_or_rebuild(id)?;
            return Ok(VoteOutcome {
                counts: view.counts(),
                changed: false,
            });
        }

        // A user holds exactly one active vote state, so the transition is
        // at most one -1 and one +1 across the two counters.
        let mut love_delta = 0i64;
        let mut meh_delta = 0i64;
        match old {
            Vote::Love => love_delta -= 1,
            Vote::Meh => meh_delta -= 1,
            Vote::None => {}
        }
        match vote {
            Vote::Love => love_delta += 1,
            Vote::Meh => meh_delta += 1,
            Vote::None => {}
        }

        map.insert(user_token.to_string(), vote);
        atomic_write_json(&p.votes_map, &map)?;

        self.append_audit(id, user_token, old, vote);

        let mut view = self.records.load_view_or_rebuild(id)?;
        view.love_count = apply_delta(view.love_count, love_delta);
        view.meh_count = apply_delta(view.meh_count, meh_delta);
        atomic_write_json(&p.view, &view)?;

        debug!(id, user_token, ?old, ?vote, "vote recorded");
        Ok(VoteOutcome {
            counts: view.counts(),
            changed: true,
        })
    }

    // The audit trail is never read at runtime; losing a line must not lose
    // the vote.
    fn append_audit(&self, id: u64, user_token: &str, old: Vote, vote: Vote) {
        let entry = AuditEntry {
            user_token,
            old,
            vote,
            ts: Utc::now(),
        };
        let result = serde_json::to_string(&entry).map_err(FeedzError::from).and_then(|line| {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.records.paths(id).votes_log)?;
            writeln!(file, "{}", line)?;
            Ok(())
        });
        if let Err(e) = result {
            warn!(id, error = %e, "vote audit append failed");
        }
    }
}

fn apply_delta(count: u64, delta: i64) -> u64 {
    (count as i64 + delta).max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Collection, ItemRecord};
    use std::path::Path;

    fn ledger(dir: &Path) -> VoteLedger {
        VoteLedger::new(RecordStore::new(dir, Collection::Tips))
    }

    fn seed_item(dir: &Path, id: u64) {
        let store = RecordStore::new(dir, Collection::Tips);
        store
            .create(&ItemRecord::published(
                id,
                format!("Item {}", id),
                "content".to_string(),
                Vec::new(),
                None,
            ))
            .unwrap();
    }

    fn read_map(dir: &Path, id: u64) -> HashMap<String, Vote> {
        let p = RecordStore::new(dir, Collection::Tips).paths(id);
        serde_json::from_str(&fs::read_to_string(p.votes_map).unwrap()).unwrap()
    }

    #[test]
    fn counts_follow_the_ledger_exactly() {
        let dir = tempfile::tempdir().unwrap();
        seed_item(dir.path(), 1);
        let ledger = ledger(dir.path());

        ledger.post_vote(1, "u1", Vote::Love).unwrap();
        ledger.post_vote(1, "u2", Vote::Love).unwrap();
        ledger.post_vote(1, "u3", Vote::Meh).unwrap();
        let out = ledger.post_vote(1, "u4", Vote::Love).unwrap();

        assert_eq!(out.counts.love_count, 3);
        assert_eq!(out.counts.meh_count, 1);

        let map = read_map(dir.path(), 1);
        let loves = map.values().filter(|v| **v == Vote::Love).count() as u64;
        let mehs = map.values().filter(|v| **v == Vote::Meh).count() as u64;
        assert_eq!(out.counts.love_count, loves);
        assert_eq!(out.counts.meh_count, mehs);
    }

    #[test]
    fn vote_transitions_move_one_count_each_way() {
        let dir = tempfile::tempdir().unwrap();
        seed_item(dir.path(), 42);
        let ledger = ledger(dir.path());

        let out = ledger.post_vote(42, "u1", Vote::Love).unwrap();
        assert_eq!((out.counts.love_count, out.counts.meh_count), (1, 0));

        let out = ledger.post_vote(42, "u2", Vote::Meh).unwrap();
        assert_eq!((out.counts.love_count, out.counts.meh_count), (1, 1));

        // u1 switches sides: love drops, meh rises.
        let out = ledger.post_vote(42, "u1", Vote::Meh).unwrap();
        assert_eq!((out.counts.love_count, out.counts.meh_count), (0, 2));
    }

    #[test]
    fn repeated_identical_vote_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        seed_item(dir.path(), 1);
        let ledger = ledger(dir.path());

        let first = ledger.post_vote(1, "u1", Vote::Meh).unwrap();
        assert!(first.changed);
        let second = ledger.post_vote(1, "u1", Vote::Meh).unwrap();
        assert!(!second.changed);
        assert_eq!(first.counts, second.counts);
    }

    #[test]
    fn clearing_a_vote_returns_counts_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        seed_item(dir.path(), 1);
        let ledger = ledger(dir.path());

        ledger.post_vote(1, "u1", Vote::Love).unwrap();
        let out = ledger.post_vote(1, "u1", Vote::None).unwrap();
        assert_eq!((out.counts.love_count, out.counts.meh_count), (0, 0));
    }

    #[test]
    fn corrupt_vote_map_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        seed_item(dir.path(), 1);
        let store = RecordStore::new(dir.path(), Collection::Tips);
        fs::write(store.paths(1).votes_map, "{{{{").unwrap();

        let ledger = ledger(dir.path());
        let out = ledger.post_vote(1, "u1", Vote::Love).unwrap();
        assert!(out.changed);
        assert_eq!(read_map(dir.path(), 1).len(), 1);
    }

    #[test]
    fn vote_on_missing_item_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(dir.path());
        assert!(matches!(
            ledger.post_vote(99, "u1", Vote::Love),
            Err(FeedzError::NotFound(99))
        ));
    }

    #[test]
    fn vote_heals_a_corrupt_view() {
        let dir = tempfile::tempdir().unwrap();
        seed_item(dir.path(), 1);
        let store = RecordStore::new(dir.path(), Collection::Tips);
        fs::write(store.paths(1).view, "oops").unwrap();

        let ledger = ledger(dir.path());
        let out = ledger.post_vote(1, "u1", Vote::Love).unwrap();
        // Reconstructed from master with zero counts, then the delta.
        assert_eq!((out.counts.love_count, out.counts.meh_count), (1, 0));
        let healed = store.load_view_or_rebuild(1).unwrap();
        assert_eq!(healed.love_count, 1);
    }

    #[test]
    fn audit_log_records_transitions() {
        let dir = tempfile::tempdir().unwrap();
        seed_item(dir.path(), 1);
        let ledger = ledger(dir.path());

        ledger.post_vote(1, "u1", Vote::Love).unwrap();
        ledger.post_vote(1, "u1", Vote::Meh).unwrap();

        let p = RecordStore::new(dir.path(), Collection::Tips).paths(1);
        let log = fs::read_to_string(p.votes_log).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        let last: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(last["old"], 1);
        assert_eq!(last["vote"], -1);
        assert_eq!(last["user_token"], "u1");
    }

    #[test]
    fn held_lock_fails_fast_and_releases_on_drop() {
        let table = LockTable::default();
        let guard = table.try_acquire(7).unwrap();
        assert!(table.try_acquire(7).is_none());
        // A different id is never contended.
        assert!(table.try_acquire(8).is_some());
        drop(guard);
        assert!(table.try_acquire(7).is_some());
    }

    #[test]
    fn concurrent_voters_on_one_item_lose_no_updates() {
        let dir = tempfile::tempdir().unwrap();
        seed_item(dir.path(), 1);
        let ledger = std::sync::Arc::new(ledger(dir.path()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                let token = format!("user-{}", i);
                let vote = if i % 2 == 0 { Vote::Love } else { Vote::Meh };
                loop {
                    match ledger.post_vote(1, &token, vote) {
                        Ok(_) => return,
                        Err(FeedzError::Busy(_)) => std::thread::yield_now(),
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let map = read_map(dir.path(), 1);
        assert_eq!(map.len(), 8);
        let out = ledger.post_vote(1, "observer", Vote::None).unwrap();
        assert_eq!(out.counts.love_count, 4);
        assert_eq!(out.counts.meh_count, 4);
    }
}
