//! # Feedz Architecture
//!
//! Feedz is a **file-backed content feed library**. It stores short
//! user-submitted documents (tips and prompts) in a sharded flat-file tree,
//! tallies per-user votes, and serves ranked, paginated, cache-friendly
//! feeds — all from one process, no database. The `feedz` binary is a thin
//! administration client over the same library.
//!
//! ## The Shape of a Request
//!
//! ```text
//!              reads                              writes (votes)
//!                │                                      │
//!                ▼                                      ▼
//! ┌──────────────────────────┐    ┌──────────────────────────────────────┐
//! │  ViewStore (store/view)  │    │  VoteLedger (store/votes)            │
//! │  in-memory snapshot      │    │  per-item fail-fast lock             │
//! │  behind a read lock      │    │  votemap + audit log + view file     │
//! └────────────┬─────────────┘    └────────────────┬─────────────────────┘
//!              │                                   │ patch counts, mark
//!              │ ranked/paginated by               │ dirty, arm debounce
//!              ▼                                   ▼
//! ┌──────────────────────────┐    ┌──────────────────────────────────────┐
//! │  RankingEngine (ranking) │    │  Flush worker: whole list → inactive │
//! │  hot / wilson / cursors  │    │  slot, then pointer flip (A ⇄ B)     │
//! └──────────────────────────┘    └──────────────────────────────────────┘
//! ```
//!
//! Reads never touch the disk or any per-item lock: they see the in-memory
//! snapshot, which may run ahead of the persisted slots but never behind an
//! acknowledged write. Votes on the same item serialize through a fail-fast
//! lock (`Busy` to the loser); votes on different items share nothing.
//!
//! ## Durability Model
//!
//! Every persisted file — master records, views, vote maps, snapshot slots,
//! the slot pointer — is written via temp-file-then-rename. Snapshots are
//! double-buffered: the flush writes the *inactive* slot completely before
//! the pointer names it, so a crash anywhere leaves a valid, selected
//! snapshot on disk. If the active slot is unreadable at startup, the store
//! rebuilds it by scanning the per-item view files (skipping corrupt ones)
//! and publishes into the other slot.
//!
//! ## Module Overview
//!
//! - [`model`]: core data types (`ItemRecord`, `ItemView`, `Snapshot`,
//!   `Vote`, `Collection`)
//! - [`store`]: everything on disk — paths, atomic writes, records, votes,
//!   and the double-buffered view store
//! - [`ranking`]: stateless scoring, filtering and cursor pagination
//! - [`markdown`]: markdown → allowlist-sanitized HTML
//! - [`error`]: error types

pub mod error;
pub mod markdown;
pub mod model;
pub mod ranking;
pub mod store;
