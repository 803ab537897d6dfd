use std::time::Duration;

use assert_cmd::Command;
use chrono::{Duration as ChronoDuration, Utc};
use predicates::prelude::*;

use feedz::model::{Collection, ItemRecord, Vote};
use feedz::ranking::{SelectQuery, SortMode};
use feedz::store::record::RecordStore;
use feedz::store::view::ViewStore;

fn published_at(id: u64, title: &str, minutes_ago: i64) -> ItemRecord {
    let created = Utc::now() - ChronoDuration::minutes(minutes_ago);
    ItemRecord {
        created_at: created,
        updated_at: created,
        ..ItemRecord::published(id, title.to_string(), format!("content {}", id), Vec::new(), None)
    }
}

#[test]
fn vote_sequence_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let records = RecordStore::new(dir.path(), Collection::Tips);
    let view = records
        .create(&ItemRecord::published(
            42,
            "Use system prompts".to_string(),
            "Be explicit.".to_string(),
            Vec::new(),
            None,
        ))
        .unwrap();
    assert_eq!((view.love_count, view.meh_count), (0, 0));

    let store = ViewStore::open_with_delay(dir.path(), Collection::Tips, Duration::from_secs(3600)).unwrap();

    let counts = store.post_vote(42, "u1", Vote::Love).unwrap();
    assert_eq!((counts.love_count, counts.meh_count), (1, 0));

    let counts = store.post_vote(42, "u2", Vote::Meh).unwrap();
    assert_eq!((counts.love_count, counts.meh_count), (1, 1));

    let counts = store.post_vote(42, "u1", Vote::Meh).unwrap();
    assert_eq!((counts.love_count, counts.meh_count), (0, 2));

    // Same vote again: idempotent, nothing moves.
    let counts = store.post_vote(42, "u1", Vote::Meh).unwrap();
    assert_eq!((counts.love_count, counts.meh_count), (0, 2));

    // Forced flush on close persists the deltas.
    store.close().unwrap();
    drop(store);

    let reopened = ViewStore::open_with_delay(dir.path(), Collection::Tips, Duration::from_secs(3600)).unwrap();
    let item = reopened.get(42).unwrap();
    assert_eq!((item.love_count, item.meh_count), (0, 2));
}

#[test]
fn rebuilt_feed_surfaces_each_item_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let records = RecordStore::new(dir.path(), Collection::Tips);
    for id in 1..=5 {
        records.create(&published_at(id, &format!("Item {}", id), id as i64)).unwrap();
    }

    let store = ViewStore::open(dir.path(), Collection::Tips).unwrap();
    let page = store.select(&SelectQuery {
        sort: SortMode::New,
        limit: 100,
        ..Default::default()
    });

    let mut ids: Vec<u64> = page.items.iter().map(|it| it.id).collect();
    assert_eq!(ids.len(), 5);
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    store.close().unwrap();
}

#[test]
fn cursor_pages_cover_the_feed_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let records = RecordStore::new(dir.path(), Collection::Tips);
    for id in 1..=9 {
        records.create(&published_at(id, &format!("Item {}", id), id as i64 * 3)).unwrap();
    }

    let store = ViewStore::open(dir.path(), Collection::Tips).unwrap();

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = store.select(&SelectQuery {
            sort: SortMode::New,
            cursor,
            limit: 4,
            ..Default::default()
        });
        pages += 1;
        seen.extend(page.items.iter().map(|it| (it.created_at, it.id)));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 9);
    for pair in seen.windows(2) {
        assert!(pair[0] > pair[1], "feed order not strictly decreasing: {:?}", pair);
    }
    store.close().unwrap();
}

#[test]
fn collections_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    RecordStore::new(dir.path(), Collection::Tips)
        .create(&published_at(1, "A tip", 1))
        .unwrap();
    RecordStore::new(dir.path(), Collection::Prompts)
        .create(&published_at(1, "A prompt", 1))
        .unwrap();

    let tips = ViewStore::open(dir.path(), Collection::Tips).unwrap();
    let prompts = ViewStore::open(dir.path(), Collection::Prompts).unwrap();

    assert_eq!(tips.get(1).unwrap().title, "A tip");
    assert_eq!(prompts.get(1).unwrap().title, "A prompt");

    tips.post_vote(1, "u1", Vote::Love).unwrap();
    assert_eq!(tips.get(1).unwrap().love_count, 1);
    assert_eq!(prompts.get(1).unwrap().love_count, 0);

    tips.close().unwrap();
    prompts.close().unwrap();
}

// ---------------------------------------------------------------------------
// Binary coverage
// ---------------------------------------------------------------------------

#[test]
fn cli_add_then_list_shows_the_item() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("feedz")
        .unwrap()
        .args(["add", "--id", "7", "--title", "Use system prompts"])
        .args(["--content", "Be explicit.", "--tags", "Basics,Style"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Added tip 7"));

    Command::cargo_bin("feedz")
        .unwrap()
        .args(["list", "--sort", "new"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Use system prompts"));
}

#[test]
fn cli_archive_removes_item_after_rebuild() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("feedz")
        .unwrap()
        .args(["add", "--id", "3", "--title", "Short lived", "--content", "bye"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success();

    Command::cargo_bin("feedz")
        .unwrap()
        .args(["archive", "--id", "3"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Archived tip 3"));

    Command::cargo_bin("feedz")
        .unwrap()
        .arg("rebuild")
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 items"));

    Command::cargo_bin("feedz")
        .unwrap()
        .arg("list")
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Short lived").not());
}

#[test]
fn cli_seed_loads_a_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let seed_file = dir.path().join("tips.seed.json");
    std::fs::write(
        &seed_file,
        r#"[
            {"id": 1, "title": "Seeded one", "content": "first"},
            {"id": 2, "title": "Seeded two", "content": "second", "tags": ["intro"], "username": "ada"}
        ]"#,
    )
    .unwrap();

    Command::cargo_bin("feedz")
        .unwrap()
        .args(["seed", "--file"])
        .arg(&seed_file)
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded 2 tips"));

    Command::cargo_bin("feedz")
        .unwrap()
        .args(["list", "--sort", "new"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded one"))
        .stdout(predicate::str::contains("Seeded two"));
}

#[test]
fn cli_edit_missing_item_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("feedz")
        .unwrap()
        .args(["edit", "--id", "404", "--title", "nope"])
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
