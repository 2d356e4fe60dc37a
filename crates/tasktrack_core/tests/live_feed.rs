mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use support::{owner, FlakyStore};
use tasktrack_core::{LiveTaskFeed, SqliteTaskStore, TaskDocument, TaskPatch, TaskStore};

#[test]
fn no_identity_means_no_subscription() {
    let store = Arc::new(FlakyStore::new());

    let feed = LiveTaskFeed::subscribe(Arc::clone(&store), None).unwrap();
    assert!(feed.is_none());
    assert_eq!(store.subscribes.load(Ordering::SeqCst), 0);
}

#[test]
fn initial_emission_materializes_existing_tasks() {
    let store = Arc::new(SqliteTaskStore::open_in_memory().unwrap());
    let id = store
        .insert(&TaskDocument::new_task(owner("u1"), "Buy milk"))
        .unwrap();

    let mut feed = LiveTaskFeed::subscribe(Arc::clone(&store), Some(&owner("u1")))
        .unwrap()
        .unwrap();
    assert!(feed.tasks().is_empty());

    assert_eq!(feed.poll(), 1);
    assert_eq!(feed.tasks().len(), 1);
    let task = &feed.tasks()[0];
    assert_eq!(task.id, id);
    assert_eq!(task.text, "Buy milk");
    assert!(!task.done);
    assert!(task.subtasks.is_empty());
    assert_eq!(task.category, "General");
    assert_eq!(task.time, "");
    assert_eq!(task.owner, owner("u1"));
}

#[test]
fn every_change_replaces_the_full_list() {
    let store = Arc::new(SqliteTaskStore::open_in_memory().unwrap());
    let mut feed = LiveTaskFeed::subscribe(Arc::clone(&store), Some(&owner("u1")))
        .unwrap()
        .unwrap();
    feed.poll();

    let first = store
        .insert(&TaskDocument::new_task(owner("u1"), "first"))
        .unwrap();
    let second = store
        .insert(&TaskDocument::new_task(owner("u1"), "second"))
        .unwrap();
    store.update(first, &TaskPatch::done(true)).unwrap();

    // Nothing is visible until the feed is pumped.
    assert!(feed.tasks().is_empty());
    assert_eq!(feed.poll(), 3);

    let view = feed
        .tasks()
        .iter()
        .map(|task| (task.id, task.done))
        .collect::<Vec<_>>();
    assert_eq!(view, vec![(first, true), (second, false)]);

    store.remove(first).unwrap();
    assert_eq!(feed.poll(), 1);
    assert_eq!(feed.tasks().len(), 1);
    assert_eq!(feed.tasks()[0].id, second);
    assert_eq!(feed.emission_count(), 5);
}

#[test]
fn other_users_tasks_never_appear() {
    let store = Arc::new(SqliteTaskStore::open_in_memory().unwrap());
    let mut feed = LiveTaskFeed::subscribe(Arc::clone(&store), Some(&owner("u1")))
        .unwrap()
        .unwrap();

    store
        .insert(&TaskDocument::new_task(owner("u2"), "not mine"))
        .unwrap();
    feed.poll();
    assert!(feed.tasks().is_empty());
}

#[test]
fn close_tears_down_exactly_once() {
    let store = Arc::new(FlakyStore::new());
    let mut feed = LiveTaskFeed::subscribe(Arc::clone(&store), Some(&owner("u1")))
        .unwrap()
        .unwrap();
    assert!(feed.is_active());
    assert_eq!(store.inner().subscriber_count(), 1);

    assert!(feed.close());
    assert!(!feed.close());
    drop(feed);

    assert_eq!(store.subscribes.load(Ordering::SeqCst), 1);
    assert_eq!(store.unsubscribes.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner().subscriber_count(), 0);
}

#[test]
fn drop_releases_subscription() {
    let store = Arc::new(FlakyStore::new());
    let feed = LiveTaskFeed::subscribe(Arc::clone(&store), Some(&owner("u1"))).unwrap();
    drop(feed);

    assert_eq!(store.unsubscribes.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner().subscriber_count(), 0);
}

#[test]
fn closed_feed_ignores_later_writes() {
    let store = Arc::new(SqliteTaskStore::open_in_memory().unwrap());
    let mut feed = LiveTaskFeed::subscribe(Arc::clone(&store), Some(&owner("u1")))
        .unwrap()
        .unwrap();
    feed.poll();
    feed.close();

    store
        .insert(&TaskDocument::new_task(owner("u1"), "late"))
        .unwrap();
    assert_eq!(feed.poll(), 0);
    assert!(feed.tasks().is_empty());
}

#[test]
fn feed_picks_up_commits_from_another_store_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let writer = SqliteTaskStore::open(&path).unwrap();
    let reader = Arc::new(SqliteTaskStore::open(&path).unwrap());
    let mut feed = LiveTaskFeed::subscribe(Arc::clone(&reader), Some(&owner("u1")))
        .unwrap()
        .unwrap();
    assert_eq!(feed.poll(), 1);
    assert!(feed.tasks().is_empty());

    let id = writer
        .insert(&TaskDocument::new_task(owner("u1"), "Buy milk"))
        .unwrap();
    assert_eq!(feed.poll(), 1);
    assert_eq!(feed.tasks()[0].id, id);

    writer.update(id, &TaskPatch::done(true)).unwrap();
    assert_eq!(feed.poll(), 1);
    assert!(feed.tasks()[0].done);
    assert_eq!(feed.poll(), 0);
}
