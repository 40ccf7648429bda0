//! Pending-transaction tracker tests: CAS transitions, sweep batching,
//! age-ceiling expiry.

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_create_and_get_pending_transaction() {
    let conn = setup_test_db();

    let created = create_test_pending(&conn, "pp-abc", "Buyer@Example.com", ProductKind::Premium);
    assert_eq!(created.email, "buyer@example.com", "Email should be lowercased");
    assert_eq!(created.status, PendingStatus::Pending);
    assert_eq!(created.amount_cents, 14_900);
    assert!(created.completed_at.is_none());

    let fetched = queries::get_pending_transaction(&conn, "pp-abc")
        .unwrap()
        .expect("Should find the transaction");
    assert_eq!(fetched.token, "pp-abc");
    assert_eq!(fetched.product, ProductKind::Premium);

    let missing = queries::get_pending_transaction(&conn, "pp-nope").unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_complete_succeeds_only_once() {
    let conn = setup_test_db();
    create_test_pending(&conn, "pp-once", "buyer@example.com", ProductKind::Premium);

    let first = queries::try_complete_pending_transaction(&conn, "pp-once").unwrap();
    assert!(first, "First completion should win");

    let second = queries::try_complete_pending_transaction(&conn, "pp-once").unwrap();
    assert!(!second, "Second completion should lose");

    let row = queries::get_pending_transaction(&conn, "pp-once").unwrap().unwrap();
    assert_eq!(row.status, PendingStatus::Completed);
    assert!(row.completed_at.is_some());
}

#[test]
fn test_complete_nonexistent_returns_false() {
    let conn = setup_test_db();
    let won = queries::try_complete_pending_transaction(&conn, "pp-ghost").unwrap();
    assert!(!won);
}

#[test]
fn test_expire_never_regresses_completed() {
    let conn = setup_test_db();
    create_test_pending(&conn, "pp-done", "buyer@example.com", ProductKind::Bundle);

    assert!(queries::try_complete_pending_transaction(&conn, "pp-done").unwrap());
    assert!(
        !queries::expire_pending_transaction(&conn, "pp-done").unwrap(),
        "Expiry must not touch a completed transaction"
    );

    let row = queries::get_pending_transaction(&conn, "pp-done").unwrap().unwrap();
    assert_eq!(row.status, PendingStatus::Completed);
}

#[test]
fn test_complete_never_revives_expired() {
    let conn = setup_test_db();
    create_test_pending(&conn, "pp-old", "buyer@example.com", ProductKind::Premium);

    assert!(queries::expire_pending_transaction(&conn, "pp-old").unwrap());
    assert!(
        !queries::try_complete_pending_transaction(&conn, "pp-old").unwrap(),
        "Completion must not touch an expired transaction"
    );
}

#[test]
fn test_list_pending_oldest_first_with_limit() {
    let conn = setup_test_db();
    create_test_pending(&conn, "pp-1", "a@example.com", ProductKind::Premium);
    create_test_pending(&conn, "pp-2", "b@example.com", ProductKind::Premium);
    create_test_pending(&conn, "pp-3", "c@example.com", ProductKind::Premium);
    backdate_pending(&conn, "pp-1", 300);
    backdate_pending(&conn, "pp-2", 200);
    backdate_pending(&conn, "pp-3", 100);

    let batch = queries::list_pending_older_than(&conn, 0, 86400, 2).unwrap();
    assert_eq!(batch.len(), 2, "Limit should cap the batch");
    assert_eq!(batch[0].token, "pp-1", "Oldest first");
    assert_eq!(batch[1].token, "pp-2");
}

#[test]
fn test_list_pending_excludes_resolved_and_ancient() {
    let conn = setup_test_db();
    create_test_pending(&conn, "pp-live", "a@example.com", ProductKind::Premium);
    create_test_pending(&conn, "pp-done", "b@example.com", ProductKind::Premium);
    create_test_pending(&conn, "pp-ancient", "c@example.com", ProductKind::Premium);
    backdate_pending(&conn, "pp-live", 60);
    backdate_pending(&conn, "pp-done", 60);
    backdate_pending(&conn, "pp-ancient", 100_000);
    queries::try_complete_pending_transaction(&conn, "pp-done").unwrap();

    let batch = queries::list_pending_older_than(&conn, 0, 86400, 50).unwrap();
    let tokens: Vec<&str> = batch.iter().map(|p| p.token.as_str()).collect();
    assert_eq!(tokens, vec!["pp-live"], "Resolved and past-ceiling rows stay out");
}

#[test]
fn test_list_pending_min_age_filters_fresh_rows() {
    let conn = setup_test_db();
    create_test_pending(&conn, "pp-fresh", "a@example.com", ProductKind::Premium);
    create_test_pending(&conn, "pp-aged", "b@example.com", ProductKind::Premium);
    backdate_pending(&conn, "pp-aged", 600);

    let batch = queries::list_pending_older_than(&conn, 300, 86400, 50).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].token, "pp-aged");
}

#[test]
fn test_expire_pending_older_than_ceiling() {
    let conn = setup_test_db();
    create_test_pending(&conn, "pp-young", "a@example.com", ProductKind::Premium);
    create_test_pending(&conn, "pp-stale", "b@example.com", ProductKind::Premium);
    backdate_pending(&conn, "pp-stale", 90_000);

    let expired = queries::expire_pending_older_than(&conn, 86400).unwrap();
    assert_eq!(expired, 1);

    let young = queries::get_pending_transaction(&conn, "pp-young").unwrap().unwrap();
    assert_eq!(young.status, PendingStatus::Pending);
    let stale = queries::get_pending_transaction(&conn, "pp-stale").unwrap().unwrap();
    assert_eq!(stale.status, PendingStatus::Expired);
}

#[test]
fn test_concurrent_completion_exactly_one_winner() {
    use std::sync::{Arc, Barrier};

    // File-backed DB so multiple connections share state
    std::fs::create_dir_all("/tmp/claude").ok();
    let db_path = format!("/tmp/claude/test_complete_concurrent_{}.db", uuid::Uuid::new_v4());

    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        init_db(&conn).unwrap();
        create_test_pending(&conn, "pp-race", "buyer@example.com", ProductKind::Premium);
    }

    let barrier = Arc::new(Barrier::new(4));
    let mut handles = vec![];

    for _ in 0..4 {
        let barrier = barrier.clone();
        let path = db_path.clone();
        handles.push(std::thread::spawn(move || {
            let thread_conn = rusqlite::Connection::open(&path).unwrap();
            thread_conn
                .busy_timeout(std::time::Duration::from_secs(5))
                .unwrap();
            barrier.wait();
            queries::try_complete_pending_transaction(&thread_conn, "pp-race").unwrap()
        }));
    }

    let wins: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap() as usize)
        .sum();
    assert_eq!(wins, 1, "Exactly one thread should win the completion");

    std::fs::remove_file(&db_path).ok();
}
