//! Discount code tests: format, single-use redemption, purge.

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_generate_code_format() {
    let conn = setup_test_db();

    let code = queries::generate_discount_code(&conn, "dana.k@example.com", 20, 3600).unwrap();
    let parts: Vec<&str> = code.code.split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "RENO");
    assert_eq!(parts[1], "DANA", "Mailbox prefix, uppercased");
    assert_eq!(parts[2].len(), 6);
    assert_eq!(code.email, "dana.k@example.com");
    assert_eq!(code.discount_percent, 20);
}

#[test]
fn test_generate_code_pads_short_mailbox() {
    let conn = setup_test_db();

    let code = queries::generate_discount_code(&conn, "jo@example.com", 10, 3600).unwrap();
    let prefix = code.code.split('-').nth(1).unwrap();
    assert_eq!(prefix.len(), 4, "Short mailboxes are padded to four characters");
    assert!(prefix.starts_with("JO"));
}

#[test]
fn test_redeem_succeeds_only_once() {
    let conn = setup_test_db();
    create_test_discount(&conn, "RENO-DANA-ABC234", "dana@example.com", 20);

    let first = queries::try_redeem_discount_code(&conn, "RENO-DANA-ABC234", "dana@example.com").unwrap();
    assert!(first, "First redemption should win");

    let second = queries::try_redeem_discount_code(&conn, "RENO-DANA-ABC234", "dana@example.com").unwrap();
    assert!(!second, "Second redemption should lose");

    let code = queries::get_discount_code(&conn, "RENO-DANA-ABC234").unwrap().unwrap();
    assert!(code.used_at.is_some());
}

#[test]
fn test_redeem_rejects_wrong_email() {
    let conn = setup_test_db();
    create_test_discount(&conn, "RENO-DANA-ABC234", "dana@example.com", 20);

    let redeemed =
        queries::try_redeem_discount_code(&conn, "RENO-DANA-ABC234", "mallory@example.com").unwrap();
    assert!(!redeemed, "Codes are bound to one email");

    let code = queries::get_discount_code(&conn, "RENO-DANA-ABC234").unwrap().unwrap();
    assert!(code.used_at.is_none(), "A failed redemption must not consume the code");
}

#[test]
fn test_redeem_rejects_expired() {
    let conn = setup_test_db();
    queries::create_discount_code(&conn, "RENO-DANA-OLD234", "dana@example.com", 20, past_timestamp(60))
        .unwrap();

    let redeemed =
        queries::try_redeem_discount_code(&conn, "RENO-DANA-OLD234", "dana@example.com").unwrap();
    assert!(!redeemed);
}

#[test]
fn test_discount_apply_rounds_down() {
    let code = DiscountCode {
        code: "RENO-DANA-ABC234".to_string(),
        email: "dana@example.com".to_string(),
        discount_percent: 33,
        expires_at: now() + 3600,
        used_at: None,
        created_at: now(),
    };
    // 33% off 14900 = 9983
    assert_eq!(code.apply(14_900), 9_983);
    assert_eq!(code.apply(0), 0);
}

#[test]
fn test_cleanup_purges_only_expired_unused() {
    let conn = setup_test_db();
    create_test_discount(&conn, "RENO-LIVE-ABC234", "a@example.com", 10);
    queries::create_discount_code(&conn, "RENO-DEAD-ABC234", "b@example.com", 10, past_timestamp(60))
        .unwrap();
    queries::create_discount_code(&conn, "RENO-USED-ABC234", "c@example.com", 10, past_timestamp(60))
        .unwrap();
    // Redeemed while still valid, then expired: stays for the audit trail
    conn.execute(
        "UPDATE discount_codes SET used_at = ?1 WHERE code = 'RENO-USED-ABC234'",
        rusqlite::params![past_timestamp(120)],
    )
    .unwrap();

    let purged = queries::cleanup_expired_discount_codes(&conn).unwrap();
    assert_eq!(purged, 1);

    assert!(queries::get_discount_code(&conn, "RENO-LIVE-ABC234").unwrap().is_some());
    assert!(queries::get_discount_code(&conn, "RENO-DEAD-ABC234").unwrap().is_none());
    assert!(queries::get_discount_code(&conn, "RENO-USED-ABC234").unwrap().is_some());
}

#[test]
fn test_concurrent_redemption_exactly_one_winner() {
    use std::sync::{Arc, Barrier};

    std::fs::create_dir_all("/tmp/claude").ok();
    let db_path = format!("/tmp/claude/test_redeem_concurrent_{}.db", uuid::Uuid::new_v4());

    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        init_db(&conn).unwrap();
        create_test_discount(&conn, "RENO-RACE-ABC234", "dana@example.com", 20);
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
            queries::try_redeem_discount_code(&thread_conn, "RENO-RACE-ABC234", "dana@example.com")
                .unwrap()
        }));
    }

    let wins: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap() as usize)
        .sum();
    assert_eq!(wins, 1, "Exactly one thread should redeem the code");

    std::fs::remove_file(&db_path).ok();
}
