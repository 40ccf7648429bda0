//! Entitlement write-path tests: conditional grant, subscription lifecycle,
//! refund timestamp guard.

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_grant_purchase_once() {
    let conn = setup_test_db();

    let first = queries::try_grant_purchase(&conn, "Buyer@Example.com", now()).unwrap();
    assert!(first, "First grant should flip the flag");

    let second = queries::try_grant_purchase(&conn, "buyer@example.com", now()).unwrap();
    assert!(!second, "Re-delivery should change nothing");

    let ent = queries::get_entitlement(&conn, "buyer@example.com").unwrap().unwrap();
    assert!(ent.purchased);
    assert!(ent.purchased_at.is_some());
    assert_eq!(ent.subscription_status, SubscriptionStatus::None);
}

#[test]
fn test_activate_and_cancel_subscription() {
    let conn = setup_test_db();

    assert!(queries::activate_subscription(&conn, "sub@example.com", now()).unwrap());
    assert!(
        !queries::activate_subscription(&conn, "sub@example.com", now()).unwrap(),
        "Activation is idempotent"
    );

    let ent = queries::get_entitlement(&conn, "sub@example.com").unwrap().unwrap();
    assert!(ent.subscription_active());
    assert!(!ent.purchased, "Subscription alone must not grant the purchase");

    assert!(queries::cancel_subscription(&conn, "sub@example.com").unwrap());
    assert!(
        !queries::cancel_subscription(&conn, "sub@example.com").unwrap(),
        "Cancel is idempotent"
    );

    let ent = queries::get_entitlement(&conn, "sub@example.com").unwrap().unwrap();
    assert_eq!(ent.subscription_status, SubscriptionStatus::Canceled);
}

#[test]
fn test_cancel_without_row_is_noop() {
    let conn = setup_test_db();
    assert!(!queries::cancel_subscription(&conn, "nobody@example.com").unwrap());
    assert!(queries::get_entitlement(&conn, "nobody@example.com").unwrap().is_none());
}

#[test]
fn test_reactivation_after_cancel() {
    let conn = setup_test_db();

    queries::activate_subscription(&conn, "sub@example.com", now()).unwrap();
    queries::cancel_subscription(&conn, "sub@example.com").unwrap();

    assert!(
        queries::activate_subscription(&conn, "sub@example.com", now()).unwrap(),
        "A new successful charge should reactivate"
    );
    let ent = queries::get_entitlement(&conn, "sub@example.com").unwrap().unwrap();
    assert!(ent.subscription_active());
}

#[test]
fn test_refund_clears_everything() {
    let conn = setup_test_db();

    queries::try_grant_purchase(&conn, "buyer@example.com", now()).unwrap();
    queries::activate_subscription(&conn, "buyer@example.com", now()).unwrap();

    queries::apply_refund(&conn, "buyer@example.com", now()).unwrap();

    let ent = queries::get_entitlement(&conn, "buyer@example.com").unwrap().unwrap();
    assert!(!ent.purchased);
    assert!(ent.purchased_at.is_none());
    assert_eq!(ent.subscription_status, SubscriptionStatus::None);
    assert!(ent.refunded_at.is_some());
}

#[test]
fn test_stale_success_loses_to_refund() {
    let conn = setup_test_db();
    let refund_ts = now();

    queries::apply_refund(&conn, "buyer@example.com", refund_ts).unwrap();

    // Success that occurred before the refund: must not re-grant
    let granted = queries::try_grant_purchase(&conn, "buyer@example.com", refund_ts - 100).unwrap();
    assert!(!granted, "A success older than the refund must stay blocked");

    // Exact tie: the refund wins
    let granted = queries::try_grant_purchase(&conn, "buyer@example.com", refund_ts).unwrap();
    assert!(!granted, "A success at the refund timestamp must stay blocked");

    let activated =
        queries::activate_subscription(&conn, "buyer@example.com", refund_ts - 100).unwrap();
    assert!(!activated, "The guard covers the subscription too");
}

#[test]
fn test_fresh_success_after_refund_regrants() {
    let conn = setup_test_db();
    let refund_ts = now() - 100;

    queries::try_grant_purchase(&conn, "buyer@example.com", refund_ts - 50).unwrap();
    queries::apply_refund(&conn, "buyer@example.com", refund_ts).unwrap();

    // The customer bought again after the refund
    let granted = queries::try_grant_purchase(&conn, "buyer@example.com", refund_ts + 50).unwrap();
    assert!(granted, "A genuinely new purchase must go through");

    let ent = queries::get_entitlement(&conn, "buyer@example.com").unwrap().unwrap();
    assert!(ent.purchased);
    assert!(ent.refunded_at.is_some(), "The refund stamp stays for history");
}

#[test]
fn test_refund_for_unknown_customer_inserts_stamp() {
    let conn = setup_test_db();
    let refund_ts = now();

    // Refund webhook beats the success webhook for a customer we never saw
    queries::apply_refund(&conn, "late@example.com", refund_ts).unwrap();

    let ent = queries::get_entitlement(&conn, "late@example.com").unwrap().unwrap();
    assert_eq!(ent.refunded_at, Some(refund_ts));

    let granted = queries::try_grant_purchase(&conn, "late@example.com", refund_ts - 10).unwrap();
    assert!(!granted, "The late-arriving stale success must still be blocked");
}

#[test]
fn test_repeated_refunds_keep_latest_stamp() {
    let conn = setup_test_db();

    queries::apply_refund(&conn, "buyer@example.com", 1_000).unwrap();
    queries::apply_refund(&conn, "buyer@example.com", 2_000).unwrap();
    queries::apply_refund(&conn, "buyer@example.com", 1_500).unwrap();

    let ent = queries::get_entitlement(&conn, "buyer@example.com").unwrap().unwrap();
    assert_eq!(ent.refunded_at, Some(2_000), "The stamp only moves forward");
}

#[test]
fn test_welcome_marker_insert_once() {
    let conn = setup_test_db();

    assert!(queries::try_mark_email_sent(&conn, "buyer@example.com", "purchased", 0).unwrap());
    assert!(!queries::try_mark_email_sent(&conn, "buyer@example.com", "purchased", 0).unwrap());
    // Different sequence slot is a separate marker
    assert!(queries::try_mark_email_sent(&conn, "buyer@example.com", "purchased", 3).unwrap());
}
