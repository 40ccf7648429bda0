//! RenoBudget billing - payment confirmation and entitlement reconciliation
//!
//! This library owns the path from "customer paid at the processor" to
//! "customer's entitlement is durably updated, exactly once". Three independent
//! channels (webhook ingestion, synchronous confirmation, reconciliation sweep)
//! feed one idempotent transition function over an SQLite-backed entitlement store.

pub mod config;
pub mod db;
pub mod email;
pub mod entitlements;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod sweep;
pub mod util;
