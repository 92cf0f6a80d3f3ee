//! Conformance test suite for `RecordStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RecordStore`
//! implementation can run to verify it behaves exactly like the others, so
//! the pipeline engine can run on either without changes. The suite covers:
//!
//! - **Initialization**: empty collections after init, idempotent re-init
//! - **CRUD**: put/get/list/delete semantics, in-place replacement, ordering
//! - **Bulk**: `replace_all` rewrites one collection and nothing else
//! - **Sequence**: the id high-water mark survives deletes and bulk rewrites
//! - **Fidelity**: decimals, booleans, optional fields and enums round-trip
//! - **Concurrency**: parallel writers on a shared store lose nothing
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, *uninitialized* storage instance for each test:
//!
//! ```ignore
//! use nile_storage::conformance::run_conformance_suite;
//! use nile_storage::SqliteStore;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         SqliteStore::in_memory().unwrap()
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod bulk;
mod concurrent;
mod crud;
mod fidelity;
mod init;
mod sequence;

use std::fmt;
use std::future::Future;

use rust_decimal::Decimal;

use crate::record::{
    Account, Client, Offer, OfferStatus, PaymentStatus, Record, Renewal, RenewalStatus,
};
use crate::RecordStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "crud", "sequence").
    pub category: String,
    /// Test name (e.g. "put_then_get_returns_record").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty,
/// uninitialized storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(crud::run_crud_tests(&factory).await);
    results.extend(bulk::run_bulk_tests(&factory).await);
    results.extend(sequence::run_sequence_tests(&factory).await);
    results.extend(fidelity::run_fidelity_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

/// Create a store from the factory and initialize it.
async fn fresh<S, F, Fut>(factory: &F) -> Result<S, String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.initialize().await.map_err(|e| format!("initialize: {e}"))?;
    Ok(s)
}

fn make_client(id: i64, code: &str) -> Record {
    Record::Client(Client {
        id,
        company_code: code.to_string(),
        name: format!("Client {id}"),
        address: Some("Cairo".to_string()),
        manager: None,
        phone: Some("0100000000".to_string()),
        intermediary: None,
        intermediary_phone: None,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        updated_at: "2025-01-01T00:00:00Z".to_string(),
    })
}

fn make_offer(id: i64, client_id: i64) -> Record {
    Record::Offer(Offer {
        id,
        client_id,
        title: format!("Offer {id}"),
        description: None,
        amount: Decimal::new(250_000, 2),
        offer_date: "2025-01-10".to_string(),
        validity_period: 30,
        status: OfferStatus::Pending,
        created_at: "2025-01-10T09:00:00Z".to_string(),
        updated_at: "2025-01-10T09:00:00Z".to_string(),
    })
}

fn make_account(id: i64, invoice: &str) -> Record {
    Record::Account(Account {
        id,
        delivery_id: 1,
        client_id: 1,
        title: "Brand identity".to_string(),
        total_amount: Decimal::new(1_234_567, 3),
        paid_amount: Decimal::ZERO,
        remaining_amount: Decimal::new(1_234_567, 3),
        due_date: None,
        payment_status: PaymentStatus::Unpaid,
        invoice_number: invoice.to_string(),
        created_at: "2025-02-01T12:00:00Z".to_string(),
        updated_at: "2025-02-01T12:00:00Z".to_string(),
    })
}

fn make_renewal(id: i64, notified: bool) -> Record {
    Record::Renewal(Renewal {
        id,
        client_id: 2,
        service_title: "Hosting".to_string(),
        original_service_id: Some(5),
        renewal_date: "2025-03-01".to_string(),
        expiry_date: "2026-03-01".to_string(),
        amount: Decimal::new(99, 0),
        notification_sent: notified,
        status: RenewalStatus::Pending,
        created_at: "2025-03-01T08:00:00Z".to_string(),
        updated_at: "2025-03-01T08:00:00Z".to_string(),
    })
}

fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().map(Record::id).collect()
}
