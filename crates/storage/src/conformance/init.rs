use std::future::Future;

use super::{fresh, make_client, TestResult};
use crate::record::Collection;
use crate::RecordStore;

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "initialize_creates_empty_collections",
        initialize_creates_empty_collections(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "initialize_twice_succeeds",
        initialize_twice_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "reinitialize_keeps_existing_records",
        reinitialize_keeps_existing_records(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "sequences_start_at_zero",
        sequences_start_at_zero(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// After initialize, every collection lists as empty.
async fn initialize_creates_empty_collections<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    for c in Collection::ALL {
        let records = s.list(c).await.map_err(|e| format!("list {c}: {e}"))?;
        if !records.is_empty() {
            return Err(format!("{c}: expected empty, got {} records", records.len()));
        }
    }
    Ok(())
}

/// Calling initialize back to back must not fail.
async fn initialize_twice_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.initialize()
        .await
        .map_err(|e| format!("second initialize: {e}"))
}

/// Re-running initialize on a populated store must not drop data.
async fn reinitialize_keeps_existing_records<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_client(1, "NC001"))
        .await
        .map_err(|e| e.to_string())?;
    s.initialize()
        .await
        .map_err(|e| format!("re-initialize: {e}"))?;
    let got = s
        .get(Collection::Clients, 1)
        .await
        .map_err(|e| e.to_string())?;
    if got != Some(make_client(1, "NC001")) {
        return Err(format!("client lost after re-initialize: {:?}", got));
    }
    Ok(())
}

/// A fresh store has never assigned an id in any collection.
async fn sequences_start_at_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    for c in Collection::ALL {
        let id = s.last_assigned_id(c).await.map_err(|e| e.to_string())?;
        if id != 0 {
            return Err(format!("{c}: expected last_assigned_id 0, got {id}"));
        }
    }
    Ok(())
}
