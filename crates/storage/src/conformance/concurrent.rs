use std::future::Future;
use std::sync::Arc;

use super::{fresh, make_offer, TestResult};
use crate::record::Collection;
use crate::{RecordStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_puts_all_land",
        concurrent_puts_all_land(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_deletes_exactly_one_finds",
        concurrent_deletes_exactly_one_finds(factory).await,
    ));

    results
}

// ── Concurrent puts: nothing lost ───────────────────────────────────────────

/// N tasks each insert a different record into the same collection. Every
/// record must be present afterwards; whole-collection rewrites must not
/// clobber each other.
async fn concurrent_puts_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(fresh(factory).await?);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.put(make_offer(i as i64 + 1, 1)).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    let listed = storage
        .list(Collection::Offers)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if listed.len() != N {
        return Err(format!("expected {N} offers, got {}", listed.len()));
    }
    Ok(())
}

// ── Concurrent deletes: exactly one wins ────────────────────────────────────

/// N tasks race to delete the same record. Exactly one sees it.
async fn concurrent_deletes_exactly_one_finds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(fresh(factory).await?);
    storage
        .put(make_offer(1, 1))
        .await
        .map_err(|e| format!("put: {e}"))?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.delete(Collection::Offers, 1).await
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let found = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if found {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}
