use std::collections::BTreeSet;
use std::future::Future;

use super::{fresh, ids, make_client, make_offer, TestResult};
use crate::record::Collection;
use crate::{RecordStore, StorageError};

pub(super) async fn run_bulk_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "bulk",
        "replace_all_rewrites_collection",
        replace_all_rewrites_collection(factory).await,
    ));
    results.push(TestResult::from_result(
        "bulk",
        "replace_all_with_empty_clears",
        replace_all_with_empty_clears(factory).await,
    ));
    results.push(TestResult::from_result(
        "bulk",
        "replace_all_leaves_other_collections",
        replace_all_leaves_other_collections(factory).await,
    ));
    results.push(TestResult::from_result(
        "bulk",
        "replace_all_rejects_foreign_records",
        replace_all_rejects_foreign_records(factory).await,
    ));

    results
}

async fn replace_all_rewrites_collection<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_offer(1, 1)).await.map_err(|e| e.to_string())?;
    s.put(make_offer(2, 1)).await.map_err(|e| e.to_string())?;

    let replacement = vec![make_offer(7, 3), make_offer(5, 3), make_offer(9, 4)];
    s.replace_all(Collection::Offers, replacement.clone())
        .await
        .map_err(|e| e.to_string())?;

    let listed = s
        .list(Collection::Offers)
        .await
        .map_err(|e| e.to_string())?;
    let got: BTreeSet<i64> = ids(&listed).into_iter().collect();
    let want: BTreeSet<i64> = ids(&replacement).into_iter().collect();
    if got != want {
        return Err(format!("expected ids {:?}, got {:?}", want, got));
    }
    for record in &replacement {
        let stored = s
            .get(Collection::Offers, record.id())
            .await
            .map_err(|e| e.to_string())?;
        if stored.as_ref() != Some(record) {
            return Err(format!("offer {} differs after replace_all", record.id()));
        }
    }
    Ok(())
}

async fn replace_all_with_empty_clears<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_client(1, "NC001")).await.map_err(|e| e.to_string())?;
    s.replace_all(Collection::Clients, Vec::new())
        .await
        .map_err(|e| e.to_string())?;
    let listed = s
        .list(Collection::Clients)
        .await
        .map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("expected no clients, got {}", listed.len()));
    }
    Ok(())
}

async fn replace_all_leaves_other_collections<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_client(1, "NC001")).await.map_err(|e| e.to_string())?;
    s.put(make_offer(1, 1)).await.map_err(|e| e.to_string())?;

    s.replace_all(Collection::Offers, Vec::new())
        .await
        .map_err(|e| e.to_string())?;

    let clients = s
        .list(Collection::Clients)
        .await
        .map_err(|e| e.to_string())?;
    if clients.len() != 1 {
        return Err(format!("expected 1 client untouched, got {}", clients.len()));
    }
    Ok(())
}

/// A record from another collection fails the call before anything changes.
async fn replace_all_rejects_foreign_records<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_offer(1, 1)).await.map_err(|e| e.to_string())?;

    let result = s
        .replace_all(Collection::Offers, vec![make_offer(2, 1), make_client(3, "NC003")])
        .await;
    match result {
        Err(StorageError::Corrupt {
            collection: Collection::Offers,
            ..
        }) => {}
        other => return Err(format!("expected Corrupt for offers, got {:?}", other)),
    }

    let listed = s
        .list(Collection::Offers)
        .await
        .map_err(|e| e.to_string())?;
    if ids(&listed) != vec![1] {
        return Err(format!("offers changed by failed replace_all: {:?}", ids(&listed)));
    }
    Ok(())
}
