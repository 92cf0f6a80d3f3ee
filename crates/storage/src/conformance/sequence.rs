use std::future::Future;

use super::{fresh, make_client, make_offer, TestResult};
use crate::record::Collection;
use crate::RecordStore;

pub(super) async fn run_sequence_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "sequence",
        "last_assigned_id_tracks_highest_put",
        last_assigned_id_tracks_highest_put(factory).await,
    ));
    results.push(TestResult::from_result(
        "sequence",
        "last_assigned_id_survives_delete_of_max",
        last_assigned_id_survives_delete_of_max(factory).await,
    ));
    results.push(TestResult::from_result(
        "sequence",
        "last_assigned_id_survives_replace_all",
        last_assigned_id_survives_replace_all(factory).await,
    ));
    results.push(TestResult::from_result(
        "sequence",
        "sequences_are_per_collection",
        sequences_are_per_collection(factory).await,
    ));

    results
}

async fn last_assigned(s: &impl RecordStore, c: Collection) -> Result<i64, String> {
    s.last_assigned_id(c)
        .await
        .map_err(|e| format!("last_assigned_id {c}: {e}"))
}

async fn last_assigned_id_tracks_highest_put<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    for id in [3, 8, 5] {
        s.put(make_offer(id, 1)).await.map_err(|e| e.to_string())?;
    }
    let got = last_assigned(&s, Collection::Offers).await?;
    if got != 8 {
        return Err(format!("expected 8, got {got}"));
    }
    Ok(())
}

/// Deleting the max-id record must not lower the high-water mark.
async fn last_assigned_id_survives_delete_of_max<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_offer(1, 1)).await.map_err(|e| e.to_string())?;
    s.put(make_offer(2, 1)).await.map_err(|e| e.to_string())?;
    s.delete(Collection::Offers, 2)
        .await
        .map_err(|e| e.to_string())?;

    let got = last_assigned(&s, Collection::Offers).await?;
    if got != 2 {
        return Err(format!("expected 2 after deleting offer 2, got {got}"));
    }
    Ok(())
}

async fn last_assigned_id_survives_replace_all<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_offer(10, 1)).await.map_err(|e| e.to_string())?;
    s.replace_all(Collection::Offers, vec![make_offer(4, 1)])
        .await
        .map_err(|e| e.to_string())?;

    let got = last_assigned(&s, Collection::Offers).await?;
    if got < 10 {
        return Err(format!("expected at least 10 after shrinking rewrite, got {got}"));
    }
    Ok(())
}

async fn sequences_are_per_collection<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_client(12, "NC012")).await.map_err(|e| e.to_string())?;
    s.put(make_offer(3, 12)).await.map_err(|e| e.to_string())?;

    let clients = last_assigned(&s, Collection::Clients).await?;
    let offers = last_assigned(&s, Collection::Offers).await?;
    let services = last_assigned(&s, Collection::Services).await?;
    if (clients, offers, services) != (12, 3, 0) {
        return Err(format!(
            "expected (12, 3, 0), got ({clients}, {offers}, {services})"
        ));
    }
    Ok(())
}
