use std::future::Future;

use super::{fresh, ids, make_client, make_offer, TestResult};
use crate::record::{Collection, Record};
use crate::RecordStore;

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "crud",
        "put_then_get_returns_record",
        put_then_get_returns_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "get_missing_returns_none",
        get_missing_returns_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "list_is_most_recent_first",
        list_is_most_recent_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "put_existing_id_replaces_in_place",
        put_existing_id_replaces_in_place(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "delete_existing_returns_true",
        delete_existing_returns_true(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "delete_missing_returns_false",
        delete_missing_returns_false(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "collections_are_independent",
        collections_are_independent(factory).await,
    ));

    results
}

async fn put_then_get_returns_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_offer(4, 1)).await.map_err(|e| e.to_string())?;
    let got = s
        .get(Collection::Offers, 4)
        .await
        .map_err(|e| e.to_string())?;
    if got != Some(make_offer(4, 1)) {
        return Err(format!("expected stored offer 4, got {:?}", got));
    }
    Ok(())
}

async fn get_missing_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_offer(1, 1)).await.map_err(|e| e.to_string())?;
    match s.get(Collection::Offers, 999).await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

/// Records created with increasing ids list newest first.
async fn list_is_most_recent_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    for id in 1..=3 {
        s.put(make_client(id, &format!("NC00{id}")))
            .await
            .map_err(|e| e.to_string())?;
    }
    let listed = s
        .list(Collection::Clients)
        .await
        .map_err(|e| e.to_string())?;
    if ids(&listed) != vec![3, 2, 1] {
        return Err(format!("expected [3, 2, 1], got {:?}", ids(&listed)));
    }
    Ok(())
}

/// Putting a record whose id exists overwrites it without adding a row.
async fn put_existing_id_replaces_in_place<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_client(1, "NC001")).await.map_err(|e| e.to_string())?;
    s.put(make_client(2, "NC002")).await.map_err(|e| e.to_string())?;

    let Record::Client(mut edited) = make_client(1, "NC001") else {
        return Err("fixture is not a client".to_string());
    };
    edited.name = "Renamed".to_string();
    edited.manager = Some("Sara".to_string());
    s.put(Record::Client(edited.clone()))
        .await
        .map_err(|e| e.to_string())?;

    let listed = s
        .list(Collection::Clients)
        .await
        .map_err(|e| e.to_string())?;
    if listed.len() != 2 {
        return Err(format!("expected 2 clients, got {}", listed.len()));
    }
    let got = s
        .get(Collection::Clients, 1)
        .await
        .map_err(|e| e.to_string())?;
    if got != Some(Record::Client(edited)) {
        return Err(format!("replacement not visible: {:?}", got));
    }
    Ok(())
}

async fn delete_existing_returns_true<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_offer(1, 1)).await.map_err(|e| e.to_string())?;
    s.put(make_offer(2, 1)).await.map_err(|e| e.to_string())?;

    let found = s
        .delete(Collection::Offers, 1)
        .await
        .map_err(|e| e.to_string())?;
    if !found {
        return Err("delete of existing record returned false".to_string());
    }
    let listed = s
        .list(Collection::Offers)
        .await
        .map_err(|e| e.to_string())?;
    if ids(&listed) != vec![2] {
        return Err(format!("expected only offer 2 left, got {:?}", ids(&listed)));
    }
    Ok(())
}

async fn delete_missing_returns_false<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_offer(1, 1)).await.map_err(|e| e.to_string())?;
    let found = s
        .delete(Collection::Offers, 42)
        .await
        .map_err(|e| e.to_string())?;
    if found {
        return Err("delete of missing record returned true".to_string());
    }
    let remaining = s
        .list(Collection::Offers)
        .await
        .map_err(|e| e.to_string())?;
    if remaining.len() != 1 {
        return Err(format!("expected 1 offer untouched, got {}", remaining.len()));
    }
    Ok(())
}

/// The same id in two collections names two unrelated records.
async fn collections_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_client(1, "NC001")).await.map_err(|e| e.to_string())?;
    s.put(make_offer(1, 1)).await.map_err(|e| e.to_string())?;

    s.delete(Collection::Offers, 1)
        .await
        .map_err(|e| e.to_string())?;

    let client = s
        .get(Collection::Clients, 1)
        .await
        .map_err(|e| e.to_string())?;
    if client.is_none() {
        return Err("deleting offer 1 removed client 1".to_string());
    }
    Ok(())
}
