use std::future::Future;

use super::{fresh, make_account, make_renewal, TestResult};
use crate::record::{Collection, Record, Setting, SettingType, User, UserRole};
use crate::RecordStore;

pub(super) async fn run_fidelity_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "fidelity",
        "decimal_amounts_keep_scale",
        decimal_amounts_keep_scale(factory).await,
    ));
    results.push(TestResult::from_result(
        "fidelity",
        "booleans_round_trip",
        booleans_round_trip(factory).await,
    ));
    results.push(TestResult::from_result(
        "fidelity",
        "every_collection_round_trips",
        every_collection_round_trips(factory).await,
    ));

    results
}

async fn decimal_amounts_keep_scale<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_account(1, "INV-1")).await.map_err(|e| e.to_string())?;
    let Some(Record::Account(stored)) = s
        .get(Collection::Accounts, 1)
        .await
        .map_err(|e| e.to_string())?
    else {
        return Err("account 1 not found".to_string());
    };
    if stored.total_amount.to_string() != "1234.567" {
        return Err(format!(
            "expected total 1234.567, got {}",
            stored.total_amount
        ));
    }
    Ok(())
}

async fn booleans_round_trip<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    s.put(make_renewal(1, true)).await.map_err(|e| e.to_string())?;
    s.put(make_renewal(2, false)).await.map_err(|e| e.to_string())?;

    for (id, want) in [(1, true), (2, false)] {
        match s
            .get(Collection::Renewals, id)
            .await
            .map_err(|e| e.to_string())?
        {
            Some(Record::Renewal(r)) if r.notification_sent == want => {}
            other => {
                return Err(format!(
                    "renewal {id}: expected notification_sent={want}, got {:?}",
                    other
                ))
            }
        }
    }
    Ok(())
}

/// One fully populated record per collection reads back unchanged.
async fn every_collection_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = fresh(factory).await?;
    let samples = vec![
        Record::User(User {
            id: 1,
            username: "admin".to_string(),
            password: "admin123".to_string(),
            full_name: "System Administrator".to_string(),
            role: UserRole::Admin,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }),
        Record::Setting(Setting {
            id: 1,
            key: "backup_interval".to_string(),
            value: "weekly".to_string(),
            value_type: SettingType::String,
            description: Some("How often to back up".to_string()),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }),
        super::make_client(1, "NC001"),
        super::make_offer(1, 1),
        make_account(1, "INV-77"),
        make_renewal(1, false),
    ];

    for record in &samples {
        s.put(record.clone()).await.map_err(|e| e.to_string())?;
    }
    for record in &samples {
        let listed = s
            .list(record.collection())
            .await
            .map_err(|e| e.to_string())?;
        if listed.as_slice() != std::slice::from_ref(record) {
            return Err(format!(
                "{}: listed {:?}, expected {:?}",
                record.collection(),
                listed,
                record
            ));
        }
    }
    Ok(())
}
