use nile_storage::{
    Account, Client, Delivery, Execution, Offer, OfferStatus, PaymentStatus, RecordStore,
    RecordStoreExt, Renewal, RenewalStatus, Service,
};
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use crate::dates;
use crate::error::PipelineError;

/// Headline counts for the start screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_clients: usize,
    pub pending_offers: usize,
    pub active_services: usize,
    pub in_execution: usize,
    pub awaiting_billing: usize,
    /// Accounts marked overdue, or unpaid with a due date before today.
    pub overdue_accounts: usize,
    /// Sum of `remaining_amount` over accounts that are not paid.
    pub outstanding_balance: Decimal,
    /// Open renewals expiring within the notification lead time (already
    /// expired ones included).
    pub upcoming_renewals: usize,
}

pub async fn summarize(
    store: &dyn RecordStore,
    today: Date,
    lead_days: i64,
) -> Result<DashboardSummary, PipelineError> {
    let horizon = dates::add_days(today, lead_days)?;

    let accounts = store.list_as::<Account>().await?;
    let overdue_accounts = accounts.iter().filter(|a| is_overdue(a, today)).count();
    let outstanding_balance: Decimal = accounts
        .iter()
        .filter(|a| a.payment_status != PaymentStatus::Paid)
        .map(|a| a.remaining_amount)
        .sum();

    let upcoming_renewals = store
        .list_as::<Renewal>()
        .await?
        .iter()
        .filter(|r| r.status != RenewalStatus::Completed)
        .filter(|r| {
            dates::parse_date("expiry_date", &r.expiry_date)
                .map(|expiry| expiry <= horizon)
                .unwrap_or(false)
        })
        .count();

    Ok(DashboardSummary {
        total_clients: store.list_as::<Client>().await?.len(),
        pending_offers: store
            .list_as::<Offer>()
            .await?
            .iter()
            .filter(|o| o.status == OfferStatus::Pending)
            .count(),
        active_services: store.list_as::<Service>().await?.len(),
        in_execution: store.list_as::<Execution>().await?.len(),
        awaiting_billing: store.list_as::<Delivery>().await?.len(),
        overdue_accounts,
        outstanding_balance,
        upcoming_renewals,
    })
}

fn is_overdue(account: &Account, today: Date) -> bool {
    match account.payment_status {
        PaymentStatus::Overdue => true,
        PaymentStatus::Paid => false,
        PaymentStatus::Unpaid | PaymentStatus::Partial => account
            .due_date
            .as_deref()
            .and_then(|d| dates::parse_date("due_date", d).ok())
            .is_some_and(|due| due < today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nile_storage::SqliteStore;
    use std::str::FromStr;
    use time::macros::date;

    fn account(id: i64, status: PaymentStatus, due: &str, remaining: &str) -> Account {
        Account {
            id,
            delivery_id: id,
            client_id: 1,
            title: format!("Job {id}"),
            total_amount: Decimal::from_str(remaining).unwrap(),
            paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::from_str(remaining).unwrap(),
            due_date: Some(due.to_string()),
            payment_status: status,
            invoice_number: format!("INV-{id}"),
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    fn renewal(id: i64, expiry: &str, status: RenewalStatus) -> Renewal {
        Renewal {
            id,
            client_id: 1,
            service_title: "Hosting".into(),
            original_service_id: None,
            renewal_date: "2025-01-01".into(),
            expiry_date: expiry.to_string(),
            amount: Decimal::from(100),
            notification_sent: false,
            status,
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn counts_overdue_and_upcoming() {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().await.unwrap();

        store
            .put_as(account(1, PaymentStatus::Unpaid, "2025-05-01", "100.00"))
            .await
            .unwrap();
        store
            .put_as(account(2, PaymentStatus::Unpaid, "2025-07-01", "50.25"))
            .await
            .unwrap();
        store
            .put_as(account(3, PaymentStatus::Paid, "2025-01-01", "0"))
            .await
            .unwrap();

        store
            .put_as(renewal(1, "2025-06-05", RenewalStatus::Pending))
            .await
            .unwrap();
        store
            .put_as(renewal(2, "2025-08-01", RenewalStatus::Pending))
            .await
            .unwrap();
        store
            .put_as(renewal(3, "2025-06-03", RenewalStatus::Completed))
            .await
            .unwrap();

        let summary = summarize(&store, date!(2025 - 06 - 01), 10).await.unwrap();
        assert_eq!(summary.overdue_accounts, 1);
        assert_eq!(summary.outstanding_balance, Decimal::from_str("150.25").unwrap());
        assert_eq!(summary.upcoming_renewals, 1);
        assert_eq!(summary.total_clients, 0);
    }
}
