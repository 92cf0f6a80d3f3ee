//! End-to-end stage transitions, run against both record store backends.

use std::str::FromStr;
use std::sync::Arc;

use nile_pipeline::{dates, settings, Crm, NewClient, NewOffer, NewRenewal, PipelineError};
use nile_storage::{
    Account, Client, Collection, DocumentStore, Execution, Offer, PaymentStatus, RecordStore,
    RecordStoreExt, RejectedOffer, Renewal, RenewalStatus, Service, SqliteStore,
};
use rust_decimal::Decimal;

async fn backends() -> Vec<(&'static str, Crm)> {
    let sqlite: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
    let document: Arc<dyn RecordStore> = Arc::new(DocumentStore::temporary().unwrap());
    vec![
        ("sqlite", Crm::open(sqlite).await.unwrap()),
        ("document", Crm::open(document).await.unwrap()),
    ]
}

async fn client(crm: &Crm, name: &str) -> Client {
    crm.clients()
        .add(NewClient {
            name: name.to_string(),
            ..NewClient::default()
        })
        .await
        .unwrap()
}

async fn offer(crm: &Crm, client_id: i64, amount: &str) -> Offer {
    crm.pipeline()
        .add_offer(NewOffer {
            client_id,
            title: "Annual maintenance".into(),
            description: Some("Quarterly visits".into()),
            amount: Decimal::from_str(amount).unwrap(),
            offer_date: None,
            validity_period: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn offer_travels_to_a_paid_account() {
    for (backend, crm) in backends().await {
        let acme = client(&crm, "Acme Printing").await;
        let offer = offer(&crm, acme.id, "1500.50").await;
        assert_eq!(offer.validity_period, 30);

        let p = crm.pipeline();
        let to_service = p.approve_offer(offer.id).await.unwrap();
        assert_eq!(to_service.client_name, "Acme Printing", "{backend}");
        let to_execution = p.send_service_to_execution(to_service.new_id).await.unwrap();
        let to_delivery = p.mark_delivered(to_execution.new_id).await.unwrap();
        let to_account = p.move_to_accounts(to_delivery.new_id).await.unwrap();

        let store = crm.store();
        assert!(store.list(Collection::Offers).await.unwrap().is_empty());
        assert!(store.list(Collection::Services).await.unwrap().is_empty());
        assert!(store.list(Collection::Executions).await.unwrap().is_empty());
        assert!(store.list(Collection::Deliveries).await.unwrap().is_empty());

        let account = store
            .get_as::<Account>(to_account.new_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.client_id, acme.id, "{backend}");
        assert_eq!(account.delivery_id, to_delivery.new_id);
        assert_eq!(account.total_amount, Decimal::from_str("1500.50").unwrap());
        assert_eq!(account.paid_amount, Decimal::ZERO);
        assert_eq!(account.remaining_amount, account.total_amount);
        assert_eq!(account.payment_status, PaymentStatus::Unpaid);
        assert!(account.invoice_number.starts_with("INV-"), "{backend}");

        let paid = p.record_payment(account.id).await.unwrap();
        assert_eq!(paid.paid_amount, paid.total_amount);
        assert_eq!(paid.remaining_amount, Decimal::ZERO);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        let again = p.record_payment(account.id).await.unwrap_err();
        assert!(matches!(again, PipelineError::Validation(_)), "{backend}");
    }
}

#[tokio::test]
async fn approval_is_observably_atomic() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Blue Nile Foods").await;
        let o = offer(&crm, c.id, "800").await;

        let t = crm.pipeline().approve_offer(o.id).await.unwrap();
        assert_eq!(t.from, Collection::Offers);
        assert_eq!(t.to, Collection::Services);
        assert_eq!(t.source_id, o.id);

        let store = crm.store();
        assert!(store.get_as::<Offer>(o.id).await.unwrap().is_none(), "{backend}");
        let services = store.list_as::<Service>().await.unwrap();
        assert_eq!(services.len(), 1, "{backend}");
        assert_eq!(services[0].id, t.new_id);
        assert_eq!(services[0].client_id, c.id);
        assert_eq!(services[0].title, o.title);
        assert_eq!(services[0].amount, o.amount);
        assert_eq!(
            services[0].start_date.as_deref(),
            Some(dates::format_date(dates::today()).as_str())
        );
    }
}

#[tokio::test]
async fn blank_rejection_reason_changes_nothing() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Cedar Clinic").await;
        let o = offer(&crm, c.id, "120").await;

        for reason in ["", "   ", "\t\n"] {
            let err = crm.pipeline().reject_offer(o.id, reason).await.unwrap_err();
            assert!(matches!(err, PipelineError::Validation(_)), "{backend}");
        }

        let store = crm.store();
        assert!(store.get_as::<Offer>(o.id).await.unwrap().is_some(), "{backend}");
        assert!(store.list(Collection::RejectedOffers).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn rejection_records_reason_and_date() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Delta Tours").await;
        let o = offer(&crm, c.id, "450").await;

        let t = crm
            .pipeline()
            .reject_offer(o.id, "  Budget cut  ")
            .await
            .unwrap();
        let rejected = crm
            .store()
            .get_as::<RejectedOffer>(t.new_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejected.rejection_reason, "Budget cut", "{backend}");
        assert_eq!(rejected.rejection_date, dates::format_date(dates::today()));
        assert_eq!(rejected.offer_date, o.offer_date);

        let listed = crm.pipeline().list_rejected_offers().await.unwrap();
        assert_eq!(listed[0].client_name, "Delta Tours");
        assert_eq!(listed[0].company_code, c.company_code);
    }
}

#[tokio::test]
async fn second_send_to_execution_is_not_found() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Eastern Glass").await;
        let o = offer(&crm, c.id, "99.99").await;
        let service_id = crm.pipeline().approve_offer(o.id).await.unwrap().new_id;

        crm.pipeline()
            .send_service_to_execution(service_id)
            .await
            .unwrap();
        let err = crm
            .pipeline()
            .send_service_to_execution(service_id)
            .await
            .unwrap_err();
        assert!(
            matches!(err, PipelineError::NotFound { collection: Collection::Services, id } if id == service_id),
            "{backend}: {err}"
        );
        assert_eq!(
            crm.store().list_as::<Execution>().await.unwrap().len(),
            1,
            "{backend}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_approvals_have_one_winner() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Falcon Steel").await;
        let offer_id = offer(&crm, c.id, "1000").await.id;
        let crm = Arc::new(crm);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let crm = crm.clone();
            handles.push(tokio::spawn(async move {
                crm.pipeline().approve_offer(offer_id).await
            }));
        }

        let mut wins = 0;
        let mut not_found = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => wins += 1,
                Err(PipelineError::NotFound { .. }) => not_found += 1,
                Err(other) => panic!("{backend}: unexpected error {other}"),
            }
        }
        assert_eq!((wins, not_found), (1, 7), "{backend}");
        assert_eq!(crm.store().list_as::<Service>().await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn invoice_numbers_follow_the_prefix_setting_and_never_repeat() {
    for (backend, crm) in backends().await {
        crm.set_setting(settings::INVOICE_PREFIX, "NILE").await.unwrap();
        let c = client(&crm, "Giza Optics").await;

        let mut invoices = Vec::new();
        for _ in 0..3 {
            let o = offer(&crm, c.id, "10").await;
            let p = crm.pipeline();
            let s = p.approve_offer(o.id).await.unwrap().new_id;
            let e = p.send_service_to_execution(s).await.unwrap().new_id;
            let d = p.mark_delivered(e).await.unwrap().new_id;
            p.move_to_accounts(d).await.unwrap();
        }
        for account in crm.store().list_as::<Account>().await.unwrap() {
            assert!(account.invoice_number.starts_with("NILE-"), "{backend}");
            let due = dates::add_days(dates::today(), 30).unwrap();
            assert_eq!(account.due_date, Some(dates::format_date(due)));
            invoices.push(account.invoice_number);
        }
        invoices.sort();
        invoices.dedup();
        assert_eq!(invoices.len(), 3, "{backend}");
    }
}

#[tokio::test]
async fn ids_are_not_reused_after_deleting_the_newest_record() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Horus Media").await;
        offer(&crm, c.id, "5").await;
        let second = offer(&crm, c.id, "6").await;

        crm.pipeline().reject_offer(second.id, "duplicate").await.unwrap();
        let third = offer(&crm, c.id, "7").await;
        assert!(third.id > second.id, "{backend}");
    }
}

#[tokio::test]
async fn deleted_client_shows_placeholder() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Ibis Textiles").await;
        let o = offer(&crm, c.id, "300").await;
        crm.clients().delete(c.id).await.unwrap();

        let offers = crm.pipeline().list_offers().await.unwrap();
        assert_eq!(offers[0].record.id, o.id, "{backend}");
        assert_eq!(offers[0].client_name, nile_pipeline::UNKNOWN_CLIENT);

        let t = crm.pipeline().approve_offer(o.id).await.unwrap();
        assert_eq!(t.client_name, nile_pipeline::UNKNOWN_CLIENT, "{backend}");
    }
}

#[tokio::test]
async fn renewals_complete_once() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Jasmine Hotels").await;
        let r = crm
            .pipeline()
            .add_renewal(NewRenewal {
                client_id: c.id,
                service_title: "Web hosting".into(),
                original_service_id: None,
                renewal_date: Some("2025-01-01".into()),
                expiry_date: "2025-12-31".into(),
                amount: Decimal::from(1200),
            })
            .await
            .unwrap();
        assert_eq!(r.status, RenewalStatus::Pending);
        assert!(!r.notification_sent);

        let done = crm.pipeline().complete_renewal(r.id).await.unwrap();
        assert_eq!(done.status, RenewalStatus::Completed, "{backend}");
        assert!(matches!(
            crm.pipeline().complete_renewal(r.id).await.unwrap_err(),
            PipelineError::Validation(_)
        ));
        assert!(matches!(
            crm.pipeline().complete_renewal(999).await.unwrap_err(),
            PipelineError::NotFound { .. }
        ));
        assert_eq!(crm.store().list_as::<Renewal>().await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn sweeps_mark_overdue_accounts_and_urgent_renewals() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Karnak Builders").await;
        let o = offer(&crm, c.id, "2000").await;
        let p = crm.pipeline();
        let s = p.approve_offer(o.id).await.unwrap().new_id;
        let e = p.send_service_to_execution(s).await.unwrap().new_id;
        let d = p.mark_delivered(e).await.unwrap().new_id;
        let a = p.move_to_accounts(d).await.unwrap().new_id;

        let today = dates::today();
        let expiry = dates::add_days(today, 5).unwrap();
        p.add_renewal(NewRenewal {
            client_id: c.id,
            service_title: "Support plan".into(),
            original_service_id: Some(s),
            renewal_date: None,
            expiry_date: dates::format_date(expiry),
            amount: Decimal::from(300),
        })
        .await
        .unwrap();

        assert_eq!(crm.refresh(today).await.unwrap(), (0, 1), "{backend}");

        let later = dates::add_days(today, 45).unwrap();
        let (accounts, renewals) = crm.refresh(later).await.unwrap();
        assert_eq!((accounts, renewals), (1, 0), "{backend}");
        let account = crm.store().get_as::<Account>(a).await.unwrap().unwrap();
        assert_eq!(account.payment_status, PaymentStatus::Overdue);

        let summary = crm.dashboard(later).await.unwrap();
        assert_eq!(summary.total_clients, 1);
        assert_eq!(summary.overdue_accounts, 1);
        assert_eq!(summary.outstanding_balance, Decimal::from(2000));
        assert_eq!(summary.upcoming_renewals, 1);

        // overdue accounts can still be paid
        let paid = p.record_payment(a).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid, "{backend}");
    }
}

async fn sorted_rows(crm: &Crm, collection: Collection) -> Vec<nile_storage::Record> {
    let mut rows = crm.store().list(collection).await.unwrap();
    rows.sort_by_key(|r| r.id());
    rows
}

#[tokio::test]
async fn restore_reproduces_every_collection() {
    for (backend, crm) in backends().await {
        let c = client(&crm, "Karnak Logistics").await;
        let p = crm.pipeline();

        // One record parked in every stage.
        let billed = offer(&crm, c.id, "2500").await;
        let t = p.approve_offer(billed.id).await.unwrap();
        let t = p.send_service_to_execution(t.new_id).await.unwrap();
        let t = p.mark_delivered(t.new_id).await.unwrap();
        p.move_to_accounts(t.new_id).await.unwrap();

        let delivered = offer(&crm, c.id, "900").await;
        let t = p.approve_offer(delivered.id).await.unwrap();
        let t = p.send_service_to_execution(t.new_id).await.unwrap();
        p.mark_delivered(t.new_id).await.unwrap();

        let executing = offer(&crm, c.id, "640").await;
        let t = p.approve_offer(executing.id).await.unwrap();
        p.send_service_to_execution(t.new_id).await.unwrap();

        let approved = offer(&crm, c.id, "310").await;
        p.approve_offer(approved.id).await.unwrap();

        let rejected = offer(&crm, c.id, "75").await;
        p.reject_offer(rejected.id, "Out of scope").await.unwrap();

        offer(&crm, c.id, "1200").await;
        p.add_renewal(NewRenewal {
            client_id: c.id,
            service_title: "Fleet tracking".into(),
            original_service_id: None,
            renewal_date: Some("2025-01-01".into()),
            expiry_date: "2025-12-31".into(),
            amount: Decimal::from(480),
        })
        .await
        .unwrap();

        let mut before = Vec::new();
        for collection in Collection::ALL {
            let rows = sorted_rows(&crm, collection).await;
            assert!(!rows.is_empty(), "{backend}: {collection} is empty");
            before.push(rows);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        crm.export_backup(&path).await.unwrap();

        for collection in Collection::ALL {
            crm.store().replace_all(collection, Vec::new()).await.unwrap();
        }
        crm.restore_backup(&path).await.unwrap();

        for (collection, expected) in Collection::ALL.into_iter().zip(before) {
            assert_eq!(
                sorted_rows(&crm, collection).await,
                expected,
                "{backend}: {collection}"
            );
        }
    }
}

#[tokio::test]
async fn conflicting_restore_leaves_the_store_intact() {
    for (backend, crm) in backends().await {
        client(&crm, "Luxor Glassworks").await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conflict.json");
        let row = |id: i64, name: &str| {
            serde_json::json!({
                "id": id,
                "company_code": "NC001",
                "name": name,
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": "2025-01-01T00:00:00Z",
            })
        };
        let doc = serde_json::json!({
            "backup_date": "2025-06-01T10:00:00Z",
            "users": [],
            "settings": [],
            "clients": [row(1, "A"), row(2, "B")],
        });
        std::fs::write(&path, doc.to_string()).unwrap();

        let err = crm.restore_backup(&path).await.unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)), "{backend}: {err}");

        let store = crm.store();
        assert_eq!(store.list(Collection::Users).await.unwrap().len(), 1, "{backend}");
        assert_eq!(store.list(Collection::Settings).await.unwrap().len(), 6, "{backend}");
        assert_eq!(store.list(Collection::Clients).await.unwrap().len(), 1, "{backend}");
    }
}

#[tokio::test]
async fn oversized_renewal_lead_time_is_refused() {
    for (backend, crm) in backends().await {
        let err = crm
            .set_setting(settings::RENEWAL_NOTIFICATION_DAYS, "200000000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)), "{backend}");
        assert_eq!(crm.settings().await.unwrap().renewal_notification_days, 10);
        crm.dashboard(dates::today()).await.unwrap();
    }
}
