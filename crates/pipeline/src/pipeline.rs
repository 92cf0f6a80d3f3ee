//! Stage transitions: offer → service → execution → delivery → account, the
//! rejection side branch, payments and renewals.
//!
//! Every transition follows the same sequence under the locks of its source
//! and target collections:
//!
//! 1. read the source record (`NotFound` and no writes if it is absent),
//! 2. look up the owning client for the display name,
//! 3. build the target record with the transition's mapping function,
//! 4. insert the target, then delete the source.
//!
//! A failure between steps 4a and 4b leaves the record in both stages, never
//! in neither.

use std::collections::HashMap;
use std::sync::Arc;

use nile_storage::{
    Account, Client, ClientAcceptance, Collection, Delivery, DeliveryStatus, Entity, Execution,
    ExecutionStatus, Offer, OfferStatus, PaymentStatus, RecordStore, RecordStoreExt,
    RejectedOffer, Renewal, RenewalStatus, Service, ServiceStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::dates;
use crate::error::PipelineError;
use crate::ids::{self, InvoiceNumbers};
use crate::locks::CollectionLocks;
use crate::settings;

/// Display name used when a record's client no longer exists.
pub const UNKNOWN_CLIENT: &str = "Unknown client";

/// Days between an account's creation and its due date.
pub const PAYMENT_TERM_DAYS: i64 = 30;

/// Default offer validity in days.
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// Records that belong to a client.
pub trait ClientOwned: Entity {
    fn client_id(&self) -> i64;
}

macro_rules! client_owned {
    ($($ty:ty),* $(,)?) => {
        $(impl ClientOwned for $ty {
            fn client_id(&self) -> i64 {
                self.client_id
            }
        })*
    };
}

client_owned!(Offer, RejectedOffer, Service, Execution, Delivery, Account, Renewal);

/// A record joined with its client's display name and company code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enriched<T> {
    #[serde(flatten)]
    pub record: T,
    pub client_name: String,
    pub company_code: String,
}

/// The outcome of a committed stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: Collection,
    pub to: Collection,
    pub source_id: i64,
    pub new_id: i64,
    pub client_name: String,
}

/// Values stamped on every record a transition creates.
#[derive(Debug, Clone)]
pub struct Stamp {
    pub id: i64,
    /// `YYYY-MM-DD`
    pub today: String,
    pub now: String,
}

/// Input for [`Pipeline::add_offer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOffer {
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    /// Defaults to today.
    pub offer_date: Option<String>,
    /// Defaults to [`DEFAULT_VALIDITY_DAYS`].
    pub validity_period: Option<i64>,
}

/// Input for [`Pipeline::add_renewal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRenewal {
    pub client_id: i64,
    pub service_title: String,
    pub original_service_id: Option<i64>,
    /// Defaults to today.
    pub renewal_date: Option<String>,
    pub expiry_date: String,
    pub amount: Decimal,
}

// ── Mapping functions ───────────────────────────────────────────────────────

pub fn service_from_offer(offer: Offer, stamp: &Stamp) -> Service {
    Service {
        id: stamp.id,
        client_id: offer.client_id,
        title: offer.title,
        description: offer.description,
        amount: offer.amount,
        start_date: Some(stamp.today.clone()),
        expected_end_date: None,
        status: ServiceStatus::Approved,
        created_at: stamp.now.clone(),
        updated_at: stamp.now.clone(),
    }
}

pub fn rejected_from_offer(offer: Offer, reason: &str, stamp: &Stamp) -> RejectedOffer {
    RejectedOffer {
        id: stamp.id,
        client_id: offer.client_id,
        title: offer.title,
        description: offer.description,
        amount: offer.amount,
        offer_date: offer.offer_date,
        rejection_reason: reason.to_string(),
        rejection_date: stamp.today.clone(),
        created_at: stamp.now.clone(),
    }
}

pub fn execution_from_service(service: Service, stamp: &Stamp) -> Execution {
    Execution {
        id: stamp.id,
        service_id: service.id,
        client_id: service.client_id,
        title: service.title,
        description: service.description,
        amount: service.amount,
        start_date: Some(stamp.today.clone()),
        end_date: service.expected_end_date,
        preview_date: None,
        notes: None,
        status: ExecutionStatus::InProgress,
        created_at: stamp.now.clone(),
        updated_at: stamp.now.clone(),
    }
}

pub fn delivery_from_execution(execution: Execution, stamp: &Stamp) -> Delivery {
    Delivery {
        id: stamp.id,
        execution_id: execution.id,
        client_id: execution.client_id,
        title: execution.title,
        description: execution.description,
        amount: execution.amount,
        delivery_date: stamp.today.clone(),
        notes: execution.notes,
        client_acceptance: ClientAcceptance::Pending,
        status: DeliveryStatus::Delivered,
        created_at: stamp.now.clone(),
        updated_at: stamp.now.clone(),
    }
}

pub fn account_from_delivery(
    delivery: Delivery,
    invoice_number: String,
    due_date: String,
    stamp: &Stamp,
) -> Account {
    let total_amount = delivery.amount;
    let paid_amount = Decimal::ZERO;
    Account {
        id: stamp.id,
        delivery_id: delivery.id,
        client_id: delivery.client_id,
        title: delivery.title,
        total_amount,
        paid_amount,
        remaining_amount: total_amount - paid_amount,
        due_date: Some(due_date),
        payment_status: PaymentStatus::Unpaid,
        invoice_number,
        created_at: stamp.now.clone(),
        updated_at: stamp.now.clone(),
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// The pipeline-stage transition engine.
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    locks: Arc<CollectionLocks>,
    invoices: InvoiceNumbers,
}

impl Pipeline {
    pub fn new(store: Arc<dyn RecordStore>, locks: Arc<CollectionLocks>) -> Self {
        Self {
            store,
            locks,
            invoices: InvoiceNumbers::new(),
        }
    }

    pub async fn add_offer(&self, new: NewOffer) -> Result<Offer, PipelineError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(PipelineError::validation("offer title is required"));
        }
        if new.amount <= Decimal::ZERO {
            return Err(PipelineError::validation(format!(
                "offer amount must be positive, got {}",
                new.amount
            )));
        }
        let validity_period = new.validity_period.unwrap_or(DEFAULT_VALIDITY_DAYS);
        if validity_period <= 0 {
            return Err(PipelineError::validation(
                "validity period must be at least one day",
            ));
        }
        let offer_date = match new.offer_date.as_deref() {
            Some(d) => dates::format_date(dates::parse_date("offer_date", d)?),
            None => dates::format_date(dates::today()),
        };

        let _guards = self
            .locks
            .acquire(&[Collection::Clients, Collection::Offers])
            .await;
        self.require_client(new.client_id).await?;

        let now = dates::now_timestamp();
        let offer = Offer {
            id: ids::next_id(self.store.as_ref(), Collection::Offers).await?,
            client_id: new.client_id,
            title: title.to_string(),
            description: new.description.filter(|d| !d.trim().is_empty()),
            amount: new.amount,
            offer_date,
            validity_period,
            status: OfferStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.put_as(offer.clone()).await?;
        tracing::info!(offer_id = offer.id, client_id = offer.client_id, amount = %offer.amount, "offer added");
        Ok(offer)
    }

    /// Offer → Service.
    pub async fn approve_offer(&self, offer_id: i64) -> Result<Transition, PipelineError> {
        let transition = self
            .advance(offer_id, |offer: Offer, stamp| {
                if offer.status != OfferStatus::Pending {
                    return Err(PipelineError::validation(format!(
                        "offer {} is not pending",
                        offer.id
                    )));
                }
                Ok(service_from_offer(offer, stamp))
            })
            .await?;
        tracing::info!(
            offer_id,
            service_id = transition.new_id,
            client = %transition.client_name,
            "offer approved"
        );
        Ok(transition)
    }

    /// Offer → RejectedOffer. `reason` must contain more than whitespace.
    pub async fn reject_offer(
        &self,
        offer_id: i64,
        reason: &str,
    ) -> Result<Transition, PipelineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PipelineError::validation("a rejection reason is required"));
        }
        let transition = self
            .advance(offer_id, |offer: Offer, stamp| {
                if offer.status != OfferStatus::Pending {
                    return Err(PipelineError::validation(format!(
                        "offer {} is not pending",
                        offer.id
                    )));
                }
                Ok(rejected_from_offer(offer, reason, stamp))
            })
            .await?;
        tracing::info!(
            offer_id,
            rejected_id = transition.new_id,
            client = %transition.client_name,
            reason,
            "offer rejected"
        );
        Ok(transition)
    }

    /// Service → Execution.
    pub async fn send_service_to_execution(
        &self,
        service_id: i64,
    ) -> Result<Transition, PipelineError> {
        let transition = self
            .advance(service_id, |service: Service, stamp| {
                Ok(execution_from_service(service, stamp))
            })
            .await?;
        tracing::info!(
            service_id,
            execution_id = transition.new_id,
            client = %transition.client_name,
            "service sent to execution"
        );
        Ok(transition)
    }

    /// Execution → Delivery.
    pub async fn mark_delivered(&self, execution_id: i64) -> Result<Transition, PipelineError> {
        let transition = self
            .advance(execution_id, |execution: Execution, stamp| {
                Ok(delivery_from_execution(execution, stamp))
            })
            .await?;
        tracing::info!(
            execution_id,
            delivery_id = transition.new_id,
            client = %transition.client_name,
            "execution delivered"
        );
        Ok(transition)
    }

    /// Delivery → Account, with a fresh invoice number and a due date
    /// [`PAYMENT_TERM_DAYS`] from today.
    pub async fn move_to_accounts(&self, delivery_id: i64) -> Result<Transition, PipelineError> {
        let prefix = settings::load(self.store.as_ref()).await?.invoice_prefix;
        let due_date = dates::format_date(dates::add_days(dates::today(), PAYMENT_TERM_DAYS)?);
        let invoices = &self.invoices;

        let transition = self
            .advance(delivery_id, |delivery: Delivery, stamp| {
                let invoice_number = invoices.next(&prefix);
                Ok(account_from_delivery(delivery, invoice_number, due_date, stamp))
            })
            .await?;
        tracing::info!(
            delivery_id,
            account_id = transition.new_id,
            client = %transition.client_name,
            "delivery moved to accounts"
        );
        Ok(transition)
    }

    /// Mark an account fully paid.
    pub async fn record_payment(&self, account_id: i64) -> Result<Account, PipelineError> {
        let _guards = self.locks.acquire(&[Collection::Accounts]).await;
        let mut account = self
            .store
            .get_as::<Account>(account_id)
            .await?
            .ok_or(PipelineError::not_found(Collection::Accounts, account_id))?;
        if account.payment_status == PaymentStatus::Paid {
            return Err(PipelineError::validation(format!(
                "account {account_id} is already paid"
            )));
        }

        account.paid_amount = account.total_amount;
        account.remaining_amount = Decimal::ZERO;
        account.payment_status = PaymentStatus::Paid;
        account.updated_at = dates::now_timestamp();
        self.store.put_as(account.clone()).await?;
        tracing::info!(
            account_id,
            invoice = %account.invoice_number,
            amount = %account.paid_amount,
            "payment recorded"
        );
        Ok(account)
    }

    pub async fn add_renewal(&self, new: NewRenewal) -> Result<Renewal, PipelineError> {
        let service_title = new.service_title.trim();
        if service_title.is_empty() {
            return Err(PipelineError::validation("renewal service title is required"));
        }
        if new.amount < Decimal::ZERO {
            return Err(PipelineError::validation(format!(
                "renewal amount cannot be negative, got {}",
                new.amount
            )));
        }
        let renewal_date = match new.renewal_date.as_deref() {
            Some(d) => dates::parse_date("renewal_date", d)?,
            None => dates::today(),
        };
        let expiry_date = dates::parse_date("expiry_date", &new.expiry_date)?;
        if expiry_date < renewal_date {
            return Err(PipelineError::validation(format!(
                "expiry date {} is before renewal date {}",
                dates::format_date(expiry_date),
                dates::format_date(renewal_date)
            )));
        }

        let _guards = self
            .locks
            .acquire(&[Collection::Clients, Collection::Renewals])
            .await;
        self.require_client(new.client_id).await?;

        let now = dates::now_timestamp();
        let renewal = Renewal {
            id: ids::next_id(self.store.as_ref(), Collection::Renewals).await?,
            client_id: new.client_id,
            service_title: service_title.to_string(),
            original_service_id: new.original_service_id,
            renewal_date: dates::format_date(renewal_date),
            expiry_date: dates::format_date(expiry_date),
            amount: new.amount,
            notification_sent: false,
            status: RenewalStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.put_as(renewal.clone()).await?;
        tracing::info!(renewal_id = renewal.id, client_id = renewal.client_id, expiry = %renewal.expiry_date, "renewal added");
        Ok(renewal)
    }

    pub async fn complete_renewal(&self, renewal_id: i64) -> Result<Renewal, PipelineError> {
        let _guards = self.locks.acquire(&[Collection::Renewals]).await;
        let mut renewal = self
            .store
            .get_as::<Renewal>(renewal_id)
            .await?
            .ok_or(PipelineError::not_found(Collection::Renewals, renewal_id))?;
        if renewal.status == RenewalStatus::Completed {
            return Err(PipelineError::validation(format!(
                "renewal {renewal_id} is already completed"
            )));
        }

        renewal.status = RenewalStatus::Completed;
        renewal.updated_at = dates::now_timestamp();
        self.store.put_as(renewal.clone()).await?;
        tracing::info!(renewal_id, "renewal completed");
        Ok(renewal)
    }

    /// Mark unpaid and partially paid accounts whose due date is before
    /// `today` as overdue. Returns how many accounts changed.
    pub async fn refresh_overdue(&self, today: Date) -> Result<usize, PipelineError> {
        let _guards = self.locks.acquire(&[Collection::Accounts]).await;
        let now = dates::now_timestamp();
        let mut changed = 0;
        for mut account in self.store.list_as::<Account>().await? {
            if !matches!(
                account.payment_status,
                PaymentStatus::Unpaid | PaymentStatus::Partial
            ) {
                continue;
            }
            let Some(due) = account.due_date.as_deref() else {
                continue;
            };
            let due = match dates::parse_date("due_date", due) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(account_id = account.id, error = %e, "skipping account with unreadable due date");
                    continue;
                }
            };
            if due < today {
                account.payment_status = PaymentStatus::Overdue;
                account.updated_at = now.clone();
                self.store.put_as(account).await?;
                changed += 1;
            }
        }
        tracing::info!(changed, "overdue accounts refreshed");
        Ok(changed)
    }

    /// Mark pending renewals that expire within `lead_days` of `today` as
    /// urgent. Returns how many renewals changed.
    pub async fn refresh_renewal_urgency(
        &self,
        today: Date,
        lead_days: i64,
    ) -> Result<usize, PipelineError> {
        let horizon = dates::add_days(today, lead_days)?;
        let _guards = self.locks.acquire(&[Collection::Renewals]).await;
        let now = dates::now_timestamp();
        let mut changed = 0;
        for mut renewal in self.store.list_as::<Renewal>().await? {
            if renewal.status != RenewalStatus::Pending {
                continue;
            }
            let expiry = match dates::parse_date("expiry_date", &renewal.expiry_date) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(renewal_id = renewal.id, error = %e, "skipping renewal with unreadable expiry date");
                    continue;
                }
            };
            if expiry <= horizon {
                renewal.status = RenewalStatus::Urgent;
                renewal.updated_at = now.clone();
                self.store.put_as(renewal).await?;
                changed += 1;
            }
        }
        tracing::info!(changed, lead_days, "renewal urgency refreshed");
        Ok(changed)
    }

    // ── Enriched listings ───────────────────────────────────────────────────

    pub async fn list_offers(&self) -> Result<Vec<Enriched<Offer>>, PipelineError> {
        self.enriched().await
    }

    pub async fn list_rejected_offers(&self) -> Result<Vec<Enriched<RejectedOffer>>, PipelineError> {
        self.enriched().await
    }

    pub async fn list_services(&self) -> Result<Vec<Enriched<Service>>, PipelineError> {
        self.enriched().await
    }

    pub async fn list_executions(&self) -> Result<Vec<Enriched<Execution>>, PipelineError> {
        self.enriched().await
    }

    pub async fn list_deliveries(&self) -> Result<Vec<Enriched<Delivery>>, PipelineError> {
        self.enriched().await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Enriched<Account>>, PipelineError> {
        self.enriched().await
    }

    pub async fn list_renewals(&self) -> Result<Vec<Enriched<Renewal>>, PipelineError> {
        self.enriched().await
    }

    // ── Internals ───────────────────────────────────────────────────────────

    async fn advance<S, T, F>(&self, source_id: i64, build: F) -> Result<Transition, PipelineError>
    where
        S: ClientOwned,
        T: Entity,
        F: FnOnce(S, &Stamp) -> Result<T, PipelineError> + Send,
    {
        let _guards = self.locks.acquire(&[S::COLLECTION, T::COLLECTION]).await;

        let source = self
            .store
            .get_as::<S>(source_id)
            .await?
            .ok_or(PipelineError::not_found(S::COLLECTION, source_id))?;
        let (client_name, _) = self.client_label(source.client_id()).await?;

        let stamp = Stamp {
            id: ids::next_id(self.store.as_ref(), T::COLLECTION).await?,
            today: dates::format_date(dates::today()),
            now: dates::now_timestamp(),
        };
        let target = build(source, &stamp)?;

        self.store.put_as(target).await?;
        self.store.delete(S::COLLECTION, source_id).await?;

        Ok(Transition {
            from: S::COLLECTION,
            to: T::COLLECTION,
            source_id,
            new_id: stamp.id,
            client_name,
        })
    }

    async fn require_client(&self, client_id: i64) -> Result<Client, PipelineError> {
        self.store
            .get_as::<Client>(client_id)
            .await?
            .ok_or(PipelineError::not_found(Collection::Clients, client_id))
    }

    /// `(name, company_code)` of a client, or the placeholder if it is gone.
    async fn client_label(&self, client_id: i64) -> Result<(String, String), PipelineError> {
        Ok(match self.store.get_as::<Client>(client_id).await? {
            Some(client) => (client.name, client.company_code),
            None => {
                tracing::warn!(client_id, "client not found, using placeholder name");
                (UNKNOWN_CLIENT.to_string(), String::new())
            }
        })
    }

    async fn enriched<T: ClientOwned>(&self) -> Result<Vec<Enriched<T>>, PipelineError> {
        let clients: HashMap<i64, Client> = self
            .store
            .list_as::<Client>()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let records = self.store.list_as::<T>().await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let (client_name, company_code) = match clients.get(&record.client_id()) {
                    Some(c) => (c.name.clone(), c.company_code.clone()),
                    None => {
                        tracing::warn!(
                            collection = T::COLLECTION.as_str(),
                            id = Entity::id(&record),
                            client_id = record.client_id(),
                            "client not found, using placeholder name"
                        );
                        (UNKNOWN_CLIENT.to_string(), String::new())
                    }
                };
                Enriched {
                    record,
                    client_name,
                    company_code,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nile_storage::SqliteStore;
    use std::str::FromStr;

    fn stamp(id: i64) -> Stamp {
        Stamp {
            id,
            today: "2025-06-01".into(),
            now: "2025-06-01T09:30:00Z".into(),
        }
    }

    fn offer() -> Offer {
        Offer {
            id: 4,
            client_id: 2,
            title: "Website redesign".into(),
            description: Some("Three pages".into()),
            amount: Decimal::from_str("1500.50").unwrap(),
            offer_date: "2025-05-20".into(),
            validity_period: 30,
            status: OfferStatus::Pending,
            created_at: "2025-05-20T08:00:00Z".into(),
            updated_at: "2025-05-20T08:00:00Z".into(),
        }
    }

    #[test]
    fn approval_copies_commercial_fields() {
        let service = service_from_offer(offer(), &stamp(11));
        assert_eq!(service.id, 11);
        assert_eq!(service.client_id, 2);
        assert_eq!(service.title, "Website redesign");
        assert_eq!(service.description.as_deref(), Some("Three pages"));
        assert_eq!(service.amount, Decimal::from_str("1500.50").unwrap());
        assert_eq!(service.start_date.as_deref(), Some("2025-06-01"));
        assert_eq!(service.status, ServiceStatus::Approved);
    }

    #[test]
    fn rejection_keeps_offer_date_and_reason() {
        let rejected = rejected_from_offer(offer(), "Over budget", &stamp(1));
        assert_eq!(rejected.offer_date, "2025-05-20");
        assert_eq!(rejected.rejection_date, "2025-06-01");
        assert_eq!(rejected.rejection_reason, "Over budget");
    }

    #[test]
    fn amount_survives_every_stage_into_the_account() {
        let service = service_from_offer(offer(), &stamp(1));
        let execution = execution_from_service(service, &stamp(2));
        assert_eq!(execution.service_id, 1);
        assert_eq!(execution.status, ExecutionStatus::InProgress);

        let delivery = delivery_from_execution(execution, &stamp(3));
        assert_eq!(delivery.execution_id, 2);
        assert_eq!(delivery.client_acceptance, ClientAcceptance::Pending);

        let account =
            account_from_delivery(delivery, "INV-1".into(), "2025-07-01".into(), &stamp(4));
        assert_eq!(account.delivery_id, 3);
        assert_eq!(account.total_amount, Decimal::from_str("1500.50").unwrap());
        assert_eq!(account.paid_amount, Decimal::ZERO);
        assert_eq!(account.remaining_amount, account.total_amount);
        assert_eq!(account.payment_status, PaymentStatus::Unpaid);
        assert_eq!(account.due_date.as_deref(), Some("2025-07-01"));
    }

    async fn pipeline() -> (Arc<dyn RecordStore>, Pipeline) {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().await.unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(store);
        let pipeline = Pipeline::new(store.clone(), Arc::new(CollectionLocks::new()));
        (store, pipeline)
    }

    #[tokio::test]
    async fn add_offer_requires_an_existing_client() {
        let (_, pipeline) = pipeline().await;
        let err = pipeline
            .add_offer(NewOffer {
                client_id: 99,
                title: "Audit".into(),
                description: None,
                amount: Decimal::from(100),
                offer_date: None,
                validity_period: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NotFound {
                collection: Collection::Clients,
                id: 99
            }
        ));
    }

    #[tokio::test]
    async fn add_offer_rejects_non_positive_amount() {
        let (_, pipeline) = pipeline().await;
        let err = pipeline
            .add_offer(NewOffer {
                client_id: 1,
                title: "Audit".into(),
                description: None,
                amount: Decimal::ZERO,
                offer_date: None,
                validity_period: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn listing_with_missing_client_uses_placeholder() {
        let (store, pipeline) = pipeline().await;
        store.put_as(offer()).await.unwrap();

        let listed = pipeline.list_offers().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].client_name, UNKNOWN_CLIENT);
        assert_eq!(listed[0].company_code, "");
    }

    #[tokio::test]
    async fn enriched_json_is_flat() {
        let (store, pipeline) = pipeline().await;
        store.put_as(offer()).await.unwrap();
        let listed = pipeline.list_offers().await.unwrap();
        let json = serde_json::to_value(&listed[0]).unwrap();
        assert_eq!(json["title"], "Website redesign");
        assert_eq!(json["client_name"], UNKNOWN_CLIENT);
        assert_eq!(json["amount"], "1500.50");
    }

    #[tokio::test]
    async fn renewal_expiry_must_not_precede_renewal_date() {
        let (_, pipeline) = pipeline().await;
        let err = pipeline
            .add_renewal(NewRenewal {
                client_id: 1,
                service_title: "Hosting".into(),
                original_service_id: None,
                renewal_date: Some("2025-06-10".into()),
                expiry_date: "2025-06-01".into(),
                amount: Decimal::from(50),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("before renewal date"));
    }
}
