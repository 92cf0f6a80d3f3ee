use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

// ── Collections ─────────────────────────────────────────────────────────────

/// A named collection in the record store. Each collection holds exactly one
/// entity type.
///
/// Declaration order is significant: the pipeline engine acquires collection
/// locks in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Settings,
    Clients,
    Offers,
    RejectedOffers,
    Services,
    Executions,
    Deliveries,
    Accounts,
    Renewals,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Users,
        Collection::Settings,
        Collection::Clients,
        Collection::Offers,
        Collection::RejectedOffers,
        Collection::Services,
        Collection::Executions,
        Collection::Deliveries,
        Collection::Accounts,
        Collection::Renewals,
    ];

    /// The storage name: SQLite table name, document file stem, backup key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Settings => "settings",
            Collection::Clients => "clients",
            Collection::Offers => "offers",
            Collection::RejectedOffers => "rejected_offers",
            Collection::Services => "services",
            Collection::Executions => "executions",
            Collection::Deliveries => "deliveries",
            Collection::Accounts => "accounts",
            Collection::Renewals => "renewals",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown collection '{}'", s))
    }
}

// ── Status taxonomies ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Approved,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
}

/// The client's verdict on a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAcceptance {
    Pending,
    Accepted,
    Rejected,
}

/// Payment state of an account. `Partial` is part of the taxonomy but no
/// pipeline operation produces it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalStatus {
    Pending,
    Urgent,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    String,
    Boolean,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
}

// ── Entity records ──────────────────────────────────────────────────────────
//
// Dates are `YYYY-MM-DD` strings, timestamps are RFC 3339 strings.

/// A login account for the local application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

/// One typed key/value configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub value_type: SettingType,
    pub description: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    /// Human-facing unique code, `NC` followed by three digits.
    pub company_code: String,
    pub name: String,
    pub address: Option<String>,
    pub manager: Option<String>,
    pub phone: Option<String>,
    pub intermediary: Option<String>,
    pub intermediary_phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub offer_date: String,
    /// Validity in days from `offer_date`.
    pub validity_period: i64,
    pub status: OfferStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Archival copy of an offer the client turned down. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedOffer {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub offer_date: String,
    pub rejection_reason: String,
    pub rejection_date: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub start_date: Option<String>,
    pub expected_end_date: Option<String>,
    pub status: ServiceStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    pub service_id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub preview_date: Option<String>,
    pub notes: Option<String>,
    pub status: ExecutionStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub execution_id: i64,
    pub client_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub delivery_date: String,
    pub notes: Option<String>,
    pub client_acceptance: ClientAcceptance,
    pub status: DeliveryStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A billable account. `remaining_amount` is always
/// `total_amount - paid_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub delivery_id: i64,
    pub client_id: i64,
    pub title: String,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub due_date: Option<String>,
    pub payment_status: PaymentStatus,
    pub invoice_number: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renewal {
    pub id: i64,
    pub client_id: i64,
    pub service_title: String,
    pub original_service_id: Option<i64>,
    pub renewal_date: String,
    pub expiry_date: String,
    pub amount: Decimal,
    pub notification_sent: bool,
    pub status: RenewalStatus,
    pub created_at: String,
    pub updated_at: String,
}

// ── Record: one variant per collection ──────────────────────────────────────

/// A stored row of any collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    User(User),
    Setting(Setting),
    Client(Client),
    Offer(Offer),
    RejectedOffer(RejectedOffer),
    Service(Service),
    Execution(Execution),
    Delivery(Delivery),
    Account(Account),
    Renewal(Renewal),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::User(_) => Collection::Users,
            Record::Setting(_) => Collection::Settings,
            Record::Client(_) => Collection::Clients,
            Record::Offer(_) => Collection::Offers,
            Record::RejectedOffer(_) => Collection::RejectedOffers,
            Record::Service(_) => Collection::Services,
            Record::Execution(_) => Collection::Executions,
            Record::Delivery(_) => Collection::Deliveries,
            Record::Account(_) => Collection::Accounts,
            Record::Renewal(_) => Collection::Renewals,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::User(r) => r.id,
            Record::Setting(r) => r.id,
            Record::Client(r) => r.id,
            Record::Offer(r) => r.id,
            Record::RejectedOffer(r) => r.id,
            Record::Service(r) => r.id,
            Record::Execution(r) => r.id,
            Record::Delivery(r) => r.id,
            Record::Account(r) => r.id,
            Record::Renewal(r) => r.id,
        }
    }

    /// The field that must be unique within the collection besides `id`, with
    /// this record's value for it. `None` for collections without one.
    pub fn unique_key(&self) -> Option<(&'static str, &str)> {
        match self {
            Record::User(r) => Some(("username", r.username.as_str())),
            Record::Setting(r) => Some(("key", r.key.as_str())),
            Record::Client(r) => Some(("company_code", r.company_code.as_str())),
            Record::Account(r) => Some(("invoice_number", r.invoice_number.as_str())),
            _ => None,
        }
    }

    /// Serialize the inner entity as a flat JSON object.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Record::User(r) => serde_json::to_value(r),
            Record::Setting(r) => serde_json::to_value(r),
            Record::Client(r) => serde_json::to_value(r),
            Record::Offer(r) => serde_json::to_value(r),
            Record::RejectedOffer(r) => serde_json::to_value(r),
            Record::Service(r) => serde_json::to_value(r),
            Record::Execution(r) => serde_json::to_value(r),
            Record::Delivery(r) => serde_json::to_value(r),
            Record::Account(r) => serde_json::to_value(r),
            Record::Renewal(r) => serde_json::to_value(r),
        }
    }

    /// Parse a flat JSON object as an entity of `collection`.
    pub fn from_json(
        collection: Collection,
        value: serde_json::Value,
    ) -> Result<Record, serde_json::Error> {
        Ok(match collection {
            Collection::Users => Record::User(serde_json::from_value(value)?),
            Collection::Settings => Record::Setting(serde_json::from_value(value)?),
            Collection::Clients => Record::Client(serde_json::from_value(value)?),
            Collection::Offers => Record::Offer(serde_json::from_value(value)?),
            Collection::RejectedOffers => Record::RejectedOffer(serde_json::from_value(value)?),
            Collection::Services => Record::Service(serde_json::from_value(value)?),
            Collection::Executions => Record::Execution(serde_json::from_value(value)?),
            Collection::Deliveries => Record::Delivery(serde_json::from_value(value)?),
            Collection::Accounts => Record::Account(serde_json::from_value(value)?),
            Collection::Renewals => Record::Renewal(serde_json::from_value(value)?),
        })
    }
}

// ── Entity: typed access to a single collection ─────────────────────────────

/// An entity type bound to exactly one collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> i64;

    fn into_record(self) -> Record;

    /// Unwrap a record of this entity's collection.
    ///
    /// Returns `StorageError::Corrupt` if the record belongs to another
    /// collection.
    fn from_record(record: Record) -> Result<Self, StorageError>;
}

macro_rules! impl_entity {
    ($ty:ident, $variant:ident, $collection:ident) => {
        impl Entity for $ty {
            const COLLECTION: Collection = Collection::$collection;

            fn id(&self) -> i64 {
                self.id
            }

            fn into_record(self) -> Record {
                Record::$variant(self)
            }

            fn from_record(record: Record) -> Result<Self, StorageError> {
                match record {
                    Record::$variant(inner) => Ok(inner),
                    other => Err(StorageError::Corrupt {
                        collection: Collection::$collection,
                        message: format!(
                            "expected a {} record, found one from '{}'",
                            stringify!($ty),
                            other.collection()
                        ),
                    }),
                }
            }
        }

        impl From<$ty> for Record {
            fn from(value: $ty) -> Self {
                Record::$variant(value)
            }
        }
    };
}

impl_entity!(User, User, Users);
impl_entity!(Setting, Setting, Settings);
impl_entity!(Client, Client, Clients);
impl_entity!(Offer, Offer, Offers);
impl_entity!(RejectedOffer, RejectedOffer, RejectedOffers);
impl_entity!(Service, Service, Services);
impl_entity!(Execution, Execution, Executions);
impl_entity!(Delivery, Delivery, Deliveries);
impl_entity!(Account, Account, Accounts);
impl_entity!(Renewal, Renewal, Renewals);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_account() -> Account {
        Account {
            id: 3,
            delivery_id: 9,
            client_id: 1,
            title: "Website".to_string(),
            total_amount: Decimal::new(150_050, 2),
            paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::new(150_050, 2),
            due_date: Some("2025-02-14".to_string()),
            payment_status: PaymentStatus::Unpaid,
            invoice_number: "INV-1".to_string(),
            created_at: "2025-01-15T10:00:00Z".to_string(),
            updated_at: "2025-01-15T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn collection_names_parse_back() {
        for c in Collection::ALL {
            assert_eq!(c.as_str().parse::<Collection>().unwrap(), c);
        }
        assert!("invoices".parse::<Collection>().is_err());
    }

    #[test]
    fn amounts_serialize_as_strings() {
        let json = Record::Account(sample_account()).to_json().unwrap();
        assert_eq!(json["total_amount"], serde_json::json!("1500.50"));
        assert_eq!(json["payment_status"], serde_json::json!("unpaid"));
    }

    #[test]
    fn unique_keys_match_unique_columns() {
        let account = Record::Account(sample_account());
        assert_eq!(account.unique_key(), Some(("invoice_number", "INV-1")));

        let renewal = Renewal {
            id: 1,
            client_id: 1,
            service_title: "Hosting".to_string(),
            original_service_id: None,
            renewal_date: "2025-01-01".to_string(),
            expiry_date: "2026-01-01".to_string(),
            amount: Decimal::ONE,
            notification_sent: false,
            status: RenewalStatus::Pending,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(Record::Renewal(renewal).unique_key(), None);
    }

    #[test]
    fn from_json_rejects_wrong_shape() {
        let json = Record::Account(sample_account()).to_json().unwrap();
        assert!(Record::from_json(Collection::Clients, json).is_err());
    }

    #[test]
    fn from_record_rejects_other_collection() {
        let record = Record::Account(sample_account());
        let err = Client::from_record(record).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Corrupt {
                collection: Collection::Clients,
                ..
            }
        ));
    }

    #[test]
    fn multi_word_statuses_use_snake_case() {
        let v = serde_json::to_value(ServiceStatus::InProgress).unwrap();
        assert_eq!(v, serde_json::json!("in_progress"));
    }
}
