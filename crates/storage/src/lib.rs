pub mod conformance;
mod document;
mod error;
mod record;
mod sqlite;
mod traits;

pub use document::DocumentStore;
pub use error::StorageError;
pub use record::{
    Account, Client, ClientAcceptance, Collection, Delivery, DeliveryStatus, Entity, Execution,
    ExecutionStatus, Offer, OfferStatus, PaymentStatus, Record, RejectedOffer, Renewal,
    RenewalStatus, Service, ServiceStatus, Setting, SettingType, User, UserRole,
};
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, RecordStoreExt};
