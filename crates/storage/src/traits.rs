use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{Collection, Entity, Record};

/// The storage trait for Nile CRM backends.
///
/// A `RecordStore` persists records in named collections. Every collection
/// holds one entity type, keyed by a per-collection integer id.
///
/// ## Initialization
///
/// Stores are not usable straight after construction. `initialize()` must be
/// called once before first use; it creates the schema (tables or collection
/// files) with "create if not exists" semantics and is safe to repeat.
///
/// ## Ordering
///
/// `list` returns records most-recently-created first (descending id for
/// records created through the id generator). After `replace_all` the order
/// is implementation-defined.
///
/// ## Id high-water mark
///
/// `last_assigned_id` reports the largest id ever persisted in a collection,
/// including ids whose records have since been deleted. The id generator
/// uses it so deleted ids are never handed out again.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a store can be shared
/// as `Arc<dyn RecordStore>` across async tasks.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Create the schema if it does not exist yet. Idempotent.
    async fn initialize(&self) -> Result<(), StorageError>;

    /// All records of a collection, most recent first.
    async fn list(&self, collection: Collection) -> Result<Vec<Record>, StorageError>;

    /// A single record by id, or `None` if absent.
    async fn get(&self, collection: Collection, id: i64) -> Result<Option<Record>, StorageError>;

    /// Insert a record into its collection, or replace the stored record
    /// with the same id in place.
    async fn put(&self, record: Record) -> Result<(), StorageError>;

    /// Remove a record. Returns whether a record with that id existed.
    async fn delete(&self, collection: Collection, id: i64) -> Result<bool, StorageError>;

    /// Replace the whole content of a collection with `records`.
    ///
    /// Every record must belong to `collection`; otherwise the call fails
    /// with `StorageError::Corrupt` before anything is written.
    async fn replace_all(
        &self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), StorageError>;

    /// Highest id ever persisted in the collection (0 if none).
    async fn last_assigned_id(&self, collection: Collection) -> Result<i64, StorageError>;
}

/// Typed convenience methods on top of [`RecordStore`].
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    /// All entities of type `T`, most recent first.
    async fn list_as<T: Entity>(&self) -> Result<Vec<T>, StorageError> {
        self.list(T::COLLECTION)
            .await?
            .into_iter()
            .map(T::from_record)
            .collect()
    }

    /// A single entity of type `T` by id.
    async fn get_as<T: Entity>(&self, id: i64) -> Result<Option<T>, StorageError> {
        match self.get(T::COLLECTION, id).await? {
            Some(record) => T::from_record(record).map(Some),
            None => Ok(None),
        }
    }

    /// Insert or replace an entity.
    async fn put_as<T: Entity>(&self, entity: T) -> Result<(), StorageError> {
        self.put(entity.into_record()).await
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

/// Reject records that do not belong to `collection`.
pub(crate) fn check_collection(
    collection: Collection,
    records: &[Record],
) -> Result<(), StorageError> {
    match records.iter().find(|r| r.collection() != collection) {
        Some(stray) => Err(StorageError::Corrupt {
            collection,
            message: format!(
                "record {} belongs to '{}', not '{}'",
                stray.id(),
                stray.collection(),
                collection
            ),
        }),
        None => Ok(()),
    }
}
