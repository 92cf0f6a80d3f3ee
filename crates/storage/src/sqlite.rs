//! SQLite-backed implementation of [`RecordStore`].
//!
//! Each collection is a table with typed columns; every operation is a
//! parameterized statement. A single `Mutex<Connection>` serializes access,
//! and every statement runs on tokio's blocking pool.
//!
//! Records cross the SQL boundary as flat JSON objects: a row is read column
//! by column into a JSON map and deserialized into the entity struct, and an
//! entity is serialized to JSON and bound column by column. Decimal amounts
//! are stored as TEXT so no precision is lost.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::record::{Collection, Record};
use crate::traits::{check_collection, RecordStore};

/// Idempotent DDL for all collections.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT UNIQUE NOT NULL,
    value TEXT NOT NULL,
    value_type TEXT NOT NULL DEFAULT 'string',
    description TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_code TEXT UNIQUE NOT NULL,
    name TEXT NOT NULL,
    address TEXT,
    manager TEXT,
    phone TEXT,
    intermediary TEXT,
    intermediary_phone TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS offers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    amount TEXT NOT NULL,
    offer_date TEXT NOT NULL,
    validity_period INTEGER NOT NULL DEFAULT 30,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rejected_offers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    amount TEXT NOT NULL,
    offer_date TEXT NOT NULL,
    rejection_reason TEXT NOT NULL,
    rejection_date TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS services (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    amount TEXT NOT NULL,
    start_date TEXT,
    expected_end_date TEXT,
    status TEXT NOT NULL DEFAULT 'approved',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS executions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    service_id INTEGER NOT NULL,
    client_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    amount TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT,
    preview_date TEXT,
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'in_progress',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deliveries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id INTEGER NOT NULL,
    client_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    amount TEXT NOT NULL,
    delivery_date TEXT NOT NULL,
    notes TEXT,
    client_acceptance TEXT NOT NULL DEFAULT 'pending',
    status TEXT NOT NULL DEFAULT 'delivered',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    delivery_id INTEGER NOT NULL,
    client_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    paid_amount TEXT NOT NULL DEFAULT '0',
    remaining_amount TEXT NOT NULL,
    due_date TEXT,
    payment_status TEXT NOT NULL DEFAULT 'unpaid',
    invoice_number TEXT UNIQUE NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS renewals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id INTEGER NOT NULL,
    service_title TEXT NOT NULL,
    original_service_id INTEGER,
    renewal_date TEXT NOT NULL,
    expiry_date TEXT NOT NULL,
    amount TEXT NOT NULL DEFAULT '0',
    notification_sent INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// How a column's SQL value maps to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Integer,
    Text,
    /// Stored as INTEGER 0/1.
    Bool,
}

use Kind::{Bool, Integer, Text};

/// Column layout per table, `id` first. Must match `CREATE_TABLES`.
fn columns(collection: Collection) -> &'static [(&'static str, Kind)] {
    match collection {
        Collection::Users => &[
            ("id", Integer),
            ("username", Text),
            ("password", Text),
            ("full_name", Text),
            ("role", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        Collection::Settings => &[
            ("id", Integer),
            ("key", Text),
            ("value", Text),
            ("value_type", Text),
            ("description", Text),
            ("updated_at", Text),
        ],
        Collection::Clients => &[
            ("id", Integer),
            ("company_code", Text),
            ("name", Text),
            ("address", Text),
            ("manager", Text),
            ("phone", Text),
            ("intermediary", Text),
            ("intermediary_phone", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        Collection::Offers => &[
            ("id", Integer),
            ("client_id", Integer),
            ("title", Text),
            ("description", Text),
            ("amount", Text),
            ("offer_date", Text),
            ("validity_period", Integer),
            ("status", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        Collection::RejectedOffers => &[
            ("id", Integer),
            ("client_id", Integer),
            ("title", Text),
            ("description", Text),
            ("amount", Text),
            ("offer_date", Text),
            ("rejection_reason", Text),
            ("rejection_date", Text),
            ("created_at", Text),
        ],
        Collection::Services => &[
            ("id", Integer),
            ("client_id", Integer),
            ("title", Text),
            ("description", Text),
            ("amount", Text),
            ("start_date", Text),
            ("expected_end_date", Text),
            ("status", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        Collection::Executions => &[
            ("id", Integer),
            ("service_id", Integer),
            ("client_id", Integer),
            ("title", Text),
            ("description", Text),
            ("amount", Text),
            ("start_date", Text),
            ("end_date", Text),
            ("preview_date", Text),
            ("notes", Text),
            ("status", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        Collection::Deliveries => &[
            ("id", Integer),
            ("execution_id", Integer),
            ("client_id", Integer),
            ("title", Text),
            ("description", Text),
            ("amount", Text),
            ("delivery_date", Text),
            ("notes", Text),
            ("client_acceptance", Text),
            ("status", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        Collection::Accounts => &[
            ("id", Integer),
            ("delivery_id", Integer),
            ("client_id", Integer),
            ("title", Text),
            ("total_amount", Text),
            ("paid_amount", Text),
            ("remaining_amount", Text),
            ("due_date", Text),
            ("payment_status", Text),
            ("invoice_number", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        Collection::Renewals => &[
            ("id", Integer),
            ("client_id", Integer),
            ("service_title", Text),
            ("original_service_id", Integer),
            ("renewal_date", Text),
            ("expiry_date", Text),
            ("amount", Text),
            ("notification_sent", Bool),
            ("status", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
    }
}

fn column_list(collection: Collection) -> String {
    columns(collection)
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `INSERT ... ON CONFLICT(id) DO UPDATE` for one table.
fn upsert_sql(collection: Collection) -> String {
    let cols = columns(collection);
    let placeholders = (1..=cols.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = cols
        .iter()
        .skip(1)
        .map(|(name, _)| format!("{name} = excluded.{name}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        collection.as_str(),
        column_list(collection),
        placeholders,
        updates
    )
}

/// Read one row into a record of `collection`.
fn row_to_record(collection: Collection, row: &Row<'_>) -> rusqlite::Result<Result<Record, StorageError>> {
    let mut map = Map::new();
    for (idx, (name, kind)) in columns(collection).iter().enumerate() {
        let value = match kind {
            Integer => row
                .get::<_, Option<i64>>(idx)?
                .map_or(Value::Null, Value::from),
            Text => row
                .get::<_, Option<String>>(idx)?
                .map_or(Value::Null, Value::String),
            Bool => row
                .get::<_, Option<i64>>(idx)?
                .map_or(Value::Null, |v| Value::Bool(v != 0)),
        };
        map.insert((*name).to_string(), value);
    }
    Ok(Record::from_json(collection, Value::Object(map)).map_err(StorageError::from))
}

/// Bind parameters for a record, in column order.
fn record_params(record: &Record) -> Result<Vec<SqlValue>, StorageError> {
    let collection = record.collection();
    let json = record.to_json()?;
    let Value::Object(map) = json else {
        return Err(StorageError::Corrupt {
            collection,
            message: "record did not serialize to an object".to_string(),
        });
    };

    columns(collection)
        .iter()
        .map(|(name, kind)| match (map.get(*name), kind) {
            (None | Some(Value::Null), _) => Ok(SqlValue::Null),
            (Some(Value::Bool(b)), _) => Ok(SqlValue::Integer(i64::from(*b))),
            (Some(Value::Number(n)), Integer | Bool) => {
                n.as_i64().map(SqlValue::Integer).ok_or_else(|| StorageError::Corrupt {
                    collection,
                    message: format!("column '{}' is not an integer: {}", name, n),
                })
            }
            (Some(Value::Number(n)), Text) => Ok(SqlValue::Text(n.to_string())),
            (Some(Value::String(s)), _) => Ok(SqlValue::Text(s.clone())),
            (Some(other), _) => Err(StorageError::Corrupt {
                collection,
                message: format!("column '{}' has unsupported value {}", name, other),
            }),
        })
        .collect()
}

/// SQLite-backed record storage.
///
/// Create with [`SqliteStore::open`] for a database file or
/// [`SqliteStore::in_memory`] for tests, then call
/// [`RecordStore::initialize`].
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a SQLite database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the parent directory can't be created,
    /// or [`StorageError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened sqlite record store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory SQLite store.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `work` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            work(&mut *conn)
        })
        .await?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| Ok(conn.execute_batch(CREATE_TABLES)?))
            .await?;
        tracing::debug!("sqlite schema ensured");
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>, StorageError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM {} ORDER BY id DESC",
                column_list(collection),
                collection.as_str()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row_to_record(collection, row))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row??);
            }
            Ok(records)
        })
        .await
    }

    async fn get(&self, collection: Collection, id: i64) -> Result<Option<Record>, StorageError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE id = ?1",
                column_list(collection),
                collection.as_str()
            );
            let found = conn
                .query_row(&sql, params![id], |row| row_to_record(collection, row))
                .optional()?;
            found.transpose()
        })
        .await
    }

    async fn put(&self, record: Record) -> Result<(), StorageError> {
        let collection = record.collection();
        let id = record.id();
        let values = record_params(&record)?;
        self.with_conn(move |conn| {
            conn.execute(
                &upsert_sql(collection),
                rusqlite::params_from_iter(values),
            )?;
            Ok(())
        })
        .await?;
        tracing::debug!(collection = %collection, id, "sqlite put");
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: i64) -> Result<bool, StorageError> {
        let changes = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    &format!("DELETE FROM {} WHERE id = ?1", collection.as_str()),
                    params![id],
                )?)
            })
            .await?;
        tracing::debug!(collection = %collection, id, found = changes > 0, "sqlite delete");
        Ok(changes > 0)
    }

    async fn replace_all(
        &self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), StorageError> {
        check_collection(collection, &records)?;
        let count = records.len();
        let rows = records
            .iter()
            .map(record_params)
            .collect::<Result<Vec<_>, _>>()?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(&format!("DELETE FROM {}", collection.as_str()), [])?;
            {
                let mut stmt = tx.prepare(&upsert_sql(collection))?;
                for values in rows {
                    stmt.execute(rusqlite::params_from_iter(values))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        tracing::debug!(collection = %collection, count, "sqlite replace_all");
        Ok(())
    }

    async fn last_assigned_id(&self, collection: Collection) -> Result<i64, StorageError> {
        self.with_conn(move |conn| {
            // sqlite_sequence keeps the AUTOINCREMENT high-water mark across deletes.
            let sql = format!(
                "SELECT MAX(\
                    COALESCE((SELECT seq FROM sqlite_sequence WHERE name = ?1), 0), \
                    COALESCE((SELECT MAX(id) FROM {}), 0))",
                collection.as_str()
            );
            let id: i64 = conn.query_row(&sql, params![collection.as_str()], |row| row.get(0))?;
            Ok(id)
        })
        .await
    }
}
