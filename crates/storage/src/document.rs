//! JSON-document implementation of [`RecordStore`].
//!
//! A directory holds one `<collection>.json` file per collection, each an
//! ordered JSON array read and written wholesale, plus `sequences.json`
//! tracking the highest id ever written per collection. New records are
//! prepended so the file order is most-recent-first.
//!
//! Every write goes through a temp file in the same directory followed by a
//! rename, so a crash never leaves a half-written collection behind. File
//! work runs on tokio's blocking pool.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{Collection, Record};
use crate::traits::{check_collection, RecordStore};

const SEQUENCES_FILE: &str = "sequences.json";

type Sequences = BTreeMap<String, i64>;

/// Record storage in a directory of JSON files.
pub struct DocumentStore {
    files: Files,
    /// Serializes read-modify-write cycles on the files.
    lock: Mutex<()>,
    /// Keeps a temporary root alive for the lifetime of the store.
    _temp: Option<tempfile::TempDir>,
}

impl DocumentStore {
    /// Use `root` as the document directory. Nothing is touched on disk
    /// until [`RecordStore::initialize`] runs.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            files: Files { root: root.into() },
            lock: Mutex::new(()),
            _temp: None,
        }
    }

    /// A store rooted in a fresh temporary directory, removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let dir = tempfile::TempDir::new()?;
        Ok(Self {
            files: Files {
                root: dir.path().to_path_buf(),
            },
            lock: Mutex::new(()),
            _temp: Some(dir),
        })
    }

    pub fn root(&self) -> &Path {
        &self.files.root
    }

    /// Run file work on the blocking pool while holding the store lock.
    async fn with_files<T, F>(&self, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Files) -> Result<T, StorageError> + Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let files = self.files.clone();
        tokio::task::spawn_blocking(move || work(&files)).await?
    }
}

/// Blocking file operations on the document directory.
#[derive(Clone)]
struct Files {
    root: PathBuf,
}

impl Files {
    fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.as_str()))
    }

    fn initialize(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)?;
        for collection in Collection::ALL {
            let path = self.collection_path(collection);
            if !path.exists() {
                self.write_atomic(&path, b"[]")?;
            }
        }
        let sequences = self.root.join(SEQUENCES_FILE);
        if !sequences.exists() {
            self.write_atomic(&sequences, b"{}")?;
        }
        Ok(())
    }

    fn read_collection(&self, collection: Collection) -> Result<Vec<Record>, StorageError> {
        let path = self.collection_path(collection);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::Uninitialized { collection });
            }
            Err(e) => return Err(e.into()),
        };

        let parsed: Value = serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
            collection,
            message: e.to_string(),
        })?;
        let Value::Array(items) = parsed else {
            return Err(StorageError::Corrupt {
                collection,
                message: "document is not a JSON array".to_string(),
            });
        };

        items
            .into_iter()
            .map(|item| {
                Record::from_json(collection, item).map_err(|e| StorageError::Corrupt {
                    collection,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn write_collection(&self, collection: Collection, records: &[Record]) -> Result<(), StorageError> {
        let values = records
            .iter()
            .map(Record::to_json)
            .collect::<Result<Vec<_>, _>>()?;
        let bytes = serde_json::to_vec_pretty(&values)?;
        self.write_atomic(&self.collection_path(collection), &bytes)?;
        tracing::debug!(collection = %collection, count = records.len(), "wrote collection document");
        Ok(())
    }

    fn read_sequences(&self) -> Result<Sequences, StorageError> {
        let path = self.root.join(SEQUENCES_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Sequences::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Raise the high-water mark of `collection` to at least `id`.
    fn bump_sequence(&self, collection: Collection, id: i64) -> Result<(), StorageError> {
        let mut sequences = self.read_sequences()?;
        let entry = sequences.entry(collection.as_str().to_string()).or_insert(0);
        if id > *entry {
            *entry = id;
            let bytes = serde_json::to_vec_pretty(&sequences)?;
            self.write_atomic(&self.root.join(SEQUENCES_FILE), &bytes)?;
        }
        Ok(())
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for DocumentStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        self.with_files(Files::initialize).await?;
        tracing::debug!(root = %self.root().display(), "document store initialized");
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>, StorageError> {
        self.with_files(move |files| files.read_collection(collection))
            .await
    }

    async fn get(&self, collection: Collection, id: i64) -> Result<Option<Record>, StorageError> {
        self.with_files(move |files| {
            Ok(files
                .read_collection(collection)?
                .into_iter()
                .find(|r| r.id() == id))
        })
        .await
    }

    async fn put(&self, record: Record) -> Result<(), StorageError> {
        self.with_files(move |files| {
            let collection = record.collection();
            let id = record.id();
            let mut records = files.read_collection(collection)?;

            match records.iter_mut().find(|r| r.id() == id) {
                Some(slot) => *slot = record,
                None => records.insert(0, record),
            }

            files.write_collection(collection, &records)?;
            files.bump_sequence(collection, id)
        })
        .await
    }

    async fn delete(&self, collection: Collection, id: i64) -> Result<bool, StorageError> {
        self.with_files(move |files| {
            let mut records = files.read_collection(collection)?;
            let before = records.len();
            records.retain(|r| r.id() != id);
            if records.len() == before {
                return Ok(false);
            }
            files.write_collection(collection, &records)?;
            Ok(true)
        })
        .await
    }

    async fn replace_all(
        &self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), StorageError> {
        check_collection(collection, &records)?;
        self.with_files(move |files| {
            files.write_collection(collection, &records)?;
            let max_id = records.iter().map(Record::id).max().unwrap_or(0);
            files.bump_sequence(collection, max_id)
        })
        .await
    }

    async fn last_assigned_id(&self, collection: Collection) -> Result<i64, StorageError> {
        self.with_files(move |files| {
            let recorded = files
                .read_sequences()?
                .get(collection.as_str())
                .copied()
                .unwrap_or(0);
            let present = files
                .read_collection(collection)?
                .iter()
                .map(Record::id)
                .max()
                .unwrap_or(0);
            Ok(recorded.max(present))
        })
        .await
    }
}
