//! Whole-store backup, restore and tabular export.
//!
//! A backup is one JSON object: a `backup_date` timestamp plus one array per
//! collection, keyed by collection name.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;

use nile_storage::{Collection, Record, RecordStore, StorageError};
use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::dates;
use crate::error::PipelineError;

pub const BACKUP_DATE_FIELD: &str = "backup_date";

/// Counts of what an export or restore covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    pub backup_date: String,
    /// Records per collection name. Restore lists only the collections that
    /// were present in the document.
    pub collections: BTreeMap<String, usize>,
}

impl BackupSummary {
    pub fn total(&self) -> usize {
        self.collections.values().sum()
    }
}

/// Build the backup document for the whole store.
pub async fn snapshot(store: &dyn RecordStore) -> Result<(Value, BackupSummary), PipelineError> {
    let backup_date = dates::now_timestamp();
    let mut doc = Map::new();
    let mut collections = BTreeMap::new();

    for collection in Collection::ALL {
        let rows = store
            .list(collection)
            .await?
            .iter()
            .map(Record::to_json)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        collections.insert(collection.as_str().to_string(), rows.len());
        doc.insert(collection.as_str().to_string(), Value::Array(rows));
    }
    doc.insert(
        BACKUP_DATE_FIELD.to_string(),
        Value::String(backup_date.clone()),
    );

    Ok((
        Value::Object(doc),
        BackupSummary {
            backup_date,
            collections,
        },
    ))
}

/// Write a backup of the whole store to `path`, replacing it atomically.
pub async fn export_to(store: &dyn RecordStore, path: &Path) -> Result<BackupSummary, PipelineError> {
    let (doc, summary) = snapshot(store).await?;
    let bytes = serde_json::to_vec_pretty(&doc).map_err(StorageError::from)?;
    write_atomic(path, bytes).await?;
    tracing::info!(path = %path.display(), records = summary.total(), "backup exported");
    Ok(summary)
}

/// Restore a backup document.
///
/// The whole document is validated before anything is written. Collections
/// present in the document replace the stored ones; absent collections are
/// left as they are.
pub async fn restore(store: &dyn RecordStore, document: Value) -> Result<BackupSummary, PipelineError> {
    let parsed = parse_backup(document)?;

    for (collection, records) in parsed.records {
        store.replace_all(collection, records).await?;
    }
    tracing::info!(
        backup_date = %parsed.summary.backup_date,
        records = parsed.summary.total(),
        "backup restored"
    );
    Ok(parsed.summary)
}

/// Read and restore the backup stored at `path`.
pub async fn restore_from(store: &dyn RecordStore, path: &Path) -> Result<BackupSummary, PipelineError> {
    let bytes = tokio::fs::read(path).await.map_err(StorageError::from)?;
    let document: Value = serde_json::from_slice(&bytes)
        .map_err(|e| PipelineError::Format(format!("{} is not valid JSON: {e}", path.display())))?;
    restore(store, document).await
}

struct ParsedBackup {
    records: Vec<(Collection, Vec<Record>)>,
    summary: BackupSummary,
}

fn parse_backup(document: Value) -> Result<ParsedBackup, PipelineError> {
    let Value::Object(mut doc) = document else {
        return Err(PipelineError::Format("backup must be a JSON object".into()));
    };
    let backup_date = match doc.remove(BACKUP_DATE_FIELD) {
        Some(Value::String(date)) if !date.trim().is_empty() => date,
        Some(_) => {
            return Err(PipelineError::Format(format!(
                "'{BACKUP_DATE_FIELD}' must be a non-empty string"
            )))
        }
        None => {
            return Err(PipelineError::Format(format!(
                "missing '{BACKUP_DATE_FIELD}'"
            )))
        }
    };

    let mut records = Vec::new();
    let mut collections = BTreeMap::new();
    for collection in Collection::ALL {
        let Some(value) = doc.remove(collection.as_str()) else {
            continue;
        };
        let Value::Array(items) = value else {
            return Err(PipelineError::Format(format!(
                "'{collection}' must be an array"
            )));
        };

        let mut seen = HashSet::new();
        let mut seen_keys = HashSet::new();
        let mut rows = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let record = Record::from_json(collection, item)
                .map_err(|e| PipelineError::Format(format!("{collection}[{index}]: {e}")))?;
            if !seen.insert(record.id()) {
                return Err(PipelineError::Format(format!(
                    "{collection}[{index}]: duplicate id {}",
                    record.id()
                )));
            }
            if let Some((field, key)) = record.unique_key() {
                if !seen_keys.insert(key.to_string()) {
                    return Err(PipelineError::Format(format!(
                        "{collection}[{index}]: duplicate {field} '{key}'"
                    )));
                }
            }
            rows.push(record);
        }
        collections.insert(collection.as_str().to_string(), rows.len());
        records.push((collection, rows));
    }

    for key in doc.keys() {
        tracing::warn!(key = %key, "ignoring unknown backup section");
    }

    Ok(ParsedBackup {
        records,
        summary: BackupSummary {
            backup_date,
            collections,
        },
    })
}

/// Render every collection as comma-separated text.
///
/// Each collection starts with a `# <collection>` line followed by a header
/// row taken from the first record's fields and one row per record. An
/// empty collection has only its `#` line.
pub async fn export_tabular(store: &dyn RecordStore) -> Result<String, PipelineError> {
    let mut out = String::new();
    for collection in Collection::ALL {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("# ");
        out.push_str(collection.as_str());
        out.push('\n');

        let rows = store
            .list(collection)
            .await?
            .iter()
            .map(Record::to_json)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        let Some(first) = rows.first().and_then(Value::as_object) else {
            continue;
        };
        let headers: Vec<&String> = first.keys().collect();

        push_row(&mut out, headers.iter().map(|h| h.to_string()));
        for row in &rows {
            push_row(
                &mut out,
                headers.iter().map(|h| cell_text(row.get(h.as_str()))),
            );
        }
    }
    Ok(out)
}

/// Write the tabular export to `path`, replacing it atomically.
pub async fn export_tabular_to(store: &dyn RecordStore, path: &Path) -> Result<(), PipelineError> {
    let text = export_tabular(store).await?;
    write_atomic(path, text.into_bytes()).await?;
    tracing::info!(path = %path.display(), "tabular export written");
    Ok(())
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    let quoted: Vec<String> = cells.map(|c| quote_field(&c)).collect();
    out.push_str(&quoted.join(","));
    out.push('\n');
}

/// Quote a field when it contains a delimiter, quote or line break; inner
/// quotes are doubled.
fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), StorageError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use nile_storage::{Client, RecordStoreExt, SqliteStore};
    use serde_json::json;

    fn client(id: i64, name: &str) -> Client {
        Client {
            id,
            company_code: format!("NC{id:03}"),
            name: name.to_string(),
            address: None,
            manager: None,
            phone: None,
            intermediary: None,
            intermediary_phone: None,
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    async fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[test]
    fn quoting_follows_csv_rules() {
        assert_eq!(quote_field("plain"), "plain");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
        assert_eq!(quote_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_field("two\nlines"), "\"two\nlines\"");
    }

    #[tokio::test]
    async fn snapshot_has_every_collection_and_a_date() {
        let store = store().await;
        store.put_as(client(1, "Alpha")).await.unwrap();
        let (doc, summary) = snapshot(&store).await.unwrap();

        assert!(doc[BACKUP_DATE_FIELD].is_string());
        for c in Collection::ALL {
            assert!(doc[c.as_str()].is_array(), "{c}");
        }
        assert_eq!(summary.collections["clients"], 1);
        assert_eq!(summary.total(), 1);
    }

    #[tokio::test]
    async fn missing_backup_date_is_rejected_before_writing() {
        let store = store().await;
        store.put_as(client(1, "Alpha")).await.unwrap();

        let err = restore(&store, json!({ "clients": [] })).await.unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
        assert_eq!(store.list(Collection::Clients).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_record_aborts_the_whole_restore() {
        let store = store().await;
        store.put_as(client(1, "Alpha")).await.unwrap();

        let doc = json!({
            "backup_date": "2025-06-01T10:00:00Z",
            "clients": [],
            "offers": [{ "id": 1, "title": "no client id" }],
        });
        let err = restore(&store, doc).await.unwrap_err();
        assert!(err.to_string().contains("offers[0]"));
        assert_eq!(store.list(Collection::Clients).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn absent_collections_are_untouched() {
        let store = store().await;
        store.put_as(client(1, "Alpha")).await.unwrap();

        let doc = json!({ "backup_date": "2025-06-01T10:00:00Z", "offers": [] });
        let summary = restore(&store, doc).await.unwrap();
        assert_eq!(summary.collections.len(), 1);
        assert_eq!(store.list(Collection::Clients).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_a_format_error() {
        let store = store().await;
        let row = serde_json::to_value(client(1, "Alpha")).unwrap();
        let doc = json!({ "backup_date": "2025-06-01T10:00:00Z", "clients": [row.clone(), row] });
        assert!(matches!(
            restore(&store, doc).await.unwrap_err(),
            PipelineError::Format(_)
        ));
    }

    #[tokio::test]
    async fn duplicate_unique_keys_are_rejected_before_writing() {
        let store = store().await;
        store.put_as(client(1, "Alpha")).await.unwrap();

        let mut twin = client(2, "Beta");
        twin.company_code = "NC001".into();
        let doc = json!({
            "backup_date": "2025-06-01T10:00:00Z",
            "offers": [],
            "clients": [client(1, "Alpha"), twin],
        });
        let err = restore(&store, doc).await.unwrap_err();
        assert!(err.to_string().contains("duplicate company_code 'NC001'"));
        assert_eq!(store.list(Collection::Clients).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tabular_export_sections() {
        let store = store().await;
        store.put_as(client(1, "Nile, Ltd")).await.unwrap();
        let text = export_tabular(&store).await.unwrap();

        let lines: Vec<&str> = text.lines().collect();
        let at = lines.iter().position(|l| *l == "# clients").unwrap();
        assert!(lines[at + 1].split(',').any(|h| h == "company_code"));
        assert!(lines[at + 2].contains("\"Nile, Ltd\""));
        assert!(lines.contains(&"# offers"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("# ")).count(), 10);
    }

    #[tokio::test]
    async fn export_then_restore_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("backup.json");

        let source = store().await;
        source.put_as(client(1, "Alpha")).await.unwrap();
        source.put_as(client(2, "Beta")).await.unwrap();
        export_to(&source, &path).await.unwrap();

        let target = store().await;
        let summary = restore_from(&target, &path).await.unwrap();
        assert_eq!(summary.collections["clients"], 2);
        let mut names: Vec<String> = target
            .list_as::<Client>()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        names.sort();
        assert_eq!(names, ["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn non_json_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();
        let store = store().await;
        assert!(matches!(
            restore_from(&store, &path).await.unwrap_err(),
            PipelineError::Format(_)
        ));
    }
}
