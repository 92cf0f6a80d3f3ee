//! Identifier generation: record ids, client company codes, invoice numbers.

use std::sync::Mutex;

use nile_storage::{Client, Collection, Record, RecordStore, StorageError};
use time::OffsetDateTime;

/// Prefix of generated company codes.
pub const COMPANY_CODE_PREFIX: &str = "NC";

/// Next id for `collection`: one past the larger of the highest id present
/// and the highest id ever assigned.
///
/// Callers must hold the collection's lock until the new record is written.
pub async fn next_id(store: &dyn RecordStore, collection: Collection) -> Result<i64, StorageError> {
    let present = store
        .list(collection)
        .await?
        .iter()
        .map(Record::id)
        .max()
        .unwrap_or(0);
    let high_water = store.last_assigned_id(collection).await?;
    Ok(present.max(high_water) + 1)
}

/// Company code following the highest numeric `NC` code among `clients`.
///
/// Codes without the prefix or with a non-numeric suffix count as zero.
pub fn next_company_code(clients: &[Client]) -> String {
    let highest = clients
        .iter()
        .map(|c| code_number(&c.company_code))
        .max()
        .unwrap_or(0);
    format!("{COMPANY_CODE_PREFIX}{:03}", highest + 1)
}

fn code_number(code: &str) -> u64 {
    match code.strip_prefix(COMPANY_CODE_PREFIX) {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse().unwrap_or(0)
        }
        _ => {
            tracing::warn!(code, "ignoring malformed company code");
            0
        }
    }
}

/// Issues invoice numbers `<prefix>-<token>` where the token is the current
/// Unix time in nanoseconds, forced strictly increasing within the process.
#[derive(Debug, Default)]
pub struct InvoiceNumbers {
    last_token: Mutex<i128>,
}

impl InvoiceNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, prefix: &str) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp_nanos();
        let mut last = self
            .last_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let token = if now > *last { now } else { *last + 1 };
        *last = token;
        format!("{prefix}-{token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nile_storage::{RecordStoreExt, SqliteStore};

    fn client(id: i64, code: &str) -> Client {
        Client {
            id,
            company_code: code.to_string(),
            name: format!("Client {id}"),
            address: None,
            manager: None,
            phone: None,
            intermediary: None,
            intermediary_phone: None,
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn first_company_code() {
        assert_eq!(next_company_code(&[]), "NC001");
    }

    #[test]
    fn company_code_follows_highest() {
        let clients = vec![client(1, "NC001"), client(2, "NC007"), client(3, "NC003")];
        assert_eq!(next_company_code(&clients), "NC008");
    }

    #[test]
    fn malformed_codes_count_as_zero() {
        let clients = vec![client(1, "ACME"), client(2, "NCxyz"), client(3, "NC")];
        assert_eq!(next_company_code(&clients), "NC001");

        let mixed = vec![client(1, "ACME"), client(2, "NC004")];
        assert_eq!(next_company_code(&mixed), "NC005");
    }

    #[test]
    fn invoice_numbers_are_unique_and_prefixed() {
        let invoices = InvoiceNumbers::new();
        let a = invoices.next("INV");
        let b = invoices.next("INV");
        assert!(a.starts_with("INV-"));
        assert_ne!(a, b);

        let token = |s: &str| s.trim_start_matches("INV-").parse::<i128>().unwrap();
        assert!(token(&b) > token(&a));
    }

    #[tokio::test]
    async fn next_id_starts_at_one() {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().await.unwrap();
        assert_eq!(next_id(&store, Collection::Clients).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn next_id_never_reuses_a_deleted_maximum() {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().await.unwrap();
        store.put_as(client(1, "NC001")).await.unwrap();
        store.put_as(client(2, "NC002")).await.unwrap();
        store.delete(Collection::Clients, 2).await.unwrap();

        assert_eq!(next_id(&store, Collection::Clients).await.unwrap(), 3);
    }
}
