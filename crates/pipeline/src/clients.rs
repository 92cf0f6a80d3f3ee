use std::sync::Arc;

use nile_storage::{Client, Collection, RecordStore, RecordStoreExt};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::error::PipelineError;
use crate::ids;
use crate::locks::CollectionLocks;

/// Input for [`ClientDirectory::add`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    /// Explicit company code. Generated when absent.
    pub company_code: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub manager: Option<String>,
    pub phone: Option<String>,
    pub intermediary: Option<String>,
    pub intermediary_phone: Option<String>,
}

/// Field changes for [`ClientDirectory::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub manager: Option<String>,
    pub phone: Option<String>,
    pub intermediary: Option<String>,
    pub intermediary_phone: Option<String>,
}

impl ClientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.manager.is_none()
            && self.phone.is_none()
            && self.intermediary.is_none()
            && self.intermediary_phone.is_none()
    }
}

/// CRUD and search over clients.
pub struct ClientDirectory {
    store: Arc<dyn RecordStore>,
    locks: Arc<CollectionLocks>,
}

impl ClientDirectory {
    pub fn new(store: Arc<dyn RecordStore>, locks: Arc<CollectionLocks>) -> Self {
        Self { store, locks }
    }

    pub async fn list(&self) -> Result<Vec<Client>, PipelineError> {
        Ok(self.store.list_as::<Client>().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Client, PipelineError> {
        self.store
            .get_as::<Client>(id)
            .await?
            .ok_or(PipelineError::not_found(Collection::Clients, id))
    }

    pub async fn add(&self, new: NewClient) -> Result<Client, PipelineError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(PipelineError::validation("client name is required"));
        }

        let _guard = self.locks.acquire(&[Collection::Clients]).await;
        let existing = self.store.list_as::<Client>().await?;

        let company_code = match non_blank(new.company_code) {
            Some(code) => {
                if existing.iter().any(|c| c.company_code == code) {
                    return Err(PipelineError::validation(format!(
                        "company code '{code}' is already in use"
                    )));
                }
                code
            }
            None => ids::next_company_code(&existing),
        };

        let now = dates::now_timestamp();
        let client = Client {
            id: ids::next_id(self.store.as_ref(), Collection::Clients).await?,
            company_code,
            name: name.to_string(),
            address: non_blank(new.address),
            manager: non_blank(new.manager),
            phone: non_blank(new.phone),
            intermediary: non_blank(new.intermediary),
            intermediary_phone: non_blank(new.intermediary_phone),
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.put_as(client.clone()).await?;
        tracing::info!(client_id = client.id, code = %client.company_code, "client added");
        Ok(client)
    }

    pub async fn update(&self, id: i64, changes: ClientUpdate) -> Result<Client, PipelineError> {
        if let Some(name) = &changes.name {
            if name.trim().is_empty() {
                return Err(PipelineError::validation("client name cannot be empty"));
            }
        }

        let _guard = self.locks.acquire(&[Collection::Clients]).await;
        let mut client = self.get(id).await?;

        if let Some(name) = changes.name {
            client.name = name.trim().to_string();
        }
        merge(&mut client.address, changes.address);
        merge(&mut client.manager, changes.manager);
        merge(&mut client.phone, changes.phone);
        merge(&mut client.intermediary, changes.intermediary);
        merge(&mut client.intermediary_phone, changes.intermediary_phone);
        client.updated_at = dates::now_timestamp();

        self.store.put_as(client.clone()).await?;
        tracing::info!(client_id = id, "client updated");
        Ok(client)
    }

    /// Remove a client. Offers, services and other records that reference it
    /// are kept and show the placeholder client name afterwards.
    pub async fn delete(&self, id: i64) -> Result<(), PipelineError> {
        let _guard = self.locks.acquire(&[Collection::Clients]).await;
        if !self.store.delete(Collection::Clients, id).await? {
            return Err(PipelineError::not_found(Collection::Clients, id));
        }
        tracing::info!(client_id = id, "client deleted");
        Ok(())
    }

    /// Case-insensitive substring match over name, company code, manager and
    /// phone. A blank term matches every client.
    pub async fn search(&self, term: &str) -> Result<Vec<Client>, PipelineError> {
        let needle = term.trim().to_lowercase();
        let clients = self.list().await?;
        if needle.is_empty() {
            return Ok(clients);
        }
        Ok(clients
            .into_iter()
            .filter(|c| matches_term(c, &needle))
            .collect())
    }
}

fn matches_term(client: &Client, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);
    contains(&client.name)
        || contains(&client.company_code)
        || client.manager.as_deref().is_some_and(contains)
        || client.phone.as_deref().is_some_and(contains)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A present but blank value clears the field.
fn merge(field: &mut Option<String>, change: Option<String>) {
    if let Some(value) = change {
        *field = non_blank(Some(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nile_storage::SqliteStore;

    async fn directory() -> ClientDirectory {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().await.unwrap();
        ClientDirectory::new(Arc::new(store), Arc::new(CollectionLocks::new()))
    }

    fn named(name: &str) -> NewClient {
        NewClient {
            name: name.to_string(),
            ..NewClient::default()
        }
    }

    #[tokio::test]
    async fn add_assigns_id_and_code() {
        let dir = directory().await;
        let a = dir.add(named("Alpha Trading")).await.unwrap();
        let b = dir.add(named("Beta Foods")).await.unwrap();
        assert_eq!((a.id, a.company_code.as_str()), (1, "NC001"));
        assert_eq!((b.id, b.company_code.as_str()), (2, "NC002"));
    }

    #[tokio::test]
    async fn generated_code_skips_past_explicit_ones() {
        let dir = directory().await;
        dir.add(NewClient {
            company_code: Some("NC010".into()),
            ..named("Explicit")
        })
        .await
        .unwrap();
        let next = dir.add(named("Generated")).await.unwrap();
        assert_eq!(next.company_code, "NC011");
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let dir = directory().await;
        let err = dir.add(named("   ")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(dir.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_explicit_code_is_rejected() {
        let dir = directory().await;
        dir.add(named("First")).await.unwrap();
        let err = dir
            .add(NewClient {
                company_code: Some("NC001".into()),
                ..named("Second")
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("NC001"));
    }

    #[tokio::test]
    async fn update_merges_present_fields() {
        let dir = directory().await;
        let created = dir
            .add(NewClient {
                phone: Some("0100".into()),
                manager: Some("Hoda".into()),
                ..named("Gamma")
            })
            .await
            .unwrap();

        let updated = dir
            .update(
                created.id,
                ClientUpdate {
                    phone: Some("0111".into()),
                    manager: Some(String::new()),
                    ..ClientUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Gamma");
        assert_eq!(updated.phone.as_deref(), Some("0111"));
        assert_eq!(updated.manager, None);
        assert_eq!(updated.company_code, created.company_code);
        assert_eq!(dir.get(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn update_and_delete_missing_client() {
        let dir = directory().await;
        let err = dir.update(9, ClientUpdate::default()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NotFound {
                collection: Collection::Clients,
                id: 9
            }
        ));
        assert!(matches!(
            dir.delete(9).await.unwrap_err(),
            PipelineError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_over_several_fields() {
        let dir = directory().await;
        dir.add(NewClient {
            manager: Some("Samir Adel".into()),
            ..named("Delta Logistics")
        })
        .await
        .unwrap();
        dir.add(NewClient {
            phone: Some("01234567".into()),
            ..named("Epsilon")
        })
        .await
        .unwrap();

        let names = |v: Vec<Client>| v.into_iter().map(|c| c.name).collect::<Vec<_>>();
        assert_eq!(names(dir.search("DELTA").await.unwrap()), ["Delta Logistics"]);
        assert_eq!(names(dir.search("samir").await.unwrap()), ["Delta Logistics"]);
        assert_eq!(names(dir.search("4567").await.unwrap()), ["Epsilon"]);
        assert_eq!(names(dir.search("nc002").await.unwrap()), ["Epsilon"]);
        assert_eq!(dir.search("  ").await.unwrap().len(), 2);
        assert!(dir.search("zeta").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_id_is_not_reused() {
        let dir = directory().await;
        dir.add(named("One")).await.unwrap();
        let two = dir.add(named("Two")).await.unwrap();
        dir.delete(two.id).await.unwrap();
        let three = dir.add(named("Three")).await.unwrap();
        assert_eq!(three.id, 3);
    }
}
