use nile_storage::{Collection, RecordStore, RecordStoreExt, Setting, User, UserRole};
use serde::Serialize;

use crate::dates;
use crate::error::PipelineError;
use crate::ids;
use crate::settings::{AppSettings, DEFINITIONS};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// What [`initialize_store`] had to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users_created: usize,
    pub settings_created: usize,
}

/// Create the schema and seed the default admin user and default settings.
///
/// Existing rows are never overwritten, so calling this on every start is
/// safe.
pub async fn initialize_store(store: &dyn RecordStore) -> Result<SeedReport, PipelineError> {
    store.initialize().await?;
    let mut report = SeedReport::default();
    let now = dates::now_timestamp();

    let users = store.list_as::<User>().await?;
    if !users.iter().any(|u| u.username == DEFAULT_ADMIN_USERNAME) {
        let admin = User {
            id: ids::next_id(store, Collection::Users).await?,
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
            full_name: "System Administrator".to_string(),
            role: UserRole::Admin,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        store.put_as(admin).await?;
        report.users_created += 1;
    }

    let defaults = AppSettings::default();
    let existing = store.list_as::<Setting>().await?;
    for def in &DEFINITIONS {
        if existing.iter().any(|s| s.key == def.key) {
            continue;
        }
        let setting = Setting {
            id: ids::next_id(store, Collection::Settings).await?,
            key: def.key.to_string(),
            value: defaults.value_of(def.key).unwrap_or_default(),
            value_type: def.value_type,
            description: Some(def.description.to_string()),
            updated_at: now.clone(),
        };
        store.put_as(setting).await?;
        report.settings_created += 1;
    }

    if report != SeedReport::default() {
        tracing::info!(
            users = report.users_created,
            settings = report.settings_created,
            "seeded defaults"
        );
    }
    Ok(report)
}
