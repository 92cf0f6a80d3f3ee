//! Typed application settings persisted in the `settings` collection.
//!
//! Each setting is one row keyed by name with a textual value and a declared
//! type. [`AppSettings`] is the typed view; [`set`] validates a single value
//! before writing it.

use std::fmt;
use std::str::FromStr;

use nile_storage::{Collection, RecordStore, RecordStoreExt, Setting, SettingType};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::error::PipelineError;
use crate::ids;

pub const LANGUAGE: &str = "app_language";
pub const AUTO_BACKUP: &str = "backup_auto";
pub const BACKUP_INTERVAL: &str = "backup_interval";
pub const RENEWAL_NOTIFICATION_DAYS: &str = "renewal_notification_days";
pub const COMPANY_NAME: &str = "company_name";
pub const INVOICE_PREFIX: &str = "invoice_prefix";

/// Upper bound for the renewal lead time, about ten years.
pub const MAX_RENEWAL_NOTIFICATION_DAYS: i64 = 3650;

/// Interface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ar => "ar",
            Language::En => "en",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ar" => Ok(Language::Ar),
            "en" => Ok(Language::En),
            other => Err(format!("unknown language '{other}' (expected ar or en)")),
        }
    }
}

/// How often automatic backups run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupInterval {
    Daily,
    Weekly,
    Monthly,
}

impl BackupInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupInterval::Daily => "daily",
            BackupInterval::Weekly => "weekly",
            BackupInterval::Monthly => "monthly",
        }
    }
}

impl FromStr for BackupInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(BackupInterval::Daily),
            "weekly" => Ok(BackupInterval::Weekly),
            "monthly" => Ok(BackupInterval::Monthly),
            other => Err(format!(
                "unknown backup interval '{other}' (expected daily, weekly or monthly)"
            )),
        }
    }
}

/// Typed view over the settings collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub language: Language,
    pub auto_backup: bool,
    pub backup_interval: BackupInterval,
    /// Days before a renewal's expiry at which it counts as due.
    pub renewal_notification_days: i64,
    pub company_name: String,
    pub invoice_prefix: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: Language::Ar,
            auto_backup: true,
            backup_interval: BackupInterval::Weekly,
            renewal_notification_days: 10,
            company_name: "Nile Center".to_string(),
            invoice_prefix: "INV".to_string(),
        }
    }
}

/// A known setting key with its declared type and description.
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub key: &'static str,
    pub value_type: SettingType,
    pub description: &'static str,
}

pub const DEFINITIONS: [SettingDef; 6] = [
    SettingDef {
        key: LANGUAGE,
        value_type: SettingType::String,
        description: "Default interface language",
    },
    SettingDef {
        key: AUTO_BACKUP,
        value_type: SettingType::Boolean,
        description: "Automatic backup enabled",
    },
    SettingDef {
        key: BACKUP_INTERVAL,
        value_type: SettingType::String,
        description: "Automatic backup interval",
    },
    SettingDef {
        key: RENEWAL_NOTIFICATION_DAYS,
        value_type: SettingType::Number,
        description: "Days of notice before a service expires",
    },
    SettingDef {
        key: COMPANY_NAME,
        value_type: SettingType::String,
        description: "Company display name",
    },
    SettingDef {
        key: INVOICE_PREFIX,
        value_type: SettingType::String,
        description: "Invoice number prefix",
    },
];

pub fn definition(key: &str) -> Option<&'static SettingDef> {
    DEFINITIONS.iter().find(|d| d.key == key)
}

impl AppSettings {
    /// The textual value stored for `key`.
    pub fn value_of(&self, key: &str) -> Option<String> {
        Some(match key {
            LANGUAGE => self.language.as_str().to_string(),
            AUTO_BACKUP => self.auto_backup.to_string(),
            BACKUP_INTERVAL => self.backup_interval.as_str().to_string(),
            RENEWAL_NOTIFICATION_DAYS => self.renewal_notification_days.to_string(),
            COMPANY_NAME => self.company_name.clone(),
            INVOICE_PREFIX => self.invoice_prefix.clone(),
            _ => return None,
        })
    }

    /// Apply one textual value to the typed view, validating it.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), PipelineError> {
        let value = value.trim();
        match key {
            LANGUAGE => self.language = value.parse().map_err(PipelineError::Validation)?,
            AUTO_BACKUP => {
                self.auto_backup = value.parse().map_err(|_| {
                    PipelineError::validation(format!(
                        "{AUTO_BACKUP} must be true or false, got '{value}'"
                    ))
                })?
            }
            BACKUP_INTERVAL => {
                self.backup_interval = value.parse().map_err(PipelineError::Validation)?
            }
            RENEWAL_NOTIFICATION_DAYS => {
                let days: i64 = value.parse().map_err(|_| {
                    PipelineError::validation(format!(
                        "{RENEWAL_NOTIFICATION_DAYS} must be a whole number of days, got '{value}'"
                    ))
                })?;
                if !(0..=MAX_RENEWAL_NOTIFICATION_DAYS).contains(&days) {
                    return Err(PipelineError::validation(format!(
                        "{RENEWAL_NOTIFICATION_DAYS} must be between 0 and \
                         {MAX_RENEWAL_NOTIFICATION_DAYS}, got {days}"
                    )));
                }
                self.renewal_notification_days = days;
            }
            COMPANY_NAME => {
                if value.is_empty() {
                    return Err(PipelineError::validation("company name cannot be empty"));
                }
                self.company_name = value.to_string();
            }
            INVOICE_PREFIX => {
                if value.is_empty() || value.contains(char::is_whitespace) {
                    return Err(PipelineError::validation(
                        "invoice prefix must be non-empty and contain no spaces",
                    ));
                }
                self.invoice_prefix = value.to_string();
            }
            other => {
                return Err(PipelineError::validation(format!(
                    "unknown setting '{other}'"
                )))
            }
        }
        Ok(())
    }
}

impl fmt::Display for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for def in &DEFINITIONS {
            let value = self.value_of(def.key).unwrap_or_default();
            writeln!(f, "{:<28} {}", def.key, value)?;
        }
        Ok(())
    }
}

/// Read the typed settings. Missing keys fall back to their defaults; a
/// stored value that no longer parses is logged and ignored.
pub async fn load(store: &dyn RecordStore) -> Result<AppSettings, PipelineError> {
    let mut settings = AppSettings::default();
    for row in store.list_as::<Setting>().await? {
        if definition(&row.key).is_none() {
            tracing::debug!(key = %row.key, "skipping unknown setting");
            continue;
        }
        if let Err(e) = settings.apply(&row.key, &row.value) {
            tracing::warn!(key = %row.key, value = %row.value, error = %e, "ignoring invalid stored setting");
        }
    }
    Ok(settings)
}

/// Validate and write one setting, creating its row if absent.
pub async fn set(store: &dyn RecordStore, key: &str, value: &str) -> Result<Setting, PipelineError> {
    let def = definition(key)
        .ok_or_else(|| PipelineError::validation(format!("unknown setting '{key}'")))?;
    let mut typed = AppSettings::default();
    typed.apply(key, value)?;
    let normalized = typed.value_of(key).unwrap_or_default();

    let rows = store.list_as::<Setting>().await?;
    let row = match rows.into_iter().find(|s| s.key == key) {
        Some(mut existing) => {
            existing.value = normalized;
            existing.value_type = def.value_type;
            existing.updated_at = dates::now_timestamp();
            existing
        }
        None => Setting {
            id: ids::next_id(store, Collection::Settings).await?,
            key: key.to_string(),
            value: normalized,
            value_type: def.value_type,
            description: Some(def.description.to_string()),
            updated_at: dates::now_timestamp(),
        },
    };
    store.put_as(row.clone()).await?;
    tracing::info!(key, value = %row.value, "setting updated");
    Ok(row)
}

/// Write every setting of `settings`.
pub async fn save(store: &dyn RecordStore, settings: &AppSettings) -> Result<(), PipelineError> {
    for def in &DEFINITIONS {
        if let Some(value) = settings.value_of(def.key) {
            set(store, def.key, &value).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nile_storage::SqliteStore;

    async fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[test]
    fn every_definition_has_a_default_value() {
        let defaults = AppSettings::default();
        for def in &DEFINITIONS {
            assert!(defaults.value_of(def.key).is_some(), "{}", def.key);
        }
    }

    #[test]
    fn apply_validates_types() {
        let mut s = AppSettings::default();
        assert!(s.apply(AUTO_BACKUP, "maybe").is_err());
        assert!(s.apply(BACKUP_INTERVAL, "hourly").is_err());
        assert!(s.apply(RENEWAL_NOTIFICATION_DAYS, "-1").is_err());
        assert!(s.apply(LANGUAGE, "fr").is_err());
        assert!(s.apply("colour", "blue").is_err());
        assert_eq!(s, AppSettings::default());

        s.apply(LANGUAGE, "en").unwrap();
        s.apply(RENEWAL_NOTIFICATION_DAYS, " 21 ").unwrap();
        assert_eq!(s.language, Language::En);
        assert_eq!(s.renewal_notification_days, 21);
    }

    #[test]
    fn renewal_lead_time_is_bounded() {
        let mut s = AppSettings::default();
        let err = s
            .apply(RENEWAL_NOTIFICATION_DAYS, "200000000000000")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(s.apply(RENEWAL_NOTIFICATION_DAYS, "3651").is_err());
        assert_eq!(s.renewal_notification_days, 10);

        s.apply(RENEWAL_NOTIFICATION_DAYS, "3650").unwrap();
        s.apply(RENEWAL_NOTIFICATION_DAYS, "0").unwrap();
        assert_eq!(s.renewal_notification_days, 0);
    }

    #[tokio::test]
    async fn empty_store_loads_defaults() {
        let store = store().await;
        assert_eq!(load(&store).await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn set_then_load() {
        let store = store().await;
        set(&store, INVOICE_PREFIX, "BILL").await.unwrap();
        set(&store, BACKUP_INTERVAL, "monthly").await.unwrap();

        let loaded = load(&store).await.unwrap();
        assert_eq!(loaded.invoice_prefix, "BILL");
        assert_eq!(loaded.backup_interval, BackupInterval::Monthly);
    }

    #[tokio::test]
    async fn set_updates_the_existing_row() {
        let store = store().await;
        let first = set(&store, COMPANY_NAME, "Acme").await.unwrap();
        let second = set(&store, COMPANY_NAME, "Acme Ltd").await.unwrap();
        assert_eq!(first.id, second.id);

        let rows = store.list_as::<Setting>().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "Acme Ltd");
    }

    #[tokio::test]
    async fn invalid_value_writes_nothing() {
        let store = store().await;
        let err = set(&store, AUTO_BACKUP, "yes").await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(store.list_as::<Setting>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_round_trips() {
        let store = store().await;
        let settings = AppSettings {
            language: Language::En,
            auto_backup: false,
            backup_interval: BackupInterval::Daily,
            renewal_notification_days: 3,
            company_name: "Delta Works".into(),
            invoice_prefix: "DW".into(),
        };
        save(&store, &settings).await.unwrap();
        assert_eq!(load(&store).await.unwrap(), settings);
    }
}
