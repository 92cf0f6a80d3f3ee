//! Nile CRM pipeline engine.
//!
//! [`Crm`] bundles a record store with the client directory, the stage
//! transition engine and the store-wide operations (settings, backup,
//! dashboard, login). All components share one set of collection locks.

pub mod auth;
pub mod backup;
pub mod clients;
pub mod dashboard;
pub mod dates;
mod error;
pub mod ids;
mod locks;
pub mod pipeline;
pub mod seed;
pub mod settings;

use std::path::Path;
use std::sync::Arc;

use nile_storage::{Collection, RecordStore, User};
use time::Date;

pub use backup::BackupSummary;
pub use clients::{ClientDirectory, ClientUpdate, NewClient};
pub use dashboard::DashboardSummary;
pub use error::PipelineError;
pub use locks::CollectionLocks;
pub use pipeline::{Enriched, NewOffer, NewRenewal, Pipeline, Transition, UNKNOWN_CLIENT};
pub use seed::SeedReport;
pub use settings::AppSettings;

/// A record store with every CRM component wired to it.
pub struct Crm {
    store: Arc<dyn RecordStore>,
    locks: Arc<CollectionLocks>,
    clients: ClientDirectory,
    pipeline: Pipeline,
}

impl Crm {
    /// Wrap a store without touching it. Call [`Crm::initialize`] before use.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let locks = Arc::new(CollectionLocks::new());
        Self {
            clients: ClientDirectory::new(store.clone(), locks.clone()),
            pipeline: Pipeline::new(store.clone(), locks.clone()),
            store,
            locks,
        }
    }

    /// Wrap and initialize a store, seeding defaults where missing.
    pub async fn open(store: Arc<dyn RecordStore>) -> Result<Self, PipelineError> {
        let crm = Self::new(store);
        crm.initialize().await?;
        Ok(crm)
    }

    pub async fn initialize(&self) -> Result<SeedReport, PipelineError> {
        let _guards = self.locks.acquire(&Collection::ALL).await;
        seed::initialize_store(self.store.as_ref()).await
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn clients(&self) -> &ClientDirectory {
        &self.clients
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn settings(&self) -> Result<AppSettings, PipelineError> {
        settings::load(self.store.as_ref()).await
    }

    pub async fn set_setting(
        &self,
        key: &str,
        value: &str,
    ) -> Result<nile_storage::Setting, PipelineError> {
        let _guards = self.locks.acquire(&[Collection::Settings]).await;
        settings::set(self.store.as_ref(), key, value).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Option<User>, PipelineError> {
        auth::authenticate(self.store.as_ref(), username, password).await
    }

    /// Dashboard counts using the stored renewal lead time.
    pub async fn dashboard(&self, today: Date) -> Result<DashboardSummary, PipelineError> {
        let lead_days = self.settings().await?.renewal_notification_days;
        dashboard::summarize(self.store.as_ref(), today, lead_days).await
    }

    /// Run the overdue and renewal-urgency sweeps for `today`. Returns the
    /// number of accounts and renewals changed.
    pub async fn refresh(&self, today: Date) -> Result<(usize, usize), PipelineError> {
        let lead_days = self.settings().await?.renewal_notification_days;
        let accounts = self.pipeline.refresh_overdue(today).await?;
        let renewals = self
            .pipeline
            .refresh_renewal_urgency(today, lead_days)
            .await?;
        Ok((accounts, renewals))
    }

    pub async fn export_backup(&self, path: &Path) -> Result<BackupSummary, PipelineError> {
        let _guards = self.locks.acquire(&Collection::ALL).await;
        backup::export_to(self.store.as_ref(), path).await
    }

    pub async fn restore_backup(&self, path: &Path) -> Result<BackupSummary, PipelineError> {
        let _guards = self.locks.acquire(&Collection::ALL).await;
        backup::restore_from(self.store.as_ref(), path).await
    }

    pub async fn export_tabular(&self, path: &Path) -> Result<(), PipelineError> {
        let _guards = self.locks.acquire(&Collection::ALL).await;
        backup::export_tabular_to(self.store.as_ref(), path).await
    }
}
