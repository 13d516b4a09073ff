//! Loaded alert batches and the active filter, passed explicitly through the
//! pipeline instead of living in ambient state.

use tracing::{info, warn};

use crate::app::ports::SessionStorePort;
use crate::error::Result;
use crate::filter::AlertFilter;
use crate::types::{Alert, Provider};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    fagor: Vec<Alert>,
    coltrack: Vec<Alert>,
    pub filter: AlertFilter,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(&self, provider: Provider) -> &[Alert] {
        match provider {
            Provider::Fagor => &self.fagor,
            Provider::Coltrack => &self.coltrack,
        }
    }

    /// A new parse replaces the provider's previous batch entirely.
    pub fn replace_batch(&mut self, provider: Provider, alerts: Vec<Alert>) {
        let slot = match provider {
            Provider::Fagor => &mut self.fagor,
            Provider::Coltrack => &mut self.coltrack,
        };
        *slot = alerts;
    }

    /// Both batches, workbook alerts first
    pub fn combined(&self) -> Vec<Alert> {
        self.fagor.iter().chain(self.coltrack.iter()).cloned().collect()
    }

    pub fn filtered(&self) -> Vec<Alert> {
        self.filter.apply(self.fagor.iter().chain(self.coltrack.iter()))
    }

    pub fn is_empty(&self) -> bool {
        self.fagor.is_empty() && self.coltrack.is_empty()
    }

    pub fn clear_all(&mut self) {
        self.fagor.clear();
        self.coltrack.clear();
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
    }

    /// Load both batches from the store. Missing, unreadable or corrupted
    /// entries are logged and treated as empty.
    pub async fn restore(store: &dyn SessionStorePort) -> Self {
        let mut session = Self::new();
        for provider in [Provider::Fagor, Provider::Coltrack] {
            let key = provider.session_key();
            match store.get(key).await {
                Ok(Some(raw)) => match serde_json::from_str::<Vec<Alert>>(&raw) {
                    Ok(alerts) => {
                        info!(provider = %provider, count = alerts.len(), "Restored alert batch");
                        session.replace_batch(provider, alerts);
                    }
                    Err(e) => warn!(provider = %provider, "Ignoring corrupted stored alerts: {}", e),
                },
                Ok(None) => {}
                Err(e) => warn!(provider = %provider, "Failed to read stored alerts: {}", e),
            }
        }
        session
    }

    pub async fn persist_batch(&self, store: &dyn SessionStorePort, provider: Provider) -> Result<()> {
        let raw = serde_json::to_string(self.batch(provider))?;
        store.set(provider.session_key(), raw).await
    }

    pub async fn persist(&self, store: &dyn SessionStorePort) -> Result<()> {
        self.persist_batch(store, Provider::Fagor).await?;
        self.persist_batch(store, Provider::Coltrack).await
    }
}
