//! Strategy store interface
//!
//! The builder never persists anything itself. It talks to a
//! [`StrategyStore`]: the REST backend through [`HttpStrategyStore`], or a
//! local SQLite file through [`SqliteStrategyStore`].

use std::future::Future;

use thiserror::Error;

use crate::strategy::{SavedStrategy, StrategyConfiguration, StrategySummary};
use crate::types::StrategyId;

pub mod http;
pub mod sqlite;

pub use http::{HttpStoreConfig, HttpStrategyStore};
pub use sqlite::SqliteStrategyStore;

/// Shown when the store gave no usable explanation
pub const GENERIC_STORE_ERROR: &str = "Something went wrong. Please try again.";

/// Failure reported by a strategy store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Strategy {0} not found")]
    NotFound(StrategyId),

    /// Name collision detected by the store itself
    #[error("{0}")]
    Conflict(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Any other refusal, with the store's own explanation
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from store: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Worth retrying an idempotent request
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Network(_))
            || matches!(self, StoreError::Rejected { status, .. } if *status >= 500)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Parse(err.to_string())
    }
}

/// Remote collection of saved strategies belonging to one user
///
/// Every call is a single round-trip; callers hold `&self` only for the
/// duration of the call.
pub trait StrategyStore {
    /// Persist a new strategy under `name`
    fn create(
        &self,
        name: &str,
        configuration: &StrategyConfiguration,
    ) -> impl Future<Output = Result<SavedStrategy, StoreError>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<StrategySummary>, StoreError>> + Send;

    /// Fails with [`StoreError::NotFound`] for an unknown id
    fn get(&self, id: StrategyId) -> impl Future<Output = Result<SavedStrategy, StoreError>> + Send;

    /// Fails with [`StoreError::NotFound`] for an unknown id
    fn delete(&self, id: StrategyId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Whichever store the configuration selected
pub enum ConfiguredStore {
    Http(HttpStrategyStore),
    Sqlite(SqliteStrategyStore),
}

impl ConfiguredStore {
    pub fn describe(&self) -> String {
        match self {
            ConfiguredStore::Http(store) => format!("http store at {}", store.base_url()),
            ConfiguredStore::Sqlite(store) => format!("sqlite store for {}", store.owner()),
        }
    }
}

impl StrategyStore for ConfiguredStore {
    async fn create(
        &self,
        name: &str,
        configuration: &StrategyConfiguration,
    ) -> Result<SavedStrategy, StoreError> {
        match self {
            ConfiguredStore::Http(store) => store.create(name, configuration).await,
            ConfiguredStore::Sqlite(store) => store.create(name, configuration).await,
        }
    }

    async fn list(&self) -> Result<Vec<StrategySummary>, StoreError> {
        match self {
            ConfiguredStore::Http(store) => store.list().await,
            ConfiguredStore::Sqlite(store) => store.list().await,
        }
    }

    async fn get(&self, id: StrategyId) -> Result<SavedStrategy, StoreError> {
        match self {
            ConfiguredStore::Http(store) => store.get(id).await,
            ConfiguredStore::Sqlite(store) => store.get(id).await,
        }
    }

    async fn delete(&self, id: StrategyId) -> Result<(), StoreError> {
        match self {
            ConfiguredStore::Http(store) => store.delete(id).await,
            ConfiguredStore::Sqlite(store) => store.delete(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(StoreError::Network("timeout".into()).is_transient());
        assert!(StoreError::Rejected {
            status: 503,
            message: "busy".into()
        }
        .is_transient());
        assert!(!StoreError::Rejected {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
        assert!(!StoreError::NotFound(StrategyId(1)).is_transient());
    }

    #[test]
    fn test_rejected_shows_server_message() {
        let err = StoreError::Rejected {
            status: 400,
            message: "name: This field may not be blank.".into(),
        };
        assert_eq!(err.to_string(), "name: This field may not be blank.");
    }
}
