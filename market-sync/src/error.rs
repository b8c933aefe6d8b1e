//! Error types for the sync engine

use market_backend::BackendError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl SyncError {
    pub fn task(msg: impl Into<String>) -> Self {
        SyncError::Task(msg.into())
    }
}
