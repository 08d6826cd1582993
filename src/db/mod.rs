//! Database module.
//!
//! The remote tree is the source of truth for clubs, users and notifications.

mod repository;

pub use repository::*;

use std::sync::Arc;

use crate::config::Config;
use crate::errors::AppError;
use crate::store::{MemoryStore, RestStore, TreeStore};

/// Open the tree store selected by the configuration.
///
/// Without a database URL the service runs against an empty in-memory tree.
pub fn open_store(config: &Config) -> Result<Arc<dyn TreeStore>, AppError> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Using remote tree at {}", url);
            let store = RestStore::new(url, config.database_auth.clone(), config.request_timeout)?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("CLUBHUB_DATABASE_URL not set, using an in-memory tree");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
