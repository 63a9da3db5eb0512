//! Application state shared across every axum handler: the store backend,
//! per-user advisory locks, and resolved configuration.

use std::sync::Arc;

use crate::config::Config;
use crate::context::UserLocks;
use crate::store::postgres::PgStores;

#[derive(Clone)]
pub struct AppState {
    pub stores: PgStores,
    pub locks: UserLocks,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(stores: PgStores, config: Arc<Config>) -> Self {
        Self { stores, locks: UserLocks::new(), config }
    }
}
