pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod inventory;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::inventory::DeviceService;

// ─── App State ───────────────────────────────────────────────────────────────

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        AppState { pool, config }
    }

    pub fn devices(&self) -> DeviceService {
        DeviceService::new(self.pool.clone(), &self.config)
    }
}
