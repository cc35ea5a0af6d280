//! Device inventory: registration, ban/unban and inventory queries.
//!
//! The service is split by concern:
//! - `directory` - find-or-create of applications and groups
//! - `register` - host registration and probe binding
//! - `status` - ban/unban and the heartbeat policy
//! - `projection` - denormalized device/node/pod views
//! - `statistics` - cluster-wide counts

pub mod directory;
pub mod model;
pub mod projection;
pub mod register;
pub mod statistics;
pub mod status;

use sqlx::SqlitePool;

use crate::config::Config;

/// Handles every device inventory operation against one pool.
#[derive(Clone)]
pub struct DeviceService {
    pool: SqlitePool,
    heartbeat_threshold: chrono::Duration,
    default_page_size: u32,
    max_page_size: u32,
}

impl DeviceService {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        DeviceService {
            pool,
            heartbeat_threshold: config.heartbeat_threshold,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}
