use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use chaos_device_service::{
    config::Config,
    db::{
        self,
        models::{DeviceStatus, DeviceType, NewDevice},
        queries,
    },
    inventory::{model::DeviceRegisterRequest, DeviceService},
};

/// In-memory SQLite database with the embedded migrations applied.
///
/// The pool holds a single connection that never expires, otherwise each
/// new connection would see its own empty in-memory database.
pub struct TestDatabase {
    pool: SqlitePool,
}

impl TestDatabase {
    pub async fn new() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        db::MIGRATOR.run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn service(&self) -> DeviceService {
        DeviceService::new(self.pool.clone(), &Config::default())
    }

    pub async fn count(&self, table: &str) -> i64 {
        count_rows(&self.pool, table).await
    }

    pub async fn insert_device(
        &self,
        device_type: DeviceType,
        hostname: &str,
        ip: &str,
        last_online: Option<DateTime<Utc>>,
    ) -> i64 {
        let device = NewDevice {
            device_type,
            last_online_time: last_online,
            ..NewDevice::online_host(ip.to_string(), hostname.to_string())
        };
        queries::insert_device(&self.pool, &device)
            .await
            .expect("insert device failed")
            .expect("device already exists")
    }

    pub async fn set_device_status(&self, device_id: i64, status: DeviceStatus) {
        queries::update_device_status(&self.pool, device_id, status)
            .await
            .expect("status update failed");
    }

    pub async fn mark_experimented(&self, device_id: i64) {
        sqlx::query("UPDATE device SET is_experimented = 1 WHERE id = ?")
            .bind(device_id)
            .execute(&self.pool)
            .await
            .expect("update failed");
    }

    pub async fn insert_probe(&self, ip: Option<&str>, device_id: Option<i64>) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO probes (device_id, ip, hostname, status) VALUES (?, ?, 'unknown', 'offline') RETURNING id",
        )
        .bind(device_id)
        .bind(ip)
        .fetch_one(&self.pool)
        .await
        .expect("insert probe failed")
    }

    pub async fn insert_tool(&self, device_id: i64, name: &str, version: &str) {
        sqlx::query("INSERT INTO tools (device_id, name, version) VALUES (?, ?, ?)")
            .bind(device_id)
            .bind(name)
            .bind(version)
            .execute(&self.pool)
            .await
            .expect("insert tool failed");
    }

    pub async fn insert_node(
        &self,
        cluster_id: &str,
        cluster_name: &str,
        node_name: &str,
        device_id: i64,
    ) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO device_node (cluster_id, cluster_name, node_name, node_ip, node_version, device_id)
             VALUES (?, ?, ?, '10.0.0.1', 'v1.28.0', ?) RETURNING id",
        )
        .bind(cluster_id)
        .bind(cluster_name)
        .bind(node_name)
        .bind(device_id)
        .fetch_one(&self.pool)
        .await
        .expect("insert node failed")
    }

    pub async fn insert_pod(
        &self,
        node_id: i64,
        pod_name: &str,
        device_id: i64,
        containers: Option<&str>,
    ) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO device_pod (node_id, pod_name, pod_ip, device_id, containers)
             VALUES (?, ?, '172.16.0.5', ?, ?) RETURNING id",
        )
        .bind(node_id)
        .bind(pod_name)
        .bind(device_id)
        .bind(containers)
        .fetch_one(&self.pool)
        .await
        .expect("insert pod failed")
    }
}

/// File-backed SQLite database in a temporary directory, opened through
/// `db::init_pool` like the server opens it. Unlike [`TestDatabase`] it
/// supports several concurrent connections.
pub struct FileDatabase {
    pool: SqlitePool,
    _dir: tempfile::TempDir,
}

impl FileDatabase {
    pub async fn new(max_connections: u32) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite://{}", dir.path().join("inventory.db").display());
        let pool = db::init_pool(&url, max_connections).await?;
        Ok(Self { pool, _dir: dir })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn service(&self) -> DeviceService {
        DeviceService::new(self.pool.clone(), &Config::default())
    }

    pub async fn count(&self, table: &str) -> i64 {
        count_rows(&self.pool, table).await
    }
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count query failed")
}

pub fn host_request(hostname: &str, ip: &str) -> DeviceRegisterRequest {
    DeviceRegisterRequest {
        namespace: "default".to_string(),
        app_instance: "checkout".to_string(),
        app_group: "canary".to_string(),
        device_type: DeviceType::Host.code(),
        agent_id: None,
        ip: ip.to_string(),
        host_name: hostname.to_string(),
        version: Some("1.0.0".to_string()),
        cpu_core: Some(4),
        memory_size: Some(8192),
        uptime: Some(3600),
        install_mode: Some("host".to_string()),
    }
}

pub fn seconds_ago(secs: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::seconds(secs)
}
