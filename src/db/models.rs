use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Kind of experiment target. Stored and received as a numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum DeviceType {
    Host = 0,
    Node = 1,
    Pod = 2,
}

impl DeviceType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(DeviceType::Host),
            1 => Some(DeviceType::Node),
            2 => Some(DeviceType::Pod),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Forbidden,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Forbidden => "forbidden",
        }
    }
}

// ─── Application ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: i64,
    pub namespace: String,
    pub app_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationGroup {
    pub id: i64,
    pub app_id: i64,
    pub app_name: String,
    pub group_name: String,
    pub created_at: DateTime<Utc>,
}

/// Binds a device to the application/group it registered under.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationDevice {
    pub id: i64,
    pub namespace: String,
    pub app_id: i64,
    pub app_name: String,
    pub group_id: i64,
    pub group_name: String,
    pub device_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Insertable binding row.
#[derive(Debug, Clone)]
pub struct NewApplicationDevice {
    pub namespace: String,
    pub app_id: i64,
    pub app_name: String,
    pub group_id: i64,
    pub group_name: String,
    pub device_id: i64,
    pub created_at: DateTime<Utc>,
}

// ─── Device ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: i64,
    pub ip: String,
    pub hostname: String,
    pub version: Option<String>,
    pub cpu_core: Option<i32>,
    pub memory_size: Option<i64>,
    pub uptime: Option<i64>,
    pub install_mode: Option<String>,
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub is_experimented: bool,
    pub last_online_time: Option<DateTime<Utc>>,
    pub last_experiment_time: Option<DateTime<Utc>>,
    pub last_task_id: Option<i64>,
    pub last_task_status: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Insertable device, before the database assigns an id.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub ip: String,
    pub hostname: String,
    pub version: Option<String>,
    pub cpu_core: Option<i32>,
    pub memory_size: Option<i64>,
    pub uptime: Option<i64>,
    pub install_mode: Option<String>,
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub last_online_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewDevice {
    /// A host that has just announced itself: online, heartbeat now.
    pub fn online_host(ip: String, hostname: String) -> Self {
        let now = Utc::now();
        NewDevice {
            ip,
            hostname,
            version: None,
            cpu_core: None,
            memory_size: None,
            uptime: None,
            install_mode: None,
            device_type: DeviceType::Host,
            status: DeviceStatus::Online,
            last_online_time: Some(now),
            created_at: now,
        }
    }
}

// ─── Probe ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Probe {
    pub id: i64,
    pub device_id: Option<i64>,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub version: Option<String>,
    pub status: DeviceStatus,
}

// ─── Kubernetes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceNode {
    pub id: i64,
    pub cluster_id: Option<String>,
    pub cluster_name: Option<String>,
    pub node_name: String,
    pub node_ip: Option<String>,
    pub node_version: Option<String>,
    pub device_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DevicePod {
    pub id: i64,
    pub node_id: i64,
    pub pod_name: String,
    pub pod_ip: Option<String>,
    pub device_id: i64,
    pub containers: Option<String>, // JSON array of Container
}

/// One entry of `DevicePod::containers`, as reported by the cluster collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
    pub container_id: Option<String>,
    pub container_name: Option<String>,
    pub image: Option<String>,
}

// ─── Tools ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tool {
    pub id: i64,
    pub device_id: i64,
    pub name: String,
    pub version: Option<String>,
}
