//! Request and response shapes of the device inventory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Device, DeviceStatus, DeviceType, Tool};

// ─── Paging ──────────────────────────────────────────────────────────────────

/// 1-based page request as received from callers; normalised by [`PageRequest::limit`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Page number and size after defaults and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
}

impl PageWindow {
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        PageRequest {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    pub fn window(&self, default_size: u32, max_size: u32) -> PageWindow {
        PageWindow {
            page: self.page.unwrap_or(1).max(1),
            page_size: self.page_size.unwrap_or(default_size).clamp(1, max_size),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// Sent by an agent when it starts on a target machine.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRegisterRequest {
    pub namespace: String,
    pub app_instance: String,
    pub app_group: String,
    /// Numeric device type code, see [`DeviceType::from_code`].
    pub device_type: i32,
    pub agent_id: Option<String>,
    pub ip: String,
    pub host_name: String,
    pub version: Option<String>,
    pub cpu_core: Option<i32>,
    pub memory_size: Option<i64>,
    pub uptime: Option<i64>,
    pub install_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostQuery {
    pub probe_id: Option<i64>,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub chaosed: Option<bool>,
    pub status: Option<DeviceStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeQuery {
    pub cluster_name: Option<String>,
    pub node_name: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodQuery {
    pub cluster_name: Option<String>,
    pub node_name: Option<String>,
    pub pod_name: Option<String>,
    pub pod_ip: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

macro_rules! page_request {
    ($($query:ty),*) => {
        $(impl $query {
            pub fn page_request(&self) -> PageRequest {
                PageRequest {
                    page: self.page,
                    page_size: self.page_size,
                }
            }
        })*
    };
}

page_request!(HostQuery, NodeQuery, PodQuery);

// ─── Registration result ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Created { device_id: i64 },
    AlreadyRegistered { device_id: i64 },
    /// Registration for this device type is not implemented yet.
    Unsupported { device_type: DeviceType },
}

impl RegistrationOutcome {
    pub fn device_id(&self) -> Option<i64> {
        match self {
            RegistrationOutcome::Created { device_id }
            | RegistrationOutcome::AlreadyRegistered { device_id } => Some(*device_id),
            RegistrationOutcome::Unsupported { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub outcome: RegistrationOutcome,
    pub app_id: i64,
    pub group_id: i64,
    /// The probe named by the request's agent id now points at the device.
    pub probe_bound: bool,
    /// A probe on the registering host ip was marked online.
    pub probe_refreshed: bool,
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub name: String,
    pub version: Option<String>,
}

impl From<Tool> for ToolResponse {
    fn from(t: Tool) -> Self {
        ToolResponse {
            name: t.name,
            version: t.version,
        }
    }
}

/// Status and experiment fields shared by every device view.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceState {
    pub status: DeviceStatus,
    pub chaosed: bool,
    pub create_time: DateTime<Utc>,
    pub heartbeat_time: Option<DateTime<Utc>>,
    pub chaos_time: Option<DateTime<Utc>>,
    pub task_id: Option<i64>,
    pub task_status: Option<i32>,
}

impl From<&Device> for DeviceState {
    fn from(d: &Device) -> Self {
        DeviceState {
            status: d.status,
            chaosed: d.is_experimented,
            create_time: d.created_at,
            heartbeat_time: d.last_online_time,
            chaos_time: d.last_experiment_time,
            task_id: d.last_task_id,
            task_status: d.last_task_status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceResponse {
    pub device_id: i64,
    pub ip: String,
    pub hostname: String,
    pub version: Option<String>,
    #[serde(flatten)]
    pub state: DeviceState,
    pub chaostools: Vec<ToolResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceNodeResponse {
    pub device_id: i64,
    pub cluster_name: Option<String>,
    pub node_name: String,
    pub node_ip: Option<String>,
    pub node_version: Option<String>,
    #[serde(flatten)]
    pub state: DeviceState,
}

#[derive(Debug, Clone, Serialize)]
pub struct DevicePodResponse {
    pub device_id: i64,
    pub pod_id: i64,
    pub pod_name: String,
    pub pod_ip: Option<String>,
    pub cluster_name: Option<String>,
    pub node_name: String,
    pub node_ip: Option<String>,
    pub node_version: Option<String>,
    #[serde(flatten)]
    pub state: DeviceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KubernetesStatistics {
    pub nodes: i64,
    pub pods: i64,
    pub clusters: i64,
    pub containers: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_applies_defaults() {
        let w = PageRequest::default().window(20, 200);
        assert_eq!(w, PageWindow { page: 1, page_size: 20 });
        assert_eq!(w.offset(), 0);
    }

    #[test]
    fn window_clamps_out_of_range_values() {
        let w = PageRequest::new(0, 10_000).window(20, 200);
        assert_eq!(w, PageWindow { page: 1, page_size: 200 });

        let w = PageRequest::new(3, 0).window(20, 200);
        assert_eq!(w.page_size, 1);
        assert_eq!(w.offset(), 2);
    }

    #[test]
    fn outcome_exposes_device_id_only_when_registered() {
        assert_eq!(RegistrationOutcome::Created { device_id: 4 }.device_id(), Some(4));
        assert_eq!(
            RegistrationOutcome::Unsupported { device_type: DeviceType::Pod }.device_id(),
            None
        );
    }
}
