use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

use super::models::{
    Device, DeviceNode, DevicePod, DeviceStatus, DeviceType, NewApplicationDevice, NewDevice,
    Probe, Tool,
};

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Equality predicates over host devices. `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct HostFilter {
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub is_experimented: Option<bool>,
    pub status: Option<DeviceStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub cluster_name: Option<String>,
    pub node_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PodFilter {
    pub pod_name: Option<String>,
    pub pod_ip: Option<String>,
    /// Restrict to pods scheduled on nodes matching this filter.
    pub node: Option<NodeFilter>,
}

#[derive(Debug, Clone, Copy)]
pub struct Limit {
    pub limit: i64,
    pub offset: i64,
}

/// Which probe row(s) a patch applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKey {
    Id(i64),
    Host(String),
}

/// Partial probe update; only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct ProbePatch {
    pub device_id: Option<i64>,
    pub hostname: Option<String>,
    pub version: Option<String>,
    pub status: Option<DeviceStatus>,
}

impl ProbePatch {
    pub fn is_empty(&self) -> bool {
        self.device_id.is_none()
            && self.hostname.is_none()
            && self.version.is_none()
            && self.status.is_none()
    }
}

// ─── Application queries ─────────────────────────────────────────────────────

pub async fn find_application_id<'e, E>(
    executor: E,
    namespace: &str,
    app_name: &str,
) -> Result<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM application WHERE namespace = ? AND app_name = ?",
    )
    .bind(namespace)
    .bind(app_name)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

/// Returns the new id, or `None` when a row with the same key already exists.
pub async fn insert_application<'e, E>(
    executor: E,
    namespace: &str,
    app_name: &str,
    created_at: DateTime<Utc>,
) -> Result<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO application (namespace, app_name, created_at) VALUES (?, ?, ?)
         ON CONFLICT (namespace, app_name) DO NOTHING
         RETURNING id",
    )
    .bind(namespace)
    .bind(app_name)
    .bind(created_at)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

pub async fn find_group_id<'e, E>(executor: E, app_id: i64, group_name: &str) -> Result<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM application_group WHERE app_id = ? AND group_name = ?",
    )
    .bind(app_id)
    .bind(group_name)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

pub async fn insert_group<'e, E>(
    executor: E,
    app_id: i64,
    app_name: &str,
    group_name: &str,
    created_at: DateTime<Utc>,
) -> Result<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO application_group (app_id, app_name, group_name, created_at) VALUES (?, ?, ?, ?)
         ON CONFLICT (app_id, group_name) DO NOTHING
         RETURNING id",
    )
    .bind(app_id)
    .bind(app_name)
    .bind(group_name)
    .bind(created_at)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

pub async fn insert_application_device<'e, E>(executor: E, b: &NewApplicationDevice) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO application_device (namespace, app_id, app_name, group_id, group_name, device_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(&b.namespace)
    .bind(b.app_id)
    .bind(&b.app_name)
    .bind(b.group_id)
    .bind(&b.group_name)
    .bind(b.device_id)
    .bind(b.created_at)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

// ─── Device queries ──────────────────────────────────────────────────────────

pub async fn get_device<'e, E>(executor: E, id: i64) -> Result<Option<Device>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let device = sqlx::query_as::<_, Device>("SELECT * FROM device WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(device)
}

pub async fn find_device_id<'e, E>(
    executor: E,
    device_type: DeviceType,
    hostname: &str,
    ip: &str,
) -> Result<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM device WHERE device_type = ? AND hostname = ? AND ip = ?",
    )
    .bind(device_type)
    .bind(hostname)
    .bind(ip)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

/// Returns the new id, or `None` when (type, hostname, ip) is already taken.
pub async fn insert_device<'e, E>(executor: E, d: &NewDevice) -> Result<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO device (ip, hostname, version, cpu_core, memory_size, uptime, install_mode, device_type, status, last_online_time, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (device_type, hostname, ip) DO NOTHING
         RETURNING id",
    )
    .bind(&d.ip)
    .bind(&d.hostname)
    .bind(&d.version)
    .bind(d.cpu_core)
    .bind(d.memory_size)
    .bind(d.uptime)
    .bind(&d.install_mode)
    .bind(d.device_type)
    .bind(d.status)
    .bind(d.last_online_time)
    .bind(d.created_at)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

pub async fn update_device_status<'e, E>(executor: E, id: i64, status: DeviceStatus) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE device SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_devices_by_type(pool: &SqlitePool, device_type: DeviceType) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM device WHERE device_type = ?")
        .bind(device_type)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn get_devices_by_ids(pool: &SqlitePool, ids: &[i64]) -> Result<HashMap<i64, Device>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM device WHERE id IN (");
    {
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        list.push_unseparated(")");
    }

    let devices = qb.build_query_as::<Device>().fetch_all(pool).await?;
    Ok(devices.into_iter().map(|d| (d.id, d)).collect())
}

fn push_host_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &HostFilter) {
    qb.push(" WHERE device_type = ").push_bind(DeviceType::Host);
    if let Some(ip) = &filter.ip {
        qb.push(" AND ip = ").push_bind(ip.clone());
    }
    if let Some(hostname) = &filter.hostname {
        qb.push(" AND hostname = ").push_bind(hostname.clone());
    }
    if let Some(experimented) = filter.is_experimented {
        qb.push(" AND is_experimented = ").push_bind(experimented);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
}

pub async fn list_hosts(pool: &SqlitePool, filter: &HostFilter, limit: Limit) -> Result<Vec<Device>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM device");
    push_host_filter(&mut qb, filter);
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(limit.limit)
        .push(" OFFSET ")
        .push_bind(limit.offset);

    let devices = qb.build_query_as::<Device>().fetch_all(pool).await?;
    Ok(devices)
}

pub async fn count_hosts(pool: &SqlitePool, filter: &HostFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM device");
    push_host_filter(&mut qb, filter);
    let count = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

// ─── Probe queries ───────────────────────────────────────────────────────────

pub async fn get_probe<'e, E>(executor: E, id: i64) -> Result<Option<Probe>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let probe = sqlx::query_as::<_, Probe>("SELECT * FROM probes WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(probe)
}

/// Applies `patch` to the probe(s) matching `key`; returns the number of rows touched.
pub async fn update_probe<'e, E>(executor: E, key: &ProbeKey, patch: &ProbePatch) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    if patch.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE probes SET ");
    {
        let mut fields = qb.separated(", ");
        if let Some(device_id) = patch.device_id {
            fields.push("device_id = ").push_bind_unseparated(device_id);
        }
        if let Some(hostname) = &patch.hostname {
            fields.push("hostname = ").push_bind_unseparated(hostname.clone());
        }
        if let Some(version) = &patch.version {
            fields.push("version = ").push_bind_unseparated(version.clone());
        }
        if let Some(status) = patch.status {
            fields.push("status = ").push_bind_unseparated(status);
        }
    }

    match key {
        ProbeKey::Id(id) => qb.push(" WHERE id = ").push_bind(*id),
        ProbeKey::Host(ip) => qb.push(" WHERE ip = ").push_bind(ip.clone()),
    };

    let result = qb.build().execute(executor).await?;
    Ok(result.rows_affected())
}

// ─── Kubernetes queries ──────────────────────────────────────────────────────

fn push_node_predicates(qb: &mut QueryBuilder<'_, Sqlite>, filter: &NodeFilter) {
    if let Some(cluster_name) = &filter.cluster_name {
        qb.push(" AND cluster_name = ").push_bind(cluster_name.clone());
    }
    if let Some(node_name) = &filter.node_name {
        qb.push(" AND node_name = ").push_bind(node_name.clone());
    }
}

fn push_node_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &NodeFilter) {
    qb.push(" WHERE 1 = 1");
    push_node_predicates(qb, filter);
}

/// Lists nodes matching `filter`; all of them when `limit` is `None`.
pub async fn list_nodes(
    pool: &SqlitePool,
    filter: &NodeFilter,
    limit: Option<Limit>,
) -> Result<Vec<DeviceNode>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM device_node");
    push_node_filter(&mut qb, filter);
    qb.push(" ORDER BY id");
    if let Some(limit) = limit {
        qb.push(" LIMIT ")
            .push_bind(limit.limit)
            .push(" OFFSET ")
            .push_bind(limit.offset);
    }

    let nodes = qb.build_query_as::<DeviceNode>().fetch_all(pool).await?;
    Ok(nodes)
}

pub async fn count_nodes(pool: &SqlitePool, filter: &NodeFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM device_node");
    push_node_filter(&mut qb, filter);
    let count = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

fn push_pod_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PodFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(pod_name) = &filter.pod_name {
        qb.push(" AND pod_name = ").push_bind(pod_name.clone());
    }
    if let Some(pod_ip) = &filter.pod_ip {
        qb.push(" AND pod_ip = ").push_bind(pod_ip.clone());
    }
    if let Some(node) = &filter.node {
        qb.push(" AND node_id IN (SELECT id FROM device_node WHERE 1 = 1");
        push_node_predicates(qb, node);
        qb.push(")");
    }
}

pub async fn list_pods(pool: &SqlitePool, filter: &PodFilter, limit: Limit) -> Result<Vec<DevicePod>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM device_pod");
    push_pod_filter(&mut qb, filter);
    qb.push(" ORDER BY id LIMIT ")
        .push_bind(limit.limit)
        .push(" OFFSET ")
        .push_bind(limit.offset);

    let pods = qb.build_query_as::<DevicePod>().fetch_all(pool).await?;
    Ok(pods)
}

pub async fn count_pods(pool: &SqlitePool, filter: &PodFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM device_pod");
    push_pod_filter(&mut qb, filter);
    let count = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

pub async fn count_clusters(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT cluster_id) FROM device_node")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Raw `containers` column of every pod.
pub async fn list_pod_containers(pool: &SqlitePool) -> Result<Vec<Option<String>>> {
    let rows = sqlx::query_scalar::<_, Option<String>>("SELECT containers FROM device_pod")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

// ─── Tools queries ───────────────────────────────────────────────────────────

pub async fn list_tools_for_device<'e, E>(executor: E, device_id: i64) -> Result<Vec<Tool>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let tools = sqlx::query_as::<_, Tool>("SELECT * FROM tools WHERE device_id = ? ORDER BY id")
        .bind(device_id)
        .fetch_all(executor)
        .await?;
    Ok(tools)
}

pub async fn list_tools_for_devices(
    pool: &SqlitePool,
    device_ids: &[i64],
) -> Result<HashMap<i64, Vec<Tool>>> {
    let mut by_device: HashMap<i64, Vec<Tool>> = HashMap::new();
    if device_ids.is_empty() {
        return Ok(by_device);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM tools WHERE device_id IN (");
    {
        let mut list = qb.separated(", ");
        for id in device_ids {
            list.push_bind(*id);
        }
        list.push_unseparated(") ORDER BY id");
    }

    for tool in qb.build_query_as::<Tool>().fetch_all(pool).await? {
        by_device.entry(tool.device_id).or_default().push(tool);
    }
    Ok(by_device)
}
