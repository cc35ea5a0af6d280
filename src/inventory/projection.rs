use std::collections::HashMap;

use super::model::{
    DeviceNodeResponse, DevicePodResponse, DeviceResponse, DeviceState, HostQuery, NodeQuery,
    Page, PageRequest, PageWindow, PodQuery, ToolResponse,
};
use super::DeviceService;
use crate::db::models::{Device, DeviceNode, Tool};
use crate::db::queries::{self, HostFilter, Limit, NodeFilter, PodFilter};
use crate::error::{ServiceError, ServiceResult};

fn device_response(device: &Device, tools: Vec<Tool>) -> DeviceResponse {
    DeviceResponse {
        device_id: device.id,
        ip: device.ip.clone(),
        hostname: device.hostname.clone(),
        version: device.version.clone(),
        state: DeviceState::from(device),
        chaostools: tools.into_iter().map(ToolResponse::from).collect(),
    }
}

fn limit_of(window: PageWindow) -> Limit {
    Limit {
        limit: window.page_size as i64,
        offset: window.offset(),
    }
}

fn unique_ids(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

impl DeviceService {
    fn window(&self, page: PageRequest) -> PageWindow {
        page.window(self.default_page_size, self.max_page_size)
    }

    /// Single device with its installed chaos tools.
    pub async fn by_id(&self, device_id: i64) -> ServiceResult<DeviceResponse> {
        let device = queries::get_device(&self.pool, device_id)
            .await?
            .ok_or(ServiceError::DeviceNotFound(device_id))?;
        let tools = queries::list_tools_for_device(&self.pool, device_id).await?;
        Ok(device_response(&device, tools))
    }

    /// Host devices. A `probe_id` short-circuits every other filter and
    /// yields the probe's device, if it has one.
    pub async fn list_hosts(&self, query: &HostQuery) -> ServiceResult<Page<DeviceResponse>> {
        let window = self.window(query.page_request());

        if let Some(probe_id) = query.probe_id {
            let probe = queries::get_probe(&self.pool, probe_id)
                .await?
                .ok_or(ServiceError::ProbeNotFound(probe_id))?;

            let mut items = Vec::new();
            if let Some(device_id) = probe.device_id {
                if let Some(device) = queries::get_device(&self.pool, device_id).await? {
                    let tools = queries::list_tools_for_device(&self.pool, device_id).await?;
                    items.push(device_response(&device, tools));
                }
            }
            return Ok(Page {
                total: items.len() as i64,
                items,
                page: 1,
                page_size: window.page_size,
            });
        }

        let filter = HostFilter {
            ip: query.ip.clone(),
            hostname: query.hostname.clone(),
            is_experimented: query.chaosed,
            status: query.status,
        };
        let total = queries::count_hosts(&self.pool, &filter).await?;
        let devices = queries::list_hosts(&self.pool, &filter, limit_of(window)).await?;

        let ids: Vec<i64> = devices.iter().map(|d| d.id).collect();
        let mut tools = queries::list_tools_for_devices(&self.pool, &ids).await?;

        let items = devices
            .iter()
            .map(|d| device_response(d, tools.remove(&d.id).unwrap_or_default()))
            .collect();

        Ok(Page {
            items,
            total,
            page: window.page,
            page_size: window.page_size,
        })
    }

    /// Kubernetes nodes joined with their device status.
    pub async fn list_nodes(&self, query: &NodeQuery) -> ServiceResult<Page<DeviceNodeResponse>> {
        let window = self.window(query.page_request());
        let filter = NodeFilter {
            cluster_name: query.cluster_name.clone(),
            node_name: query.node_name.clone(),
        };

        let total = queries::count_nodes(&self.pool, &filter).await?;
        let nodes = queries::list_nodes(&self.pool, &filter, Some(limit_of(window))).await?;
        let devices =
            queries::get_devices_by_ids(&self.pool, &unique_ids(nodes.iter().map(|n| n.device_id)))
                .await?;

        let items = nodes
            .into_iter()
            .filter_map(|node| {
                let Some(device) = devices.get(&node.device_id) else {
                    tracing::warn!(
                        "Skipping node {} ({}): device {} does not exist",
                        node.node_name,
                        node.id,
                        node.device_id
                    );
                    return None;
                };
                Some(DeviceNodeResponse {
                    device_id: node.device_id,
                    cluster_name: node.cluster_name,
                    node_name: node.node_name,
                    node_ip: node.node_ip,
                    node_version: node.node_version,
                    state: DeviceState::from(device),
                })
            })
            .collect();

        Ok(Page {
            items,
            total,
            page: window.page,
            page_size: window.page_size,
        })
    }

    /// Kubernetes pods joined with their node and device.
    ///
    /// A cluster or node name restricts the pods to those scheduled on the
    /// matching nodes.
    pub async fn list_pods(&self, query: &PodQuery) -> ServiceResult<Page<DevicePodResponse>> {
        let window = self.window(query.page_request());
        let node_filter = NodeFilter {
            cluster_name: query.cluster_name.clone(),
            node_name: query.node_name.clone(),
        };
        let node_scoped = node_filter.cluster_name.is_some() || node_filter.node_name.is_some();

        let nodes: HashMap<i64, DeviceNode> = queries::list_nodes(&self.pool, &node_filter, None)
            .await?
            .into_iter()
            .map(|n| (n.id, n))
            .collect();

        let pod_filter = PodFilter {
            pod_name: query.pod_name.clone(),
            pod_ip: query.pod_ip.clone(),
            node: node_scoped.then(|| node_filter.clone()),
        };
        let total = queries::count_pods(&self.pool, &pod_filter).await?;
        let pods = queries::list_pods(&self.pool, &pod_filter, limit_of(window)).await?;
        let devices =
            queries::get_devices_by_ids(&self.pool, &unique_ids(pods.iter().map(|p| p.device_id)))
                .await?;

        let items = pods
            .into_iter()
            .filter_map(|pod| {
                let Some(node) = nodes.get(&pod.node_id) else {
                    tracing::warn!(
                        "Skipping pod {} ({}): node {} does not exist",
                        pod.pod_name,
                        pod.id,
                        pod.node_id
                    );
                    return None;
                };
                let Some(device) = devices.get(&pod.device_id) else {
                    tracing::warn!(
                        "Skipping pod {} ({}): device {} does not exist",
                        pod.pod_name,
                        pod.id,
                        pod.device_id
                    );
                    return None;
                };
                Some(DevicePodResponse {
                    device_id: pod.device_id,
                    pod_id: pod.id,
                    pod_name: pod.pod_name,
                    pod_ip: pod.pod_ip,
                    cluster_name: node.cluster_name.clone(),
                    node_name: node.node_name.clone(),
                    node_ip: node.node_ip.clone(),
                    node_version: node.node_version.clone(),
                    state: DeviceState::from(device),
                })
            })
            .collect();

        Ok(Page {
            items,
            total,
            page: window.page,
            page_size: window.page_size,
        })
    }
}
