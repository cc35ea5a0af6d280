use super::model::KubernetesStatistics;
use super::DeviceService;
use crate::db::models::{Container, DeviceType};
use crate::db::queries;
use crate::error::ServiceResult;

/// Number of containers in a pod's serialized container list.
/// Missing or unparsable data counts as zero.
pub fn container_count(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return 0;
    };
    match serde_json::from_str::<Vec<Container>>(raw) {
        Ok(containers) => containers.len(),
        Err(e) => {
            tracing::debug!("Unparsable container list ({}): {:?}", e, raw);
            0
        }
    }
}

impl DeviceService {
    pub async fn cluster_totals(&self) -> ServiceResult<KubernetesStatistics> {
        let nodes = queries::count_devices_by_type(&self.pool, DeviceType::Node).await?;
        let pods = queries::count_devices_by_type(&self.pool, DeviceType::Pod).await?;
        let clusters = queries::count_clusters(&self.pool).await?;
        let containers: usize = queries::list_pod_containers(&self.pool)
            .await?
            .iter()
            .map(|raw| container_count(raw.as_deref()))
            .sum();

        Ok(KubernetesStatistics {
            nodes,
            pods,
            clusters,
            containers: containers as i64,
        })
    }
}
