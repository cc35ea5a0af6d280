use chrono::{DateTime, Utc};

use super::model::DeviceResponse;
use super::DeviceService;
use crate::db::models::DeviceStatus;
use crate::db::queries;
use crate::error::{ServiceError, ServiceResult};

/// Status an unbanned device should return to, given its last heartbeat.
/// Devices that never reported a heartbeat are offline.
pub fn status_after_unban(
    last_online: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> DeviceStatus {
    match last_online {
        Some(seen) if now - threshold <= seen => DeviceStatus::Online,
        _ => DeviceStatus::Offline,
    }
}

impl DeviceService {
    /// Exclude a device from experiments regardless of its heartbeat.
    pub async fn ban(&self, device_id: i64) -> ServiceResult<DeviceResponse> {
        queries::update_device_status(&self.pool, device_id, DeviceStatus::Forbidden).await?;
        tracing::info!("Device {} banned", device_id);
        self.by_id(device_id).await
    }

    /// Lift a ban; the device comes back online only if it heartbeated recently.
    pub async fn unban(&self, device_id: i64) -> ServiceResult<DeviceResponse> {
        let device = queries::get_device(&self.pool, device_id)
            .await?
            .ok_or(ServiceError::DeviceNotFound(device_id))?;

        let status = status_after_unban(device.last_online_time, Utc::now(), self.heartbeat_threshold);
        queries::update_device_status(&self.pool, device_id, status).await?;
        tracing::info!("Device {} unbanned, now {}", device_id, status.as_str());

        self.by_id(device_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold() -> chrono::Duration {
        chrono::Duration::seconds(60)
    }

    #[test]
    fn stale_heartbeat_goes_offline() {
        let now = Utc::now();
        let seen = now - chrono::Duration::seconds(90);
        assert_eq!(status_after_unban(Some(seen), now, threshold()), DeviceStatus::Offline);
    }

    #[test]
    fn recent_heartbeat_goes_online() {
        let now = Utc::now();
        let seen = now - chrono::Duration::seconds(10);
        assert_eq!(status_after_unban(Some(seen), now, threshold()), DeviceStatus::Online);
    }

    #[test]
    fn heartbeat_exactly_at_threshold_is_online() {
        let now = Utc::now();
        assert_eq!(
            status_after_unban(Some(now - threshold()), now, threshold()),
            DeviceStatus::Online
        );
    }

    #[test]
    fn missing_heartbeat_is_offline() {
        assert_eq!(status_after_unban(None, Utc::now(), threshold()), DeviceStatus::Offline);
    }
}
