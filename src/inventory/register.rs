use anyhow::anyhow;
use chrono::Utc;
use sqlx::SqliteConnection;

use super::directory;
use super::model::{DeviceRegisterRequest, Registration, RegistrationOutcome};
use super::DeviceService;
use crate::db::models::{DeviceStatus, DeviceType, NewApplicationDevice, NewDevice};
use crate::db::queries::{self, ProbeKey, ProbePatch};
use crate::db::WriteTransaction;
use crate::error::{ServiceError, ServiceResult};

impl DeviceService {
    /// Register the device an agent is running on.
    ///
    /// Application, group, device and binding rows are written in one
    /// transaction that holds the write lock from the start, so concurrent
    /// registrations queue rather than fail. Probe updates happen after
    /// commit and never fail the call.
    pub async fn register(&self, req: &DeviceRegisterRequest) -> ServiceResult<Registration> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let (app_id, group_id, outcome) = match write_registration(&mut tx, req).await {
            Ok(written) => {
                tx.commit().await?;
                written
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!("Rollback of registration for {} failed: {}", req.ip, rollback);
                }
                return Err(e);
            }
        };

        let probe_bound = match (req.agent_id.as_deref(), outcome.device_id()) {
            (Some(agent_id), Some(device_id)) => {
                self.bind_probe(agent_id, device_id, req.version.clone()).await
            }
            _ => false,
        };

        let probe_refreshed = self
            .refresh_probe_best_effort(
                &ProbeKey::Host(req.ip.clone()),
                &ProbePatch {
                    hostname: Some(req.host_name.clone()),
                    status: Some(DeviceStatus::Online),
                    ..Default::default()
                },
            )
            .await;

        Ok(Registration {
            outcome,
            app_id,
            group_id,
            probe_bound,
            probe_refreshed,
        })
    }

    /// Apply a partial update to the probe(s) identified by `key`.
    /// Returns whether any probe row was touched.
    pub async fn refresh_probe(&self, key: &ProbeKey, patch: &ProbePatch) -> ServiceResult<bool> {
        let touched = queries::update_probe(&self.pool, key, patch).await?;
        Ok(touched > 0)
    }

    /// Same as [`DeviceService::refresh_probe`], but failures are only logged.
    pub async fn refresh_probe_best_effort(&self, key: &ProbeKey, patch: &ProbePatch) -> bool {
        match self.refresh_probe(key, patch).await {
            Ok(touched) => touched,
            Err(e) => {
                tracing::warn!("Failed to update probe {:?}: {}", key, e);
                false
            }
        }
    }

    async fn bind_probe(&self, agent_id: &str, device_id: i64, version: Option<String>) -> bool {
        let probe_id = match agent_id.trim().parse::<i64>() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Ignoring malformed agent id {:?}: {}", agent_id, e);
                return false;
            }
        };

        let patch = ProbePatch {
            device_id: Some(device_id),
            version,
            ..Default::default()
        };
        let bound = self
            .refresh_probe_best_effort(&ProbeKey::Id(probe_id), &patch)
            .await;
        if !bound {
            tracing::warn!("No probe {} to bind to device {}", probe_id, device_id);
        }
        bound
    }
}

/// Application, group and device writes of one registration.
async fn write_registration(
    conn: &mut SqliteConnection,
    req: &DeviceRegisterRequest,
) -> ServiceResult<(i64, i64, RegistrationOutcome)> {
    let app_id = directory::resolve_application(&mut *conn, &req.namespace, &req.app_instance).await?;
    let group_id =
        directory::resolve_group(&mut *conn, app_id, &req.app_instance, &req.app_group).await?;

    let device_type = DeviceType::from_code(req.device_type)
        .ok_or(ServiceError::InvalidDeviceType(req.device_type))?;

    let outcome = match device_type {
        DeviceType::Node | DeviceType::Pod => {
            tracing::warn!(
                "Registration of {:?} devices is not supported yet, ignoring {} ({})",
                device_type,
                req.host_name,
                req.ip
            );
            RegistrationOutcome::Unsupported { device_type }
        }
        DeviceType::Host => register_host(&mut *conn, req, app_id, group_id).await?,
    };

    Ok((app_id, group_id, outcome))
}

/// Create the host device and its application binding unless (host, hostname, ip)
/// is already registered. An existing device is left untouched.
async fn register_host(
    conn: &mut SqliteConnection,
    req: &DeviceRegisterRequest,
    app_id: i64,
    group_id: i64,
) -> ServiceResult<RegistrationOutcome> {
    if let Some(device_id) =
        queries::find_device_id(&mut *conn, DeviceType::Host, &req.host_name, &req.ip).await?
    {
        tracing::debug!("Host {} ({}) already registered as device {}", req.host_name, req.ip, device_id);
        return Ok(RegistrationOutcome::AlreadyRegistered { device_id });
    }

    let device = NewDevice {
        version: req.version.clone(),
        cpu_core: req.cpu_core,
        memory_size: req.memory_size,
        uptime: req.uptime,
        install_mode: req.install_mode.clone(),
        ..NewDevice::online_host(req.ip.clone(), req.host_name.clone())
    };

    let Some(device_id) = queries::insert_device(&mut *conn, &device).await? else {
        let device_id = queries::find_device_id(&mut *conn, DeviceType::Host, &req.host_name, &req.ip)
            .await?
            .ok_or_else(|| anyhow!("host {} ({}) vanished after insert conflict", req.host_name, req.ip))?;
        return Ok(RegistrationOutcome::AlreadyRegistered { device_id });
    };

    queries::insert_application_device(
        &mut *conn,
        &NewApplicationDevice {
            namespace: req.namespace.clone(),
            app_id,
            app_name: req.app_instance.clone(),
            group_id,
            group_name: req.app_group.clone(),
            device_id,
            created_at: Utc::now(),
        },
    )
    .await?;

    tracing::info!(
        "Registered host {} ({}) as device {} in {}/{}",
        req.host_name,
        req.ip,
        device_id,
        req.namespace,
        req.app_instance
    );
    Ok(RegistrationOutcome::Created { device_id })
}
