//! Device registration: application directory, host upsert, probe binding.

mod common;

use chaos_device_service::{
    db::models::{Application, ApplicationDevice, Device, DeviceStatus, DeviceType, Probe},
    error::ServiceError,
    inventory::model::RegistrationOutcome,
};
use common::*;

async fn probe(db: &TestDatabase, id: i64) -> Probe {
    sqlx::query_as::<_, Probe>("SELECT * FROM probes WHERE id = ?")
        .bind(id)
        .fetch_one(db.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_same_application_is_created_once() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    let first = svc.register(&host_request("web-1", "10.0.0.11")).await.unwrap();
    let second = svc.register(&host_request("web-2", "10.0.0.12")).await.unwrap();

    assert_eq!(first.app_id, second.app_id);
    assert_eq!(first.group_id, second.group_id);
    assert_eq!(db.count("application").await, 1);
    assert_eq!(db.count("application_group").await, 1);

    let apps = sqlx::query_as::<_, Application>("SELECT * FROM application")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(apps[0].namespace, "default");
    assert_eq!(apps[0].app_name, "checkout");
}

#[tokio::test]
async fn test_new_group_under_existing_application() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    let first = svc.register(&host_request("web-1", "10.0.0.11")).await.unwrap();
    let mut req = host_request("web-2", "10.0.0.12");
    req.app_group = "stable".to_string();
    let second = svc.register(&req).await.unwrap();

    assert_eq!(first.app_id, second.app_id);
    assert_ne!(first.group_id, second.group_id);
    assert_eq!(db.count("application_group").await, 2);
}

#[tokio::test]
async fn test_new_host_creates_device_and_binding() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    let registration = svc.register(&host_request("web-1", "10.0.0.11")).await.unwrap();
    let RegistrationOutcome::Created { device_id } = registration.outcome else {
        panic!("expected a new device, got {:?}", registration.outcome);
    };

    assert_eq!(db.count("device").await, 1);
    assert_eq!(db.count("application_device").await, 1);

    let device = sqlx::query_as::<_, Device>("SELECT * FROM device WHERE id = ?")
        .bind(device_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(device.device_type, DeviceType::Host);
    assert_eq!(device.status, DeviceStatus::Online);
    assert_eq!(device.cpu_core, Some(4));
    assert_eq!(device.version.as_deref(), Some("1.0.0"));
    assert!(device.last_online_time.is_some());
    assert!(!device.is_experimented);

    let binding = sqlx::query_as::<_, ApplicationDevice>("SELECT * FROM application_device")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(binding.device_id, device_id);
    assert_eq!(binding.app_id, registration.app_id);
    assert_eq!(binding.group_id, registration.group_id);
    assert_eq!(binding.group_name, "canary");
}

#[tokio::test]
async fn test_reregistration_does_not_refresh_metadata() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    let first = svc.register(&host_request("web-1", "10.0.0.11")).await.unwrap();

    let mut again = host_request("web-1", "10.0.0.11");
    again.version = Some("2.0.0".to_string());
    again.cpu_core = Some(64);
    let second = svc.register(&again).await.unwrap();

    let device_id = first.outcome.device_id().unwrap();
    assert_eq!(
        second.outcome,
        RegistrationOutcome::AlreadyRegistered { device_id }
    );
    assert_eq!(db.count("device").await, 1);
    assert_eq!(db.count("application_device").await, 1);

    let device = svc.by_id(device_id).await.unwrap();
    assert_eq!(device.version.as_deref(), Some("1.0.0"));
}

#[tokio::test]
async fn test_failed_binding_rolls_back_device() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    sqlx::query(
        "CREATE TRIGGER reject_binding BEFORE INSERT ON application_device
         BEGIN SELECT RAISE(ABORT, 'binding rejected'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let result = svc.register(&host_request("web-1", "10.0.0.11")).await;
    assert!(result.is_err());

    assert_eq!(db.count("device").await, 0);
    assert_eq!(db.count("application_device").await, 0);
    assert_eq!(db.count("application").await, 0);
}

#[tokio::test]
async fn test_unknown_device_type_is_rejected() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    let mut req = host_request("web-1", "10.0.0.11");
    req.device_type = 9;
    let err = svc.register(&req).await.unwrap_err();

    assert!(matches!(err, ServiceError::InvalidDeviceType(9)));
    assert!(err.to_string().contains('9'));
    assert_eq!(db.count("application").await, 0);
    assert_eq!(db.count("device").await, 0);
}

#[tokio::test]
async fn test_node_and_pod_registration_is_unsupported() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    for device_type in [DeviceType::Node, DeviceType::Pod] {
        let mut req = host_request("node-1", "10.0.1.1");
        req.device_type = device_type.code();
        let registration = svc.register(&req).await.unwrap();
        assert_eq!(
            registration.outcome,
            RegistrationOutcome::Unsupported { device_type }
        );
        assert!(!registration.probe_bound);
    }

    assert_eq!(db.count("device").await, 0);
    // The application directory is still populated
    assert_eq!(db.count("application").await, 1);
}

#[tokio::test]
async fn test_agent_id_binds_probe_to_device() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();
    let probe_id = db.insert_probe(Some("192.168.1.50"), None).await;

    let mut req = host_request("web-1", "10.0.0.11");
    req.agent_id = Some(probe_id.to_string());
    let registration = svc.register(&req).await.unwrap();

    assert!(registration.probe_bound);
    assert!(!registration.probe_refreshed);

    let probe = probe(&db, probe_id).await;
    assert_eq!(probe.device_id, registration.outcome.device_id());
    assert_eq!(probe.version.as_deref(), Some("1.0.0"));
    // Only the agent-id path ran; status untouched
    assert_eq!(probe.status, DeviceStatus::Offline);
}

#[tokio::test]
async fn test_malformed_or_unknown_agent_id_is_swallowed() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    let mut req = host_request("web-1", "10.0.0.11");
    req.agent_id = Some("agent-xyz".to_string());
    let registration = svc.register(&req).await.unwrap();
    assert!(!registration.probe_bound);
    assert!(matches!(registration.outcome, RegistrationOutcome::Created { .. }));

    let mut req = host_request("web-2", "10.0.0.12");
    req.agent_id = Some("4242".to_string());
    let registration = svc.register(&req).await.unwrap();
    assert!(!registration.probe_bound);
    assert_eq!(db.count("device").await, 2);
}

#[tokio::test]
async fn test_probe_on_host_ip_is_marked_online() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();
    let probe_id = db.insert_probe(Some("10.0.0.11"), None).await;

    let registration = svc.register(&host_request("web-1", "10.0.0.11")).await.unwrap();
    assert!(registration.probe_refreshed);
    assert!(!registration.probe_bound);

    let probe = probe(&db, probe_id).await;
    assert_eq!(probe.status, DeviceStatus::Online);
    assert_eq!(probe.hostname.as_deref(), Some("web-1"));
    assert_eq!(probe.device_id, None);
}

#[tokio::test]
async fn test_both_probe_paths_can_hit_the_same_row() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();
    let probe_id = db.insert_probe(Some("10.0.0.11"), None).await;

    let mut req = host_request("web-1", "10.0.0.11");
    req.agent_id = Some(format!(" {} ", probe_id));
    let registration = svc.register(&req).await.unwrap();

    assert!(registration.probe_bound);
    assert!(registration.probe_refreshed);

    let probe = probe(&db, probe_id).await;
    assert_eq!(probe.device_id, registration.outcome.device_id());
    assert_eq!(probe.status, DeviceStatus::Online);
}

#[tokio::test]
async fn test_probe_refresh_runs_for_unsupported_types() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();
    let probe_id = db.insert_probe(Some("10.0.1.1"), None).await;

    let mut req = host_request("node-1", "10.0.1.1");
    req.device_type = DeviceType::Node.code();
    req.agent_id = Some(probe_id.to_string());
    let registration = svc.register(&req).await.unwrap();

    assert!(!registration.probe_bound);
    assert!(registration.probe_refreshed);
    assert_eq!(probe(&db, probe_id).await.status, DeviceStatus::Online);
}

#[tokio::test]
async fn test_binding_records_registration_time() {
    let db = TestDatabase::new().await.unwrap();
    let svc = db.service();

    let before = chrono::Utc::now();
    let registration = svc.register(&host_request("web-1", "10.0.0.11")).await.unwrap();
    let after = chrono::Utc::now();

    let binding = sqlx::query_as::<_, ApplicationDevice>("SELECT * FROM application_device")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(Some(binding.device_id), registration.outcome.device_id());
    assert!(binding.created_at >= before && binding.created_at <= after);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_create_each_row_once() {
    let db = FileDatabase::new(10).await.unwrap();
    let svc = db.service();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..40 {
        let svc = svc.clone();
        tasks.spawn(async move {
            let req = host_request(&format!("web-{}", i % 5), &format!("10.0.0.{}", i % 5));
            svc.register(&req).await
        });
    }

    let mut created = 0;
    while let Some(joined) = tasks.join_next().await {
        let registration = joined.unwrap().unwrap();
        if matches!(registration.outcome, RegistrationOutcome::Created { .. }) {
            created += 1;
        }
    }

    assert_eq!(created, 5);
    assert_eq!(db.count("application").await, 1);
    assert_eq!(db.count("application_group").await, 1);
    assert_eq!(db.count("device").await, 5);

    let bindings_per_device = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM application_device GROUP BY device_id",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();
    assert_eq!(bindings_per_device, vec![1; 5]);
}
