use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db::queries;

/// Returns the id of the (namespace, app_name) application, creating it on first use.
///
/// A concurrent registration may win the insert; the unique key turns our
/// insert into a no-op and the second lookup picks up the winner's row.
pub async fn resolve_application(
    conn: &mut SqliteConnection,
    namespace: &str,
    app_name: &str,
) -> Result<i64> {
    if let Some(id) = queries::find_application_id(&mut *conn, namespace, app_name).await? {
        return Ok(id);
    }

    if let Some(id) = queries::insert_application(&mut *conn, namespace, app_name, Utc::now()).await? {
        tracing::info!("Created application {}/{} (id {})", namespace, app_name, id);
        return Ok(id);
    }

    queries::find_application_id(&mut *conn, namespace, app_name)
        .await?
        .ok_or_else(|| anyhow!("application {}/{} vanished after insert conflict", namespace, app_name))
}

/// Returns the id of group `group_name` under `app_id`, creating it on first use.
pub async fn resolve_group(
    conn: &mut SqliteConnection,
    app_id: i64,
    app_name: &str,
    group_name: &str,
) -> Result<i64> {
    if let Some(id) = queries::find_group_id(&mut *conn, app_id, group_name).await? {
        return Ok(id);
    }

    if let Some(id) = queries::insert_group(&mut *conn, app_id, app_name, group_name, Utc::now()).await? {
        tracing::info!("Created group {} for application {} (id {})", group_name, app_id, id);
        return Ok(id);
    }

    queries::find_group_id(&mut *conn, app_id, group_name)
        .await?
        .ok_or_else(|| anyhow!("group {} of application {} vanished after insert conflict", group_name, app_id))
}
