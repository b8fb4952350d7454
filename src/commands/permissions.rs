use crate::permissions::{check_permission_detailed, PermissionInfo, PermissionStatus};
use tauri::command;

/// Check camera permission with platform guidance
#[command]
pub async fn scanner_check_permission() -> Result<PermissionInfo, String> {
    let info = tokio::task::spawn_blocking(check_permission_detailed)
        .await
        .map_err(|e| format!("Permission check failed: {}", e))?;

    match info.status {
        PermissionStatus::Granted => log::debug!("Camera permission granted"),
        status => log::info!("Camera permission {}: {}", status, info.message),
    }
    Ok(info)
}
