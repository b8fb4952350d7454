use crate::camera::NativeCamera;
use crate::config::ScannerConfig;
use crate::controller::{ScanSnapshot, ScanStats, ScannerController};
use crate::decode::QrDecoder;
use crate::formats::{catalog, FormatDescriptor, FormatId, FormatSet};
use crate::types::{DeviceDescriptor, ScanMode};
use std::sync::Arc;
use tauri::{command, AppHandle, Emitter, Runtime};
use tokio::sync::RwLock;

/// Event carrying every published snapshot to the webview.
pub const SNAPSHOT_EVENT: &str = "crabscan://snapshot";

// One scanner per application, created on first use
lazy_static::lazy_static! {
    static ref SCANNER: Arc<RwLock<Option<Arc<ScannerController>>>> = Arc::new(RwLock::new(None));
}

/// Get the global scanner, creating it from the saved configuration if needed.
pub(crate) async fn scanner() -> Result<Arc<ScannerController>, String> {
    if let Some(controller) = SCANNER.read().await.as_ref() {
        return Ok(controller.clone());
    }

    let mut slot = SCANNER.write().await;
    if let Some(controller) = slot.as_ref() {
        return Ok(controller.clone());
    }
    let controller = Arc::new(build_controller(ScannerConfig::load_or_default())?);
    *slot = Some(controller.clone());
    Ok(controller)
}

/// Replace the global scanner with one built from `config`. The previous
/// scanner is torn down first.
pub(crate) async fn replace_scanner(config: ScannerConfig) -> Result<(), String> {
    let mut slot = SCANNER.write().await;
    if let Some(previous) = slot.take() {
        previous.teardown().await.map_err(|e| e.to_string())?;
    }
    *slot = Some(Arc::new(build_controller(config)?));
    log::info!("Scanner rebuilt with updated configuration");
    Ok(())
}

fn build_controller(config: ScannerConfig) -> Result<ScannerController, String> {
    ScannerController::new(Arc::new(NativeCamera::new()), Arc::new(QrDecoder::new()), config)
        .map_err(|e| format!("Failed to create scanner: {}", e))
}

/// Forward snapshots to the frontend for as long as the app runs. Follows
/// the scanner across rebuilds.
pub(crate) async fn forward_snapshots<R: Runtime>(app: AppHandle<R>) {
    loop {
        let controller = match scanner().await {
            Ok(controller) => controller,
            Err(e) => {
                log::error!("Snapshot forwarding stopped: {}", e);
                return;
            }
        };
        let mut snapshots = controller.subscribe();
        drop(controller);

        emit_snapshot(&app, snapshots.borrow_and_update().clone());
        while snapshots.changed().await.is_ok() {
            emit_snapshot(&app, snapshots.borrow_and_update().clone());
        }
        log::debug!("Scanner replaced, re-subscribing to snapshots");
    }
}

fn emit_snapshot<R: Runtime>(app: &AppHandle<R>, snapshot: ScanSnapshot) {
    if let Err(e) = app.emit(SNAPSHOT_EVENT, snapshot) {
        log::warn!("Failed to emit scanner snapshot: {}", e);
    }
}

/// Acquire the camera and begin scanning
#[command]
pub async fn scanner_start() -> Result<ScanSnapshot, String> {
    log::info!("Starting scanner");
    let controller = scanner().await?;
    controller.start().await.map_err(|e| e.to_string())?;
    Ok(controller.snapshot())
}

/// Stop scanning and release the camera
#[command]
pub async fn scanner_stop() -> Result<ScanSnapshot, String> {
    let controller = scanner().await?;
    controller.stop().await.map_err(|e| e.to_string())?;
    Ok(controller.snapshot())
}

#[command]
pub async fn scanner_switch_camera() -> Result<ScanSnapshot, String> {
    let controller = scanner().await?;
    controller.switch_camera().await.map_err(|e| e.to_string())?;
    Ok(controller.snapshot())
}

/// Replace the active formats. Names are parsed case-insensitively.
#[command]
pub async fn scanner_set_formats(formats: Vec<String>) -> Result<FormatSet, String> {
    let formats = formats
        .iter()
        .map(|name| name.parse::<FormatId>())
        .collect::<Result<Vec<_>, _>>()?;

    let controller = scanner().await?;
    controller
        .set_formats(formats)
        .await
        .map_err(|e| e.to_string())?;
    Ok(controller.snapshot().active_formats)
}

#[command]
pub async fn scanner_toggle_format(format: String) -> Result<FormatSet, String> {
    let format = format.parse::<FormatId>()?;
    scanner()
        .await?
        .toggle_format(format)
        .await
        .map_err(|e| e.to_string())
}

#[command]
pub async fn scanner_set_mode(mode: ScanMode) -> Result<ScanSnapshot, String> {
    let controller = scanner().await?;
    controller.set_mode(mode).await.map_err(|e| e.to_string())?;
    Ok(controller.snapshot())
}

#[command]
pub async fn scanner_clear_results() -> Result<ScanSnapshot, String> {
    let controller = scanner().await?;
    controller.clear_results().await.map_err(|e| e.to_string())?;
    Ok(controller.snapshot())
}

/// Release everything and return to a fresh idle session
#[command]
pub async fn scanner_teardown() -> Result<(), String> {
    scanner().await?.teardown().await.map_err(|e| e.to_string())
}

#[command]
pub async fn scanner_snapshot() -> Result<ScanSnapshot, String> {
    Ok(scanner().await?.snapshot())
}

#[command]
pub async fn scanner_stats() -> Result<ScanStats, String> {
    Ok(scanner().await?.stats())
}

#[command]
pub async fn scanner_list_devices() -> Result<Vec<DeviceDescriptor>, String> {
    scanner()
        .await?
        .list_devices()
        .await
        .map_err(|e| e.to_string())
}

#[command]
pub async fn scanner_list_formats() -> Result<Vec<FormatDescriptor>, String> {
    Ok(catalog())
}
