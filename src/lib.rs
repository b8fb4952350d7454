//! CrabScan: real-time barcode and QR scanning over live camera feeds
//!
//! This crate turns a camera stream into a sequence of decoded scan results
//! behind a small controller surface that a UI (or a CLI) drives.
//!
//! # Features
//! - Camera acquisition with front/rear preference and cyclic switching
//! - Cancellable decode loop with continuous and single-shot modes
//! - Duplicate suppression inside a configurable window
//! - Bounded, newest-first result history
//! - Observable session snapshots and transition events
//! - Optional native capture (`native`), QR decoding (`qr`) and a Tauri
//!   plugin (`plugin`)
//!
//! # Usage
//! ```rust,ignore
//! use crabscan::{ScannerConfig, ScannerController};
//! use std::sync::Arc;
//!
//! let scanner = ScannerController::new(
//!     Arc::new(crabscan::camera::NativeCamera::new()),
//!     Arc::new(crabscan::decode::QrDecoder::new()),
//!     ScannerConfig::load_or_default(),
//! )?;
//! scanner.start().await?;
//! let mut snapshots = scanner.subscribe();
//! while snapshots.changed().await.is_ok() {
//!     if let Some(result) = &snapshots.borrow().last_result {
//!         println!("{}: {}", result.format_name, result.text);
//!     }
//! }
//! ```
//!
//! As a Tauri plugin:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(crabscan::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod camera;
pub mod config;
pub mod controller;
pub mod decode;
pub mod errors;
pub mod formats;
pub mod history;
pub mod invariant_ppt;
pub mod permissions;
pub mod scan_loop;
pub mod types;

#[cfg(feature = "plugin")]
pub mod commands;

// Testing utilities - mock camera and scripted decoder for offline testing
pub mod testing;

// Re-exports for convenience
pub use camera::{CameraBackend, CameraSession, MediaStream};
pub use config::ScannerConfig;
pub use controller::{ScanEvent, ScanSnapshot, ScanStats, ScannerController};
pub use decode::{Decoder, Detection};
pub use errors::{CameraError, DecoderError, ErrorKind, ScanError, ScanFailure};
pub use formats::{FormatId, FormatSet};
pub use history::ResultHistory;
pub use types::{
    BoundingBox, DeviceDescriptor, Facing, Frame, PixelFormat, ScanMode, ScanResult, ScanStatus,
};

#[cfg(feature = "plugin")]
use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the CrabScan plugin with all commands
#[cfg(feature = "plugin")]
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("crabscan")
        .invoke_handler(tauri::generate_handler![
            // Scanner commands
            commands::scanner::scanner_start,
            commands::scanner::scanner_stop,
            commands::scanner::scanner_switch_camera,
            commands::scanner::scanner_set_formats,
            commands::scanner::scanner_toggle_format,
            commands::scanner::scanner_set_mode,
            commands::scanner::scanner_clear_results,
            commands::scanner::scanner_teardown,
            commands::scanner::scanner_snapshot,
            commands::scanner::scanner_stats,
            commands::scanner::scanner_list_devices,
            commands::scanner::scanner_list_formats,
            // Permission commands
            commands::permissions::scanner_check_permission,
            // Configuration commands
            commands::config::scanner_get_config,
            commands::config::scanner_update_config,
            commands::config::scanner_reset_config,
        ])
        .setup(|app, _api| {
            tauri::async_runtime::spawn(commands::scanner::forward_snapshots(app.clone()));
            Ok(())
        })
        .build()
}

/// Initialize logging for the scanner
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabscan=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        native_capture: cfg!(feature = "native"),
        qr_decoding: cfg!(feature = "qr"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub native_capture: bool,
    pub qr_decoding: bool,
}
