use crate::commands::scanner::replace_scanner;
use crate::config::ScannerConfig;
use tauri::command;

/// Get the saved configuration
#[command]
pub async fn scanner_get_config() -> Result<ScannerConfig, String> {
    Ok(ScannerConfig::load_or_default())
}

/// Validate, save, and apply a new configuration. The running scanner is
/// torn down and rebuilt.
#[command]
pub async fn scanner_update_config(new_config: ScannerConfig) -> Result<(), String> {
    new_config.validate()?;

    new_config
        .save_to_file(ScannerConfig::default_path())
        .map_err(|e| e.to_string())?;

    replace_scanner(new_config).await
}

/// Reset configuration to defaults
#[command]
pub async fn scanner_reset_config() -> Result<ScannerConfig, String> {
    let default_config = ScannerConfig::default();

    default_config
        .save_to_file(ScannerConfig::default_path())
        .map_err(|e| e.to_string())?;

    replace_scanner(default_config.clone()).await?;
    Ok(default_config)
}
