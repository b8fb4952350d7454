//! Camera permission probing.
//!
//! Used to tell a denied camera apart from a busy or missing one when an
//! acquisition fails, and surfaced directly through the CLI and plugin.

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

/// Check camera permission status for the current platform
pub fn check_permission() -> PermissionStatus {
    check_permission_detailed().status
}

/// Check camera permission status with detailed information
pub fn check_permission_detailed() -> PermissionInfo {
    #[cfg(target_os = "linux")]
    {
        check_permission_linux()
    }

    #[cfg(all(target_os = "windows", feature = "native"))]
    {
        check_permission_windows()
    }

    #[cfg(target_os = "macos")]
    {
        PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "Camera access is granted by the system prompt on first open".to_string(),
            can_request: true,
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        all(target_os = "windows", feature = "native")
    )))]
    {
        PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "Platform not supported".to_string(),
            can_request: false,
        }
    }
}

#[cfg(all(target_os = "windows", feature = "native"))]
fn check_permission_windows() -> PermissionInfo {
    // Privacy settings hide devices from enumeration when access is off
    use nokhwa::{query, utils::ApiBackend};

    match query(ApiBackend::Auto) {
        Ok(devices) if !devices.is_empty() => PermissionInfo {
            status: PermissionStatus::Granted,
            message: "Camera access granted via Windows Privacy settings".to_string(),
            can_request: false,
        },
        Ok(_) => PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "No cameras found - permission may not be granted".to_string(),
            can_request: true,
        },
        Err(e) => PermissionInfo {
            status: PermissionStatus::Denied,
            message: format!("Camera access denied: {}", e),
            can_request: true,
        },
    }
}

#[cfg(target_os = "linux")]
fn check_permission_linux() -> PermissionInfo {
    use std::fs::OpenOptions;
    use std::io::ErrorKind;
    use std::path::Path;

    let video_devices: Vec<String> = (0..10)
        .map(|i| format!("/dev/video{}", i))
        .filter(|path| Path::new(path).exists())
        .collect();

    let Some(first_device) = video_devices.first() else {
        return PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "No video devices found at /dev/video*".to_string(),
            can_request: false,
        };
    };

    match OpenOptions::new().read(true).open(first_device) {
        Ok(_) => PermissionInfo {
            status: PermissionStatus::Granted,
            message: format!("Camera access granted ({} readable)", first_device),
            can_request: false,
        },
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            if check_linux_group_membership() {
                PermissionInfo {
                    status: PermissionStatus::Restricted,
                    message: format!("{} is not readable despite video group membership", first_device),
                    can_request: false,
                }
            } else {
                PermissionInfo {
                    status: PermissionStatus::Denied,
                    message: format!(
                        "Camera device {} exists but user not in video group - run: sudo usermod -a -G video $USER",
                        first_device
                    ),
                    can_request: true,
                }
            }
        }
        // Busy or transient errors say nothing about permission
        Err(e) => PermissionInfo {
            status: PermissionStatus::Granted,
            message: format!("{} present but not openable right now: {}", first_device, e),
            can_request: false,
        },
    }
}

#[cfg(target_os = "linux")]
fn check_linux_group_membership() -> bool {
    use std::process::Command;

    Command::new("groups")
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|groups| groups.split_whitespace().any(|g| g == "video" || g == "plugdev"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_matches_serde() {
        for status in [
            PermissionStatus::Granted,
            PermissionStatus::Denied,
            PermissionStatus::NotDetermined,
            PermissionStatus::Restricted,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn test_detailed_check_is_consistent() {
        let info = check_permission_detailed();
        assert!(!info.message.is_empty());
        assert_eq!(check_permission(), info.status);
    }
}
