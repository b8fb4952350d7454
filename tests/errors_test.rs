#[cfg(test)]
mod error_tests {
    use crabscan::errors::{CameraError, DecoderError, ErrorKind, ScanError, ScanFailure};
    use crabscan::ScanStatus;
    use std::error::Error;

    #[test]
    fn test_camera_error_permission_denied() {
        let error = CameraError::PermissionDenied("Access denied".to_string());
        assert!(error.to_string().contains("Permission denied"));
        assert!(error.to_string().contains("Access denied"));
    }

    #[test]
    fn test_camera_error_display_trait() {
        let error = CameraError::DeviceUnavailable("camera busy".to_string());
        assert_eq!(format!("{}", error), "Camera unavailable: camera busy");
    }

    #[test]
    fn test_camera_error_debug_format() {
        let error = CameraError::NotSupported("no webcam".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("NotSupported"));
        assert!(debug_str.contains("no webcam"));
    }

    #[test]
    fn test_camera_error_implements_error_trait() {
        let error = CameraError::PermissionDenied("Error trait test".to_string());
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_scan_error_wraps_camera_error_transparently() {
        let camera = CameraError::DeviceUnavailable("unplugged".to_string());
        let error: ScanError = camera.clone().into();
        assert_eq!(error.to_string(), camera.to_string());
        assert_eq!(error.kind(), Some(ErrorKind::DeviceUnavailable));
    }

    #[test]
    fn test_scan_error_without_kind() {
        assert_eq!(ScanError::EmptyFormatSet.kind(), None);
        assert_eq!(ScanError::ControllerClosed.kind(), None);
        let error = ScanError::InvalidState {
            command: "start",
            status: ScanStatus::Acquiring,
        };
        assert_eq!(error.to_string(), "Cannot start while acquiring");
    }

    #[test]
    fn test_scan_failure_from_camera_error() {
        let failure = ScanFailure::from(&CameraError::NotSupported("headless".to_string()));
        assert_eq!(failure.kind, ErrorKind::NotSupported);
        assert!(failure.message.contains("headless"));
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::PermissionDenied).unwrap();
        assert_eq!(json, "\"permission_denied\"");
        let kind: ErrorKind = serde_json::from_str("\"decode_fault\"").unwrap();
        assert_eq!(kind, ErrorKind::DecodeFault);
        assert_eq!(kind.to_string(), "decode_fault");
    }

    #[test]
    fn test_decoder_error_display() {
        let error = DecoderError::new("short buffer");
        assert_eq!(error.to_string(), "Decoder error: short buffer");
    }
}
