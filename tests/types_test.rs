#[cfg(test)]
mod types_tests {
    use crabscan::formats::catalog;
    use crabscan::testing::{MockCamera, ScriptedDecoder};
    use crabscan::{
        BoundingBox, Facing, FormatId, FormatSet, ScanMode, ScanResult, ScanStatus,
        ScannerConfig, ScannerController,
    };
    use std::sync::Arc;

    #[test]
    fn test_scan_result_serialization() {
        let result = ScanResult::new("4006381333931", FormatId::Ean13, Some(BoundingBox::new(1, 2, 3, 4)));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["text"], "4006381333931");
        assert_eq!(json["format"], "EAN_13");
        assert_eq!(json["formatName"], "EAN-13");
        assert_eq!(json["boundingBox"]["width"], 3);
        assert!(json["timestamp"].is_string());
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_scan_results_are_distinct() {
        let a = ScanResult::new("same", FormatId::QrCode, None);
        let b = ScanResult::new("same", FormatId::QrCode, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_status_and_mode_serialization() {
        assert_eq!(serde_json::to_string(&ScanStatus::Scanning).unwrap(), "\"scanning\"");
        assert_eq!(serde_json::to_string(&ScanMode::SingleShot).unwrap(), "\"single_shot\"");
        assert_eq!(serde_json::to_string(&Facing::Rear).unwrap(), "\"rear\"");
    }

    #[test]
    fn test_format_set_rejects_empty_json() {
        assert!(serde_json::from_str::<FormatSet>("[]").is_err());
        let set: FormatSet = serde_json::from_str("[\"QR_CODE\",\"AZTEC\"]").unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_catalog_lists_sixteen_formats() {
        let formats = catalog();
        assert_eq!(formats.len(), 16);
        assert!(formats.iter().any(|f| f.id == FormatId::Pdf417 && f.two_dimensional));
        assert!(formats.iter().any(|f| f.id == FormatId::UpcA && !f.two_dimensional));
    }

    #[tokio::test]
    async fn test_initial_snapshot_shape() {
        let controller = ScannerController::new(
            Arc::new(MockCamera::new()),
            Arc::new(ScriptedDecoder::new()),
            ScannerConfig::default(),
        )
        .unwrap();

        let json = serde_json::to_value(controller.snapshot()).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["activeFacing"], "rear");
        assert_eq!(json["mode"], "continuous");
        assert!(json["stream"].is_null());
        assert!(json["lastResult"].is_null());
        assert!(json["error"].is_null());
        assert_eq!(json["activeFormats"].as_array().unwrap().len(), 16);
        assert_eq!(json["history"].as_array().unwrap().len(), 0);
    }
}
