#[cfg(test)]
mod permissions_tests {
    use crabscan::permissions::{check_permission, check_permission_detailed, PermissionStatus};

    #[test]
    fn test_check_permission_is_consistent() {
        let first = check_permission();
        for _ in 0..5 {
            assert_eq!(check_permission(), first, "Permission status should be consistent");
        }
    }

    #[test]
    fn test_check_permission_concurrent() {
        let handles: Vec<_> = (0..10)
            .map(|_| std::thread::spawn(check_permission))
            .collect();

        for handle in handles {
            let _result = handle.join().unwrap();
        }
    }

    #[test]
    fn test_detailed_info_serializes() {
        let info = check_permission_detailed();
        let json = serde_json::to_value(&info).unwrap();
        assert!(json["message"].is_string());
        assert!(json["can_request"].is_boolean());
    }

    #[test]
    fn test_granted_never_requestable() {
        let info = check_permission_detailed();
        if info.status == PermissionStatus::Granted {
            assert!(!info.can_request);
        }
    }
}
