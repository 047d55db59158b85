/// Tests for device inventory
/// Tests cover lsblk parsing, attribute parsing, timeout degradation and snapshot assembly

#[cfg(test)]
mod drive_detection_tests {
    use super::super::detection::*;
    use super::super::mounts::{MountTable, MountTableReader};
    use crate::{BusType, WipeError, WipeResult, UNKNOWN_FIELD};
    use std::sync::Arc;
    use std::time::Duration;

    const LSBLK_TREE: &str = r#"{
       "blockdevices": [
          {"name":"sda", "path":"/dev/sda", "size":500107862016, "type":"disk", "fstype":null, "label":null, "mountpoint":null,
             "children": [
                {"name":"sda1", "path":"/dev/sda1", "size":536870912, "type":"part", "fstype":"vfat", "label":null, "mountpoint":"/boot/efi"},
                {"name":"sda2", "path":"/dev/sda2", "size":499570991104, "type":"part", "fstype":"LVM2_member", "label":null, "mountpoint":null,
                   "children": [
                      {"name":"vg-root", "path":"/dev/mapper/vg-root", "size":499570991104, "type":"lvm", "fstype":"ext4", "label":null, "mountpoint":"/"}
                   ]
                }
             ]
          },
          {"name":"sdb", "path":"/dev/sdb", "size":"8004304896", "type":"disk", "fstype":null, "label":null, "mountpoint":null,
             "children": [
                {"name":"sdb1", "path":"/dev/sdb1", "size":"8003256320", "type":"part", "fstype":"vfat", "label":"STICK", "mountpoint":"/media/user/STICK"}
             ]
          },
          {"name":"sr0", "path":"/dev/sr0", "size":1073741312, "type":"rom", "fstype":null, "label":null, "mountpoint":null}
       ]
    }"#;

    // ==================== LSBLK PARSING ====================

    #[test]
    fn test_parse_lsblk_tree() {
        let entries = LsblkEnumerator::parse(LSBLK_TREE).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, "/dev/sda");
        assert_eq!(entries[0].size_bytes, 500_107_862_016);
        assert_eq!(entries[0].kind, "disk");
        assert_eq!(entries[0].children.len(), 2);
        assert_eq!(entries[0].descendants().len(), 3);
    }

    #[test]
    fn test_parse_lsblk_string_sizes() {
        let entries = LsblkEnumerator::parse(LSBLK_TREE).unwrap();
        assert_eq!(entries[1].size_bytes, 8_004_304_896);
        assert_eq!(entries[1].children[0].label.as_deref(), Some("STICK"));
    }

    #[test]
    fn test_parse_lsblk_without_path_column() {
        let json = r#"{"blockdevices":[{"name":"nvme0n1","size":1000,"type":"disk"}]}"#;
        let entries = LsblkEnumerator::parse(json).unwrap();

        assert_eq!(entries[0].path, "/dev/nvme0n1");
        assert!(entries[0].mount_points.is_empty());
        assert_eq!(entries[0].fstype, None);
    }

    #[test]
    fn test_parse_lsblk_mountpoints_array() {
        let json = r#"{"blockdevices":[{"name":"sdc","size":1000,"type":"disk",
            "mountpoint":"/mnt/a","mountpoints":["/mnt/a","/mnt/b",null]}]}"#;
        let entries = LsblkEnumerator::parse(json).unwrap();

        assert_eq!(entries[0].mount_points, vec!["/mnt/a", "/mnt/b"]);
    }

    #[test]
    fn test_parse_lsblk_garbage_is_enumeration_error() {
        let result = LsblkEnumerator::parse("not json");
        assert!(matches!(result, Err(WipeError::Enumeration(_))));
    }

    #[test]
    fn test_parse_lsblk_no_devices() {
        let entries = LsblkEnumerator::parse(r#"{"blockdevices":[]}"#).unwrap();
        assert!(entries.is_empty());
    }

    // ==================== ATTRIBUTE PARSING ====================

    #[test]
    fn test_parse_attributes_usb_stick() {
        let json = r#"{"blockdevices":[{"vendor":"SanDisk ","model":"Ultra Fit   ","serial":"4C530001","tran":"usb","rm":true}]}"#;
        let attrs = LsblkAttributeQuery::parse(json).unwrap();

        assert_eq!(attrs.vendor, "SanDisk");
        assert_eq!(attrs.model, "Ultra Fit");
        assert_eq!(attrs.bus_type, BusType::USB);
        assert_eq!(attrs.removable, Some(true));
    }

    #[test]
    fn test_parse_attributes_legacy_string_flags() {
        let json = r#"{"blockdevices":[{"vendor":"ATA","model":"WDC WD10","serial":"WD-1","tran":"sata","rm":"0"}]}"#;
        let attrs = LsblkAttributeQuery::parse(json).unwrap();

        assert_eq!(attrs.bus_type, BusType::SATA);
        assert_eq!(attrs.removable, Some(false));
    }

    #[test]
    fn test_parse_attributes_missing_fields_are_unknown() {
        let json = r#"{"blockdevices":[{"vendor":null,"model":null,"serial":null,"tran":null}]}"#;
        let attrs = LsblkAttributeQuery::parse(json).unwrap();

        assert_eq!(attrs, DeviceAttributes::unknown());
    }

    #[test]
    fn test_bus_type_from_transport() {
        assert_eq!(BusType::from_transport("usb"), BusType::USB);
        assert_eq!(BusType::from_transport("SATA"), BusType::SATA);
        assert_eq!(BusType::from_transport("nvme"), BusType::NVMe);
        assert_eq!(BusType::from_transport("sas"), BusType::SCSI);
        assert_eq!(BusType::from_transport("mmc"), BusType::Unknown);
    }

    // ==================== INVENTORY ====================

    struct FixedEnumerator(WipeResult<Vec<BlockEntry>>);

    impl BlockEnumerator for FixedEnumerator {
        fn enumerate(&self) -> WipeResult<Vec<BlockEntry>> {
            match &self.0 {
                Ok(entries) => Ok(entries.clone()),
                Err(e) => Err(WipeError::Enumeration(e.to_string())),
            }
        }
    }

    struct StallingEnumerator;

    impl BlockEnumerator for StallingEnumerator {
        fn enumerate(&self) -> WipeResult<Vec<BlockEntry>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Vec::new())
        }
    }

    /// Answers instantly except for one path, which stalls
    struct SlowForOne {
        slow_path: &'static str,
    }

    impl AttributeQuery for SlowForOne {
        fn query(&self, path: &str) -> WipeResult<DeviceAttributes> {
            if path == self.slow_path {
                std::thread::sleep(Duration::from_millis(500));
            }
            Ok(DeviceAttributes {
                vendor: "Vendor".to_string(),
                model: format!("Model of {}", path),
                serial: "SER".to_string(),
                bus_type: BusType::USB,
                removable: Some(true),
            })
        }
    }

    struct FailingQuery;

    impl AttributeQuery for FailingQuery {
        fn query(&self, path: &str) -> WipeResult<DeviceAttributes> {
            Err(WipeError::DeviceQuery {
                path: path.to_string(),
                reason: "no such device".to_string(),
            })
        }
    }

    struct StaticMounts(MountTable);

    impl MountTableReader for StaticMounts {
        fn read(&self) -> WipeResult<MountTable> {
            Ok(self.0.clone())
        }
    }

    struct BrokenMounts;

    impl MountTableReader for BrokenMounts {
        fn read(&self) -> WipeResult<MountTable> {
            Err(WipeError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )))
        }
    }

    fn inventory(
        enumerator: impl BlockEnumerator + 'static,
        query: impl AttributeQuery + 'static,
    ) -> DeviceInventory {
        DeviceInventory::new(
            Arc::new(enumerator),
            Arc::new(query),
            Arc::new(StaticMounts(MountTable::default())),
        )
        .with_timeouts(Duration::from_millis(100), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_scan_builds_devices_and_skips_rom() {
        let entries = LsblkEnumerator::parse(LSBLK_TREE).unwrap();
        let inv = inventory(FixedEnumerator(Ok(entries)), SlowForOne { slow_path: "" });

        let devices = inv.list_devices().await.unwrap();

        let paths: Vec<&str> = devices.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["/dev/sda", "/dev/sdb"]);
    }

    #[tokio::test]
    async fn test_scan_merges_descendant_mounts_and_partitions() {
        let entries = LsblkEnumerator::parse(LSBLK_TREE).unwrap();
        let inv = inventory(FixedEnumerator(Ok(entries)), SlowForOne { slow_path: "" });

        let devices = inv.list_devices().await.unwrap();
        let sda = &devices[0];

        assert_eq!(sda.mount_points, vec!["/boot/efi", "/"]);
        assert_eq!(
            sda.partitions,
            vec!["/dev/sda1", "/dev/sda2", "/dev/mapper/vg-root"]
        );
    }

    #[tokio::test]
    async fn test_scan_records_signatures() {
        let entries = LsblkEnumerator::parse(LSBLK_TREE).unwrap();
        let inv = inventory(FixedEnumerator(Ok(entries)), SlowForOne { slow_path: "" });

        let snapshot = inv.scan().await.unwrap();

        let lvm = snapshot.facts.signature("/dev/sda2").unwrap();
        assert_eq!(lvm.fstype.as_deref(), Some("LVM2_member"));
        let stick = snapshot.facts.signature("/dev/sdb1").unwrap();
        assert_eq!(stick.label.as_deref(), Some("STICK"));
    }

    #[tokio::test]
    async fn test_stalled_query_degrades_only_that_device() {
        let entries = LsblkEnumerator::parse(LSBLK_TREE).unwrap();
        let inv = inventory(
            FixedEnumerator(Ok(entries)),
            SlowForOne {
                slow_path: "/dev/sda",
            },
        );

        let devices = inv.list_devices().await.unwrap();

        assert_eq!(devices[0].model_name, UNKNOWN_FIELD);
        assert_eq!(devices[0].bus_type, BusType::Unknown);
        assert_eq!(devices[0].removable, None);
        // Size comes from enumeration, not from the stalled query
        assert_eq!(devices[0].size_bytes, 500_107_862_016);

        assert_eq!(devices[1].model_name, "Model of /dev/sdb");
        assert_eq!(devices[1].bus_type, BusType::USB);
    }

    #[tokio::test]
    async fn test_failed_query_degrades_to_placeholder() {
        let entries = LsblkEnumerator::parse(LSBLK_TREE).unwrap();
        let inv = inventory(FixedEnumerator(Ok(entries)), FailingQuery);

        let devices = inv.list_devices().await.unwrap();

        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.serial == UNKNOWN_FIELD));
    }

    #[tokio::test]
    async fn test_empty_enumeration_is_not_an_error() {
        let inv = inventory(FixedEnumerator(Ok(vec![])), FailingQuery);
        assert!(inv.list_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enumerator_error_is_enumeration_error() {
        let inv = inventory(
            FixedEnumerator(Err(WipeError::Enumeration("lsblk missing".to_string()))),
            FailingQuery,
        );

        let result = inv.list_devices().await;
        assert!(matches!(result, Err(WipeError::Enumeration(_))));
    }

    #[tokio::test]
    async fn test_enumeration_timeout_is_enumeration_error() {
        let inv = inventory(StallingEnumerator, FailingQuery);

        match inv.list_devices().await {
            Err(WipeError::Enumeration(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected enumeration timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_mount_table_is_tolerated() {
        let entries = LsblkEnumerator::parse(LSBLK_TREE).unwrap();
        let inv = DeviceInventory::new(
            Arc::new(FixedEnumerator(Ok(entries))),
            Arc::new(SlowForOne { slow_path: "" }),
            Arc::new(BrokenMounts),
        );

        let snapshot = inv.scan().await.unwrap();
        assert_eq!(snapshot.devices.len(), 2);
        assert!(snapshot.facts.mount_table.entries().is_empty());
    }
}
