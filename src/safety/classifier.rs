use super::{HostFacts, SafetyAssessment, SafetyReason};
use crate::drives::mounts::SWAP_MOUNT;
use crate::{BusType, Device};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Volume labels written by common OS installers and live-image tools
    static ref INSTALL_MEDIA_LABEL: Regex = Regex::new(
        r"(?i)^(ubuntu|kubuntu|xubuntu|lubuntu|debian|fedora|arch(iso)?_|archlinux|manjaro|endeavouros|centos|rhel|rocky|almalinux|opensuse|kali|linux ?mint|pop_os|elementary|tails|ventoy|anaconda|esd-(usb|iso)|cccoma|ccsa|win(dows)?[ _-]?(7|8|10|11|server)|install|live)"
    )
    .expect("install media label pattern is valid");
}

pub struct SafetyClassifier;

impl SafetyClassifier {
    pub const MIN_SIZE_BYTES: u64 = 100 * 1024 * 1024;
    pub const LARGE_CAPACITY_BYTES: u64 = 1024 * 1024 * 1024 * 1024;

    /// Exact-match critical mount points; `/boot` also covers everything below it
    pub const CRITICAL_MOUNTS: [&'static str; 7] =
        ["/", "/boot", "/home", "/usr", "/var", "/opt", "/etc"];

    pub const LINUX_FILESYSTEMS: [&'static str; 10] = [
        "ext2", "ext3", "ext4", "xfs", "btrfs", "f2fs", "jfs", "reiserfs", "swap", "crypto_LUKS",
    ];

    pub const VOLUME_MANAGER_SIGNATURES: [&'static str; 5] = [
        "LVM2_member",
        "linux_raid_member",
        "isw_raid_member",
        "ddf_raid_member",
        "zfs_member",
    ];

    /// Conventional names of the disk an installer puts the OS on
    pub const FIRST_DISK_PATHS: [&'static str; 6] = [
        "/dev/sda",
        "/dev/hda",
        "/dev/vda",
        "/dev/xvda",
        "/dev/nvme0n1",
        "/dev/mmcblk0",
    ];

    /// Evaluate every rule against the device; the level is the most severe
    /// fired rule, and all fired rules are kept as reasons.
    pub fn classify(device: &Device, facts: &HostFacts) -> SafetyAssessment {
        let mut reasons = Vec::new();
        let removable_signal = device.removable == Some(true) || device.bus_type == BusType::USB;

        for mount in Self::mount_points(device, facts) {
            let reason = if mount == SWAP_MOUNT {
                SafetyReason::ActiveSwap(device.path.clone())
            } else if Self::is_critical_mount(&mount) {
                SafetyReason::SystemMountPoint(mount)
            } else {
                SafetyReason::MountedElsewhere(mount)
            };
            push_unique(&mut reasons, reason);
        }

        for swap in facts.mount_table.swaps() {
            if Self::belongs_to(swap, device) {
                push_unique(&mut reasons, SafetyReason::ActiveSwap(swap.clone()));
            }
        }

        if device.removable == Some(false) && device.bus_type != BusType::USB {
            push_unique(&mut reasons, SafetyReason::NonRemovableInternal);
        }

        if Self::is_virtual(&device.path) {
            push_unique(&mut reasons, SafetyReason::VirtualDevice);
        }

        if device.size_bytes < Self::MIN_SIZE_BYTES {
            push_unique(&mut reasons, SafetyReason::TooSmall(device.size_bytes));
        }

        let block_paths = std::iter::once(&device.path).chain(device.partitions.iter());
        for path in block_paths {
            let Some(signature) = facts.signature(path) else {
                continue;
            };

            if let Some(fstype) = signature.fstype.as_deref() {
                if Self::VOLUME_MANAGER_SIGNATURES.contains(&fstype) {
                    push_unique(
                        &mut reasons,
                        SafetyReason::VolumeManagerMember(fstype.to_string()),
                    );
                } else if !removable_signal && Self::LINUX_FILESYSTEMS.contains(&fstype) {
                    push_unique(
                        &mut reasons,
                        SafetyReason::LinuxFilesystemNotRemovable(fstype.to_string()),
                    );
                }
            }

            if let Some(label) = signature.label.as_deref() {
                if INSTALL_MEDIA_LABEL.is_match(label.trim()) {
                    push_unique(
                        &mut reasons,
                        SafetyReason::InstallationMedia(label.to_string()),
                    );
                }
            }
        }

        if !removable_signal && Self::FIRST_DISK_PATHS.contains(&device.path.as_str()) {
            push_unique(&mut reasons, SafetyReason::FirstSystemDisk);
        }

        let removability_unknown = device.removable.is_none() && !removable_signal;

        if removability_unknown && device.size_bytes >= Self::LARGE_CAPACITY_BYTES {
            push_unique(&mut reasons, SafetyReason::LargeCapacityUnclearRemovability);
        }

        // Missing information never classifies as SAFE
        if removability_unknown {
            push_unique(&mut reasons, SafetyReason::RemovabilityUnknown);
        }

        SafetyAssessment::from_reasons(reasons)
    }

    pub fn is_critical_mount(mount: &str) -> bool {
        let mount = if mount.len() > 1 {
            mount.trim_end_matches('/')
        } else {
            mount
        };

        Self::CRITICAL_MOUNTS.contains(&mount) || mount.starts_with("/boot/")
    }

    pub fn is_virtual(path: &str) -> bool {
        let name = path.strip_prefix("/dev/").unwrap_or(path);
        ["loop", "ram", "zram", "dm-", "nbd", "md"]
            .iter()
            .any(|prefix| name.starts_with(prefix))
    }

    /// Whether a block path is the device itself or one of its partitions
    pub fn belongs_to(source: &str, device: &Device) -> bool {
        if source == device.path || device.partitions.iter().any(|p| p == source) {
            return true;
        }

        let Some(rest) = source.strip_prefix(device.path.as_str()) else {
            return false;
        };

        // nvme0n1p2, mmcblk0p1, loop1p1: a name ending in a digit needs the `p`
        let digits = if device.path.ends_with(|c: char| c.is_ascii_digit()) {
            match rest.strip_prefix('p') {
                Some(digits) => digits,
                None => return false,
            }
        } else {
            rest
        };
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
    }

    /// Device mount points followed by any extra ones from the host table
    fn mount_points(device: &Device, facts: &HostFacts) -> Vec<String> {
        let mut mounts = device.mount_points.clone();

        for entry in facts.mount_table.entries() {
            if Self::belongs_to(&entry.source, device) && !mounts.contains(&entry.target) {
                mounts.push(entry.target.clone());
            }
        }

        mounts
    }
}

fn push_unique(reasons: &mut Vec<SafetyReason>, reason: SafetyReason) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}
