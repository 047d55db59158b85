use super::mounts::{MountTable, MountTableReader, ProcMountTable};
use crate::safety::{FsSignature, HostFacts};
use crate::settings::Settings;
use crate::{BusType, Device, WipeError, WipeResult, UNKNOWN_FIELD};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// One node of the block device tree as the enumerator reports it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockEntry {
    pub path: String,
    pub size_bytes: u64,
    /// lsblk TYPE column: disk, part, lvm, crypt, loop, rom, ...
    pub kind: String,
    pub fstype: Option<String>,
    pub label: Option<String>,
    pub mount_points: Vec<String>,
    pub children: Vec<BlockEntry>,
}

impl BlockEntry {
    /// Every node below this one, depth first
    pub fn descendants(&self) -> Vec<&BlockEntry> {
        let mut out = Vec::new();
        for child in &self.children {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAttributes {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub bus_type: BusType,
    pub removable: Option<bool>,
}

impl DeviceAttributes {
    pub fn unknown() -> Self {
        Self {
            vendor: UNKNOWN_FIELD.to_string(),
            model: UNKNOWN_FIELD.to_string(),
            serial: UNKNOWN_FIELD.to_string(),
            bus_type: BusType::Unknown,
            removable: None,
        }
    }
}

/// OS block-device enumerator (path, size, type and the partition tree)
pub trait BlockEnumerator: Send + Sync {
    fn enumerate(&self) -> WipeResult<Vec<BlockEntry>>;
}

/// Per-device attribute query; may stall, callers bound it with a timeout
pub trait AttributeQuery: Send + Sync {
    fn query(&self, path: &str) -> WipeResult<DeviceAttributes>;
}

#[derive(Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<LsblkNode>,
}

#[derive(Deserialize)]
struct LsblkNode {
    name: String,
    path: Option<String>,
    size: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
    fstype: Option<String>,
    label: Option<String>,
    mountpoint: Option<String>,
    #[serde(default)]
    mountpoints: Vec<Option<String>>,
    #[serde(default)]
    children: Vec<LsblkNode>,
}

impl LsblkNode {
    fn into_entry(self) -> BlockEntry {
        let path = self
            .path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("/dev/{}", self.name));

        let mut mount_points: Vec<String> = Vec::new();
        let candidates = self.mountpoint.into_iter().chain(self.mountpoints.into_iter().flatten());
        for mount in candidates {
            if !mount.is_empty() && !mount_points.contains(&mount) {
                mount_points.push(mount);
            }
        }

        BlockEntry {
            path,
            size_bytes: self.size.as_ref().and_then(value_as_u64).unwrap_or(0),
            kind: self.kind.unwrap_or_default(),
            fstype: non_empty(self.fstype),
            label: non_empty(self.label),
            mount_points,
            children: self.children.into_iter().map(LsblkNode::into_entry).collect(),
        }
    }
}

// lsblk emits numbers in newer releases and strings in older ones
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|v| v == 1),
        Value::String(s) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn run_lsblk(args: &[&str]) -> WipeResult<String> {
    let output = Command::new("lsblk").args(args).output()?;

    if !output.status.success() {
        return Err(WipeError::Enumeration(format!(
            "lsblk exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Enumerates block devices with `lsblk --json --bytes`
pub struct LsblkEnumerator;

impl LsblkEnumerator {
    pub(crate) const COLUMNS: &'static str = "NAME,PATH,SIZE,TYPE,FSTYPE,LABEL,MOUNTPOINT";

    pub fn parse(json: &str) -> WipeResult<Vec<BlockEntry>> {
        let output: LsblkOutput = serde_json::from_str(json)
            .map_err(|e| WipeError::Enumeration(format!("unparseable lsblk output: {}", e)))?;

        Ok(output
            .blockdevices
            .into_iter()
            .map(LsblkNode::into_entry)
            .collect())
    }
}

impl BlockEnumerator for LsblkEnumerator {
    fn enumerate(&self) -> WipeResult<Vec<BlockEntry>> {
        let json = run_lsblk(&["--json", "--bytes", "--output", Self::COLUMNS])?;
        Self::parse(&json)
    }
}

/// Queries vendor, model, serial, transport and removability of one device
pub struct LsblkAttributeQuery;

impl LsblkAttributeQuery {
    pub(crate) const COLUMNS: &'static str = "VENDOR,MODEL,SERIAL,TRAN,RM";

    pub fn parse(json: &str) -> WipeResult<DeviceAttributes> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| WipeError::Enumeration(format!("unparseable lsblk output: {}", e)))?;

        let node = value
            .get("blockdevices")
            .and_then(|b| b.as_array())
            .and_then(|a| a.first())
            .ok_or_else(|| WipeError::Enumeration("lsblk returned no device".to_string()))?;

        let text = |key: &str| {
            node.get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(DeviceAttributes {
            vendor: text("vendor").unwrap_or_else(|| UNKNOWN_FIELD.to_string()),
            model: text("model").unwrap_or_else(|| UNKNOWN_FIELD.to_string()),
            serial: text("serial").unwrap_or_else(|| UNKNOWN_FIELD.to_string()),
            bus_type: text("tran")
                .map(|t| BusType::from_transport(&t))
                .unwrap_or(BusType::Unknown),
            removable: node.get("rm").and_then(value_as_flag),
        })
    }

    /// Check if device is connected via USB
    fn is_usb_device(device_path: &str) -> bool {
        let Some(device_name) = Path::new(device_path).file_name().and_then(|n| n.to_str())
        else {
            return false;
        };

        let sys_path = format!("/sys/block/{}/device", device_name);
        fs::read_link(&sys_path)
            .map(|real_path| real_path.to_string_lossy().contains("usb"))
            .unwrap_or(false)
    }
}

impl AttributeQuery for LsblkAttributeQuery {
    fn query(&self, path: &str) -> WipeResult<DeviceAttributes> {
        let json = run_lsblk(&["--json", "--nodeps", "--output", Self::COLUMNS, path]).map_err(
            |e| WipeError::DeviceQuery {
                path: path.to_string(),
                reason: e.to_string(),
            },
        )?;

        let mut attributes = Self::parse(&json)?;
        if attributes.bus_type == BusType::Unknown && Self::is_usb_device(path) {
            attributes.bus_type = BusType::USB;
        }

        Ok(attributes)
    }
}

/// Devices plus the host facts they were classified against
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySnapshot {
    pub devices: Vec<Device>,
    pub facts: HostFacts,
}

pub struct DeviceInventory {
    enumerator: Arc<dyn BlockEnumerator>,
    attributes: Arc<dyn AttributeQuery>,
    mounts: Arc<dyn MountTableReader>,
    query_timeout: Duration,
    enumeration_timeout: Duration,
}

impl DeviceInventory {
    pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_ENUMERATION_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(
        enumerator: Arc<dyn BlockEnumerator>,
        attributes: Arc<dyn AttributeQuery>,
        mounts: Arc<dyn MountTableReader>,
    ) -> Self {
        Self {
            enumerator,
            attributes,
            mounts,
            query_timeout: Self::DEFAULT_QUERY_TIMEOUT,
            enumeration_timeout: Self::DEFAULT_ENUMERATION_TIMEOUT,
        }
    }

    /// Inventory backed by lsblk and procfs
    pub fn system(settings: &Settings) -> Self {
        Self::new(
            Arc::new(LsblkEnumerator),
            Arc::new(LsblkAttributeQuery),
            Arc::new(ProcMountTable::new()),
        )
        .with_timeouts(settings.query_timeout(), settings.enumeration_timeout())
    }

    pub fn with_timeouts(mut self, query_timeout: Duration, enumeration_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self.enumeration_timeout = enumeration_timeout;
        self
    }

    /// Normalized device list, sorted by path. Empty is not an error.
    pub async fn list_devices(&self) -> WipeResult<Vec<Device>> {
        Ok(self.scan().await?.devices)
    }

    /// Full scan: enumeration, concurrent per-device queries and host facts.
    /// Device mount points include live mounts lsblk did not report.
    pub async fn scan(&self) -> WipeResult<InventorySnapshot> {
        let entries = self.enumerate().await?;

        let mount_table = self.read_mount_table().unwrap_or_else(|e| {
            warn!(error = %e, "Mount table unavailable, relying on lsblk mount points");
            MountTable::default()
        });

        let mut facts = HostFacts::new(mount_table);
        for entry in &entries {
            for node in std::iter::once(entry).chain(entry.descendants()) {
                facts.insert_signature(
                    node.path.clone(),
                    FsSignature {
                        fstype: node.fstype.clone(),
                        label: node.label.clone(),
                    },
                );
            }
        }

        // One slow device must not hold up the others
        let queries = entries
            .iter()
            .map(|entry| self.query_attributes(entry.path.clone()));
        let attributes = join_all(queries).await;

        let mut devices: Vec<Device> = entries
            .iter()
            .zip(attributes)
            .map(|(entry, attrs)| {
                let mut device = Self::build_device(entry, attrs);
                facts.mount_table.merge_into(&mut device);
                device
            })
            .collect();
        devices.sort_by(|a, b| a.path.cmp(&b.path));

        info!(count = devices.len(), "Device scan complete");
        Ok(InventorySnapshot { devices, facts })
    }

    pub fn read_mount_table(&self) -> WipeResult<MountTable> {
        self.mounts.read()
    }

    async fn enumerate(&self) -> WipeResult<Vec<BlockEntry>> {
        let enumerator = Arc::clone(&self.enumerator);
        let task = tokio::task::spawn_blocking(move || enumerator.enumerate());

        let entries = match timeout(self.enumeration_timeout, task).await {
            Err(_) => {
                return Err(WipeError::Enumeration(format!(
                    "device enumeration timed out after {}s",
                    self.enumeration_timeout.as_secs()
                )))
            }
            Ok(Err(join_error)) => return Err(WipeError::Enumeration(join_error.to_string())),
            Ok(Ok(result)) => result?,
        };

        // Optical drives are not wipe targets
        Ok(entries.into_iter().filter(|e| e.kind != "rom").collect())
    }

    async fn query_attributes(&self, path: String) -> DeviceAttributes {
        let attributes = Arc::clone(&self.attributes);
        let query_path = path.clone();
        let task = tokio::task::spawn_blocking(move || attributes.query(&query_path));

        let result = match timeout(self.query_timeout, task).await {
            Err(_) => Err(WipeError::DeviceQueryTimeout {
                path: path.clone(),
                timeout: self.query_timeout,
            }),
            Ok(Err(join_error)) => Err(WipeError::DeviceQuery {
                path: path.clone(),
                reason: join_error.to_string(),
            }),
            Ok(Ok(result)) => result,
        };

        match result {
            Ok(attrs) => {
                debug!(device = %path, bus = %attrs.bus_type, "Device attributes queried");
                attrs
            }
            Err(e) => {
                warn!(device = %path, error = %e, "Using placeholder attributes");
                DeviceAttributes::unknown()
            }
        }
    }

    pub(crate) fn build_device(entry: &BlockEntry, attrs: DeviceAttributes) -> Device {
        let descendants = entry.descendants();

        let mut mount_points = entry.mount_points.clone();
        for node in &descendants {
            for mount in &node.mount_points {
                if !mount_points.contains(mount) {
                    mount_points.push(mount.clone());
                }
            }
        }

        Device {
            path: entry.path.clone(),
            vendor_name: attrs.vendor,
            model_name: attrs.model,
            serial: attrs.serial,
            size_bytes: entry.size_bytes,
            bus_type: attrs.bus_type,
            mount_points,
            removable: attrs.removable,
            partitions: descendants.iter().map(|n| n.path.clone()).collect(),
        }
    }
}
