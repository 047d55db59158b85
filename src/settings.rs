/// Runtime configuration
///
/// Layered with the `config` crate, lowest precedence first:
/// built-in defaults, an optional TOML file, `WIPE_SENTINEL_*` environment
/// variables. CLI flags are applied on top by the binary, after which
/// `normalized()` clamps everything into its allowed range.
use crate::WipeResult;
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Delay between consecutive wipe task launches
    pub stagger_delay_secs: u64,
    /// Progress monitor refresh interval
    pub poll_interval_secs: u64,
    /// Bound on each per-device attribute query
    pub query_timeout_secs: u64,
    /// Bound on the whole-host block device enumeration
    pub enumeration_timeout_secs: u64,
    /// Write buffer size for overwrite passes
    pub chunk_size_mib: usize,
    pub report_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            stagger_delay_secs: 0,
            poll_interval_secs: 2,
            query_timeout_secs: 5,
            enumeration_timeout_secs: 15,
            chunk_size_mib: 4,
            report_dir: data_dir.join("reports"),
            log_dir: data_dir.join("logs"),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "wipe-sentinel", "wipe-sentinel")
}

impl Settings {
    pub const ENV_PREFIX: &'static str = "WIPE_SENTINEL";
    pub const MAX_STAGGER_SECS: u64 = 30;
    pub const MIN_POLL_SECS: u64 = 2;
    pub const MAX_POLL_SECS: u64 = 5;

    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load settings. An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> WipeResult<Self> {
        let mut builder = Config::builder();

        match path {
            Some(explicit) => {
                builder = builder.add_source(File::from(explicit).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_config_path() {
                    builder = builder.add_source(File::from(default_path).required(false));
                }
            }
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(Self::ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings.normalized())
    }

    /// Clamp every field into its allowed range
    pub fn normalized(mut self) -> Self {
        self.stagger_delay_secs = self.stagger_delay_secs.min(Self::MAX_STAGGER_SECS);
        self.poll_interval_secs = self
            .poll_interval_secs
            .clamp(Self::MIN_POLL_SECS, Self::MAX_POLL_SECS);
        self.query_timeout_secs = self.query_timeout_secs.max(1);
        self.enumeration_timeout_secs = self.enumeration_timeout_secs.max(1);
        self.chunk_size_mib = self.chunk_size_mib.clamp(1, 64);
        self
    }

    pub fn stagger_delay(&self) -> Duration {
        Duration::from_secs(self.stagger_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn enumeration_timeout(&self) -> Duration {
        Duration::from_secs(self.enumeration_timeout_secs)
    }

    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_mib * 1024 * 1024
    }
}
