//! ---
//! fds_section: "01-core-functionality"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Configuration model and loading for the simulator runtime."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_sample_size() -> usize {
    10_000
}

fn default_fail_over_iterations() -> usize {
    625
}

fn default_cycle_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_simulation_seed() -> u64 {
    0xF1E1Du64
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the simulator runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "FDS_CONFIG";

    /// Load configuration from disk, respecting the `FDS_CONFIG` override, then
    /// apply environment-variable overrides for the provisioning secrets.
    ///
    /// Validation is deferred to [`AppConfig::validate`] so that secrets can be
    /// supplied entirely through the environment without a config file; when no
    /// candidate file exists the defaults are used as the base.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path, if any.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        let mut loaded = if let Some(path) = Self::env_override_path() {
            LoadedAppConfig {
                config: Self::from_path(path.clone())?,
                source: Some(path),
            }
        } else if let Some(path) = candidates
            .iter()
            .map(|c| c.as_ref())
            .find(|c| c.exists())
            .map(Path::to_path_buf)
        {
            LoadedAppConfig {
                config: Self::from_path(path.clone())?,
                source: Some(path),
            }
        } else {
            debug!("no configuration file found; starting from defaults");
            LoadedAppConfig {
                config: AppConfig::default(),
                source: None,
            }
        };
        loaded.config.provisioning.apply_env_overrides();
        Ok(loaded)
    }

    fn env_override_path() -> Option<PathBuf> {
        match std::env::var(Self::ENV_CONFIG_PATH) {
            Ok(path) if !path.trim().is_empty() => Some(PathBuf::from(path)),
            _ => None,
        }
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Validate that the configuration is complete enough to start devices.
    pub fn validate(&self) -> Result<()> {
        self.provisioning.validate()?;
        if self.simulation.sample_size == 0 {
            return Err(anyhow!("simulation.sample_size must be greater than zero"));
        }
        if self.simulation.cycle_interval.is_zero() {
            return Err(anyhow!("simulation.cycle_interval_ms must be greater than zero"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        toml::from_str(content).with_context(|| "failed to parse configuration")
    }
}

/// Provisioning endpoint and per-device credentials.
///
/// Every field can be supplied through the environment using the variable
/// names the original deployment scripts export (`ID_SCOPE`, `DPS_ENDPOINT`,
/// `DEVICE_1_KEY`, ...). Environment values win over file values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvisioningConfig {
    #[serde(default)]
    pub id_scope: String,
    #[serde(default)]
    pub dps_endpoint: String,
    /// Symmetric keys, one per simulated device, in device order.
    #[serde(default)]
    pub device_keys: Vec<String>,
}

impl ProvisioningConfig {
    const ENV_ID_SCOPE: &'static str = "ID_SCOPE";
    const ENV_DPS_ENDPOINT: &'static str = "DPS_ENDPOINT";

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(Self::ENV_ID_SCOPE) {
            if !value.trim().is_empty() {
                self.id_scope = value;
            }
        }
        if let Ok(value) = std::env::var(Self::ENV_DPS_ENDPOINT) {
            if !value.trim().is_empty() {
                self.dps_endpoint = value;
            }
        }
        for slot in 0..self.device_keys.len().max(3) {
            let var = format!("DEVICE_{}_KEY", slot + 1);
            if let Ok(value) = std::env::var(&var) {
                if value.trim().is_empty() {
                    continue;
                }
                if slot < self.device_keys.len() {
                    self.device_keys[slot] = value;
                } else {
                    self.device_keys.resize(slot, String::new());
                    self.device_keys.push(value);
                }
            }
        }
    }

    /// Validate structural invariants; failures here are fatal before any
    /// device is constructed.
    pub fn validate(&self) -> Result<()> {
        if self.id_scope.trim().is_empty() {
            return Err(anyhow!("ID_SCOPE must be provided"));
        }
        if self.dps_endpoint.trim().is_empty() {
            return Err(anyhow!("DPS_ENDPOINT must be provided"));
        }
        if self.device_keys.is_empty() {
            return Err(anyhow!("at least one device key must be provided"));
        }
        for (index, key) in self.device_keys.iter().enumerate() {
            if key.trim().is_empty() {
                return Err(anyhow!("DEVICE_{}_KEY must be provided", index + 1));
            }
        }
        Ok(())
    }
}

/// Parameters controlling telemetry synthesis and the device send loops.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of samples generated for each of the normal and failed segments.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Ticks over which a gradual failure develops.
    #[serde(default = "default_fail_over_iterations")]
    pub fail_over_iterations: usize,
    /// Delay between successive telemetry sends for one device.
    #[serde(default = "default_cycle_interval", rename = "cycle_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub cycle_interval: Duration,
    /// Seed for the synthesis random source.
    #[serde(default = "default_simulation_seed")]
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            fail_over_iterations: default_fail_over_iterations(),
            cycle_interval: default_cycle_interval(),
            seed: default_simulation_seed(),
        }
    }
}

/// Logging sink configuration consumed by [`crate::logging::init_tracing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            file_prefix: None,
            format: default_log_format(),
        }
    }
}
