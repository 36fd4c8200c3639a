use crate::error::{AvError, Result};
use crate::orchestrator::OrchestratorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name searched for when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "av-automation.toml";

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "AV_AUTOMATION_CONFIG";

/// Which surface drives the devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Follow projector power automatically
    #[default]
    Monitor,
    /// Accept operator commands only
    Manual,
}

/// Serial port names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPorts {
    pub projector: String,
    pub screen: String,
}

/// Amplifier endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmplifierConfig {
    #[serde(default)]
    pub host: Option<String>,
}

/// Process configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Screen travel time in milliseconds
    pub screen_lower_time_ms: u64,

    pub serial_ports: SerialPorts,

    #[serde(default)]
    pub amplifier: AmplifierConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Parse configuration text
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| AvError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AvError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.serial_ports.projector.trim().is_empty() {
            return Err(AvError::Config("serial_ports.projector is empty".to_string()));
        }
        if self.serial_ports.screen.trim().is_empty() {
            return Err(AvError::Config("serial_ports.screen is empty".to_string()));
        }
        Ok(())
    }

    /// Amplifier host, if one is set
    pub fn amplifier_host(&self) -> Option<&str> {
        self.amplifier
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }

    pub fn screen_wait(&self) -> Duration {
        Duration::from_millis(self.screen_lower_time_ms)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings::new(self.screen_wait())
    }
}

/// Locate the configuration file
///
/// Order: explicit path, `$AV_AUTOMATION_CONFIG`, next to the executable,
/// then the working directory.
pub fn discover(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join(CONFIG_FILE_NAME));
    }
    candidates.push(PathBuf::from(CONFIG_FILE_NAME));

    candidates
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| {
            AvError::Config(format!(
                "{} not found next to the executable or in the working directory",
                CONFIG_FILE_NAME
            ))
        })
}
