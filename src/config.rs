use crate::policy::ThresholdPolicy;
use crate::report::ReportFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub thresholds: ThresholdPolicy,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplingConfig {
    #[serde(default = "default_enabled")]
    pub cpu: bool,
    #[serde(default = "default_enabled")]
    pub memory: bool,
    #[serde(default = "default_disk_mounts")]
    pub disk_mounts: Vec<String>,
    #[serde(default = "default_cpu_window_ms")]
    pub cpu_window_ms: u64,
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            sampling: SamplingConfig::default(),
            thresholds: ThresholdPolicy::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            cpu: default_enabled(),
            memory: default_enabled(),
            disk_mounts: default_disk_mounts(),
            cpu_window_ms: default_cpu_window_ms(),
            source_timeout_ms: default_source_timeout_ms(),
        }
    }
}

impl SamplingConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

/// Command-line values that replace the corresponding config fields.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub format: Option<ReportFormat>,
    pub threshold: Option<f64>,
    /// Replaces the configured mount list when non-empty.
    pub mounts: Vec<String>,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "поле listen должно быть корректным адресом host:port".to_string(),
            ));
        }

        validate_sampling(&self.sampling)?;
        self.thresholds
            .validate()
            .map_err(|err| ConfigError::Validation(format!("thresholds: {err}")))?;

        Ok(())
    }

    /// Applies the overrides without validating; call `validate` afterwards.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(format) = overrides.format {
            self.report.format = format;
        }
        if let Some(threshold) = overrides.threshold {
            self.thresholds.default_percent = Some(threshold);
        }
        if !overrides.mounts.is_empty() {
            self.sampling.disk_mounts = overrides.mounts;
        }
        if overrides.log_file.is_some() {
            self.report.log_file = overrides.log_file;
        }
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_sampling(cfg: &SamplingConfig) -> Result<(), ConfigError> {
    if !cfg.cpu && !cfg.memory && cfg.disk_mounts.is_empty() {
        return Err(ConfigError::Validation(
            "sampling: должен быть включён хотя бы один источник".to_string(),
        ));
    }
    if cfg.cpu_window_ms < 1 {
        return Err(ConfigError::Validation(
            "sampling.cpu_window_ms должно быть >= 1".to_string(),
        ));
    }
    if cfg.source_timeout_ms <= cfg.cpu_window_ms {
        return Err(ConfigError::Validation(
            "sampling.source_timeout_ms должно быть больше cpu_window_ms".to_string(),
        ));
    }

    let mut mounts = HashSet::new();
    for mount in &cfg.disk_mounts {
        if mount.trim().is_empty() {
            return Err(ConfigError::Validation(
                "sampling.disk_mounts[*] не должен быть пустым".to_string(),
            ));
        }
        if !mounts.insert(mount.as_str()) {
            return Err(ConfigError::Validation(format!(
                "точка монтирования '{mount}' указана дважды"
            )));
        }
    }
    Ok(())
}

fn default_listen() -> String {
    "127.0.0.1:9109".to_string()
}

const fn default_enabled() -> bool {
    true
}

fn default_disk_mounts() -> Vec<String> {
    vec![crate::collectors::disk::DEFAULT_MOUNT.to_string()]
}

const fn default_cpu_window_ms() -> u64 {
    1000
}

const fn default_source_timeout_ms() -> u64 {
    5000
}
