use anyhow::{anyhow, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tplsentry_evaluator::{EvaluatorConfig, DEFAULT_EVALUATOR};

use crate::cli::args::ScanArgs;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct TplsentryConfig {
    #[serde(default)]
    pub evaluator: EvaluatorSection,

    #[serde(default)]
    pub scan: ScanSection,

    #[serde(default)]
    pub output: OutputSection,
}

/// External template evaluator
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EvaluatorSection {
    /// Path to the evaluator executable (looked up on PATH when unset)
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ScanSection {
    pub target: Option<PathBuf>,

    /// File or directory names, or root-relative prefixes, to leave out
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Only analyze files that belong to a chart
    #[serde(default)]
    pub follow_charts_only: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct OutputSection {
    /// Where to write the JSON report
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub verbosity: u8,
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for EvaluatorSection {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid path in {field}: {path} does not exist")]
    InvalidPath { field: String, path: PathBuf },

    #[error("Invalid range in {field}: {value} (valid range: {valid_range})")]
    InvalidRange {
        field: String,
        value: u64,
        valid_range: String,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TplsentryConfig {
    /// Merge another config into this one (other takes precedence for set values)
    pub fn merge(&mut self, other: &TplsentryConfig) {
        if other.evaluator.path.is_some() {
            self.evaluator.path = other.evaluator.path.clone();
        }
        if !other.evaluator.args.is_empty() {
            self.evaluator.args = other.evaluator.args.clone();
        }
        if other.evaluator.timeout_secs != default_timeout_secs() {
            self.evaluator.timeout_secs = other.evaluator.timeout_secs;
        }
        if other.evaluator.max_concurrent != default_max_concurrent() {
            self.evaluator.max_concurrent = other.evaluator.max_concurrent;
        }

        if other.scan.target.is_some() {
            self.scan.target = other.scan.target.clone();
        }
        if !other.scan.exclude.is_empty() {
            self.scan.exclude = other.scan.exclude.clone();
        }
        if other.scan.follow_charts_only {
            self.scan.follow_charts_only = true;
        }

        if other.output.path.is_some() {
            self.output.path = other.output.path.clone();
        }
        if other.output.verbosity > 0 {
            self.output.verbosity = other.output.verbosity;
        }
    }

    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_else(|_| {
            r#"# tplsentry configuration file

[evaluator]
# path = "/usr/local/bin/tplsentry-helm-evaluator"
args = []
timeout_secs = 5
max_concurrent = 4

[scan]
# target = "charts"
exclude = []
follow_charts_only = false

[output]
# path = "tplsentry-report.json"
verbosity = 0
"#
            .to_string()
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: TplsentryConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the user config file path (~/.config/tplsentry/config.toml)
    pub fn get_user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/tplsentry/config.toml"))
    }

    /// Get the system config file path (/etc/tplsentry/config.toml)
    pub fn get_system_config_path() -> PathBuf {
        PathBuf::from("/etc/tplsentry/config.toml")
    }

    /// Get the current directory config file path (./tplsentry.toml)
    pub fn get_current_config_path() -> PathBuf {
        PathBuf::from("./tplsentry.toml")
    }

    /// Load and merge configs from all sources with priority:
    /// 1. User config (~/.config/tplsentry/config.toml) - lowest priority (base)
    /// 2. Current directory (./tplsentry.toml)
    /// 3. System config (/etc/tplsentry/config.toml) - highest priority
    pub fn load_with_merged_configs() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let mut paths = Vec::new();
        if let Some(user_path) = Self::get_user_config_path() {
            paths.push(user_path);
        }
        paths.push(Self::get_current_config_path());
        paths.push(Self::get_system_config_path());

        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(loaded) => {
                    config.merge(&loaded);
                    debug!("Loaded config from: {}", path.display());
                }
                Err(e) => debug!("Ignoring config {}: {}", path.display(), e),
            }
        }

        Ok(config)
    }

    pub fn apply_env_vars(&mut self, env_vars: &HashMap<String, String>) -> Result<()> {
        for (key, value) in env_vars {
            if let Some(config_key) = key.strip_prefix("TPLSENTRY_") {
                match config_key {
                    "EVALUATOR_PATH" => self.evaluator.path = Some(PathBuf::from(value)),
                    "TIMEOUT_SECS" => {
                        self.evaluator.timeout_secs = value
                            .parse()
                            .map_err(|_| anyhow!("Invalid timeout_secs value: {}", value))?;
                    }
                    "MAX_CONCURRENT" => {
                        self.evaluator.max_concurrent = value
                            .parse()
                            .map_err(|_| anyhow!("Invalid max_concurrent value: {}", value))?;
                    }
                    "SCAN_TARGET" => self.scan.target = Some(PathBuf::from(value)),
                    "OUTPUT_PATH" => self.output.path = Some(PathBuf::from(value)),
                    _ => {} // Ignore unknown environment variables
                }
            }
        }
        Ok(())
    }

    pub fn apply_scan_args(&mut self, args: &ScanArgs) {
        if let Some(ref target) = args.target {
            self.scan.target = Some(target.clone());
        }
        if let Some(ref evaluator) = args.evaluator {
            self.evaluator.path = Some(evaluator.clone());
        }
        if let Some(timeout_secs) = args.timeout_secs {
            self.evaluator.timeout_secs = timeout_secs;
        }
        if let Some(max_concurrent) = args.max_concurrent {
            self.evaluator.max_concurrent = max_concurrent;
        }
        if let Some(ref output) = args.output {
            self.output.path = Some(output.clone());
        }
        if args.charts_only {
            self.scan.follow_charts_only = true;
        }
        if args.verbosity > 0 {
            self.output.verbosity = args.verbosity;
        }
    }

    /// Load configuration with full precedence chain:
    /// 1. Default values (lowest)
    /// 2. User, current directory and system config files
    /// 3. Explicit config file (--config)
    /// 4. Environment variables (TPLSENTRY_*)
    /// 5. CLI arguments (highest)
    pub fn load_with_precedence(
        config_path: Option<PathBuf>,
        cli_args: &ScanArgs,
        env_vars: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut config = Self::load_with_merged_configs().unwrap_or_default();

        if let Some(path) = config_path {
            let explicit_config = Self::load_from_file(&path)
                .map_err(|e| anyhow!("Failed to load config file {}: {}", path.display(), e))?;
            config.merge(&explicit_config);
        }

        config.apply_env_vars(env_vars)?;
        config.apply_scan_args(cli_args);
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref target) = self.scan.target {
            if !target.exists() {
                return Err(ConfigError::InvalidPath {
                    field: "scan.target".to_string(),
                    path: target.clone(),
                });
            }
        }

        if self.evaluator.timeout_secs == 0 || self.evaluator.timeout_secs > 600 {
            return Err(ConfigError::InvalidRange {
                field: "evaluator.timeout_secs".to_string(),
                value: self.evaluator.timeout_secs,
                valid_range: "1-600".to_string(),
            });
        }

        if self.evaluator.max_concurrent == 0 || self.evaluator.max_concurrent > 64 {
            return Err(ConfigError::InvalidRange {
                field: "evaluator.max_concurrent".to_string(),
                value: self.evaluator.max_concurrent as u64,
                valid_range: "1-64".to_string(),
            });
        }

        if self.output.verbosity > 5 {
            return Err(ConfigError::InvalidRange {
                field: "output.verbosity".to_string(),
                value: self.output.verbosity as u64,
                valid_range: "0-5".to_string(),
            });
        }

        Ok(())
    }

    pub fn to_evaluator_config(&self) -> EvaluatorConfig {
        let path = self
            .evaluator
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EVALUATOR));
        EvaluatorConfig::new(path)
            .with_args(self.evaluator.args.clone())
            .with_timeout(self.evaluator.timeout_secs)
            .with_max_concurrent(self.evaluator.max_concurrent)
    }
}
