//! LogBus configuration types and loading
//!
//! Configuration comes from YAML (`logbus.yml`) and can be overlaid with
//! `LOG_*` environment variables.

use eyre::{Context, Result, eyre};
use rollfile::{RollPolicy, parse_size};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dispatch::DispatchConfig;
use crate::flags::EventFlagSet;
use crate::sink::{DEFAULT_TIME_FORMAT, LineFormat};

pub const ENV_EVENTS: &str = "LOG_EVENTS";
pub const ENV_USE_COLOR: &str = "LOG_USE_COLOR";
pub const ENV_SHOW_TIME: &str = "LOG_SHOW_TIME";
pub const ENV_SHOW_LABEL: &str = "LOG_SHOW_LABEL";
pub const ENV_LABEL: &str = "LOG_LABEL";
pub const ENV_TIME_FORMAT: &str = "LOG_TIME_FORMAT";
pub const ENV_OUT_FILE: &str = "LOG_OUT_FILE";
pub const ENV_ERR_FILE: &str = "LOG_ERR_FILE";
pub const ENV_FILE_MAX_SIZE: &str = "LOG_FILE_MAX_SIZE";
pub const ENV_FILE_MAX_ARCHIVES: &str = "LOG_FILE_MAX_ARCHIVES";
pub const ENV_FILE_COMPRESS: &str = "LOG_FILE_COMPRESS";

/// Main LogBus configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enabled events, e.g. `all,-debug`
    pub events: EventFlagSet,

    /// Line formatting
    pub output: OutputConfig,

    /// Rolling file output; stdout/stderr when absent
    pub file: Option<FileConfig>,

    /// Dispatch queue
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Load configuration, then overlay the `LOG_*` environment
    ///
    /// The file is `config_path` when given, otherwise the first of
    /// [`Config::search_paths`] that loads; defaults when none does. An explicit
    /// path must load. The result is validated before it is returned, so a bad
    /// `max-size` fails here rather than when the sink opens.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => {
                Self::load_from_file(path).with_context(|| format!("Failed to load config from {}", path.display()))?
            }
            None => Self::search_paths()
                .iter()
                .find_map(|path| Self::try_load(path))
                .unwrap_or_else(|| {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }),
        };

        config.apply_env().context("Failed to apply LOG_* environment")?;
        config.validate()?;
        Ok(config)
    }

    /// Config files tried by [`Config::load`], in order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("logbus.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("logbus").join("logbus.yml"));
        }
        paths
    }

    /// Check settings that only fail once a sink is built
    pub fn validate(&self) -> Result<()> {
        if let Some(file) = &self.file {
            file.roll_policy()?;
        }
        Ok(())
    }

    /// Defaults overlaid with the environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `LOG_*` environment variables onto this configuration
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(events) = env_var(ENV_EVENTS) {
            self.events = events
                .parse()
                .with_context(|| format!("Invalid {}", ENV_EVENTS))?;
        }
        if let Some(value) = env_bool(ENV_USE_COLOR)? {
            self.output.use_color = Some(value);
        }
        if let Some(value) = env_bool(ENV_SHOW_TIME)? {
            self.output.show_timestamp = value;
        }
        if let Some(value) = env_bool(ENV_SHOW_LABEL)? {
            self.output.show_label = value;
        }
        if let Some(label) = env_var(ENV_LABEL) {
            self.output.label = label;
        }
        if let Some(format) = env_var(ENV_TIME_FORMAT) {
            self.output.time_format = format;
        }

        if let Some(path) = env_var(ENV_OUT_FILE) {
            match &mut self.file {
                Some(file) => file.path = PathBuf::from(path),
                None => self.file = Some(FileConfig::new(path)),
            }
        }
        if let Some(path) = env_var(ENV_ERR_FILE) {
            let file = self
                .file
                .as_mut()
                .ok_or_else(|| eyre!("{} requires {} or a configured file", ENV_ERR_FILE, ENV_OUT_FILE))?;
            file.error_path = Some(PathBuf::from(path));
        }

        if let Some(file) = self.file.as_mut() {
            if let Some(size) = env_var(ENV_FILE_MAX_SIZE) {
                parse_size(&size).with_context(|| format!("Invalid {}", ENV_FILE_MAX_SIZE))?;
                file.max_size = size;
            }
            if let Some(count) = env_var(ENV_FILE_MAX_ARCHIVES) {
                file.max_archives = count
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid {}: '{}'", ENV_FILE_MAX_ARCHIVES, count))?;
            }
            if let Some(compress) = env_bool(ENV_FILE_COMPRESS)? {
                file.compress = compress;
            }
        }
        Ok(())
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Load a fallback file, skipping it with a warning when unreadable
    fn try_load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Config::load: skipping config");
                None
            }
        }
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Line formatting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// ANSI colors; defaults to on for streams and off for files
    #[serde(rename = "use-color")]
    pub use_color: Option<bool>,

    #[serde(rename = "show-timestamp")]
    pub show_timestamp: bool,

    #[serde(rename = "show-label")]
    pub show_label: bool,

    /// Application label
    pub label: String,

    /// strftime format for timestamps
    #[serde(rename = "time-format")]
    pub time_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            use_color: None,
            show_timestamp: true,
            show_label: false,
            label: String::new(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl OutputConfig {
    /// Build the line format, using `color_default` when colors were not set explicitly
    pub fn line_format(&self, color_default: bool) -> LineFormat {
        LineFormat {
            use_color: self.use_color.unwrap_or(color_default),
            show_timestamp: self.show_timestamp,
            show_label: self.show_label,
            label: self.label.clone(),
            time_format: self.time_format.clone(),
        }
    }
}

/// Rolling file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Active output file
    pub path: PathBuf,

    /// Separate file for error lines
    #[serde(rename = "error-path", default)]
    pub error_path: Option<PathBuf>,

    /// Rotation threshold such as `10mb`; `0` disables rotation
    #[serde(rename = "max-size", default = "default_max_size")]
    pub max_size: String,

    /// Archive generations to keep; `0` keeps all
    #[serde(rename = "max-archives", default)]
    pub max_archives: u32,

    /// Gzip archives
    #[serde(default)]
    pub compress: bool,
}

fn default_max_size() -> String {
    "10mb".to_string()
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            error_path: None,
            max_size: default_max_size(),
            max_archives: 0,
            compress: false,
        }
    }

    pub fn roll_policy(&self) -> Result<RollPolicy> {
        let max_size = parse_size(&self.max_size).context("Invalid file max-size")?;
        Ok(RollPolicy::new(max_size, self.max_archives).compressed(self.compress))
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    env_var(name).map(|value| parse_bool(&value).ok_or_else(|| eyre!("Invalid {}: '{}'", name, value))).transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
