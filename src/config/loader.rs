//! Configuration File Loading
//!
//! Finds the configuration file in the usual locations, parses TOML or JSON,
//! applies `P4*` environment overrides and validates the result.

use super::{utils, Config};
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "P4WIRE_CONFIG";

/// Configuration file loader
pub struct ConfigLoader {
    /// Search paths for configuration files (without extension)
    search_paths: Vec<PathBuf>,
    /// Supported configuration file formats
    supported_formats: Vec<ConfigFormat>,
    /// Current configuration file path (if loaded)
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Whether to fall back to defaults if no file exists
    pub create_default: bool,
    /// Whether to apply `P4PORT`, `P4USER`, ... overrides
    pub apply_env: bool,
    /// Whether to validate configuration after loading
    pub validate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            create_default: true,
            apply_env: true,
            validate: true,
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            search_paths: Self::get_search_paths(),
            supported_formats: vec![ConfigFormat::Toml, ConfigFormat::Json],
            current_path: None,
        }
    }

    /// Load configuration with default options
    pub fn load() -> Result<Config> {
        Self::new().load_with_options(&LoadOptions::default())
    }

    /// Load configuration from an explicit file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let format = utils::get_config_format(path).unwrap_or(ConfigFormat::Toml);
        let mut config = Self::new().load_config_file(path, format)?;
        apply_env_overrides(&mut config, |key| env::var(key).ok());
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration with custom options
    pub fn load_with_options(&mut self, options: &LoadOptions) -> Result<Config> {
        let mut config = match self.find_and_load_config()? {
            Some((path, config)) => {
                info!("Loaded configuration from {}", path.display());
                self.current_path = Some(path);
                config
            }
            None if options.create_default => {
                debug!("No configuration file found, using defaults");
                Config::default()
            }
            None => return Err(Error::ConfigNotFound),
        };

        if options.apply_env {
            apply_env_overrides(&mut config, |key| env::var(key).ok());
        }
        if options.validate {
            validate_config(&config)?;
        }
        Ok(config)
    }

    /// Save configuration to a specific path; format follows the extension
    pub fn save_to_path(&self, config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let format = utils::get_config_format(path).unwrap_or(ConfigFormat::Toml);
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
                Error::ConfigSerializationFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                }
            })?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| Error::ConfigSerializationFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        fs::write(path, content)?;
        Ok(())
    }

    /// Find and load configuration from search paths
    fn find_and_load_config(&self) -> Result<Option<(PathBuf, Config)>> {
        if let Ok(explicit) = env::var(CONFIG_ENV) {
            let path = PathBuf::from(explicit);
            let format = utils::get_config_format(&path).unwrap_or(ConfigFormat::Toml);
            return self
                .load_config_file(&path, format)
                .map(|config| Some((path, config)));
        }

        for base in &self.search_paths {
            for format in &self.supported_formats {
                let config_path = base.with_extension(format.extension());
                if !config_path.exists() {
                    continue;
                }
                match self.load_config_file(&config_path, *format) {
                    Ok(config) => return Ok(Some((config_path, config))),
                    Err(e) => {
                        warn!(
                            "Failed to load config from {}: {}",
                            config_path.display(),
                            e
                        );
                    }
                }
            }
        }

        Ok(None)
    }

    /// Load a specific configuration file
    fn load_config_file(&self, path: &Path, format: ConfigFormat) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        match format {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                format: format.name().to_string(),
                reason: e.to_string(),
            }),
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Get default search paths for configuration files
    fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("p4wire").join("config"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".p4wire").join("config"));
        }

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd.join("p4wire"));
        }

        paths
    }

    /// Get the current configuration file path
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// List all search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Clear all search paths and add a single path
    pub fn set_search_path(&mut self, path: PathBuf) {
        self.search_paths = vec![path];
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlay `P4PORT`, `P4USER`, `P4CLIENT`, `P4PASSWD` and `P4TICKET`
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let connection = &mut config.connection;
    let fields: [(&str, &mut Option<String>); 5] = [
        ("P4PORT", &mut connection.port),
        ("P4USER", &mut connection.user),
        ("P4CLIENT", &mut connection.client),
        ("P4PASSWD", &mut connection.password),
        ("P4TICKET", &mut connection.ticket),
    ];
    for (key, field) in fields {
        if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
            debug!("Using {} from environment", key);
            *field = Some(value);
        }
    }
}

/// Upper bound for the close wait and kill grace periods
const MAX_CLOSE_WAIT_MS: u64 = 3_600_000;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.connection.executable.trim().is_empty() {
        return Err(Error::ConfigValidationFailed {
            field: "connection.executable".to_string(),
            reason: "Executable path cannot be empty".to_string(),
        });
    }

    if config.session.timeout_ms == 0 {
        return Err(Error::ConfigValidationFailed {
            field: "session.timeout_ms".to_string(),
            reason: "Timeout must be greater than 0".to_string(),
        });
    }

    if config.session.timeout_ms > 3_600_000 {
        return Err(Error::ConfigValidationFailed {
            field: "session.timeout_ms".to_string(),
            reason: "Timeout cannot exceed 1 hour".to_string(),
        });
    }

    if config.session.page_size == 0 {
        return Err(Error::ConfigValidationFailed {
            field: "session.page_size".to_string(),
            reason: "Page size must be greater than 0".to_string(),
        });
    }

    if config.session.max_partition_depth == 0 {
        return Err(Error::ConfigValidationFailed {
            field: "session.max_partition_depth".to_string(),
            reason: "Partition depth must be at least 1".to_string(),
        });
    }

    if config.session.close_wait_ms > MAX_CLOSE_WAIT_MS {
        return Err(Error::ConfigValidationFailed {
            field: "session.close_wait_ms".to_string(),
            reason: "Close wait cannot exceed 1 hour".to_string(),
        });
    }

    if config.session.kill_grace_ms > MAX_CLOSE_WAIT_MS {
        return Err(Error::ConfigValidationFailed {
            field: "session.kill_grace_ms".to_string(),
            reason: "Kill grace period cannot exceed 1 hour".to_string(),
        });
    }

    if config.cache.ttl_secs == 0 {
        return Err(Error::ConfigValidationFailed {
            field: "cache.ttl_secs".to_string(),
            reason: "Cache TTL must be greater than 0".to_string(),
        });
    }

    Ok(())
}
