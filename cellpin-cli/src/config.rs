// ABOUTME: Configuration file loading, validation, and hierarchical merging for cellpin
// ABOUTME: TOML files from XDG locations, overridden by flags, resolved into run settings

use anyhow::{anyhow, Context, Result};
use cellpin_sdk::constants::{timeouts, transfer};
use cellpin_sdk::render::check_renderable;
use cellpin_sdk::{Geometry, StoreOptions};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;

pub const DEFAULT_COLUMNS: u32 = 10;
pub const DEFAULT_ROWS: u32 = 5;

/// Placeholders substituted into a converter command
pub const INPUT_PLACEHOLDER: &str = "{input}";
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub columns: Option<u32>,
    #[serde(default)]
    pub rows: Option<u32>,
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
    #[serde(default)]
    pub drain_timeout_ms: Option<u64>,
    #[serde(default, deserialize_with = "validate_chunk_size")]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub progress_interval: Option<usize>,
    #[serde(default)]
    pub row_colors: Option<bool>,
    #[serde(default)]
    pub converter: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from the standard locations
    pub fn load() -> Result<Self> {
        let paths = Self::get_config_paths();
        Self::load_from_paths(&paths)
    }

    /// Load and merge files in order; later paths override earlier ones.
    /// Missing files are skipped, unreadable or invalid ones are errors.
    pub fn load_from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut config = Config::default();

        for path in paths {
            if !path.as_ref().exists() {
                continue;
            }
            log::debug!("loading config from {}", path.as_ref().display());
            config = config.merge(Self::load_from_file(path)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse TOML config file: {}",
                path.as_ref().display()
            )
        })?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Standard config file paths in order of increasing precedence
    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".config").join("cellpin").join("config.toml"));
        }

        if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(config_home).join("cellpin").join("config.toml"));
        }

        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join("cellpin.toml"));
        }

        if let Some(explicit) = std::env::var_os("CELLPIN_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }

        paths.dedup();
        paths
    }

    /// Merge this config with another, giving precedence to the other config
    pub fn merge(self, other: Config) -> Config {
        Config {
            columns: other.columns.or(self.columns),
            rows: other.rows.or(self.rows),
            response_timeout_ms: other.response_timeout_ms.or(self.response_timeout_ms),
            drain_timeout_ms: other.drain_timeout_ms.or(self.drain_timeout_ms),
            chunk_size: other.chunk_size.or(self.chunk_size),
            progress_interval: other.progress_interval.or(self.progress_interval),
            row_colors: other.row_colors.or(self.row_colors),
            converter: other.converter.or(self.converter),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        if self.columns == Some(0) || self.rows == Some(0) {
            return Err(anyhow!("columns and rows must be at least 1"));
        }
        if self.response_timeout_ms == Some(0) || self.drain_timeout_ms == Some(0) {
            return Err(anyhow!("timeouts must be at least 1 ms"));
        }
        if self.progress_interval == Some(0) {
            return Err(anyhow!("progress_interval must be at least 1"));
        }
        if let Some(ref converter) = self.converter {
            validate_converter(converter).context("Invalid converter configuration")?;
        }

        Ok(())
    }

    /// Combine this configuration with command-line flags and built-in defaults
    pub fn resolve(&self, cli: &Cli) -> Result<Settings> {
        let columns = cli.columns.or(self.columns).unwrap_or(DEFAULT_COLUMNS);
        let rows = cli.rows.or(self.rows).unwrap_or(DEFAULT_ROWS);
        let geometry = Geometry::new(columns, rows)?;
        let row_colors = !cli.no_row_colors && self.row_colors.unwrap_or(true);
        check_renderable(geometry, row_colors)?;

        let response_timeout = cli
            .timeout
            .or(self.response_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(timeouts::RESPONSE_TIMEOUT);
        let drain_timeout = self
            .drain_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(timeouts::DRAIN_TIMEOUT);

        let store = StoreOptions::builder()
            .response_timeout(response_timeout)
            .chunk_size(self.chunk_size.unwrap_or(transfer::CHUNK_SIZE))
            .progress_interval(self.progress_interval.unwrap_or(transfer::PROGRESS_INTERVAL))
            .force_upload(cli.force_upload)
            .build();

        Ok(Settings {
            geometry,
            row_colors,
            drain_timeout,
            converter: self.converter.clone(),
            store,
        })
    }
}

/// Everything one invocation needs, after flags, files, and defaults are applied
#[derive(Debug, Clone)]
pub struct Settings {
    pub geometry: Geometry,
    pub row_colors: bool,
    pub drain_timeout: Duration,
    pub converter: Option<Vec<String>>,
    pub store: StoreOptions,
}

fn validate_converter(argv: &[String]) -> Result<()> {
    let Some(program) = argv.first() else {
        return Err(anyhow!("converter command is empty"));
    };
    if program.contains(INPUT_PLACEHOLDER) || program.contains(OUTPUT_PLACEHOLDER) {
        return Err(anyhow!("converter program cannot be a placeholder"));
    }
    for placeholder in [INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER] {
        if !argv.iter().any(|arg| arg.contains(placeholder)) {
            return Err(anyhow!("converter command must mention {}", placeholder));
        }
    }
    Ok(())
}

// Chunk payloads are base64 text, so a chunk must hold whole 4-byte groups
fn validate_chunk_size<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Option<usize> = Option::deserialize(deserializer)?;
    match value {
        Some(size) if size == 0 || size % 4 != 0 => Err(D::Error::custom(format!(
            "Invalid chunk_size {}. Must be a positive multiple of 4",
            size
        ))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["cellpin"];
        argv.extend_from_slice(args);
        argv.push("cat.png");
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_config() {
        let settings = Config::default().resolve(&cli(&[])).unwrap();
        assert_eq!(settings.geometry, Geometry::new(10, 5).unwrap());
        assert!(settings.row_colors);
        assert_eq!(settings.drain_timeout, timeouts::DRAIN_TIMEOUT);
        assert_eq!(settings.store.response_timeout, timeouts::RESPONSE_TIMEOUT);
        assert_eq!(settings.store.chunk_size, transfer::CHUNK_SIZE);
        assert!(settings.converter.is_none());
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            columns: Some(30),
            rows: Some(12),
            response_timeout_ms: Some(500),
            row_colors: Some(true),
            ..Default::default()
        };
        let settings = config
            .resolve(&cli(&["-c", "4", "--timeout", "900", "--no-row-colors"]))
            .unwrap();

        assert_eq!(settings.geometry, Geometry::new(4, 12).unwrap());
        assert_eq!(settings.store.response_timeout, Duration::from_millis(900));
        assert!(!settings.row_colors);
    }

    #[test]
    fn test_unrenderable_geometry_fails_before_any_upload() {
        let err = Config::default().resolve(&cli(&["-r", "300"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<cellpin_sdk::Error>(),
            Some(cellpin_sdk::Error::InvalidGeometry { rows: 300, .. })
        ));

        let plain = Config::default()
            .resolve(&cli(&["-r", "300", "--no-row-colors"]))
            .unwrap();
        assert_eq!(plain.geometry.rows(), 300);

        let colored_off = Config {
            row_colors: Some(false),
            ..Default::default()
        };
        assert!(colored_off.resolve(&cli(&["-r", "300"])).is_ok());
    }

    #[test]
    fn test_oversized_geometry_is_rejected() {
        assert!(Config::default().resolve(&cli(&["-c", "5000"])).is_err());
    }

    #[test]
    fn test_force_upload_reaches_store_options() {
        let settings = Config::default().resolve(&cli(&["--force-upload"])).unwrap();
        assert!(settings.store.force_upload);
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = Config {
            columns: Some(10),
            chunk_size: Some(1024),
            ..Default::default()
        };
        let other = Config {
            columns: Some(20),
            ..Default::default()
        };
        let merged = base.merge(other);
        assert_eq!(merged.columns, Some(20));
        assert_eq!(merged.chunk_size, Some(1024));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        for config in [
            Config {
                rows: Some(0),
                ..Default::default()
            },
            Config {
                response_timeout_ms: Some(0),
                ..Default::default()
            },
            Config {
                progress_interval: Some(0),
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_converter_needs_both_placeholders() {
        let ok = vec![
            "magick".to_string(),
            "{input}".to_string(),
            "png:{output}".to_string(),
        ];
        assert!(validate_converter(&ok).is_ok());
        assert!(validate_converter(&[]).is_err());
        assert!(validate_converter(&["convert".to_string(), "{input}".to_string()]).is_err());
        assert!(validate_converter(&["{input}".to_string(), "{output}".to_string()]).is_err());
    }

    #[test]
    fn test_chunk_size_must_be_base64_aligned() {
        assert!(toml::from_str::<Config>("chunk_size = 4096").is_ok());
        assert!(toml::from_str::<Config>("chunk_size = 1000").is_ok());
        assert!(toml::from_str::<Config>("chunk_size = 1001").is_err());
        assert!(toml::from_str::<Config>("chunk_size = 0").is_err());
    }
}
