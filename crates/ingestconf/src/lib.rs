//! Configuration loading for the MIDI ingest service.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ingestconf::IngestConfig;
//!
//! let config = IngestConfig::load().expect("Failed to load config");
//! println!("Uploads: {}", config.paths.upload_dir.display());
//! println!("Listening on {}", config.bind.address());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/midi-ingest/config.toml` (system)
//! 2. `~/.config/midi-ingest/config.toml` (user)
//! 3. `./midi-ingest.toml` (local override, replaced by `--config` when given)
//! 4. Environment variables (`MIDI_INGEST_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! upload_dir = "~/.local/share/midi-ingest/uploads"
//!
//! [bind]
//! host = "127.0.0.1"
//! http_port = 3000
//!
//! [queue]
//! workers = 2
//! max_files_per_upload = 10
//! event_capacity = 256
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = "127.0.0.1:4317"
//! ```

pub mod infra;
pub mod loader;

pub use infra::{BindConfig, PathsConfig, QueueSettings, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl IngestConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` stand in for `./midi-ingest.toml`.
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = IngestConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_from_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# MIDI ingest configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "upload_dir = \"{}\"\n",
            self.paths.upload_dir.display()
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", self.bind.host));
        output.push_str(&format!("http_port = {}\n", self.bind.http_port));

        output.push_str("\n[queue]\n");
        output.push_str(&format!("workers = {}\n", self.queue.workers));
        output.push_str(&format!(
            "max_files_per_upload = {}\n",
            self.queue.max_files_per_upload
        ));
        output.push_str(&format!(
            "event_capacity = {}\n",
            self.queue.event_capacity
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));
        match &self.telemetry.otlp_endpoint {
            Some(endpoint) => output.push_str(&format!("otlp_endpoint = \"{}\"\n", endpoint)),
            None => output.push_str("# otlp_endpoint = \"127.0.0.1:4317\"\n"),
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.bind.http_port, 3000);
        assert_eq!(config.queue.workers, 2);
        assert_eq!(config.queue.max_files_per_upload, 10);
        assert!(config.telemetry.otlp_endpoint.is_none());
    }

    #[test]
    fn test_to_toml() {
        let toml = IngestConfig::default().to_toml();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[bind]"));
        assert!(toml.contains("[queue]"));
        assert!(toml.contains("workers = 2"));
    }

    #[test]
    fn to_toml_reads_back_identically() {
        let mut config = IngestConfig::default();
        config.bind.http_port = 8123;
        config.telemetry.otlp_endpoint = Some("collector:4317".to_string());

        let mut reloaded = IngestConfig::default();
        loader::apply_toml(&mut reloaded, &config.to_toml(), Path::new("rendered.toml")).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_defaults() {
        // Load should work even with no config files
        let config = IngestConfig::load().unwrap();
        assert!(config.queue.workers >= 1);
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queue]\nmax_files_per_upload = 3").unwrap();

        let (config, sources) = IngestConfig::load_with_sources_from(Some(file.path())).unwrap();
        assert_eq!(config.queue.max_files_per_upload, 3);
        assert_eq!(sources.files.last().map(PathBuf::as_path), Some(file.path()));
    }
}
