//! Configuration sections. All of these are fixed for the life of the process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where accepted uploads are written.
    /// Default: ~/.local/share/midi-ingest/uploads
    #[serde(default = "PathsConfig::default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl PathsConfig {
    fn default_upload_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/midi-ingest/uploads"))
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: Self::default_upload_dir(),
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Default: 127.0.0.1
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// Default: 3000
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_http_port() -> u16 {
        3000
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Processing queue and notification limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Worker pool size. Default: 2
    #[serde(default = "QueueSettings::default_workers")]
    pub workers: usize,

    /// Files accepted per upload request. Default: 10
    #[serde(default = "QueueSettings::default_max_files_per_upload")]
    pub max_files_per_upload: usize,

    /// Notifications buffered per subscriber before it starts missing them. Default: 256
    #[serde(default = "QueueSettings::default_event_capacity")]
    pub event_capacity: usize,
}

impl QueueSettings {
    fn default_workers() -> usize {
        2
    }

    fn default_max_files_per_upload() -> usize {
        10
    }

    fn default_event_capacity() -> usize {
        256
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            max_files_per_upload: Self::default_max_files_per_upload(),
            event_capacity: Self::default_event_capacity(),
        }
    }
}

/// Logging and optional OTLP export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive (trace, debug, info, warn, error, or a full EnvFilter string).
    /// Default: info,midi_ingest=debug
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,

    /// OTLP gRPC endpoint. Export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info,midi_ingest=debug".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            otlp_endpoint: None,
        }
    }
}
