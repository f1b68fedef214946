//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, IngestConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations, optionally with a CLI override path.
///
/// Returns paths in load order (system, user, local). Only returns files that
/// exist. If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/midi-ingest/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("midi-ingest/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("midi-ingest.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay the keys it sets onto `config`.
pub fn load_from_file(config: &mut IngestConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay keys present in `contents`. Absent keys leave `config` untouched,
/// which is what makes later files win field by field.
pub fn apply_toml(config: &mut IngestConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let invalid = |key: &str, expected: &str| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("{key} must be {expected}"),
    };

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("upload_dir").and_then(|v| v.as_str()) {
            config.paths.upload_dir = expand_path(v);
        }
    }

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("host").and_then(|v| v.as_str()) {
            config.bind.host = v.to_string();
        }
        if let Some(v) = bind.get("http_port").and_then(|v| v.as_integer()) {
            config.bind.http_port =
                u16::try_from(v).map_err(|_| invalid("bind.http_port", "a port number"))?;
        }
    }

    if let Some(queue) = table.get("queue").and_then(|v| v.as_table()) {
        if let Some(v) = queue.get("workers").and_then(|v| v.as_integer()) {
            config.queue.workers =
                positive(v).ok_or_else(|| invalid("queue.workers", "a positive integer"))?;
        }
        if let Some(v) = queue.get("max_files_per_upload").and_then(|v| v.as_integer()) {
            config.queue.max_files_per_upload = positive(v)
                .ok_or_else(|| invalid("queue.max_files_per_upload", "a positive integer"))?;
        }
        if let Some(v) = queue.get("event_capacity").and_then(|v| v.as_integer()) {
            config.queue.event_capacity = positive(v)
                .ok_or_else(|| invalid("queue.event_capacity", "a positive integer"))?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
        if let Some(v) = telemetry.get("otlp_endpoint").and_then(|v| v.as_str()) {
            config.telemetry.otlp_endpoint = Some(v.to_string());
        }
    }

    Ok(())
}

fn positive(v: i64) -> Option<usize> {
    usize::try_from(v).ok().filter(|n| *n > 0)
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut IngestConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit variable list. Unparseable numbers are ignored.
pub fn apply_overrides_from<I>(config: &mut IngestConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let applied = match key.as_str() {
            "MIDI_INGEST_UPLOAD_DIR" => {
                config.paths.upload_dir = expand_path(&value);
                true
            }
            "MIDI_INGEST_BIND_HOST" => {
                config.bind.host = value;
                true
            }
            "MIDI_INGEST_HTTP_PORT" => value
                .parse()
                .map(|port| config.bind.http_port = port)
                .is_ok(),
            "MIDI_INGEST_WORKERS" => value
                .parse()
                .ok()
                .and_then(positive)
                .map(|n| config.queue.workers = n)
                .is_some(),
            "MIDI_INGEST_MAX_FILES" => value
                .parse()
                .ok()
                .and_then(positive)
                .map(|n| config.queue.max_files_per_upload = n)
                .is_some(),
            "MIDI_INGEST_EVENT_CAPACITY" => value
                .parse()
                .ok()
                .and_then(positive)
                .map(|n| config.queue.event_capacity = n)
                .is_some(),
            "MIDI_INGEST_LOG_LEVEL" | "RUST_LOG" => {
                config.telemetry.log_level = value;
                true
            }
            "MIDI_INGEST_OTLP_ENDPOINT" | "OTEL_EXPORTER_OTLP_ENDPOINT" => {
                config.telemetry.otlp_endpoint = Some(value);
                true
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files_with_override(None);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let mut config = IngestConfig::default();
        apply_toml(
            &mut config,
            "[paths]\nupload_dir = \"/custom/uploads\"\n",
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(config.paths.upload_dir, PathBuf::from("/custom/uploads"));
        assert_eq!(config.bind.http_port, 3000);
        assert_eq!(config.queue.workers, 2);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[paths]
upload_dir = "/data/uploads"

[bind]
host = "0.0.0.0"
http_port = 9000

[queue]
workers = 4
max_files_per_upload = 25
event_capacity = 64

[telemetry]
log_level = "debug"
otlp_endpoint = "127.0.0.1:4317"
"#;
        let mut config = IngestConfig::default();
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.paths.upload_dir, PathBuf::from("/data/uploads"));
        assert_eq!(config.bind.address(), "0.0.0.0:9000");
        assert_eq!(config.queue.workers, 4);
        assert_eq!(config.queue.max_files_per_upload, 25);
        assert_eq!(config.queue.event_capacity, 64);
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.telemetry.otlp_endpoint.as_deref(), Some("127.0.0.1:4317"));
    }

    #[test]
    fn later_files_only_override_keys_they_set() {
        let mut config = IngestConfig::default();
        apply_toml(&mut config, "[queue]\nworkers = 6\n", Path::new("a.toml")).unwrap();
        apply_toml(&mut config, "[bind]\nhttp_port = 4000\n", Path::new("b.toml")).unwrap();
        assert_eq!(config.queue.workers, 6);
        assert_eq!(config.bind.http_port, 4000);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = IngestConfig::default();
        let err = apply_toml(&mut config, "[queue]\nworkers = 0\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("queue.workers"));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let mut config = IngestConfig::default();
        let err = apply_toml(&mut config, "[queue\nworkers=", Path::new("broken.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn env_overrides_apply_and_are_recorded() {
        let mut config = IngestConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[
                ("MIDI_INGEST_WORKERS", "3"),
                ("MIDI_INGEST_HTTP_PORT", "not-a-port"),
                ("MIDI_INGEST_UPLOAD_DIR", "/srv/midi"),
                ("UNRELATED", "x"),
            ]),
        );

        assert_eq!(config.queue.workers, 3);
        assert_eq!(config.bind.http_port, 3000);
        assert_eq!(config.paths.upload_dir, PathBuf::from("/srv/midi"));
        assert_eq!(
            sources.env_overrides,
            vec!["MIDI_INGEST_WORKERS", "MIDI_INGEST_UPLOAD_DIR"]
        );
    }
}
