use crate::interpolation::{EdgePolicy, GridSpec, Method, Region};
use crate::platform::Platform;
use crate::probe::ProbeSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_PROBE_COUNT: u32 = 10;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_THROUGHPUT_DURATION_SECS: u64 = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "measurements";
pub const DEFAULT_RESOLUTION: usize = 100;
pub const DEFAULT_MARGIN: f64 = 0.1;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub measurement: Option<MeasurementSection>,
    #[serde(default)]
    pub interpolation: Option<InterpolationSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MeasurementSection {
    /// Platform override; detected from the build target when absent.
    pub platform: Option<String>,
    /// Wireless interface name (default depends on the platform)
    pub interface: Option<String>,
    /// Echo target; the default gateway is used when absent.
    pub target_host: Option<String>,
    pub probe_count: Option<u32>,
    pub probe_timeout_ms: Option<u64>,
    /// iperf3 server; throughput is skipped when absent.
    pub throughput_host: Option<String>,
    pub throughput_duration_secs: Option<u64>,
    /// Directory holding one JSON file per measurement
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InterpolationSection {
    pub resolution_x: Option<usize>,
    pub resolution_y: Option<usize>,
    /// Fraction of the bounding-box span added on every side
    pub margin: Option<f64>,
    pub method: Option<Method>,
    pub edge_policy: Option<EdgePolicy>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_count() == 0 {
            return Err(ConfigError::Invalid(
                "measurement.probe_count must be at least 1".to_string(),
            ));
        }
        let margin = self.margin();
        if !margin.is_finite() || margin < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "interpolation.margin must be a non-negative number, got {margin}"
            )));
        }
        let (nx, ny) = self.resolution();
        if nx < 2 || ny < 2 {
            return Err(ConfigError::Invalid(format!(
                "interpolation resolution must be at least 2x2, got {nx}x{ny}"
            )));
        }
        if let Some(platform) = self.measurement().platform.as_deref() {
            platform
                .parse::<Platform>()
                .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        Ok(())
    }

    fn measurement(&self) -> MeasurementSection {
        self.measurement.clone().unwrap_or_default()
    }

    fn interpolation(&self) -> InterpolationSection {
        self.interpolation.clone().unwrap_or_default()
    }

    /// Returns the configured platform, or the one this binary was built for.
    pub fn platform(&self) -> Option<Platform> {
        match self.measurement().platform {
            Some(name) => name.parse().ok(),
            None => Platform::current(),
        }
    }

    pub fn interface(&self) -> Option<String> {
        self.measurement().interface.filter(|name| !name.is_empty())
    }

    pub fn target_host(&self) -> Option<String> {
        self.measurement().target_host.filter(|host| !host.is_empty())
    }

    pub fn throughput_host(&self) -> Option<String> {
        self.measurement()
            .throughput_host
            .filter(|host| !host.is_empty())
    }

    /// Returns the number of echo probes per cycle (default: 10)
    pub fn probe_count(&self) -> u32 {
        self.measurement()
            .probe_count
            .unwrap_or(DEFAULT_PROBE_COUNT)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(
            self.measurement()
                .probe_timeout_ms
                .unwrap_or(DEFAULT_PROBE_TIMEOUT_MS),
        )
    }

    pub fn throughput_duration(&self) -> Duration {
        Duration::from_secs(
            self.measurement()
                .throughput_duration_secs
                .unwrap_or(DEFAULT_THROUGHPUT_DURATION_SECS),
        )
    }

    pub fn output_dir(&self) -> PathBuf {
        self.measurement()
            .output_dir
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            probe_count: self.probe_count(),
            probe_timeout: self.probe_timeout(),
            throughput_host: self.throughput_host(),
            throughput_duration: self.throughput_duration(),
        }
    }

    /// Returns the grid resolution as (columns, rows), 100x100 by default.
    pub fn resolution(&self) -> (usize, usize) {
        let section = self.interpolation();
        (
            section.resolution_x.unwrap_or(DEFAULT_RESOLUTION),
            section.resolution_y.unwrap_or(DEFAULT_RESOLUTION),
        )
    }

    pub fn margin(&self) -> f64 {
        self.interpolation().margin.unwrap_or(DEFAULT_MARGIN)
    }

    pub fn method(&self) -> Method {
        self.interpolation().method.unwrap_or_default()
    }

    pub fn edge_policy(&self) -> EdgePolicy {
        self.interpolation().edge_policy.unwrap_or_default()
    }

    /// Grid settings for the engine; the region is derived from the data.
    pub fn grid_spec(&self) -> GridSpec {
        let (resolution_x, resolution_y) = self.resolution();
        GridSpec {
            resolution_x,
            resolution_y,
            method: self.method(),
            edge_policy: self.edge_policy(),
            region: Region::Auto {
                margin: self.margin(),
            },
        }
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp(name: &str, contents: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("wifi-heatmap-{name}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn default_config_loads() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert_eq!(config.probe_count(), DEFAULT_PROBE_COUNT);
        assert_eq!(config.method(), Method::Linear);
        Ok(())
    }

    #[test]
    fn minimal_config_uses_documented_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "minimal",
            r#"
[app]
name = "wifi-heatmap"

[logging]
level = "info"
"#,
        )?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.probe_count(), 10);
        assert_eq!(config.probe_timeout(), Duration::from_millis(1000));
        assert_eq!(config.resolution(), (100, 100));
        assert_eq!(config.margin(), 0.1);
        assert_eq!(config.method(), Method::Linear);
        assert_eq!(config.edge_policy(), EdgePolicy::NearestFill);
        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(config.output_dir(), PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert!(config.throughput_host().is_none());
        Ok(())
    }

    #[test]
    fn empty_throughput_host_is_treated_as_missing() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "empty-host",
            r#"
[app]
name = "wifi-heatmap"

[logging]
level = "debug"

[measurement]
throughput_host = ""
probe_count = 4

[interpolation]
method = "cubic"
edge_policy = "leave_undefined"
resolution_x = 20
resolution_y = 30
"#,
        )?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert!(config.throughput_host().is_none());
        assert_eq!(config.probe_count(), 4);
        assert_eq!(config.method(), Method::Cubic);
        assert_eq!(config.edge_policy(), EdgePolicy::LeaveUndefined);
        assert_eq!(config.resolution(), (20, 30));
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
        Ok(())
    }

    #[test]
    fn zero_probe_count_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "zero-probes",
            r#"
[app]
name = "wifi-heatmap"

[logging]
level = "info"

[measurement]
probe_count = 0
"#,
        )?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn unknown_platform_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "bad-platform",
            r#"
[app]
name = "wifi-heatmap"

[logging]
level = "info"

[measurement]
platform = "amiga"
"#,
        )?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("wifi-heatmap-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
