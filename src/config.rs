//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::enrich::Weighting;
use crate::poller::Intervals;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Stats endpoint polled every cycle
    #[serde(default = "default_stats_url")]
    pub stats_url: String,
    /// Per-request timeout; unset leaves the HTTP client's default in place
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            stats_url: default_stats_url(),
            request_timeout_secs: None,
        }
    }
}

fn default_stats_url() -> String {
    "http://127.0.0.1:8080/api/stats".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Wait after a failed cycle (default: interval + 50%)
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_backoff_secs() -> u64 {
    15
}

impl PollingConfig {
    pub fn intervals(&self) -> Intervals {
        Intervals::new(
            Duration::from_secs(self.interval_secs),
            Duration::from_secs(self.backoff_secs),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoProvider {
    Http,
    Maxmind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoIpConfig {
    #[serde(default = "default_geo_provider")]
    pub provider: GeoProvider,
    /// Per-IP lookup endpoint for the `http` provider
    #[serde(default = "default_geo_url")]
    pub url: String,
    /// GeoLite2-City database for the `maxmind` provider
    #[serde(default = "default_geo_database")]
    pub database: String,
    /// Fixes synthetic coordinates for local and unresolvable addresses
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            provider: default_geo_provider(),
            url: default_geo_url(),
            database: default_geo_database(),
            seed: None,
        }
    }
}

fn default_geo_provider() -> GeoProvider {
    GeoProvider::Http
}

fn default_geo_url() -> String {
    "http://127.0.0.1:8080/api/ipgeo".to_string()
}

fn default_geo_database() -> String {
    "data/GeoLite2-City.mmdb".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightingMode {
    Fixed,
    Relative,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_weighting")]
    pub weighting: WeightingMode,
    /// Divisor for `fixed` weighting
    #[serde(default = "default_divisor")]
    pub divisor: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            weighting: default_weighting(),
            divisor: default_divisor(),
        }
    }
}

fn default_weighting() -> WeightingMode {
    WeightingMode::Fixed
}

fn default_divisor() -> f64 {
    10.0
}

impl MapConfig {
    pub fn weighting(&self) -> Weighting {
        match self.weighting {
            WeightingMode::Fixed => Weighting::Fixed(self.divisor),
            WeightingMode::Relative => Weighting::RelativeToMax,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Dashboard assets served under `/static`
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            http_port: default_http_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "static".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load `config.toml` (or `$TRAFFIC_DASHBOARD_CONFIG`) overlaid with
    /// `TRAFFIC_DASHBOARD__*` environment variables. A missing file is fine.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRAFFIC_DASHBOARD_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("TRAFFIC_DASHBOARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.source.stats_url.is_empty() {
            anyhow::bail!("Stats URL cannot be empty");
        }
        if self.source.request_timeout_secs == Some(0) {
            anyhow::bail!("Invalid request_timeout_secs: 0 is not allowed");
        }

        // Polling intervals
        if self.polling.interval_secs == 0 {
            anyhow::bail!("Invalid polling interval: 0 is not allowed");
        }
        if self.polling.backoff_secs < self.polling.interval_secs {
            anyhow::bail!(
                "Backoff interval ({}s) must not be shorter than the polling interval ({}s)",
                self.polling.backoff_secs,
                self.polling.interval_secs
            );
        }

        match self.geoip.provider {
            GeoProvider::Http if self.geoip.url.is_empty() => {
                anyhow::bail!("GeoIP URL cannot be empty for the http provider");
            }
            GeoProvider::Maxmind if self.geoip.database.is_empty() => {
                anyhow::bail!("GeoIP database path cannot be empty for the maxmind provider");
            }
            _ => {}
        }

        if self.map.weighting == WeightingMode::Fixed
            && !(self.map.divisor.is_finite() && self.map.divisor > 0.0)
        {
            anyhow::bail!("Invalid map divisor {}: must be positive", self.map.divisor);
        }

        if self.server.enabled {
            if self.server.http_port == 0 {
                anyhow::bail!("Invalid http_port: 0 is not allowed");
            }
            if self.server.host.is_empty() {
                anyhow::bail!("Server host cannot be empty");
            }
        }

        // Validate logging level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();

        let intervals = config.polling.intervals();
        assert_eq!(intervals.normal, Duration::from_secs(10));
        assert_eq!(intervals.backoff, Duration::from_secs(15));
        assert_eq!(config.map.weighting(), Weighting::Fixed(10.0));
        assert_eq!(config.geoip.provider, GeoProvider::Http);
    }

    #[test]
    fn backoff_shorter_than_interval_is_rejected() {
        let mut config = Config::default();
        config.polling.interval_secs = 10;
        config.polling.backoff_secs = 5;
        assert!(config.validate().is_err());

        config.polling.backoff_secs = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_interval_and_bad_divisor_are_rejected() {
        let mut config = Config::default();
        config.polling.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.map.divisor = 0.0;
        assert!(config.validate().is_err());
        config.map.weighting = WeightingMode::Relative;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_sections_override_defaults() {
        let toml = r#"
            [polling]
            interval_secs = 5
            backoff_secs = 20

            [geoip]
            provider = "maxmind"
            seed = 42

            [map]
            weighting = "relative"
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        config.validate().unwrap();
        assert_eq!(config.polling.intervals().normal, Duration::from_secs(5));
        assert_eq!(config.geoip.provider, GeoProvider::Maxmind);
        assert_eq!(config.geoip.seed, Some(42));
        assert_eq!(config.map.weighting(), Weighting::RelativeToMax);
        assert_eq!(config.source.stats_url, default_stats_url());
    }
}
