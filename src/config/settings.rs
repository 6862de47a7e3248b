//! Configuration structs — every tunable option with its built-in default
//!
//! Each struct implements `Default` with the documented default values so a
//! missing file or key never changes behavior.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a deployment.
///
/// Load with `AppConfig::load()` which searches:
/// 1. `$RELIEFNET_CONFIG` env var
/// 2. `./reliefnet.toml`
/// 3. Built-in defaults
///
/// then applies environment-variable overrides on top.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub anomaly: AnomalyConfig,

    #[serde(default)]
    pub sitrep: SitrepConfig,

    #[serde(default)]
    pub models: ModelConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load configuration using the standard search order, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_env_overrides();
        config
    }

    fn load_file() -> Self {
        if let Ok(path) = std::env::var("RELIEFNET_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from RELIEFNET_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from RELIEFNET_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "RELIEFNET_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("reliefnet.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./reliefnet.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./reliefnet.toml, using defaults");
                }
            }
        }

        info!("No reliefnet.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Overlay environment variables on the loaded values. Env always wins.
    fn apply_env_overrides(&mut self) {
        let ing = &mut self.ingestion;
        env_override("OPENWEATHERMAP_API_KEY", &mut ing.openweathermap_api_key);
        env_override("WEATHER_POLL_INTERVAL_S", &mut ing.weather_poll_interval_s);
        env_override("GDACS_POLL_INTERVAL_S", &mut ing.gdacs_poll_interval_s);
        env_override("USGS_MIN_MAGNITUDE", &mut ing.usgs_min_magnitude);
        env_override("USGS_POLL_INTERVAL_S", &mut ing.usgs_poll_interval_s);
        env_override("FIRMS_API_KEY", &mut ing.firms_api_key);
        env_override("FIRMS_SOURCE", &mut ing.firms_source);
        env_override("FIRMS_POLL_INTERVAL_S", &mut ing.firms_poll_interval_s);
        env_override("TWITTER_BEARER_TOKEN", &mut ing.twitter_bearer_token);
        env_override("SOCIAL_POLL_INTERVAL_S", &mut ing.social_poll_interval_s);
        env_override("INGESTION_ENABLED", &mut ing.enabled);
        env_override("MAX_EVENTS_PER_POLL", &mut ing.max_events_per_poll);
        env_override("MOCK_SEED", &mut ing.mock_seed);
        if let Ok(kw) = std::env::var("SOCIAL_KEYWORDS") {
            ing.social_keywords = kw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        let alerts = &mut self.alerts;
        env_override("SENDGRID_API_KEY", &mut alerts.sendgrid_api_key);
        env_override("SENDGRID_FROM_EMAIL", &mut alerts.from_email);
        if let Ok(threshold) = std::env::var("ALERT_SEVERITY_THRESHOLD") {
            match serde_json::from_value(serde_json::Value::String(threshold.clone())) {
                Ok(sev) => alerts.severity_threshold = sev,
                Err(_) => warn!(value = %threshold, "Invalid ALERT_SEVERITY_THRESHOLD — keeping default"),
            }
        }

        let anomaly = &mut self.anomaly;
        env_override("ANOMALY_DETECTION_INTERVAL_S", &mut anomaly.interval_s);
        env_override("ANOMALY_CONTAMINATION", &mut anomaly.contamination);
        env_override("ANOMALY_MIN_SAMPLES", &mut anomaly.min_samples);
        env_override("ANOMALY_LOOKBACK_HOURS", &mut anomaly.lookback_hours);

        let sitrep = &mut self.sitrep;
        env_override("SITREP_CRON_HOUR_UTC", &mut sitrep.cron_hour_utc);
        env_override("SITREP_EMAIL_ENABLED", &mut sitrep.email_enabled);
        if let Ok(emails) = std::env::var("SITREP_ADMIN_EMAILS") {
            sitrep.admin_emails = emails
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        let models = &mut self.models;
        env_override("AUTO_RETRAIN_THRESHOLD_MAE", &mut models.retrain_threshold_mae);
        env_override(
            "AUTO_RETRAIN_THRESHOLD_ACCURACY",
            &mut models.retrain_threshold_accuracy,
        );

        env_override("RELIEFNET_DATA_DIR", &mut self.store.data_dir);
    }
}

/// Parse an env var into `target` if present and valid; warn on junk.
fn env_override<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => warn!(key, value = %raw, "Unparseable env override — keeping previous value"),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

// ============================================================================
// Ingestion
// ============================================================================

/// Feed polling options. Interval defaults follow each upstream's natural
/// publish cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Master switch for all feed loops.
    pub enabled: bool,
    /// Cap on events accepted per poll cycle per feed.
    pub max_events_per_poll: usize,
    /// Seed for the deterministic mock generator.
    pub mock_seed: u64,

    // ── OpenWeatherMap ──
    pub openweathermap_api_key: String,
    pub openweathermap_base_url: String,
    pub weather_poll_interval_s: u64,

    // ── GDACS ──
    pub gdacs_rss_url: String,
    pub gdacs_poll_interval_s: u64,

    // ── USGS earthquakes ──
    pub usgs_feed_url: String,
    pub usgs_min_magnitude: f64,
    pub usgs_poll_interval_s: u64,

    // ── NASA FIRMS ──
    pub firms_api_key: String,
    pub firms_base_url: String,
    pub firms_source: String,
    pub firms_poll_interval_s: u64,

    // ── Social media ──
    pub twitter_bearer_token: String,
    pub social_keywords: Vec<String>,
    pub social_poll_interval_s: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_events_per_poll: 50,
            mock_seed: 42,
            openweathermap_api_key: String::new(),
            openweathermap_base_url: "https://api.openweathermap.org/data/2.5".into(),
            weather_poll_interval_s: 600,
            gdacs_rss_url: "https://www.gdacs.org/xml/rss.xml".into(),
            gdacs_poll_interval_s: 900,
            usgs_feed_url:
                "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_hour.geojson".into(),
            usgs_min_magnitude: 4.0,
            usgs_poll_interval_s: 300,
            firms_api_key: String::new(),
            firms_base_url: "https://firms.modaps.eosdis.nasa.gov/api/area/csv".into(),
            firms_source: "VIIRS_SNPP_NRT".into(),
            firms_poll_interval_s: 1800,
            twitter_bearer_token: String::new(),
            social_keywords: [
                "SOS",
                "help needed",
                "disaster",
                "earthquake",
                "flood",
                "rescue",
                "emergency relief",
                "trapped",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            social_poll_interval_s: 300,
        }
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// Notification dispatch options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Events are dispatched only when severity equals this level.
    pub severity_threshold: crate::types::Severity,
    /// Email provider API key; log-only fallback when empty.
    pub sendgrid_api_key: String,
    pub sendgrid_endpoint: String,
    pub from_email: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            severity_threshold: crate::types::Severity::Critical,
            sendgrid_api_key: String::new(),
            sendgrid_endpoint: "https://api.sendgrid.com/v3/mail/send".into(),
            from_email: "alerts@reliefnet.org".into(),
        }
    }
}

// ============================================================================
// Anomaly Detection
// ============================================================================

/// Isolation-forest anomaly detection options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub interval_s: u64,
    /// Expected anomaly rate in the observed series.
    pub contamination: f64,
    /// Minimum rows per metric family before the detector runs.
    pub min_samples: usize,
    /// Base lookback window; series cover `3 * lookback_hours`.
    pub lookback_hours: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            interval_s: 3600,
            contamination: 0.05,
            min_samples: 20,
            lookback_hours: 48,
        }
    }
}

// ============================================================================
// Situation Reports
// ============================================================================

/// Daily situation-report task options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitrepConfig {
    /// Hour of day (UTC) the daily report is generated.
    pub cron_hour_utc: u32,
    pub email_enabled: bool,
    pub admin_emails: Vec<String>,
}

impl Default for SitrepConfig {
    fn default() -> Self {
        Self {
            cron_hour_utc: 6,
            email_enabled: false,
            admin_emails: Vec::new(),
        }
    }
}

// ============================================================================
// Models
// ============================================================================

/// Serving-model quality gates for the retrain trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Regressors above this MAE need retraining.
    pub retrain_threshold_mae: f64,
    /// Classifiers below this accuracy need retraining.
    pub retrain_threshold_accuracy: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            retrain_threshold_mae: 0.3,
            retrain_threshold_accuracy: 0.6,
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Embedded store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".into(),
        }
    }
}
