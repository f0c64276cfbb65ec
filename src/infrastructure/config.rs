// Monitor configuration loading and validation
use crate::application::monitor_service::MonitorSettings;
use crate::application::monitor_session::SessionSettings;
use crate::application::telemetry_stores::{StoreCapacities, DEFAULT_CAPACITY};
use crate::domain::chart::DEFAULT_TIME_FORMAT;
use crate::domain::telemetry::Thresholds;
use anyhow::ensure;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub server: ServerSettings,
    pub stores: StoreSettings,
    pub thresholds: ThresholdSettings,
    pub persistence: PersistenceSettings,
    pub session: SessionConfig,
    pub chart: ChartSettings,
    pub metadata: MetadataSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub window_capacity: usize,
    pub fault_capacity: usize,
    pub event_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdSettings {
    pub speed_max: f64,
    pub rpm_max: f64,
    pub engine_temp_max: f64,
    pub fuel_level_min: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceSettings {
    pub enabled: bool,
    pub dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartSettings {
    pub time_format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetadataSettings {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_ms: u64,
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let defaults = Thresholds::default();
    builder
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("stores.window_capacity", DEFAULT_CAPACITY as u64)?
        .set_default("stores.fault_capacity", DEFAULT_CAPACITY as u64)?
        .set_default("stores.event_capacity", DEFAULT_CAPACITY as u64)?
        .set_default("thresholds.speed_max", defaults.speed_max)?
        .set_default("thresholds.rpm_max", defaults.rpm_max)?
        .set_default("thresholds.engine_temp_max", defaults.engine_temp_max)?
        .set_default("thresholds.fuel_level_min", defaults.fuel_level_min)?
        .set_default("persistence.enabled", true)?
        .set_default("persistence.dir", "data")?
        .set_default("session.idle_timeout_secs", 0u64)?
        .set_default("chart.time_format", DEFAULT_TIME_FORMAT)?
        .set_default("metadata.timeout_ms", 2000u64)
}

/// Load from `config/monitor.*` (optional) and `MONITOR__*` environment variables
pub fn load_monitor_config() -> anyhow::Result<MonitorConfig> {
    let settings = with_defaults(Config::builder())?
        .add_source(File::with_name("config/monitor").required(false))
        .add_source(
            Environment::with_prefix("MONITOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: MonitorConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

impl MonitorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.stores.window_capacity >= 1, "stores.window_capacity must be at least 1");
        ensure!(self.stores.fault_capacity >= 1, "stores.fault_capacity must be at least 1");
        ensure!(self.stores.event_capacity >= 1, "stores.event_capacity must be at least 1");
        ensure!(
            !self.chart.time_format.trim().is_empty(),
            "chart.time_format must not be empty"
        );
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.server.bind.parse()?)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            session: SessionSettings {
                capacities: StoreCapacities {
                    window: self.stores.window_capacity,
                    faults: self.stores.fault_capacity,
                    events: self.stores.event_capacity,
                },
                default_thresholds: Thresholds {
                    speed_max: self.thresholds.speed_max,
                    rpm_max: self.thresholds.rpm_max,
                    engine_temp_max: self.thresholds.engine_temp_max,
                    fuel_level_min: self.thresholds.fuel_level_min,
                },
                time_format: self.chart.time_format.clone(),
            },
            idle_timeout: match self.session.idle_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata.timeout_ms)
    }
}
