//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `calord.toml` in the working directory. Control tunables and
//! timing have defaults so a minimal file only declares the room/cycle
//! topology. Environment variables take precedence over file values.

use serde::Deserialize;

use calor_domain::cycle::Cycle;
use calor_domain::id::{CycleId, RoomId};
use calor_domain::room::{Room, WarmingParams};
use calor_domain::tunables::ControlTunables;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control tunables, operator-editable.
    pub control: ControlTunables,
    /// Timer-loop cadence.
    pub timing: TimingConfig,
    /// Data directory for queue/archive/grids/snapshots.
    pub paths: PathsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Heated rooms.
    pub rooms: Vec<RoomConfig>,
    /// Water-circulation loops.
    pub cycles: Vec<CycleConfig>,
}

/// Loop cadence configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Seconds between control cycles.
    pub cycle_interval_secs: u64,
    /// Seconds between remote sync polls.
    pub sync_poll_secs: u64,
}

/// Filesystem locations.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding all persisted records.
    pub data_dir: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One room as declared in the TOML file.
#[derive(Debug, Deserialize)]
pub struct RoomConfig {
    pub id: u8,
    pub name: String,
    pub cycle: u8,
    #[serde(default)]
    pub sensor: Option<String>,
    #[serde(default)]
    pub valves: Vec<String>,
    #[serde(default)]
    pub presence_sensor: Option<String>,
    #[serde(default = "default_controlled")]
    pub controlled: bool,
    #[serde(default)]
    pub warming: Option<WarmingParams>,
    #[serde(default = "default_weight")]
    pub weekly_cycle_weight: f64,
    #[serde(default = "default_in_threshold")]
    pub in_threshold: f64,
    #[serde(default = "default_threshold_temp")]
    pub threshold_temp: f64,
}

fn default_controlled() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

fn default_in_threshold() -> f64 {
    0.5
}

fn default_threshold_temp() -> f64 {
    19.0
}

/// One cycle as declared in the TOML file.
#[derive(Debug, Deserialize)]
pub struct CycleConfig {
    pub id: u8,
    pub name: String,
    pub pump: String,
    pub rooms: Vec<u8>,
}

impl Config {
    /// Load configuration from `calord.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or the
    /// declared topology is inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("calord.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CALORD_DATA_DIR") {
            self.paths.data_dir = val;
        }
        if let Ok(val) = std::env::var("CALORD_CYCLE_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.timing.cycle_interval_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("CALORD_SYNC_POLL_SECS") {
            if let Ok(secs) = val.parse() {
                self.timing.sync_poll_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("CALORD_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.cycle_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "cycle_interval_secs must be non-zero".to_string(),
            ));
        }
        for room in &self.rooms {
            if !self.cycles.iter().any(|c| c.id == room.cycle) {
                return Err(ConfigError::Validation(format!(
                    "room {} references undeclared cycle {}",
                    room.id, room.cycle
                )));
            }
        }
        for cycle in &self.cycles {
            for room in &cycle.rooms {
                if !self.rooms.iter().any(|r| r.id == *room) {
                    return Err(ConfigError::Validation(format!(
                        "cycle {} references undeclared room {room}",
                        cycle.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the domain rooms from the declared topology.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Domain`] when a room violates its invariants.
    pub fn rooms(&self) -> Result<Vec<Room>, ConfigError> {
        self.rooms
            .iter()
            .map(|rc| {
                let mut builder = Room::builder()
                    .id(RoomId::new(rc.id))
                    .name(&rc.name)
                    .cycle(CycleId::new(rc.cycle))
                    .controlled(rc.controlled)
                    .weekly_cycle_weight(rc.weekly_cycle_weight)
                    .in_threshold(rc.in_threshold)
                    .threshold_temp(rc.threshold_temp);
                if let Some(sensor) = &rc.sensor {
                    builder = builder.sensor(sensor);
                }
                for valve in &rc.valves {
                    builder = builder.valve(valve);
                }
                if let Some(presence) = &rc.presence_sensor {
                    builder = builder.presence_sensor(presence);
                }
                if let Some(warming) = rc.warming {
                    builder = builder.warming(warming);
                }
                builder
                    .build()
                    .map_err(|err| ConfigError::Domain(err.to_string()))
            })
            .collect()
    }

    /// Build the domain cycles from the declared topology.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Domain`] when a cycle violates its invariants.
    pub fn cycles(&self) -> Result<Vec<Cycle>, ConfigError> {
        self.cycles
            .iter()
            .map(|cc| {
                let mut builder = Cycle::builder()
                    .id(CycleId::new(cc.id))
                    .name(&cc.name)
                    .pump(&cc.pump);
                for room in &cc.rooms {
                    builder = builder.room(RoomId::new(*room));
                }
                builder
                    .build()
                    .map_err(|err| ConfigError::Domain(err.to_string()))
            })
            .collect()
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 60,
            sync_poll_secs: 5,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "calord=info,calor=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// A declared room or cycle violates domain invariants.
    #[error("invalid topology: {0}")]
    Domain(String),
}
