use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::models::*;

pub fn load<P: AsRef<Path>>(config_path: P) -> Arc<Config> {
    let config_path = config_path.as_ref();
    let reader = File::open(config_path).unwrap_or_else(|err| {
        panic!("Failed to open {}: {}", config_path.display(), err);
    });
    let config: Config = serde_yaml::from_reader(reader).unwrap_or_else(|err| {
        panic!("Failed to parse {}: {}", config_path.display(), err);
    });

    config.validate();

    tracing::debug!(
        config.ip_channels.len = config.ip_channels.len(),
        config.simulator.frontends.len = config.simulator.frontends.len(),
        config.simulator.services.len = config.simulator.services.len(),
        "Loaded config"
    );
    Arc::new(config)
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub ip_channels: Vec<IpChannel>,
    #[serde(default)]
    pub last_watched: LastWatchedConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Config {
    fn validate(&self) {
        self.ip_channels
            .iter()
            .enumerate()
            .for_each(|(i, channel)| {
                assert!(
                    !channel.name.is_empty(),
                    "config.ip-channels[{}]: `name` must be a non-empty string",
                    i
                );
            });
        self.last_watched.validate();
        self.simulator.validate();
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct LastWatchedConfig {
    /// The last watched channel is kept in memory if not specified.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LastWatchedConfig {
    fn validate(&self) {
        if let Some(file) = self.file.as_ref() {
            assert!(
                !file.is_dir(),
                "config.last-watched: `file` must not be a directory"
            );
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub frontends: Vec<FrontendConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub epg: SimulatorEpgConfig,
}

impl SimulatorConfig {
    fn validate(&self) {
        self.frontends
            .iter()
            .enumerate()
            .for_each(|(i, config)| config.validate(i));
        self.services
            .iter()
            .enumerate()
            .for_each(|(i, config)| config.validate(i));
        self.epg.validate();
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FrontendConfig {
    pub types: Vec<SourceType>,
}

impl FrontendConfig {
    fn validate(&self, index: usize) {
        assert!(
            !self.types.is_empty(),
            "config.simulator.frontends[{}]: `types` must be a non-empty list",
            index
        );
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,
    pub source_type: SourceType,
}

impl ServiceConfig {
    fn validate(&self, index: usize) {
        assert!(
            !self.name.is_empty(),
            "config.simulator.services[{}]: `name` must be a non-empty string",
            index
        );
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SimulatorEpgConfig {
    #[serde(default = "SimulatorEpgConfig::default_event_duration")]
    #[serde(with = "humantime_serde")]
    pub event_duration: Duration,
}

impl SimulatorEpgConfig {
    fn default_event_duration() -> Duration {
        Duration::from_secs(30 * 60)
    }

    fn validate(&self) {
        assert!(
            !self.event_duration.is_zero(),
            "config.simulator.epg: `event-duration` must be larger than 0"
        );
    }
}

impl Default for SimulatorEpgConfig {
    fn default() -> Self {
        SimulatorEpgConfig {
            event_duration: Self::default_event_duration(),
        }
    }
}
