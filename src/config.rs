use std::fs;
use std::path::Path;

use ::config::{File, FileFormat};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;

const DEFAULT_BROKER_PORT: u16 = 1883;
const DEFAULT_BROKER_QOS: u8 = 1;

/// Persisted supervisor configuration. Every field always resolves to a
/// value: either the persisted one or a hard-coded default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub gui: GuiConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuiConfig {
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Delivery-guarantee level handed through to broker clients, 0-2.
    pub broker_qos: u8,
    pub broker_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gui: GuiConfig { debug: false },
            network: NetworkConfig {
                broker_qos: DEFAULT_BROKER_QOS, // at-least-once
                broker_port: DEFAULT_BROKER_PORT,
            },
        }
    }
}

/// What an on-disk file may contain. Any key can be absent; each one falls
/// back to its default independently of the others.
#[derive(Debug, Deserialize)]
struct PartialConfig {
    #[serde(alias = "GUI")]
    gui: Option<PartialGui>,
    #[serde(alias = "NETWORK")]
    network: Option<PartialNetwork>,
}

#[derive(Debug, Deserialize)]
struct PartialGui {
    debug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PartialNetwork {
    broker_qos: Option<String>,
    broker_port: Option<String>,
}

impl Config {
    /// Retrieves the stored configuration, or creates a new config file from
    /// defaults if none exists yet. An existing file is never rewritten.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!("no configuration file detected, generating default config file");
            let config = Config::default();
            config.persist(path)?;
            return Ok(config);
        }

        Self::read_from_file(path)
    }

    fn read_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::from_io(path, e))?;

        let parsed = ::config::Config::builder()
            .add_source(File::from_str(&raw, FileFormat::Ini))
            .build()
            .map_err(|e| ConfigError::Os(format!("{}: {}", path.display(), e)))?;
        let partial: PartialConfig = parsed
            .try_deserialize()
            .map_err(|e| ConfigError::Os(format!("{}: {}", path.display(), e)))?;

        Ok(Self::from_partial(partial))
    }

    fn from_partial(partial: PartialConfig) -> Self {
        let default = Config::default();

        Self {
            gui: GuiConfig {
                debug: partial
                    .gui
                    .as_ref()
                    .and_then(|g| g.debug.as_deref())
                    .and_then(parse_bool)
                    .unwrap_or(default.gui.debug),
            },
            network: NetworkConfig {
                broker_qos: partial
                    .network
                    .as_ref()
                    .and_then(|n| n.broker_qos.as_deref())
                    .and_then(parse_qos)
                    .unwrap_or(default.network.broker_qos),
                broker_port: partial
                    .network
                    .as_ref()
                    .and_then(|n| n.broker_port.as_deref())
                    .and_then(|raw| raw.trim().parse().ok())
                    .unwrap_or(default.network.broker_port),
            },
        }
    }

    /// Whole-buffer write through a temp file, so a failure mid-write never
    /// leaves a partial config on disk.
    fn persist(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|e| ConfigError::from_io(path, e))?;
            }
        }

        let tmp = path.with_extension("ini.tmp");
        fs::write(&tmp, self.to_ini()).map_err(|e| ConfigError::from_io(path, e))?;
        fs::rename(&tmp, path).map_err(|e| ConfigError::from_io(path, e))?;
        Ok(())
    }

    fn to_ini(&self) -> String {
        format!(
            "[GUI]\ndebug={}\n\n[NETWORK]\nbroker_qos={}\nbroker_port={}\n",
            if self.gui.debug { "True" } else { "False" },
            self.network.broker_qos,
            self.network.broker_port,
        )
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_qos(raw: &str) -> Option<u8> {
    let qos = raw.trim().parse::<u8>().ok()?;
    if qos <= 2 {
        Some(qos)
    } else {
        warn!("persisted broker_qos {qos} is out of range, falling back to default");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configparser_style_booleans() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn rejects_out_of_range_qos() {
        assert_eq!(parse_qos("0"), Some(0));
        assert_eq!(parse_qos("2"), Some(2));
        assert_eq!(parse_qos("3"), None);
        assert_eq!(parse_qos("-1"), None);
    }
}
