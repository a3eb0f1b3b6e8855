//! Configuration loading
//!
//! Reads a console.toml from disk, or falls back to the copy embedded at
//! build time, then validates it and applies command-line overrides.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use spacedeck_core::config::{ConfigError, ConsoleConfig};

/// Default configuration, checked by build.rs
pub const EMBEDDED_CONFIG: &str = include_str!("../../console.toml");

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid console configuration: {0}")]
    Invalid(ConfigError),

    #[error("server must be host:port, got `{0}`")]
    BadServer(String),
}

/// Values from the command line that win over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub serial: Option<String>,
    /// `host:port`
    pub server: Option<String>,
}

/// Load from `path`, or from the embedded default when `None`
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<ConsoleConfig, LoadError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "loading configuration");
            parse(&text)?
        }
        None => {
            info!("using embedded configuration");
            parse(EMBEDDED_CONFIG)?
        }
    };
    apply_overrides(&mut config, overrides)?;
    Ok(config)
}

/// Parse and validate a TOML document
pub fn parse(text: &str) -> Result<ConsoleConfig, LoadError> {
    let config: ConsoleConfig = toml::from_str(text)?;
    config.validate().map_err(LoadError::Invalid)?;
    Ok(config)
}

fn apply_overrides(config: &mut ConsoleConfig, overrides: &Overrides) -> Result<(), LoadError> {
    if let Some(serial) = &overrides.serial {
        config.serial.port = serial.clone();
    }
    if let Some(server) = &overrides.server {
        let (host, port) = server
            .rsplit_once(':')
            .ok_or_else(|| LoadError::BadServer(server.clone()))?;
        let port = port
            .parse()
            .map_err(|_| LoadError::BadServer(server.clone()))?;
        if host.is_empty() {
            return Err(LoadError::BadServer(server.clone()));
        }
        config.sync.host = host.to_string();
        config.sync.port = port;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacedeck_core::config::InputRef;

    #[test]
    fn test_embedded_config_is_valid() {
        let config = parse(EMBEDDED_CONFIG).unwrap();
        assert!(!config.controls.is_empty());
        assert_eq!(config.serial.baud_rate, 115_200);

        let accel = config.controls.iter().find(|c| c.id == "accelerator").unwrap();
        assert!(accel.input.is_analog());
        assert_eq!(accel.resolved_actions()["3"], "Set accelerator to 3!");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse(
            r#"
            [[controls]]
            id = "pump"
            input = { device = "mcp20", pin = 4 }
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.port, 8000);
        assert_eq!(config.scheduler.cycle_ms, 20);
        assert_eq!(config.outputs.progress_led_count, 15);
        assert_eq!(
            config.controls[0].input,
            InputRef::Digital {
                device: "mcp20".into(),
                pin: 4
            }
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = parse(
            r#"
            [[controls]]
            id = "pump"
            input = { device = "mcp20", pin = 4 }

            [[controls]]
            id = "pump"
            input = { device = "mcp20", pin = 5 }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Invalid(ConfigError::DuplicateId(_))));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(parse("[serial"), Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_overrides() {
        let overrides = Overrides {
            serial: Some("/dev/ttyUSB3".into()),
            server: Some("deck.local:9100".into()),
        };
        let config = load(None, &overrides).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB3");
        assert_eq!(config.sync.host, "deck.local");
        assert_eq!(config.sync.port, 9100);
    }

    #[test]
    fn test_bad_server_override() {
        for server in ["nohost", ":8000", "deck:port"] {
            let overrides = Overrides {
                server: Some(server.into()),
                ..Overrides::default()
            };
            assert!(matches!(
                load(None, &overrides),
                Err(LoadError::BadServer(_))
            ));
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load(Some(Path::new("/nonexistent/console.toml")), &Overrides::default()).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }
}
