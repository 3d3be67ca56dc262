//! Reads and writes `~/.tankbot/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tankbot_cockpit::DEFAULT_PORT;
use tankbot_runtime::RobotConfig;
use tankbot_types::TankError;

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Port of the WebSocket control surface.
    #[serde(default = "default_cockpit_port")]
    pub cockpit_port: u16,

    /// Run against simulated hardware.
    #[serde(default = "default_mock_mode")]
    pub mock_mode: bool,

    #[serde(default)]
    pub robot: RobotConfig,
}

fn default_cockpit_port() -> u16 {
    DEFAULT_PORT
}
fn default_mock_mode() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cockpit_port: default_cockpit_port(),
            mock_mode: default_mock_mode(),
            robot: RobotConfig::default(),
        }
    }
}

pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tankbot").join("config.toml")
}

/// Load the config file with `TANKBOT_*` overrides applied.  `Ok(None)` when
/// the file does not exist yet.
pub fn load() -> Result<Option<Config>, TankError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, TankError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| TankError::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| TankError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Apply environment overrides.
///
/// | Variable | Config field |
/// |---|---|
/// | `TANKBOT_COCKPIT_PORT` | `cockpit_port` |
/// | `TANKBOT_MOCK_MODE` | `mock_mode` (`true`/`false`/`1`/`0`) |
/// | `TANKBOT_SENSOR_POLL_MS` | `robot.sensor_poll_ms` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("TANKBOT_COCKPIT_PORT").and_then(|v| v.trim().parse().ok()) {
        cfg.cockpit_port = port;
    }
    if let Some(mock) = lookup("TANKBOT_MOCK_MODE").and_then(|v| parse_flag(&v)) {
        cfg.mock_mode = mock;
    }
    if let Some(ms) = lookup("TANKBOT_SENSOR_POLL_MS").and_then(|v| v.trim().parse().ok()) {
        cfg.robot.sensor_poll_ms = ms;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn save(cfg: &Config) -> Result<(), TankError> {
    save_to(cfg, &config_path())
}

/// Write `cfg` to `path`, owner-only on Unix.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), TankError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| TankError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                TankError::Config(format!("failed to restrict config directory: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| TankError::Config(format!("failed to serialize config: {e}")))?;
    let write_err = |e: std::io::Error| TankError::Config(format!("failed to write {}: {e}", path.display()));

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
