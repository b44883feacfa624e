//! Application-level configuration loading: operator identity, file locations and round pacing.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::{ParticipantId, SelectionPolicy};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CROWDPLAY_BACK_CONFIG_PATH";
/// Environment variable that overrides the configured operator.
const OPERATOR_ENV: &str = "CROWDPLAY_OPERATOR_ID";

const DEFAULT_ROM_DIR: &str = "roms";
const DEFAULT_SAVE_PATH: &str = "saves/save.state";
const DEFAULT_FRAME_PATH: &str = "temp/curr_frame.ppm";
const DEFAULT_ROUND_TICKS: u32 = 15;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_FRAMES_PER_TICK: u32 = 60;
const DEFAULT_HOLD_TICKS: u32 = 2;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    operator_id: Option<ParticipantId>,
    rom_dir: PathBuf,
    save_path: PathBuf,
    frame_path: PathBuf,
    round_ticks: u32,
    tick_interval: Duration,
    frames_per_tick: u32,
    hold_ticks: u32,
    initial_policy: SelectionPolicy,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    ///
    /// `CROWDPLAY_OPERATOR_ID` wins over the operator listed in the file.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        round_ticks = app_config.round_ticks,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_operator_from_env()
    }

    fn with_operator_from_env(mut self) -> Self {
        if let Some(raw) = env::var(OPERATOR_ENV).ok().filter(|value| !value.is_empty()) {
            match raw.parse::<ParticipantId>() {
                Ok(id) => self.operator_id = Some(id),
                Err(err) => warn!(error = %err, "ignoring {OPERATOR_ENV}"),
            }
        }
        if self.operator_id.is_none() {
            warn!("no operator configured; administrative actions will be refused");
        }
        self
    }

    /// Replace the operator allowed to run administrative actions.
    pub fn with_operator(mut self, operator: ParticipantId) -> Self {
        self.operator_id = Some(operator);
        self
    }

    /// Relocate the ROM directory, save file and frame file under `root`.
    pub fn with_storage_root(mut self, root: &Path) -> Self {
        self.rom_dir = root.join(DEFAULT_ROM_DIR);
        self.save_path = root.join(DEFAULT_SAVE_PATH);
        self.frame_path = root.join(DEFAULT_FRAME_PATH);
        self
    }

    /// Operator allowed to run administrative actions, if any.
    pub fn operator_id(&self) -> Option<ParticipantId> {
        self.operator_id
    }

    /// Directory holding the loadable ROM files.
    pub fn rom_dir(&self) -> &Path {
        &self.rom_dir
    }

    /// Single well-known save file.
    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// File the current frame is exported to.
    pub fn frame_path(&self) -> &Path {
        &self.frame_path
    }

    /// Ticks in one democracy round.
    pub fn round_ticks(&self) -> u32 {
        self.round_ticks
    }

    /// Wall-clock length of one tick.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Engine frames emulated per tick.
    pub fn frames_per_tick(&self) -> u32 {
        self.frames_per_tick
    }

    /// Engine steps a pressed button stays held.
    pub fn hold_ticks(&self) -> u32 {
        self.hold_ticks
    }

    /// Policy a fresh process starts with.
    pub fn initial_policy(&self) -> SelectionPolicy {
        self.initial_policy
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            operator_id: None,
            rom_dir: PathBuf::from(DEFAULT_ROM_DIR),
            save_path: PathBuf::from(DEFAULT_SAVE_PATH),
            frame_path: PathBuf::from(DEFAULT_FRAME_PATH),
            round_ticks: DEFAULT_ROUND_TICKS,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            frames_per_tick: DEFAULT_FRAMES_PER_TICK,
            hold_ticks: DEFAULT_HOLD_TICKS,
            initial_policy: SelectionPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    operator_id: Option<String>,
    rom_dir: Option<PathBuf>,
    save_path: Option<PathBuf>,
    frame_path: Option<PathBuf>,
    round_ticks: Option<u32>,
    tick_interval_ms: Option<u64>,
    frames_per_tick: Option<u32>,
    hold_ticks: Option<u32>,
    initial_policy: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();

        let operator_id = value.operator_id.and_then(|raw| match raw.parse() {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(error = %err, "ignoring configured operator_id");
                None
            }
        });
        let initial_policy = value
            .initial_policy
            .and_then(|raw| match raw.parse() {
                Ok(policy) => Some(policy),
                Err(err) => {
                    warn!(error = %err, "ignoring configured initial_policy");
                    None
                }
            })
            .unwrap_or(defaults.initial_policy);

        Self {
            operator_id,
            rom_dir: value.rom_dir.unwrap_or(defaults.rom_dir),
            save_path: value.save_path.unwrap_or(defaults.save_path),
            frame_path: value.frame_path.unwrap_or(defaults.frame_path),
            round_ticks: value
                .round_ticks
                .filter(|&ticks| ticks > 0)
                .unwrap_or(defaults.round_ticks),
            tick_interval: value
                .tick_interval_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            frames_per_tick: value.frames_per_tick.unwrap_or(defaults.frames_per_tick),
            hold_ticks: value.hold_ticks.unwrap_or(defaults.hold_ticks),
            initial_policy,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = serde_json::from_str::<RawConfig>("{}").unwrap().into();
        assert_eq!(config.operator_id(), None);
        assert_eq!(config.round_ticks(), 15);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.frames_per_tick(), 60);
        assert_eq!(config.hold_ticks(), 2);
        assert_eq!(config.save_path(), Path::new("saves/save.state"));
        assert_eq!(config.initial_policy(), SelectionPolicy::Democracy);
    }

    #[test]
    fn parses_every_field() {
        let raw = r#"{
            "operator_id": "418986435144581130",
            "rom_dir": "/srv/roms",
            "round_ticks": 5,
            "tick_interval_ms": 250,
            "initial_policy": "anarchy"
        }"#;
        let config: AppConfig = serde_json::from_str::<RawConfig>(raw).unwrap().into();
        assert_eq!(
            config.operator_id(),
            Some(ParticipantId(418_986_435_144_581_130))
        );
        assert_eq!(config.rom_dir(), Path::new("/srv/roms"));
        assert_eq!(config.round_ticks(), 5);
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.initial_policy(), SelectionPolicy::Anarchy);
    }

    #[test]
    fn invalid_values_fall_back() {
        let raw = r#"{"operator_id": "nobody", "round_ticks": 0, "initial_policy": "chaos"}"#;
        let config: AppConfig = serde_json::from_str::<RawConfig>(raw).unwrap().into();
        assert_eq!(config.operator_id(), None);
        assert_eq!(config.round_ticks(), 15);
        assert_eq!(config.initial_policy(), SelectionPolicy::Democracy);
    }

    #[test]
    fn storage_root_moves_every_path() {
        let config = AppConfig::default().with_storage_root(Path::new("/tmp/run"));
        assert_eq!(config.rom_dir(), Path::new("/tmp/run/roms"));
        assert_eq!(config.save_path(), Path::new("/tmp/run/saves/save.state"));
        assert_eq!(config.frame_path(), Path::new("/tmp/run/temp/curr_frame.ppm"));
    }
}
