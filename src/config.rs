use std::{
    fmt, io,
    ops::Not,
    path::{Path, PathBuf},
};

use eframe::egui;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    alarm::{SAMPLE_RATE, TONE_DURATION_MS, TONE_FREQUENCY},
    countdown::DEFAULT_TIMER_SECONDS,
};

const APP_NAME: &str = "focus_timer";
const DEFAULT_SOUND: &str = "Alarm_Clock_Beep.mp3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't find a home directory to keep the config in")]
    NoHome,
    #[error("couldn't access config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Not for Theme {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl From<Theme> for egui::Visuals {
    fn from(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self::dark(),
            Theme::Light => Self::light(),
        }
    }
}

/// how the alarm gets played
#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AlarmStrategy {
    /// run an external player on the sound file
    External,
    /// decode the sound file ourselves
    SoundFile,
    /// synthesize a sine beep
    #[default]
    Tone,
}

impl AlarmStrategy {
    pub const ALL: [Self; 3] = [Self::Tone, Self::SoundFile, Self::External];
}

impl fmt::Display for AlarmStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::External => "external player",
            Self::SoundFile => "sound file",
            Self::Tone => "tone",
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AlarmConfig {
    pub strategy: AlarmStrategy,
    /// command line of the external player, the sound file is appended
    pub player: String,
    pub sound: PathBuf,
    pub frequency: f32,
    pub sample_rate: u32,
    pub duration_ms: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            strategy: AlarmStrategy::default(),
            player: "aplay".to_string(),
            sound: Config::sounds_path().map_or_else(
                || PathBuf::from("assets/audio").join(DEFAULT_SOUND),
                |sounds| sounds.join(DEFAULT_SOUND),
            ),
            frequency: TONE_FREQUENCY,
            sample_rate: SAMPLE_RATE,
            duration_ms: TONE_DURATION_MS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// what the duration entry starts out with
    pub duration: u32,
    pub volume: u8,
    /// chrono format string for the time the alarm will ring at
    pub time_format: String,
    pub theme: Theme,
    pub alarm: AlarmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration: DEFAULT_TIMER_SECONDS,
            volume: 50,
            time_format: "%l:%M:%S %p".to_string(),
            theme: Theme::Dark,
            alarm: AlarmConfig::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// if the file can't be read or isn't a valid config
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&config)?)
    }

    /// loads the config, a missing config is not an error
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("{e}, using defaults");
            Self::default()
        })
    }

    /// the config to run the app with, not being able to locate the config
    /// file only costs the saved settings
    #[must_use]
    pub fn for_run(path: Result<PathBuf, ConfigError>) -> Self {
        match path {
            Ok(path) => Self::load_or_default(&path),
            Err(e) => {
                log::warn!("{e}, using defaults");
                Self::default()
            }
        }
    }

    /// # Errors
    /// if the config dir can't be created or the file can't be written
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = toml::to_string(self)?;
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, config).map_err(io_error)
    }

    /// # Errors
    /// if there is no home directory
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let mut path = directories::ProjectDirs::from("", "", APP_NAME)
            .ok_or(ConfigError::NoHome)?
            .config_dir()
            .to_path_buf();
        path.push("config.toml");
        Ok(path)
    }

    #[must_use]
    pub fn sounds_path() -> Option<PathBuf> {
        let mut path = directories::ProjectDirs::from("", "", APP_NAME)?
            .data_dir()
            .to_path_buf();
        path.push("sounds");
        Some(path)
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().is_ok_and(|path| path.exists())
    }
}
