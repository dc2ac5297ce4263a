//! TOML-based application configuration.
//!
//! Stores the inputs the stopwatch consumes:
//! - Hold duration, phase count and tick rate
//! - Swipe distance threshold
//! - Display precision (final and while running)
//! - Inspection and haptic preferences
//! - Active puzzle and session
//!
//! Configuration is stored at `~/.config/cubetimer/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gesture::DEFAULT_SWIPE_THRESHOLD;
use crate::record::SessionRef;
use crate::scramble::Puzzle;
use crate::sink::HapticIntensity;

/// Returns `~/.config/cubetimer[-dev]/` based on CUBETIMER_ENV.
///
/// Set CUBETIMER_ENV=dev to use the development data directory.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CUBETIMER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("cubetimer-dev")
    } else {
        base_dir.join("cubetimer")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DirUnavailable(e.to_string()))?;
    Ok(dir)
}

/// Decimal places shown for a time, or nothing at all.
///
/// Stored as an integer: `-1` hides the time, `0..=3` are decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Precision {
    Hidden,
    Decimals(u8),
}

impl TryFrom<i8> for Precision {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Precision::Hidden),
            0..=3 => Ok(Precision::Decimals(value as u8)),
            other => Err(format!("precision must be -1 or 0..=3, got {other}")),
        }
    }
}

impl From<Precision> for i8 {
    fn from(value: Precision) -> Self {
        match value {
            Precision::Hidden => -1,
            Precision::Decimals(d) => d as i8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Seconds a press must be held before the timer arms.
    #[serde(default = "default_hold_duration")]
    pub hold_duration_secs: f64,
    /// Number of phases in a multi-phase solve. 1 disables splits.
    #[serde(default = "default_phases")]
    pub phases: u8,
    /// Display refresh rate while timing.
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Net displacement beyond which a release counts as a swipe.
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Precision of a finished time.
    #[serde(default = "default_precision")]
    pub precision: Precision,
    /// Precision while the clock runs; `-1` hides the running time.
    #[serde(default = "default_precision")]
    pub running_precision: Precision,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Show remaining inspection time instead of elapsed.
    #[serde(default)]
    pub counts_down: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HapticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub intensity: HapticIntensity,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/cubetimer/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionRef,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub inspection: InspectionConfig,
    #[serde(default)]
    pub haptics: HapticsConfig,
    #[serde(default)]
    pub puzzle: Puzzle,
}

// Default functions
fn default_hold_duration() -> f64 {
    0.5
}
fn default_phases() -> u8 {
    1
}
fn default_tick_rate() -> u32 {
    60
}
fn default_swipe_threshold() -> f64 {
    DEFAULT_SWIPE_THRESHOLD
}
fn default_precision() -> Precision {
    Precision::Decimals(3)
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            hold_duration_secs: default_hold_duration(),
            phases: default_phases(),
            tick_rate_hz: default_tick_rate(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            swipe_threshold: default_swipe_threshold(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            running_precision: default_precision(),
        }
    }
}

impl Default for HapticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: HapticIntensity::default(),
        }
    }
}

/// The subset of [`Config`] the stopwatch engine consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct StopwatchConfig {
    pub hold_duration: Duration,
    pub swipe_threshold: f64,
    pub phases: u8,
    pub tick_interval: Duration,
    pub precision: Precision,
    pub running_precision: Precision,
    pub inspection: bool,
    pub inspection_counts_down: bool,
    /// `None` disables the arming pulse.
    pub haptics: Option<HapticIntensity>,
    pub puzzle: Puzzle,
    pub session: SessionRef,
}

impl Default for StopwatchConfig {
    fn default() -> Self {
        Config::default().stopwatch()
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load and validate a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The result is validated before it
    /// replaces `self`; nothing is written to disk.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };

        if !(0.05..=1.0).contains(&self.timer.hold_duration_secs) {
            return invalid("timer.hold_duration_secs", "must be between 0.05 and 1.0");
        }
        if !(1..=8).contains(&self.timer.phases) {
            return invalid("timer.phases", "must be between 1 and 8");
        }
        if !(1..=240).contains(&self.timer.tick_rate_hz) {
            return invalid("timer.tick_rate_hz", "must be between 1 and 240");
        }
        if !(1.0..=300.0).contains(&self.gesture.swipe_threshold) {
            return invalid("gesture.swipe_threshold", "must be between 1 and 300");
        }
        if self.display.precision == Precision::Hidden {
            return invalid("display.precision", "a finished time cannot be hidden");
        }
        Ok(())
    }

    /// Project onto the engine's settings. Fields are public and may be set
    /// without validation, so an unrepresentable hold falls back to the
    /// default.
    pub fn stopwatch(&self) -> StopwatchConfig {
        let hold_duration = Duration::try_from_secs_f64(self.timer.hold_duration_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_hold_duration()));
        StopwatchConfig {
            hold_duration,
            swipe_threshold: self.gesture.swipe_threshold,
            phases: self.timer.phases.max(1),
            tick_interval: Duration::from_secs_f64(1.0 / self.timer.tick_rate_hz.max(1) as f64),
            precision: self.display.precision,
            running_precision: self.display.running_precision,
            inspection: self.inspection.enabled,
            inspection_counts_down: self.inspection.counts_down,
            haptics: self.haptics.enabled.then_some(self.haptics.intensity),
            puzzle: self.puzzle,
            session: self.session.clone(),
        }
    }
}
