use crate::dnrgb::DEFAULT_WAIT_TIME;
use crate::effect::EffectKind;
use crate::error::{HubError, Result};
use crate::wled::REALTIME_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Load environment variables from a `.env` file in the working directory.
/// Values may contain spaces without quotes. Variables already present in the
/// environment win.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            // SAFETY: called from main before the runtime starts any threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), unquote(value.trim())))
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub wled: WledConfig,
    pub led_count: usize,
    pub gears: Vec<GearConfig>,
    pub sensor_bind: String,
    pub effect: EffectKind,
    pub presets: PresetConfig,
    pub watchdog: WatchdogSettings,
    /// Period of the per-sensor packet count log, if enabled.
    pub diagnostics_interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WledConfig {
    /// Host name or IP of the controller.
    pub address: String,
    pub realtime_port: u16,
    pub wait_time: u32,
}

/// A gear and the sensor that drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearConfig {
    pub sensor_id: i32,
    pub sensitivity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetConfig {
    pub idle: u8,
    pub charged: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogSettings {
    /// `None` disables the watchdog.
    pub timeout: Option<Duration>,
    /// Shell command run when sensors go missing.
    pub restart_command: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| HubError::Config(format!("{} is not set", key)))
        };

        let wled = WledConfig {
            address: required("WLED_ADDRESS")?,
            realtime_port: parse_or(&lookup, "WLED_REALTIME_PORT", REALTIME_PORT)?,
            wait_time: DEFAULT_WAIT_TIME,
        };
        let led_count: usize = parse_value("LED_COUNT", &required("LED_COUNT")?)?;
        if led_count == 0 {
            return Err(HubError::Config("LED_COUNT must be positive".into()));
        }
        let gears = parse_gears(&required("GEARS")?)?;

        let watchdog_secs: u64 = parse_or(&lookup, "WATCHDOG_TIMEOUT_SECS", 180)?;
        let diagnostics_secs: Option<u64> = lookup("DIAGNOSTICS_INTERVAL_SECS")
            .map(|v| parse_value("DIAGNOSTICS_INTERVAL_SECS", &v))
            .transpose()?;

        Ok(Self {
            wled,
            led_count,
            gears,
            sensor_bind: lookup("SENSOR_BIND").unwrap_or_else(|| "0.0.0.0:1234".to_string()),
            effect: parse_or(&lookup, "EFFECT", EffectKind::default())?,
            presets: PresetConfig {
                idle: parse_or(&lookup, "IDLE_PRESET", 1)?,
                charged: parse_or(&lookup, "CHARGED_PRESET", 2)?,
            },
            watchdog: WatchdogSettings {
                timeout: (watchdog_secs > 0).then(|| Duration::from_secs(watchdog_secs)),
                restart_command: lookup("RESTART_COMMAND").filter(|c| !c.trim().is_empty()),
            },
            diagnostics_interval: diagnostics_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }

    pub fn sensor_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.gears.iter().map(|g| g.sensor_id)
    }
}

/// Parse `"<sensor_id>:<sensitivity>,..."`.
pub fn parse_gears(value: &str) -> Result<Vec<GearConfig>> {
    let mut gears = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, sensitivity) = entry
            .split_once(':')
            .ok_or_else(|| HubError::Config(format!("gear '{}' is not id:sensitivity", entry)))?;
        let gear = GearConfig {
            sensor_id: parse_value("GEARS", id.trim())?,
            sensitivity: parse_value("GEARS", sensitivity.trim())?,
        };
        if gears.iter().any(|g: &GearConfig| g.sensor_id == gear.sensor_id) {
            return Err(HubError::Config(format!(
                "sensor {} is assigned to more than one gear",
                gear.sensor_id
            )));
        }
        gears.push(gear);
    }
    if gears.is_empty() {
        return Err(HubError::Config("GEARS lists no gears".into()));
    }
    Ok(gears)
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| HubError::Config(format!("{}='{}': {}", key, value, e)))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => parse_value(key, value.trim()),
        None => Ok(default),
    }
}
