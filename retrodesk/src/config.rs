use crate::error::ConfigError;
use directories::ProjectDirs;
use ratatui::style::Color;
use retrodesk_ipc::Phase;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub timer: TimerSettings,
    pub desktop: DesktopSettings,
    pub api: ApiSettings,
    pub theme: Theme,
    pub icons: Icons,
}

/// Durations are whole minutes and are read when a phase begins.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimerSettings {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub pomodoros_per_long_break: u32,
    pub auto_start_breaks: bool,
    pub sound_enabled: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            pomodoros_per_long_break: 4,
            auto_start_breaks: false,
            sound_enabled: true,
        }
    }
}

impl TimerSettings {
    pub fn minutes(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Focus => self.focus_minutes,
            Phase::ShortBreak => self.short_break_minutes,
            Phase::LongBreak => self.long_break_minutes,
        }
    }

    pub fn duration_secs(&self, phase: Phase) -> u32 {
        self.minutes(phase).saturating_mul(60)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("timer.focus_minutes", self.focus_minutes),
            ("timer.short_break_minutes", self.short_break_minutes),
            ("timer.long_break_minutes", self.long_break_minutes),
            ("timer.pomodoros_per_long_break", self.pomodoros_per_long_break),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

/// Desktop geometry, in terminal cells.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DesktopSettings {
    pub menu_bar_height: i32,
    pub min_window_width: i32,
    pub min_window_height: i32,
    pub default_window_width: i32,
    pub default_window_height: i32,
}

impl Default for DesktopSettings {
    fn default() -> Self {
        Self {
            menu_bar_height: 1,
            min_window_width: 24,
            min_window_height: 6,
            default_window_width: 48,
            default_window_height: 16,
        }
    }
}

impl DesktopSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.menu_bar_height < 0 {
            return Err(ConfigError::Invalid(
                "desktop.menu_bar_height must be >= 0".to_string(),
            ));
        }
        if self.min_window_width < 8 || self.min_window_height < 3 {
            return Err(ConfigError::Invalid(
                "desktop minimum window size must be at least 8x3".to_string(),
            ));
        }
        if self.default_window_width < self.min_window_width
            || self.default_window_height < self.min_window_height
        {
            return Err(ConfigError::Invalid(
                "desktop default window size must not be below the minimum".to_string(),
            ));
        }
        Ok(())
    }
}

/// Remote task backend. Without a `base_url` tasks live in memory.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Theme {
    #[serde(deserialize_with = "hex_to_color")]
    pub background: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub desktop: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub foreground: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub selection: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub black: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub red: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub green: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub yellow: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub blue: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub magenta: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub cyan: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub gray: Color,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Icons {
    pub play: String,
    pub pause: String,
    pub stop: String,
    pub pending: String,
    pub done: String,
    pub select: String,
    pub progress_filled: String,
    pub progress_empty: String,
    pub cycle_done: String,
    pub cycle_pending: String,
    pub input_cursor: String,
    pub separator: String,
    pub resize_handle: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Rgb(9, 14, 19),
            desktop: Color::Rgb(0, 96, 96),
            foreground: Color::Rgb(197, 201, 199),
            selection: Color::Rgb(230, 195, 132),
            black: Color::Rgb(13, 12, 12),
            red: Color::Rgb(228, 104, 118),
            green: Color::Rgb(138, 154, 123),
            yellow: Color::Rgb(196, 178, 138),
            blue: Color::Rgb(127, 180, 202),
            magenta: Color::Rgb(162, 146, 163),
            cyan: Color::Rgb(122, 168, 159),
            gray: Color::Rgb(164, 167, 164),
        }
    }
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            play: "▶".to_string(),
            pause: "⏸".to_string(),
            stop: "■".to_string(),
            pending: "☐".to_string(),
            done: "☑".to_string(),
            select: "▸".to_string(),
            progress_filled: "█".to_string(),
            progress_empty: "░".to_string(),
            cycle_done: "●".to_string(),
            cycle_pending: "○".to_string(),
            input_cursor: "▊".to_string(),
            separator: "│".to_string(),
            resize_handle: "◢".to_string(),
        }
    }
}

fn hex_to_color<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    if !s.is_ascii() || !s.starts_with('#') || s.len() != 7 {
        return Err(serde::de::Error::custom("invalid hex color format"));
    }
    let r = u8::from_str_radix(&s[1..3], 16).map_err(serde::de::Error::custom)?;
    let g = u8::from_str_radix(&s[3..5], 16).map_err(serde::de::Error::custom)?;
    let b = u8::from_str_radix(&s[5..7], 16).map_err(serde::de::Error::custom)?;
    Ok(Color::Rgb(r, g, b))
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timer.validate()?;
        self.desktop.validate()
    }
}

pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "retrodesk", "Retrodesk")
        .map(|proj_dirs| proj_dirs.config_dir().join("retrodesk.toml"))
}

/// Loads `retrodesk.toml` from the platform config dir, or defaults when absent.
pub fn load_config() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) if path.exists() => {
            let config_str = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            Config::from_toml_str(&config_str)
        }
        _ => Ok(Config::default()),
    }
}
