//! Configuration management for Guidepost.
//!
//! Handles loading configuration from TOML files and folding in the
//! process-wide environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable that forces non-interactive mode for every workflow.
pub const ENV_NON_INTERACTIVE: &str = "GUIDEPOST_NON_INTERACTIVE";

/// Environment variable that overrides the state directory.
pub const ENV_STATE_DIR: &str = "GUIDEPOST_STATE_DIR";

/// Default state directory, relative to the working tree.
pub const DEFAULT_STATE_DIR: &str = ".guidepost/state";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Terminal rendering settings
    pub ui: UiConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Where in-progress workflow state is kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Saved state older than this many days is removed by `state gc`
    pub retention_days: u32,

    /// Never prompt, even on a terminal
    pub non_interactive: bool,
}

/// Terminal rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Color theme name (built-in: default, mono, nord)
    pub theme: String,

    /// Use ASCII status glyphs instead of Unicode symbols
    pub ascii: bool,

    /// Whether to emit colors at all
    pub color: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { state_dir: None, retention_days: 7, non_interactive: false }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { theme: "default".to_string(), ascii: false, color: true }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.guidepost.toml` in current directory
    /// 2. `~/.config/guidepost/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".guidepost.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(global_config) = Self::global_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Path of the global config file.
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("guidepost").join("config.toml"))
    }
}

/// Engine settings resolved once per process.
///
/// This is the only place the environment is consulted; the engine itself
/// reads nothing but this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Non-interactive mode forced process-wide
    pub non_interactive: bool,

    /// Directory holding saved workflow state
    pub state_dir: PathBuf,

    /// Use ASCII glyphs in progress output
    pub ascii: bool,

    /// Emit colors
    pub color: bool,

    /// Theme name
    pub theme: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            non_interactive: false,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            ascii: false,
            color: true,
            theme: "default".to_string(),
        }
    }
}

impl EngineConfig {
    /// Resolve from a loaded config and the process environment.
    pub fn from_env(config: &Config) -> Self {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Resolve from a loaded config and an arbitrary variable lookup.
    pub fn resolve<F>(config: &Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_interactive = config.general.non_interactive
            || lookup(ENV_NON_INTERACTIVE).is_some_and(|v| is_truthy(&v));

        let state_dir = lookup(ENV_STATE_DIR)
            .filter(|v| !v.trim().is_empty())
            .map(|v| expand_path(&v))
            .or_else(|| {
                config.general.state_dir.as_ref().map(|p| expand_path(&p.to_string_lossy()))
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));

        Self {
            non_interactive,
            state_dir,
            ascii: config.ui.ascii,
            color: config.ui.color,
            theme: config.ui.theme.clone(),
        }
    }

    /// Force non-interactive mode.
    pub fn with_non_interactive(mut self, non_interactive: bool) -> Self {
        self.non_interactive = self.non_interactive || non_interactive;
        self
    }

    /// Use a different state directory.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }
}

/// Parse a yes/no word (`y`, `yes`, `true`, `1`, `on` and their negatives).
///
/// The one vocabulary for environment switches, confirm answers and step
/// conditions.
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" | "on" => Some(true),
        "n" | "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Interpret an environment value as a boolean switch; anything not a yes
/// word is off.
pub fn is_truthy(value: &str) -> bool {
    parse_yes_no(value) == Some(true)
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).into_owned())
}
