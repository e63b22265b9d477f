//! Theme support for terminal output.
//!
//! Provides the built-in color themes, the glyph sets used for step status,
//! and a custom accent color given as a hex string.

use crossterm::style::{Color, Stylize};

/// Colors used when printing prompts and progress.
///
/// Themes are runtime-only - configuration happens through the config file
/// with a theme name or a hex accent color which is parsed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Theme name for display and configuration
    pub name: String,
    /// Accent color (headers, current step, selected choice)
    pub primary: Color,
    /// Completed steps
    pub success: Color,
    /// Skipped steps and notices
    pub warning: Color,
    /// Validation errors
    pub error: Color,
    /// Hints, descriptions, pending steps
    pub muted: Color,
    /// Whether any color is emitted at all
    pub enabled: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    /// Default theme - works well on both light and dark terminals.
    pub fn default_theme() -> Self {
        Self {
            name: "default".to_string(),
            primary: Color::Rgb { r: 99, g: 102, b: 241 },  // Indigo
            success: Color::Rgb { r: 34, g: 197, b: 94 },   // Green
            warning: Color::Rgb { r: 234, g: 179, b: 8 },   // Yellow
            error: Color::Rgb { r: 239, g: 68, b: 68 },     // Red
            muted: Color::Rgb { r: 107, g: 114, b: 128 },   // Gray-500
            enabled: true,
        }
    }

    /// Nord theme - arctic, bluish colors.
    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),
            primary: Color::Rgb { r: 136, g: 192, b: 208 }, // Nord8
            success: Color::Rgb { r: 163, g: 190, b: 140 }, // Nord14
            warning: Color::Rgb { r: 235, g: 203, b: 139 }, // Nord13
            error: Color::Rgb { r: 191, g: 97, b: 106 },    // Nord11
            muted: Color::Rgb { r: 76, g: 86, b: 106 },     // Nord3
            enabled: true,
        }
    }

    /// Monochrome theme - plain text only.
    pub fn mono() -> Self {
        Self {
            name: "mono".to_string(),
            primary: Color::Reset,
            success: Color::Reset,
            warning: Color::Reset,
            error: Color::Reset,
            muted: Color::Reset,
            enabled: false,
        }
    }

    /// Get a theme by name (case-insensitive).
    ///
    /// A hex color (`#RRGGBB`) selects the default theme with that accent.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Self::default_theme()),
            "nord" => Some(Self::nord()),
            "mono" | "none" | "plain" => Some(Self::mono()),
            other => parse_hex_color(other).map(|primary| Self {
                name: other.to_string(),
                primary,
                ..Self::default_theme()
            }),
        }
    }

    /// List all available built-in theme names.
    pub fn available_themes() -> Vec<&'static str> {
        vec!["default", "nord", "mono"]
    }

    /// Resolve the configured theme, falling back to the default.
    pub fn from_config(name: &str, color: bool) -> Self {
        let theme = Self::by_name(name).unwrap_or_else(|| {
            tracing::warn!(theme = name, "Unknown theme, using default");
            Self::default_theme()
        });
        if color {
            theme
        } else {
            Self { enabled: false, ..theme }
        }
    }

    /// Wrap `text` in the given color when colors are enabled.
    pub fn paint(&self, text: &str, color: Color) -> String {
        if !self.enabled || color == Color::Reset {
            return text.to_string();
        }
        text.with(color).to_string()
    }

    /// Bold accent text.
    pub fn emphasis(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.with(self.primary).bold().to_string()
    }
}

/// Parse a hex color string (#RRGGBB or RRGGBB) into a Color.
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some(Color::Rgb { r, g, b })
}

/// Status markers for the progress list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyphs {
    pub done: &'static str,
    pub current: &'static str,
    pub pending: &'static str,
    pub skipped: &'static str,
    pub error: &'static str,
    pub ellipsis: &'static str,
}

impl Glyphs {
    pub const UNICODE: Self = Self {
        done: "✓",
        current: "▸",
        pending: "○",
        skipped: "↷",
        error: "✗",
        ellipsis: "…",
    };

    pub const ASCII: Self = Self {
        done: "[x]",
        current: "[>]",
        pending: "[ ]",
        skipped: "[-]",
        error: "[!]",
        ellipsis: "...",
    };

    pub fn new(ascii: bool) -> Self {
        if ascii {
            Self::ASCII
        } else {
            Self::UNICODE
        }
    }
}

impl Default for Glyphs {
    fn default() -> Self {
        Self::UNICODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_theme() {
        let theme = Theme::default();
        assert_eq!(theme.name, "default");
        assert!(theme.enabled);
    }

    #[test]
    fn test_theme_by_name() {
        assert!(Theme::by_name("Nord").is_some());
        assert!(Theme::by_name("MONO").is_some());
        assert!(Theme::by_name("unknown-theme").is_none());
    }

    #[test]
    fn test_hex_theme_sets_accent() {
        let theme = Theme::by_name("#ff0000").unwrap();
        assert_eq!(theme.primary, Color::Rgb { r: 255, g: 0, b: 0 });
        assert_eq!(theme.success, Theme::default_theme().success);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), Some(Color::Rgb { r: 255, g: 0, b: 0 }));
        assert_eq!(parse_hex_color("00FF00"), Some(Color::Rgb { r: 0, g: 255, b: 0 }));
        assert_eq!(parse_hex_color("#282a36"), Some(Color::Rgb { r: 40, g: 42, b: 54 }));
        assert_eq!(parse_hex_color("invalid"), None);
        assert_eq!(parse_hex_color("#FFF"), None);
    }

    #[test]
    fn test_paint_respects_enabled() {
        let theme = Theme::from_config("default", false);
        assert_eq!(theme.paint("ok", theme.success), "ok");
        assert_eq!(theme.emphasis("ok"), "ok");

        let theme = Theme::default();
        let painted = theme.paint("ok", theme.success);
        assert!(painted.contains("ok"));
        assert!(painted.contains('\u{1b}'));
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        assert_eq!(Theme::from_config("solarized", true).name, "default");
    }

    #[test]
    fn test_glyph_sets() {
        assert_eq!(Glyphs::new(true).done, "[x]");
        assert_eq!(Glyphs::new(false).done, "✓");
    }
}
