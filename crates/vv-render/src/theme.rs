//! Rendering-engine configuration: theme preset, color tokens, and the
//! Mermaid config document handed to the engine at initialization.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mermaid's built-in theme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreset {
    Default,
    /// Dark background with bright accents
    #[default]
    Dark,
    Forest,
    Neutral,
    /// Unstyled base theme; only the theme variables apply
    Base,
}

/// Error type for theme preset parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseThemePresetError(String);

impl std::fmt::Display for ParseThemePresetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown theme preset: {}", self.0)
    }
}

impl std::error::Error for ParseThemePresetError {}

impl FromStr for ThemePreset {
    type Err = ParseThemePresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "dark" => Ok(Self::Dark),
            "forest" => Ok(Self::Forest),
            "neutral" => Ok(Self::Neutral),
            "base" => Ok(Self::Base),
            _ => Err(ParseThemePresetError(s.to_string())),
        }
    }
}

impl ThemePreset {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Forest => "forest",
            Self::Neutral => "neutral",
            Self::Base => "base",
        }
    }
}

/// Named color tokens passed to Mermaid as `themeVariables`.
///
/// Unset tokens fall back to the preset's own palette.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeVariables {
    pub dark_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tertiary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tertiary_text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
}

impl ThemeVariables {
    #[must_use]
    pub fn from_preset(preset: ThemePreset) -> Self {
        match preset {
            ThemePreset::Dark => Self {
                dark_mode: true,
                background: Some("#18181b".into()),
                primary_color: Some("#3b82f6".into()),
                secondary_color: Some("#a78bfa".into()),
                tertiary_color: Some("#27272a".into()),
                primary_text_color: Some("#fff".into()),
                secondary_text_color: Some("#ddd".into()),
                tertiary_text_color: Some("#bbb".into()),
                line_color: Some("#52525b".into()),
            },
            ThemePreset::Default | ThemePreset::Forest | ThemePreset::Neutral | ThemePreset::Base => {
                Self::default()
            }
        }
    }
}

/// Process-wide engine configuration, applied once before the first render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub start_on_load: bool,
    pub theme: ThemePreset,
    pub security_level: String,
    pub font_family: String,
    pub theme_variables: ThemeVariables,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_theme(ThemePreset::Dark)
    }
}

impl EngineConfig {
    /// Configuration for `preset` with its color tokens.
    #[must_use]
    pub fn with_theme(preset: ThemePreset) -> Self {
        Self {
            start_on_load: false,
            theme: preset,
            security_level: "loose".to_string(),
            font_family: "Space Grotesk, sans-serif".to_string(),
            theme_variables: ThemeVariables::from_preset(preset),
        }
    }

    /// Mermaid `initialize` document for this configuration.
    #[must_use]
    pub fn to_mermaid_config(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
