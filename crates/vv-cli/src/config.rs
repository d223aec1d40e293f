//! CLI configuration file.
//!
//! ```toml
//! [engine]
//! binary = "/usr/local/bin/mmdc"
//! timeout-ms = 20000
//!
//! [theme]
//! preset = "dark"
//! font-family = "Inter, sans-serif"
//!
//! [theme.variables]
//! lineColor = "#71717a"
//!
//! [regenerate]
//! command = "my-model-client --visuals"
//! attempts = 1
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};
use vv_render::{EngineConfig, MermaidCliConfig, ThemePreset, ThemeVariables};

/// Looked up in the working directory when no `--config` is given.
pub const LOCAL_CONFIG: &str = "vibeviz.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CliConfig {
    pub engine: MermaidCliConfig,
    pub theme: ThemeConfig,
    pub regenerate: RegenerateConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ThemeConfig {
    pub preset: ThemePreset,
    pub font_family: Option<String>,
    /// Replaces the preset's color tokens entirely.
    pub variables: Option<ThemeVariables>,
}

impl ThemeConfig {
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::with_theme(self.preset);
        if let Some(font_family) = &self.font_family {
            config.font_family.clone_from(font_family);
        }
        if let Some(variables) = &self.variables {
            config.theme_variables = variables.clone();
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RegenerateConfig {
    /// Shell command that reads code on stdin and prints a visuals payload.
    pub command: Option<String>,
    pub timeout_ms: u64,
    /// Regenerations to try when the graph fails to render.
    pub attempts: u32,
}

impl Default for RegenerateConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_ms: 120_000,
            attempts: 0,
        }
    }
}

impl RegenerateConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Load the configuration from `explicit`, else `vibeviz.toml` in the
/// working directory, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "loading configuration");
        return load_config_file(path);
    }

    let local = Path::new(LOCAL_CONFIG);
    if local.exists() {
        info!(path = %local.display(), "loading configuration");
        return load_config_file(local);
    }

    debug!("no configuration file found, using defaults");
    Ok(CliConfig::default())
}

fn load_config_file(path: &Path) -> Result<CliConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<CliConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{CliConfig, load_config, parse_config};
    use vv_render::ThemePreset;

    #[test]
    fn empty_config_is_default() {
        let config = parse_config("").expect("empty config");
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.theme.engine_config().theme, ThemePreset::Dark);
        assert_eq!(config.regenerate.attempts, 0);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r##"
[engine]
binary = "/opt/mmdc"
timeout-ms = 500

[theme]
preset = "forest"
font-family = "Inter"

[theme.variables]
lineColor = "#71717a"

[regenerate]
command = "cat visuals.json"
attempts = 2
"##,
        )
        .expect("valid config");

        assert_eq!(config.engine.binary, PathBuf::from("/opt/mmdc"));
        assert_eq!(config.engine.timeout_ms, 500);
        assert_eq!(config.engine.background, "transparent");

        let engine = config.theme.engine_config();
        assert_eq!(engine.theme, ThemePreset::Forest);
        assert_eq!(engine.font_family, "Inter");
        assert_eq!(engine.theme_variables.line_color.as_deref(), Some("#71717a"));
        assert!(!engine.theme_variables.dark_mode);

        assert_eq!(config.regenerate.command.as_deref(), Some("cat visuals.json"));
        assert_eq!(config.regenerate.attempts, 2);
        assert_eq!(config.regenerate.timeout_ms, 120_000);
    }

    #[test]
    fn unknown_preset_is_rejected() {
        assert!(parse_config("[theme]\npreset = \"neon\"\n").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_config(Some(&dir.path().join("missing.toml"))).expect_err("missing");
        assert!(err.to_string().contains("Failed to read config"));
    }
}
