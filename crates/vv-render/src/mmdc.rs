//! Rendering engine backed by the Mermaid CLI (`mmdc`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{EngineConfig, EngineError, RenderEngine};

/// How to invoke `mmdc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MermaidCliConfig {
    /// Executable name or path.
    pub binary: PathBuf,
    /// Per-invocation time limit.
    pub timeout_ms: u64,
    /// Background color passed with `-b`.
    pub background: String,
    /// Optional puppeteer config passed with `-p`.
    pub puppeteer_config: Option<PathBuf>,
    /// Optional page width passed with `-w`.
    pub width: Option<u32>,
}

impl Default for MermaidCliConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mmdc"),
            timeout_ms: 30_000,
            background: "transparent".to_string(),
            puppeteer_config: None,
            width: None,
        }
    }
}

impl MermaidCliConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug)]
struct Workspace {
    dir: TempDir,
    config_path: PathBuf,
}

/// Renders diagrams by shelling out to the Mermaid CLI.
///
/// Initialization probes `mmdc --version` and writes the theme config into a
/// private temporary directory that lives as long as the engine.
#[derive(Debug, Default)]
pub struct MermaidCliEngine {
    config: MermaidCliConfig,
    workspace: OnceCell<Workspace>,
}

impl MermaidCliEngine {
    #[must_use]
    pub fn new(config: MermaidCliConfig) -> Self {
        Self {
            config,
            workspace: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MermaidCliConfig {
        &self.config
    }

    async fn probe_version(&self) -> Result<String, EngineError> {
        let binary = self.config.binary.display().to_string();
        let output = timeout(
            self.config.timeout(),
            Command::new(&self.config.binary)
                .arg("--version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| EngineError::Unavailable {
            message: format!("`{binary} --version` timed out"),
        })?
        .map_err(|err| EngineError::Unavailable {
            message: format!("failed to run `{binary}`: {err}"),
        })?;

        if !output.status.success() {
            return Err(EngineError::Unavailable {
                message: format!("`{binary} --version` exited with {}", output.status),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn create_workspace(&self, config: &EngineConfig) -> Result<Workspace, EngineError> {
        let version = self.probe_version().await?;
        let dir = tempfile::Builder::new()
            .prefix("vv-mmdc-")
            .tempdir()
            .map_err(|err| EngineError::Unavailable {
                message: format!("failed to create render directory: {err}"),
            })?;
        let config_path = dir.path().join("mermaid-config.json");
        let document = serde_json::to_vec_pretty(&config.to_mermaid_config()).map_err(|err| {
            EngineError::Unavailable {
                message: format!("failed to encode mermaid config: {err}"),
            }
        })?;
        tokio::fs::write(&config_path, document).await?;

        info!(
            version = %version,
            theme = config.theme.as_str(),
            dir = %dir.path().display(),
            "mermaid CLI engine initialized"
        );
        Ok(Workspace { dir, config_path })
    }
}

/// Arguments for one `mmdc` render call.
pub(crate) fn render_args(
    config: &MermaidCliConfig,
    input: &Path,
    output: &Path,
    config_path: &Path,
    element_id: &str,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-i".into(),
        input.into(),
        "-o".into(),
        output.into(),
        "-c".into(),
        config_path.into(),
        "-b".into(),
        config.background.clone().into(),
        "--svgId".into(),
        element_id.into(),
        "-q".into(),
    ];
    if let Some(puppeteer) = &config.puppeteer_config {
        args.push("-p".into());
        args.push(puppeteer.into());
    }
    if let Some(width) = config.width {
        args.push("-w".into());
        args.push(width.to_string().into());
    }
    args
}

/// Most useful line of `mmdc` stderr for a rejection message.
pub(crate) fn rejection_message(stderr: &str) -> String {
    let mut lines = stderr.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.clone().next();
    lines
        .find(|line| line.contains("Error"))
        .or(first)
        .unwrap_or("mermaid CLI exited without output")
        .to_string()
}

#[async_trait]
impl RenderEngine for MermaidCliEngine {
    async fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError> {
        // Concurrent callers share one probe; a failure leaves the cell empty
        // so the next call tries again.
        self.workspace
            .get_or_try_init(|| self.create_workspace(config))
            .await?;
        Ok(())
    }

    async fn render(&self, element_id: &str, source: &str) -> Result<String, EngineError> {
        let workspace = self.workspace.get().ok_or(EngineError::NotInitialized)?;
        let input = workspace.dir.path().join(format!("{element_id}.mmd"));
        let output = workspace.dir.path().join(format!("{element_id}.svg"));
        tokio::fs::write(&input, source).await?;

        let args = render_args(&self.config, &input, &output, &workspace.config_path, element_id);
        debug!(element_id, binary = %self.config.binary.display(), "running mermaid CLI");

        let run = timeout(
            self.config.timeout(),
            Command::new(&self.config.binary)
                .args(&args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let result = match run {
            Err(_) => Err(EngineError::Timeout {
                after_ms: self.config.timeout_ms,
            }),
            Ok(Err(err)) => Err(EngineError::Unavailable {
                message: format!(
                    "failed to run `{}`: {err}",
                    self.config.binary.display()
                ),
            }),
            Ok(Ok(out)) if !out.status.success() => Err(EngineError::Rejected {
                message: rejection_message(&String::from_utf8_lossy(&out.stderr)),
            }),
            Ok(Ok(_)) => match tokio::fs::read_to_string(&output).await {
                Ok(svg) if svg.trim().is_empty() => Err(EngineError::Rejected {
                    message: "mermaid CLI produced an empty SVG".to_string(),
                }),
                Ok(svg) => Ok(svg),
                Err(err) => Err(EngineError::Rejected {
                    message: format!("mermaid CLI produced no SVG: {err}"),
                }),
            },
        };

        let _ = tokio::fs::remove_file(&input).await;
        let _ = tokio::fs::remove_file(&output).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::{Path, PathBuf};

    use super::{MermaidCliConfig, MermaidCliEngine, rejection_message, render_args};
    use crate::{EngineConfig, EngineError, RenderEngine};

    #[test]
    fn render_args_include_theme_config_and_svg_id() {
        let config = MermaidCliConfig::default();
        let args = render_args(
            &config,
            Path::new("/tmp/in.mmd"),
            Path::new("/tmp/out.svg"),
            Path::new("/tmp/mermaid-config.json"),
            "vv-diagram-3",
        );
        let expected: Vec<OsString> = [
            "-i",
            "/tmp/in.mmd",
            "-o",
            "/tmp/out.svg",
            "-c",
            "/tmp/mermaid-config.json",
            "-b",
            "transparent",
            "--svgId",
            "vv-diagram-3",
            "-q",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn render_args_append_optional_flags() {
        let config = MermaidCliConfig {
            puppeteer_config: Some(PathBuf::from("/etc/puppeteer.json")),
            width: Some(1200),
            ..MermaidCliConfig::default()
        };
        let args = render_args(
            &config,
            Path::new("in.mmd"),
            Path::new("out.svg"),
            Path::new("config.json"),
            "id",
        );
        let tail: Vec<_> = args[args.len() - 4..].iter().map(|arg| arg.to_string_lossy()).collect();
        assert_eq!(tail, ["-p", "/etc/puppeteer.json", "-w", "1200"]);
    }

    #[test]
    fn rejection_message_prefers_error_line() {
        let stderr = "\nGenerating single mermaid chart\nError: Parse error on line 2:\n...A-->\n";
        assert_eq!(rejection_message(stderr), "Error: Parse error on line 2:");
        assert_eq!(rejection_message("  something odd\n"), "something odd");
        assert_eq!(rejection_message(""), "mermaid CLI exited without output");
    }

    #[test]
    fn config_deserializes_from_kebab_case() {
        let config: MermaidCliConfig =
            serde_json::from_str(r#"{"binary":"/opt/mmdc","timeout-ms":500}"#).expect("config");
        assert_eq!(config.binary, PathBuf::from("/opt/mmdc"));
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.background, "transparent");
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let engine = MermaidCliEngine::new(MermaidCliConfig {
            binary: PathBuf::from("/nonexistent/vibeviz/mmdc"),
            ..MermaidCliConfig::default()
        });
        let err = engine
            .initialize(&EngineConfig::default())
            .await
            .expect_err("binary does not exist");
        assert!(matches!(err, EngineError::Unavailable { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn concurrent_initialization_probes_once() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("mmdc");
        std::fs::write(
            &script,
            "#!/bin/sh\necho probe >> \"$(dirname \"$0\")/probes\"\necho 11.4.2\n",
        )
        .expect("write fake mmdc");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake mmdc");

        let engine = MermaidCliEngine::new(MermaidCliConfig {
            binary: script,
            ..MermaidCliConfig::default()
        });
        let config = EngineConfig::default();
        let (first, second) = tokio::join!(engine.initialize(&config), engine.initialize(&config));
        first.expect("first initialize");
        second.expect("second initialize");
        engine.initialize(&config).await.expect("repeat initialize");

        let probes = std::fs::read_to_string(dir.path().join("probes")).expect("probe log");
        assert_eq!(probes.lines().count(), 1);
    }

    #[tokio::test]
    async fn render_before_initialize_is_rejected() {
        let engine = MermaidCliEngine::default();
        let err = engine
            .render("vv-diagram-1", "graph TD\nA-->B")
            .await
            .expect_err("not initialized");
        assert!(matches!(err, EngineError::NotInitialized));
    }
}
