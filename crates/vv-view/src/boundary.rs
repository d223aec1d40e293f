//! Collaborators the visualizer talks to but does not own.

use async_trait::async_trait;
use thiserror::Error;
use vv_core::{RegenerationError, Visuals};

/// Write-only text clipboard.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard is unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Source of replacement visuals for the current code, usually a model call.
#[async_trait]
pub trait VisualsSource: Send + Sync {
    async fn regenerate_visuals(&self, code_context: &str) -> Result<Visuals, RegenerationError>;
}

/// Parse a model's JSON reply into [`Visuals`].
///
/// Missing diagram fields make the reply malformed; nothing partial is
/// returned.
pub fn parse_visuals(json: &str) -> Result<Visuals, RegenerationError> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Err(RegenerationError::Malformed {
            message: "empty response".to_string(),
        });
    }
    serde_json::from_str(trimmed).map_err(|err| RegenerationError::Malformed {
        message: err.to_string(),
    })
}
