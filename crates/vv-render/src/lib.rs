#![forbid(unsafe_code)]

//! Diagram rendering through an external engine.
//!
//! [`DiagramRenderer`] owns the engine lifecycle (one-time initialization),
//! assigns every render a fresh [`RenderId`], and turns every engine failure
//! into a [`RenderError`]. It never caches: deciding whether a render is
//! needed, and whether a finished render is still wanted, is the caller's job.
//! [`DiagramRenderer::is_latest`] tells the caller which render was initiated
//! last.

mod mmdc;
mod theme;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use vv_core::{Artifact, RenderError, RenderId};
use vv_normalize::NormalizedDiagram;

pub use mmdc::{MermaidCliConfig, MermaidCliEngine};
pub use theme::{EngineConfig, ParseThemePresetError, ThemePreset, ThemeVariables};

/// Failure reported by a rendering engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{message}")]
    Rejected { message: String },
    #[error("{message}")]
    Unavailable { message: String },
    #[error("render timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
    #[error("engine used before initialization")]
    NotInitialized,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Map an engine failure onto the render error taxonomy.
    ///
    /// Anything the engine says about the diagram itself counts as invalid
    /// syntax; failures to run the engine at all are reported separately.
    #[must_use]
    pub fn into_render_error(self) -> RenderError {
        match self {
            Self::Rejected { message } => RenderError::InvalidSyntax { message },
            Self::Timeout { .. } => RenderError::InvalidSyntax {
                message: self.to_string(),
            },
            Self::Unavailable { .. } | Self::NotInitialized | Self::Io(_) => {
                RenderError::EngineUnavailable {
                    message: self.to_string(),
                }
            }
        }
    }
}

/// External engine turning diagram text into SVG markup.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Apply process-wide configuration. Called once before the first render.
    async fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError>;

    /// Render `source`; `element_id` is unique per call.
    async fn render(&self, element_id: &str, source: &str) -> Result<String, EngineError>;
}

/// One initiated render: its id and the exact text being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTicket {
    pub id: RenderId,
    pub source: String,
}

/// A finished render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub id: RenderId,
    pub result: Result<Artifact, RenderError>,
}

pub struct DiagramRenderer<E> {
    engine: E,
    config: EngineConfig,
    initialized: OnceCell<()>,
    latest: AtomicU64,
}

impl<E: RenderEngine> DiagramRenderer<E> {
    #[must_use]
    pub fn new(engine: E, config: EngineConfig) -> Self {
        Self {
            engine,
            config,
            initialized: OnceCell::new(),
            latest: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Initialize the engine unless that already succeeded.
    ///
    /// A failed initialization is not remembered; the next call tries again.
    pub async fn init_once(&self) -> Result<(), RenderError> {
        self.initialized
            .get_or_try_init(|| async {
                debug!(theme = self.config.theme.as_str(), "initializing render engine");
                self.engine.initialize(&self.config).await
            })
            .await
            .map(|_| ())
            .map_err(|err| {
                warn!(error = %err, "render engine initialization failed");
                RenderError::EngineUnavailable {
                    message: err.to_string(),
                }
            })
    }

    /// Allocate an id for a render of `source` and mark it as the latest.
    pub fn begin(&self, source: &NormalizedDiagram) -> RenderTicket {
        let id = RenderId::next();
        self.latest.fetch_max(id.0, Ordering::SeqCst);
        RenderTicket {
            id,
            source: source.as_str().to_string(),
        }
    }

    /// Whether `id` belongs to the most recently initiated render.
    #[must_use]
    pub fn is_latest(&self, id: RenderId) -> bool {
        self.latest.load(Ordering::SeqCst) == id.0
    }

    /// Run the render described by `ticket`.
    ///
    /// An empty source fails with [`RenderError::EmptySource`] without
    /// touching the engine.
    pub async fn complete(&self, ticket: RenderTicket) -> RenderOutcome {
        let RenderTicket { id, source } = ticket;

        if source.is_empty() {
            debug!(%id, "skipping render of empty diagram");
            return RenderOutcome {
                id,
                result: Err(RenderError::EmptySource),
            };
        }

        if let Err(err) = self.init_once().await {
            return RenderOutcome {
                id,
                result: Err(err),
            };
        }

        debug!(%id, bytes = source.len(), "render started");
        let result = match self.engine.render(&id.element_id(), &source).await {
            Ok(svg) => Ok(Artifact::new(id, svg)),
            Err(err) => {
                let err = err.into_render_error();
                debug!(%id, code = err.code(), error = %err, "render failed");
                Err(err)
            }
        };

        if !self.is_latest(id) {
            debug!(%id, "render finished after being superseded");
        }
        RenderOutcome { id, result }
    }

    /// [`begin`](Self::begin) followed by [`complete`](Self::complete).
    pub async fn render(&self, source: &NormalizedDiagram) -> RenderOutcome {
        let ticket = self.begin(source);
        self.complete(ticket).await
    }
}
