//! Synchronous view state: which panel shows what, and which render results
//! are still wanted.
//!
//! The controller never awaits. Callers ask it whether a render is needed,
//! report when one starts, and hand back the outcome; anything that arrives
//! for a render the controller no longer waits on is dropped.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use vv_core::{Artifact, RegenerationError, RenderError, RenderId, ViewMode, Visuals};
use vv_normalize::{NormalizedDiagram, normalize_ascii, normalize_diagram};
use vv_render::RenderOutcome;

use crate::boundary::{Clipboard, ClipboardError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("a visual regeneration is already in progress")]
    RegenerationPending,
}

impl ViewError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RegenerationPending => "vibeviz/error/regeneration-pending",
        }
    }
}

/// Lifecycle of the graph for the current diagram source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GraphState {
    /// No render has been started for the current source.
    #[default]
    Stale,
    Rendering { id: RenderId },
    Ready,
    Failed { error: RenderError },
}

/// Coarse state of the main panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewState {
    Idle,
    GraphRendering,
    GraphOk,
    GraphError,
    Ascii,
}

impl ViewState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::GraphRendering => "graph-rendering",
            Self::GraphOk => "graph-ok",
            Self::GraphError => "graph-error",
            Self::Ascii => "ascii",
        }
    }
}

/// Whether a finished render was taken or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderDisposition {
    Applied,
    Discarded,
}

/// What the main panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel<'a> {
    Source { text: &'a str, copied: bool },
    Graph(&'a Artifact),
    Rendering,
    /// The graph cannot be shown; offer regeneration or the ASCII view.
    GraphFallback {
        error: &'a RenderError,
        can_regenerate: bool,
    },
    Ascii(&'a str),
}

/// Fullscreen projection of the active view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandedView<'a> {
    Graph(&'a Artifact),
    GraphUnavailable,
    Ascii(&'a str),
}

impl ExpandedView<'_> {
    #[must_use]
    pub const fn caption(&self) -> &'static str {
        match self {
            Self::Graph(_) | Self::GraphUnavailable => "Mermaid Flowchart • Fullscreen",
            Self::Ascii(_) => "Nano Banana ASCII • Fullscreen",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewController {
    diagram: NormalizedDiagram,
    ascii: String,
    explanation: String,
    mode: ViewMode,
    inspecting: bool,
    expanded: bool,
    copied: bool,
    regenerating: bool,
    graph: GraphState,
    artifact: Option<Artifact>,
    last_regeneration_error: Option<RegenerationError>,
}

impl ViewController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller showing `visuals` in the graph view.
    #[must_use]
    pub fn with_visuals(visuals: &Visuals) -> Self {
        let mut controller = Self::new();
        controller.load_analysis(visuals);
        controller
    }

    /// Show a new analysis result, resetting the view to its defaults.
    pub fn load_analysis(&mut self, visuals: &Visuals) {
        self.mode = ViewMode::Graph;
        self.inspecting = false;
        self.expanded = false;
        self.last_regeneration_error = None;
        self.replace_sources(visuals);
    }

    fn replace_sources(&mut self, visuals: &Visuals) {
        self.diagram = normalize_diagram(&visuals.mermaid_code);
        self.ascii = normalize_ascii(&visuals.nano_banana_ascii);
        self.explanation = visuals.explanation.trim().to_string();
        self.copied = false;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        if let GraphState::Rendering { id } = &self.graph {
            debug!(%id, "in-flight render superseded by a new diagram source");
        }
        self.graph = GraphState::Stale;
        self.artifact = None;
    }

    #[must_use]
    pub fn diagram(&self) -> &NormalizedDiagram {
        &self.diagram
    }

    #[must_use]
    pub fn ascii(&self) -> &str {
        &self.ascii
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub const fn mode(&self) -> ViewMode {
        self.mode
    }

    #[must_use]
    pub const fn is_inspecting(&self) -> bool {
        self.inspecting
    }

    #[must_use]
    pub const fn is_expanded(&self) -> bool {
        self.expanded
    }

    #[must_use]
    pub const fn is_copied(&self) -> bool {
        self.copied
    }

    #[must_use]
    pub const fn is_regenerating(&self) -> bool {
        self.regenerating
    }

    #[must_use]
    pub const fn graph_state(&self) -> &GraphState {
        &self.graph
    }

    /// Rendered graph for the current source, if it rendered.
    #[must_use]
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    #[must_use]
    pub fn last_regeneration_error(&self) -> Option<&RegenerationError> {
        self.last_regeneration_error.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> ViewState {
        if self.mode == ViewMode::Ascii {
            return ViewState::Ascii;
        }
        match self.graph {
            GraphState::Stale => ViewState::Idle,
            GraphState::Rendering { .. } => ViewState::GraphRendering,
            GraphState::Ready => ViewState::GraphOk,
            GraphState::Failed { .. } => ViewState::GraphError,
        }
    }

    /// Source to render now, if the graph view needs one.
    ///
    /// Only the graph view requests renders, and only for a source that has
    /// not been rendered yet.
    #[must_use]
    pub fn render_request(&self) -> Option<&NormalizedDiagram> {
        (self.mode == ViewMode::Graph && self.graph == GraphState::Stale).then_some(&self.diagram)
    }

    /// Record that render `id` was started for the current source.
    pub fn render_started(&mut self, id: RenderId) {
        debug!(%id, "graph rendering");
        self.graph = GraphState::Rendering { id };
    }

    /// Take a finished render if it is the one the controller waits on.
    ///
    /// The view mode does not matter: a render that lands while the ASCII
    /// view is showing is kept for the next switch back.
    pub fn render_finished(&mut self, outcome: RenderOutcome) -> RenderDisposition {
        let RenderOutcome { id, result } = outcome;
        if self.graph != (GraphState::Rendering { id }) {
            debug!(%id, "discarding stale render result");
            return RenderDisposition::Discarded;
        }

        match result {
            Ok(artifact) => {
                debug!(%id, "graph ready");
                self.artifact = Some(artifact);
                self.graph = GraphState::Ready;
            }
            Err(error) => {
                debug!(%id, code = error.code(), "graph failed");
                self.artifact = None;
                self.graph = GraphState::Failed { error };
            }
        }
        RenderDisposition::Applied
    }

    /// Switch between the graph and ASCII views.
    ///
    /// Returning to the graph view retries a failed render; a rendered or
    /// rendering graph is left alone.
    pub fn select_mode(&mut self, mode: ViewMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.copied = false;
        if mode == ViewMode::Graph && matches!(self.graph, GraphState::Failed { .. }) {
            self.graph = GraphState::Stale;
        }
    }

    /// Render the current source again after a failure.
    pub fn retry_render(&mut self) {
        if matches!(self.graph, GraphState::Failed { .. }) {
            self.graph = GraphState::Stale;
        }
    }

    pub fn toggle_inspect(&mut self) {
        self.inspecting = !self.inspecting;
        self.copied = false;
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    pub fn toggle_expanded(&mut self) {
        self.expanded = !self.expanded;
    }

    /// Copy the normalized diagram source.
    pub fn copy_source(&mut self, clipboard: &mut dyn Clipboard) -> Result<(), ClipboardError> {
        clipboard.write_text(self.diagram.as_str())?;
        self.copied = true;
        Ok(())
    }

    /// Whether a regeneration may start now.
    #[must_use]
    pub const fn can_regenerate(&self) -> bool {
        !self.regenerating
    }

    /// Mark a regeneration as pending.
    pub fn begin_regeneration(&mut self) -> Result<(), ViewError> {
        if self.regenerating {
            return Err(ViewError::RegenerationPending);
        }
        self.regenerating = true;
        self.last_regeneration_error = None;
        Ok(())
    }

    /// Apply a regeneration result.
    ///
    /// New visuals replace both sources and keep the current view mode. A
    /// failure leaves everything as it was apart from the pending flag.
    pub fn finish_regeneration(&mut self, result: Result<Visuals, RegenerationError>) {
        self.regenerating = false;
        match result {
            Ok(visuals) => self.replace_sources(&visuals),
            Err(error) => {
                warn!(code = error.code(), error = %error, "visual regeneration failed");
                self.last_regeneration_error = Some(error);
            }
        }
    }

    #[must_use]
    pub fn panel(&self) -> Panel<'_> {
        if self.inspecting {
            return Panel::Source {
                text: self.diagram.as_str(),
                copied: self.copied,
            };
        }
        if self.mode == ViewMode::Ascii {
            return Panel::Ascii(&self.ascii);
        }
        match (&self.graph, &self.artifact) {
            (GraphState::Ready, Some(artifact)) => Panel::Graph(artifact),
            (GraphState::Failed { error }, _) => Panel::GraphFallback {
                error,
                can_regenerate: self.can_regenerate(),
            },
            _ => Panel::Rendering,
        }
    }

    /// Fullscreen projection, when expanded.
    #[must_use]
    pub fn expanded_view(&self) -> Option<ExpandedView<'_>> {
        if !self.expanded {
            return None;
        }
        Some(match self.mode {
            ViewMode::Ascii => ExpandedView::Ascii(&self.ascii),
            ViewMode::Graph => self
                .artifact
                .as_ref()
                .map_or(ExpandedView::GraphUnavailable, ExpandedView::Graph),
        })
    }
}
