#![forbid(unsafe_code)]

//! Shared types for the vibeviz diagram pipeline.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagram-type keywords recognized at the start of a diagram description.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DiagramKind {
    Graph,
    Flowchart,
    Sequence,
    Class,
    State,
    StateV2,
    Er,
    Gantt,
    Pie,
    Journey,
    Mindmap,
    Timeline,
}

impl DiagramKind {
    pub const ALL: [Self; 12] = [
        Self::Graph,
        Self::Flowchart,
        Self::Sequence,
        Self::Class,
        Self::State,
        Self::StateV2,
        Self::Er,
        Self::Gantt,
        Self::Pie,
        Self::Journey,
        Self::Mindmap,
        Self::Timeline,
    ];

    /// The header keyword as Mermaid spells it.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequenceDiagram",
            Self::Class => "classDiagram",
            Self::State => "stateDiagram",
            Self::StateV2 => "stateDiagram-v2",
            Self::Er => "erDiagram",
            Self::Gantt => "gantt",
            Self::Pie => "pie",
            Self::Journey => "journey",
            Self::Mindmap => "mindmap",
            Self::Timeline => "timeline",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence",
            Self::Class => "class",
            Self::State => "state",
            Self::StateV2 => "state-v2",
            Self::Er => "er",
            Self::Gantt => "gantt",
            Self::Pie => "pie",
            Self::Journey => "journey",
            Self::Mindmap => "mindmap",
            Self::Timeline => "timeline",
        }
    }
}

static NEXT_RENDER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one render invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderId(pub u64);

impl RenderId {
    /// Allocate a fresh id. Ids are never reused within a process.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_RENDER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Element id handed to the rendering engine.
    #[must_use]
    pub fn element_id(self) -> String {
        format!("vv-diagram-{}", self.0)
    }
}

impl fmt::Display for RenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vv-diagram-{}", self.0)
    }
}

/// Opaque rendered output of one successful render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    render_id: RenderId,
    svg: String,
}

impl Artifact {
    #[must_use]
    pub fn new(render_id: RenderId, svg: impl Into<String>) -> Self {
        Self {
            render_id,
            svg: svg.into(),
        }
    }

    #[must_use]
    pub const fn render_id(&self) -> RenderId {
        self.render_id
    }

    /// Markup to hand to the display surface as-is.
    #[must_use]
    pub fn svg(&self) -> &str {
        &self.svg
    }

    #[must_use]
    pub fn into_svg(self) -> String {
        self.svg
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RenderFailureCause {
    EmptySource,
    InvalidSyntax,
    EngineUnavailable,
}

impl RenderFailureCause {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptySource => "empty-source",
            Self::InvalidSyntax => "invalid-syntax",
            Self::EngineUnavailable => "engine-unavailable",
        }
    }

    /// The diagram text is at fault, so different visuals may render.
    #[must_use]
    pub const fn is_source_fault(self) -> bool {
        matches!(self, Self::EmptySource | Self::InvalidSyntax)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("diagram source is empty after normalization")]
    EmptySource,
    #[error("rendering engine rejected the diagram: {message}")]
    InvalidSyntax { message: String },
    #[error("rendering engine is unavailable: {message}")]
    EngineUnavailable { message: String },
}

impl RenderError {
    #[must_use]
    pub const fn cause(&self) -> RenderFailureCause {
        match self {
            Self::EmptySource => RenderFailureCause::EmptySource,
            Self::InvalidSyntax { .. } => RenderFailureCause::InvalidSyntax,
            Self::EngineUnavailable { .. } => RenderFailureCause::EngineUnavailable,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptySource => "vibeviz/error/empty-source",
            Self::InvalidSyntax { .. } => "vibeviz/error/invalid-syntax",
            Self::EngineUnavailable { .. } => "vibeviz/error/engine-unavailable",
        }
    }
}

/// Visual section of a model analysis result, as the model returns it.
///
/// Both diagram strings are untrusted and must be normalized before use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Visuals {
    pub mermaid_code: String,
    pub nano_banana_ascii: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
pub enum RegenerationError {
    #[error("visual regeneration failed: {message}")]
    Failed { message: String },
    #[error("visual regeneration returned malformed data: {message}")]
    Malformed { message: String },
}

impl RegenerationError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "vibeviz/error/regeneration-failed",
            Self::Malformed { .. } => "vibeviz/error/regeneration-malformed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ViewMode {
    #[default]
    Graph,
    Ascii,
}

impl ViewMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Ascii => "ascii",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown view mode: {0}")]
pub struct ParseViewModeError(String);

impl FromStr for ViewMode {
    type Err = ParseViewModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "graph" | "flowchart" => Ok(Self::Graph),
            "ascii" | "text" => Ok(Self::Ascii),
            _ => Err(ParseViewModeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Artifact, DiagramKind, RenderError, RenderFailureCause, RenderId, ViewMode, Visuals};

    #[test]
    fn render_ids_are_unique_and_increasing() {
        let first = RenderId::next();
        let second = RenderId::next();
        assert!(second > first);
        assert_ne!(first.element_id(), second.element_id());
    }

    #[test]
    fn element_id_matches_display() {
        let id = RenderId(42);
        assert_eq!(id.element_id(), "vv-diagram-42");
        assert_eq!(id.to_string(), "vv-diagram-42");
    }

    #[test]
    fn keyword_table_covers_every_kind_once() {
        let mut keywords: Vec<_> = DiagramKind::ALL.iter().map(|kind| kind.keyword()).collect();
        keywords.sort_unstable();
        keywords.dedup();
        assert_eq!(keywords.len(), DiagramKind::ALL.len());
    }

    #[test]
    fn render_error_causes_and_codes() {
        assert_eq!(RenderError::EmptySource.cause(), RenderFailureCause::EmptySource);
        let rejected = RenderError::InvalidSyntax {
            message: "Parse error on line 2".to_string(),
        };
        assert_eq!(rejected.cause().as_str(), "invalid-syntax");
        assert_eq!(rejected.code(), "vibeviz/error/invalid-syntax");
        assert!(rejected.to_string().contains("Parse error on line 2"));
    }

    #[test]
    fn only_source_causes_blame_the_diagram() {
        assert!(RenderFailureCause::EmptySource.is_source_fault());
        assert!(RenderFailureCause::InvalidSyntax.is_source_fault());
        assert!(!RenderFailureCause::EngineUnavailable.is_source_fault());
    }

    #[test]
    fn visuals_use_model_field_names() {
        let visuals: Visuals = serde_json::from_str(
            r#"{"mermaidCode":"graph TD\\nA-->B","nanoBananaAscii":"[A]->[B]","explanation":"flow"}"#,
        )
        .expect("visuals payload");
        assert_eq!(visuals.mermaid_code, "graph TD\\nA-->B");
        assert_eq!(visuals.nano_banana_ascii, "[A]->[B]");
        assert_eq!(visuals.explanation, "flow");
    }

    #[test]
    fn visuals_without_explanation_still_parse() {
        let visuals: Visuals =
            serde_json::from_str(r#"{"mermaidCode":"pie","nanoBananaAscii":""}"#).expect("payload");
        assert!(visuals.explanation.is_empty());
    }

    #[test]
    fn view_mode_parses_aliases() {
        assert_eq!("graph".parse::<ViewMode>(), Ok(ViewMode::Graph));
        assert_eq!("ASCII".parse::<ViewMode>(), Ok(ViewMode::Ascii));
        assert!("canvas".parse::<ViewMode>().is_err());
        assert_eq!(ViewMode::default(), ViewMode::Graph);
    }

    #[test]
    fn artifact_exposes_markup() {
        let artifact = Artifact::new(RenderId(7), "<svg/>");
        assert_eq!(artifact.render_id(), RenderId(7));
        assert_eq!(artifact.svg(), "<svg/>");
        assert_eq!(artifact.into_svg(), "<svg/>");
    }
}
