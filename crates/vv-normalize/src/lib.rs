#![forbid(unsafe_code)]

//! Best-effort cleanup of diagram text returned by a generative model.
//!
//! [`normalize_diagram`] coerces Mermaid text into a shape the rendering
//! engine has a chance of accepting. [`normalize_ascii`] strips the fences and
//! escape artifacts from the free-form ASCII-art rendition. Both are total:
//! every input produces an output, and empty input produces empty output.

mod ascii;
mod diagram;

use serde::Serialize;
use tracing::debug;
use vv_core::DiagramKind;

pub use ascii::normalize_ascii;

/// A repair applied while normalizing diagram text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Repair {
    /// Literal `\n` sequences became real line breaks.
    UnescapedNewlines,
    /// The content of a fenced code block replaced the whole text.
    ExtractedFence,
    /// Prose before the diagram keyword was dropped.
    TrimmedPreamble,
    /// Surrounding whitespace was removed.
    TrimmedWhitespace,
    /// A line break was inserted after every `;`.
    SplitStatements,
    /// A line break was inserted after `graph <DIR>`.
    SplitDirective,
}

impl Repair {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnescapedNewlines => "unescaped-newlines",
            Self::ExtractedFence => "extracted-fence",
            Self::TrimmedPreamble => "trimmed-preamble",
            Self::TrimmedWhitespace => "trimmed-whitespace",
            Self::SplitStatements => "split-statements",
            Self::SplitDirective => "split-directive",
        }
    }
}

/// Diagram text after normalization, with what was done to it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NormalizedDiagram {
    text: String,
    kind: Option<DiagramKind>,
    repairs: Vec<Repair>,
}

impl NormalizedDiagram {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Diagram keyword the text starts with, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<DiagramKind> {
        self.kind
    }

    #[must_use]
    pub fn repairs(&self) -> &[Repair] {
        &self.repairs
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

impl AsRef<str> for NormalizedDiagram {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Normalize raw model output into renderable Mermaid text.
///
/// Stages, in order:
/// 1. Literal `\n` sequences become line breaks
/// 2. The first fenced code block replaces the text, minus its language tag
///    (`mermaid`, or any other word alone on the opening line)
/// 3. Everything before the earliest line-leading diagram keyword is dropped
/// 4. Surrounding whitespace is trimmed
/// 5. Single-line text using `;` gets a line break after each `;`
/// 6. A bare `graph <DIR>` one-liner gets a line break after the direction
///
/// Text without a diagram keyword only gets the cleanup stages; no keyword is
/// ever invented, so the engine can reject it with a proper error.
#[must_use]
pub fn normalize_diagram(raw: &str) -> NormalizedDiagram {
    if raw.is_empty() {
        return NormalizedDiagram::default();
    }

    let (text, repairs) = diagram::run(raw);
    let kind = diagram::find_keyword(&text)
        .filter(|(start, _)| *start == 0)
        .map(|(_, kind)| kind);

    if !repairs.is_empty() {
        debug!(
            kind = kind.map_or("none", DiagramKind::as_str),
            repairs = ?repairs,
            "normalized diagram text"
        );
    }

    NormalizedDiagram {
        text,
        kind,
        repairs,
    }
}

/// [`normalize_diagram`] without the report.
#[must_use]
pub fn normalize_diagram_text(raw: &str) -> String {
    normalize_diagram(raw).into_string()
}

/// Diagram keyword at the start of `text`, ignoring leading whitespace.
#[must_use]
pub fn detect_kind(text: &str) -> Option<DiagramKind> {
    diagram::find_keyword(text.trim_start())
        .filter(|(start, _)| *start == 0)
        .map(|(_, kind)| kind)
}

#[cfg(test)]
mod tests {
    use super::{Repair, detect_kind, normalize_ascii, normalize_diagram, normalize_diagram_text};
    use proptest::prelude::*;
    use vv_core::DiagramKind;

    #[test]
    fn empty_input_yields_empty_output() {
        let normalized = normalize_diagram("");
        assert!(normalized.is_empty());
        assert_eq!(normalized.kind(), None);
        assert!(normalized.repairs().is_empty());
    }

    #[test]
    fn prose_and_fence_around_one_line_graph() {
        let raw = "Here is your diagram:\n```mermaid\ngraph TD;A-->B;```";
        let normalized = normalize_diagram(raw);

        assert!(normalized.as_str().starts_with("graph TD"));
        assert_eq!(normalized.as_str(), "graph TD;\nA-->B;\n");
        assert_eq!(normalized.as_str().matches('\n').count(), 2);
        assert_eq!(normalized.kind(), Some(DiagramKind::Graph));
        assert!(normalized.repairs().contains(&Repair::ExtractedFence));
        assert!(normalized.repairs().contains(&Repair::SplitStatements));
    }

    #[test]
    fn bare_graph_header_gets_line_break_after_direction() {
        let normalized = normalize_diagram("graph TD");
        assert_eq!(normalized.as_str(), "graph TD\n");
        assert_eq!(normalized.as_str().split('\n').collect::<Vec<_>>(), ["graph TD", ""]);
        assert_eq!(normalized.repairs(), [Repair::SplitDirective]);
    }

    #[test]
    fn double_escaped_newlines_become_line_breaks() {
        let normalized = normalize_diagram("graph TD\\n  A[Load] --> B[Parse]\\n  B --> C[Render]");
        assert_eq!(
            normalized.as_str(),
            "graph TD\n  A[Load] --> B[Parse]\n  B --> C[Render]"
        );
        assert_eq!(normalized.repairs(), [Repair::UnescapedNewlines]);
    }

    #[test]
    fn escaped_fence_is_unwrapped() {
        let raw = "```mermaid\\nsequenceDiagram\\nAlice->>Bob: Hi\\n```";
        assert_eq!(normalize_diagram_text(raw), "sequenceDiagram\nAlice->>Bob: Hi");
    }

    #[test]
    fn preamble_outside_fence_without_fence() {
        let raw = "Sure! Below is the class layout.\n\nclassDiagram\n  Animal <|-- Dog";
        let normalized = normalize_diagram(raw);
        assert_eq!(normalized.as_str(), "classDiagram\n  Animal <|-- Dog");
        assert_eq!(normalized.kind(), Some(DiagramKind::Class));
        assert_eq!(normalized.repairs(), [Repair::TrimmedPreamble]);
    }

    #[test]
    fn text_without_keyword_only_gets_cleanup() {
        let raw = "  ```\nA --> B\nB --> C\n```  ";
        let normalized = normalize_diagram(raw);
        assert_eq!(normalized.as_str(), "A --> B\nB --> C");
        assert_eq!(normalized.kind(), None);
        assert!(!normalized.repairs().contains(&Repair::TrimmedPreamble));
    }

    #[test]
    fn well_formed_input_is_untouched() {
        let raw = "flowchart LR\n  A[Client] --> B[Server]\n  B --> C[(DB)]";
        let normalized = normalize_diagram(raw);
        assert_eq!(normalized.as_str(), raw);
        assert!(normalized.repairs().is_empty());
        assert_eq!(normalized.kind(), Some(DiagramKind::Flowchart));
    }

    #[test]
    fn one_line_flowchart_without_separators_is_a_known_gap() {
        assert_eq!(normalize_diagram_text("flowchart TD A-->B"), "flowchart TD A-->B");
    }

    #[test]
    fn prose_hidden_behind_terminator_is_dropped_on_settle() {
        assert_eq!(normalize_diagram_text("note;graph TD"), "graph TD\n");
    }

    #[test]
    fn detect_kind_requires_leading_keyword() {
        assert_eq!(detect_kind("  pie\ntitle Pets"), Some(DiagramKind::Pie));
        assert_eq!(detect_kind("stateDiagram-v2\n[*] --> A"), Some(DiagramKind::StateV2));
        assert_eq!(detect_kind("intro\ngantt"), None);
        assert_eq!(detect_kind(""), None);
    }

    #[test]
    fn ascii_normalizer_is_reexported() {
        assert_eq!(normalize_ascii("```ascii\\n[A]\\n```"), "[A]");
    }

    fn body_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![
                Just("graph TD".to_string()),
                Just("flowchart LR".to_string()),
                Just("pie".to_string()),
                Just("A-->B".to_string()),
                Just("B --> C[Done]".to_string()),
                Just("Here is the diagram:".to_string()),
                Just(";".to_string()),
                Just(" ".to_string()),
                Just("\n".to_string()),
                "[a-zA-Z0-9 >-]{0,8}",
            ],
            0..10,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_normalize_is_idempotent(input in ".{0,128}") {
            let once = normalize_diagram_text(&input);
            let twice = normalize_diagram_text(&once);
            prop_assert_eq!(twice, once);
        }

        #[test]
        fn prop_normalize_is_idempotent_on_diagram_like_text(body in body_strategy()) {
            let once = normalize_diagram_text(&body);
            prop_assert_eq!(normalize_diagram_text(&once), once);
        }

        #[test]
        fn prop_fenced_equals_unwrapped(
            body in body_strategy(),
            tag in prop_oneof![Just(""), Just("mermaid"), Just("text"), Just("mmd"), Just("plaintext")],
        ) {
            let fenced = format!("```{tag}\n{body}\n```");
            prop_assert_eq!(normalize_diagram_text(&fenced), normalize_diagram_text(&body));
        }

        #[test]
        fn prop_no_escaped_newline_survives(body in body_strategy()) {
            let escaped = body.replace('\n', "\\n");
            let normalized = normalize_diagram_text(&escaped);
            prop_assert!(!normalized.contains("\\n"));
            prop_assert_eq!(normalized, normalize_diagram_text(&body));
        }

        #[test]
        fn prop_no_keyword_is_invented(body in "[a-eA-E0-9 ;>-]{0,64}") {
            let normalized = normalize_diagram(&body);
            prop_assert_eq!(normalized.kind(), None);
            let without_breaks: String = normalized.as_str().chars().filter(|c| *c != '\n').collect();
            prop_assert_eq!(without_breaks, body.trim());
        }

        #[test]
        fn prop_ascii_normalize_is_total(input in ".{0,128}") {
            let normalized = normalize_ascii(&input);
            prop_assert!(!normalized.contains("\\n"));
            prop_assert_eq!(normalized.trim(), normalized.as_str());
        }
    }
}
