//! Repair pipeline for model-generated Mermaid text.
//!
//! The pipeline is a table of stages applied in order. A stage returns `None`
//! when it does not apply. The whole table is re-run until a pass leaves the
//! text unchanged, which makes the result a fixed point of the pipeline.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};
use vv_core::DiagramKind;

use crate::Repair;

/// Two-character `\n` sequence left behind by double JSON escaping.
pub(crate) const ESCAPED_NEWLINE: &str = "\\n";

const TERMINATOR: char = ';';

/// Upper bound on pipeline passes; real inputs settle in two.
const MAX_PASSES: usize = 8;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([\w-]*)(.*?)```").expect("fence pattern is valid"));

const MERMAID_TAG: &str = "mermaid";

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(graph\s+[A-Z]+)").expect("directive pattern is valid"));

static KEYWORD_PATTERNS: LazyLock<Vec<(DiagramKind, Regex)>> = LazyLock::new(|| {
    DiagramKind::ALL
        .iter()
        .map(|&kind| {
            let pattern = format!(r"(?i)(?:^|\n)\s*({})\b", regex::escape(kind.keyword()));
            let regex = Regex::new(&pattern).expect("keyword pattern is valid");
            (kind, regex)
        })
        .collect()
});

pub(crate) struct Stage {
    pub(crate) repair: Repair,
    apply: fn(&str) -> Option<String>,
}

pub(crate) const STAGES: &[Stage] = &[
    Stage {
        repair: Repair::UnescapedNewlines,
        apply: unescape_newlines,
    },
    Stage {
        repair: Repair::ExtractedFence,
        apply: extract_fence,
    },
    Stage {
        repair: Repair::TrimmedPreamble,
        apply: trim_preamble,
    },
    Stage {
        repair: Repair::TrimmedWhitespace,
        apply: trim_whitespace,
    },
    Stage {
        repair: Repair::SplitStatements,
        apply: split_statements,
    },
    Stage {
        repair: Repair::SplitDirective,
        apply: split_directive,
    },
];

/// Run the stage table to a fixed point.
pub(crate) fn run(raw: &str) -> (String, Vec<Repair>) {
    let mut text = raw.to_string();
    let mut repairs: Vec<Repair> = Vec::new();

    for pass in 0..MAX_PASSES {
        let before = text.clone();
        let mut applied = Vec::new();

        for stage in STAGES {
            if let Some(next) = (stage.apply)(&text) {
                if next != text {
                    trace!(pass, repair = stage.repair.as_str(), "stage changed text");
                    applied.push(stage.repair);
                    text = next;
                }
            }
        }

        if text == before {
            break;
        }
        for repair in applied {
            if !repairs.contains(&repair) {
                repairs.push(repair);
            }
        }
        if pass + 1 == MAX_PASSES {
            debug!("diagram normalization hit the pass limit without settling");
        }
    }

    (text, repairs)
}

/// Earliest recognized keyword at the start of a line, with its byte offset.
///
/// When two keywords start at the same offset the longer one wins, so
/// `stateDiagram-v2` is reported rather than `stateDiagram`.
pub(crate) fn find_keyword(text: &str) -> Option<(usize, DiagramKind)> {
    let mut best: Option<(usize, DiagramKind)> = None;

    for (kind, pattern) in KEYWORD_PATTERNS.iter() {
        let Some(start) = pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|keyword| keyword.start())
        else {
            continue;
        };

        let is_better = match best {
            None => true,
            Some((best_start, best_kind)) => {
                start < best_start
                    || (start == best_start && kind.keyword().len() > best_kind.keyword().len())
            }
        };
        if is_better {
            best = Some((start, *kind));
        }
    }

    best
}

fn unescape_newlines(text: &str) -> Option<String> {
    text.contains(ESCAPED_NEWLINE)
        .then(|| text.replace(ESCAPED_NEWLINE, "\n"))
}

/// Body of the first fenced block, without its language tag.
///
/// `mermaid` is always a tag. Any other word counts as one only when it is
/// alone on the opening line and is not itself a diagram keyword, so
/// `` ```graph TD``` `` and `` ```graph\nA-->B``` `` keep their header.
fn extract_fence(text: &str) -> Option<String> {
    let captures = FENCE.captures(text)?;
    let tag = captures.get(1)?;
    let rest = captures.get(2)?;

    let body = if is_language_tag(tag.as_str(), rest.as_str()) {
        rest.as_str()
    } else {
        &text[tag.start()..rest.end()]
    };
    Some(body.trim().to_string())
}

fn is_language_tag(tag: &str, rest: &str) -> bool {
    if tag.is_empty() {
        return false;
    }
    if tag.eq_ignore_ascii_case(MERMAID_TAG) {
        return true;
    }
    if DiagramKind::ALL
        .iter()
        .any(|kind| kind.keyword().eq_ignore_ascii_case(tag))
    {
        return false;
    }
    rest.trim_start_matches([' ', '\t']).starts_with(['\n', '\r'])
}

fn trim_preamble(text: &str) -> Option<String> {
    let (start, _) = find_keyword(text)?;
    (start > 0).then(|| text[start..].to_string())
}

fn trim_whitespace(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (trimmed.len() != text.len()).then(|| trimmed.to_string())
}

/// Break single-line, terminator-separated output into one statement per line.
///
/// Text that is already in split form apart from the trailing break (which
/// the whitespace stage removes) is split again so the result stays stable.
fn split_statements(text: &str) -> Option<String> {
    if !text.contains(TERMINATOR) {
        return None;
    }

    let joined = text.replace(";\n", ";");
    if joined.contains('\n') {
        return None;
    }

    let split = joined.replace(TERMINATOR, ";\n");
    if text.contains('\n') && split.trim_end() != text {
        return None;
    }
    (split != text).then_some(split)
}

/// Last resort for `graph <DIR> ...` one-liners with no separators at all.
fn split_directive(text: &str) -> Option<String> {
    if !text.starts_with("graph") || text.contains('\n') || text.contains(TERMINATOR) {
        return None;
    }

    let split = DIRECTIVE.replacen(text, 1, "${1}\n");
    (split != text).then(|| split.into_owned())
}
