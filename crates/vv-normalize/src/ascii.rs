use std::sync::LazyLock;

use regex::Regex;

use crate::diagram::ESCAPED_NEWLINE;

static TAGGED_OPENING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```(?:text|ascii)?\s*").expect("opening fence pattern is valid")
});

static BARE_OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```\s*").expect("opening fence pattern is valid"));

static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*$").expect("closing fence pattern is valid"));

/// Clean model-generated ASCII art for verbatim display.
///
/// Strips the surrounding code fence and turns escaped newlines into real
/// ones. ASCII art has no grammar, so nothing else is touched.
#[must_use]
pub fn normalize_ascii(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = TAGGED_OPENING_FENCE.replace(raw, "");
    let text = BARE_OPENING_FENCE.replace(&text, "");
    let text = CLOSING_FENCE.replace(&text, "");
    text.replace(ESCAPED_NEWLINE, "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::normalize_ascii;

    #[test]
    fn strips_tagged_fence() {
        assert_eq!(
            normalize_ascii("```ascii\n[ main ] --> [ loop ]\n```"),
            "[ main ] --> [ loop ]"
        );
        assert_eq!(normalize_ascii("```text\n+--+\n|  |\n+--+\n```"), "+--+\n|  |\n+--+");
    }

    #[test]
    fn strips_untagged_fence() {
        assert_eq!(normalize_ascii("```\n(o_o)\n```"), "(o_o)");
    }

    #[test]
    fn unescapes_newlines_and_keeps_inner_indentation() {
        assert_eq!(
            normalize_ascii("  +---+\\n  | A |\\n  +---+  "),
            "+---+\n  | A |\n  +---+"
        );
    }

    #[test]
    fn closing_fence_with_trailing_newline_is_stripped() {
        assert_eq!(normalize_ascii("```\nA -> B\n```\n"), "A -> B");
    }

    #[test]
    fn fences_in_the_middle_are_art() {
        assert_eq!(normalize_ascii("a ``` b"), "a ``` b");
    }

    #[test]
    fn empty_and_blank_inputs() {
        assert_eq!(normalize_ascii(""), "");
        assert_eq!(normalize_ascii("```\n```"), "");
        assert_eq!(normalize_ascii("   \n "), "");
    }
}
