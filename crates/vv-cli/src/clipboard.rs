//! Terminal clipboard via the OSC 52 escape sequence.

use std::io::Write;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use vv_view::{Clipboard, ClipboardError};

/// Writes `ESC ] 52 ; c ; <base64> BEL` so the terminal sets its clipboard.
#[derive(Debug)]
pub struct Osc52Clipboard<W> {
    out: W,
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[must_use]
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.out.write_all(osc52_sequence(text).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Osc52Clipboard, osc52_sequence};
    use vv_view::Clipboard;

    #[test]
    fn sequence_is_base64_payload_between_osc_and_bel() {
        assert_eq!(osc52_sequence("Hello"), "\x1b]52;c;SGVsbG8=\x07");
        assert_eq!(osc52_sequence(""), "\x1b]52;c;\x07");
    }

    #[test]
    fn multi_line_source_is_encoded_whole() {
        let mut clipboard = Osc52Clipboard::new(Vec::new());
        clipboard.write_text("graph TD\nA-->B").expect("write to buffer");
        let written = String::from_utf8(clipboard.into_inner()).expect("ascii output");
        assert_eq!(written, "\x1b]52;c;Z3JhcGggVEQKQS0tPkI=\x07");
        assert!(!written.contains('\n'));
    }
}
