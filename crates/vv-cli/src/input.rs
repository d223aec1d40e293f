use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use vv_core::Visuals;
use vv_view::parse_visuals;

/// What the user handed in: bare diagram text or a model's visuals payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Diagram(String),
    Visuals(Visuals),
}

impl Payload {
    /// A JSON object with `mermaidCode` and `nanoBananaAscii` is a visuals
    /// payload; anything else is diagram text.
    pub fn detect(text: String) -> Self {
        if text.trim_start().starts_with('{') {
            match parse_visuals(&text) {
                Ok(visuals) => return Self::Visuals(visuals),
                Err(err) => debug!(error = %err, "input is not a visuals payload"),
            }
        }
        Self::Diagram(text)
    }

    /// Text to treat as ASCII art.
    pub fn ascii_source(&self) -> &str {
        match self {
            Self::Diagram(text) => text,
            Self::Visuals(visuals) => &visuals.nano_banana_ascii,
        }
    }

    pub fn into_visuals(self) -> Visuals {
        match self {
            Self::Diagram(text) => Visuals {
                mermaid_code: text,
                ..Visuals::default()
            },
            Self::Visuals(visuals) => visuals,
        }
    }
}

/// Read `input` as a file path, `-` for stdin, or inline text.
pub fn load_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else if Path::new(input).is_file() {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read file: {input}"))
    } else {
        Ok(input.to_string())
    }
}
