#![forbid(unsafe_code)]

//! vibeviz CLI - clean up and render model-generated diagrams.
//!
//! # Commands
//!
//! - `normalize`: Print normalized diagram text or ASCII art
//! - `render`: Normalize and render a diagram to SVG with the Mermaid CLI
//! - `inspect`: Show the normalized source, optionally copying it to the clipboard

mod clipboard;
mod config;
mod input;
mod regenerate;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use vv_core::{RenderError, Visuals};
use vv_normalize::{NormalizedDiagram, Repair, normalize_ascii, normalize_diagram};
use vv_render::{DiagramRenderer, MermaidCliEngine, RenderEngine, ThemePreset};
use vv_view::{GraphState, Panel, ViewController, Visualizer, VisualsSource};

use crate::clipboard::Osc52Clipboard;
use crate::config::load_config;
use crate::input::{Payload, load_input};
use crate::regenerate::CommandVisualsSource;

/// vibeviz CLI - clean up and render model-generated diagrams.
#[derive(Debug, Parser)]
#[command(
    name = "vv-cli",
    version,
    about = "Clean up and render model-generated Mermaid diagrams",
    long_about = "Normalizes the Mermaid text and ASCII art a language model returns\n\
        (escaped newlines, code fences, chatty preambles, collapsed lines)\n\
        and renders the result with the Mermaid CLI."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging (can be repeated for more detail: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Normalize diagram text and print it.
    Normalize {
        /// Input file path, "-" for stdin, or inline text. A JSON object with
        /// mermaidCode and nanoBananaAscii is read as a visuals payload.
        #[arg(default_value = "-")]
        input: String,

        /// Treat the input as ASCII art (or use the payload's ASCII rendition)
        #[arg(long)]
        ascii: bool,

        /// Output a JSON report with the detected kind and applied repairs
        #[arg(long)]
        json: bool,
    },

    /// Normalize a diagram and render it to SVG with the Mermaid CLI.
    Render {
        /// Input file path, "-" for stdin, or inline text.
        #[arg(default_value = "-")]
        input: String,

        /// Output file path. If omitted, writes to stdout.
        #[arg(short, long)]
        output: Option<String>,

        /// Configuration file (default: ./vibeviz.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Theme preset (default, dark, forest, neutral, base)
        #[arg(short, long)]
        theme: Option<ThemePreset>,

        /// Path to the mmdc executable
        #[arg(long)]
        mmdc: Option<PathBuf>,

        /// Shell command that reads code on stdin and prints a visuals payload
        #[arg(long)]
        regenerate_with: Option<String>,

        /// Regenerations to try when the graph fails to render
        #[arg(long)]
        attempts: Option<u32>,

        /// Code the diagram explains, sent to the regeneration command
        #[arg(long)]
        code: Option<PathBuf>,

        /// Print a JSON report to stderr
        #[arg(long)]
        json: bool,
    },

    /// Print the normalized diagram source for inspection.
    Inspect {
        /// Input file path, "-" for stdin, or inline text.
        #[arg(default_value = "-")]
        input: String,

        /// Copy the normalized source to the terminal clipboard (OSC 52)
        #[arg(long)]
        copy: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Normalize { input, ascii, json } => cmd_normalize(&input, ascii, json),

        Command::Render {
            input,
            output,
            config,
            theme,
            mmdc,
            regenerate_with,
            attempts,
            code,
            json,
        } => cmd_render(RenderArgs {
            input,
            output,
            config,
            theme,
            mmdc,
            regenerate_with,
            attempts,
            code,
            json,
        }),

        Command::Inspect { input, copy } => cmd_inspect(&input, copy),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn write_output(output: Option<&str>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Failed to write to: {path}"))?;
            info!("Wrote output to: {path}");
        }
        None => {
            io::stdout()
                .write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn repair_names(repairs: &[Repair]) -> Vec<&'static str> {
    repairs.iter().map(|repair| repair.as_str()).collect()
}

// =============================================================================
// Command: normalize
// =============================================================================

#[derive(Debug, Serialize)]
struct NormalizeReport<'a> {
    text: &'a str,
    kind: Option<&'static str>,
    repairs: Vec<&'static str>,
}

fn cmd_normalize(input: &str, ascii: bool, json_output: bool) -> Result<()> {
    let payload = Payload::detect(load_input(input)?);

    let (text, report) = if ascii {
        let text = normalize_ascii(payload.ascii_source());
        (text, None)
    } else {
        let diagram = normalize_diagram(&payload.into_visuals().mermaid_code);
        let repairs = repair_names(diagram.repairs());
        let kind = diagram.kind().map(|kind| kind.as_str());
        (diagram.into_string(), Some((kind, repairs)))
    };

    if json_output {
        let (kind, repairs) = report.unwrap_or_default();
        let result = NormalizeReport {
            text: &text,
            kind,
            repairs,
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        write_output(None, &text)?;
    }

    Ok(())
}

// =============================================================================
// Command: render
// =============================================================================

#[derive(Debug)]
struct RenderArgs {
    input: String,
    output: Option<String>,
    config: Option<PathBuf>,
    theme: Option<ThemePreset>,
    mmdc: Option<PathBuf>,
    regenerate_with: Option<String>,
    attempts: Option<u32>,
    code: Option<PathBuf>,
    json: bool,
}

#[derive(Debug, Serialize)]
struct RenderReport {
    state: &'static str,
    kind: Option<&'static str>,
    repairs: Vec<&'static str>,
    render_id: Option<String>,
    svg_bytes: usize,
    error_code: Option<&'static str>,
    regenerations: u32,
    total_time_ms: f64,
}

fn cmd_render(args: RenderArgs) -> Result<()> {
    let total_start = Instant::now();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(theme) = args.theme {
        config.theme.preset = theme;
    }
    if let Some(mmdc) = args.mmdc {
        config.engine.binary = mmdc;
    }
    if args.regenerate_with.is_some() {
        config.regenerate.command = args.regenerate_with;
    }
    let attempts = args.attempts.unwrap_or(config.regenerate.attempts);

    let visuals = Payload::detect(load_input(&args.input)?).into_visuals();
    let code_context = match &args.code {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read code: {}", path.display()))?,
        None => String::new(),
    };

    let renderer = DiagramRenderer::new(
        MermaidCliEngine::new(config.engine.clone()),
        config.theme.engine_config(),
    );
    let source =
        CommandVisualsSource::new(config.regenerate.command.clone(), config.regenerate.timeout());
    let visualizer = Visualizer::new(renderer, source);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let regenerations = runtime.block_on(render_with_retries(
        &visualizer,
        code_context,
        &visuals,
        attempts,
    ))?;

    let controller = visualizer.controller();
    if args.json {
        let report = render_report(&controller, regenerations, total_start);
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    match controller.panel() {
        Panel::Graph(artifact) => {
            write_output(args.output.as_deref(), artifact.svg())?;
            info!(
                kind = controller.diagram().kind().map_or("unknown", |kind| kind.as_str()),
                render_id = %artifact.render_id(),
                "Rendered diagram in {:.2}ms",
                total_start.elapsed().as_secs_f64() * 1000.0
            );
            Ok(())
        }
        Panel::GraphFallback { error, .. } => {
            warn!(code = error.code(), error = %error, "diagram not rendered");
            eprintln!("{}", fallback_message(error));
            if !controller.ascii().is_empty() {
                println!("{}", controller.ascii());
            }
            Err(anyhow!("diagram not rendered ({})", error.code()))
        }
        other => bail!("render did not finish: {other:?}"),
    }
}

/// Render, then regenerate and render again while the diagram text is what
/// keeps failing.
async fn render_with_retries<E: RenderEngine, S: VisualsSource>(
    visualizer: &Visualizer<E, S>,
    code_context: String,
    visuals: &Visuals,
    attempts: u32,
) -> Result<u32> {
    visualizer.load_analysis(code_context, visuals).await;

    let mut regenerations = 0;
    while regenerations < attempts {
        if !needs_new_visuals(visualizer.controller().graph_state()) {
            break;
        }
        regenerations += 1;
        info!(attempt = regenerations, "graph failed, regenerating visuals");
        visualizer.regenerate().await?;
    }
    Ok(regenerations)
}

/// An unavailable engine fails the same way for any diagram, so only a
/// rejected or empty source is worth regenerating.
fn needs_new_visuals(graph: &GraphState) -> bool {
    match graph {
        GraphState::Failed { error } => error.cause().is_source_fault(),
        _ => false,
    }
}

fn render_report(
    controller: &ViewController,
    regenerations: u32,
    total_start: Instant,
) -> RenderReport {
    let diagram: &NormalizedDiagram = controller.diagram();
    let error_code = match controller.panel() {
        Panel::GraphFallback { error, .. } => Some(error.code()),
        _ => None,
    };
    RenderReport {
        state: controller.state().as_str(),
        kind: diagram.kind().map(|kind| kind.as_str()),
        repairs: repair_names(diagram.repairs()),
        render_id: controller
            .artifact()
            .map(|artifact| artifact.render_id().to_string()),
        svg_bytes: controller.artifact().map_or(0, |artifact| artifact.svg().len()),
        error_code,
        regenerations,
        total_time_ms: total_start.elapsed().as_secs_f64() * 1000.0,
    }
}

/// What the user sees instead of a graph. Engine output stays in the logs.
fn fallback_message(error: &RenderError) -> &'static str {
    match error {
        RenderError::EmptySource => {
            "No diagram to render. Regenerate the visuals or use the ASCII view."
        }
        RenderError::InvalidSyntax { .. } => {
            "The diagram could not be rendered. Regenerate the visuals or use the ASCII view."
        }
        RenderError::EngineUnavailable { .. } => {
            "The Mermaid renderer is unavailable. Check the mmdc installation or use the ASCII view."
        }
    }
}

// =============================================================================
// Command: inspect
// =============================================================================

fn cmd_inspect(input: &str, copy: bool) -> Result<()> {
    let visuals = Payload::detect(load_input(input)?).into_visuals();
    let mut controller = ViewController::with_visuals(&visuals);
    controller.toggle_inspect();

    if copy {
        let mut clipboard = Osc52Clipboard::new(io::stdout().lock());
        controller
            .copy_source(&mut clipboard)
            .context("Failed to copy to clipboard")?;
    }

    let diagram = controller.diagram();
    eprintln!(
        "Kind:    {}",
        diagram.kind().map_or("unknown", |kind| kind.as_str())
    );
    if !diagram.repairs().is_empty() {
        eprintln!("Repairs: {}", repair_names(diagram.repairs()).join(", "));
    }
    if !controller.explanation().is_empty() {
        eprintln!("About:   {}", controller.explanation());
    }

    let Panel::Source { text, copied } = controller.panel() else {
        bail!("source inspection is not active");
    };
    write_output(None, text)?;
    if copied {
        eprintln!("Copied to clipboard");
    }
    Ok(())
}
