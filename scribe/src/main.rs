//! Scribe - run rich-text editing commands over an HTML fragment

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use scribe_core::surface::EditingSurface;
use scribe_core::{
    CommandName, CommandValue, Config, ContainerSurface, Editor, EnvOptions, ExecOutcome,
    FrameSurface, IgnoreReason,
};
use scribe_toolbar::render::render;
use scribe_toolbar::ToolbarBuilder;
use std::path::PathBuf;

const TOOLBAR_WIDTH: usize = 80;

/// Apply editing commands to an HTML fragment
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the HTML body content
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Edit a container element instead of a framed document
    #[arg(long)]
    container: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Character range to select before running commands
    #[arg(long, value_name = "START:END", value_parser = parse_span)]
    select: Option<Span>,

    /// Command to run; repeat to run several in order
    #[arg(long = "exec", value_name = "NAME[=VALUE]", value_parser = parse_exec)]
    exec: Vec<Invocation>,

    /// Print the toolbar state to stderr afterwards
    #[arg(long)]
    toolbar: bool,

    /// Write the result to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    name: CommandName,
    value: CommandValue,
}

fn parse_span(raw: &str) -> Result<Span, String> {
    let (start, end) = raw
        .split_once(':')
        .ok_or_else(|| format!("`{}` is not START:END", raw))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|e| format!("invalid start: {}", e))?;
    let end: usize = end.trim().parse().map_err(|e| format!("invalid end: {}", e))?;
    if start > end {
        return Err(format!("start {} is after end {}", start, end));
    }
    Ok(Span { start, end })
}

fn parse_exec(raw: &str) -> Result<Invocation, String> {
    let (name, value) = raw.split_once('=').unwrap_or((raw, ""));
    let name: CommandName = name.parse().map_err(|e| format!("{:#}", e))?;
    let value = CommandValue::parse_for(name, value).map_err(|e| format!("{:#}", e))?;
    Ok(Invocation { name, value })
}

/// What an editing run produced
#[derive(Debug)]
struct Report {
    content: String,
    toolbar: Vec<String>,
    ignored: Vec<(CommandName, IgnoreReason)>,
}

fn edit<S: EditingSurface>(surface: S, config: Config, html: &str, args: &Args) -> Result<Report> {
    let mut editor = Editor::new(surface, config.clone());
    let toolbar = if args.toolbar {
        Some(
            ToolbarBuilder::from_config(&config)
                .install(&mut editor)
                .context("Failed to build toolbar")?,
        )
    } else {
        None
    };

    editor.start(html).context("Failed to start editing session")?;
    editor.focus();
    if let Some(span) = args.select {
        if !editor.select_text(span.start, span.end) {
            bail!("Failed to select {}:{}", span.start, span.end);
        }
    }

    let mut ignored = Vec::new();
    for invocation in &args.exec {
        match editor.execute(invocation.name, invocation.value.clone(), EnvOptions::default()) {
            ExecOutcome::Executed(outcome) => info!("{}: {:?}", invocation.name, outcome),
            ExecOutcome::Ignored(reason) => {
                warn!("{} ignored: {:?}", invocation.name, reason);
                ignored.push((invocation.name, reason));
            }
        }
    }

    let toolbar = toolbar
        .map(|toolbar| render(&toolbar, TOOLBAR_WIDTH))
        .unwrap_or_default();
    let content = editor.destroy().context("Editing session produced no content")?;
    Ok(Report {
        content,
        toolbar,
        ignored,
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Load configuration
    let (config, events) = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    let warnings = events.iter().filter(|e| e.is_warning()).count();
    if warnings > 0 {
        eprintln!("scribe: {} configuration settings were ignored", warnings);
    }

    // Load content
    let html = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read content: {}", args.file.display()))?;

    let report = if args.container {
        edit(ContainerSurface::new(), config, &html, &args)?
    } else {
        edit(FrameSurface::new("scribe"), config, &html, &args)?
    };

    for (name, reason) in &report.ignored {
        eprintln!("scribe: {} was not applied ({:?})", name, reason);
    }
    for line in &report.toolbar {
        eprintln!("{}", line);
    }

    match &args.output {
        Some(path) => std::fs::write(path, &report.content)
            .with_context(|| format!("Failed to write output: {}", path.display()))?,
        None => println!("{}", report.content),
    }

    Ok(())
}
