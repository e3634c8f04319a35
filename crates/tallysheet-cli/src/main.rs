//! tallysheet CLI - Tag-driven report formatter
//!
//! Command-line interface for formatting raw delivery report exports into
//! styled, subtotalled workbooks from a tagged template.

mod clean;
mod config;
mod report;
mod summary;
mod validate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tallysheet_core::{scan, Tag};
use tallysheet_xlsx::load_template;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::report::{discover_inputs, Formatter};
use crate::summary::{emit_json, emit_text, ExitCode, OutputFormat};

#[derive(Parser)]
#[command(name = "tallysheet")]
#[command(author, version, about = "Tag-driven spreadsheet report formatter", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Format every report export in the inputs directory
    Run {
        /// Configuration file (TOML)
        #[arg(short, long, env = "TALLYSHEET_CONFIG")]
        config: Option<PathBuf>,

        /// Inputs directory
        #[arg(long)]
        inputs: Option<PathBuf>,

        /// Outputs directory
        #[arg(long)]
        outputs: Option<PathBuf>,

        /// Template workbook
        #[arg(long)]
        template: Option<PathBuf>,

        /// Icon image placed at the <icon> tag
        #[arg(long)]
        icon: Option<PathBuf>,

        /// Overwrite existing outputs
        #[arg(short, long)]
        force: bool,

        /// Summary format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the tags of a template and check its anchors
    Check {
        /// Template workbook
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Commands::Run {
            config,
            inputs,
            outputs,
            template,
            icon,
            force,
            format,
        }) => Config::load(config.as_deref()).and_then(|mut config| {
            if let Some(inputs) = inputs {
                config.inputs_dir = inputs;
            }
            if let Some(outputs) = outputs {
                config.outputs_dir = outputs;
            }
            if let Some(template) = template {
                config.template = template;
            }
            if icon.is_some() {
                config.icon = icon;
            }
            run(config, force, format)
        }),
        Some(Commands::Check { template }) => check(&template),
        None => {
            println!("tallysheet - Tag-driven spreadsheet report formatter");
            println!("Run with --help for usage information");
            Ok(ExitCode::Success)
        }
    };

    match result {
        Ok(code) => code.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Failure.into()
        }
    }
}

fn run(config: Config, force: bool, format: OutputFormat) -> Result<ExitCode> {
    info!(
        sheet = %config.sheet_name,
        inputs = %config.inputs_dir.display(),
        outputs = %config.outputs_dir.display(),
        template = %config.template.display(),
        "running the report formatter"
    );
    let inputs = discover_inputs(&config.inputs_dir)?;
    let formatter = Formatter::new(config, force)?;
    let summary = formatter.run(&inputs);

    let stdout = io::stdout().lock();
    match format {
        OutputFormat::Text => emit_text(stdout, &summary),
        OutputFormat::Json => emit_json(stdout, &summary),
    }
    .context("Failed to write summary")?;

    Ok(summary.exit_code())
}

fn tag_kind(tag: &Tag) -> &'static str {
    match tag {
        Tag::Anchor(_) => "anchor",
        Tag::Subtotal { .. } => "subtotal",
        Tag::Total { .. } => "total",
        Tag::Decorative(_) => "decorative",
    }
}

fn check(path: &Path) -> Result<ExitCode> {
    let template = load_template(path)
        .with_context(|| format!("Failed to load template {}", path.display()))?;
    let tags = scan::tags(&template.grid)?;

    println!(
        "{}: {} tag(s) in sheet '{}'",
        path.display(),
        tags.len(),
        template.sheet_name
    );
    for (cell, tag) in &tags {
        println!("  {:<8} {:<30} {}", cell.to_string(), tag.to_string(), tag_kind(tag));
    }

    match scan::require_anchors(&template.grid) {
        Ok(anchors) => {
            println!(
                "anchors ok: header_start {}, data_start {}, data_end {}",
                anchors.header_start, anchors.data_start, anchors.data_end
            );
            Ok(ExitCode::Success)
        }
        Err(e) => {
            println!("{e}");
            Ok(ExitCode::Failure)
        }
    }
}
