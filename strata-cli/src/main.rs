//! strata CLI - analyze a Java codebase and scaffold its Express port.
//!
//! Parses a Spring-style project into a knowledge graph, optionally asks a
//! language model to describe each class, and writes JSON knowledge
//! documents plus a JavaScript skeleton of the converted application.

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;
mod writer;

use commands::run::RunOptions;
use config::StrataConfig;
use output::{Output, OutputFormat};
use strata_llm::ProviderKind;

/// Analyze a Java codebase and scaffold its Express port.
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version)]
#[command(about = "Analyze a Java codebase and scaffold its Express port")]
#[command(propagate_version = true)]
#[command(after_help = "Quick Start:
  strata scan ./legacy-app              List the files a run would read
  strata run ./legacy-app               Analyze, describe and convert
  strata run ./legacy-app --no-enrich   Skip the language model entirely

Configuration is read from ./strata.toml (or --config), then STRATA_*
environment variables, then command-line flags.")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (defaults to ./strata.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Treat configuration problems as errors instead of warnings
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a codebase and write knowledge documents and converted code
    Run {
        /// Root directory of the Java codebase
        codebase: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        out: PathBuf,

        /// Language model provider: local, anthropic, openai or gemini
        #[arg(long)]
        provider: Option<ProviderKind>,

        /// Additional exclude patterns (gitignore syntax, repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Skip files larger than this many kilobytes
        #[arg(long, value_name = "KB")]
        max_file_size_kb: Option<u64>,

        /// Parser threads (defaults to one per core)
        #[arg(long)]
        threads: Option<usize>,

        /// Do not call any language model
        #[arg(long)]
        no_enrich: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the source and config files a run would read
    Scan {
        /// Root directory of the Java codebase
        #[arg(default_value = ".")]
        codebase: PathBuf,

        /// Additional exclude patterns (gitignore syntax, repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Print the inventory as JSON
        #[arg(long)]
        json: bool,
    },
}

fn setup_logging(verbose: bool, quiet: bool, configured: Option<&str>) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        configured.unwrap_or("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let loaded = StrataConfig::load(cli.config.as_deref(), cli.strict)?;
    setup_logging(cli.verbose, cli.quiet, loaded.config.logging.level.as_deref());
    if let Some(source) = &loaded.source {
        tracing::debug!(path = %source.display(), "loaded configuration");
    }
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    output::configure_colors();

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _ = Cli::command().print_help();
            println!();
            return Ok(());
        }
    };

    match command {
        Commands::Run {
            codebase,
            out,
            provider,
            exclude,
            max_file_size_kb,
            threads,
            no_enrich,
            json,
        } => {
            let options = RunOptions {
                codebase,
                out,
                provider,
                exclude,
                max_file_size_kb,
                threads,
                no_enrich,
                quiet: cli.quiet,
            };
            let summary = commands::run::run(options, loaded.config).await?;
            if cli.quiet {
                Ok(())
            } else {
                Output::new(summary, OutputFormat::from_json_flag(json)).render()
            }
        }
        Commands::Scan {
            codebase,
            exclude,
            json,
        } => commands::scan::run(
            &codebase,
            &exclude,
            &loaded.config,
            OutputFormat::from_json_flag(json),
        ),
    }
}
