//! Sparqled CLI
//!
//! Command-line front end for context-aware SPARQL autocompletion.
//!
//! - `sparqled recommend` prints the recommendation query for a query in which
//!   the position to complete is marked with `<`.
//! - `sparqled measure` runs that recommendation against a SPARQL endpoint and
//!   reports how popular the top candidates are.

mod config;

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use sparqled_autocomplete::{RecommendationTemplate, RecommendationType, Scope};
use sparqled_eval::{measure, EndpointConfig, HttpEndpoint, Measurement};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "sparqled")]
#[command(author, version, about = "Context-aware autocompletion for SPARQL queries")]
struct Cli {
    /// Log more (`-v` info, `-vv` debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file (endpoint, default graph, template).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the recommendation query for the term marked with `<`.
    Recommend {
        #[command(flatten)]
        input: QueryInput,
    },

    /// Rank recommendations against an endpoint and report their popularity.
    ///
    /// The recommendation query is executed first (phase 1); the ten most
    /// frequent candidates are then counted over the focus patterns of
    /// `--graph` (phase 2).
    Measure {
        #[command(flatten)]
        input: QueryInput,

        /// SPARQL endpoint URL.
        #[arg(long, env = "SPARQLED_ENDPOINT")]
        endpoint: Option<String>,

        /// Graph of the popularity pass (`FROM <graph>`).
        #[arg(long)]
        graph: Option<String>,

        /// Request timeout in seconds (0 disables it).
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Args)]
struct QueryInput {
    /// Query file (`-` or omitted: read stdin).
    query: Option<PathBuf>,

    /// Handlebars template for the recommendation query.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

impl QueryInput {
    fn read_query(&self) -> Result<String> {
        match &self.query {
            Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
                .with_context(|| format!("failed to read query {}", path.display())),
            _ => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("failed to read query from stdin")?;
                Ok(text)
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Recommend { input } => cmd_recommend(&config, &input)?,
        Commands::Measure {
            input,
            endpoint,
            graph,
            timeout,
        } => {
            let endpoint_config = EndpointConfig {
                url: endpoint.unwrap_or_else(|| config.endpoint.url.clone()),
                timeout_secs: timeout.unwrap_or(config.endpoint.timeout_secs),
                ..config.endpoint.clone()
            };
            let graph = graph.or_else(|| config.default_graph.clone());
            cmd_measure(&config, &input, &endpoint_config, graph.as_deref())?
        }
    }

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// recommend
// ============================================================================

fn cmd_recommend(config: &CliConfig, input: &QueryInput) -> Result<()> {
    let template = config.template(input.template.as_deref(), RecommendationTemplate::default)?;
    let query = input.read_query()?;

    let mut scope = Scope::with_template(template);
    scope.parse(&query)?;
    let recommendation = scope.recommend()?;

    if input.json {
        println!("{}", serde_json::to_string_pretty(&recommendation)?);
        return Ok(());
    }

    if recommendation.kind == RecommendationType::None {
        eprintln!(
            "{} no `<` focus marker in the query",
            "warning:".yellow().bold()
        );
    }
    println!(
        "{} {}",
        "Recommendation".green().bold(),
        recommendation.kind.to_string().cyan()
    );
    println!("{}", recommendation.query.trim_end());
    Ok(())
}

// ============================================================================
// measure
// ============================================================================

fn cmd_measure(
    config: &CliConfig,
    input: &QueryInput,
    endpoint_config: &EndpointConfig,
    graph: Option<&str>,
) -> Result<()> {
    let template = config.template(input.template.as_deref(), RecommendationTemplate::counting)?;
    let query = input.read_query()?;
    let endpoint = HttpEndpoint::new(endpoint_config)?;

    if !input.json {
        println!(
            "{} {}",
            "Measuring against".green().bold(),
            endpoint.url().as_str().cyan()
        );
        if let Some(graph) = graph {
            println!("  Graph: {}", graph.cyan());
        }
    }

    let measurement = measure(&endpoint, graph, &query, template)?;

    if input.json {
        println!("{}", serde_json::to_string_pretty(&measurement)?);
        return Ok(());
    }

    match &measurement {
        Measurement::Ranked {
            kind,
            min,
            max,
            mean,
            elapsed,
            top,
        } => {
            println!("  Type: {}", kind.to_string().cyan());
            println!("  Recommendation time: {}", format_elapsed(*elapsed));
            println!("  Popularity: min {min}, max {max}, mean {mean:.2}");
            println!("  Top candidates:");
            for (rank, candidate) in top.iter().enumerate() {
                println!(
                    "    {:>2}. {} ({})",
                    rank + 1,
                    candidate.value.to_string().yellow(),
                    candidate.count
                );
            }
        }
        Measurement::NoCandidates { kind, elapsed } => {
            println!("  Type: {}", kind.to_string().cyan());
            println!("  Recommendation time: {}", format_elapsed(*elapsed));
            println!("{}", "No candidates.".yellow());
        }
    }
    Ok(())
}

fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1} ms", elapsed.as_secs_f64() * 1000.0)
}
