//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use duediligence_core::{AnalysisOutcome, Clients, Pipeline, ProgressReporter};
use duediligence_shared::{AppConfig, ExecutionMode, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::{mcp, server};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DueDiligence: competitive intelligence reports from public company signals.
#[derive(Parser)]
#[command(
    name = "duediligence",
    version,
    about = "Build competitive intelligence reports from a company's website, videos, and professional-network presence.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze a company and print the report.
    Analyze {
        /// Company name to research.
        query: String,

        /// Print the full outcome (report and intermediate state) as JSON.
        #[arg(long)]
        json: bool,

        /// Search region (overrides config).
        #[arg(long)]
        region: Option<String>,

        /// Model identifier (overrides config).
        #[arg(long)]
        model: Option<String>,

        /// Run independent stages concurrently.
        #[arg(long)]
        layered: bool,
    },

    /// Serve the pipeline and standalone tools over HTTP.
    Serve {
        /// Bind host (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Serve the standalone tools to an MCP client over stdio.
    Mcp,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "duediligence=info",
        1 => "duediligence=debug",
        _ => "duediligence=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            query,
            json,
            region,
            model,
            layered,
        } => cmd_analyze(&query, json, region, model, layered).await,
        Command::Serve { host, port } => cmd_serve(host, port).await,
        Command::Mcp => cmd_mcp().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(
    mut config: AppConfig,
    region: Option<String>,
    model: Option<String>,
    layered: bool,
) -> AppConfig {
    if let Some(region) = region {
        config.search.region = region;
    }
    if let Some(model) = model {
        config.llm.model = model;
    }
    if layered {
        config.pipeline.execution = ExecutionMode::Layered;
    }
    config
}

async fn cmd_analyze(
    query: &str,
    json: bool,
    region: Option<String>,
    model: Option<String>,
    layered: bool,
) -> Result<()> {
    let config = apply_overrides(load_config()?, region, model, layered);

    // Fails on missing API keys before any network work
    let clients = Clients::from_config(&config)?;
    let pipeline = Pipeline::with_defaults(clients, &config)?;

    info!(
        query,
        region = %config.search.region,
        model = %config.llm.model,
        mode = ?config.pipeline.execution,
        "analyzing company"
    );

    let reporter = CliProgress::new();
    let outcome = pipeline.run_with_progress(query, &reporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.report);
        eprintln!();
        eprintln!("  Run:  {}", outcome.run_id);
        eprintln!("  Time: {:.1}s", outcome.elapsed.as_secs_f64());
    }

    Ok(())
}

async fn cmd_serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let clients = Clients::from_config(&config)?;
    server::serve(clients, &config).await
}

async fn cmd_mcp() -> Result<()> {
    let config = load_config()?;
    let clients = Clients::from_config(&config)?;
    mcp::serve(clients, &config).await
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style.tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
            ]));
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, name: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("[{index}/{total}] {}", stage_label(name)));
    }

    fn stage_finished(&self, name: &str, elapsed: Duration) {
        self.spinner.println(format!(
            "  ✓ {} ({:.1}s)",
            stage_label(name),
            elapsed.as_secs_f64()
        ));
    }

    fn stage_contained(&self, name: &str, error: &str) {
        self.spinner
            .println(format!("  ! {}: {error}", stage_label(name)));
    }

    fn done(&self, _outcome: &AnalysisOutcome) {
        self.spinner.finish_and_clear();
    }
}

/// Human-readable label for a stage name.
fn stage_label(name: &str) -> &str {
    match name {
        "resource_discovery" => "Discovering resources",
        "website_analysis" => "Analyzing website",
        "video_analysis" => "Analyzing videos",
        "social_insights" => "Gathering social insights",
        "report_synthesis" => "Writing report",
        other => other,
    }
}
