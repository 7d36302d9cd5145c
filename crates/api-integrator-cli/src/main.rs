//! API Integrator command-line entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use api_integrator::{FileStore, Language, SourceId, Workspace};
use api_integrator_cli::commands::{self, MapCommand, SourceCommand};
use api_integrator_cli::config::resolve_state_dir;
use api_integrator_cli::ConnectionProber;

#[derive(Parser)]
#[command(
    name = "api-integrator",
    about = "Map fields between HTTP APIs and generate the integration code",
    version
)]
struct Cli {
    /// Directory holding sources, mappings and connection order.
    /// Also reads from API_INTEGRATOR_DIR env var.
    #[arg(long, global = true)]
    state_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add, inspect, edit and delete sources.
    Source {
        #[command(subcommand)]
        action: SourceCommand,
    },

    /// List the connectable fields of a source.
    Fields {
        id: SourceId,

        /// Show update payload fields instead of response fields.
        #[arg(long)]
        update: bool,
    },

    /// Create, list, reorder and delete field mappings.
    Map {
        #[command(subcommand)]
        action: MapCommand,
    },

    /// Generate integration code.
    ///
    /// Examples:
    ///   api-integrator generate --lang python > integration.py
    ///   api-integrator generate --out ./generated
    Generate {
        /// python, php or go. All languages when omitted.
        #[arg(long)]
        lang: Option<Language>,

        /// Write files into this directory instead of printing.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Dry-run the mappings against the stored response examples.
    Simulate {
        #[arg(long)]
        json: bool,
    },

    /// Call every configured endpoint and report reachability.
    TestConnections {
        #[arg(long)]
        json: bool,
    },

    /// Print workspace summary as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   api-integrator completions bash > ~/.local/share/bash-completion/completions/api-integrator
    ///   api-integrator completions zsh > ~/.zfunc/_api-integrator
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "api-integrator", &mut std::io::stdout());
        return Ok(());
    }

    let state_dir = resolve_state_dir(cli.state_dir.as_deref());
    tracing::debug!("State directory: {}", state_dir.display());
    let mut ws = Workspace::open(FileStore::open(&state_dir)?)?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Source { action } => commands::run_source(&mut ws, action, &mut stdout)?,
        Commands::Fields { id, update } => commands::show_fields(&ws, id, update, &mut stdout)?,
        Commands::Map { action } => commands::run_map(&mut ws, action, &mut stdout)?,
        Commands::Generate { lang, out } => {
            commands::generate(&ws, lang, out.as_deref(), &mut stdout)?
        }
        Commands::Simulate { json } => commands::simulate(&ws, json, &mut stdout)?,
        Commands::TestConnections { json } => {
            let prober = ConnectionProber::new();
            commands::test_connections(&ws, &prober, json, &mut stdout).await?
        }
        Commands::Info => commands::info(&ws, &state_dir, &mut stdout)?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
