use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sessiondag::cli::{compactions, path, scan, sidechains, stats, tools};
use sessiondag::config::Config;
use sessiondag::source::DecodePolicy;
use sessiondag::AnalysisOptions;

#[derive(Parser)]
#[command(name = "sessiondag")]
#[command(about = "Conversation log DAG engine: active paths, sidechains, branches and tool usage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = "sessiondag.yaml")]
    config: String,

    /// Abort on the first undecodable line instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show session statistics and every non-fatal condition
    Stats {
        /// Session log file (.jsonl or .jsonl.zst)
        file: PathBuf,
    },

    /// Show the active conversation path
    Path {
        /// Session log file
        file: PathBuf,

        /// Start from this root instead of the current conversation
        #[arg(short, long)]
        root: Option<String>,
    },

    /// List delegated sub-conversations
    Sidechains {
        /// Session log file
        file: PathBuf,

        /// Only sidechains spawned by this node, with their members
        #[arg(short, long)]
        delegation: Option<String>,
    },

    /// Show tool usage per tool name
    Tools {
        /// Session log file
        file: PathBuf,
    },

    /// List compaction boundaries
    Compactions {
        /// Session log file
        file: PathBuf,

        /// Show the nearest boundary preceding this node
        #[arg(short, long)]
        node: Option<String>,
    },

    /// Analyze many sessions in parallel
    Scan {
        /// Directory to search (defaults to the configured sessions path)
        dir: Option<PathBuf>,

        /// Glob pattern instead of a directory walk
        #[arg(short, long)]
        pattern: Option<String>,

        /// Worker count (defaults to config)
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Default to WARN; use RUST_LOG=debug for details
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config = Config::load(&cli.config).unwrap_or_default();

    let mut options = AnalysisOptions::from_config(&config);
    if cli.strict {
        options.decode_policy = DecodePolicy::Abort;
    }

    match cli.command {
        Commands::Stats { file } => {
            stats::run(&file, &options, cli.json)?;
        }
        Commands::Path { file, root } => {
            path::run(&file, &options, root.as_deref(), cli.json)?;
        }
        Commands::Sidechains { file, delegation } => {
            sidechains::run(&file, &options, delegation.as_deref(), cli.json)?;
        }
        Commands::Tools { file } => {
            tools::run(&file, &options, cli.json)?;
        }
        Commands::Compactions { file, node } => {
            compactions::run(&file, &options, node.as_deref(), cli.json)?;
        }
        Commands::Scan {
            dir,
            pattern,
            workers,
        } => {
            let dir = dir.unwrap_or_else(|| config.sessions_path());
            let sessions = scan::collect(&dir, pattern.as_deref())?;
            let workers = workers.unwrap_or_else(|| config.worker_count());
            scan::run(sessions, options, workers, cli.json)?;
        }
    }

    Ok(())
}
