// src/main.rs
use std::path::PathBuf;
use std::process::exit;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

use parutil::config::{self, Settings, DEFAULT_VERBOSITY};
use parutil::table::{Compression, ReadOptions};
use parutil::utils::{fs, git, shell};

#[derive(Parser)]
#[command(name = "parutil")]
#[command(about = "Parallel file reading and small system helpers")]
struct Args {
    #[command(subcommand)]
    command: Cli,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Cli {
    /// Read every file matching a glob pattern into one table
    Read {
        #[arg(help = "Glob pattern, e.g. 'data/part_*.csv.gz'")]
        pattern: String,

        #[arg(short, long, help = "Number of reader workers")]
        pool: Option<usize>,

        #[arg(long, help = "Force compression (gzip, none)")]
        compression: Option<Compression>,

        #[arg(long, default_value_t = 5, help = "Rows to preview")]
        show: usize,
    },

    /// Create directories (and empty files for names with an extension)
    Makedirs {
        #[arg(required = true, help = "Paths to create")]
        paths: Vec<PathBuf>,
    },

    /// Remove a directory tree
    Removedirs {
        #[arg(help = "Path to remove")]
        path: PathBuf,
    },

    /// Look up the verbosity configured next to a file
    Verbosity {
        #[arg(help = "File or directory the config lives next to")]
        anchor: PathBuf,

        #[arg(long, default_value = "config.json", help = "Config file name")]
        config_name: String,

        #[arg(long, default_value_t = DEFAULT_VERBOSITY, help = "Value when nothing is configured")]
        default: u8,
    },

    /// Show repository root and current commit
    Git {
        #[arg(long, help = "Directory inside the repository")]
        dir: Option<PathBuf>,
    },

    /// Run a shell command and print its output
    Exec {
        #[arg(help = "Command line passed to sh -c")]
        cmd: String,
    },
}

fn init_logging(verbose: bool, verbosity: u8) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config::verbosity_to_level(verbosity)
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            exit(1);
        }
    };
    init_logging(args.verbose, settings.global.verbosity);
    let settings = config::init(settings);
    info!("Using reader pool size {}", settings.reader.effective_pool_size());

    if let Err(e) = run(args.command).await {
        error!("Command execution failed: {}", e);
        exit(1);
    }

    Ok(())
}

async fn run(command: Cli) -> Result<()> {
    match command {
        Cli::Read { pattern, pool, compression, show } => {
            let options = ReadOptions {
                compression,
                has_headers: config::settings().reader.has_headers,
                ..ReadOptions::default()
            };
            // Parsing is CPU bound; keep it off the async workers
            let table = tokio::task::spawn_blocking(move || parutil::read_files(&pattern, pool, &options))
                .await??;

            println!("rows: {}", table.n_rows());
            println!("columns: {}", table.n_cols());
            println!("sum: {}", table.numeric_sum());
            println!("{}", table.head(show));
        }
        Cli::Makedirs { paths } => {
            for path in paths {
                let created = fs::make_dirs(&path)?;
                println!("{}", created.display());
            }
        }
        Cli::Removedirs { path } => {
            if fs::remove_dirs(&path)? {
                println!("Removed {}", path.display());
            } else {
                println!("Nothing to remove at {}", path.display());
            }
        }
        Cli::Verbosity { anchor, config_name, default } => {
            println!("{}", config::verbosity_lookup(&anchor, &config_name, default));
        }
        Cli::Git { dir } => {
            let root = git::repo_root(dir.as_deref()).await?;
            let hash = git::current_hash(dir.as_deref(), false).await?;
            println!("root: {}", root.display());
            println!("hash: {}", hash);
        }
        Cli::Exec { cmd } => {
            shell::command_stdout(&cmd, true).await?;
        }
    }

    Ok(())
}
