use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use sasori::output::{self, Summary};
use sasori::pipeline::{self, Command};
use sasori::writer::{Confirm, Decline, StdinConfirm};
use sasori::{config, error, providers, repo, tracking};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sasori")]
#[command(version)]
#[command(about = "Generate tests, READMEs and fixes with an LLM and write them into your repository", long_about = None)]
struct Cli {
    /// Provider to use (anthropic, openai, gemini)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model preset or raw model identifier
    #[arg(long, global = true)]
    model: Option<String>,

    /// Show progress logs (SASORI_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WriteArgs {
    /// Skip prompts and overwrite files unconditionally
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update unit tests for every tracked file
    UnitTest(WriteArgs),
    /// Create or update README.md
    Readme(WriteArgs),
    /// Fix mypy errors in every tracked file
    Mypy(WriteArgs),
    /// Improve typer log messages in every tracked file
    TyperLog(WriteArgs),
    /// Manage the files marked as in progress
    Track {
        #[command(subcommand)]
        action: TrackAction,
    },
}

#[derive(Subcommand)]
enum TrackAction {
    /// Mark files as in progress
    Add {
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,
    },
    /// Stop tracking files
    Remove {
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,
    },
    /// List tracked files
    List,
    /// Stop tracking all files
    Clear,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("SASORI_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Cannot read working directory: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let root = repo::find_repo_root(&cwd);

    let overrides = config::Overrides {
        provider: cli.provider,
        model: cli.model,
    };

    let (command, args) = match cli.command {
        Commands::UnitTest(args) => (Command::UnitTest, args),
        Commands::Readme(args) => (Command::Readme, args),
        Commands::Mypy(args) => (Command::Mypy, args),
        Commands::TyperLog(args) => (Command::TyperLog, args),
        Commands::Track { action } => return track(&root, &cwd, action),
    };

    match run(command, args.force, &root, &overrides).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("❌ {}", e).red());
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Command,
    force: bool,
    root: &Path,
    overrides: &config::Overrides,
) -> error::Result<ExitCode> {
    let tracked = if command == Command::Readme {
        Vec::new()
    } else {
        let store = tracking::TrackingStore::load(root)?;
        pipeline::existing_files(root, store.files())
    };

    let tasks = pipeline::plan(command, &tracked);
    if tasks.is_empty() {
        eprintln!(
            "{}",
            "No files are being processed. Add some with `sasori track add <paths>`.".yellow()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let client = providers::get_client(None, overrides)?.with_root(root);
    tracing::info!(
        "{} item(s) for {} in {}",
        tasks.len(),
        client.config().model,
        root.display()
    );

    let mut confirm: Box<dyn Confirm> = if force || !std::io::stdin().is_terminal() {
        if !force {
            tracing::warn!("stdin is not a terminal; differing files will be kept");
        }
        Box::new(Decline)
    } else {
        Box::new(StdinConfirm)
    };

    let results = pipeline::run_batch(&client, tasks, force, confirm.as_mut(), |result| {
        output::report_item(command, result)
    })
    .await;

    Summary::from_results(&results).print();

    if pipeline::batch_failed(&results) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn track(root: &Path, cwd: &Path, action: TrackAction) -> ExitCode {
    let result = (|| -> error::Result<()> {
        let mut store = tracking::TrackingStore::load(root)?;
        match action {
            TrackAction::Add { paths } => {
                let paths: Vec<PathBuf> = paths.iter().map(|p| cwd.join(p)).collect();
                let added = store.add(&paths)?;
                store.save()?;
                eprintln!("Tracking {} new file(s)", added);
            }
            TrackAction::Remove { paths } => {
                let paths: Vec<PathBuf> = paths.iter().map(|p| cwd.join(p)).collect();
                let removed = store.remove(&paths)?;
                store.save()?;
                eprintln!("Stopped tracking {} file(s)", removed);
            }
            TrackAction::List => {
                for file in store.files() {
                    println!("{}", file);
                }
            }
            TrackAction::Clear => {
                store.clear();
                store.save()?;
                eprintln!("Cleared tracked files");
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("❌ {}", e).red());
            ExitCode::FAILURE
        }
    }
}
