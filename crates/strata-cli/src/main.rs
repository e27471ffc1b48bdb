//! strata CLI — the command-line interface to strata.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use strata_core::commit::Commit;
use strata_core::config::RepoConfig;
use strata_core::state::StatusReport;
use strata_core::{MergeOutcome, Repository, StrataError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata", about = "strata — local version control", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new repository in the current directory.
    Init {
        /// Name of the initial branch (defaults to "master").
        #[arg(long, short)]
        branch: Option<String>,
    },

    /// Stage a file for the next commit.
    Add { path: String },

    /// Unstage a file, or mark a tracked file for removal.
    Rm { path: String },

    /// Record the staged changes.
    Commit { message: Option<String> },

    /// Show first-parent history from HEAD.
    Log,

    /// Show every commit ever made.
    GlobalLog,

    /// Print the ids of commits with exactly this message.
    Find { message: String },

    /// Show branches, staged and removed files, and working-tree changes.
    Status {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Restore files or switch branches.
    ///
    ///   checkout -- <path>
    ///   checkout <commit> -- <path>
    ///   checkout <branch>
    Checkout {
        target: Option<String>,

        #[arg(last = true)]
        path: Option<String>,
    },

    /// Create a branch at HEAD.
    Branch { name: String },

    /// Delete a branch pointer.
    RmBranch { name: String },

    /// Move the current branch to a commit and check it out.
    Reset { commit: String },

    /// Merge a branch into the current branch.
    Merge { branch: String },
}

fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            tracing::debug!(error = %e, "argument parsing failed");
            println!("{}", StrataError::IncorrectOperands);
            return ExitCode::SUCCESS;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<StrataError>() {
            Some(e) if e.is_user_error() => {
                println!("{e}");
                ExitCode::SUCCESS
            }
            _ => {
                tracing::error!("{err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STRATA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let open = || Repository::open(&cwd);

    match cli.command {
        Commands::Init { branch } => cmd_init(&cwd, branch)?,
        Commands::Add { path } => {
            open()?.add(&path)?;
        }
        Commands::Rm { path } => open()?.remove(&path)?,
        Commands::Commit { message } => {
            open()?.commit(message.as_deref().unwrap_or_default())?;
        }
        Commands::Log => print_commits(&open()?.log()?),
        Commands::GlobalLog => print_commits(&open()?.global_log()?),
        Commands::Find { message } => {
            for id in open()?.find(&message)? {
                println!("{id}");
            }
        }
        Commands::Status { format } => cmd_status(&open()?, &format)?,
        Commands::Checkout { target, path } => {
            let repo = open()?;
            match (target, path) {
                (None, Some(path)) => repo.checkout_file(&path)?,
                (Some(commit), Some(path)) => repo.checkout_file_from(&commit, &path)?,
                (Some(branch), None) => {
                    repo.checkout_branch(&branch)?;
                }
                (None, None) => return Err(StrataError::IncorrectOperands.into()),
            }
        }
        Commands::Branch { name } => open()?.branch(&name)?,
        Commands::RmBranch { name } => open()?.remove_branch(&name)?,
        Commands::Reset { commit } => {
            open()?.reset(&commit)?;
        }
        Commands::Merge { branch } => match open()?.merge(&branch)? {
            MergeOutcome::AlreadyAncestor => {
                println!("Given branch is an ancestor of the current branch.")
            }
            MergeOutcome::FastForwarded(_) => println!("Current branch fast-forwarded."),
            MergeOutcome::Merged { conflicts, .. } => {
                if !conflicts.is_empty() {
                    println!("Encountered a merge conflict.");
                }
            }
        },
    }

    Ok(())
}

fn cmd_init(cwd: &Path, branch: Option<String>) -> Result<()> {
    let mut config = RepoConfig::default();
    if let Some(branch) = branch {
        config.default_branch = branch;
    }
    Repository::init_with(cwd, config)?;
    Ok(())
}

fn cmd_status(repo: &Repository, format: &str) -> Result<()> {
    let status = repo.status()?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&status)?),
        _ => print_status(&status),
    }
    Ok(())
}

fn print_commits(commits: &[Commit]) {
    for commit in commits {
        println!("===");
        println!("commit {}", commit.id);
        if let (Some(parent), Some(second)) = (&commit.parent, &commit.second_parent) {
            println!(
                "Merge: {} {}",
                strata_core::hash::short_id(parent),
                strata_core::hash::short_id(second)
            );
        }
        println!(
            "Date: {}",
            commit
                .timestamp
                .with_timezone(&Local)
                .format("%a %b %d %H:%M:%S %Y %z")
        );
        println!("{}", commit.message);
        println!();
    }
}

fn print_status(status: &StatusReport) {
    println!("=== Branches ===");
    for branch in &status.branches {
        if *branch == status.current_branch {
            println!("*{branch}");
        } else {
            println!("{branch}");
        }
    }
    println!();

    println!("=== Staged Files ===");
    for path in &status.staged {
        println!("{path}");
    }
    println!();

    println!("=== Removed Files ===");
    for path in &status.removed {
        println!("{path}");
    }
    println!();

    println!("=== Modifications Not Staged For Commit ===");
    for (path, kind) in &status.unstaged {
        println!("{path} ({})", kind.label());
    }
    println!();

    println!("=== Untracked Files ===");
    for path in &status.untracked {
        println!("{path}");
    }
    println!();
}
