mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{list::ListArgs, run::RunArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "coding-context",
    about = "Assemble rules, skills and a task into a single prompt for a coding agent",
    version,
    propagate_version = true
)]
struct Cli {
    /// Working directory (default: current directory)
    #[arg(short = 'C', long = "dir", global = true, env = "CODING_CONTEXT_DIR")]
    dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log discovery decisions to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the context for a task and print it
    Run(RunArgs),

    /// List the tasks visible from the search paths
    List(ListArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    // stdout carries the prompt; all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let dir = root::resolve_dir(cli.dir.as_deref());

    let result = match cli.command {
        Commands::Run(args) => cmd::run::run(&dir, args, cli.json),
        Commands::List(args) => cmd::list::run(&dir, args, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
