use super::SearchArgs;
use crate::output::{print_json, print_prompt};
use anyhow::Context;
use clap::Args;
use ctx_core::io::write_output;
use ctx_core::process::SystemRunner;
use ctx_core::remote::SystemFetcher;
use ctx_core::{Agent, Assembler, Params, Selectors};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Args)]
pub struct RunArgs {
    /// Task name: the task file's name without its extension
    task: String,

    /// Parameter for ${name} expansion (repeatable)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Only include files whose frontmatter matches (repeatable)
    #[arg(short = 's', long = "selector", value_name = "KEY=VALUE")]
    selectors: Vec<String>,

    /// Target agent; rules it already reads natively are left out
    #[arg(short = 'a', long)]
    agent: Option<String>,

    /// Resume a session: skip rules, skills and bootstraps
    #[arg(short = 'r', long)]
    resume: bool,

    #[command(flatten)]
    search: SearchArgs,

    /// Text appended to the task after a `---` line; may hold slash commands
    #[arg(long)]
    prompt: Option<String>,

    /// Write the prompt to this file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Kill shell expansions and bootstraps after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

pub fn run(dir: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let mut options = args.search.options(dir);
    options.params = Params::from_assignments(&args.params)?;
    options.selectors = Selectors::from_assignments(&args.selectors)?;
    options.agent = args.agent.as_deref().map(str::parse::<Agent>).transpose()?;
    options.resume = args.resume;
    options.user_prompt = args.prompt;

    let runner = SystemRunner::new(args.timeout.map(Duration::from_secs));
    let result = Assembler::new(options, &runner, &SystemFetcher)
        .run(&args.task)
        .with_context(|| format!("cannot assemble task '{}'", args.task))?;

    if let Some(path) = &args.output {
        write_output(path, &result.prompt)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if json {
        return print_json(&result);
    }

    match &args.output {
        Some(path) => println!(
            "Wrote {} ({} rules, {} tokens)",
            path.display(),
            result.rules.len(),
            result.tokens
        ),
        None => print_prompt(&result.prompt),
    }
    Ok(())
}
