use super::SearchArgs;
use crate::output::{print_json, print_table};
use clap::Args;
use ctx_core::process::SystemRunner;
use ctx_core::remote::SystemFetcher;
use ctx_core::Assembler;
use std::path::Path;

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    search: SearchArgs,
}

pub fn run(dir: &Path, args: ListArgs, json: bool) -> anyhow::Result<()> {
    let runner = SystemRunner::default();
    let tasks = Assembler::new(args.search.options(dir), &runner, &SystemFetcher).list_tasks()?;

    if json {
        return print_json(&tasks);
    }

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    let rows = tasks
        .iter()
        .map(|t| {
            vec![
                t.name.clone(),
                t.description.clone().unwrap_or_default(),
                t.path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "DESCRIPTION", "PATH"], rows);
    Ok(())
}
