use anyhow::Context;
use loader_core::plan::{CyclePlan, PlannedStack};
use loader_core::scan::{file_name, RunConfiguration};

use crate::output::{print_json, print_table};
use crate::LoaderArgs;

pub fn run(args: &LoaderArgs, json: bool) -> anyhow::Result<()> {
    let settings = args.settings();
    let config = RunConfiguration::scan(&settings).context("scan failed")?;
    let plan = CyclePlan::build(&config)?;

    if json {
        return print_json(&plan);
    }

    if config.is_empty() {
        println!("Nothing staged under {}.", settings.data_dir.display());
        return Ok(());
    }

    let mut rows = Vec::new();
    for archive in &plan.uncompressed {
        rows.push(vec!["archive".into(), file_name(archive), String::new(), String::new()]);
    }
    for archive in &plan.compressed {
        rows.push(vec!["archive.gz".into(), file_name(archive), String::new(), String::new()]);
    }
    for stack in &plan.stacks_to_run {
        let note = if stack.excluded { "excluded" } else { "bring up" };
        rows.push(stack_row("run", stack, note));
    }
    for stack in &plan.stacks_to_load {
        rows.push(stack_row("load", stack, ""));
    }
    print_table(&["KIND", "NAME", "IMAGES", "NOTE"], rows);

    println!();
    println!(
        "{} unit(s); artifacts {} after load.",
        plan.root_total(),
        if plan.delete_after_load { "deleted" } else { "kept" }
    );
    Ok(())
}

fn stack_row(kind: &str, stack: &PlannedStack, note: &str) -> Vec<String> {
    vec![
        kind.to_string(),
        stack.name.clone(),
        stack.images.join(","),
        note.to_string(),
    ]
}
