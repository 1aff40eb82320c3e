use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use kitree_sync::{AssetCache, BomSynchronizer, BuildReport, LibraryBuilder, SyncReport};

use crate::config::UserConfig;
use crate::project::Project;
use crate::{Globals, error_chain};

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(subcommand)]
    target: BuildTarget,
}

#[derive(Subcommand, Debug)]
enum BuildTarget {
    /// Rebuild the project's symbol and footprint libraries
    Libs,

    /// Rewrite the master part's BOM from the schematic
    Bom,
}

pub fn execute(args: BuildArgs, globals: &Globals) -> Result<()> {
    let user = UserConfig::load_from(&globals.config_path)?;
    let project = Project::open(&globals.project_dir)?;

    match args.target {
        BuildTarget::Libs => build_libs(&project, &user),
        BuildTarget::Bom => build_bom(&project, &user),
    }
}

fn build_libs(project: &Project, user: &UserConfig) -> Result<()> {
    let parts = &project.config.parts;
    if parts.is_empty() {
        eprintln!("{}", "No parts registered, the libraries will be empty".yellow());
    }

    let client = project.connect(user)?;
    let cache = AssetCache::from_env();
    log::debug!("Caching downloads in {}", cache.root().display());

    let builder = LibraryBuilder::new(&client, project.layout.clone(), user.fields.clone(), cache);
    let report = builder.build(parts)?;
    print_build_report(&report);

    let failed = report.failed().count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} parts could not be built", parts.len());
    }
    Ok(())
}

fn print_build_report(report: &BuildReport) {
    for part in &report.parts {
        match &part.outcome {
            Ok(built) => {
                println!(
                    "{} {} as {}",
                    "OK".green(),
                    part.ipn.bold(),
                    built.library_id
                );
                for note in &built.notes {
                    println!("   {}", note.yellow());
                }
            }
            Err(err) => println!(
                "{} {}: {}",
                "FAILED".red(),
                part.ipn.bold(),
                error_chain(err)
            ),
        }
    }
    println!("Symbol library written to {}", report.symbol_library.display());
    for (kind, outcome) in &report.registries {
        log::info!("{} registry: {outcome:?}", kind.file_name());
    }
}

fn build_bom(project: &Project, user: &UserConfig) -> Result<()> {
    let master = project.master_part()?;
    let client = project.connect(user)?;

    let synchronizer = BomSynchronizer::new(&client, user.fields.ipn.as_str());
    let report = synchronizer.sync(master, &project.layout.schematic(), &project.config.parts)?;
    print_sync_report(master, &report);

    let failed = report.failed().count();
    if failed > 0 {
        anyhow::bail!("{failed} BOM lines could not be created");
    }
    Ok(())
}

fn print_sync_report(master: &str, report: &SyncReport) {
    println!(
        "Removed {} existing lines from the BOM of {}",
        report.deleted,
        master.bold()
    );
    println!("Found the following parts:");
    for (ipn, refs) in &report.references {
        println!("- {}: {}", ipn.bold(), refs.join(", "));
    }
    for line in &report.lines {
        match &line.outcome {
            Ok(()) => println!(
                "{} {} x {} ({})",
                "OK".green(),
                line.quantity,
                line.ipn.bold(),
                line.reference
            ),
            Err(err) => println!(
                "{} {}: {}",
                "FAILED".red(),
                line.ipn.bold(),
                error_chain(err)
            ),
        }
    }
}
