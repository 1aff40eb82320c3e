use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use kitree_sync::{DesignWalker, ExportReport, export_jlc_bom, export_jlc_xy};

use crate::Globals;
use crate::config::UserConfig;
use crate::project::Project;

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(subcommand)]
    format: ExportFormat,
}

#[derive(Subcommand, Debug)]
enum ExportFormat {
    /// JLCPCB assembly bill of materials
    JlcBom {
        /// Folder the CSV file is written to
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,
    },

    /// JLCPCB assembly placement (XY) data
    JlcXy {
        /// Folder the CSV file is written to
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,
    },
}

pub fn execute(args: ExportArgs, globals: &Globals) -> Result<()> {
    let user = UserConfig::load_from(&globals.config_path)?;
    let project = Project::open(&globals.project_dir)?;
    let walker = DesignWalker::new(project.config.parts.iter().cloned(), user.fields.ipn.as_str());

    let report = match args.format {
        ExportFormat::JlcBom { out_dir } => {
            ensure_dir(&out_dir)?;
            let client = project.connect(&user)?;
            export_jlc_bom(&client, &project.layout, &walker, &out_dir)?
        }
        ExportFormat::JlcXy { out_dir } => {
            ensure_dir(&out_dir)?;
            export_jlc_xy(&project.layout, &walker, &out_dir)?
        }
    };

    print_report(&report);
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))
}

fn print_report(report: &ExportReport) {
    for (what, reason) in &report.skipped {
        println!("{} {}: {reason}", "Skipped".yellow(), what.bold());
    }
    println!(
        "{} {} rows to {}",
        "Exported".green(),
        report.rows,
        report.path.display()
    );
}
