//! `orc sync` command - pull upstream data and derive contract lines

use chrono::Datelike;
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::helpers::Workspace;
use crate::cli::GlobalOpts;
use crate::contratos;
use crate::sync::{EolClient, ReqwestTransport, SofClient};

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Fetch the empenhos of every listed contract from SOF
    Sof {
        /// Last commitment year to request (default: current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// Pull dres, school types and schools from the EOL registry
    Eol {
        /// Year the school records are stored under (default: current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// Rebuild the contract lines from the empenho cache
    Execucoes,

    /// Write one contratos_<year>.csv per fiscal year
    Export {
        /// Target directory (default: .orc/exports)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Last fiscal year to export (default: current year)
        #[arg(long)]
        last_year: Option<i32>,
    },
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}

pub fn run(cmd: SyncCommands, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;
    match cmd {
        SyncCommands::Sof { year } => run_sof(&workspace, year.unwrap_or_else(current_year)),
        SyncCommands::Eol { year } => run_eol(&workspace, year.unwrap_or_else(current_year)),
        SyncCommands::Execucoes => run_execucoes(&workspace),
        SyncCommands::Export { dir, last_year } => run_export(
            &workspace,
            dir.unwrap_or_else(|| workspace.project.exports_dir()),
            last_year.unwrap_or_else(current_year),
        ),
    }
}

fn run_sof(workspace: &Workspace, year: i32) -> Result<()> {
    let sof = &workspace.settings.sof;
    if sof.token.is_none() {
        eprintln!(
            "{} No SOF token configured (set ORC_SOF_TOKEN or sof.token)",
            style("!").yellow()
        );
    }
    let transport = ReqwestTransport::new(Duration::from_secs(sof.timeout_secs)).into_diagnostic()?;
    let client = SofClient::new(transport, sof.clone());

    println!("{} Syncing contracts from {}", style("→").blue(), style(&sof.url).cyan());
    let summary = client.sync_contratos(&workspace.store, year)?;

    println!("{} Synced {} contracts", style("✓").green(), style(summary.contratos).cyan());
    println!("  Empenhos created: {}", style(summary.empenhos_created).green());
    println!("  Empenhos updated: {}", style(summary.empenhos_updated).yellow());
    if summary.failed_requests > 0 {
        println!(
            "  Failed requests:  {} (see {})",
            style(summary.failed_requests).red(),
            style("orc db failed").yellow()
        );
    }
    Ok(())
}

fn run_eol(workspace: &Workspace, year: i32) -> Result<()> {
    let eol = &workspace.settings.eol;
    let transport = ReqwestTransport::new(Duration::from_secs(eol.timeout_secs)).into_diagnostic()?;
    let client = EolClient::new(transport, eol.clone());

    println!("{} Syncing registry from {}", style("→").blue(), style(&eol.url).cyan());
    let (dres_created, dres_updated) = client.update_dre_table(&workspace.store)?;
    let tipos_created = client.update_tipo_escola_table(&workspace.store)?;
    let escolas_created = client.update_escola_table(&workspace.store, year)?;

    println!("{} Registry synced for {}", style("✓").green(), style(year).cyan());
    println!("  Dres:           {} new, {} updated", dres_created, dres_updated);
    println!("  School types:   {} new", tipos_created);
    println!("  Schools:        {} new", escolas_created);
    Ok(())
}

fn run_execucoes(workspace: &Workspace) -> Result<()> {
    let lines = contratos::generate_execucoes(&workspace.store)?;
    println!("{} Generated {} contract lines", style("✓").green(), style(lines).cyan());
    println!(
        "  Tag them with {}",
        style("orc fromto").yellow()
    );
    Ok(())
}

fn run_export(workspace: &Workspace, dir: PathBuf, last_year: i32) -> Result<()> {
    let written = contratos::export_spreadsheets(&workspace.store, &dir, last_year)?;
    if written.is_empty() {
        println!("{} No empenhos to export", style("!").yellow());
        return Ok(());
    }
    for path in &written {
        println!("{} {}", style("✓").green(), style(path.display()).cyan());
    }
    Ok(())
}
