//! `orc db` command - inspect the local database
//!
//! The store is a single SQLite file under `.orc/data.db`; these commands
//! read it without going through any report.

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{emit, Workspace};
use crate::cli::GlobalOpts;
use crate::core::store::{META_CONTRATOS, META_MOSAICO, META_REGIONALIZACAO};
use crate::render::Table;

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Show row counts and database size
    Stats,

    /// Execute a SQL query against the store
    Query {
        /// SQL query to execute
        sql: String,
    },

    /// List imported spreadsheets
    Log,

    /// List upstream requests that failed during sync
    Failed,
}

pub fn run(cmd: DbCommands, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;
    match cmd {
        DbCommands::Stats => run_stats(&workspace),
        DbCommands::Query { sql } => run_query(&workspace, &sql, global),
        DbCommands::Log => run_log(&workspace, global),
        DbCommands::Failed => run_failed(&workspace, global),
    }
}

fn run_stats(workspace: &Workspace) -> Result<()> {
    let db_path = workspace.project.database_path();
    let stats = workspace.store.stats(Some(&db_path))?;

    println!("{}", style("Database Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Location:        {}", db_path.display());
    println!(
        "  Database size:   {} KB",
        style(stats.db_size_bytes / 1024).cyan()
    );
    println!();
    println!("  {}", style("Rows by table:").bold());
    let mut tables: Vec<_> = stats.tables.iter().collect();
    tables.sort_by_key(|(name, _)| *name);
    for (name, count) in tables {
        println!("    {:<28} {}", name, count);
    }
    println!();
    for key in [META_REGIONALIZACAO, META_MOSAICO, META_CONTRATOS] {
        if let Some(updated) = workspace.store.get_meta(key)? {
            println!("  {:<28} {}", key, style(updated).dim());
        }
    }
    Ok(())
}

fn run_query(workspace: &Workspace, sql: &str, global: &GlobalOpts) -> Result<()> {
    let columns = workspace.store.query_columns(sql)?;
    let rows = workspace.store.query_raw(sql)?;

    let mut table = Table::new("query", columns);
    for row in rows {
        table.push(row);
    }
    emit(&table, None, global)
}

fn run_log(workspace: &Workspace, global: &GlobalOpts) -> Result<()> {
    let mut table = Table::new(
        "Imports",
        ["id", "kind", "file", "hash", "added", "not_added", "at"],
    );
    for entry in workspace.store.import_log()? {
        table.push([
            entry.id.to_string(),
            entry.kind,
            entry.file_name,
            entry.file_hash.chars().take(12).collect(),
            entry.added.len().to_string(),
            entry.not_added.len().to_string(),
            entry.created_at,
        ]);
    }
    emit(&table, None, global)
}

fn run_failed(workspace: &Workspace, global: &GlobalOpts) -> Result<()> {
    let mut table = Table::new(
        "Failed requests",
        ["id", "cod_contrato", "ano_exercicio", "ano_empenho", "error_code", "at"],
    );
    for failed in workspace.store.failed_requests()? {
        table.push([
            failed.id.to_string(),
            failed.cod_contrato.to_string(),
            failed.ano_exercicio.to_string(),
            failed.ano_empenho.to_string(),
            failed.error_code.to_string(),
            failed.created_at,
        ]);
    }
    emit(&table, None, global)
}
