//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs,
    contratos::ContratosArgs,
    db::DbCommands,
    fromto::FromtoArgs,
    get::GetArgs,
    import::ImportArgs,
    init::InitArgs,
    mosaico::MosaicoArgs,
    regiao::RegiaoArgs,
    sync::SyncCommands,
};

#[derive(Parser)]
#[command(name = "orc")]
#[command(author, version, about = "Public school budget transparency reports")]
#[command(
    long_about = "Imports budget, school and contract data into a local SQLite store, \
                  syncs it from the SOF and EOL APIs, and renders the regionalizacao, \
                  mosaico and contratos reports."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output (logs errors only)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logs)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .orc/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new orc project
    Init(InitArgs),

    /// Import a CSV spreadsheet into the store
    Import(ImportArgs),

    /// School budget by zona, dre, distrito and escola
    Regiao(RegiaoArgs),

    /// Budget execution by grupo/subgrupo/elemento or subfuncao/programa/projeto
    Mosaico(MosaicoArgs),

    /// Contract expenditure: totals, destinations and top 5
    Contratos(ContratosArgs),

    /// Pull data from the upstream APIs and derive contract lines
    #[command(subcommand)]
    Sync(SyncCommands),

    /// Apply the category from-to table to the contract lines
    Fromto(FromtoArgs),

    /// Resolve a navigation URL into its report
    Get(GetArgs),

    /// Inspect the local database
    #[command(subcommand)]
    Db(DbCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Tables for the terminal
    #[default]
    Auto,
    /// JSON payload (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// HTML page from the embedded templates
    Html,
    /// Markdown tables
    Md,
}
