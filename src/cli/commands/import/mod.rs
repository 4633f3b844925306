//! `orc import` command - Import spreadsheets from CSV files

mod budget;
mod common;
mod contracts;
mod places;

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use crate::cli::helpers::Workspace;
use crate::cli::GlobalOpts;
use crate::core::store::{compute_hash, Store};

pub use common::{generate_template, ImportKind, ImportStats};

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Spreadsheet kind
    #[arg(value_enum)]
    pub kind: ImportKind,

    /// CSV file to import
    pub file: Option<PathBuf>,

    /// Print a CSV template for the kind
    #[arg(long)]
    pub template: bool,

    /// Validate the CSV without writing to the store
    #[arg(long)]
    pub dry_run: bool,

    /// Continue importing after errors (default: stop on first error)
    #[arg(long)]
    pub skip_errors: bool,

    /// Import even if this exact file was imported before
    #[arg(long)]
    pub force: bool,
}

/// Import one file; skipped when its hash is already logged for the kind
pub fn import_file(
    store: &Store,
    kind: ImportKind,
    path: &Path,
    args: &common::ImportArgs,
) -> Result<ImportStats> {
    let content = std::fs::read(path).into_diagnostic()?;
    let hash = compute_hash(&content);
    if !args.force && store.import_seen(kind.as_str(), &hash)? {
        tracing::info!(kind = kind.as_str(), file = %path.display(), "file already imported");
        return Ok(ImportStats {
            already_imported: true,
            ..Default::default()
        });
    }

    let stats = match kind {
        ImportKind::Escolas => places::import_escolas(store, &content, args)?,
        ImportKind::TiposEscola => places::import_tipos_escola(store, &content, args)?,
        ImportKind::DistritoZona => places::import_distrito_zona(store, &content, args)?,
        ImportKind::Recursos => places::import_recursos(store, &content, args)?,
        ImportKind::Execucoes => budget::import_execucoes(store, &content, args)?,
        ImportKind::Fontes => budget::import_fontes(store, &content, args)?,
        ImportKind::Deflatores => budget::import_deflatores(store, &content, args)?,
        ImportKind::Contratos => contracts::import_contratos(store, &content, args)?,
        ImportKind::CategoriasFromto => contracts::import_categorias_fromto(store, &content, args)?,
    };

    if !args.dry_run {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        store.log_import(kind.as_str(), &file_name, &hash, &stats.added, &stats.not_added)?;
        store.touch(kind.meta_key())?;
    }
    tracing::info!(
        kind = kind.as_str(),
        rows = stats.rows_processed,
        created = stats.created,
        updated = stats.updated,
        errors = stats.errors,
        "import finished"
    );
    Ok(stats)
}

pub fn run(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    if args.template {
        print!("{}", generate_template(args.kind)?);
        eprintln!();
        eprintln!(
            "{} Template generated. Redirect to file: orc import --template {} > {}.csv",
            style("→").blue(),
            args.kind.as_str(),
            args.kind.as_str()
        );
        return Ok(());
    }

    let file_path = args.file.clone().ok_or_else(|| {
        miette::miette!("CSV file required. Usage: orc import {} data.csv", args.kind.as_str())
    })?;
    if !file_path.exists() {
        return Err(miette::miette!("File not found: {}", file_path.display()));
    }

    let workspace = Workspace::open(global)?;

    println!(
        "{} Importing {} from {}{}",
        style("→").blue(),
        style(args.kind.as_str()).cyan(),
        style(file_path.display()).yellow(),
        if args.dry_run {
            style(" (dry run)").dim().to_string()
        } else {
            String::new()
        }
    );
    println!();

    let internal_args = common::ImportArgs {
        dry_run: args.dry_run,
        skip_errors: args.skip_errors,
        force: args.force,
    };
    let stats = import_file(&workspace.store, args.kind, &file_path, &internal_args)?;

    if stats.already_imported {
        println!(
            "{} This file was already imported as {}. Use {} to import it again.",
            style("!").yellow(),
            args.kind.as_str(),
            style("--force").yellow()
        );
        return Ok(());
    }

    println!("{}", style("─".repeat(50)).dim());
    println!("{}", style("Import Summary").bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  Rows processed:   {}", style(stats.rows_processed).cyan());
    println!("  Created:          {}", style(stats.created).green());
    if stats.updated > 0 {
        println!("  Updated:          {}", style(stats.updated).yellow());
    }
    if stats.errors > 0 {
        println!("  Errors:           {}", style(stats.errors).red());
    }
    let missing = stats.not_added.len().saturating_sub(stats.errors);
    if missing > 0 {
        println!("  Without record:   {}", style(missing).dim());
    }

    if args.dry_run {
        println!();
        println!("{}", style("Dry run complete. Nothing was written.").yellow());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_same_file_is_imported_once() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("deflatores.csv");
        fs::write(&path, "year,index\n2018,5000\n").unwrap();

        let store = Store::open_in_memory().unwrap();
        let args = common::ImportArgs::default();
        let first = import_file(&store, ImportKind::Deflatores, &path, &args).unwrap();
        assert_eq!(first.created, 1);

        let second = import_file(&store, ImportKind::Deflatores, &path, &args).unwrap();
        assert!(second.already_imported);

        let forced = common::ImportArgs {
            force: true,
            ..Default::default()
        };
        let third = import_file(&store, ImportKind::Deflatores, &path, &forced).unwrap();
        assert_eq!(third.updated, 1);

        let log = store.import_log().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].file_name, "deflatores.csv");
        assert_eq!(log[0].file_hash, compute_hash(b"year,index\n2018,5000\n"));
        assert!(store.get_meta(ImportKind::Deflatores.meta_key()).unwrap().is_some());
    }
}
