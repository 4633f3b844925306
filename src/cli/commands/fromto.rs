//! `orc fromto` command - tag contract lines with canonical categories

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::Workspace;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::contratos;

#[derive(clap::Args, Debug)]
pub struct FromtoArgs {}

pub fn run(_args: FromtoArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;
    let summary = contratos::apply_categorias_fromto(&workspace.store, &workspace.settings)?;

    if global.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        return Ok(());
    }
    if summary.rows == 0 {
        println!(
            "{} No from-to rows. Load them with {}",
            style("!").yellow(),
            style("orc import categorias-fromto <file>").yellow()
        );
        return Ok(());
    }
    println!(
        "{} Applied {} from-to rows",
        style("✓").green(),
        style(summary.rows).cyan()
    );
    println!("  Categories created: {}", style(summary.categorias_created).green());
    println!("  Lines tagged:       {}", style(summary.lines_tagged).cyan());
    Ok(())
}
