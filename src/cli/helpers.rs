//! Shared helper functions for CLI commands
//!
//! Opening the project store and writing a report payload in the requested
//! output format.

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Settings;
use crate::core::project::Project;
use crate::core::store::Store;
use crate::render::{HtmlRenderer, Table, Tabular};

/// Project, settings and store of one command invocation
pub struct Workspace {
    pub project: Project,
    pub settings: Settings,
    pub store: Store,
}

impl Workspace {
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let project =
            Project::locate(global.project.as_deref()).map_err(|e| miette::miette!("{}", e))?;
        let settings = Settings::load(Some(&project));
        let store = Store::open(&project)?;
        tracing::debug!(root = %project.root().display(), "opened project");
        Ok(Self {
            project,
            settings,
            store,
        })
    }
}

/// Write to the `--output` file, or stdout
pub fn write_output(content: &str, output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => {
            let file = File::create(path).into_diagnostic()?;
            let mut writer = BufWriter::new(file);
            writer.write_all(content.as_bytes()).into_diagnostic()?;
            eprintln!(
                "{} Report written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}

/// Tables one after the other, each under its title
fn join_tables(tables: &[Table], format: OutputFormat) -> Result<String> {
    let mut out = String::new();
    for table in tables {
        match format {
            OutputFormat::Csv => {
                if tables.len() > 1 {
                    out.push_str(&format!("# {}\n", table.title));
                }
                out.push_str(&table.to_csv().into_diagnostic()?);
            }
            OutputFormat::Md => {
                out.push_str(&format!("## {}\n\n{}\n", table.title, table.to_markdown()));
            }
            _ => {
                out.push_str(&format!("{}\n{}\n", style(&table.title).bold(), table.to_text()));
            }
        }
        out.push('\n');
    }
    Ok(out)
}

/// Render a payload in the global format
///
/// `page` names the HTML template; payloads without one cannot be rendered
/// as HTML.
pub fn render_payload<T>(payload: &T, page: Option<&str>, format: OutputFormat) -> Result<String>
where
    T: Serialize + Tabular,
{
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(payload).into_diagnostic()?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Html => {
            let page = page
                .ok_or_else(|| miette::miette!("this output has no HTML page; use csv or json"))?;
            let renderer = HtmlRenderer::new().into_diagnostic()?;
            renderer.render(page, payload).into_diagnostic()
        }
        OutputFormat::Csv | OutputFormat::Md | OutputFormat::Auto => {
            join_tables(&payload.tables(), format)
        }
    }
}

/// Render and write a payload
pub fn emit<T>(payload: &T, page: Option<&str>, global: &GlobalOpts) -> Result<()>
where
    T: Serialize + Tabular,
{
    let content = render_payload(payload, page, global.format)?;
    write_output(&content, global.output.as_deref())
}

/// Write a spreadsheet: CSV unless another format was asked for
///
/// Without `--output` in CSV mode the table title is used as the file name
/// hint on stderr.
pub fn emit_download(table: &Table, global: &GlobalOpts) -> Result<()> {
    let format = match global.format {
        OutputFormat::Auto => OutputFormat::Csv,
        other => other,
    };
    if format == OutputFormat::Csv && global.output.is_none() && !global.quiet {
        eprintln!(
            "{} {} rows (save with --output {})",
            style("→").blue(),
            table.rows.len(),
            table.title
        );
    }
    emit(table, None, &GlobalOpts { format, ..global.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_of_single_table_has_no_title_line() {
        let mut table = Table::new("mosaico_grupos.csv", ["year", "grupo_id"]);
        table.push(["2019", "1"]);
        let csv = render_payload(&table, None, OutputFormat::Csv).unwrap();
        assert!(csv.starts_with("year,grupo_id\n2019,1\n"));
    }

    #[test]
    fn test_html_requires_page() {
        let table = Table::new("t", ["a"]);
        assert!(render_payload(&table, None, OutputFormat::Html).is_err());
    }

    #[test]
    fn test_markdown_titles() {
        let mut table = Table::new("Zonas", ["zona", "total"]);
        table.push(["Norte", "150.00"]);
        let md = render_payload(&table, None, OutputFormat::Md).unwrap();
        assert!(md.starts_with("## Zonas"));
        assert!(md.contains("| Norte"));
    }
}
