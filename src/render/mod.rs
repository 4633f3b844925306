//! Rendering of report payloads
//!
//! Every payload is `Serialize` (JSON comes for free) and also flattens into
//! one or more [`Table`]s, which back the terminal, CSV and markdown outputs.
//! HTML goes through the embedded tera templates in [`html`].

pub mod html;

use serde::Serialize;
use tabled::{builder::Builder, settings::Style};
use thiserror::Error;

pub use html::HtmlRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template rendering error: {0}")]
    Template(String),

    #[error("CSV writing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output is not valid UTF-8")]
    Utf8,
}

/// A titled grid of string cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(title: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// RFC 4180 text, header line first
    pub fn to_csv(&self) -> Result<String, RenderError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| RenderError::Csv(e.into_error().into()))?;
        String::from_utf8(bytes).map_err(|_| RenderError::Utf8)
    }

    fn builder(&self) -> Builder {
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().map(String::as_str));
        for row in &self.rows {
            builder.push_record(row.iter().map(String::as_str));
        }
        builder
    }

    /// Boxed table for the terminal
    pub fn to_text(&self) -> String {
        self.builder().build().with(Style::rounded()).to_string()
    }

    pub fn to_markdown(&self) -> String {
        self.builder().build().with(Style::markdown()).to_string()
    }
}

/// Payloads that flatten into tables
pub trait Tabular {
    fn tables(&self) -> Vec<Table>;
}

impl Tabular for Table {
    fn tables(&self) -> Vec<Table> {
        vec![self.clone()]
    }
}

/// Money with two decimals
pub fn money(value: f64) -> String {
    format!("{:.2}", value)
}

/// Percentage with one decimal
pub fn pct(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Optional cell, `-` when absent
pub fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new("Zonas", ["name", "total"]);
        table.push(["Norte", "150.00"]);
        table.push(["Sul, Leste", "30.00"]);
        table
    }

    #[test]
    fn test_csv_quotes_commas() {
        let csv = sample().to_csv().unwrap();
        assert_eq!(csv, "name,total\nNorte,150.00\n\"Sul, Leste\",30.00\n");
    }

    #[test]
    fn test_markdown_has_header_separator() {
        let md = sample().to_markdown();
        let lines: Vec<&str> = md.lines().collect();
        assert!(lines[0].contains("name"));
        assert!(lines[1].starts_with("|-"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_cell_helpers() {
        assert_eq!(money(1234.5), "1234.50");
        assert_eq!(pct(12.345), "12.3%");
        assert_eq!(opt::<i32>(None), "-");
    }
}
