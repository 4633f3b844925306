//! Navigation URL resolution
//!
//! Every URL embedded in a payload (place links, breadcrumbs, mosaico rows,
//! download links) resolves here back onto the report that produced it, so
//! `orc get <url>` can follow any of them.

use miette::{Diagnostic, Result};
use serde::Serialize;
use thiserror::Error;

use crate::contratos::{self, ContratosParams, ContratosReport};
use crate::core::config::Settings;
use crate::core::nav::{self, param, param_i32};
use crate::core::store::Store;
use crate::mosaico::{self, DownloadFilter, MosaicoOptions, MosaicoPath, MosaicoReport, Section};
use crate::regionalizacao::{self, PlaceParams, RegionalizacaoReport};
use crate::render::{Table, Tabular};

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum RouteError {
    #[error("no page at '{0}'")]
    NotFound(String),

    #[error("unknown mosaico section in '{0}'")]
    BadMosaicoPath(String),

    #[error("unsupported format '{0}' (expected csv, json or html)")]
    BadFormat(String),
}

/// Representation requested with `format=` in the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Html,
}

impl std::str::FromStr for Format {
    type Err = RouteError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "html" => Ok(Format::Html),
            other => Err(RouteError::BadFormat(other.to_string())),
        }
    }
}

/// Payload of a resolved URL
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Page {
    Regionalizacao(RegionalizacaoReport),
    Mosaico(MosaicoReport),
    Contratos(ContratosReport),
    /// A spreadsheet offered as a file
    Download(Table),
}

impl Page {
    /// Template rendering this page, if any
    pub fn template(&self) -> Option<&'static str> {
        match self {
            Page::Regionalizacao(_) => Some("regionalizacao"),
            Page::Mosaico(_) => Some("mosaico"),
            Page::Contratos(_) => Some("contratos"),
            Page::Download(_) => None,
        }
    }
}

impl Tabular for Page {
    fn tables(&self) -> Vec<Table> {
        match self {
            Page::Regionalizacao(report) => report.tables(),
            Page::Mosaico(report) => report.tables(),
            Page::Contratos(report) => report.tables(),
            Page::Download(table) => table.tables(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Routed {
    pub page: Page,
    pub format: Option<Format>,
}

/// Strip the scheme, host and configured base URL, leaving `/path?query`
fn local_part<'a>(url: &'a str, settings: &Settings) -> &'a str {
    let base = settings.base_url.trim_end_matches('/');
    if !base.is_empty() {
        if let Some(rest) = url.strip_prefix(base) {
            return rest;
        }
    }
    match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => url,
    }
}

/// Resolve a navigation URL into its payload
pub fn resolve(store: &Store, settings: &Settings, url: &str) -> Result<Routed> {
    let (path, pairs) = nav::split_url(local_part(url, settings));
    let format: Option<Format> = param(&pairs, "format").map(str::parse).transpose()?;
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    tracing::debug!(path, ?segments, "resolving");

    let page = match segments.as_slice() {
        ["regionalizacao"] => Page::Regionalizacao(regionalizacao::build_report(
            store,
            settings,
            &PlaceParams::from_pairs(pairs),
        )?),
        ["regionalizacao", "download"] => {
            let year = param_i32(&pairs, "year");
            let rows = regionalizacao::download_rows(store, year)?;
            Page::Download(regionalizacao::download_table(&rows, year))
        }
        ["mosaico"] => {
            let options = MosaicoOptions::from_pairs(&pairs);
            let path = mosaico::default_path(store)?;
            Page::Mosaico(mosaico::build_report(
                store,
                settings,
                Section::Grupos,
                &path,
                &options,
            )?)
        }
        ["mosaico", "download", section] => {
            let section: Section = section
                .parse()
                .map_err(|_| RouteError::BadMosaicoPath(path.to_string()))?;
            Page::Download(mosaico::download_table(
                store,
                settings,
                section,
                &DownloadFilter::from_pairs(&pairs),
                &MosaicoOptions::from_pairs(&pairs),
            )?)
        }
        ["mosaico", ..] => {
            let (section, mosaico_path) = MosaicoPath::parse(path)
                .ok_or_else(|| RouteError::BadMosaicoPath(path.to_string()))?;
            Page::Mosaico(mosaico::build_report(
                store,
                settings,
                section,
                &mosaico_path,
                &MosaicoOptions::from_pairs(&pairs),
            )?)
        }
        ["contratos"] => Page::Contratos(contratos::build_report(
            store,
            &ContratosParams::from_pairs(&pairs),
        )?),
        _ => return Err(RouteError::NotFound(path.to_string()).into()),
    };

    Ok(Routed { page, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_in_memory(url: &str) -> Result<Routed> {
        let store = Store::open_in_memory().unwrap();
        resolve(&store, &Settings::default(), url)
    }

    #[test]
    fn test_local_part_strips_base_url() {
        let mut settings = Settings::default();
        settings.base_url = "https://orcamento.example.org".to_string();
        assert_eq!(
            local_part("https://orcamento.example.org/contratos/?year=2019", &settings),
            "/contratos/?year=2019"
        );
        assert_eq!(local_part("http://other.host/mosaico/", &settings), "/mosaico/");
        assert_eq!(local_part("/regionalizacao/", &settings), "/regionalizacao/");
    }

    #[test]
    fn test_routes_to_each_report() {
        assert!(matches!(
            resolve_in_memory("/regionalizacao/?localidade=zona").unwrap().page,
            Page::Regionalizacao(_)
        ));
        assert!(matches!(
            resolve_in_memory("/mosaico/2019/subfuncoes/").unwrap().page,
            Page::Mosaico(MosaicoReport { tecnico: true, .. })
        ));
        assert!(matches!(
            resolve_in_memory("/contratos/").unwrap().page,
            Page::Contratos(_)
        ));
    }

    #[test]
    fn test_download_routes_carry_file_names() {
        let routed = resolve_in_memory("/mosaico/download/subgrupos/?format=csv").unwrap();
        assert_eq!(routed.format, Some(Format::Csv));
        match routed.page {
            Page::Download(table) => assert_eq!(table.title, "mosaico_subgrupos.csv"),
            other => panic!("expected a download, got {:?}", other.template()),
        }

        match resolve_in_memory("/regionalizacao/download/?year=2019").unwrap().page {
            Page::Download(table) => assert_eq!(table.title, "regionalizacao_2019.csv"),
            other => panic!("expected a download, got {:?}", other.template()),
        }
    }

    #[test]
    fn test_unknown_urls() {
        assert!(resolve_in_memory("/nowhere/").is_err());
        assert!(resolve_in_memory("/mosaico/2019/programas/").is_err());
        assert!(resolve_in_memory("/contratos/?format=xml").is_err());
    }
}
