//! Per-year spreadsheets of the empenho cache

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::core::store::{Empenho, Store};

/// First fiscal year with published contract data
pub const FIRST_YEAR: i32 = 2018;

#[derive(Debug, Serialize)]
struct EmpenhoRow<'a> {
    cod_contrato: i64,
    ano_exercicio: i32,
    ano_empenho: i32,
    cod_empenho: i64,
    cod_sub_elemento: Option<&'a str>,
    cod_modalidade_contrato: Option<i64>,
    txt_descricao_modalidade_contrato: Option<&'a str>,
    txt_objeto_contrato: Option<&'a str>,
    txt_razao_social: Option<&'a str>,
    val_empenhado_liquido: f64,
    val_liquidado: f64,
    val_pago_exercicio: f64,
    val_total_empenhado: f64,
}

impl<'a> From<&'a Empenho> for EmpenhoRow<'a> {
    fn from(e: &'a Empenho) -> Self {
        Self {
            cod_contrato: e.cod_contrato,
            ano_exercicio: e.ano_exercicio,
            ano_empenho: e.ano_empenho,
            cod_empenho: e.cod_empenho,
            cod_sub_elemento: e.cod_sub_elemento.as_deref(),
            cod_modalidade_contrato: e.cod_modalidade_contrato,
            txt_descricao_modalidade_contrato: e.txt_descricao_modalidade_contrato.as_deref(),
            txt_objeto_contrato: e.txt_objeto_contrato.as_deref(),
            txt_razao_social: e.txt_razao_social.as_deref(),
            val_empenhado_liquido: e.val_empenhado_liquido,
            val_liquidado: e.val_liquidado,
            val_pago_exercicio: e.val_pago_exercicio,
            val_total_empenhado: e.val_total_empenhado,
        }
    }
}

pub fn filename(year: i32) -> String {
    format!("contratos_{}.csv", year)
}

/// Write `contratos_<year>.csv` into `dir` for every fiscal year from
/// [`FIRST_YEAR`] to `last_year`; years without empenhos are skipped
pub fn export_spreadsheets(store: &Store, dir: &Path, last_year: i32) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).into_diagnostic()?;

    let mut written = Vec::new();
    for year in FIRST_YEAR..=last_year {
        let empenhos = store.empenhos(Some(year))?;
        if empenhos.is_empty() {
            tracing::debug!(year, "no empenhos, skipping spreadsheet");
            continue;
        }

        let path = dir.join(filename(year));
        let mut writer = csv::Writer::from_path(&path).into_diagnostic()?;
        for empenho in &empenhos {
            writer.serialize(EmpenhoRow::from(empenho)).into_diagnostic()?;
        }
        writer.flush().into_diagnostic()?;

        tracing::info!(
            year,
            rows = empenhos.len(),
            path = %path.display(),
            "spreadsheet generated"
        );
        written.push(path);
    }
    Ok(written)
}
