//! SOF expenditure API client
//!
//! One GET per (contract, fiscal year, commitment year), following
//! `metadados.qtdPaginas`. Failures never abort a sync: each one is written
//! to the failed-request audit table and the triple yields no data.

use miette::Result;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::config::SofSettings;
use crate::core::store::{ContratoRaw, Empenho, Store, META_CONTRATOS};

use super::transport::{HttpRequest, HttpTransport, TransportError};

/// Audit code of failures that produced no HTTP status
pub const TRANSPORT_ERROR_CODE: i64 = -1;

#[derive(Debug, Error)]
pub enum SofError {
    #[error("SOF answered with HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("undecodable SOF response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SofError {
    /// Code stored in the failed-request table
    pub fn error_code(&self) -> i64 {
        match self {
            SofError::Status(status) => i64::from(*status),
            SofError::Transport(_) | SofError::Decode(_) => TRANSPORT_ERROR_CODE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SofPage {
    metadados: Metadados,
    #[serde(rename = "lstEmpenhos", default)]
    lst_empenhos: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Metadados {
    #[serde(rename = "txtStatus", default)]
    txt_status: Option<String>,
    #[serde(rename = "qtdPaginas", default)]
    qtd_paginas: Option<u32>,
}

/// Totals of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncSummary {
    pub contratos: usize,
    pub empenhos_created: usize,
    pub empenhos_updated: usize,
    pub failed_requests: usize,
}

pub struct SofClient<T: HttpTransport> {
    transport: T,
    settings: SofSettings,
}

impl<T: HttpTransport> SofClient<T> {
    pub fn new(transport: T, settings: SofSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    fn request(
        &self,
        cod_contrato: i64,
        ano_exercicio: i32,
        ano_empenho: i32,
        page: u32,
    ) -> HttpRequest {
        HttpRequest::get(&self.settings.url)
            .query("anoEmpenho", ano_empenho)
            .query("mesEmpenho", self.settings.mes_empenho)
            .query("anoExercicio", ano_exercicio)
            .query("codContrato", cod_contrato)
            .query("codOrgao", self.settings.cod_orgao)
            .query("numPagina", page)
            .bearer(self.settings.token.as_deref())
    }

    fn fetch_page(
        &self,
        cod_contrato: i64,
        ano_exercicio: i32,
        ano_empenho: i32,
        page: u32,
    ) -> std::result::Result<SofPage, SofError> {
        let response = self
            .transport
            .get(&self.request(cod_contrato, ano_exercicio, ano_empenho, page))?;
        if response.status != 200 {
            return Err(SofError::Status(response.status));
        }
        let page: SofPage = serde_json::from_str(&response.body)?;
        if let Some(status) = page.metadados.txt_status.as_deref().filter(|s| *s != "OK") {
            tracing::warn!(
                cod_contrato,
                ano_exercicio,
                ano_empenho,
                status,
                "SOF reported a non-OK status"
            );
        }
        Ok(page)
    }

    /// All empenho rows of one commitment year
    ///
    /// Any failure is recorded in the audit table and yields `None`. A page
    /// failing after earlier pages succeeded voids the whole (contract,
    /// fiscal year, commitment year) triple: the audit row names the triple,
    /// not the page, so a retry refetches it from page 1.
    pub fn get_by_ano_empenho(
        &self,
        store: &Store,
        cod_contrato: i64,
        ano_exercicio: i32,
        ano_empenho: i32,
    ) -> Result<Option<Vec<Value>>> {
        let mut rows = Vec::new();
        let mut page = 1;
        loop {
            match self.fetch_page(cod_contrato, ano_exercicio, ano_empenho, page) {
                Ok(result) => {
                    rows.extend(result.lst_empenhos);
                    let pages = result.metadados.qtd_paginas.unwrap_or(1);
                    if page >= pages {
                        return Ok(Some(rows));
                    }
                    page += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        cod_contrato,
                        ano_exercicio,
                        ano_empenho,
                        page,
                        error = %err,
                        "SOF request failed"
                    );
                    store.record_failed_request(
                        cod_contrato,
                        ano_exercicio,
                        ano_empenho,
                        err.error_code(),
                    )?;
                    if !rows.is_empty() {
                        tracing::warn!(
                            cod_contrato,
                            ano_empenho,
                            discarded = rows.len(),
                            "dropping rows of earlier pages"
                        );
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Rows of every commitment year from the fiscal year to `current_year`
    pub fn get_by_contrato(
        &self,
        store: &Store,
        cod_contrato: i64,
        ano_exercicio: i32,
        current_year: i32,
    ) -> Result<(Vec<Value>, usize)> {
        let mut rows = Vec::new();
        let mut failed = 0;
        for ano_empenho in ano_exercicio..=current_year {
            match self.get_by_ano_empenho(store, cod_contrato, ano_exercicio, ano_empenho)? {
                Some(found) => rows.extend(found),
                None => failed += 1,
            }
        }
        Ok((rows, failed))
    }

    /// Fetch every listed contract and upsert its empenhos into the cache
    pub fn sync_contratos(&self, store: &Store, current_year: i32) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();
        for contrato in store.contratos_raw()? {
            let (rows, failed) = self.get_by_contrato(
                store,
                contrato.cod_contrato,
                contrato.ano_exercicio,
                current_year,
            )?;
            summary.failed_requests += failed;
            summary.contratos += 1;

            for row in &rows {
                let Some(empenho) = empenho_from_value(row, &contrato) else {
                    tracing::warn!(
                        cod_contrato = contrato.cod_contrato,
                        "SOF row without codEmpenho, skipped"
                    );
                    continue;
                };
                if store.upsert_empenho(&empenho)? {
                    summary.empenhos_created += 1;
                } else {
                    summary.empenhos_updated += 1;
                }
            }
            tracing::info!(
                cod_contrato = contrato.cod_contrato,
                ano_exercicio = contrato.ano_exercicio,
                rows = rows.len(),
                "contrato synced"
            );
        }
        store.touch(META_CONTRATOS)?;
        Ok(summary)
    }
}

fn int_field(row: &Value, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_field(row: &Value, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn text_field(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Typed empenho from an upstream row; contract fields fill what the row
/// lacks. Rows without `codEmpenho` have no natural key and are rejected.
pub fn empenho_from_value(row: &Value, contrato: &ContratoRaw) -> Option<Empenho> {
    Some(Empenho {
        cod_contrato: contrato.cod_contrato,
        ano_exercicio: contrato.ano_exercicio,
        ano_empenho: int_field(row, "anoEmpenho")
            .map(|y| y as i32)
            .unwrap_or(contrato.ano_exercicio),
        cod_empenho: int_field(row, "codEmpenho")?,
        cod_sub_elemento: text_field(row, "codSubElemento"),
        cod_modalidade_contrato: int_field(row, "codModalidadeContrato")
            .or(contrato.cod_modalidade),
        txt_descricao_modalidade_contrato: text_field(row, "txtDescricaoModalidadeContrato")
            .or_else(|| contrato.txt_descricao_modalidade.clone()),
        txt_objeto_contrato: text_field(row, "txtObjetoContrato")
            .or_else(|| contrato.txt_objeto_contrato.clone()),
        txt_razao_social: text_field(row, "txtRazaoSocial")
            .or_else(|| contrato.txt_razao_social.clone()),
        val_empenhado_liquido: float_field(row, "valEmpenhadoLiquido"),
        val_liquidado: float_field(row, "valLiquidado"),
        val_pago_exercicio: float_field(row, "valPagoExercicio"),
        val_total_empenhado: float_field(row, "valTotalEmpenhado"),
        raw: row.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Settings;
    use crate::sync::transport::fake::FakeTransport;
    use crate::sync::transport::HttpResponse;
    use serde_json::json;

    fn page(pages: u32, rows: Vec<Value>) -> Value {
        json!({
            "metadados": {"txtStatus": "OK", "txtMensagemErro": null, "qtdPaginas": pages},
            "lstEmpenhos": rows,
        })
    }

    fn row(cod_empenho: i64, valor: f64) -> Value {
        json!({
            "anoEmpenho": 2019,
            "codEmpenho": cod_empenho,
            "codSubElemento": "41",
            "txtRazaoSocial": "YONE DIAS YAMASSAKI -EPP",
            "valEmpenhadoLiquido": valor,
            "valLiquidado": valor,
            "valPagoExercicio": 0,
            "valTotalEmpenhado": valor,
        })
    }

    fn client(transport: FakeTransport) -> SofClient<FakeTransport> {
        let mut settings = Settings::default().sof;
        settings.token = Some("secret".into());
        SofClient::new(transport, settings)
    }

    #[test]
    fn test_request_parameters_and_pagination() {
        let store = Store::open_in_memory().unwrap();
        let transport = FakeTransport::new()
            .respond_json(page(2, vec![row(1, 17400.0)]))
            .respond_json(page(2, vec![row(2, 1160.0)]));
        let client = client(transport);

        let rows = client.get_by_ano_empenho(&store, 5555, 2019, 2019).unwrap().unwrap();
        assert_eq!(rows.len(), 2);

        let requests = client.transport.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].param("mesEmpenho"), Some("12"));
        assert_eq!(requests[0].param("codOrgao"), Some("16"));
        assert_eq!(requests[0].param("codContrato"), Some("5555"));
        assert_eq!(requests[1].param("numPagina"), Some("2"));
        assert_eq!(requests[0].bearer.as_deref(), Some("secret"));
    }

    #[test]
    fn test_server_error_is_recorded_with_status() {
        let store = Store::open_in_memory().unwrap();
        let client = client(FakeTransport::new().respond(HttpResponse::status(500)));

        let rows = client.get_by_ano_empenho(&store, 5555, 2019, 2019).unwrap();
        assert!(rows.is_none());

        let failed = store.failed_requests().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_code, 500);
        assert_eq!(failed[0].ano_empenho, 2019);
    }

    #[test]
    fn test_failed_later_page_voids_commitment_year() {
        let store = Store::open_in_memory().unwrap();
        let client = client(
            FakeTransport::new()
                .respond_json(page(3, vec![row(1, 17400.0)]))
                .respond(HttpResponse::status(503)),
        );

        let rows = client.get_by_ano_empenho(&store, 5555, 2019, 2019).unwrap();
        assert!(rows.is_none());
        assert_eq!(client.transport.requests.borrow().len(), 2);

        let failed = store.failed_requests().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_code, 503);
        assert_eq!(failed[0].cod_contrato, 5555);
    }

    #[test]
    fn test_transport_and_decode_errors_use_minus_one() {
        let store = Store::open_in_memory().unwrap();
        let client = client(
            FakeTransport::new()
                .fail()
                .respond(HttpResponse::ok("<html>gateway</html>")),
        );

        assert!(client.get_by_ano_empenho(&store, 1, 2019, 2019).unwrap().is_none());
        assert!(client.get_by_ano_empenho(&store, 1, 2019, 2020).unwrap().is_none());

        let codes: Vec<i64> = store
            .failed_requests()
            .unwrap()
            .iter()
            .map(|f| f.error_code)
            .collect();
        assert_eq!(codes, vec![-1, -1]);
    }

    #[test]
    fn test_contrato_iterates_commitment_years() {
        let store = Store::open_in_memory().unwrap();
        let client = client(
            FakeTransport::new()
                .respond_json(page(1, vec![row(1, 10.0)]))
                .respond(HttpResponse::status(503)),
        );

        let (rows, failed) = client.get_by_contrato(&store, 555, 2018, 2019).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(failed, 1);

        let years: Vec<String> = client
            .transport
            .requests
            .borrow()
            .iter()
            .filter_map(|r| r.param("anoEmpenho").map(str::to_string))
            .collect();
        assert_eq!(years, vec!["2018", "2019"]);
    }

    #[test]
    fn test_sync_upserts_by_natural_key() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_contrato_raw(&ContratoRaw {
                cod_contrato: 5555,
                ano_exercicio: 2019,
                txt_objeto_contrato: Some("Alimentação".into()),
                ..Default::default()
            })
            .unwrap();

        let body = page(1, vec![row(1, 10.0), row(1, 12.0), json!({"valLiquidado": 1})]);
        let client = client(FakeTransport::new().respond_json(body));
        let summary = client.sync_contratos(&store, 2019).unwrap();

        assert_eq!(summary.contratos, 1);
        assert_eq!(summary.empenhos_created, 1);
        assert_eq!(summary.empenhos_updated, 1);

        let empenhos = store.empenhos(Some(2019)).unwrap();
        assert_eq!(empenhos.len(), 1);
        assert_eq!(empenhos[0].val_empenhado_liquido, 12.0);
        assert_eq!(empenhos[0].txt_objeto_contrato.as_deref(), Some("Alimentação"));
        assert_eq!(empenhos[0].indexer(), "5555.2019.41");
    }
}
