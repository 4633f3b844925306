//! EOL school registry client
//!
//! The registry lists dres, school types and schools under `results`. Each
//! table update get-or-creates the referenced rows before writing its own.

use miette::{IntoDiagnostic, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::core::config::EolSettings;
use crate::core::store::{NewEscolaInfo, Store, META_REGIONALIZACAO};

use super::transport::{HttpRequest, HttpTransport, TransportError};

#[derive(Debug, Error)]
pub enum EolError {
    #[error("EOL answered with HTTP {status} for {path}")]
    Status { path: String, status: u16 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("undecodable EOL response for {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Results<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DreRow {
    dre: String,
    diretoria: String,
}

#[derive(Debug, Deserialize)]
struct TipoRow {
    tipoesc: String,
}

#[derive(Debug, Deserialize)]
struct EscolaRow {
    dre: String,
    diretoria: Option<String>,
    codesc: String,
    tipoesc: String,
    nomesc: String,
    endereco: Option<String>,
    numero: Option<serde_json::Value>,
    bairro: Option<String>,
    cep: Option<i64>,
    coddist: serde_json::Value,
    distrito: Option<String>,
    rede: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    total_vagas: Option<i64>,
}

/// Integer from a number or a padded numeric string ("140   ")
fn lenient_int(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub struct EolClient<T: HttpTransport> {
    transport: T,
    settings: EolSettings,
}

impl<T: HttpTransport> EolClient<T> {
    pub fn new(transport: T, settings: EolSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    fn fetch<R: DeserializeOwned>(&self, path: &str) -> std::result::Result<Vec<R>, EolError> {
        let url = format!("{}/{}/", self.settings.url.trim_end_matches('/'), path);
        let response = self.transport.get(&HttpRequest::get(url))?;
        if response.status != 200 {
            return Err(EolError::Status {
                path: path.to_string(),
                status: response.status,
            });
        }
        let parsed: Results<R> =
            serde_json::from_str(&response.body).map_err(|source| EolError::Decode {
                path: path.to_string(),
                source,
            })?;
        Ok(parsed.results)
    }

    /// Upsert every dre; returns (created, updated)
    pub fn update_dre_table(&self, store: &Store) -> Result<(usize, usize)> {
        let rows: Vec<DreRow> = self.fetch("dres").into_diagnostic()?;
        let mut created = 0;
        let mut updated = 0;
        for row in rows {
            if store.upsert_dre(&row.dre, &row.diretoria)? {
                created += 1;
            } else {
                updated += 1;
            }
        }
        tracing::info!(created, updated, "dre table updated");
        Ok((created, updated))
    }

    /// Create missing school types; existing codes are left untouched
    pub fn update_tipo_escola_table(&self, store: &Store) -> Result<usize> {
        let rows: Vec<TipoRow> = self.fetch("tipo_escola").into_diagnostic()?;
        let mut created = 0;
        for row in rows {
            if store.create_tipo_escola(row.tipoesc.trim(), None)? {
                created += 1;
            }
        }
        tracing::info!(created, "tipo_escola table updated");
        Ok(created)
    }

    /// Upsert the `year` record of every school; returns how many were new
    pub fn update_escola_table(&self, store: &Store, year: i32) -> Result<usize> {
        let rows: Vec<EscolaRow> = self.fetch("escolas").into_diagnostic()?;
        let mut created = 0;
        store.transaction(|store| {
            for row in &rows {
                let Some(coddist) = lenient_int(&row.coddist) else {
                    tracing::warn!(
                        codesc = %row.codesc,
                        "escola without a numeric coddist, skipped"
                    );
                    continue;
                };
                if store.dre(&row.dre)?.is_none() {
                    store.upsert_dre(&row.dre, row.diretoria.as_deref().unwrap_or(&row.dre))?;
                }
                store.create_tipo_escola(row.tipoesc.trim(), None)?;
                store.get_or_create_distrito(coddist, row.distrito.as_deref().unwrap_or_default())?;

                let info = NewEscolaInfo {
                    year,
                    codesc: row.codesc.clone(),
                    nomesc: row.nomesc.clone(),
                    dre_code: row.dre.clone(),
                    coddist,
                    tipoesc: row.tipoesc.trim().to_string(),
                    endereco: row.endereco.clone(),
                    numero: row.numero.as_ref().and_then(lenient_int),
                    bairro: row.bairro.clone(),
                    cep: row.cep,
                    rede: row.rede.clone(),
                    latitude: row.latitude,
                    longitude: row.longitude,
                    total_vagas: row.total_vagas,
                    budget_total: None,
                };
                if store.upsert_escola_info(&info)? {
                    created += 1;
                }
            }
            store.touch(META_REGIONALIZACAO)
        })?;
        tracing::info!(created, total = rows.len(), year, "escola table updated");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Settings;
    use crate::core::store::PlaceQuery;
    use crate::sync::transport::fake::FakeTransport;
    use crate::sync::transport::HttpResponse;
    use serde_json::json;

    fn client(transport: FakeTransport) -> EolClient<FakeTransport> {
        EolClient::new(transport, Settings::default().eol)
    }

    fn dres() -> serde_json::Value {
        json!({"results": [
            {"dre": "BT", "diretoria": "DIRETORIA REGIONAL DE EDUCACAO BUTANTA"},
            {"dre": "SA", "diretoria": "DIRETORIA REGIONAL DE EDUCACAO SANTO AMARO"},
        ]})
    }

    fn escola(codesc: &str, coddist: &str, distrito: &str) -> serde_json::Value {
        json!({
            "dre": "BT",
            "codesc": codesc,
            "tipoesc": "EMEF",
            "nomesc": "ALIPIO CORREA NETO, PROF",
            "diretoria": "DIRETORIA REGIONAL DE EDUCACAO BUTANTA",
            "endereco": "Avenida JOAO CAIAFFA",
            "numero": "140   ",
            "bairro": "JARDIM TABOAO",
            "cep": 5742100,
            "situacao": "ATIVA",
            "coddist": coddist,
            "distrito": distrito,
            "rede": "DIR",
            "latitude": -23.612237,
            "longitude": -46.749888,
            "total_vagas": 502
        })
    }

    #[test]
    fn test_dre_table_counts_created_and_updated() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_dre("BT", "old name").unwrap();

        let client = client(FakeTransport::new().respond_json(dres()));
        assert_eq!(client.update_dre_table(&store).unwrap(), (1, 1));
        assert_eq!(
            store.dre("BT").unwrap().unwrap().name,
            "DIRETORIA REGIONAL DE EDUCACAO BUTANTA"
        );
        assert!(client.transport.requests.borrow()[0].url.ends_with("/dres/"));
    }

    #[test]
    fn test_tipo_table_ignores_existing() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_tipo_escola("CIEJA", Some("Centro"), Some("EJA")).unwrap();

        let body = json!({"results": [{"tipoesc": "CIEJA"}, {"tipoesc": "MOVA"}]});
        let client = client(FakeTransport::new().respond_json(body));
        assert_eq!(client.update_tipo_escola_table(&store).unwrap(), 1);
        assert_eq!(
            store.tipo_escola("CIEJA").unwrap().unwrap().etapa.as_deref(),
            Some("EJA")
        );
    }

    #[test]
    fn test_escola_table_creates_references() {
        let store = Store::open_in_memory().unwrap();
        let body = json!({"results": [
            escola("000191", "94", "VILA SONIA"),
            escola("000477", "65", "RAPOSO TAVARES"),
        ]});
        let client = client(FakeTransport::new().respond_json(body));
        assert_eq!(client.update_escola_table(&store, 2019).unwrap(), 2);

        assert_eq!(store.distrito(94).unwrap().unwrap().name, "VILA SONIA");
        let infos = store.escola_infos(&PlaceQuery::new().year(Some(2019))).unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].numero, Some(140));
        assert_eq!(infos[0].cep, Some(5742100));
        assert_eq!(infos[0].total_vagas, Some(502));
        assert!(store.get_meta(META_REGIONALIZACAO).unwrap().is_some());
    }

    #[test]
    fn test_escola_update_keeps_budget() {
        let store = Store::open_in_memory().unwrap();
        let body = json!({"results": [escola("000191", "94", "VILA SONIA")]});
        client(FakeTransport::new().respond_json(body.clone()))
            .update_escola_table(&store, 2019)
            .unwrap();
        store.set_escola_recursos(2019, "000191", &[]).unwrap();

        let again = client(FakeTransport::new().respond_json(body));
        assert_eq!(again.update_escola_table(&store, 2019).unwrap(), 0);
        let infos = store.escola_infos(&PlaceQuery::new()).unwrap();
        assert_eq!(infos[0].budget_total, Some(0.0));
    }

    #[test]
    fn test_http_error_propagates() {
        let store = Store::open_in_memory().unwrap();
        let client = client(FakeTransport::new().respond(HttpResponse::status(502)));
        assert!(client.update_dre_table(&store).is_err());
    }
}
