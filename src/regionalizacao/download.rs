//! Flat per-record export of school budgets

use miette::Result;
use serde::Serialize;

use crate::core::store::{EscolaInfo, PlaceQuery, Store};
use crate::render::Table;

/// One spreadsheet row per school-year record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadRow {
    pub year: i32,
    pub zona: String,
    pub dre_code: String,
    pub dre_name: String,
    pub coddist: i64,
    pub distrito: String,
    pub codesc: String,
    pub nomesc: String,
    pub tipoesc: String,
    pub etapa: String,
    pub endereco: String,
    pub numero: String,
    pub bairro: String,
    pub cep: String,
    pub rede: String,
    pub total_vagas: String,
    pub budget_total: String,
    pub recursos: String,
}

impl From<&EscolaInfo> for DownloadRow {
    fn from(info: &EscolaInfo) -> Self {
        let opt = |v: Option<String>| v.unwrap_or_default();
        Self {
            year: info.year,
            zona: opt(info.distrito.zona.clone()),
            dre_code: info.dre.code.clone(),
            dre_name: info.dre.name.clone(),
            coddist: info.distrito.coddist,
            distrito: info.distrito.name.clone(),
            codesc: info.codesc.clone(),
            nomesc: info.nomesc.clone(),
            tipoesc: info.tipoesc.code.clone(),
            etapa: opt(info.tipoesc.etapa.clone()),
            endereco: opt(info.endereco.clone()),
            numero: opt(info.numero.map(|n| n.to_string())),
            bairro: opt(info.bairro.clone()),
            cep: opt(info.cep.map(|c| format!("{:08}", c))),
            rede: info.rede.clone(),
            total_vagas: opt(info.total_vagas.map(|v| v.to_string())),
            budget_total: opt(info.budget_total.map(|v| format!("{:.2}", v))),
            recursos: info
                .recursos
                .iter()
                .map(|r| match &r.subgrupo {
                    Some(sub) => format!("{}/{}={:.2}", r.grupo, sub, r.valor),
                    None => format!("{}={:.2}", r.grupo, r.valor),
                })
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Rows of every record, optionally narrowed to one year
pub fn download_rows(store: &Store, year: Option<i32>) -> Result<Vec<DownloadRow>> {
    let records = store.escola_infos(&PlaceQuery::new().year(year))?;
    Ok(records.iter().map(DownloadRow::from).collect())
}

const HEADERS: [&str; 18] = [
    "year",
    "zona",
    "dre_code",
    "dre_name",
    "coddist",
    "distrito",
    "codesc",
    "nomesc",
    "tipoesc",
    "etapa",
    "endereco",
    "numero",
    "bairro",
    "cep",
    "rede",
    "total_vagas",
    "budget_total",
    "recursos",
];

/// Spreadsheet of the export, titled with its file name
pub fn download_table(rows: &[DownloadRow], year: Option<i32>) -> Table {
    let mut table = Table::new(filename(year), HEADERS);
    for row in rows {
        table.push([
            row.year.to_string(),
            row.zona.clone(),
            row.dre_code.clone(),
            row.dre_name.clone(),
            row.coddist.to_string(),
            row.distrito.clone(),
            row.codesc.clone(),
            row.nomesc.clone(),
            row.tipoesc.clone(),
            row.etapa.clone(),
            row.endereco.clone(),
            row.numero.clone(),
            row.bairro.clone(),
            row.cep.clone(),
            row.rede.clone(),
            row.total_vagas.clone(),
            row.budget_total.clone(),
            row.recursos.clone(),
        ]);
    }
    table
}

/// File name offered for the export
pub fn filename(year: Option<i32>) -> String {
    match year {
        Some(year) => format!("regionalizacao_{}.csv", year),
        None => "regionalizacao.csv".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{NewEscolaInfo, Recurso};

    #[test]
    fn test_rows_flatten_hierarchy_and_recursos() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_dre("DRE-A", "Diretoria A").unwrap();
        store.set_distrito_zona(1, "Sé", "Centro").unwrap();
        store.upsert_tipo_escola("EMEI", None, None).unwrap();
        for year in [2018, 2019] {
            store
                .upsert_escola_info(&NewEscolaInfo {
                    year,
                    codesc: "7".into(),
                    nomesc: "Sete".into(),
                    dre_code: "DRE-A".into(),
                    coddist: 1,
                    tipoesc: "EMEI".into(),
                    rede: "DIR".into(),
                    cep: Some(1234567),
                    ..Default::default()
                })
                .unwrap();
        }
        store
            .set_escola_recursos(
                2019,
                "7",
                &[
                    Recurso { grupo: "PTRF".into(), subgrupo: None, valor: 10.0 },
                    Recurso {
                        grupo: "Merenda".into(),
                        subgrupo: Some("Gêneros".into()),
                        valor: 2.5,
                    },
                ],
            )
            .unwrap();

        assert_eq!(download_rows(&store, None).unwrap().len(), 2);

        let rows = download_rows(&store, Some(2019)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].zona, "Centro");
        assert_eq!(rows[0].cep, "01234567");
        assert_eq!(rows[0].budget_total, "12.50");
        assert_eq!(rows[0].recursos, "PTRF=10.00; Merenda/Gêneros=2.50");
        assert_eq!(filename(Some(2019)), "regionalizacao_2019.csv");

        let table = download_table(&rows, Some(2019));
        assert_eq!(table.title, "regionalizacao_2019.csv");
        assert_eq!(table.headers.len(), table.rows[0].len());
        assert!(table.to_csv().unwrap().starts_with("year,zona,dre_code"));
    }
}
