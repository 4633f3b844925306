//! Flat per-section CSV export

use miette::Result;

use crate::core::config::Settings;
use crate::core::rollup::group_by;
use crate::core::store::Store;
use crate::render::{money, Table};

use super::report::MosaicoOptions;
use super::sections::{MosaicoPath, Section};

/// Section ids narrowing an export; every id is optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadFilter {
    pub year: Option<i32>,
    pub ids: MosaicoPath,
}

impl DownloadFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        use crate::core::nav::{param_i32, param_i64};
        Self {
            year: param_i32(pairs, "year"),
            ids: MosaicoPath {
                year: 0,
                grupo_id: param_i64(pairs, "grupo_id"),
                subgrupo_id: param_i64(pairs, "subgrupo_id"),
                elemento_id: param_i64(pairs, "elemento_id"),
                subfuncao_id: param_i64(pairs, "subfuncao_id"),
                programa_id: param_i64(pairs, "programa_id"),
            },
        }
    }
}

/// `Content-Disposition` file name of a section export
pub fn filename(section: Section) -> String {
    format!("mosaico_{}.csv", section)
}

/// One row per (node, year) with orcado and empenhado sums
pub fn download_table(
    store: &Store,
    settings: &Settings,
    section: Section,
    filter: &DownloadFilter,
    options: &MosaicoOptions,
) -> Result<Table> {
    let config = section.config();
    let mut query = options.apply(filter.ids.query(section), settings);
    query.year = filter.year;
    let records = store.execucoes(&query)?;

    let mut table = Table::new(
        filename(section),
        [
            "year".to_string(),
            format!("{}_id", config.dim),
            format!("{}_desc", config.dim),
            "orcado_total".to_string(),
            "empenhado_total".to_string(),
        ],
    );

    let with_node: Vec<_> = records.iter().filter(|e| (config.node)(e).is_some()).collect();
    let mut groups = group_by(
        &with_node,
        |e| ((config.node)(e).map(|n| n.id).unwrap_or_default(), e.year),
        |e| e.orcado_atualizado,
    );
    groups.sort_by_key(|g| (g.key.1, g.key.0));

    for group in groups {
        let (id, year) = group.key;
        let desc = (config.node)(group.first())
            .map(|n| n.desc.clone())
            .unwrap_or_default();
        let empenhado: f64 = group
            .members
            .iter()
            .map(|e| e.empenhado_liquido.unwrap_or(0.0))
            .sum();
        table.push([
            year.to_string(),
            id.to_string(),
            desc,
            money(group.total),
            money(empenhado),
        ]);
    }

    tracing::debug!(section = %section, rows = table.rows.len(), "mosaico export");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nav::parse_query;
    use crate::core::store::{NewExecucao, Node};

    fn line(year: i32, programa: i64, orcado: f64) -> NewExecucao {
        NewExecucao {
            year,
            orgao_id: 16,
            subfuncao: Some(Node { id: 361, desc: "Ensino fundamental".into() }),
            programa: Some(Node { id: programa, desc: format!("Programa {}", programa) }),
            orcado_atualizado: Some(orcado),
            empenhado_liquido: Some(orcado / 2.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_rows_grouped_by_node_and_year() {
        let store = Store::open_in_memory().unwrap();
        store.insert_execucao(&line(2018, 1, 10.0)).unwrap();
        store.insert_execucao(&line(2019, 1, 10.0)).unwrap();
        store.insert_execucao(&line(2019, 1, 5.0)).unwrap();
        store.insert_execucao(&line(2019, 2, 1.0)).unwrap();

        let filter = DownloadFilter::from_pairs(&parse_query("subfuncao_id=361"));
        let table = download_table(
            &store,
            &Settings::default(),
            Section::Programas,
            &filter,
            &MosaicoOptions::default(),
        )
        .unwrap();

        assert_eq!(
            table.headers,
            vec!["year", "programa_id", "programa_desc", "orcado_total", "empenhado_total"]
        );
        assert_eq!(
            table.rows,
            vec![
                vec!["2018", "1", "Programa 1", "10.00", "5.00"],
                vec!["2019", "1", "Programa 1", "15.00", "7.50"],
                vec!["2019", "2", "Programa 2", "1.00", "0.50"],
            ]
        );
        assert_eq!(table.title, "mosaico_programas.csv");
    }

    #[test]
    fn test_year_filter() {
        let store = Store::open_in_memory().unwrap();
        store.insert_execucao(&line(2018, 1, 10.0)).unwrap();
        store.insert_execucao(&line(2019, 1, 10.0)).unwrap();

        let filter = DownloadFilter::from_pairs(&parse_query("year=2019"));
        let table = download_table(
            &store,
            &Settings::default(),
            Section::Programas,
            &filter,
            &MosaicoOptions::default(),
        )
        .unwrap();
        assert_eq!(table.rows.len(), 1);
    }
}
