//! Contract execution payload: big number, destinations, top 5 and filters

use miette::Result;
use serde::Serialize;

use crate::core::nav;
use crate::core::rollup::{by_total_desc, group_by};
use crate::core::store::{ContratoQuery, ExecucaoContrato, Store, META_CONTRATOS};
use crate::render::{money, opt, pct, Table, Tabular};

/// Query parameters of the contratos page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContratosParams {
    pub year: Option<i32>,
    pub categoria: Option<i64>,
}

impl ContratosParams {
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(&nav::parse_query(query))
    }

    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            year: nav::param_i32(pairs, "year"),
            categoria: nav::param_i64(pairs, "categoria"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BigNumber {
    pub year: i32,
    pub empenhado: f64,
    pub liquidado: f64,
    /// Fraction of the committed amount already liquidated
    pub percent_liquidado: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destination {
    pub year: i32,
    pub categoria_name: Option<String>,
    pub categoria_desc: Option<String>,
    pub categoria_slug: Option<String>,
    pub empenhado: f64,
    pub liquidado: f64,
    pub percent_liquidado: f64,
    pub percent_empenhado: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopContrato {
    pub year: i32,
    pub fornecedor: Option<String>,
    pub categoria_name: Option<String>,
    pub categoria_id: Option<i64>,
    pub objeto_contrato: Option<String>,
    pub modalidade: Option<String>,
    pub empenhado: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoriaRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filters {
    pub selected_year: Option<i32>,
    pub selected_categoria: Option<i64>,
    pub years: Vec<i32>,
    pub categorias: Vec<CategoriaRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContratosReport {
    pub big_number: Option<BigNumber>,
    pub destinations: Vec<Destination>,
    pub top5: Vec<TopContrato>,
    pub filters: Filters,
    pub last_updated: Option<String>,
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole
    }
}

/// Year totals of the selected lines; `None` when there are none
pub fn big_number(lines: &[ExecucaoContrato], year: i32) -> Option<BigNumber> {
    if lines.is_empty() {
        return None;
    }
    let empenhado: f64 = lines.iter().map(|l| l.valor_empenhado).sum();
    let liquidado: f64 = lines.iter().map(|l| l.valor_liquidado).sum();
    Some(BigNumber {
        year,
        empenhado,
        liquidado,
        percent_liquidado: ratio(liquidado, empenhado),
    })
}

/// Per-category totals, largest committed amount first
///
/// Lines without a category form one group with null name fields.
pub fn destinations(lines: &[ExecucaoContrato], year: i32) -> Vec<Destination> {
    let total: f64 = lines.iter().map(|l| l.valor_empenhado).sum();
    group_by(
        lines,
        |l| l.categoria.as_ref().map(|c| c.name.clone()),
        |l| Some(l.valor_empenhado),
    )
    .into_iter()
    .map(|group| {
        let categoria = group.first().categoria.as_ref();
        let liquidado: f64 = group.members.iter().map(|l| l.valor_liquidado).sum();
        Destination {
            year,
            categoria_name: group.key.clone(),
            categoria_desc: categoria.and_then(|c| c.desc.clone()),
            categoria_slug: categoria.and_then(|c| c.slug.clone()),
            empenhado: group.total,
            liquidado,
            percent_liquidado: ratio(liquidado, group.total),
            percent_empenhado: ratio(group.total, total),
        }
    })
    .collect()
}

/// Five largest lines by committed amount, optionally within one category
pub fn top5(lines: &[ExecucaoContrato], categoria: Option<i64>) -> Vec<TopContrato> {
    let mut selected: Vec<&ExecucaoContrato> = lines
        .iter()
        .filter(|l| categoria.is_none() || l.categoria.as_ref().map(|c| c.id) == categoria)
        .collect();
    selected.sort_by(|a, b| {
        by_total_desc(a.valor_empenhado, b.valor_empenhado).then(a.id.cmp(&b.id))
    });

    selected
        .into_iter()
        .take(5)
        .map(|l| TopContrato {
            year: l.year,
            fornecedor: l.fornecedor.clone(),
            categoria_name: l.categoria.as_ref().map(|c| c.name.clone()),
            categoria_id: l.categoria.as_ref().map(|c| c.id),
            objeto_contrato: l.objeto_contrato.clone(),
            modalidade: l.modalidade.clone(),
            empenhado: l.valor_empenhado,
        })
        .collect()
}

/// Build the contratos payload; the year defaults to the newest one
pub fn build_report(store: &Store, params: &ContratosParams) -> Result<ContratosReport> {
    let mut years = store.contrato_years()?;
    let year = params.year.or_else(|| years.first().copied());
    years.reverse();

    let lines = match year {
        Some(year) => store.execucoes_contratos(&ContratoQuery {
            year: Some(year),
            categoria_id: None,
        })?,
        None => Vec::new(),
    };

    let mut categorias: Vec<CategoriaRef> = lines
        .iter()
        .filter_map(|l| l.categoria.as_ref())
        .map(|c| CategoriaRef {
            id: c.id,
            name: c.name.clone(),
        })
        .collect();
    categorias.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    categorias.dedup();

    let year_or_zero = year.unwrap_or_default();
    Ok(ContratosReport {
        big_number: big_number(&lines, year_or_zero),
        destinations: destinations(&lines, year_or_zero),
        top5: top5(&lines, params.categoria),
        filters: Filters {
            selected_year: year,
            selected_categoria: params.categoria,
            years,
            categorias,
        },
        last_updated: store.get_meta(META_CONTRATOS)?,
    })
}

impl Tabular for ContratosReport {
    fn tables(&self) -> Vec<Table> {
        let mut summary =
            Table::new("Contratos", ["year", "empenhado", "liquidado", "% liquidado"]);
        if let Some(big) = &self.big_number {
            summary.push([
                big.year.to_string(),
                money(big.empenhado),
                money(big.liquidado),
                pct(big.percent_liquidado * 100.0),
            ]);
        }

        let mut destinations = Table::new(
            "Destinos",
            ["categoria", "empenhado", "liquidado", "% liquidado", "% do total"],
        );
        for d in &self.destinations {
            destinations.push([
                d.categoria_name.clone().unwrap_or_else(|| "Sem categoria".to_string()),
                money(d.empenhado),
                money(d.liquidado),
                pct(d.percent_liquidado * 100.0),
                pct(d.percent_empenhado * 100.0),
            ]);
        }

        let mut top5 = Table::new("Top 5", ["fornecedor", "objeto", "modalidade", "empenhado"]);
        for c in &self.top5 {
            top5.push([
                opt(c.fornecedor.as_deref()),
                opt(c.objeto_contrato.as_deref()),
                opt(c.modalidade.as_deref()),
                money(c.empenhado),
            ]);
        }
        vec![summary, destinations, top5]
    }
}
