//! Generic section handler: table rows, breadcrumb, toggles and time series

use chrono::Datelike;
use miette::Result;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::core::config::Settings;
use crate::core::nav::{self, Crumb};
use crate::core::rollup::{group_by, percent};
use crate::core::store::{Execucao, ExecucaoQuery, Store, Taxonomy, META_MOSAICO};
use crate::render::{money, pct, Table, Tabular};

use super::sections::{Mode, MosaicoPath, Section};
use super::timeseries::{self, TimeseriesPoint};

/// Query-string options shared by every section page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MosaicoOptions {
    /// Funding-source group
    pub fonte: Option<i64>,
    pub deflate: bool,
    pub minimo_legal: bool,
}

impl MosaicoOptions {
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(&nav::parse_query(query))
    }

    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self {
            fonte: nav::param_i64(pairs, "fonte"),
            deflate: nav::param_bool(pairs, "deflate"),
            minimo_legal: nav::param_bool(pairs, "minimo_legal"),
        }
    }

    /// Set options as query pairs; false flags are omitted
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(fonte) = self.fonte {
            pairs.push(("fonte", fonte.to_string()));
        }
        if self.deflate {
            pairs.push(("deflate", "true".to_string()));
        }
        if self.minimo_legal {
            pairs.push(("minimo_legal", "true".to_string()));
        }
        pairs
    }

    pub fn query_string(&self) -> String {
        nav::encode(self.pairs())
    }

    /// Narrow `query` to the rows these options select
    ///
    /// Without `minimo_legal` only the secretariat's own rows that are not
    /// minimo-legal are kept; with it, every minimo-legal row is.
    pub fn apply(&self, mut query: ExecucaoQuery, settings: &Settings) -> ExecucaoQuery {
        if self.minimo_legal {
            query.minimo_legal = Some(true);
        } else {
            query.orgao_id = Some(settings.sme_orgao_id);
            query.minimo_legal = Some(false);
        }
        query.fonte_grupo_id = self.fonte;
        query
    }
}

/// One table row; its keys are prefixed with the section dimension
#[derive(Debug, Clone, PartialEq)]
pub struct ExecucaoRow {
    pub dim: &'static str,
    pub id: i64,
    pub desc: String,
    pub orcado_total: f64,
    pub orcado_percent: f64,
    pub empenhado_total: f64,
    pub empenhado_percent: f64,
    /// Child section page; `None` on leaf sections
    pub url: Option<String>,
}

impl Serialize for ExecucaoRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry(&format!("{}_id", self.dim), &self.id)?;
        map.serialize_entry(&format!("{}_desc", self.dim), &self.desc)?;
        map.serialize_entry("orcado_total", &self.orcado_total)?;
        map.serialize_entry("orcado_percent", &self.orcado_percent)?;
        map.serialize_entry("empenhado_total", &self.empenhado_total)?;
        map.serialize_entry("empenhado_percent", &self.empenhado_percent)?;
        map.serialize_entry("url", &self.url)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FonteOption {
    pub id: i64,
    pub desc: String,
    pub selecionado: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FonteFilterUrl {
    pub id: i64,
    pub desc: String,
    pub url: String,
}

/// Payload of one mosaico section page
#[derive(Debug, Clone, Serialize)]
pub struct MosaicoReport {
    pub section: &'static str,
    pub dim: &'static str,
    pub year: i32,
    pub breadcrumb: Vec<Crumb>,
    pub tecnico: bool,
    pub toggle_mode_url: String,
    pub fontes_de_recurso: Vec<FonteOption>,
    pub fonte_filters_urls: Vec<FonteFilterUrl>,
    pub deflate: bool,
    pub toggle_deflator_url: String,
    pub download_full_url: String,
    pub download_filtered_url: String,
    pub minimo_legal: bool,
    pub orcado_total: f64,
    pub empenhado_total: f64,
    pub execucoes: Vec<ExecucaoRow>,
    pub timeseries: Vec<TimeseriesPoint>,
    pub last_updated: Option<String>,
}

/// Landing path when no year is given: the newest year with data
pub fn default_path(store: &Store) -> Result<MosaicoPath> {
    let year = match store.execucao_years()?.first() {
        Some(year) => *year,
        None => chrono::Local::now().year(),
    };
    Ok(MosaicoPath::year(year))
}

/// Build the page of `section` under `path`
pub fn build_report(
    store: &Store,
    settings: &Settings,
    section: Section,
    path: &MosaicoPath,
    options: &MosaicoOptions,
) -> Result<MosaicoReport> {
    let config = section.config();
    let mode = config.mode;
    let root_path = path.section_path(Section::root(mode));
    let link = |p: &str, query: &str| settings.url(&nav::with_query(p, query));

    let mut query = options.apply(path.query(section), settings);
    query.year = Some(path.year);
    let records = store.execucoes(&query)?;
    let rows = rows(&records, section, path, options, settings);

    let series_query = (config.timeseries_filter)(path);
    let deflators = if options.deflate {
        Some(store.deflators()?)
    } else {
        None
    };
    let series = timeseries::build(&store.execucoes(&series_query)?, deflators.as_ref());

    let fontes = store.nodes(Taxonomy::FonteGrupo)?;
    let fonte_filters_urls = fontes
        .iter()
        .map(|fonte| {
            let selected = MosaicoOptions {
                fonte: Some(fonte.id),
                ..options.clone()
            };
            FonteFilterUrl {
                id: fonte.id,
                desc: fonte.desc.clone(),
                url: link(&root_path, &selected.query_string()),
            }
        })
        .collect();
    let fontes_de_recurso = fontes
        .into_iter()
        .map(|fonte| FonteOption {
            selecionado: options.fonte == Some(fonte.id),
            id: fonte.id,
            desc: fonte.desc,
        })
        .collect();

    let toggled = MosaicoOptions {
        deflate: !options.deflate,
        ..options.clone()
    };
    let other_mode = match mode {
        Mode::Simples => Mode::Tecnico,
        Mode::Tecnico => Mode::Simples,
    };

    Ok(MosaicoReport {
        section: section.as_str(),
        dim: config.dim,
        year: path.year,
        breadcrumb: breadcrumb(store, settings, section, path, options)?,
        tecnico: mode == Mode::Tecnico,
        toggle_mode_url: link(
            &path.section_path(Section::root(other_mode)),
            &options.query_string(),
        ),
        fontes_de_recurso,
        fonte_filters_urls,
        deflate: options.deflate,
        toggle_deflator_url: link(&root_path, &toggled.query_string()),
        download_full_url: download_url(settings, section, path, options, false),
        download_filtered_url: download_url(settings, section, path, options, true),
        minimo_legal: options.minimo_legal,
        orcado_total: rows.iter().map(|r| r.orcado_total).sum(),
        empenhado_total: rows.iter().map(|r| r.empenhado_total).sum(),
        execucoes: rows,
        timeseries: series,
        last_updated: store.get_meta(META_MOSAICO)?,
    })
}

impl Tabular for MosaicoReport {
    fn tables(&self) -> Vec<Table> {
        let title = match self.breadcrumb.last() {
            Some(crumb) => format!("{} · {}", crumb.name, self.section),
            None => self.section.to_string(),
        };
        let mut execucoes = Table::new(
            title,
            [
                format!("{}_id", self.dim),
                format!("{}_desc", self.dim),
                "orcado".to_string(),
                "%".to_string(),
                "empenhado".to_string(),
                "%".to_string(),
            ],
        );
        for row in &self.execucoes {
            execucoes.push([
                row.id.to_string(),
                row.desc.clone(),
                money(row.orcado_total),
                pct(row.orcado_percent),
                money(row.empenhado_total),
                pct(row.empenhado_percent),
            ]);
        }
        execucoes.push([
            String::new(),
            "Total".to_string(),
            money(self.orcado_total),
            String::new(),
            money(self.empenhado_total),
            String::new(),
        ]);

        let label = if self.deflate { "Série (deflacionada)" } else { "Série" };
        let mut series = Table::new(label, ["year", "orcado", "empenhado"]);
        for point in &self.timeseries {
            series.push([point.year.to_string(), money(point.orcado), money(point.empenhado)]);
        }
        vec![execucoes, series]
    }
}

/// Group the year's records on the section node
///
/// Records without a node at this level are left out.
fn rows(
    records: &[Execucao],
    section: Section,
    path: &MosaicoPath,
    options: &MosaicoOptions,
    settings: &Settings,
) -> Vec<ExecucaoRow> {
    let config = section.config();
    let at_level: Vec<&Execucao> = records.iter().filter(|e| (config.node)(e).is_some()).collect();
    let groups = group_by(
        &at_level,
        |e| (config.node)(e).map(|n| n.id).unwrap_or_default(),
        |e| e.orcado_atualizado,
    );

    let orcado_sum: f64 = groups.iter().map(|g| g.total).sum();
    let sums: Vec<f64> = groups
        .iter()
        .map(|g| g.members.iter().map(|e| e.empenhado_liquido.unwrap_or(0.0)).sum())
        .collect();
    let empenhado_sum: f64 = sums.iter().sum();

    groups
        .iter()
        .zip(sums)
        .map(|(group, empenhado)| {
            let desc = (config.node)(group.first())
                .map(|n| n.desc.clone())
                .unwrap_or_default();
            let url = config.child.map(|child| {
                let target = path.descend(section, group.key).section_path(child);
                settings.url(&nav::with_query(&target, &options.query_string()))
            });
            ExecucaoRow {
                dim: config.dim,
                id: group.key,
                desc,
                orcado_total: group.total,
                orcado_percent: percent(group.total, orcado_sum),
                empenhado_total: empenhado,
                empenhado_percent: percent(empenhado, empenhado_sum),
                url,
            }
        })
        .collect()
}

/// "Ano {year}" then one entry per selected ancestor; the current page has
/// an empty url
fn breadcrumb(
    store: &Store,
    settings: &Settings,
    section: Section,
    path: &MosaicoPath,
    options: &MosaicoOptions,
) -> Result<Vec<Crumb>> {
    let query = options.query_string();
    let root = Section::root(section.config().mode);
    let mut crumbs = vec![Crumb::new(
        format!("Ano {}", path.year),
        settings.url(&nav::with_query(&path.section_path(root), &query)),
    )];

    let mut walked = MosaicoPath::year(path.year);
    let mut current = Some(root);
    while let Some(level) = current.filter(|s| *s != section) {
        let config = level.config();
        let Some(id) = path.id(level) else { break };
        let name = store
            .node(config.taxonomy, id)?
            .map(|n| n.desc)
            .unwrap_or_else(|| id.to_string());
        walked = walked.descend(level, id);
        let url = config
            .child
            .map(|child| settings.url(&nav::with_query(&walked.section_path(child), &query)))
            .unwrap_or_default();
        crumbs.push(Crumb::new(name, url));
        current = config.child;
    }

    if let Some(last) = crumbs.last_mut() {
        last.url.clear();
    }
    Ok(crumbs)
}

/// CSV link of a section; the filtered variant carries year, ids and options
fn download_url(
    settings: &Settings,
    section: Section,
    path: &MosaicoPath,
    options: &MosaicoOptions,
    filtered: bool,
) -> String {
    let target = format!("/mosaico/download/{}/", section);
    if !filtered {
        return settings.url(&target);
    }
    let mut pairs = vec![("year", path.year.to_string())];
    pairs.extend(path.id_pairs());
    let kept = MosaicoOptions {
        deflate: false,
        ..options.clone()
    };
    pairs.extend(kept.pairs());
    settings.url(&nav::with_query(&target, &nav::encode(pairs)))
}
