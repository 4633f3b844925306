//! Per-level place lists, etapa breakdown and locations pivot

use serde::Serialize;

use crate::core::config::Settings;
use crate::core::rollup::group_by;
use crate::core::store::{EscolaInfo, Recurso};

use super::filters::{Level, Localidade, PlaceParams};

/// One entry of the place list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Place {
    Group(GroupPlace),
    Escola(EscolaPlace),
}

impl Place {
    pub fn name(&self) -> &str {
        match self {
            Place::Group(g) => &g.name,
            Place::Escola(e) => &e.name,
        }
    }

    pub fn total(&self) -> f64 {
        match self {
            Place::Group(g) => g.total,
            Place::Escola(e) => e.total,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Place::Group(g) => &g.url,
            Place::Escola(e) => &e.url,
        }
    }
}

/// A zona, dre or distrito with its summed budget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupPlace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    pub total: f64,
    pub url: String,
}

/// One school of a distrito
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscolaPlace {
    pub code: String,
    pub name: String,
    pub total: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub slug: Option<String>,
    pub url: String,
}

/// Detail of a single school
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscolaDetail {
    pub name: String,
    pub address: String,
    pub cep: Option<i64>,
    pub total: Option<f64>,
    pub recursos: Vec<Recurso>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl EscolaDetail {
    pub fn from_record(info: &EscolaInfo) -> Self {
        Self {
            name: info.display_name(),
            address: format!(
                "{}, {} - {}",
                info.endereco.as_deref().unwrap_or(""),
                info.numero.map(|n| n.to_string()).unwrap_or_default(),
                info.bairro.as_deref().unwrap_or("")
            ),
            cep: info.cep,
            total: info.budget_total,
            recursos: info.recursos.clone(),
            latitude: info.latitude,
            longitude: info.longitude,
        }
    }
}

/// Outcome of a request filtered down to one school
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// Exactly one record: show its detail
    Single(Box<EscolaDetail>),
    /// Zero or several records: show the distrito school list instead
    Ambiguous(usize),
}

impl Terminal {
    pub fn from_records(records: &[EscolaInfo]) -> Self {
        match records {
            [single] => Terminal::Single(Box::new(EscolaDetail::from_record(single))),
            _ => Terminal::Ambiguous(records.len()),
        }
    }
}

/// Education stage with its schools, budget and types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Etapa {
    pub name: String,
    pub unidades: usize,
    pub total: f64,
    pub slug: Option<String>,
    pub tipos: Vec<TipoRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vagas: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TipoRef {
    pub code: String,
    pub desc: Option<String>,
}

/// One bar of the locations comparison chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub name: String,
    pub total: f64,
}

/// Place list for a (non-terminal) listing level
pub fn build_places(
    records: &[EscolaInfo],
    level: Level,
    params: &PlaceParams,
    settings: &Settings,
) -> Vec<Place> {
    match level {
        Level::Cidade => group_by(records, |r| r.distrito.zona.clone(), |r| r.budget_total)
            .into_iter()
            .map(|g| {
                Place::Group(GroupPlace {
                    code: None,
                    name: g.key.clone().unwrap_or_default(),
                    total: g.total,
                    url: params.with_zona(g.key).url(settings),
                })
            })
            .collect(),
        Level::Zona => group_by(records, |r| r.dre.code.clone(), |r| r.budget_total)
            .into_iter()
            .map(|g| {
                Place::Group(GroupPlace {
                    code: Some(g.key.clone()),
                    name: g.first().dre.name.clone(),
                    total: g.total,
                    url: params.with_dre(g.key).url(settings),
                })
            })
            .collect(),
        Level::Dre => group_by(records, |r| r.distrito.coddist, |r| r.budget_total)
            .into_iter()
            .map(|g| {
                Place::Group(GroupPlace {
                    code: Some(g.key.to_string()),
                    name: g.first().distrito.name.clone(),
                    total: g.total,
                    url: params.with_distrito(g.key).url(settings),
                })
            })
            .collect(),
        Level::Distrito | Level::Escola => {
            let mut places: Vec<EscolaPlace> = records
                .iter()
                .map(|info| EscolaPlace {
                    code: info.codesc.clone(),
                    name: info.display_name(),
                    total: info.total(),
                    latitude: info.latitude,
                    longitude: info.longitude,
                    slug: info
                        .tipoesc
                        .etapa
                        .as_deref()
                        .and_then(|e| settings.etapa_slug(e)),
                    url: params.with_escola(info.codesc.clone()).url(settings),
                })
                .collect();
            places.sort_by(|a, b| b.name.cmp(&a.name));
            places.into_iter().map(Place::Escola).collect()
        }
    }
}

/// Etapa breakdown ordered by (unidades, total) descending
pub fn build_etapas(records: &[EscolaInfo], settings: &Settings, with_vagas: bool) -> Vec<Etapa> {
    let mut etapas: Vec<Etapa> = group_by(records, |r| r.tipoesc.etapa.clone(), |r| r.budget_total)
        .into_iter()
        .map(|g| {
            let name = g.key.clone().unwrap_or_default();
            let mut tipos: Vec<TipoRef> = g
                .members
                .iter()
                .map(|r| TipoRef {
                    code: r.tipoesc.code.clone(),
                    desc: r.tipoesc.desc.clone(),
                })
                .collect();
            tipos.sort_by(|a, b| a.code.cmp(&b.code));
            tipos.dedup_by(|a, b| a.code == b.code);

            Etapa {
                slug: settings.etapa_slug(&name),
                name,
                unidades: g.len(),
                total: g.total,
                tipos,
                vagas: with_vagas
                    .then(|| g.members.iter().map(|r| r.total_vagas.unwrap_or(0)).sum()),
            }
        })
        .collect();

    etapas.sort_by(|a, b| {
        b.unidades
            .cmp(&a.unidades)
            .then_with(|| b.total.total_cmp(&a.total))
            .then_with(|| a.name.cmp(&b.name))
    });
    etapas
}

/// Totals per dre name or per zona, depending on the chosen axis
pub fn build_locations(records: &[EscolaInfo], localidade: Localidade) -> Vec<Location> {
    let key = |r: &EscolaInfo| match localidade {
        Localidade::Dre => Some(r.dre.name.clone()),
        Localidade::Zona => r.distrito.zona.clone(),
    };
    group_by(records, key, |r| r.budget_total)
        .into_iter()
        .map(|g| Location {
            name: g.key.unwrap_or_default(),
            total: g.total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{Distrito, Dre, TipoEscola};

    fn record(
        codesc: &str,
        zona: &str,
        dre: &str,
        coddist: i64,
        tipo: &str,
        etapa: &str,
        total: f64,
    ) -> EscolaInfo {
        EscolaInfo {
            id: 0,
            year: 2019,
            codesc: codesc.to_string(),
            nomesc: format!("Escola {}", codesc),
            dre: Dre {
                code: dre.to_string(),
                name: format!("DRE {}", dre),
            },
            distrito: Distrito {
                coddist,
                name: format!("Distrito {}", coddist),
                zona: Some(zona.to_string()),
            },
            tipoesc: TipoEscola {
                code: tipo.to_string(),
                desc: Some(format!("Tipo {}", tipo)),
                etapa: Some(etapa.to_string()),
            },
            endereco: Some("Rua A".into()),
            numero: Some(10),
            bairro: Some("Centro".into()),
            cep: Some(1000000),
            rede: "DIR".into(),
            latitude: Some(-23.5),
            longitude: Some(-46.6),
            total_vagas: Some(5),
            budget_total: Some(total),
            recursos: vec![],
        }
    }

    fn params() -> PlaceParams {
        PlaceParams {
            year: Some(2019),
            rede: Some("DIR".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_zona_level_sums_per_zona() {
        let records = vec![
            record("1", "Norte", "A", 1, "EMEF", "Fundamental", 100.0),
            record("2", "Norte", "A", 1, "EMEF", "Fundamental", 50.0),
            record("3", "Sul", "B", 2, "EMEI", "Infantil", 30.0),
        ];
        let places = build_places(&records, Level::Cidade, &params(), &Settings::default());

        let summary: Vec<(&str, f64)> = places.iter().map(|p| (p.name(), p.total())).collect();
        assert_eq!(summary, vec![("Norte", 150.0), ("Sul", 30.0)]);
        assert_eq!(
            places[0].url(),
            "/regionalizacao/?zona=Norte&year=2019&rede=DIR&localidade=zona"
        );
    }

    #[test]
    fn test_dre_level_uses_code_and_name() {
        let records = vec![
            record("1", "Norte", "A", 1, "EMEF", "Fundamental", 10.0),
            record("2", "Norte", "B", 2, "EMEF", "Fundamental", 20.0),
        ];
        let p = params().with_zona(Some("Norte".into()));
        let places = build_places(&records, Level::Zona, &p, &Settings::default());
        match &places[0] {
            Place::Group(g) => {
                assert_eq!(g.code.as_deref(), Some("B"));
                assert_eq!(g.name, "DRE B");
                assert!(g.url.contains("zona=Norte&dre=B"));
            }
            other => panic!("unexpected place {:?}", other),
        }
    }

    #[test]
    fn test_escola_list_sorted_by_name_descending_with_slug() {
        let records = vec![
            record("1", "Norte", "A", 1, "EMEF", "Fundamental", 10.0),
            record("2", "Norte", "A", 1, "EMEI", "Creche", 20.0),
        ];
        let places = build_places(&records, Level::Distrito, &params(), &Settings::default());
        let names: Vec<&str> = places.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["EMEI - Escola 2", "EMEF - Escola 1"]);
        match (&places[0], &places[1]) {
            (Place::Escola(a), Place::Escola(b)) => {
                assert_eq!(a.slug, None);
                assert_eq!(b.slug.as_deref(), Some("fundamental"));
            }
            other => panic!("unexpected places {:?}", other),
        }
    }

    #[test]
    fn test_etapas_ordered_by_unidades_then_total() {
        let records = vec![
            record("1", "Norte", "A", 1, "EMEI", "Infantil", 500.0),
            record("2", "Norte", "A", 1, "EMEF", "Fundamental", 10.0),
            record("3", "Norte", "A", 1, "CEU EMEF", "Fundamental", 10.0),
            record("4", "Norte", "A", 1, "EMEF", "Fundamental", 10.0),
        ];
        let etapas = build_etapas(&records, &Settings::default(), false);
        assert_eq!(etapas[0].name, "Fundamental");
        assert_eq!(etapas[0].unidades, 3);
        let codes: Vec<&str> = etapas[0].tipos.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["CEU EMEF", "EMEF"]);
        assert_eq!(etapas[0].vagas, None);

        let with_vagas = build_etapas(&records, &Settings::default(), true);
        assert_eq!(with_vagas[0].vagas, Some(15));
    }

    #[test]
    fn test_locations_by_dre_name() {
        let records = vec![
            record("1", "Norte", "A", 1, "EMEF", "Fundamental", 10.0),
            record("2", "Sul", "A", 2, "EMEF", "Fundamental", 5.0),
            record("3", "Sul", "B", 3, "EMEF", "Fundamental", 30.0),
        ];
        let by_dre = build_locations(&records, Localidade::Dre);
        assert_eq!(
            by_dre,
            vec![
                Location { name: "DRE B".into(), total: 30.0 },
                Location { name: "DRE A".into(), total: 15.0 },
            ]
        );
        let by_zona = build_locations(&records, Localidade::Zona);
        assert_eq!(by_zona[0].name, "Sul");
        assert_eq!(by_zona[0].total, 35.0);
    }

    #[test]
    fn test_terminal_requires_exactly_one_record() {
        let one = vec![record("1", "Norte", "A", 1, "EMEF", "Fundamental", 10.0)];
        match Terminal::from_records(&one) {
            Terminal::Single(detail) => {
                assert_eq!(detail.name, "EMEF - Escola 1");
                assert_eq!(detail.address, "Rua A, 10 - Centro");
            }
            other => panic!("expected single, got {:?}", other),
        }
        assert_eq!(Terminal::from_records(&[]), Terminal::Ambiguous(0));
    }
}
