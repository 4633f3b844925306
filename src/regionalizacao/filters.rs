//! Request parameters and their resolution into record subsets

use miette::Result;
use url::form_urlencoded;

use crate::core::config::Settings;
use crate::core::store::{EscolaInfo, PlaceQuery, Store};

/// Axis of the locations comparison chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Localidade {
    #[default]
    Zona,
    Dre,
}

impl Localidade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Localidade::Zona => "zona",
            Localidade::Dre => "dre",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "dre" => Localidade::Dre,
            _ => Localidade::Zona,
        }
    }
}

/// Drill-down filters of the regionalizacao report
///
/// Empty or malformed values are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceParams {
    pub zona: Option<String>,
    pub dre: Option<String>,
    pub distrito: Option<i64>,
    pub escola: Option<String>,
    pub year: Option<i32>,
    pub rede: Option<String>,
    pub localidade: Localidade,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl PlaceParams {
    /// Parse a query string (with or without a leading path and `?`)
    pub fn from_query(query: &str) -> Self {
        let query = query.split_once('?').map(|(_, q)| q).unwrap_or(query);
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "zona" => params.zona = non_empty(&value),
                "dre" => params.dre = non_empty(&value),
                "distrito" => params.distrito = value.trim().parse().ok(),
                "escola" => params.escola = non_empty(&value),
                "year" => params.year = value.trim().parse().ok(),
                "rede" => params.rede = non_empty(&value),
                "localidade" => params.localidade = Localidade::parse(value.trim()),
                _ => {}
            }
        }
        params
    }

    /// Filters in their fixed order, without `localidade`
    fn filter_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref zona) = self.zona {
            pairs.push(("zona", zona.clone()));
        }
        if let Some(ref dre) = self.dre {
            pairs.push(("dre", dre.clone()));
        }
        if let Some(distrito) = self.distrito {
            pairs.push(("distrito", distrito.to_string()));
        }
        if let Some(ref escola) = self.escola {
            pairs.push(("escola", escola.clone()));
        }
        if let Some(year) = self.year {
            pairs.push(("year", year.to_string()));
        }
        if let Some(ref rede) = self.rede {
            pairs.push(("rede", rede.clone()));
        }
        pairs
    }

    /// Query string of the filters followed by `localidade`
    pub fn query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.filter_pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.append_pair("localidade", self.localidade.as_str());
        serializer.finish()
    }

    /// Navigation URL of this filter set
    pub fn url(&self, settings: &Settings) -> String {
        settings.url(&format!("/regionalizacao/?{}", self.query_string()))
    }

    pub fn with_zona(&self, zona: Option<String>) -> Self {
        Self { zona, ..self.clone() }
    }

    pub fn with_dre(&self, dre: String) -> Self {
        Self { dre: Some(dre), ..self.clone() }
    }

    pub fn with_distrito(&self, distrito: i64) -> Self {
        Self { distrito: Some(distrito), ..self.clone() }
    }

    pub fn with_escola(&self, escola: String) -> Self {
        Self { escola: Some(escola), ..self.clone() }
    }

    /// Drill-down depth implied by the most specific filter present
    pub fn level(&self) -> Level {
        if self.escola.is_some() {
            Level::Escola
        } else if self.distrito.is_some() {
            Level::Distrito
        } else if self.dre.is_some() {
            Level::Dre
        } else if self.zona.is_some() {
            Level::Zona
        } else {
            Level::Cidade
        }
    }
}

/// Most specific geography filter of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// No filter: zonas are listed
    Cidade,
    /// Zona filtered: dres are listed
    Zona,
    /// Dre filtered: distritos are listed
    Dre,
    /// Distrito filtered: schools are listed
    Distrito,
    /// School filtered: its detail is shown
    Escola,
}

impl Level {
    pub fn index(&self) -> u8 {
        match self {
            Level::Cidade => 0,
            Level::Zona => 1,
            Level::Dre => 2,
            Level::Distrito => 3,
            Level::Escola => 4,
        }
    }

    /// Name of the dimension shown at this level
    pub fn label(&self) -> &'static str {
        match self {
            Level::Cidade => "zona",
            Level::Zona => "dre",
            Level::Dre => "distrito",
            Level::Distrito | Level::Escola => "escola",
        }
    }
}

/// Effective filters plus the two record subsets of a request
#[derive(Debug, Clone)]
pub struct Resolved {
    pub params: PlaceParams,
    pub map_records: Vec<EscolaInfo>,
    pub locations_records: Vec<EscolaInfo>,
}

/// Fill defaults, apply the stale-selection guard and load both subsets
pub fn resolve(store: &Store, settings: &Settings, requested: &PlaceParams) -> Result<Resolved> {
    let mut params = requested.clone();
    if params.year.is_none() {
        params.year = store.place_years()?.first().copied();
    }
    if params.rede.is_none() {
        params.rede = Some(settings.default_rede.clone());
    }

    if let (Some(escola), Some(year), Some(rede)) = (&params.escola, params.year, &params.rede) {
        if let Some(stored_rede) = store.escola_rede(year, escola)? {
            if &stored_rede != rede {
                tracing::debug!(
                    escola = %escola,
                    stored = %stored_rede,
                    requested = %rede,
                    "dropping escola of another rede"
                );
                params.escola = None;
            }
        }
    }

    let fallback = PlaceQuery::new()
        .distrito(params.distrito)
        .rede(params.rede.clone())
        .year(params.year)
        .with_etapa();

    // A distrito already implies its dre
    let map_query = PlaceQuery::new()
        .zona(params.zona.clone())
        .dre(if params.distrito.is_some() { None } else { params.dre.clone() })
        .distrito(params.distrito)
        .escola(params.escola.clone())
        .year(params.year)
        .rede(params.rede.clone())
        .with_etapa();

    let mut map_records = store.escola_infos(&map_query)?;
    if map_records.is_empty() {
        tracing::debug!(?map_query, "no records for filters, falling back to distrito");
        map_records = store.escola_infos(&fallback)?;
    }

    let locations_query = PlaceQuery::new()
        .year(params.year)
        .rede(params.rede.clone())
        .with_etapa();
    let mut locations_records = store.escola_infos(&locations_query)?;
    if locations_records.is_empty() {
        locations_records = store.escola_infos(&fallback)?;
    }

    Ok(Resolved {
        params,
        map_records,
        locations_records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_coerces_malformed_values() {
        let params = PlaceParams::from_query("zona=Norte&distrito=abc&year=&rede=DIR&escola=");
        assert_eq!(params.zona.as_deref(), Some("Norte"));
        assert_eq!(params.distrito, None);
        assert_eq!(params.year, None);
        assert_eq!(params.escola, None);
        assert_eq!(params.rede.as_deref(), Some("DIR"));
        assert_eq!(params.localidade, Localidade::Zona);
    }

    #[test]
    fn test_query_string_orders_filters_and_ends_with_localidade() {
        let params = PlaceParams {
            rede: Some("DIR".into()),
            year: Some(2019),
            zona: Some("Centro Oeste".into()),
            localidade: Localidade::Dre,
            ..Default::default()
        };
        assert_eq!(
            params.query_string(),
            "zona=Centro+Oeste&year=2019&rede=DIR&localidade=dre"
        );
    }

    #[test]
    fn test_url_round_trips() {
        let params = PlaceParams {
            zona: Some("Sul".into()),
            dre: Some("DRE-IP".into()),
            distrito: Some(10),
            escola: Some("000191".into()),
            year: Some(2019),
            rede: Some("CON".into()),
            localidade: Localidade::Dre,
        };
        let url = params.url(&Settings::default());
        assert!(url.starts_with("/regionalizacao/?"));
        assert_eq!(PlaceParams::from_query(&url), params);
    }

    #[test]
    fn test_level_follows_most_specific_filter() {
        assert_eq!(PlaceParams::default().level(), Level::Cidade);
        assert_eq!(PlaceParams::from_query("zona=Sul").level(), Level::Zona);
        assert_eq!(PlaceParams::from_query("zona=Sul&dre=X").level(), Level::Dre);
        assert_eq!(PlaceParams::from_query("distrito=3").level(), Level::Distrito);
        assert_eq!(PlaceParams::from_query("zona=Sul&escola=1").level(), Level::Escola);
        assert_eq!(Level::Dre.label(), "distrito");
    }
}
