//! Composition of the regionalizacao payload

use miette::Result;
use serde::Serialize;

use crate::core::config::Settings;
use crate::core::nav::Crumb;
use crate::core::store::{Store, META_REGIONALIZACAO};
use crate::render::{money, opt, Table, Tabular};

use super::breadcrumb;
use super::filters::{resolve, Level, PlaceParams};
use super::places::{
    build_etapas, build_locations, build_places, EscolaDetail, Etapa, Location, Place, Terminal,
};

/// Payload of one regionalizacao request
#[derive(Debug, Clone, Serialize)]
pub struct RegionalizacaoReport {
    pub breadcrumb: Vec<Crumb>,
    pub level: u8,
    pub level_label: &'static str,
    pub year: Option<i32>,
    pub rede: Option<String>,
    pub localidade: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub places: Option<Vec<Place>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etapas: Option<Vec<Etapa>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escola: Option<EscolaDetail>,
    pub locations: Vec<Location>,
    pub last_updated: Option<String>,
}

/// Build the report for a parsed request
pub fn build_report(
    store: &Store,
    settings: &Settings,
    requested: &PlaceParams,
) -> Result<RegionalizacaoReport> {
    let resolved = resolve(store, settings, requested)?;
    let params = resolved.params;
    let mut level = params.level();

    let mut report = RegionalizacaoReport {
        breadcrumb: breadcrumb::build(store, settings, &params)?,
        level: level.index(),
        level_label: level.label(),
        year: params.year,
        rede: params.rede.clone(),
        localidade: params.localidade.as_str(),
        total: None,
        places: None,
        etapas: None,
        escola: None,
        locations: build_locations(&resolved.locations_records, params.localidade),
        last_updated: store.get_meta(META_REGIONALIZACAO)?,
    };

    if level == Level::Escola {
        match Terminal::from_records(&resolved.map_records) {
            Terminal::Single(detail) => {
                report.escola = Some(*detail);
                return Ok(report);
            }
            Terminal::Ambiguous(count) => {
                tracing::warn!(
                    escola = ?params.escola,
                    count,
                    "escola filter did not match a single record, listing distrito"
                );
                level = Level::Distrito;
                report.level = level.index();
                report.level_label = level.label();
            }
        }
    }

    let records = &resolved.map_records;
    let with_vagas = params.rede.as_deref() == Some(settings.conveniada_rede.as_str());
    report.total = Some(records.iter().map(|r| r.total()).sum());
    report.places = Some(build_places(records, level, &params, settings));
    report.etapas = Some(build_etapas(records, settings, with_vagas));

    Ok(report)
}

impl Tabular for RegionalizacaoReport {
    fn tables(&self) -> Vec<Table> {
        let mut tables = Vec::new();

        if let Some(escola) = &self.escola {
            let mut detail = Table::new(escola.name.clone(), ["recurso", "valor"]);
            for recurso in &escola.recursos {
                let name = match &recurso.subgrupo {
                    Some(sub) => format!("{} / {}", recurso.grupo, sub),
                    None => recurso.grupo.clone(),
                };
                detail.push([name, money(recurso.valor)]);
            }
            detail.push(["Total".to_string(), opt(escola.total.map(money))]);
            tables.push(detail);
        }

        if let Some(places) = &self.places {
            let mut list = Table::new(self.level_label, [self.level_label, "total", "url"]);
            for place in places {
                list.push([
                    place.name().to_string(),
                    money(place.total()),
                    place.url().to_string(),
                ]);
            }
            if let Some(total) = self.total {
                list.push(["Total".to_string(), money(total), String::new()]);
            }
            tables.push(list);
        }

        if let Some(etapas) = &self.etapas {
            let mut by_etapa = Table::new("Etapas", ["etapa", "unidades", "total", "vagas"]);
            for etapa in etapas {
                by_etapa.push([
                    etapa.name.clone(),
                    etapa.unidades.to_string(),
                    money(etapa.total),
                    opt(etapa.vagas),
                ]);
            }
            tables.push(by_etapa);
        }

        let mut locations = Table::new(self.localidade, [self.localidade, "total"]);
        for location in &self.locations {
            locations.push([location.name.clone(), money(location.total)]);
        }
        tables.push(locations);
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::NewEscolaInfo;

    fn seed(store: &Store, codesc: &str, zona: &str, coddist: i64, rede: &str, total: f64) {
        store.upsert_dre("DRE-A", "Diretoria A").unwrap();
        store.set_distrito_zona(coddist, &format!("Distrito {}", coddist), zona).unwrap();
        store.upsert_tipo_escola("EMEF", None, Some("Fundamental")).unwrap();
        store
            .upsert_escola_info(&NewEscolaInfo {
                year: 2019,
                codesc: codesc.into(),
                nomesc: format!("Escola {}", codesc),
                dre_code: "DRE-A".into(),
                coddist,
                tipoesc: "EMEF".into(),
                rede: rede.into(),
                total_vagas: Some(3),
                budget_total: Some(total),
                ..Default::default()
            })
            .unwrap();
    }

    fn fixture() -> Store {
        let store = Store::open_in_memory().unwrap();
        seed(&store, "1", "Norte", 1, "DIR", 100.0);
        seed(&store, "2", "Norte", 1, "DIR", 50.0);
        seed(&store, "3", "Sul", 2, "DIR", 30.0);
        seed(&store, "4", "Sul", 2, "CON", 999.0);
        store
    }

    #[test]
    fn test_root_level_defaults_year_and_rede() {
        let store = fixture();
        let report = build_report(&store, &Settings::default(), &PlaceParams::default()).unwrap();

        assert_eq!(report.level, 0);
        assert_eq!(report.year, Some(2019));
        assert_eq!(report.rede.as_deref(), Some("DIR"));
        assert_eq!(report.total, Some(180.0));
        let places = report.places.unwrap();
        let summary: Vec<(&str, f64)> = places.iter().map(|p| (p.name(), p.total())).collect();
        assert_eq!(summary, vec![("Norte", 150.0), ("Sul", 30.0)]);
        assert!(report.etapas.unwrap()[0].vagas.is_none());
    }

    #[test]
    fn test_escola_level_returns_detail_only() {
        let store = fixture();
        let params = PlaceParams::from_query("distrito=1&escola=1");
        let report = build_report(&store, &Settings::default(), &params).unwrap();

        assert_eq!(report.level, 4);
        assert_eq!(report.escola.as_ref().map(|e| e.name.as_str()), Some("EMEF - Escola 1"));
        assert!(report.places.is_none());
        assert!(report.total.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("places").is_none());
        assert!(json.get("etapas").is_none());
    }

    #[test]
    fn test_unknown_escola_steps_back_to_distrito_list() {
        let store = fixture();
        let params = PlaceParams::from_query("distrito=1&escola=999");
        let report = build_report(&store, &Settings::default(), &params).unwrap();

        assert_eq!(report.level, 3);
        assert!(report.escola.is_none());
        let places = report.places.unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name(), "EMEF - Escola 2");
    }

    #[test]
    fn test_escola_of_other_rede_is_dropped() {
        let store = fixture();
        let params = PlaceParams::from_query("distrito=2&escola=4&rede=DIR");
        let report = build_report(&store, &Settings::default(), &params).unwrap();

        assert_eq!(report.level, 3);
        assert_eq!(report.breadcrumb.last().map(|c| c.name.as_str()), Some("Distrito 2"));
    }

    #[test]
    fn test_conveniada_rede_reports_vagas() {
        let store = fixture();
        let params = PlaceParams::from_query("rede=CON");
        let report = build_report(&store, &Settings::default(), &params).unwrap();
        assert_eq!(report.etapas.unwrap()[0].vagas, Some(3));
    }

    #[test]
    fn test_distrito_overrides_conflicting_dre() {
        let store = fixture();
        store.upsert_dre("DRE-B", "Diretoria B").unwrap();
        let settings = Settings::default();

        let params = PlaceParams::from_query("dre=DRE-B&distrito=1");
        let resolved = resolve(&store, &settings, &params).unwrap();
        let codes: Vec<&str> = resolved.map_records.iter().map(|r| r.codesc.as_str()).collect();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains(&"1") && codes.contains(&"2"));
        assert_eq!(resolved.params.dre.as_deref(), Some("DRE-B"));

        // The escola matches once the dre is ignored, so no fallback happens
        let params = PlaceParams::from_query("zona=Norte&dre=DRE-B&distrito=1&escola=1");
        let report = build_report(&store, &settings, &params).unwrap();
        assert_eq!(report.level, 4);
        assert_eq!(report.escola.map(|e| e.name), Some("EMEF - Escola 1".to_string()));
    }

    #[test]
    fn test_zona_filter_yielding_nothing_falls_back() {
        let store = fixture();
        let params = PlaceParams::from_query("zona=Leste");
        let report = build_report(&store, &Settings::default(), &params).unwrap();
        // Fallback keeps rede + year only since no distrito was given
        assert_eq!(report.total, Some(180.0));
    }
}
