//! Section table of the mosaico drill-down
//!
//! Each section is plain data: which dimension it groups on, which path ids
//! narrow it, where it sits in its mode and what its children are. One
//! generic handler in `report` consumes it.

use std::fmt;
use std::str::FromStr;

use crate::core::store::{Execucao, ExecucaoQuery, Node, Taxonomy};

/// Visualization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// grupo → subgrupo → elemento → subelemento
    Simples,
    /// subfuncao → programa → projeto
    Tecnico,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Grupos,
    Subgrupos,
    Elementos,
    Subelementos,
    Subfuncoes,
    Programas,
    Projetos,
}

/// Static configuration of one section
#[derive(Debug, Clone, Copy)]
pub struct SectionConfig {
    pub section: Section,
    pub mode: Mode,
    /// Key prefix of the row fields (`grupo_id`, `grupo_desc`, ...)
    pub dim: &'static str,
    pub taxonomy: Taxonomy,
    /// Node of a record at this section's level
    pub node: fn(&Execucao) -> Option<&Node>,
    /// Section reached by clicking a row
    pub child: Option<Section>,
    /// Records of the per-year series: path ids only, every year, every
    /// orgao and funding source
    pub timeseries_filter: fn(&MosaicoPath) -> ExecucaoQuery,
}

fn every_record(_: &MosaicoPath) -> ExecucaoQuery {
    ExecucaoQuery::default()
}

fn by_grupo(path: &MosaicoPath) -> ExecucaoQuery {
    ExecucaoQuery {
        grupo_id: path.grupo_id,
        ..Default::default()
    }
}

fn by_subgrupo(path: &MosaicoPath) -> ExecucaoQuery {
    ExecucaoQuery {
        subgrupo_id: path.subgrupo_id,
        ..Default::default()
    }
}

fn by_elemento(path: &MosaicoPath) -> ExecucaoQuery {
    ExecucaoQuery {
        subgrupo_id: path.subgrupo_id,
        elemento_id: path.elemento_id,
        ..Default::default()
    }
}

fn by_subfuncao(path: &MosaicoPath) -> ExecucaoQuery {
    ExecucaoQuery {
        subfuncao_id: path.subfuncao_id,
        ..Default::default()
    }
}

fn by_programa(path: &MosaicoPath) -> ExecucaoQuery {
    ExecucaoQuery {
        subfuncao_id: path.subfuncao_id,
        programa_id: path.programa_id,
        ..Default::default()
    }
}

pub const ALL_SECTIONS: [Section; 7] = [
    Section::Grupos,
    Section::Subgrupos,
    Section::Elementos,
    Section::Subelementos,
    Section::Subfuncoes,
    Section::Programas,
    Section::Projetos,
];

impl Section {
    pub fn config(&self) -> SectionConfig {
        let section = *self;
        match self {
            Section::Grupos => SectionConfig {
                section,
                mode: Mode::Simples,
                dim: "grupo",
                taxonomy: Taxonomy::Grupo,
                node: |e| e.grupo.as_ref(),
                child: Some(Section::Subgrupos),
                timeseries_filter: every_record,
            },
            Section::Subgrupos => SectionConfig {
                section,
                mode: Mode::Simples,
                dim: "subgrupo",
                taxonomy: Taxonomy::Subgrupo,
                node: |e| e.subgrupo.as_ref(),
                child: Some(Section::Elementos),
                timeseries_filter: by_grupo,
            },
            Section::Elementos => SectionConfig {
                section,
                mode: Mode::Simples,
                dim: "elemento",
                taxonomy: Taxonomy::Elemento,
                node: |e| e.elemento.as_ref(),
                child: Some(Section::Subelementos),
                timeseries_filter: by_subgrupo,
            },
            Section::Subelementos => SectionConfig {
                section,
                mode: Mode::Simples,
                dim: "subelemento",
                taxonomy: Taxonomy::Subelemento,
                node: |e| e.subelemento.as_ref(),
                child: None,
                timeseries_filter: by_elemento,
            },
            Section::Subfuncoes => SectionConfig {
                section,
                mode: Mode::Tecnico,
                dim: "subfuncao",
                taxonomy: Taxonomy::Subfuncao,
                node: |e| e.subfuncao.as_ref(),
                child: Some(Section::Programas),
                timeseries_filter: every_record,
            },
            Section::Programas => SectionConfig {
                section,
                mode: Mode::Tecnico,
                dim: "programa",
                taxonomy: Taxonomy::Programa,
                node: |e| e.programa.as_ref(),
                child: Some(Section::Projetos),
                timeseries_filter: by_subfuncao,
            },
            Section::Projetos => SectionConfig {
                section,
                mode: Mode::Tecnico,
                dim: "projeto",
                taxonomy: Taxonomy::Projeto,
                node: |e| e.projeto.as_ref(),
                child: None,
                timeseries_filter: by_programa,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Grupos => "grupos",
            Section::Subgrupos => "subgrupos",
            Section::Elementos => "elementos",
            Section::Subelementos => "subelementos",
            Section::Subfuncoes => "subfuncoes",
            Section::Programas => "programas",
            Section::Projetos => "projetos",
        }
    }

    /// First section of a mode
    pub fn root(mode: Mode) -> Self {
        match mode {
            Mode::Simples => Section::Grupos,
            Mode::Tecnico => Section::Subfuncoes,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_SECTIONS
            .iter()
            .find(|section| section.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown mosaico section '{}'", s))
    }
}

/// Year and parent ids of a section page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MosaicoPath {
    pub year: i32,
    pub grupo_id: Option<i64>,
    pub subgrupo_id: Option<i64>,
    pub elemento_id: Option<i64>,
    pub subfuncao_id: Option<i64>,
    pub programa_id: Option<i64>,
}

impl MosaicoPath {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    /// Path of `section` under this path's ids
    pub fn section_path(&self, section: Section) -> String {
        let y = self.year;
        let id = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
        match section {
            Section::Grupos => format!("/mosaico/{}/grupos/", y),
            Section::Subgrupos => format!("/mosaico/{}/grupos/{}/subgrupos/", y, id(self.grupo_id)),
            Section::Elementos => format!(
                "/mosaico/{}/grupos/{}/subgrupos/{}/elementos/",
                y,
                id(self.grupo_id),
                id(self.subgrupo_id)
            ),
            Section::Subelementos => format!(
                "/mosaico/{}/grupos/{}/subgrupos/{}/elementos/{}/subelementos/",
                y,
                id(self.grupo_id),
                id(self.subgrupo_id),
                id(self.elemento_id)
            ),
            Section::Subfuncoes => format!("/mosaico/{}/subfuncoes/", y),
            Section::Programas => {
                format!("/mosaico/{}/subfuncoes/{}/programas/", y, id(self.subfuncao_id))
            }
            Section::Projetos => format!(
                "/mosaico/{}/subfuncoes/{}/programas/{}/projetos/",
                y,
                id(self.subfuncao_id),
                id(self.programa_id)
            ),
        }
    }

    /// This path extended with the id of a row of `section`
    pub fn descend(&self, section: Section, id: i64) -> Self {
        let mut next = self.clone();
        match section {
            Section::Grupos => next.grupo_id = Some(id),
            Section::Subgrupos => next.subgrupo_id = Some(id),
            Section::Elementos => next.elemento_id = Some(id),
            Section::Subfuncoes => next.subfuncao_id = Some(id),
            Section::Programas => next.programa_id = Some(id),
            Section::Subelementos | Section::Projetos => {}
        }
        next
    }

    /// Id selected at `section`, if the path goes below it
    pub fn id(&self, section: Section) -> Option<i64> {
        match section {
            Section::Grupos => self.grupo_id,
            Section::Subgrupos => self.subgrupo_id,
            Section::Elementos => self.elemento_id,
            Section::Subfuncoes => self.subfuncao_id,
            Section::Programas => self.programa_id,
            Section::Subelementos | Section::Projetos => None,
        }
    }

    /// Section filter over the record set; `year` is applied separately
    pub fn query(&self, section: Section) -> ExecucaoQuery {
        let mut query = ExecucaoQuery::default();
        match section.config().mode {
            Mode::Simples => {
                query.with_subgrupo = true;
                query.grupo_id = self.grupo_id;
                query.subgrupo_id = self.subgrupo_id;
                query.elemento_id = self.elemento_id;
            }
            Mode::Tecnico => {
                query.subfuncao_id = self.subfuncao_id;
                query.programa_id = self.programa_id;
            }
        }
        query
    }

    /// Parent ids as query pairs (used by the download links)
    pub fn id_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("grupo_id", self.grupo_id),
            ("subgrupo_id", self.subgrupo_id),
            ("elemento_id", self.elemento_id),
            ("subfuncao_id", self.subfuncao_id),
            ("programa_id", self.programa_id),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v.to_string())))
        .collect()
    }

    /// Parse `/mosaico/<year>/<section>/<id>/...` into the section it lands on
    pub fn parse(path: &str) -> Option<(Section, Self)> {
        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let (head, rest) = segments.split_first()?;
        if *head != "mosaico" {
            return None;
        }
        let (year, rest) = rest.split_first()?;
        let mut parsed = MosaicoPath::year(year.parse().ok()?);

        let mut iter = rest.iter();
        let mut last: Option<Section> = None;
        while let Some(name) = iter.next() {
            let section: Section = name.parse().ok()?;
            let expected = match last {
                Some(previous) => previous.config().child,
                None if section == Section::root(section.config().mode) => Some(section),
                None => None,
            };
            if expected != Some(section) {
                return None;
            }
            match iter.next() {
                Some(id) => {
                    parsed = parsed.descend(section, id.parse().ok()?);
                    last = Some(section);
                }
                None => return Some((section, parsed)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_paths() {
        let path = MosaicoPath {
            year: 2018,
            grupo_id: Some(1),
            subgrupo_id: Some(11),
            elemento_id: Some(30),
            ..Default::default()
        };
        assert_eq!(
            path.section_path(Section::Subelementos),
            "/mosaico/2018/grupos/1/subgrupos/11/elementos/30/subelementos/"
        );
    }

    #[test]
    fn test_parse_round_trips_section_paths() {
        let tecnico = MosaicoPath {
            year: 2019,
            subfuncao_id: Some(361),
            programa_id: Some(3010),
            ..Default::default()
        };
        let url = tecnico.section_path(Section::Projetos);
        assert_eq!(MosaicoPath::parse(&url), Some((Section::Projetos, tecnico)));

        let root = MosaicoPath::year(2019);
        assert_eq!(
            MosaicoPath::parse("/mosaico/2019/grupos/"),
            Some((Section::Grupos, root.clone()))
        );
        assert_eq!(
            MosaicoPath::parse("/mosaico/2019/subfuncoes/"),
            Some((Section::Subfuncoes, root))
        );
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert_eq!(MosaicoPath::parse("/mosaico/abc/grupos/"), None);
        assert_eq!(MosaicoPath::parse("/mosaico/2019/subgrupos/"), None);
        assert_eq!(MosaicoPath::parse("/mosaico/2019/grupos/1/programas/"), None);
        assert_eq!(MosaicoPath::parse("/contratos/"), None);
    }

    #[test]
    fn test_query_follows_mode() {
        let path = MosaicoPath {
            year: 2019,
            grupo_id: Some(1),
            ..Default::default()
        };
        let q = path.query(Section::Subgrupos);
        assert!(q.with_subgrupo);
        assert_eq!(q.grupo_id, Some(1));

        let q = MosaicoPath::year(2019).query(Section::Subfuncoes);
        assert!(!q.with_subgrupo);
        assert_eq!(q.year, None);
    }

    #[test]
    fn test_section_from_str() {
        assert_eq!("programas".parse::<Section>(), Ok(Section::Programas));
        assert!("foo".parse::<Section>().is_err());
    }
}
