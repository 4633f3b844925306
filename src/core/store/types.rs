//! Store type definitions
//!
//! Records, reference nodes and the immutable query values used to select
//! them. Query values are plain data; nothing touches SQLite until a store
//! method resolves them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =========================================================================
// Geography (regionalizacao)
// =========================================================================

/// Diretoria Regional de Educação
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dre {
    pub code: String,
    pub name: String,
}

/// Distrito, carrying its canonical zona
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distrito {
    pub coddist: i64,
    pub name: String,
    pub zona: Option<String>,
}

/// School type with its free-text education stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TipoEscola {
    pub code: String,
    pub desc: Option<String>,
    pub etapa: Option<String>,
}

/// One budget line of a school's resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurso {
    pub grupo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgrupo: Option<String>,
    pub valor: f64,
}

/// One school-year budget record
#[derive(Debug, Clone, PartialEq)]
pub struct EscolaInfo {
    pub id: i64,
    pub year: i32,
    pub codesc: String,
    pub nomesc: String,
    pub dre: Dre,
    pub distrito: Distrito,
    pub tipoesc: TipoEscola,
    pub endereco: Option<String>,
    pub numero: Option<i64>,
    pub bairro: Option<String>,
    pub cep: Option<i64>,
    pub rede: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_vagas: Option<i64>,
    pub budget_total: Option<f64>,
    pub recursos: Vec<Recurso>,
}

impl EscolaInfo {
    /// Budget total with null counted as zero
    pub fn total(&self) -> f64 {
        self.budget_total.unwrap_or(0.0)
    }

    /// Display name, `"{tipo} - {nome}"`
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.tipoesc.code, self.nomesc)
    }

    pub fn zona(&self) -> Option<&str> {
        self.distrito.zona.as_deref()
    }
}

/// Fields written when inserting or updating a school record
#[derive(Debug, Clone, Default)]
pub struct NewEscolaInfo {
    pub year: i32,
    pub codesc: String,
    pub nomesc: String,
    pub dre_code: String,
    pub coddist: i64,
    pub tipoesc: String,
    pub endereco: Option<String>,
    pub numero: Option<i64>,
    pub bairro: Option<String>,
    pub cep: Option<i64>,
    pub rede: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_vagas: Option<i64>,
    pub budget_total: Option<f64>,
}

/// Filter over school records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceQuery {
    pub zona: Option<String>,
    pub dre: Option<String>,
    pub distrito: Option<i64>,
    pub escola: Option<String>,
    pub year: Option<i32>,
    pub rede: Option<String>,
    /// Only records whose school type has an etapa
    pub with_etapa: bool,
}

impl PlaceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zona(mut self, zona: Option<String>) -> Self {
        self.zona = zona;
        self
    }

    pub fn dre(mut self, dre: Option<String>) -> Self {
        self.dre = dre;
        self
    }

    pub fn distrito(mut self, distrito: Option<i64>) -> Self {
        self.distrito = distrito;
        self
    }

    pub fn escola(mut self, escola: Option<String>) -> Self {
        self.escola = escola;
        self
    }

    pub fn year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn rede(mut self, rede: Option<String>) -> Self {
        self.rede = rede;
        self
    }

    pub fn with_etapa(mut self) -> Self {
        self.with_etapa = true;
        self
    }
}

// =========================================================================
// Budget taxonomy (mosaico)
// =========================================================================

/// A reference node of the budget taxonomy (id + description)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: i64,
    pub desc: String,
}

/// One budget execution line
#[derive(Debug, Clone, PartialEq)]
pub struct Execucao {
    pub id: i64,
    pub year: i32,
    pub orgao_id: i64,
    pub grupo: Option<Node>,
    pub subgrupo: Option<Node>,
    pub elemento: Option<Node>,
    pub subelemento: Option<Node>,
    pub subfuncao: Option<Node>,
    pub programa: Option<Node>,
    pub projeto: Option<Node>,
    pub fonte_grupo: Option<Node>,
    pub is_minimo_legal: bool,
    pub orcado_atualizado: Option<f64>,
    pub empenhado_liquido: Option<f64>,
}

/// Fields written when inserting an execucao; taxonomy nodes are get-or-created
#[derive(Debug, Clone, Default)]
pub struct NewExecucao {
    pub year: i32,
    pub orgao_id: i64,
    pub grupo: Option<Node>,
    pub subgrupo: Option<Node>,
    pub elemento: Option<Node>,
    pub subelemento: Option<Node>,
    pub subfuncao: Option<Node>,
    pub programa: Option<Node>,
    pub projeto: Option<Node>,
    pub fonte_grupo: Option<Node>,
    pub is_minimo_legal: bool,
    pub orcado_atualizado: Option<f64>,
    pub empenhado_liquido: Option<f64>,
}

/// Taxonomy tables, used for reference lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Taxonomy {
    Grupo,
    Subgrupo,
    Elemento,
    Subelemento,
    Subfuncao,
    Programa,
    Projeto,
    FonteGrupo,
}

impl Taxonomy {
    pub fn table(&self) -> &'static str {
        match self {
            Taxonomy::Grupo => "grupos",
            Taxonomy::Subgrupo => "subgrupos",
            Taxonomy::Elemento => "elementos",
            Taxonomy::Subelemento => "subelementos",
            Taxonomy::Subfuncao => "subfuncoes",
            Taxonomy::Programa => "programas",
            Taxonomy::Projeto => "projetos",
            Taxonomy::FonteGrupo => "fonte_grupos",
        }
    }
}

/// Filter over execucao records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecucaoQuery {
    pub year: Option<i32>,
    pub grupo_id: Option<i64>,
    pub subgrupo_id: Option<i64>,
    pub elemento_id: Option<i64>,
    pub subfuncao_id: Option<i64>,
    pub programa_id: Option<i64>,
    pub fonte_grupo_id: Option<i64>,
    pub orgao_id: Option<i64>,
    pub minimo_legal: Option<bool>,
    pub with_subgrupo: bool,
}

// =========================================================================
// Contracts (contratos)
// =========================================================================

/// A contract listed for expenditure sync
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContratoRaw {
    pub cod_contrato: i64,
    pub ano_exercicio: i32,
    pub cod_orgao: Option<i64>,
    pub cod_modalidade: Option<i64>,
    pub txt_descricao_modalidade: Option<String>,
    pub txt_objeto_contrato: Option<String>,
    pub txt_razao_social: Option<String>,
}

/// A cached upstream commitment (empenho) row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Empenho {
    pub cod_contrato: i64,
    pub ano_exercicio: i32,
    pub ano_empenho: i32,
    pub cod_empenho: i64,
    pub cod_sub_elemento: Option<String>,
    pub cod_modalidade_contrato: Option<i64>,
    pub txt_descricao_modalidade_contrato: Option<String>,
    pub txt_objeto_contrato: Option<String>,
    pub txt_razao_social: Option<String>,
    pub val_empenhado_liquido: f64,
    pub val_liquidado: f64,
    pub val_pago_exercicio: f64,
    pub val_total_empenhado: f64,
    /// Full upstream payload for the row
    pub raw: serde_json::Value,
}

impl Empenho {
    /// Key shared with the category from-to spreadsheet
    pub fn indexer(&self) -> String {
        format!(
            "{}.{}.{}",
            self.cod_contrato,
            self.ano_exercicio,
            self.cod_sub_elemento.as_deref().unwrap_or("")
        )
    }
}

/// Audit row of one failed upstream fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRequest {
    pub id: i64,
    pub cod_contrato: i64,
    pub ano_exercicio: i32,
    pub ano_empenho: i32,
    pub error_code: i64,
    pub created_at: String,
}

/// Canonical contract category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Categoria {
    pub id: i64,
    pub name: String,
    pub desc: Option<String>,
    pub slug: Option<String>,
}

/// Raw indexer -> canonical category row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoriaFromTo {
    pub indexer: String,
    pub categoria_name: String,
    pub categoria_desc: Option<String>,
}

/// One contract execution line, with its resolved references
#[derive(Debug, Clone, PartialEq)]
pub struct ExecucaoContrato {
    pub id: i64,
    pub cod_contrato: i64,
    pub empenho_indexer: String,
    pub year: i32,
    pub valor_empenhado: f64,
    pub valor_liquidado: f64,
    pub categoria: Option<Categoria>,
    pub modalidade: Option<String>,
    pub objeto_contrato: Option<String>,
    pub fornecedor: Option<String>,
}

/// Fields written when generating an execucao-contrato
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewExecucaoContrato {
    pub cod_contrato: i64,
    pub empenho_indexer: String,
    pub year: i32,
    pub valor_empenhado: f64,
    pub valor_liquidado: f64,
    pub modalidade_id: Option<i64>,
    pub objeto_contrato_id: Option<i64>,
    pub fornecedor_id: Option<i64>,
}

/// Filter over contract execution lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContratoQuery {
    pub year: Option<i32>,
    pub categoria_id: Option<i64>,
}

// =========================================================================
// Bookkeeping
// =========================================================================

/// One imported spreadsheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportLogEntry {
    pub id: i64,
    pub kind: String,
    pub file_name: String,
    pub file_hash: String,
    pub added: Vec<String>,
    pub not_added: Vec<String>,
    pub created_at: String,
}

/// Row counts per table
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub tables: HashMap<String, usize>,
    pub db_size_bytes: u64,
}
