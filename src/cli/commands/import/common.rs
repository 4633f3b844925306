//! Common utilities for CSV import

use console::style;
use csv::{ReaderBuilder, StringRecord};
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::core::store::{Store, META_CONTRATOS, META_MOSAICO, META_REGIONALIZACAO};

/// Spreadsheet kinds accepted by `orc import`
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// School records of one year (registry columns plus optional budget)
    Escolas,
    /// School types with their etapa label
    TiposEscola,
    /// Canonical zona of each distrito
    DistritoZona,
    /// Per-school budget breakdown (grupo, subgrupo, valor)
    Recursos,
    /// Budget execution lines; replaces the years present in the file
    Execucoes,
    /// Fonte de recurso code -> group from-to table
    Fontes,
    /// Yearly price index
    Deflatores,
    /// Contracts to sync from SOF
    Contratos,
    /// Empenho indexer -> contract category from-to table
    CategoriasFromto,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Escolas => "escolas",
            ImportKind::TiposEscola => "tipos-escola",
            ImportKind::DistritoZona => "distrito-zona",
            ImportKind::Recursos => "recursos",
            ImportKind::Execucoes => "execucoes",
            ImportKind::Fontes => "fontes",
            ImportKind::Deflatores => "deflatores",
            ImportKind::Contratos => "contratos",
            ImportKind::CategoriasFromto => "categorias-fromto",
        }
    }

    /// `last_updated` key of the report family fed by this kind
    pub fn meta_key(&self) -> &'static str {
        match self {
            ImportKind::Escolas
            | ImportKind::TiposEscola
            | ImportKind::DistritoZona
            | ImportKind::Recursos => META_REGIONALIZACAO,
            ImportKind::Execucoes | ImportKind::Fontes | ImportKind::Deflatores => META_MOSAICO,
            ImportKind::Contratos | ImportKind::CategoriasFromto => META_CONTRATOS,
        }
    }
}

/// Import options passed to the kind-specific import functions
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportArgs {
    pub dry_run: bool,
    pub skip_errors: bool,
    /// Import even when the same file was already imported
    pub force: bool,
}

/// Import statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub rows_processed: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: usize,
    /// Keys written
    pub added: Vec<String>,
    /// Keys rejected or without a target record
    pub not_added: Vec<String>,
    /// The file hash was already in the import log
    pub already_imported: bool,
}

impl ImportStats {
    pub fn record(&mut self, key: String, outcome: Outcome) {
        match outcome {
            Outcome::Created => {
                self.created += 1;
                self.added.push(key);
            }
            Outcome::Updated => {
                self.updated += 1;
                self.added.push(key);
            }
            Outcome::NotFound => self.not_added.push(key),
        }
    }
}

/// Result of writing one parsed row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    /// The row points at a record that does not exist
    NotFound,
}

impl Outcome {
    pub fn created(created: bool) -> Self {
        if created {
            Outcome::Created
        } else {
            Outcome::Updated
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ImportError {
    #[error("row {row}: CSV parse error: {message}")]
    Parse { row: usize, message: String },

    #[error("row {row}: missing required field '{field}'")]
    Missing { row: usize, field: &'static str },

    #[error("row {row}: invalid {field} '{value}'")]
    Invalid {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("row {row}: negative {field} '{value}'")]
    Negative {
        row: usize,
        field: &'static str,
        value: String,
    },
}

/// Build a map from header name to column index
pub fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect()
}

/// One data row and the header map used to read it
pub struct CsvRow<'a> {
    /// 1-based line number in the file (the header is line 1)
    pub number: usize,
    record: &'a StringRecord,
    headers: &'a HashMap<String, usize>,
}

impl<'a> CsvRow<'a> {
    /// Trimmed field value; empty cells are `None`
    pub fn text(&self, field: &str) -> Option<String> {
        self.headers
            .get(field)
            .and_then(|&idx| self.record.get(idx))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn required(&self, field: &'static str) -> Result<String, ImportError> {
        self.text(field).ok_or(ImportError::Missing {
            row: self.number,
            field,
        })
    }

    pub fn int<T: FromStr>(&self, field: &'static str) -> Result<Option<T>, ImportError> {
        self.text(field)
            .map(|value| {
                value.parse().map_err(|_| ImportError::Invalid {
                    row: self.number,
                    field,
                    value,
                })
            })
            .transpose()
    }

    pub fn required_int<T: FromStr>(&self, field: &'static str) -> Result<T, ImportError> {
        self.int(field)?.ok_or(ImportError::Missing {
            row: self.number,
            field,
        })
    }

    /// Decimal number; a lone comma is read as the decimal separator
    pub fn number(&self, field: &'static str) -> Result<Option<f64>, ImportError> {
        self.text(field)
            .map(|value| {
                let normalized = if value.contains('.') {
                    value.replace(',', "")
                } else {
                    value.replace(',', ".")
                };
                normalized.parse().map_err(|_| ImportError::Invalid {
                    row: self.number,
                    field,
                    value,
                })
            })
            .transpose()
    }

    /// Monetary amount; negative values are rejected
    pub fn amount(&self, field: &'static str) -> Result<Option<f64>, ImportError> {
        match self.number(field)? {
            Some(value) if value < 0.0 => Err(ImportError::Negative {
                row: self.number,
                field,
                value: value.to_string(),
            }),
            other => Ok(other),
        }
    }

    /// `true`, `1`, `sim`, `s`, `yes`, `x` (any case) are true
    pub fn flag(&self, field: &str) -> bool {
        self.text(field)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "sim" | "s" | "yes" | "x"))
            .unwrap_or(false)
    }
}

fn report_error(error: &ImportError, stats: &mut ImportStats, args: &ImportArgs) -> Result<()> {
    eprintln!("{} {}", style("✗").red(), error);
    tracing::warn!(%error, "import row rejected");
    stats.errors += 1;
    let row = match error {
        ImportError::Parse { row, .. }
        | ImportError::Missing { row, .. }
        | ImportError::Invalid { row, .. }
        | ImportError::Negative { row, .. } => *row,
    };
    stats.not_added.push(format!("row {}", row));
    if args.skip_errors {
        Ok(())
    } else {
        Err(miette::miette!("{}", error))
    }
}

/// Parse every row of `content`, collecting rejected rows into the stats
///
/// Without `skip_errors` the first rejected row aborts the import.
pub fn parse_rows<T>(
    content: &[u8],
    args: &ImportArgs,
    parse: impl Fn(&CsvRow) -> Result<T, ImportError>,
) -> Result<(Vec<T>, ImportStats)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers = rdr.headers().into_diagnostic()?.clone();
    let header_map = build_header_map(&headers);

    let mut stats = ImportStats::default();
    let mut rows = Vec::new();
    for (row_idx, result) in rdr.records().enumerate() {
        let number = row_idx + 2;
        stats.rows_processed += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let error = ImportError::Parse {
                    row: number,
                    message: e.to_string(),
                };
                report_error(&error, &mut stats, args)?;
                continue;
            }
        };

        let row = CsvRow {
            number,
            record: &record,
            headers: &header_map,
        };
        match parse(&row) {
            Ok(parsed) => rows.push(parsed),
            Err(error) => report_error(&error, &mut stats, args)?,
        }
    }
    Ok((rows, stats))
}

/// Parse then write row by row inside one transaction
///
/// `write` returns the row key and what happened to it. A dry run stops
/// after parsing.
pub fn import_rows<T>(
    store: &Store,
    content: &[u8],
    args: &ImportArgs,
    parse: impl Fn(&CsvRow) -> Result<T, ImportError>,
    write: impl Fn(&Store, &T) -> Result<(String, Outcome)>,
) -> Result<ImportStats> {
    let (rows, mut stats) = parse_rows(content, args, parse)?;
    if args.dry_run {
        return Ok(stats);
    }
    store.transaction(|store| {
        for row in &rows {
            let (key, outcome) = write(store, row)?;
            stats.record(key, outcome);
        }
        Ok(())
    })?;
    Ok(stats)
}

/// Get CSV headers for an import kind
pub fn get_csv_headers(kind: ImportKind) -> Vec<&'static str> {
    match kind {
        ImportKind::Escolas => vec![
            "year",
            "codesc",
            "nomesc",
            "tipoesc",
            "dre",
            "diretoria",
            "coddist",
            "distrito",
            "endereco",
            "numero",
            "bairro",
            "cep",
            "rede",
            "latitude",
            "longitude",
            "total_vagas",
            "budget_total",
        ],
        ImportKind::TiposEscola => vec!["code", "desc", "etapa"],
        ImportKind::DistritoZona => vec!["coddist", "distrito", "zona"],
        ImportKind::Recursos => vec!["year", "codesc", "grupo", "subgrupo", "valor"],
        ImportKind::Execucoes => vec![
            "year",
            "orgao_id",
            "grupo_id",
            "grupo_desc",
            "subgrupo_id",
            "subgrupo_desc",
            "elemento_id",
            "elemento_desc",
            "subelemento_id",
            "subelemento_desc",
            "subfuncao_id",
            "subfuncao_desc",
            "programa_id",
            "programa_desc",
            "projeto_id",
            "projeto_desc",
            "fonte_id",
            "fonte_grupo_id",
            "fonte_grupo_desc",
            "minimo_legal",
            "orcado_atualizado",
            "empenhado_liquido",
        ],
        ImportKind::Fontes => vec!["code", "name", "group_code", "group_name"],
        ImportKind::Deflatores => vec!["year", "index"],
        ImportKind::Contratos => vec![
            "cod_contrato",
            "ano_exercicio",
            "cod_orgao",
            "cod_modalidade",
            "modalidade",
            "objeto",
            "razao_social",
        ],
        ImportKind::CategoriasFromto => vec!["indexer", "categoria_name", "categoria_desc"],
    }
}

/// Get example CSV row for an import kind
pub fn get_csv_example(kind: ImportKind) -> Vec<&'static str> {
    match kind {
        ImportKind::Escolas => vec![
            "2019",
            "000191",
            "ALIPIO CORREA NETO PROF",
            "EMEF",
            "BT",
            "DIRETORIA REGIONAL DE EDUCACAO BUTANTA",
            "94",
            "VILA SONIA",
            "Avenida JOAO CAIAFFA",
            "140",
            "JARDIM TABOAO",
            "05742100",
            "DIR",
            "-23.612237",
            "-46.749888",
            "502",
            "",
        ],
        ImportKind::TiposEscola => vec![
            "EMEF",
            "Escola Municipal de Ensino Fundamental",
            "Ensino Fundamental",
        ],
        ImportKind::DistritoZona => vec!["94", "VILA SONIA", "Oeste"],
        ImportKind::Recursos => vec!["2019", "000191", "PTRF", "Custeio", "12500.00"],
        ImportKind::Execucoes => vec![
            "2019", "16", "1", "Pessoal", "11", "Ativos", "31", "Vencimentos", "1", "Salarios",
            "361", "Ensino Fundamental", "3010", "Manutencao", "2830", "Salarios da rede", "00",
            "1", "Tesouro Municipal", "true", "1000000.00", "950000.00",
        ],
        ImportKind::Fontes => vec!["0", "Tesouro Municipal", "1", "Tesouro Municipal"],
        ImportKind::Deflatores => vec!["2019", "5291.41"],
        ImportKind::Contratos => vec![
            "8742",
            "2018",
            "16",
            "5",
            "Pregao",
            "Fornecimento de alimentacao escolar",
            "EMPRESA EXEMPLO LTDA",
        ],
        ImportKind::CategoriasFromto => {
            vec!["8742.2018.33903007", "Alimentação", "Gêneros alimentícios"]
        }
    }
}

/// CSV template text for an import kind: header line and one example row
pub fn generate_template(kind: ImportKind) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(get_csv_headers(kind)).into_diagnostic()?;
    writer.write_record(get_csv_example(kind)).into_diagnostic()?;
    let bytes = writer.into_inner().into_diagnostic()?;
    String::from_utf8(bytes).into_diagnostic()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one<T>(
        csv: &str,
        parse: impl Fn(&CsvRow) -> Result<T, ImportError>,
    ) -> Result<T, ImportError> {
        let mut rdr = ReaderBuilder::new().from_reader(csv.as_bytes());
        let headers = build_header_map(&rdr.headers().unwrap().clone());
        let record = rdr.records().next().unwrap().unwrap();
        let row = CsvRow {
            number: 2,
            record: &record,
            headers: &headers,
        };
        parse(&row)
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let value =
            parse_one("  CodEsc ,Valor\n000191,10\n", |row| row.required("codesc")).unwrap();
        assert_eq!(value, "000191");
    }

    #[test]
    fn test_amount_parsing() {
        let amount = |csv: &str| parse_one(csv, |row| row.amount("valor"));
        assert_eq!(amount("valor\n\"1234,5\"\n"), Ok(Some(1234.5)));
        assert_eq!(amount("valor\n\"1,234.50\"\n"), Ok(Some(1234.5)));
        assert_eq!(amount("valor,x\n,1\n"), Ok(None));
        assert!(matches!(amount("valor\n-3\n"), Err(ImportError::Negative { row: 2, .. })));
        assert!(matches!(amount("valor\nabc\n"), Err(ImportError::Invalid { .. })));
    }

    #[test]
    fn test_parse_rows_skip_errors() {
        let csv = "year,index\n2018,1.0\nbad,2.0\n2019,3.0\n";
        fn parse(row: &CsvRow) -> Result<i32, ImportError> {
            row.required_int("year")
        }

        let strict = ImportArgs::default();
        assert!(parse_rows(csv.as_bytes(), &strict, parse).is_err());

        let lenient = ImportArgs {
            skip_errors: true,
            ..Default::default()
        };
        let (rows, stats) = parse_rows(csv.as_bytes(), &lenient, parse).unwrap();
        assert_eq!(rows, vec![2018, 2019]);
        assert_eq!(stats.rows_processed, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.not_added, vec!["row 3".to_string()]);
    }

    #[test]
    fn test_templates_match_headers() {
        for kind in [
            ImportKind::Escolas,
            ImportKind::Execucoes,
            ImportKind::Contratos,
            ImportKind::CategoriasFromto,
        ] {
            assert_eq!(get_csv_headers(kind).len(), get_csv_example(kind).len());
            assert!(generate_template(kind)
                .unwrap()
                .starts_with(get_csv_headers(kind)[0]));
        }
    }
}
