//! Contract tables: raw contract list, empenho cache, failed requests,
//! categories and contract execution lines

use chrono::Utc;
use miette::{IntoDiagnostic, Result};
use rusqlite::{params, OptionalExtension, Row};

use super::{
    push_filter, Categoria, CategoriaFromTo, ContratoQuery, ContratoRaw, Empenho, ExecucaoContrato,
    FailedRequest, NewExecucaoContrato, Store,
};

const EMPENHO_COLUMNS: &str = "cod_contrato, ano_exercicio, ano_empenho, cod_empenho,
    cod_sub_elemento, cod_modalidade_contrato, txt_descricao_modalidade_contrato,
    txt_objeto_contrato, txt_razao_social, val_empenhado_liquido, val_liquidado,
    val_pago_exercicio, val_total_empenhado, raw";

fn empenho_from_row(row: &Row<'_>) -> rusqlite::Result<Empenho> {
    let raw: String = row.get(13)?;
    Ok(Empenho {
        cod_contrato: row.get(0)?,
        ano_exercicio: row.get(1)?,
        ano_empenho: row.get(2)?,
        cod_empenho: row.get(3)?,
        cod_sub_elemento: row.get(4)?,
        cod_modalidade_contrato: row.get(5)?,
        txt_descricao_modalidade_contrato: row.get(6)?,
        txt_objeto_contrato: row.get(7)?,
        txt_razao_social: row.get(8)?,
        val_empenhado_liquido: row.get(9)?,
        val_liquidado: row.get(10)?,
        val_pago_exercicio: row.get(11)?,
        val_total_empenhado: row.get(12)?,
        raw: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
    })
}

fn categoria_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Categoria>> {
    let id: Option<i64> = row.get(idx)?;
    match id {
        Some(id) => Ok(Some(Categoria {
            id,
            name: row.get(idx + 1)?,
            desc: row.get(idx + 2)?,
            slug: row.get(idx + 3)?,
        })),
        None => Ok(None),
    }
}

impl Store {
    // =====================================================================
    // Raw contract list
    // =====================================================================

    pub fn upsert_contrato_raw(&self, contrato: &ContratoRaw) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM contratos_raw WHERE cod_contrato = ?1 AND ano_exercicio = ?2",
                params![contrato.cod_contrato, contrato.ano_exercicio],
                |_| Ok(()),
            )
            .optional()
            .into_diagnostic()?
            .is_some();

        self.conn
            .execute(
                "INSERT OR REPLACE INTO contratos_raw (cod_contrato, ano_exercicio, cod_orgao,
                    cod_modalidade, txt_descricao_modalidade, txt_objeto_contrato, txt_razao_social)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    contrato.cod_contrato,
                    contrato.ano_exercicio,
                    contrato.cod_orgao,
                    contrato.cod_modalidade,
                    contrato.txt_descricao_modalidade,
                    contrato.txt_objeto_contrato,
                    contrato.txt_razao_social,
                ],
            )
            .into_diagnostic()?;
        Ok(!exists)
    }

    pub fn contratos_raw(&self) -> Result<Vec<ContratoRaw>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT cod_contrato, ano_exercicio, cod_orgao, cod_modalidade,
                    txt_descricao_modalidade, txt_objeto_contrato, txt_razao_social
                 FROM contratos_raw ORDER BY ano_exercicio, cod_contrato",
            )
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ContratoRaw {
                    cod_contrato: row.get(0)?,
                    ano_exercicio: row.get(1)?,
                    cod_orgao: row.get(2)?,
                    cod_modalidade: row.get(3)?,
                    txt_descricao_modalidade: row.get(4)?,
                    txt_objeto_contrato: row.get(5)?,
                    txt_razao_social: row.get(6)?,
                })
            })
            .into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    // =====================================================================
    // Empenho cache
    // =====================================================================

    /// Upsert an empenho by its natural key; returns true when created
    pub fn upsert_empenho(&self, empenho: &Empenho) -> Result<bool> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM empenhos
                 WHERE cod_contrato = ?1 AND ano_exercicio = ?2
                   AND ano_empenho = ?3 AND cod_empenho = ?4",
                params![
                    empenho.cod_contrato,
                    empenho.ano_exercicio,
                    empenho.ano_empenho,
                    empenho.cod_empenho
                ],
                |_| Ok(()),
            )
            .optional()
            .into_diagnostic()?
            .is_some();

        let sql = format!(
            "INSERT OR REPLACE INTO empenhos ({})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            EMPENHO_COLUMNS
        );
        self.conn
            .execute(
                &sql,
                params![
                    empenho.cod_contrato,
                    empenho.ano_exercicio,
                    empenho.ano_empenho,
                    empenho.cod_empenho,
                    empenho.cod_sub_elemento,
                    empenho.cod_modalidade_contrato,
                    empenho.txt_descricao_modalidade_contrato,
                    empenho.txt_objeto_contrato,
                    empenho.txt_razao_social,
                    empenho.val_empenhado_liquido,
                    empenho.val_liquidado,
                    empenho.val_pago_exercicio,
                    empenho.val_total_empenhado,
                    empenho.raw.to_string(),
                ],
            )
            .into_diagnostic()?;
        Ok(!exists)
    }

    /// Cached empenhos, optionally narrowed to one fiscal year
    pub fn empenhos(&self, ano_exercicio: Option<i32>) -> Result<Vec<Empenho>> {
        let mut sql = format!("SELECT {} FROM empenhos WHERE 1=1", EMPENHO_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(year) = ano_exercicio {
            push_filter(&mut sql, &mut params_vec, " AND ano_exercicio = ?", Box::new(year));
        }
        sql.push_str(" ORDER BY ano_exercicio, cod_contrato, ano_empenho, cod_empenho");

        let mut stmt = self.conn.prepare(&sql).into_diagnostic()?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), empenho_from_row)
            .into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    // =====================================================================
    // Failed upstream requests
    // =====================================================================

    /// Append an audit row; rows are never updated afterwards
    pub fn record_failed_request(
        &self,
        cod_contrato: i64,
        ano_exercicio: i32,
        ano_empenho: i32,
        error_code: i64,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO empenhos_failed_requests
                 (cod_contrato, ano_exercicio, ano_empenho, error_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    cod_contrato,
                    ano_exercicio,
                    ano_empenho,
                    error_code,
                    Utc::now().to_rfc3339()
                ],
            )
            .into_diagnostic()?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn failed_requests(&self) -> Result<Vec<FailedRequest>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, cod_contrato, ano_exercicio, ano_empenho, error_code, created_at
                 FROM empenhos_failed_requests ORDER BY id",
            )
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FailedRequest {
                    id: row.get(0)?,
                    cod_contrato: row.get(1)?,
                    ano_exercicio: row.get(2)?,
                    ano_empenho: row.get(3)?,
                    error_code: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    // =====================================================================
    // Reference rows (get-or-create)
    // =====================================================================

    pub fn get_or_create_modalidade(&self, id: i64, desc: Option<&str>) -> Result<i64> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO modalidades (id, description) VALUES (?1, ?2)",
                params![id, desc],
            )
            .into_diagnostic()?;
        Ok(id)
    }

    pub fn get_or_create_objeto_contrato(&self, desc: &str) -> Result<i64> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO objetos_contrato (description) VALUES (?1)",
                params![desc],
            )
            .into_diagnostic()?;
        self.conn
            .query_row(
                "SELECT id FROM objetos_contrato WHERE description = ?1",
                params![desc],
                |row| row.get(0),
            )
            .into_diagnostic()
    }

    pub fn get_or_create_fornecedor(&self, razao_social: &str) -> Result<i64> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO fornecedores (razao_social) VALUES (?1)",
                params![razao_social],
            )
            .into_diagnostic()?;
        self.conn
            .query_row(
                "SELECT id FROM fornecedores WHERE razao_social = ?1",
                params![razao_social],
                |row| row.get(0),
            )
            .into_diagnostic()
    }

    /// Get a category by name, creating it with `desc` and `slug` when missing
    ///
    /// An existing category keeps its description and slug.
    pub fn get_or_create_categoria(
        &self,
        name: &str,
        desc: Option<&str>,
        slug: Option<&str>,
    ) -> Result<(Categoria, bool)> {
        let created = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO categorias (name, description, slug) VALUES (?1, ?2, ?3)",
                params![name, desc, slug],
            )
            .into_diagnostic()?
            > 0;

        let categoria = self
            .conn
            .query_row(
                "SELECT id, name, description, slug FROM categorias WHERE name = ?1",
                params![name],
                |row| categoria_from_row(row, 0),
            )
            .into_diagnostic()?
            .ok_or_else(|| miette::miette!("categoria '{}' missing after insert", name))?;

        Ok((categoria, created))
    }

    pub fn categoria(&self, id: i64) -> Result<Option<Categoria>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, description, slug FROM categorias WHERE id = ?1",
                params![id],
                |row| categoria_from_row(row, 0),
            )
            .optional()
            .into_diagnostic()?
            .flatten())
    }

    /// Categories ordered by name
    pub fn categorias(&self) -> Result<Vec<Categoria>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, slug FROM categorias ORDER BY name")
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| categoria_from_row(row, 0))
            .into_diagnostic()?;
        let categorias = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()?;
        Ok(categorias.into_iter().flatten().collect())
    }

    // =====================================================================
    // Category from-to
    // =====================================================================

    pub fn upsert_categoria_fromto(&self, row: &CategoriaFromTo) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO categorias_fromto (indexer, categoria_name, categoria_desc)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(indexer) DO UPDATE SET categoria_name = excluded.categoria_name,
                    categoria_desc = excluded.categoria_desc",
                params![row.indexer, row.categoria_name, row.categoria_desc],
            )
            .into_diagnostic()?;
        Ok(())
    }

    pub fn categorias_fromto(&self) -> Result<Vec<CategoriaFromTo>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT indexer, categoria_name, categoria_desc FROM categorias_fromto
                 ORDER BY indexer",
            )
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CategoriaFromTo {
                    indexer: row.get(0)?,
                    categoria_name: row.get(1)?,
                    categoria_desc: row.get(2)?,
                })
            })
            .into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    // =====================================================================
    // Contract execution lines
    // =====================================================================

    pub fn clear_execucoes_contratos(&self) -> Result<usize> {
        self.conn
            .execute("DELETE FROM execucoes_contratos", [])
            .into_diagnostic()
    }

    pub fn insert_execucao_contrato(&self, new: &NewExecucaoContrato) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO execucoes_contratos (cod_contrato, empenho_indexer, year,
                    valor_empenhado, valor_liquidado, modalidade_id, objeto_contrato_id,
                    fornecedor_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.cod_contrato,
                    new.empenho_indexer,
                    new.year,
                    new.valor_empenhado,
                    new.valor_liquidado,
                    new.modalidade_id,
                    new.objeto_contrato_id,
                    new.fornecedor_id,
                ],
            )
            .into_diagnostic()?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Retag every line with this indexer; returns the number of lines touched
    pub fn set_categoria_by_indexer(&self, indexer: &str, categoria_id: i64) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE execucoes_contratos SET categoria_id = ?2 WHERE empenho_indexer = ?1",
                params![indexer, categoria_id],
            )
            .into_diagnostic()
    }

    pub fn execucoes_contratos(&self, query: &ContratoQuery) -> Result<Vec<ExecucaoContrato>> {
        let mut sql = String::from(
            "SELECT x.id, x.cod_contrato, x.empenho_indexer, x.year,
                    x.valor_empenhado, x.valor_liquidado,
                    c.id, c.name, c.description, c.slug,
                    m.description, o.description, f.razao_social
             FROM execucoes_contratos x
             LEFT JOIN categorias c ON c.id = x.categoria_id
             LEFT JOIN modalidades m ON m.id = x.modalidade_id
             LEFT JOIN objetos_contrato o ON o.id = x.objeto_contrato_id
             LEFT JOIN fornecedores f ON f.id = x.fornecedor_id
             WHERE 1=1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(year) = query.year {
            push_filter(&mut sql, &mut params_vec, " AND x.year = ?", Box::new(year));
        }
        if let Some(categoria_id) = query.categoria_id {
            push_filter(
                &mut sql,
                &mut params_vec,
                " AND x.categoria_id = ?",
                Box::new(categoria_id),
            );
        }
        sql.push_str(" ORDER BY x.id");

        let mut stmt = self.conn.prepare(&sql).into_diagnostic()?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(ExecucaoContrato {
                    id: row.get(0)?,
                    cod_contrato: row.get(1)?,
                    empenho_indexer: row.get(2)?,
                    year: row.get(3)?,
                    valor_empenhado: row.get(4)?,
                    valor_liquidado: row.get(5)?,
                    categoria: categoria_from_row(row, 6)?,
                    modalidade: row.get(10)?,
                    objeto_contrato: row.get(11)?,
                    fornecedor: row.get(12)?,
                })
            })
            .into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    /// Years with contract execution lines, newest first
    pub fn contrato_years(&self) -> Result<Vec<i32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT year FROM execucoes_contratos ORDER BY year DESC")
            .into_diagnostic()?;
        let rows = stmt.query_map([], |row| row.get(0)).into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }
}
