//! Budget taxonomy tables, execucao lines, fontes and deflators

use std::collections::BTreeMap;

use miette::{IntoDiagnostic, Result};
use rusqlite::{params, OptionalExtension, Row};

use super::{push_filter, Execucao, ExecucaoQuery, NewExecucao, Node, Store, Taxonomy};

const EXECUCAO_SELECT: &str = r#"
    SELECT x.id, x.year, x.orgao_id,
           g.id, g.description,
           sg.id, sg.description,
           el.id, el.description,
           se.id, se.description,
           sf.id, sf.description,
           pg.id, pg.description,
           pj.id, pj.description,
           fg.id, fg.description,
           x.is_minimo_legal, x.orcado_atualizado, x.empenhado_liquido
    FROM execucoes x
    LEFT JOIN subgrupos sg ON sg.id = x.subgrupo_id
    LEFT JOIN grupos g ON g.id = sg.grupo_id
    LEFT JOIN elementos el ON el.id = x.elemento_id
    LEFT JOIN subelementos se ON se.id = x.subelemento_id
    LEFT JOIN subfuncoes sf ON sf.id = x.subfuncao_id
    LEFT JOIN programas pg ON pg.id = x.programa_id
    LEFT JOIN projetos pj ON pj.id = x.projeto_id
    LEFT JOIN fonte_grupos fg ON fg.id = x.fonte_grupo_id
    WHERE 1=1"#;

fn node_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Node>> {
    let id: Option<i64> = row.get(idx)?;
    let desc: Option<String> = row.get(idx + 1)?;
    Ok(id.map(|id| Node {
        id,
        desc: desc.unwrap_or_default(),
    }))
}

fn execucao_from_row(row: &Row<'_>) -> rusqlite::Result<Execucao> {
    Ok(Execucao {
        id: row.get(0)?,
        year: row.get(1)?,
        orgao_id: row.get(2)?,
        grupo: node_at(row, 3)?,
        subgrupo: node_at(row, 5)?,
        elemento: node_at(row, 7)?,
        subelemento: node_at(row, 9)?,
        subfuncao: node_at(row, 11)?,
        programa: node_at(row, 13)?,
        projeto: node_at(row, 15)?,
        fonte_grupo: node_at(row, 17)?,
        is_minimo_legal: row.get::<_, i64>(19)? != 0,
        orcado_atualizado: row.get(20)?,
        empenhado_liquido: row.get(21)?,
    })
}

impl Store {
    /// Get or create a taxonomy node; an existing description is refreshed
    pub fn upsert_node(&self, taxonomy: Taxonomy, node: &Node) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, description) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET description = excluded.description",
            taxonomy.table()
        );
        self.conn
            .execute(&sql, params![node.id, node.desc])
            .into_diagnostic()?;
        Ok(())
    }

    /// Get or create a subgrupo under its grupo
    pub fn upsert_subgrupo(&self, node: &Node, grupo_id: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO subgrupos (id, grupo_id, description) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET grupo_id = excluded.grupo_id,
                    description = excluded.description",
                params![node.id, grupo_id, node.desc],
            )
            .into_diagnostic()?;
        Ok(())
    }

    pub fn node(&self, taxonomy: Taxonomy, id: i64) -> Result<Option<Node>> {
        let sql = format!("SELECT id, description FROM {} WHERE id = ?1", taxonomy.table());
        self.conn
            .query_row(&sql, params![id], |row| {
                Ok(Node {
                    id: row.get(0)?,
                    desc: row.get(1)?,
                })
            })
            .optional()
            .into_diagnostic()
    }

    /// All nodes of a taxonomy table ordered by id
    pub fn nodes(&self, taxonomy: Taxonomy) -> Result<Vec<Node>> {
        let sql = format!("SELECT id, description FROM {} ORDER BY id", taxonomy.table());
        let mut stmt = self.conn.prepare(&sql).into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Node {
                    id: row.get(0)?,
                    desc: row.get(1)?,
                })
            })
            .into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    /// Insert one execucao line, get-or-creating every referenced node
    pub fn insert_execucao(&self, new: &NewExecucao) -> Result<i64> {
        if let (Some(grupo), Some(subgrupo)) = (&new.grupo, &new.subgrupo) {
            self.upsert_node(Taxonomy::Grupo, grupo)?;
            self.upsert_subgrupo(subgrupo, grupo.id)?;
        }
        let refs = [
            (Taxonomy::Elemento, &new.elemento),
            (Taxonomy::Subelemento, &new.subelemento),
            (Taxonomy::Subfuncao, &new.subfuncao),
            (Taxonomy::Programa, &new.programa),
            (Taxonomy::Projeto, &new.projeto),
            (Taxonomy::FonteGrupo, &new.fonte_grupo),
        ];
        for (taxonomy, node) in refs {
            if let Some(node) = node {
                self.upsert_node(taxonomy, node)?;
            }
        }

        let subgrupo_id = new.grupo.as_ref().and(new.subgrupo.as_ref()).map(|n| n.id);
        self.conn
            .execute(
                "INSERT INTO execucoes (year, orgao_id, subgrupo_id, elemento_id, subelemento_id,
                    subfuncao_id, programa_id, projeto_id, fonte_grupo_id, is_minimo_legal,
                    orcado_atualizado, empenhado_liquido)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    new.year,
                    new.orgao_id,
                    subgrupo_id,
                    new.elemento.as_ref().map(|n| n.id),
                    new.subelemento.as_ref().map(|n| n.id),
                    new.subfuncao.as_ref().map(|n| n.id),
                    new.programa.as_ref().map(|n| n.id),
                    new.projeto.as_ref().map(|n| n.id),
                    new.fonte_grupo.as_ref().map(|n| n.id),
                    new.is_minimo_legal as i64,
                    new.orcado_atualizado,
                    new.empenhado_liquido,
                ],
            )
            .into_diagnostic()?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Delete the execucao lines of one year
    pub fn clear_execucoes(&self, year: i32) -> Result<usize> {
        self.conn
            .execute("DELETE FROM execucoes WHERE year = ?1", params![year])
            .into_diagnostic()
    }

    /// Resolve an execucao query into rows
    pub fn execucoes(&self, query: &ExecucaoQuery) -> Result<Vec<Execucao>> {
        let mut sql = EXECUCAO_SELECT.to_string();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(year) = query.year {
            push_filter(&mut sql, &mut params_vec, " AND x.year = ?", Box::new(year));
        }
        if let Some(id) = query.grupo_id {
            push_filter(&mut sql, &mut params_vec, " AND sg.grupo_id = ?", Box::new(id));
        }
        if let Some(id) = query.subgrupo_id {
            push_filter(&mut sql, &mut params_vec, " AND x.subgrupo_id = ?", Box::new(id));
        }
        if let Some(id) = query.elemento_id {
            push_filter(&mut sql, &mut params_vec, " AND x.elemento_id = ?", Box::new(id));
        }
        if let Some(id) = query.subfuncao_id {
            push_filter(&mut sql, &mut params_vec, " AND x.subfuncao_id = ?", Box::new(id));
        }
        if let Some(id) = query.programa_id {
            push_filter(&mut sql, &mut params_vec, " AND x.programa_id = ?", Box::new(id));
        }
        if let Some(id) = query.fonte_grupo_id {
            push_filter(&mut sql, &mut params_vec, " AND x.fonte_grupo_id = ?", Box::new(id));
        }
        if let Some(id) = query.orgao_id {
            push_filter(&mut sql, &mut params_vec, " AND x.orgao_id = ?", Box::new(id));
        }
        if let Some(minimo_legal) = query.minimo_legal {
            push_filter(
                &mut sql,
                &mut params_vec,
                " AND x.is_minimo_legal = ?",
                Box::new(minimo_legal as i64),
            );
        }
        if query.with_subgrupo {
            sql.push_str(" AND x.subgrupo_id IS NOT NULL");
        }
        sql.push_str(" ORDER BY x.year, x.id");

        let mut stmt = self.conn.prepare(&sql).into_diagnostic()?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), execucao_from_row)
            .into_diagnostic()?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    /// Years with execucao lines, newest first
    pub fn execucao_years(&self) -> Result<Vec<i32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT year FROM execucoes ORDER BY year DESC")
            .into_diagnostic()?;
        let rows = stmt.query_map([], |row| row.get(0)).into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    // =====================================================================
    // Fontes de recurso
    // =====================================================================

    /// Map a raw fonte code onto its group; the group node is get-or-created
    pub fn upsert_fonte_fromto(&self, code: i64, name: &str, group: &Node) -> Result<()> {
        self.upsert_node(Taxonomy::FonteGrupo, group)?;
        self.conn
            .execute(
                "INSERT INTO fontes_fromto (code, name, group_code, group_name)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(code) DO UPDATE SET name = excluded.name,
                    group_code = excluded.group_code, group_name = excluded.group_name",
                params![code, name, group.id, group.desc],
            )
            .into_diagnostic()?;
        Ok(())
    }

    /// Group of a raw fonte code, if mapped
    pub fn fonte_grupo_for(&self, code: i64) -> Result<Option<Node>> {
        self.conn
            .query_row(
                "SELECT group_code, group_name FROM fontes_fromto WHERE code = ?1",
                params![code],
                |row| {
                    Ok(Node {
                        id: row.get(0)?,
                        desc: row.get(1)?,
                    })
                },
            )
            .optional()
            .into_diagnostic()
    }

    // =====================================================================
    // Deflators
    // =====================================================================

    pub fn upsert_deflator(&self, year: i32, index: f64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO deflators (year, idx) VALUES (?1, ?2)
                 ON CONFLICT(year) DO UPDATE SET idx = excluded.idx",
                params![year, index],
            )
            .into_diagnostic()?;
        Ok(())
    }

    /// Price index per year
    pub fn deflators(&self) -> Result<BTreeMap<i32, f64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT year, idx FROM deflators ORDER BY year")
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i32>(0)?, row.get::<_, f64>(1)?)))
            .into_diagnostic()?;
        rows.collect::<std::result::Result<BTreeMap<_, _>, _>>()
            .into_diagnostic()
    }
}
