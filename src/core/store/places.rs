//! Geography tables: dres, distritos, school types and school-year records

use miette::{IntoDiagnostic, Result};
use rusqlite::{params, OptionalExtension, Row};

use super::{
    push_filter, Distrito, Dre, EscolaInfo, NewEscolaInfo, PlaceQuery, Recurso, Store, TipoEscola,
};

const ESCOLA_INFO_SELECT: &str = r#"
    SELECT i.id, i.year, i.codesc, i.nomesc,
           d.code, d.name,
           t.coddist, t.name, t.zona,
           e.code, e.description, e.etapa,
           i.endereco, i.numero, i.bairro, i.cep, i.rede,
           i.latitude, i.longitude, i.total_vagas, i.budget_total, i.recursos
    FROM escola_info i
    JOIN dres d ON d.code = i.dre_code
    JOIN distritos t ON t.coddist = i.coddist
    JOIN tipos_escola e ON e.code = i.tipoesc
    WHERE 1=1"#;

fn escola_info_from_row(row: &Row<'_>) -> rusqlite::Result<EscolaInfo> {
    let recursos: Option<String> = row.get(21)?;
    Ok(EscolaInfo {
        id: row.get(0)?,
        year: row.get(1)?,
        codesc: row.get(2)?,
        nomesc: row.get(3)?,
        dre: Dre {
            code: row.get(4)?,
            name: row.get(5)?,
        },
        distrito: Distrito {
            coddist: row.get(6)?,
            name: row.get(7)?,
            zona: row.get(8)?,
        },
        tipoesc: TipoEscola {
            code: row.get(9)?,
            desc: row.get(10)?,
            etapa: row.get(11)?,
        },
        endereco: row.get(12)?,
        numero: row.get(13)?,
        bairro: row.get(14)?,
        cep: row.get(15)?,
        rede: row.get(16)?,
        latitude: row.get(17)?,
        longitude: row.get(18)?,
        total_vagas: row.get(19)?,
        budget_total: row.get(20)?,
        recursos: recursos
            .and_then(|r| serde_json::from_str(&r).ok())
            .unwrap_or_default(),
    })
}

impl Store {
    // =====================================================================
    // Reference tables
    // =====================================================================

    /// Create or rename a dre; returns true when it was created
    pub fn upsert_dre(&self, code: &str, name: &str) -> Result<bool> {
        let existing: Option<String> = self
            .conn
            .query_row("SELECT name FROM dres WHERE code = ?1", params![code], |row| {
                row.get(0)
            })
            .optional()
            .into_diagnostic()?;

        match existing {
            Some(_) => {
                self.conn
                    .execute("UPDATE dres SET name = ?2 WHERE code = ?1", params![code, name])
                    .into_diagnostic()?;
                Ok(false)
            }
            None => {
                self.conn
                    .execute("INSERT INTO dres (code, name) VALUES (?1, ?2)", params![code, name])
                    .into_diagnostic()?;
                Ok(true)
            }
        }
    }

    pub fn dre(&self, code: &str) -> Result<Option<Dre>> {
        self.conn
            .query_row(
                "SELECT code, name FROM dres WHERE code = ?1",
                params![code],
                |row| {
                    Ok(Dre {
                        code: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .into_diagnostic()
    }

    /// Create a school type unless the code already exists; returns true when created
    pub fn create_tipo_escola(&self, code: &str, desc: Option<&str>) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO tipos_escola (code, description) VALUES (?1, ?2)",
                params![code, desc],
            )
            .into_diagnostic()?;
        Ok(changed > 0)
    }

    /// Create or overwrite a school type with its etapa
    pub fn upsert_tipo_escola(
        &self,
        code: &str,
        desc: Option<&str>,
        etapa: Option<&str>,
    ) -> Result<bool> {
        let created = self.create_tipo_escola(code, desc)?;
        self.conn
            .execute(
                "UPDATE tipos_escola SET description = COALESCE(?2, description), etapa = ?3
                 WHERE code = ?1",
                params![code, desc, etapa],
            )
            .into_diagnostic()?;
        Ok(created)
    }

    pub fn tipo_escola(&self, code: &str) -> Result<Option<TipoEscola>> {
        self.conn
            .query_row(
                "SELECT code, description, etapa FROM tipos_escola WHERE code = ?1",
                params![code],
                |row| {
                    Ok(TipoEscola {
                        code: row.get(0)?,
                        desc: row.get(1)?,
                        etapa: row.get(2)?,
                    })
                },
            )
            .optional()
            .into_diagnostic()
    }

    /// Get or create a distrito by code; an existing name is left alone
    pub fn get_or_create_distrito(&self, coddist: i64, name: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO distritos (coddist, name) VALUES (?1, ?2)",
                params![coddist, name],
            )
            .into_diagnostic()?;
        Ok(changed > 0)
    }

    /// Assign the canonical zona of a distrito (created if missing)
    pub fn set_distrito_zona(&self, coddist: i64, name: &str, zona: &str) -> Result<bool> {
        let created = self.get_or_create_distrito(coddist, name)?;
        self.conn
            .execute(
                "UPDATE distritos SET zona = ?2 WHERE coddist = ?1",
                params![coddist, zona],
            )
            .into_diagnostic()?;
        Ok(created)
    }

    pub fn distrito(&self, coddist: i64) -> Result<Option<Distrito>> {
        self.conn
            .query_row(
                "SELECT coddist, name, zona FROM distritos WHERE coddist = ?1",
                params![coddist],
                |row| {
                    Ok(Distrito {
                        coddist: row.get(0)?,
                        name: row.get(1)?,
                        zona: row.get(2)?,
                    })
                },
            )
            .optional()
            .into_diagnostic()
    }

    // =====================================================================
    // School-year records
    // =====================================================================

    /// Insert or update the (year, codesc) record; returns true when created
    ///
    /// The budget columns are only overwritten when the new value is present,
    /// so a registry sync never erases imported budgets.
    pub fn upsert_escola_info(&self, info: &NewEscolaInfo) -> Result<bool> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO escolas (codesc) VALUES (?1)",
                params![info.codesc],
            )
            .into_diagnostic()?;

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM escola_info WHERE year = ?1 AND codesc = ?2",
                params![info.year, info.codesc],
                |row| row.get(0),
            )
            .optional()
            .into_diagnostic()?;

        match existing {
            Some(id) => {
                self.conn
                    .execute(
                        "UPDATE escola_info SET dre_code = ?2, coddist = ?3, tipoesc = ?4,
                            nomesc = ?5, endereco = ?6, numero = ?7, bairro = ?8, cep = ?9,
                            rede = ?10,
                            latitude = ?11, longitude = ?12, total_vagas = ?13,
                            budget_total = COALESCE(?14, budget_total)
                         WHERE id = ?1",
                        params![
                            id,
                            info.dre_code,
                            info.coddist,
                            info.tipoesc,
                            info.nomesc,
                            info.endereco,
                            info.numero,
                            info.bairro,
                            info.cep,
                            info.rede,
                            info.latitude,
                            info.longitude,
                            info.total_vagas,
                            info.budget_total,
                        ],
                    )
                    .into_diagnostic()?;
                Ok(false)
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO escola_info (year, codesc, dre_code, coddist, tipoesc, nomesc,
                            endereco, numero, bairro, cep, rede, latitude, longitude,
                            total_vagas, budget_total)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                        params![
                            info.year,
                            info.codesc,
                            info.dre_code,
                            info.coddist,
                            info.tipoesc,
                            info.nomesc,
                            info.endereco,
                            info.numero,
                            info.bairro,
                            info.cep,
                            info.rede,
                            info.latitude,
                            info.longitude,
                            info.total_vagas,
                            info.budget_total,
                        ],
                    )
                    .into_diagnostic()?;
                Ok(true)
            }
        }
    }

    /// Replace the budget breakdown of one record; its total becomes the sum
    ///
    /// Returns false when no record exists for (year, codesc).
    pub fn set_escola_recursos(
        &self,
        year: i32,
        codesc: &str,
        recursos: &[Recurso],
    ) -> Result<bool> {
        let total: f64 = recursos.iter().map(|r| r.valor).sum();
        let changed = self
            .conn
            .execute(
                "UPDATE escola_info SET recursos = ?3, budget_total = ?4
                 WHERE year = ?1 AND codesc = ?2",
                params![
                    year,
                    codesc,
                    serde_json::to_string(recursos).into_diagnostic()?,
                    total
                ],
            )
            .into_diagnostic()?;
        Ok(changed > 0)
    }

    /// Resolve a place query into records, ordered by school code
    pub fn escola_infos(&self, query: &PlaceQuery) -> Result<Vec<EscolaInfo>> {
        let mut sql = ESCOLA_INFO_SELECT.to_string();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref zona) = query.zona {
            push_filter(&mut sql, &mut params_vec, " AND t.zona = ?", Box::new(zona.clone()));
        }
        if let Some(ref dre) = query.dre {
            push_filter(&mut sql, &mut params_vec, " AND i.dre_code = ?", Box::new(dre.clone()));
        }
        if let Some(distrito) = query.distrito {
            push_filter(&mut sql, &mut params_vec, " AND i.coddist = ?", Box::new(distrito));
        }
        if let Some(ref escola) = query.escola {
            push_filter(&mut sql, &mut params_vec, " AND i.codesc = ?", Box::new(escola.clone()));
        }
        if let Some(year) = query.year {
            push_filter(&mut sql, &mut params_vec, " AND i.year = ?", Box::new(year));
        }
        if let Some(ref rede) = query.rede {
            push_filter(&mut sql, &mut params_vec, " AND i.rede = ?", Box::new(rede.clone()));
        }
        if query.with_etapa {
            sql.push_str(" AND e.etapa IS NOT NULL");
        }
        sql.push_str(" ORDER BY i.year, i.codesc");

        let mut stmt = self.conn.prepare(&sql).into_diagnostic()?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), escola_info_from_row)
            .into_diagnostic()?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    /// Network of the stored (year, codesc) record, if any
    pub fn escola_rede(&self, year: i32, codesc: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT rede FROM escola_info WHERE year = ?1 AND codesc = ?2",
                params![year, codesc],
                |row| row.get(0),
            )
            .optional()
            .into_diagnostic()
    }

    /// Years with school records, newest first
    pub fn place_years(&self) -> Result<Vec<i32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT year FROM escola_info ORDER BY year DESC")
            .into_diagnostic()?;
        let rows = stmt.query_map([], |row| row.get(0)).into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }
}
