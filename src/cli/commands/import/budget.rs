//! Import of the mosaico spreadsheets

use miette::Result;
use std::collections::BTreeSet;

use crate::core::store::{NewExecucao, Node, Store};

use super::common::{import_rows, parse_rows, CsvRow, ImportArgs, ImportError, ImportStats, Outcome};

/// Node from an `<dim>_id` / `<dim>_desc` column pair; absent without an id
fn node(row: &CsvRow, id: &'static str, desc: &'static str) -> Result<Option<Node>, ImportError> {
    Ok(row.int::<i64>(id)?.map(|id| Node {
        id,
        desc: row.text(desc).unwrap_or_default(),
    }))
}

struct ExecucaoRow {
    new: NewExecucao,
    /// Raw fonte code, resolved through the from-to table when no group is given
    fonte_code: Option<i64>,
}

fn parse_execucao(row: &CsvRow) -> Result<ExecucaoRow, ImportError> {
    let new = NewExecucao {
        year: row.required_int("year")?,
        orgao_id: row.required_int("orgao_id")?,
        grupo: node(row, "grupo_id", "grupo_desc")?,
        subgrupo: node(row, "subgrupo_id", "subgrupo_desc")?,
        elemento: node(row, "elemento_id", "elemento_desc")?,
        subelemento: node(row, "subelemento_id", "subelemento_desc")?,
        subfuncao: node(row, "subfuncao_id", "subfuncao_desc")?,
        programa: node(row, "programa_id", "programa_desc")?,
        projeto: node(row, "projeto_id", "projeto_desc")?,
        fonte_grupo: node(row, "fonte_grupo_id", "fonte_grupo_desc")?,
        is_minimo_legal: row.flag("minimo_legal"),
        orcado_atualizado: row.amount("orcado_atualizado")?,
        empenhado_liquido: row.amount("empenhado_liquido")?,
    };
    Ok(ExecucaoRow {
        new,
        fonte_code: row.int("fonte_id")?,
    })
}

/// Execution lines; every year present in the file is replaced as a whole
pub fn import_execucoes(store: &Store, content: &[u8], args: &ImportArgs) -> Result<ImportStats> {
    let (rows, mut stats) = parse_rows(content, args, parse_execucao)?;
    if args.dry_run {
        return Ok(stats);
    }

    let years: BTreeSet<i32> = rows.iter().map(|r| r.new.year).collect();
    store.transaction(|store| {
        for year in &years {
            let removed = store.clear_execucoes(*year)?;
            tracing::info!(year, removed, "replacing execucoes");
        }
        for row in rows {
            let mut new = row.new;
            if new.fonte_grupo.is_none() {
                if let Some(code) = row.fonte_code {
                    new.fonte_grupo = store.fonte_grupo_for(code)?;
                    if new.fonte_grupo.is_none() {
                        tracing::warn!(code, "fonte code missing from the from-to table");
                    }
                }
            }
            let id = store.insert_execucao(&new)?;
            stats.record(format!("{}#{}", new.year, id), Outcome::Created);
        }
        Ok(())
    })?;
    Ok(stats)
}

pub fn import_fontes(store: &Store, content: &[u8], args: &ImportArgs) -> Result<ImportStats> {
    import_rows(
        store,
        content,
        args,
        |row| {
            let group = Node {
                id: row.required_int("group_code")?,
                desc: row.required("group_name")?,
            };
            Ok((row.required_int::<i64>("code")?, row.text("name").unwrap_or_default(), group))
        },
        |store, (code, name, group)| {
            let created = store.fonte_grupo_for(*code)?.is_none();
            store.upsert_fonte_fromto(*code, name, group)?;
            Ok((code.to_string(), Outcome::created(created)))
        },
    )
}

pub fn import_deflatores(store: &Store, content: &[u8], args: &ImportArgs) -> Result<ImportStats> {
    import_rows(
        store,
        content,
        args,
        |row| {
            let index = row.number("index")?.ok_or(ImportError::Missing {
                row: row.number,
                field: "index",
            })?;
            if index <= 0.0 {
                return Err(ImportError::Invalid {
                    row: row.number,
                    field: "index",
                    value: index.to_string(),
                });
            }
            Ok((row.required_int::<i32>("year")?, index))
        },
        |store, (year, index)| {
            let created = !store.deflators()?.contains_key(year);
            store.upsert_deflator(*year, *index)?;
            Ok((year.to_string(), Outcome::created(created)))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{ExecucaoQuery, Taxonomy};

    const EXECUCOES: &str = "\
year,orgao_id,grupo_id,grupo_desc,subgrupo_id,subgrupo_desc,subfuncao_id,subfuncao_desc,\
fonte_id,fonte_grupo_id,fonte_grupo_desc,minimo_legal,orcado_atualizado,empenhado_liquido
2019,16,1,Pessoal,11,Ativos,361,Ensino Fundamental,,1,Tesouro,sim,1000,900
2019,16,1,Pessoal,12,Inativos,361,Ensino Fundamental,8,,,,500,
";

    #[test]
    fn test_execucoes_resolve_fonte_and_replace_year() {
        let store = Store::open_in_memory().unwrap();
        import_fontes(
            &store,
            "code,name,group_code,group_name\n8,Salario Educacao,2,Federal\n".as_bytes(),
            &ImportArgs::default(),
        )
        .unwrap();

        let stats = import_execucoes(&store, EXECUCOES.as_bytes(), &ImportArgs::default()).unwrap();
        assert_eq!(stats.created, 2);

        let records = store.execucoes(&ExecucaoQuery::default()).unwrap();
        assert_eq!(records.len(), 2);
        let fontes: Vec<Option<i64>> = records
            .iter()
            .map(|r| r.fonte_grupo.as_ref().map(|n| n.id))
            .collect();
        assert!(fontes.contains(&Some(1)));
        assert!(fontes.contains(&Some(2)));
        assert_eq!(records.iter().filter(|r| r.is_minimo_legal).count(), 1);
        assert_eq!(
            store.node(Taxonomy::Subfuncao, 361).unwrap().unwrap().desc,
            "Ensino Fundamental"
        );

        import_execucoes(&store, EXECUCOES.as_bytes(), &ImportArgs::default()).unwrap();
        assert_eq!(store.execucoes(&ExecucaoQuery::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_deflatores_reject_non_positive_index() {
        let store = Store::open_in_memory().unwrap();
        let args = ImportArgs {
            skip_errors: true,
            ..Default::default()
        };
        let csv = "year,index\n2018,5000.5\n2019,0\n2019,5291.41\n";
        let stats = import_deflatores(&store, csv.as_bytes(), &args).unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.created, 2);
        assert_eq!(store.deflators().unwrap().get(&2019), Some(&5291.41));
    }
}
