//! Import of the contract list and the category from-to table

use miette::Result;

use crate::core::store::{CategoriaFromTo, ContratoRaw, Store};

use super::common::{import_rows, ImportArgs, ImportStats, Outcome};

pub fn import_contratos(store: &Store, content: &[u8], args: &ImportArgs) -> Result<ImportStats> {
    import_rows(
        store,
        content,
        args,
        |row| {
            Ok(ContratoRaw {
                cod_contrato: row.required_int("cod_contrato")?,
                ano_exercicio: row.required_int("ano_exercicio")?,
                cod_orgao: row.int("cod_orgao")?,
                cod_modalidade: row.int("cod_modalidade")?,
                txt_descricao_modalidade: row.text("modalidade"),
                txt_objeto_contrato: row.text("objeto"),
                txt_razao_social: row.text("razao_social"),
            })
        },
        |store, contrato| {
            let created = store.upsert_contrato_raw(contrato)?;
            let key = format!("{}/{}", contrato.cod_contrato, contrato.ano_exercicio);
            Ok((key, Outcome::created(created)))
        },
    )
}

/// From-to rows; apply them to the execution lines with `orc fromto`
pub fn import_categorias_fromto(
    store: &Store,
    content: &[u8],
    args: &ImportArgs,
) -> Result<ImportStats> {
    import_rows(
        store,
        content,
        args,
        |row| {
            Ok(CategoriaFromTo {
                indexer: row.required("indexer")?,
                categoria_name: row.required("categoria_name")?,
                categoria_desc: row.text("categoria_desc"),
            })
        },
        |store, fromto| {
            let created = !store
                .categorias_fromto()?
                .iter()
                .any(|existing| existing.indexer == fromto.indexer);
            store.upsert_categoria_fromto(fromto)?;
            Ok((fromto.indexer.clone(), Outcome::created(created)))
        },
    )
}
