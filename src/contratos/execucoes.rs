//! Batch jobs over the empenho cache: execucao generation and category
//! from-to application

use miette::Result;
use serde::Serialize;

use crate::core::config::Settings;
use crate::core::store::{Empenho, NewExecucaoContrato, Store, META_CONTRATOS};

/// Rebuild every contract execution line from the cached empenhos
///
/// Runs in one transaction: the table is either fully rebuilt or untouched.
/// Returns the number of lines written.
pub fn generate_execucoes(store: &Store) -> Result<usize> {
    store.transaction(|store| {
        let removed = store.clear_execucoes_contratos()?;
        tracing::debug!(removed, "cleared contract execution lines");

        let empenhos = store.empenhos(None)?;
        for empenho in &empenhos {
            let new = execucao_for(store, empenho)?;
            store.insert_execucao_contrato(&new)?;
        }
        store.touch(META_CONTRATOS)?;
        tracing::info!(count = empenhos.len(), "generated contract execution lines");
        Ok(empenhos.len())
    })
}

fn execucao_for(store: &Store, empenho: &Empenho) -> Result<NewExecucaoContrato> {
    let modalidade_id = match empenho.cod_modalidade_contrato {
        Some(id) => Some(store.get_or_create_modalidade(
            id,
            empenho.txt_descricao_modalidade_contrato.as_deref(),
        )?),
        None => None,
    };
    let objeto_contrato_id = match empenho.txt_objeto_contrato.as_deref() {
        Some(desc) => Some(store.get_or_create_objeto_contrato(desc)?),
        None => None,
    };
    let fornecedor_id = match empenho.txt_razao_social.as_deref() {
        Some(razao) => Some(store.get_or_create_fornecedor(razao)?),
        None => None,
    };

    Ok(NewExecucaoContrato {
        cod_contrato: empenho.cod_contrato,
        empenho_indexer: empenho.indexer(),
        year: empenho.ano_empenho,
        valor_empenhado: empenho.val_empenhado_liquido,
        valor_liquidado: empenho.val_liquidado,
        modalidade_id,
        objeto_contrato_id,
        fornecedor_id,
    })
}

/// Outcome of one from-to application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FromToSummary {
    pub rows: usize,
    pub categorias_created: usize,
    pub lines_tagged: usize,
}

/// Tag contract lines with their canonical category
///
/// Categories are get-or-created by name with the configured slug (none for
/// unknown names). Applying the same mapping again changes nothing.
pub fn apply_categorias_fromto(store: &Store, settings: &Settings) -> Result<FromToSummary> {
    store.transaction(|store| {
        let mut summary = FromToSummary::default();
        for row in store.categorias_fromto()? {
            let slug = settings.categoria_slug(&row.categoria_name);
            if slug.is_none() {
                tracing::debug!(
                    categoria = %row.categoria_name,
                    "no slug configured for categoria"
                );
            }
            let (categoria, created) = store.get_or_create_categoria(
                &row.categoria_name,
                row.categoria_desc.as_deref(),
                slug.as_deref(),
            )?;
            if created {
                summary.categorias_created += 1;
            }
            summary.lines_tagged += store.set_categoria_by_indexer(&row.indexer, categoria.id)?;
            summary.rows += 1;
        }
        tracing::info!(
            rows = summary.rows,
            created = summary.categorias_created,
            tagged = summary.lines_tagged,
            "applied categoria from-to"
        );
        Ok(summary)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{CategoriaFromTo, ContratoQuery};

    fn empenho(cod_contrato: i64, cod_empenho: i64, sub: &str, valor: f64) -> Empenho {
        Empenho {
            cod_contrato,
            ano_exercicio: 2019,
            ano_empenho: 2019,
            cod_empenho,
            cod_sub_elemento: Some(sub.into()),
            cod_modalidade_contrato: Some(5),
            txt_descricao_modalidade_contrato: Some("Pregão".into()),
            txt_objeto_contrato: Some("Merenda".into()),
            txt_razao_social: Some("Fornecedor SA".into()),
            val_empenhado_liquido: valor,
            val_liquidado: valor / 2.0,
            ..Default::default()
        }
    }

    fn fixture() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.upsert_empenho(&empenho(1, 10, "39", 100.0)).unwrap();
        store.upsert_empenho(&empenho(1, 11, "39", 50.0)).unwrap();
        store.upsert_empenho(&empenho(2, 20, "30", 10.0)).unwrap();
        store
    }

    #[test]
    fn test_generate_rebuilds_lines() {
        let store = fixture();
        assert_eq!(generate_execucoes(&store).unwrap(), 3);
        assert_eq!(generate_execucoes(&store).unwrap(), 3);

        let lines = store.execucoes_contratos(&ContratoQuery::default()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].empenho_indexer, "1.2019.39");
        assert_eq!(lines[0].fornecedor.as_deref(), Some("Fornecedor SA"));
        assert_eq!(lines[0].modalidade.as_deref(), Some("Pregão"));
        assert!(store.get_meta(META_CONTRATOS).unwrap().is_some());
    }

    #[test]
    fn test_fromto_is_idempotent() {
        let store = fixture();
        generate_execucoes(&store).unwrap();
        store
            .upsert_categoria_fromto(&CategoriaFromTo {
                indexer: "1.2019.39".into(),
                categoria_name: "Alimentação".into(),
                categoria_desc: Some("Merenda escolar".into()),
            })
            .unwrap();
        store
            .upsert_categoria_fromto(&CategoriaFromTo {
                indexer: "2.2019.30".into(),
                categoria_name: "Categoria nova".into(),
                categoria_desc: None,
            })
            .unwrap();

        let mut settings = Settings::default();
        settings
            .categoria_slugs
            .insert("Alimentação".into(), "alimentacao".into());

        let first = apply_categorias_fromto(&store, &settings).unwrap();
        assert_eq!(first.categorias_created, 2);
        assert_eq!(first.lines_tagged, 3);
        let before = store.execucoes_contratos(&ContratoQuery::default()).unwrap();

        let second = apply_categorias_fromto(&store, &settings).unwrap();
        assert_eq!(second.categorias_created, 0);
        let after = store.execucoes_contratos(&ContratoQuery::default()).unwrap();
        assert_eq!(before, after);

        let categorias = store.categorias().unwrap();
        let nova = categorias.iter().find(|c| c.name == "Categoria nova").unwrap();
        assert_eq!(nova.slug, None);
        let alimentacao = categorias.iter().find(|c| c.name == "Alimentação").unwrap();
        assert_eq!(alimentacao.slug.as_deref(), Some("alimentacao"));
    }
}
