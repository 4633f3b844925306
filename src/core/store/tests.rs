use super::*;

fn seed_escola(store: &Store, codesc: &str, rede: &str, total: Option<f64>) {
    store.upsert_dre("DRE-IP", "Ipiranga").unwrap();
    store.set_distrito_zona(10, "Sacomã", "Sul").unwrap();
    store
        .upsert_tipo_escola(
            "EMEF",
            Some("Escola Municipal de Ensino Fundamental"),
            Some("Fundamental"),
        )
        .unwrap();
    store
        .upsert_escola_info(&NewEscolaInfo {
            year: 2019,
            codesc: codesc.to_string(),
            nomesc: format!("Escola {}", codesc),
            dre_code: "DRE-IP".to_string(),
            coddist: 10,
            tipoesc: "EMEF".to_string(),
            rede: rede.to_string(),
            budget_total: total,
            ..Default::default()
        })
        .unwrap();
}

#[test]
fn test_open_in_memory_has_empty_tables() {
    let store = Store::open_in_memory().unwrap();
    let stats = store.stats(None).unwrap();
    assert_eq!(stats.tables.get("escola_info"), Some(&0));
    assert_eq!(stats.tables.get("empenhos_failed_requests"), Some(&0));
}

#[test]
fn test_open_path_is_reopenable() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data.db");
    {
        let store = Store::open_path(&path).unwrap();
        store.set_meta("k", "v").unwrap();
    }
    let store = Store::open_path(&path).unwrap();
    assert_eq!(store.get_meta("k").unwrap().as_deref(), Some("v"));
}

#[test]
fn test_upsert_escola_info_creates_then_updates() {
    let store = Store::open_in_memory().unwrap();
    seed_escola(&store, "000191", "DIR", Some(100.0));

    let created = store
        .upsert_escola_info(&NewEscolaInfo {
            year: 2019,
            codesc: "000191".to_string(),
            nomesc: "Renamed".to_string(),
            dre_code: "DRE-IP".to_string(),
            coddist: 10,
            tipoesc: "EMEF".to_string(),
            rede: "DIR".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert!(!created);

    let rows = store.escola_infos(&PlaceQuery::new()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].nomesc, "Renamed");
    // Budget survives an update without one
    assert_eq!(rows[0].budget_total, Some(100.0));
    assert_eq!(rows[0].zona(), Some("Sul"));
}

#[test]
fn test_place_query_filters() {
    let store = Store::open_in_memory().unwrap();
    seed_escola(&store, "1", "DIR", Some(10.0));
    seed_escola(&store, "2", "CON", Some(20.0));

    let dir = store
        .escola_infos(&PlaceQuery::new().year(Some(2019)).rede(Some("DIR".into())))
        .unwrap();
    assert_eq!(dir.len(), 1);
    assert_eq!(dir[0].codesc, "1");

    let sul = store
        .escola_infos(&PlaceQuery::new().zona(Some("Sul".into())).with_etapa())
        .unwrap();
    assert_eq!(sul.len(), 2);

    let norte = store
        .escola_infos(&PlaceQuery::new().zona(Some("Norte".into())))
        .unwrap();
    assert!(norte.is_empty());

    assert_eq!(store.escola_rede(2019, "2").unwrap().as_deref(), Some("CON"));
    assert_eq!(store.place_years().unwrap(), vec![2019]);
}

#[test]
fn test_set_recursos_sums_total() {
    let store = Store::open_in_memory().unwrap();
    seed_escola(&store, "1", "DIR", None);

    let recursos = vec![
        Recurso { grupo: "PTRF".into(), subgrupo: None, valor: 1500.0 },
        Recurso { grupo: "Merenda".into(), subgrupo: Some("Gêneros".into()), valor: 500.5 },
    ];
    assert!(store.set_escola_recursos(2019, "1", &recursos).unwrap());
    assert!(!store.set_escola_recursos(2020, "1", &recursos).unwrap());

    let rows = store.escola_infos(&PlaceQuery::new()).unwrap();
    assert_eq!(rows[0].budget_total, Some(2000.5));
    assert_eq!(rows[0].recursos, recursos);
}

#[test]
fn test_create_tipo_escola_ignores_existing() {
    let store = Store::open_in_memory().unwrap();
    assert!(store.create_tipo_escola("EMEI", Some("Infantil")).unwrap());
    assert!(!store.create_tipo_escola("EMEI", Some("Other")).unwrap());
    let tipo = store.tipo_escola("EMEI").unwrap().unwrap();
    assert_eq!(tipo.desc.as_deref(), Some("Infantil"));
}

#[test]
fn test_execucao_query_joins_grupo_through_subgrupo() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_execucao(&NewExecucao {
            year: 2018,
            orgao_id: 16,
            grupo: Some(Node { id: 1, desc: "Pessoal".into() }),
            subgrupo: Some(Node { id: 11, desc: "Ativos".into() }),
            subfuncao: Some(Node { id: 361, desc: "Ensino Fundamental".into() }),
            orcado_atualizado: Some(100.0),
            empenhado_liquido: Some(90.0),
            ..Default::default()
        })
        .unwrap();
    store
        .insert_execucao(&NewExecucao {
            year: 2018,
            orgao_id: 99,
            is_minimo_legal: true,
            ..Default::default()
        })
        .unwrap();

    let rows = store
        .execucoes(&ExecucaoQuery {
            grupo_id: Some(1),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].subgrupo.as_ref().map(|n| n.id), Some(11));
    assert_eq!(rows[0].grupo.as_ref().map(|n| n.desc.as_str()), Some("Pessoal"));

    let minimo = store
        .execucoes(&ExecucaoQuery {
            minimo_legal: Some(true),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(minimo.len(), 1);
    assert!(minimo[0].grupo.is_none());

    assert_eq!(store.execucao_years().unwrap(), vec![2018]);
}

#[test]
fn test_empenho_upsert_by_natural_key() {
    let store = Store::open_in_memory().unwrap();
    let mut empenho = Empenho {
        cod_contrato: 7,
        ano_exercicio: 2018,
        ano_empenho: 2018,
        cod_empenho: 1,
        cod_sub_elemento: Some("01".into()),
        val_empenhado_liquido: 10.0,
        raw: serde_json::json!({"codEmpenho": 1}),
        ..Default::default()
    };
    assert!(store.upsert_empenho(&empenho).unwrap());
    empenho.val_empenhado_liquido = 20.0;
    assert!(!store.upsert_empenho(&empenho).unwrap());

    let rows = store.empenhos(Some(2018)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].val_empenhado_liquido, 20.0);
    assert_eq!(rows[0].indexer(), "7.2018.01");
    assert_eq!(rows[0].raw["codEmpenho"], 1);
}

#[test]
fn test_get_or_create_categoria_keeps_first_values() {
    let store = Store::open_in_memory().unwrap();
    let (first, created) = store
        .get_or_create_categoria("Limpeza", Some("Serviços"), Some("limpeza"))
        .unwrap();
    assert!(created);
    let (second, created) = store.get_or_create_categoria("Limpeza", Some("Outra"), None).unwrap();
    assert!(!created);
    assert_eq!(first, second);
    assert_eq!(second.slug.as_deref(), Some("limpeza"));
}

#[test]
fn test_import_log_detects_seen_hash() {
    let store = Store::open_in_memory().unwrap();
    let hash = compute_hash(b"codesc;nomesc\n");
    assert!(!store.import_seen("escolas", &hash).unwrap());
    store
        .log_import("escolas", "escolas.csv", &hash, &["1".into()], &[])
        .unwrap();
    assert!(store.import_seen("escolas", &hash).unwrap());
    assert!(!store.import_seen("recursos", &hash).unwrap());

    let log = store.import_log().unwrap();
    assert_eq!(log[0].added, vec!["1".to_string()]);
}

#[test]
fn test_transaction_rolls_back_on_error() {
    let store = Store::open_in_memory().unwrap();
    let result: Result<()> = store.transaction(|s| {
        s.upsert_dre("X", "Xis")?;
        Err(miette::miette!("boom"))
    });
    assert!(result.is_err());
    assert!(store.dre("X").unwrap().is_none());
}

#[test]
fn test_query_raw_returns_strings() {
    let store = Store::open_in_memory().unwrap();
    store.upsert_deflator(2018, 1.5).unwrap();
    let rows = store.query_raw("SELECT year, idx FROM deflators").unwrap();
    assert_eq!(rows, vec![vec!["2018".to_string(), "1.5".to_string()]]);
    assert_eq!(
        store.query_columns("SELECT year, idx FROM deflators").unwrap(),
        vec!["year", "idx"]
    );
}
