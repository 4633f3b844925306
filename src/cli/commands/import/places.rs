//! Import of the regionalizacao spreadsheets

use miette::Result;

use crate::core::store::{NewEscolaInfo, Recurso, Store};

use super::common::{import_rows, parse_rows, CsvRow, ImportArgs, ImportError, ImportStats, Outcome};

struct EscolaRow {
    info: NewEscolaInfo,
    diretoria: Option<String>,
    distrito: Option<String>,
}

fn parse_escola(row: &CsvRow) -> Result<EscolaRow, ImportError> {
    let info = NewEscolaInfo {
        year: row.required_int("year")?,
        codesc: row.required("codesc")?,
        nomesc: row.required("nomesc")?,
        dre_code: row.required("dre")?,
        coddist: row.required_int("coddist")?,
        tipoesc: row.required("tipoesc")?,
        endereco: row.text("endereco"),
        numero: row.int("numero")?,
        bairro: row.text("bairro"),
        cep: row.int("cep")?,
        rede: row.required("rede")?,
        latitude: row.number("latitude")?,
        longitude: row.number("longitude")?,
        total_vagas: row.int("total_vagas")?,
        budget_total: row.amount("budget_total")?,
    };
    Ok(EscolaRow {
        info,
        diretoria: row.text("diretoria"),
        distrito: row.text("distrito"),
    })
}

/// School records; dre, distrito and tipo are created when missing
pub fn import_escolas(store: &Store, content: &[u8], args: &ImportArgs) -> Result<ImportStats> {
    import_rows(store, content, args, parse_escola, |store, row| {
        let info = &row.info;
        if store.dre(&info.dre_code)?.is_none() {
            store.upsert_dre(&info.dre_code, row.diretoria.as_deref().unwrap_or(&info.dre_code))?;
        }
        store.create_tipo_escola(&info.tipoesc, None)?;
        store.get_or_create_distrito(info.coddist, row.distrito.as_deref().unwrap_or_default())?;
        let created = store.upsert_escola_info(info)?;
        Ok((format!("{}@{}", info.codesc, info.year), Outcome::created(created)))
    })
}

pub fn import_tipos_escola(
    store: &Store,
    content: &[u8],
    args: &ImportArgs,
) -> Result<ImportStats> {
    import_rows(
        store,
        content,
        args,
        |row| Ok((row.required("code")?, row.text("desc"), row.text("etapa"))),
        |store, (code, desc, etapa)| {
            let created = store.upsert_tipo_escola(code, desc.as_deref(), etapa.as_deref())?;
            Ok((code.clone(), Outcome::created(created)))
        },
    )
}

pub fn import_distrito_zona(
    store: &Store,
    content: &[u8],
    args: &ImportArgs,
) -> Result<ImportStats> {
    import_rows(
        store,
        content,
        args,
        |row| {
            Ok((
                row.required_int::<i64>("coddist")?,
                row.text("distrito").unwrap_or_default(),
                row.required("zona")?,
            ))
        },
        |store, (coddist, name, zona)| {
            let created = store.set_distrito_zona(*coddist, name, zona)?;
            Ok((coddist.to_string(), Outcome::created(created)))
        },
    )
}

/// Budget lines grouped per school record, replacing its breakdown
///
/// Lines of a record that does not exist yet are reported as not added.
pub fn import_recursos(store: &Store, content: &[u8], args: &ImportArgs) -> Result<ImportStats> {
    let (rows, mut stats) = parse_rows(content, args, |row| {
        let recurso = Recurso {
            grupo: row.required("grupo")?,
            subgrupo: row.text("subgrupo"),
            valor: row.amount("valor")?.unwrap_or(0.0),
        };
        Ok(((row.required_int::<i32>("year")?, row.required("codesc")?), recurso))
    })?;
    if args.dry_run {
        return Ok(stats);
    }

    let mut grouped: Vec<((i32, String), Vec<Recurso>)> = Vec::new();
    for (key, recurso) in rows {
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, recursos)) => recursos.push(recurso),
            None => grouped.push((key, vec![recurso])),
        }
    }

    store.transaction(|store| {
        for ((year, codesc), recursos) in &grouped {
            let outcome = if store.set_escola_recursos(*year, codesc, recursos)? {
                Outcome::Updated
            } else {
                tracing::warn!(codesc = %codesc, year, "no school record for recursos");
                Outcome::NotFound
            };
            stats.record(format!("{}@{}", codesc, year), outcome);
        }
        Ok(())
    })?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::PlaceQuery;

    const ESCOLAS: &str = "\
year,codesc,nomesc,tipoesc,dre,diretoria,coddist,distrito,cep,rede,total_vagas
2019,000191,ALIPIO CORREA NETO,EMEF,BT,DRE BUTANTA,94,VILA SONIA,05742100,DIR,502
2019,000477,VICENTE,EMEI,BT,DRE BUTANTA,65,RAPOSO TAVARES,,DIR,
";

    #[test]
    fn test_escolas_create_references() {
        let store = Store::open_in_memory().unwrap();
        let stats = import_escolas(&store, ESCOLAS.as_bytes(), &ImportArgs::default()).unwrap();

        assert_eq!(stats.created, 2);
        assert_eq!(stats.added, vec!["000191@2019", "000477@2019"]);
        assert_eq!(store.dre("BT").unwrap().unwrap().name, "DRE BUTANTA");
        assert_eq!(store.distrito(65).unwrap().unwrap().name, "RAPOSO TAVARES");

        let infos = store.escola_infos(&PlaceQuery::new()).unwrap();
        assert_eq!(infos[0].cep, Some(5742100));
        assert_eq!(infos[1].total_vagas, None);

        let again = import_escolas(&store, ESCOLAS.as_bytes(), &ImportArgs::default()).unwrap();
        assert_eq!((again.created, again.updated), (0, 2));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let store = Store::open_in_memory().unwrap();
        let args = ImportArgs {
            dry_run: true,
            ..Default::default()
        };
        let stats = import_escolas(&store, ESCOLAS.as_bytes(), &args).unwrap();
        assert_eq!(stats.rows_processed, 2);
        assert!(stats.added.is_empty());
        assert!(store.escola_infos(&PlaceQuery::new()).unwrap().is_empty());
    }

    #[test]
    fn test_recursos_replace_breakdown() {
        let store = Store::open_in_memory().unwrap();
        import_escolas(&store, ESCOLAS.as_bytes(), &ImportArgs::default()).unwrap();

        let csv = "\
year,codesc,grupo,subgrupo,valor
2019,000191,PTRF,Custeio,100.50
2019,000191,Merenda,,20
2019,999999,PTRF,,5
";
        let stats = import_recursos(&store, csv.as_bytes(), &ImportArgs::default()).unwrap();
        assert_eq!(stats.added, vec!["000191@2019"]);
        assert_eq!(stats.not_added, vec!["999999@2019"]);

        let infos = store
            .escola_infos(&PlaceQuery::new().escola(Some("000191".into())))
            .unwrap();
        assert_eq!(infos[0].recursos.len(), 2);
        assert_eq!(infos[0].budget_total, Some(120.5));
    }

    #[test]
    fn test_negative_recurso_rejected() {
        let store = Store::open_in_memory().unwrap();
        let csv = "year,codesc,grupo,valor\n2019,000191,PTRF,-1\n";
        assert!(import_recursos(&store, csv.as_bytes(), &ImportArgs::default()).is_err());

        let lenient = ImportArgs {
            skip_errors: true,
            ..Default::default()
        };
        let stats = import_recursos(&store, csv.as_bytes(), &lenient).unwrap();
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_distrito_zona_and_tipos() {
        let store = Store::open_in_memory().unwrap();
        let stats = import_distrito_zona(
            &store,
            "coddist,distrito,zona\n94,VILA SONIA,Oeste\n".as_bytes(),
            &ImportArgs::default(),
        )
        .unwrap();
        assert_eq!(stats.added, vec!["94"]);
        assert_eq!(store.distrito(94).unwrap().unwrap().zona.as_deref(), Some("Oeste"));

        import_tipos_escola(
            &store,
            "code,desc,etapa\nEMEI,Educacao Infantil,Infantil\n".as_bytes(),
            &ImportArgs::default(),
        )
        .unwrap();
        assert_eq!(
            store.tipo_escola("EMEI").unwrap().unwrap().etapa.as_deref(),
            Some("Infantil")
        );
    }
}
