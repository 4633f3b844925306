//! Database schema initialization

use miette::{IntoDiagnostic, Result};
use rusqlite::params;

use super::{Store, SCHEMA_VERSION};

impl Store {
    /// Initialize database schema
    ///
    /// Every statement is idempotent so opening an existing store only adds
    /// what is missing.
    pub(super) fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Geography
            CREATE TABLE IF NOT EXISTS dres (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS distritos (
                coddist INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                zona TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_distritos_zona ON distritos(zona);

            CREATE TABLE IF NOT EXISTS tipos_escola (
                code TEXT PRIMARY KEY,
                description TEXT,
                etapa TEXT
            );

            CREATE TABLE IF NOT EXISTS escolas (
                codesc TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS escola_info (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                year INTEGER NOT NULL,
                codesc TEXT NOT NULL REFERENCES escolas(codesc),
                dre_code TEXT NOT NULL REFERENCES dres(code),
                coddist INTEGER NOT NULL REFERENCES distritos(coddist),
                tipoesc TEXT NOT NULL REFERENCES tipos_escola(code),
                nomesc TEXT NOT NULL,
                endereco TEXT,
                numero INTEGER,
                bairro TEXT,
                cep INTEGER,
                rede TEXT NOT NULL,
                latitude REAL,
                longitude REAL,
                total_vagas INTEGER,
                budget_total REAL,
                recursos TEXT,
                UNIQUE (year, codesc)
            );
            CREATE INDEX IF NOT EXISTS idx_escola_info_year_rede ON escola_info(year, rede);
            CREATE INDEX IF NOT EXISTS idx_escola_info_coddist ON escola_info(coddist);
            CREATE INDEX IF NOT EXISTS idx_escola_info_dre ON escola_info(dre_code);

            -- Budget taxonomy
            CREATE TABLE IF NOT EXISTS grupos (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS subgrupos (
                id INTEGER PRIMARY KEY,
                grupo_id INTEGER NOT NULL REFERENCES grupos(id),
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS elementos (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS subelementos (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS subfuncoes (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS programas (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS projetos (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS fonte_grupos (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL
            );

            -- Raw fonte de recurso code -> group
            CREATE TABLE IF NOT EXISTS fontes_fromto (
                code INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                group_code INTEGER NOT NULL,
                group_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deflators (
                year INTEGER PRIMARY KEY,
                idx REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS execucoes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                year INTEGER NOT NULL,
                orgao_id INTEGER NOT NULL,
                subgrupo_id INTEGER REFERENCES subgrupos(id),
                elemento_id INTEGER REFERENCES elementos(id),
                subelemento_id INTEGER REFERENCES subelementos(id),
                subfuncao_id INTEGER REFERENCES subfuncoes(id),
                programa_id INTEGER REFERENCES programas(id),
                projeto_id INTEGER REFERENCES projetos(id),
                fonte_grupo_id INTEGER REFERENCES fonte_grupos(id),
                is_minimo_legal INTEGER NOT NULL DEFAULT 0,
                orcado_atualizado REAL,
                empenhado_liquido REAL
            );
            CREATE INDEX IF NOT EXISTS idx_execucoes_year ON execucoes(year);
            CREATE INDEX IF NOT EXISTS idx_execucoes_subgrupo ON execucoes(subgrupo_id);
            CREATE INDEX IF NOT EXISTS idx_execucoes_subfuncao ON execucoes(subfuncao_id);

            -- Contracts
            CREATE TABLE IF NOT EXISTS contratos_raw (
                cod_contrato INTEGER NOT NULL,
                ano_exercicio INTEGER NOT NULL,
                cod_orgao INTEGER,
                cod_modalidade INTEGER,
                txt_descricao_modalidade TEXT,
                txt_objeto_contrato TEXT,
                txt_razao_social TEXT,
                PRIMARY KEY (cod_contrato, ano_exercicio)
            );

            CREATE TABLE IF NOT EXISTS empenhos (
                cod_contrato INTEGER NOT NULL,
                ano_exercicio INTEGER NOT NULL,
                ano_empenho INTEGER NOT NULL,
                cod_empenho INTEGER NOT NULL,
                cod_sub_elemento TEXT,
                cod_modalidade_contrato INTEGER,
                txt_descricao_modalidade_contrato TEXT,
                txt_objeto_contrato TEXT,
                txt_razao_social TEXT,
                val_empenhado_liquido REAL NOT NULL DEFAULT 0,
                val_liquidado REAL NOT NULL DEFAULT 0,
                val_pago_exercicio REAL NOT NULL DEFAULT 0,
                val_total_empenhado REAL NOT NULL DEFAULT 0,
                raw TEXT NOT NULL,
                PRIMARY KEY (cod_contrato, ano_exercicio, ano_empenho, cod_empenho)
            );
            CREATE INDEX IF NOT EXISTS idx_empenhos_ano_exercicio ON empenhos(ano_exercicio);

            CREATE TABLE IF NOT EXISTS empenhos_failed_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cod_contrato INTEGER NOT NULL,
                ano_exercicio INTEGER NOT NULL,
                ano_empenho INTEGER NOT NULL,
                error_code INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS modalidades (
                id INTEGER PRIMARY KEY,
                description TEXT
            );
            CREATE TABLE IF NOT EXISTS objetos_contrato (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS fornecedores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                razao_social TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS categorias (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                slug TEXT
            );
            CREATE TABLE IF NOT EXISTS categorias_fromto (
                indexer TEXT PRIMARY KEY,
                categoria_name TEXT NOT NULL,
                categoria_desc TEXT
            );

            CREATE TABLE IF NOT EXISTS execucoes_contratos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cod_contrato INTEGER NOT NULL,
                empenho_indexer TEXT NOT NULL,
                year INTEGER NOT NULL,
                valor_empenhado REAL NOT NULL,
                valor_liquidado REAL NOT NULL,
                categoria_id INTEGER REFERENCES categorias(id),
                modalidade_id INTEGER REFERENCES modalidades(id),
                objeto_contrato_id INTEGER REFERENCES objetos_contrato(id),
                fornecedor_id INTEGER REFERENCES fornecedores(id)
            );
            CREATE INDEX IF NOT EXISTS idx_execucoes_contratos_indexer
                ON execucoes_contratos(empenho_indexer);
            CREATE INDEX IF NOT EXISTS idx_execucoes_contratos_year ON execucoes_contratos(year);

            -- Spreadsheet import log
            CREATE TABLE IF NOT EXISTS import_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_hash TEXT NOT NULL,
                added TEXT NOT NULL,
                not_added TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_import_log_hash ON import_log(kind, file_hash);

            -- Store metadata (last update timestamps)
            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
            )
            .into_diagnostic()?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .into_diagnostic()?;

        Ok(())
    }
}

/// Tables reported by `orc db status`
pub(super) const DATA_TABLES: &[&str] = &[
    "dres",
    "distritos",
    "tipos_escola",
    "escola_info",
    "grupos",
    "subgrupos",
    "execucoes",
    "fontes_fromto",
    "deflators",
    "contratos_raw",
    "empenhos",
    "empenhos_failed_requests",
    "categorias",
    "categorias_fromto",
    "execucoes_contratos",
    "import_log",
];
