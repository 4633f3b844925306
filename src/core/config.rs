//! Configuration management with layered hierarchy
//!
//! Settings are built once at start-up and passed by reference into the
//! components that need them (URL builders, slug lookups, API clients).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::Project;

const DEFAULT_SOF_URL: &str =
    "https://gatewayapi.prodam.sp.gov.br:443/financas/orcamento/sof/v2.1.0/consultaEmpenhos";
const DEFAULT_EOL_URL: &str = "https://hom-escolaaberta.sme.prefeitura.sp.gov.br/api";

/// Resolved settings used by every report and sync component
#[derive(Debug, Clone)]
pub struct Settings {
    /// Prefix for generated navigation URLs
    pub base_url: String,
    /// Label of the breadcrumb root ("whole region") entry
    pub root_label: String,
    /// Network type used when none is requested
    pub default_rede: String,
    /// Network type whose etapa breakdown carries vacancy totals
    pub conveniada_rede: String,
    /// Orgao id of the education secretariat
    pub sme_orgao_id: i64,
    pub sof: SofSettings,
    pub eol: EolSettings,
    /// Free-text etapa label -> slug
    pub etapa_slugs: BTreeMap<String, String>,
    /// Canonical contract category name -> slug
    pub categoria_slugs: BTreeMap<String, String>,
}

/// SOF expenditure API settings
#[derive(Debug, Clone)]
pub struct SofSettings {
    pub url: String,
    pub token: Option<String>,
    pub cod_orgao: i64,
    pub mes_empenho: u32,
    pub timeout_secs: u64,
}

/// EOL school registry API settings
#[derive(Debug, Clone)]
pub struct EolSettings {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            root_label: "São Paulo".to_string(),
            default_rede: "DIR".to_string(),
            conveniada_rede: "CON".to_string(),
            sme_orgao_id: 16,
            sof: SofSettings {
                url: DEFAULT_SOF_URL.to_string(),
                token: None,
                cod_orgao: 16,
                mes_empenho: 12,
                timeout_secs: 30,
            },
            eol: EolSettings {
                url: DEFAULT_EOL_URL.to_string(),
                timeout_secs: 30,
            },
            etapa_slugs: default_etapa_slugs(),
            categoria_slugs: default_categoria_slugs(),
        }
    }
}

fn default_etapa_slugs() -> BTreeMap<String, String> {
    [
        ("Infantil", "infantil"),
        ("Fundamental", "fundamental"),
        ("Médio", "medio"),
        ("Especial", "especial"),
        ("Fundamental e Médio", "fundamental_medio"),
        ("Ensino Infantil", "infantil"),
        ("Ensino Fundamental", "fundamental"),
        ("Ensino Médio", "medio"),
        ("Ensino Especial", "especial"),
        ("Ensino Fundamental e Médio", "fundamental_medio"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_categoria_slugs() -> BTreeMap<String, String> {
    [
        ("Alimentação", "alimentacao"),
        ("Limpeza", "limpeza"),
        ("Vigilância", "vigilancia"),
        ("Transporte Escolar", "transporte"),
        ("Manutenção", "manutencao"),
        ("Material Didático", "material"),
        ("Uniforme Escolar", "uniforme"),
        ("Locação de Imóveis", "locacao"),
        ("Convênios", "convenios"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// On-disk shape of a config file: every field optional so layers merge
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    base_url: Option<String>,
    root_label: Option<String>,
    default_rede: Option<String>,
    conveniada_rede: Option<String>,
    sme_orgao_id: Option<i64>,
    sof: SofFile,
    eol: EolFile,
    etapa_slugs: BTreeMap<String, String>,
    categoria_slugs: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SofFile {
    url: Option<String>,
    token: Option<String>,
    cod_orgao: Option<i64>,
    mes_empenho: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EolFile {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from all sources, merging in priority order
    pub fn load(project: Option<&Project>) -> Self {
        let mut settings = Settings::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/orc/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            settings.merge_file(&global_path);
        }

        // 3. Project config (.orc/config.yaml)
        if let Some(project) = project {
            settings.merge_file(&project.orc_dir().join("config.yaml"));
        }

        // 4. Environment variables
        if let Ok(token) = std::env::var("ORC_SOF_TOKEN") {
            settings.sof.token = Some(token);
        }
        if let Ok(url) = std::env::var("ORC_SOF_URL") {
            settings.sof.url = url;
        }
        if let Ok(url) = std::env::var("ORC_EOL_URL") {
            settings.eol.url = url;
        }
        if let Ok(base_url) = std::env::var("ORC_BASE_URL") {
            settings.base_url = base_url;
        }

        settings
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "orc")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn merge_file(&mut self, path: &std::path::Path) {
        if !path.exists() {
            return;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yml::from_str::<SettingsFile>(&contents) {
                Ok(file) => self.merge(file),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config")
                }
            },
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot read config"),
        }
    }

    /// Merge another config layer into this one (other takes precedence)
    fn merge(&mut self, other: SettingsFile) {
        if let Some(v) = other.base_url {
            self.base_url = v;
        }
        if let Some(v) = other.root_label {
            self.root_label = v;
        }
        if let Some(v) = other.default_rede {
            self.default_rede = v;
        }
        if let Some(v) = other.conveniada_rede {
            self.conveniada_rede = v;
        }
        if let Some(v) = other.sme_orgao_id {
            self.sme_orgao_id = v;
        }

        if let Some(v) = other.sof.url {
            self.sof.url = v;
        }
        if other.sof.token.is_some() {
            self.sof.token = other.sof.token;
        }
        if let Some(v) = other.sof.cod_orgao {
            self.sof.cod_orgao = v;
        }
        if let Some(v) = other.sof.mes_empenho {
            self.sof.mes_empenho = v;
        }
        if let Some(v) = other.sof.timeout_secs {
            self.sof.timeout_secs = v;
        }

        if let Some(v) = other.eol.url {
            self.eol.url = v;
        }
        if let Some(v) = other.eol.timeout_secs {
            self.eol.timeout_secs = v;
        }

        self.etapa_slugs.extend(other.etapa_slugs);
        self.categoria_slugs.extend(other.categoria_slugs);
    }

    /// Slug for a free-text etapa label; unmapped labels have no slug
    pub fn etapa_slug(&self, etapa: &str) -> Option<String> {
        self.etapa_slugs.get(etapa).cloned()
    }

    /// Slug for a canonical contract category name
    pub fn categoria_slug(&self, name: &str) -> Option<String> {
        self.categoria_slugs.get(name).cloned()
    }

    /// Prefix a path with the configured base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_include_etapa_slugs() {
        let settings = Settings::default();
        assert_eq!(settings.etapa_slug("Ensino Médio").as_deref(), Some("medio"));
        assert_eq!(settings.etapa_slug("Creche"), None);
    }

    #[test]
    fn test_merge_overrides_only_present_fields() {
        let mut settings = Settings::default();
        let file: SettingsFile = serde_yml::from_str(
            "root_label: Cidade\nsof:\n  cod_orgao: 20\netapa_slugs:\n  Creche: creche\n",
        )
        .unwrap();
        settings.merge(file);

        assert_eq!(settings.root_label, "Cidade");
        assert_eq!(settings.sof.cod_orgao, 20);
        assert_eq!(settings.sof.mes_empenho, 12);
        assert_eq!(settings.default_rede, "DIR");
        assert_eq!(settings.etapa_slug("Creche").as_deref(), Some("creche"));
        assert_eq!(settings.etapa_slug("Infantil").as_deref(), Some("infantil"));
    }

    #[test]
    fn test_url_joins_base() {
        let settings = Settings {
            base_url: "https://example.org/".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.url("/contratos/"), "https://example.org/contratos/");
    }
}
