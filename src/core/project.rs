//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project metadata directory
const PROJECT_DIR: &str = ".orc";

/// Represents an orc project (a directory holding `.orc/`)
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .orc/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Resolve the project from an explicit `--project` path or by discovery
    pub fn locate(explicit: Option<&Path>) -> Result<Self, ProjectError> {
        match explicit {
            Some(path) => Self::discover_from(path),
            None => Self::discover(),
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        let orc_dir = root.join(PROJECT_DIR);
        if orc_dir.exists() {
            return Err(ProjectError::AlreadyExists(root.clone()));
        }

        Self::write_skeleton(&root)?;
        Ok(Self { root })
    }

    /// Force initialization even if .orc/ exists (config is rewritten, data kept)
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        Self::write_skeleton(&root)?;
        Ok(Self { root })
    }

    fn write_skeleton(root: &Path) -> Result<(), ProjectError> {
        let orc_dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(orc_dir.join("exports"))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        std::fs::write(orc_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(())
    }

    fn default_config() -> &'static str {
        r#"# orc project configuration
# Values here override ~/.config/orc/config.yaml; ORC_* environment
# variables override both.

# Prefix for every navigation URL written into reports
# base_url: ""

# Label of the breadcrumb root entry
# root_label: "São Paulo"

# Network used when a report does not ask for one (DIR = rede direta)
# default_rede: DIR

# SOF expenditure API (bearer token is usually given as ORC_SOF_TOKEN)
# sof:
#   url: https://gatewayapi.prodam.sp.gov.br:443/financas/orcamento/sof/v2.1.0/consultaEmpenhos
#   cod_orgao: 16

# EOL school registry API
# eol:
#   url: https://hom-escolaaberta.sme.prefeitura.sp.gov.br/api
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .orc configuration directory
    pub fn orc_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Path of the SQLite record store
    pub fn database_path(&self) -> PathBuf {
        self.orc_dir().join("data.db")
    }

    /// Default directory for generated spreadsheets
    pub fn exports_dir(&self) -> PathBuf {
        self.orc_dir().join("exports")
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not an orc project (searched from {searched_from:?}). Run 'orc init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("orc project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.orc_dir().exists());
        assert!(project.orc_dir().join("config.yaml").exists());
        assert!(project.exports_dir().is_dir());
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
    }

    #[test]
    fn test_project_discover_finds_orc_dir() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_orc_dir() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }
}
