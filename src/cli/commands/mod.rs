//! CLI command implementations

pub mod completions;
pub mod contratos;
pub mod db;
pub mod fromto;
pub mod get;
pub mod import;
pub mod init;
pub mod mosaico;
pub mod regiao;
pub mod sync;
