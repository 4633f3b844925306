//! Contract execution reporting
//!
//! Lines are generated from the empenho cache, tagged with canonical
//! categories through the from-to table and summarised per year.

pub mod execucoes;
pub mod export;
pub mod services;

pub use execucoes::{apply_categorias_fromto, generate_execucoes, FromToSummary};
pub use export::export_spreadsheets;
pub use services::{build_report, ContratosParams, ContratosReport};
