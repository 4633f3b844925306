//! Orc: public education budget transparency
//!
//! Imports school, budget execution and contract data into a local SQLite
//! store, keeps it in sync with the SOF expenditure API and the EOL school
//! registry, and renders three drill-down reports: regionalizacao (school
//! budget by zona, dre, distrito and escola), mosaico (execution by budget
//! taxonomy) and contratos (contract expenditure).

pub mod cli;
pub mod contratos;
pub mod core;
pub mod mosaico;
pub mod regionalizacao;
pub mod render;
pub mod routes;
pub mod sync;
