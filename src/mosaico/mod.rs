//! Education budget execution by budget taxonomy
//!
//! Two drill-down modes over the execucao lines: simples
//! (grupo → subgrupo → elemento → subelemento) and tecnico
//! (subfuncao → programa → projeto). Each page carries the table of the
//! section, a per-year time series and links to toggle mode, deflation,
//! funding source and CSV export.

pub mod download;
pub mod report;
pub mod sections;
pub mod timeseries;

pub use download::{download_table, DownloadFilter};
pub use report::{build_report, default_path, ExecucaoRow, MosaicoOptions, MosaicoReport};
pub use sections::{Mode, MosaicoPath, Section, SectionConfig};
pub use timeseries::TimeseriesPoint;
