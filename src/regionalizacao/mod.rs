//! School budget by geography
//!
//! Drill-down zona → dre → distrito → escola over the school-year records,
//! with breadcrumb, per-level totals, etapa breakdown and a locations pivot.

pub mod breadcrumb;
pub mod download;
pub mod filters;
pub mod places;
pub mod report;

pub use download::{download_rows, download_table, DownloadRow};
pub use filters::{resolve, Level, Localidade, PlaceParams, Resolved};
pub use places::{EscolaDetail, Etapa, Location, Place, Terminal};
pub use report::{build_report, RegionalizacaoReport};
