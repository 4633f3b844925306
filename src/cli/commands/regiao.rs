//! `orc regiao` command - school budget drill-down

use miette::Result;

use crate::cli::helpers::{emit, emit_download, Workspace};
use crate::cli::GlobalOpts;
use crate::regionalizacao::{self, PlaceParams};

#[derive(clap::Args, Debug)]
pub struct RegiaoArgs {
    /// Zona name (Norte, Sul, ...)
    #[arg(long)]
    pub zona: Option<String>,

    /// DRE code
    #[arg(long)]
    pub dre: Option<String>,

    /// Distrito code (coddist)
    #[arg(long)]
    pub distrito: Option<i64>,

    /// School code (codesc)
    #[arg(long)]
    pub escola: Option<String>,

    /// Year (default: newest year with data)
    #[arg(long)]
    pub year: Option<i32>,

    /// School network (default from settings)
    #[arg(long)]
    pub rede: Option<String>,

    /// Axis of the locations comparison
    #[arg(long, value_parser = ["zona", "dre"], default_value = "zona")]
    pub localidade: String,

    /// Export every record of the year as a spreadsheet instead
    #[arg(long)]
    pub download: bool,
}

impl RegiaoArgs {
    fn params(&self) -> PlaceParams {
        let mut pairs = vec![("localidade".to_string(), self.localidade.clone())];
        let text = [
            ("zona", &self.zona),
            ("dre", &self.dre),
            ("escola", &self.escola),
            ("rede", &self.rede),
        ];
        for (key, value) in text {
            if let Some(value) = value {
                pairs.push((key.to_string(), value.clone()));
            }
        }
        if let Some(distrito) = self.distrito {
            pairs.push(("distrito".to_string(), distrito.to_string()));
        }
        if let Some(year) = self.year {
            pairs.push(("year".to_string(), year.to_string()));
        }
        PlaceParams::from_pairs(pairs)
    }
}

pub fn run(args: RegiaoArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;

    if args.download {
        let rows = regionalizacao::download_rows(&workspace.store, args.year)?;
        let table = regionalizacao::download_table(&rows, args.year);
        return emit_download(&table, global);
    }

    let report =
        regionalizacao::build_report(&workspace.store, &workspace.settings, &args.params())?;
    emit(&report, Some("regionalizacao"), global)
}
