//! `orc mosaico` command - budget execution by taxonomy

use miette::Result;

use crate::cli::helpers::{emit, emit_download, Workspace};
use crate::cli::GlobalOpts;
use crate::mosaico::{self, DownloadFilter, MosaicoOptions, MosaicoPath, Section};

#[derive(clap::Args, Debug)]
pub struct MosaicoArgs {
    /// Section: grupos, subgrupos, elementos, subelementos, subfuncoes, programas, projetos
    #[arg(default_value = "grupos")]
    pub section: Section,

    /// Year (default: newest year with execution lines)
    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub grupo: Option<i64>,

    #[arg(long)]
    pub subgrupo: Option<i64>,

    #[arg(long)]
    pub elemento: Option<i64>,

    #[arg(long)]
    pub subfuncao: Option<i64>,

    #[arg(long)]
    pub programa: Option<i64>,

    /// Funding-source group id
    #[arg(long)]
    pub fonte: Option<i64>,

    /// Deflate the time series with the yearly index
    #[arg(long)]
    pub deflate: bool,

    /// Keep only the lines counted toward the legal minimum
    #[arg(long)]
    pub minimo_legal: bool,

    /// Export the section as a flat CSV (every year unless --year is given)
    #[arg(long)]
    pub download: bool,
}

impl MosaicoArgs {
    fn ids(&self, year: i32) -> MosaicoPath {
        MosaicoPath {
            year,
            grupo_id: self.grupo,
            subgrupo_id: self.subgrupo,
            elemento_id: self.elemento,
            subfuncao_id: self.subfuncao,
            programa_id: self.programa,
        }
    }

    fn options(&self) -> MosaicoOptions {
        MosaicoOptions {
            fonte: self.fonte,
            deflate: self.deflate,
            minimo_legal: self.minimo_legal,
        }
    }
}

pub fn run(args: MosaicoArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;

    if args.download {
        let filter = DownloadFilter {
            year: args.year,
            ids: args.ids(0),
        };
        let table = mosaico::download_table(
            &workspace.store,
            &workspace.settings,
            args.section,
            &filter,
            &args.options(),
        )?;
        return emit_download(&table, global);
    }

    let year = match args.year {
        Some(year) => year,
        None => mosaico::default_path(&workspace.store)?.year,
    };
    let report = mosaico::build_report(
        &workspace.store,
        &workspace.settings,
        args.section,
        &args.ids(year),
        &args.options(),
    )?;
    emit(&report, Some("mosaico"), global)
}
