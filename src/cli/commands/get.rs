//! `orc get` command - follow a navigation URL
//!
//! Any link found in a payload (breadcrumbs, place urls, mosaico rows,
//! download links) can be passed back here. A `format=` query parameter wins
//! over `--format`.

use miette::Result;

use crate::cli::helpers::{emit, emit_download, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::routes::{self, Format, Page};

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    /// URL or path, e.g. "/mosaico/2019/grupos/?deflate=true"
    pub url: String,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => OutputFormat::Csv,
            Format::Json => OutputFormat::Json,
            Format::Html => OutputFormat::Html,
        }
    }
}

pub fn run(args: GetArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;
    let routed = routes::resolve(&workspace.store, &workspace.settings, &args.url)?;

    let global = match routed.format {
        Some(format) => GlobalOpts {
            format: format.into(),
            ..global.clone()
        },
        None => global.clone(),
    };

    match &routed.page {
        Page::Download(table) => emit_download(table, &global),
        page => emit(page, page.template(), &global),
    }
}
