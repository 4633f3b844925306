//! `orc contratos` command - contract expenditure summary

use miette::Result;

use crate::cli::helpers::{emit, Workspace};
use crate::cli::GlobalOpts;
use crate::contratos::{self, ContratosParams};

#[derive(clap::Args, Debug)]
pub struct ContratosArgs {
    /// Year (default: newest year with contract lines)
    #[arg(long)]
    pub year: Option<i32>,

    /// Restrict the top 5 to one category id
    #[arg(long)]
    pub categoria: Option<i64>,
}

pub fn run(args: ContratosArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global)?;
    let params = ContratosParams {
        year: args.year,
        categoria: args.categoria,
    };
    let report = contratos::build_report(&workspace.store, &params)?;
    emit(&report, Some("contratos"), global)
}
