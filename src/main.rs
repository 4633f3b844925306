use clap::Parser;
use miette::Result;
use orcamento::cli::commands;
use orcamento::cli::{Cli, Commands, GlobalOpts};
use tracing_subscriber::EnvFilter;

fn init_logging(global: &GlobalOpts) {
    // -q and -v override ORC_LOG
    let filter = if global.quiet {
        EnvFilter::new("error")
    } else if global.verbose {
        EnvFilter::new("orcamento=debug,info")
    } else {
        EnvFilter::try_from_env("ORC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // Terminate silently on a closed pipe (`orc db query ... | head`)
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&global);

    match cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Import(args) => commands::import::run(args, &global),
        Commands::Regiao(args) => commands::regiao::run(args, &global),
        Commands::Mosaico(args) => commands::mosaico::run(args, &global),
        Commands::Contratos(args) => commands::contratos::run(args, &global),
        Commands::Sync(cmd) => commands::sync::run(cmd, &global),
        Commands::Fromto(args) => commands::fromto::run(args, &global),
        Commands::Get(args) => commands::get::run(args, &global),
        Commands::Db(cmd) => commands::db::run(cmd, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
