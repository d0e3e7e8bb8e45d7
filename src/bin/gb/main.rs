//! gb CLI - configuration-free building for source trees

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, MessageFormat};
use gb::util::diagnostic::{self, PreconditionError};
use gb::util::Shell;

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let default_filter = if cli.verbose { "gb=debug" } else { "gb=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Arc::new(Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    ));

    if let Err(e) = run(cli.command, Arc::clone(&shell)) {
        match e.downcast_ref::<PreconditionError>() {
            Some(precondition) => {
                diagnostic::emit(&precondition.to_diagnostic(), shell.use_color())
            }
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(command: Commands, shell: Arc<Shell>) -> Result<()> {
    match command {
        Commands::Build(args) => commands::build::execute(args, shell),
        Commands::Install(args) => commands::install::execute(args, shell),
        Commands::Clean(args) => commands::clean::execute(args, shell),
        Commands::Test(args) => commands::test::execute(args, shell),
        Commands::Scan(args) => commands::scan::execute(args, shell),
        Commands::Makefiles(args) => commands::makefiles::execute(args, shell),
        Commands::Dist(args) => commands::dist::execute(args, shell),
        Commands::Fmt(args) => commands::fmt::execute(args, shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
