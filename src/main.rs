//! CLI entry point for smart-selection.

use clap::{CommandFactory, Parser};
use color_eyre::eyre::{Result, bail};

use smart_selection::cli;
use smart_selection::cli_args::Cli;
use smart_selection::logging;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli_args = Cli::parse();

    if let Some(shell) = cli_args.completions {
        let mut command = Cli::command();
        let name = command.get_name().to_string();
        clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
        return Ok(());
    }

    let _guard = logging::init_logging(cli_args.log_path.as_deref(), Some(&cli_args.log_level));

    let Some(command) = &cli_args.command else {
        bail!("a subcommand is required (see --help)");
    };
    cli::run(&cli_args, command)
}
