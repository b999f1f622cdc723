//! CLI entry point.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use narrate_cli::{Cli, CliError, Commands, bootstrap, handlers};

fn main() -> ExitCode {
    // Load environment variables before clap reads its `env` fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    bootstrap::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Speak(args) => {
            let config = bootstrap::load_config(cli.config.as_deref())?;
            handlers::speak::execute(config, &args)?;
        }
        Commands::Voices => handlers::voices::execute()?,
        Commands::Sentences { file } => handlers::sentences::execute(file.as_deref())?,
    }

    Ok(())
}
