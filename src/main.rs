//! TaskWing CLI entry point: parse, special-case commands that don't need
//! the full service graph, load config, dispatch.

use anyhow::Result;
use clap::Parser;

use taskwing::cli::commands::{bootstrap, init, repair, serve};
use taskwing::cli::output::output_error;
use taskwing::cli::{Cli, Commands};
use taskwing::infrastructure::config::ConfigLoader;
use taskwing::infrastructure::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        return init::execute(force, cli.json).await;
    }

    let config = ConfigLoader::load().unwrap_or_default();
    if !cli.quiet {
        if let Err(err) = logging::init(&config.logging) {
            eprintln!("warning: logging not initialized: {err}");
        }
    }

    let dry_run = cli.preview;
    let result = match cli.command {
        Commands::Init { .. } => unreachable!("Init is handled before config load"),
        Commands::Serve => serve::execute(config).await,
        Commands::Bootstrap { goal } => bootstrap::execute(config, goal, cli.json).await,
        Commands::Repair { confirm, dry_run: explicit_dry_run } => {
            repair::execute(confirm, dry_run || explicit_dry_run, cli.json).await
        }
    };

    if let Err(err) = result {
        if let Some(taskwing_err) = err.downcast_ref::<taskwing::TaskWingError>() {
            output_error(taskwing_err, cli.json);
            std::process::exit(exit_code_for(taskwing_err));
        }
        if cli.verbose {
            eprintln!("error: {err:#}");
        } else {
            eprintln!("error: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Exit codes: 0 success, 1 generic failure, 130 cancelled, nonzero on
/// policy violation (Refusal/GateViolation).
fn exit_code_for(err: &taskwing::TaskWingError) -> i32 {
    match err {
        taskwing::TaskWingError::Cancelled(_) => 130,
        taskwing::TaskWingError::Refusal(_) | taskwing::TaskWingError::GateViolation(_) => 3,
        _ => 1,
    }
}
