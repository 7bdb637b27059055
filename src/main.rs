// LOADSWEEP -- BENCHMARK ORCHESTRATION HARNESS
// SPAWNS THE SERVER-UNDER-TEST, DRIVES IT WITH ab ACROSS A CONCURRENCY MATRIX,
// WRITES ONE AVERAGED CSV ROW PER LEVEL

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cli::{RunArgs, TargetArgs};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "loadsweep")]
#[command(about = "LOADSWEEP -- SERVER BENCHMARK SWEEP OVER CONCURRENCY LEVELS")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    // DEBUG-LEVEL LOGGING (RUST_LOG OVERRIDES)
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    // RUN THE SWEEP AND WRITE THE RESULTS CSV
    Run(RunArgs),
    // VERIFY THE LOAD TOOL, SERVER BINARY AND OUTPUT LOCATION
    Check(TargetArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "loadsweep=debug" } else { "loadsweep=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Check(args) => cli::check::run_check(&args),
        Command::Run(args) => {
            // FIRST CTRL-C: FINISH STOPPING THE CURRENT SERVER, THEN EXIT.
            // THE SERVER RUNS IN ITS OWN PROCESS GROUP AND NEVER SEES IT.
            ctrlc::set_handler(move || {
                SHUTDOWN.store(true, Ordering::Relaxed);
            })
            .context("installing ctrl-c handler")?;

            cli::run::run_sweep_cmd(&args, &SHUTDOWN)?;
            if SHUTDOWN.load(Ordering::Relaxed) {
                println!("LOADSWEEP INTERRUPTED.");
            } else {
                println!("LOADSWEEP DONE.");
            }
            Ok(())
        }
    }
}
