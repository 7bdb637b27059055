use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use loadsweep::config::{ServerConfig, SweepConfig};
use loadsweep::event::{EventLog, TracingSink};
use loadsweep::port::RandomPorts;
use loadsweep::process::{Lifecycle, SystemProcesses};
use loadsweep::sink::ResultSink;
use loadsweep::sweep::{run_sweep, Harness};
use loadsweep::trial::ApacheBench;

use super::RunArgs;

pub fn build_configs(args: &RunArgs) -> (SweepConfig, ServerConfig) {
    let sweep = SweepConfig {
        requests: args.requests,
        concurrency: args.concurrency.clone(),
        repeats: args.repeats,
        path: args.path.clone(),
        host: args.host.clone(),
        output: args.target.output.clone(),
    };
    let server = ServerConfig {
        binary: args.target.server.clone(),
        log_level: args.log_level.clone(),
        workers: args.workers,
        settle_delay: Duration::from_millis(args.settle_ms),
        stop_timeout: Duration::from_millis(args.stop_timeout_ms),
    };
    (sweep, server)
}

pub fn run_sweep_cmd(args: &RunArgs, shutdown: &AtomicBool) -> Result<()> {
    let (sweep, server) = build_configs(args);
    sweep.validate()?;
    server.validate()?;
    for c in sweep.oversubscribed_levels() {
        warn!(concurrency = c, requests = sweep.requests,
              "concurrency exceeds request count, the load tool will likely refuse this level");
    }

    println!("LOADSWEEP v{}", env!("CARGO_PKG_VERSION"));
    println!("SERVER:          {} (-l {} -w {})",
             server.binary.display(), server.log_level, server.workers);
    println!("LOAD TOOL:       {}", args.target.tool.display());
    println!("TARGET:          http://{}:<port>{}", sweep.host, sweep.path);
    println!("REQUESTS:        {}", sweep.requests);
    println!("CONCURRENCY:     {:?}", sweep.concurrency);
    println!("REPEATS:         {} ({} trials total)", sweep.repeats, sweep.total_trials());
    println!("SETTLE / STOP:   {} ms / {} ms",
             server.settle_delay.as_millis(), server.stop_timeout.as_millis());
    println!("OUTPUT:          {}", sweep.output.display());
    println!();

    // OPENED ONCE, BEFORE ANY SERVER IS STARTED: THE ONLY SWEEP-FATAL FAILURE
    let mut sink = ResultSink::create(&sweep.output)?;

    let mut harness = Harness::new(
        Lifecycle::new(SystemProcesses, server),
        ApacheBench::new(&args.target.tool),
        RandomPorts::new(),
    );
    let mut events = (TracingSink, EventLog::new());

    let summary = run_sweep(&sweep, &mut harness, &mut sink, &mut events, shutdown)?;

    events.1.summary();
    println!();
    println!("  ROWS WRITTEN:      {} -> {}", summary.rows, sweep.output.display());
    if !summary.skipped.is_empty() {
        println!("  SKIPPED LEVELS:    {:?}", summary.skipped);
    }
    if summary.interrupted {
        println!("  INTERRUPTED AFTER {} TRIALS", summary.trials_run);
    }
    Ok(())
}
