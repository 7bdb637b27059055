pub mod check;
pub mod run;

use std::path::PathBuf;

use clap::Args;

use loadsweep::config::{
    DEFAULT_CONCURRENCY, DEFAULT_HOST, DEFAULT_OUTPUT, DEFAULT_PATH, DEFAULT_REPEATS,
    DEFAULT_REQUESTS, DEFAULT_SERVER_BINARY, DEFAULT_SERVER_LOG_LEVEL, DEFAULT_SERVER_WORKERS,
    DEFAULT_SETTLE_MS, DEFAULT_STOP_TIMEOUT_MS, DEFAULT_TOOL,
};

// SERVER-UNDER-TEST AND LOAD TOOL: SHARED BY `run` AND `check`
#[derive(Args, Clone)]
pub struct TargetArgs {
    // SERVER-UNDER-TEST BINARY
    #[arg(long, default_value = DEFAULT_SERVER_BINARY)]
    pub server: PathBuf,

    // LOAD TOOL (ApacheBench-COMPATIBLE)
    #[arg(long, default_value = DEFAULT_TOOL)]
    pub tool: PathBuf,

    // RESULTS CSV
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    // TOTAL REQUESTS PER TRIAL
    #[arg(short = 'n', long, default_value_t = DEFAULT_REQUESTS)]
    pub requests: u64,

    // CONCURRENCY LEVELS, TESTED IN THE ORDER GIVEN
    #[arg(short = 'c', long, num_args = 1.., default_values_t = DEFAULT_CONCURRENCY)]
    pub concurrency: Vec<u32>,

    // TRIALS PER CONCURRENCY LEVEL
    #[arg(short = 'r', long, default_value_t = DEFAULT_REPEATS)]
    pub repeats: u32,

    // PATH REQUESTED FROM THE SERVER
    #[arg(long = "file", default_value = DEFAULT_PATH)]
    pub path: String,

    // ADDRESS THE LOAD TOOL CONNECTS TO
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    // SERVER WORKER COUNT (-w)
    #[arg(long, default_value_t = DEFAULT_SERVER_WORKERS)]
    pub workers: u32,

    // SERVER LOG LEVEL (-l)
    #[arg(long, default_value = DEFAULT_SERVER_LOG_LEVEL)]
    pub log_level: String,

    // PAUSE AFTER SPAWNING THE SERVER BEFORE LOAD STARTS
    #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,

    // GRACE PERIOD BETWEEN SIGTERM AND SIGKILL
    #[arg(long, default_value_t = DEFAULT_STOP_TIMEOUT_MS)]
    pub stop_timeout_ms: u64,
}
