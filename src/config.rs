// LOADSWEEP CONFIGURATION
// PURE TYPES: BUILT ONCE FROM THE CLI, NEVER MUTATED DURING A SWEEP.
// SHARED BETWEEN THE BINARY (cli/run.rs) AND THE LIB CRATE (tests)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

// SWEEP DEFAULTS

pub const DEFAULT_REQUESTS: u64 = 1000;
pub const DEFAULT_CONCURRENCY: [u32; 3] = [1, 10, 50];
pub const DEFAULT_REPEATS: u32 = 3;
pub const DEFAULT_PATH: &str = "/";
pub const DEFAULT_OUTPUT: &str = "ab_results.csv";
pub const DEFAULT_HOST: &str = "127.0.0.1";

// SERVER-UNDER-TEST DEFAULTS
// INVOKED AS: <binary> -l <log_level> -w <workers> -p <port>

pub const DEFAULT_SERVER_BINARY: &str = "./main.app";
pub const DEFAULT_SERVER_LOG_LEVEL: &str = "error";
pub const DEFAULT_SERVER_WORKERS: u32 = 8;

// LIFECYCLE HEURISTICS
// SETTLE IS NOT A READINESS HANDSHAKE. A SERVER THAT IS STILL BINDING WHEN
// THE LOAD TOOL CONNECTS SHOWS UP AS AN ORDINARY FAILED TRIAL.

pub const DEFAULT_SETTLE_MS: u64 = 400;
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 1000;

// LOAD TOOL
// INVOKED AS: <tool> -n <requests> -c <concurrency> <url>

pub const DEFAULT_TOOL: &str = "ab";

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub binary: PathBuf,
    pub log_level: String,
    pub workers: u32,
    pub settle_delay: Duration,
    pub stop_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_SERVER_BINARY),
            log_level: DEFAULT_SERVER_LOG_LEVEL.to_string(),
            workers: DEFAULT_SERVER_WORKERS,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            stop_timeout: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("server worker count must be at least 1");
        }
        if self.binary.as_os_str().is_empty() {
            bail!("server binary path is empty");
        }
        Ok(())
    }

    // FIXED OPERATIONAL FLAGS FOLLOWED BY THE PORT
    pub fn args(&self, port: u16) -> Vec<String> {
        vec![
            "-l".to_string(),
            self.log_level.clone(),
            "-w".to_string(),
            self.workers.to_string(),
            "-p".to_string(),
            port.to_string(),
        ]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SweepConfig {
    pub requests: u64,
    pub concurrency: Vec<u32>,
    pub repeats: u32,
    pub path: String,
    pub host: String,
    pub output: PathBuf,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            requests: DEFAULT_REQUESTS,
            concurrency: DEFAULT_CONCURRENCY.to_vec(),
            repeats: DEFAULT_REPEATS,
            path: DEFAULT_PATH.to_string(),
            host: DEFAULT_HOST.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.requests == 0 {
            bail!("request count must be at least 1");
        }
        if self.concurrency.is_empty() {
            bail!("at least one concurrency level is required");
        }
        for &c in &self.concurrency {
            if c == 0 {
                bail!("concurrency levels must be at least 1");
            }
        }
        if self.repeats == 0 {
            bail!("repeat count must be at least 1");
        }
        if !self.path.starts_with('/') {
            bail!("target path must start with '/' (got {:?})", self.path);
        }
        Ok(())
    }

    pub fn url(&self, port: u16) -> String {
        format!("http://{}:{}{}", self.host, port, self.path)
    }

    // LEVELS ABOVE THE REQUEST COUNT. ab REFUSES THEM, BUT THAT IS THE TOOL'S
    // CALL: THEY STILL RUN AND FAIL AS ORDINARY TRIALS.
    pub fn oversubscribed_levels(&self) -> Vec<u32> {
        self.concurrency
            .iter()
            .copied()
            .filter(|&c| u64::from(c) > self.requests)
            .collect()
    }

    pub fn total_trials(&self) -> u64 {
        self.concurrency.len() as u64 * u64::from(self.repeats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SweepConfig::default().validate().is_ok());
    }

    #[test]
    fn server_args_order() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.args(31337), ["-l", "error", "-w", "8", "-p", "31337"]);
    }

    #[test]
    fn url_joins_host_port_path() {
        let cfg = SweepConfig {
            path: "/index.html".to_string(),
            ..SweepConfig::default()
        };
        assert_eq!(cfg.url(20001), "http://127.0.0.1:20001/index.html");
    }

    #[test]
    fn concurrency_above_requests_is_flagged_not_rejected() {
        let cfg = SweepConfig {
            requests: 10,
            concurrency: vec![1, 50, 10, 11],
            ..SweepConfig::default()
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.oversubscribed_levels(), [50, 11]);
        assert!(SweepConfig::default().oversubscribed_levels().is_empty());
    }

    #[test]
    fn rejects_zero_repeats_and_empty_levels() {
        let cfg = SweepConfig { repeats: 0, ..SweepConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = SweepConfig { concurrency: vec![], ..SweepConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = SweepConfig { concurrency: vec![0], ..SweepConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_relative_path() {
        let cfg = SweepConfig { path: "index.html".to_string(), ..SweepConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn total_trials_is_levels_times_repeats() {
        assert_eq!(SweepConfig::default().total_trials(), 9);
    }
}
