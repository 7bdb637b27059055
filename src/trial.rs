// LOADSWEEP TRIAL RUNNER
// RUNS THE LOAD TOOL ONCE AGAINST A LIVE SERVER AND PARSES ITS REPORT.
// TOOL FAILURES ARE DATA HERE: EVERY OUTCOME COMES BACK AS A VALUE.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::TrialError;
use crate::report::{parse_report, TrialMetrics};

pub struct ToolOutput {
    // None WHEN THE TOOL WAS KILLED BY A SIGNAL
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait LoadTool {
    fn program(&self) -> &Path;

    fn run(&mut self, url: &str, requests: u64, concurrency: u32) -> io::Result<ToolOutput>;
}

// APACHE BENCH: <tool> -n <requests> -c <concurrency> <url>
pub struct ApacheBench {
    program: PathBuf,
}

impl ApacheBench {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn args(url: &str, requests: u64, concurrency: u32) -> Vec<String> {
        vec![
            "-n".to_string(),
            requests.to_string(),
            "-c".to_string(),
            concurrency.to_string(),
            url.to_string(),
        ]
    }
}

impl LoadTool for ApacheBench {
    fn program(&self) -> &Path {
        &self.program
    }

    fn run(&mut self, url: &str, requests: u64, concurrency: u32) -> io::Result<ToolOutput> {
        let output = Command::new(&self.program)
            .args(Self::args(url, requests, concurrency))
            .stdin(Stdio::null())
            .output()?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub fn run_trial<T: LoadTool + ?Sized>(
    tool: &mut T,
    url: &str,
    requests: u64,
    concurrency: u32,
) -> Result<TrialMetrics, TrialError> {
    debug!(url, requests, concurrency, "running load tool");
    let output = tool
        .run(url, requests, concurrency)
        .map_err(|source| TrialError::ToolLaunch {
            tool: tool.program().to_path_buf(),
            source,
        })?;

    if !output.success() {
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            debug!(code = ?output.code, stderr, "load tool failed");
        }
        return Err(TrialError::ToolExit { code: output.code });
    }

    let metrics = parse_report(&output.stdout);
    if metrics.is_empty() {
        return Err(TrialError::NoMetrics);
    }
    Ok(metrics)
}
