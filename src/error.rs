// LOADSWEEP TRIAL ERRORS
// EVERYTHING HERE IS FATAL TO ONE TRIAL ONLY. THE SWEEP RECORDS IT AND MOVES ON.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("no free port after {attempts} attempts")]
    NoFreePort { attempts: u32 },

    #[error("failed to spawn server {}: {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch load tool {}: {source}", .tool.display())]
    ToolLaunch {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("load tool exited with {}", exit_label(.code))]
    ToolExit { code: Option<i32> },

    #[error("report contained no recognised metrics")]
    NoMetrics,
}

impl TrialError {
    // SHORT LABEL FOR SUMMARY TABLES
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoFreePort { .. } => "allocation",
            Self::Spawn { .. } => "spawn",
            Self::ToolLaunch { .. } | Self::ToolExit { .. } => "tool",
            Self::NoMetrics => "parse",
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {}", c),
        None => "a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_exit_message_names_code() {
        let e = TrialError::ToolExit { code: Some(22) };
        assert_eq!(e.to_string(), "load tool exited with code 22");
        let e = TrialError::ToolExit { code: None };
        assert_eq!(e.to_string(), "load tool exited with a signal");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(TrialError::NoFreePort { attempts: 3 }.kind(), "allocation");
        assert_eq!(TrialError::NoMetrics.kind(), "parse");
        assert_eq!(TrialError::ToolExit { code: Some(1) }.kind(), "tool");
    }
}
