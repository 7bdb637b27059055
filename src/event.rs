// LOADSWEEP EVENT LOG
// STRUCTURED EVENTS AT TRIAL AND CONFIGURATION BOUNDARIES.
// TracingSink RENDERS THEM AS LOG LINES AS THEY HAPPEN. EventLog KEEPS
// THEM FOR THE END-OF-RUN SUMMARY (AND FOR TESTS).

use tracing::{debug, info, warn};

use crate::report::TrialMetrics;
use crate::sweep::ConfigurationResult;

#[derive(Clone, Debug, PartialEq)]
pub enum SweepEvent {
    ConfigurationStarted {
        concurrency: u32,
        repeats: u32,
    },
    // BEFORE THE PORT IS ALLOCATED, SO EVERY TrialFailed HAS A START
    TrialStarted {
        concurrency: u32,
        trial: u32,
        repeats: u32,
    },
    PortAllocated {
        concurrency: u32,
        trial: u32,
        port: u16,
        url: String,
    },
    TrialSucceeded {
        concurrency: u32,
        trial: u32,
        metrics: TrialMetrics,
    },
    TrialFailed {
        concurrency: u32,
        trial: u32,
        kind: &'static str,
        reason: String,
    },
    ConfigurationCompleted {
        result: ConfigurationResult,
    },
    ConfigurationSkipped {
        concurrency: u32,
        trials: u32,
    },
}

pub trait EventSink {
    fn emit(&mut self, event: &SweepEvent);
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &SweepEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &SweepEvent) {
        (**self).emit(event);
    }
}

// DISCARDS EVERYTHING
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &SweepEvent) {}
}

pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &SweepEvent) {
        match event {
            SweepEvent::ConfigurationStarted { concurrency, repeats } => {
                info!(concurrency, repeats, "=== CONCURRENCY {} ===", concurrency);
            }
            SweepEvent::TrialStarted { concurrency, trial, repeats } => {
                info!(concurrency, trial, "trial {}/{}", trial, repeats);
            }
            SweepEvent::PortAllocated { concurrency, trial, port, url } => {
                debug!(concurrency, trial, port, "target {}", url);
            }
            SweepEvent::TrialSucceeded { concurrency, trial, metrics } => {
                info!(
                    concurrency,
                    trial,
                    rps = ?metrics.rps,
                    tpr_ms = ?metrics.tpr_ms,
                    transfer = ?metrics.transfer_rate,
                    failed = ?metrics.failed,
                    "trial ok"
                );
            }
            SweepEvent::TrialFailed { concurrency, trial, kind, reason } => {
                warn!(concurrency, trial, kind, "trial failed: {}", reason);
            }
            SweepEvent::ConfigurationCompleted { result } => {
                info!(
                    concurrency = result.concurrency,
                    ok = result.successes,
                    trials = result.trials,
                    rps = ?result.rps,
                    tpr_ms = ?result.tpr_ms,
                    transfer = ?result.transfer_rate,
                    "configuration done"
                );
            }
            SweepEvent::ConfigurationSkipped { concurrency, trials } => {
                warn!(concurrency, trials, "no successful trials, configuration skipped");
            }
        }
    }
}

#[derive(Default)]
pub struct EventLog {
    events: Vec<SweepEvent>,
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &SweepEvent) {
        self.events.push(event.clone());
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SweepEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    // (TRIALS SUCCEEDED, TRIALS FAILED)
    pub fn trial_counts(&self) -> (usize, usize) {
        let ok = self.events.iter()
            .filter(|e| matches!(e, SweepEvent::TrialSucceeded { .. }))
            .count();
        let failed = self.events.iter()
            .filter(|e| matches!(e, SweepEvent::TrialFailed { .. }))
            .count();
        (ok, failed)
    }

    // FAILURE COUNT PER TrialError KIND, IN FIRST-SEEN ORDER
    pub fn failure_kinds(&self) -> Vec<(&'static str, usize)> {
        let mut kinds: Vec<(&'static str, usize)> = Vec::new();
        for e in &self.events {
            if let SweepEvent::TrialFailed { kind, .. } = e {
                match kinds.iter().position(|(k, _)| k == kind) {
                    Some(i) => kinds[i].1 += 1,
                    None => kinds.push((*kind, 1)),
                }
            }
        }
        kinds
    }

    // ONE LINE PER CONFIGURATION, IN SWEEP ORDER
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "{:>11} {:>7} {:>12} {:>10} {:>12}",
            "CONCURRENCY", "OK", "RPS", "TPR_MS", "TRANSFER"
        ));
        lines.push(format!(
            "{} {} {} {} {}",
            "-".repeat(11),
            "-".repeat(7),
            "-".repeat(12),
            "-".repeat(10),
            "-".repeat(12),
        ));
        for e in &self.events {
            match e {
                SweepEvent::ConfigurationCompleted { result } => {
                    lines.push(format!(
                        "{:>11} {:>7} {:>12} {:>10} {:>12}",
                        result.concurrency,
                        format!("{}/{}", result.successes, result.trials),
                        cell(result.rps, 1),
                        cell(result.tpr_ms, 2),
                        cell(result.transfer_rate, 1),
                    ));
                }
                SweepEvent::ConfigurationSkipped { concurrency, trials } => {
                    lines.push(format!(
                        "{:>11} {:>7} {:>12}",
                        concurrency,
                        format!("0/{}", trials),
                        "SKIPPED"
                    ));
                }
                _ => {}
            }
        }
        lines
    }

    pub fn summary(&self) {
        let (ok, failed) = self.trial_counts();
        if ok + failed == 0 {
            return;
        }

        println!("\n{}", "=".repeat(56));
        println!("LOADSWEEP SUMMARY");
        println!("{}", "=".repeat(56));
        for line in self.summary_lines() {
            println!("{}", line);
        }
        println!();
        println!("  TRIALS:            {} ok / {} failed", ok, failed);
        for (kind, n) in self.failure_kinds() {
            println!("  {:<19}{}", format!("{} FAILURES:", kind.to_uppercase()), n);
        }
    }
}

fn cell(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}
