// LOADSWEEP SWEEP
// FOR EACH CONCURRENCY LEVEL, IN CONFIGURED ORDER:
//   RUN `repeats` TRIALS, EACH ONE ALLOCATE -> START -> LOAD -> STOP ON A FRESH SERVER
//   AVERAGE THE SUCCESSFUL TRIALS, OR SKIP THE LEVEL IF THERE WERE NONE
//
// STRICTLY SEQUENTIAL. EACH TRIAL OWNS THE ONLY SERVER AND THE ONLY PORT, AND
// TRIAL N+1 DOES NOT START UNTIL TRIAL N'S SERVER HAS BEEN STOPPED.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::info;

use crate::config::SweepConfig;
use crate::error::TrialError;
use crate::event::{EventSink, SweepEvent};
use crate::port::PortAllocator;
use crate::process::{Lifecycle, ProcessControl};
use crate::report::TrialMetrics;
use crate::sink::ResultSink;
use crate::trial::{run_trial, LoadTool};

#[derive(Clone, Debug, PartialEq)]
pub struct ConfigurationResult {
    pub concurrency: u32,
    // ALWAYS THE CONFIGURED REQUEST COUNT, NOT AN AVERAGE
    pub requests: u64,
    pub rps: Option<f64>,
    pub tpr_ms: Option<f64>,
    pub transfer_rate: Option<f64>,
    pub successes: u32,
    pub trials: u32,
}

// MEAN OF THE TRIALS THAT REPORTED THE FIELD. None IF NONE DID.
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / f64::from(n))
    }
}

// None WHEN NO TRIAL SUCCEEDED: THE LEVEL IS DROPPED FROM THE OUTPUT
pub fn aggregate(
    concurrency: u32,
    requests: u64,
    trials: u32,
    successes: &[TrialMetrics],
) -> Option<ConfigurationResult> {
    if successes.is_empty() {
        return None;
    }
    Some(ConfigurationResult {
        concurrency,
        requests,
        rps: mean(successes.iter().filter_map(|m| m.rps)),
        tpr_ms: mean(successes.iter().filter_map(|m| m.tpr_ms)),
        transfer_rate: mean(successes.iter().filter_map(|m| m.transfer_rate)),
        successes: successes.len() as u32,
        trials,
    })
}

// THE THREE CAPABILITIES A TRIAL NEEDS
pub struct Harness<P, T, A> {
    pub lifecycle: Lifecycle<P>,
    pub tool: T,
    pub ports: A,
}

impl<P, T, A> Harness<P, T, A>
where
    P: ProcessControl,
    T: LoadTool,
    A: PortAllocator,
{
    pub fn new(lifecycle: Lifecycle<P>, tool: T, ports: A) -> Self {
        Self { lifecycle, tool, ports }
    }

    // ONE FULL TRIAL. A SPAWNED SERVER IS ALWAYS STOPPED, WHATEVER THE LOAD TOOL DID.
    pub fn trial<E: EventSink + ?Sized>(
        &mut self,
        config: &SweepConfig,
        concurrency: u32,
        trial: u32,
        events: &mut E,
    ) -> Result<TrialMetrics, TrialError> {
        events.emit(&SweepEvent::TrialStarted {
            concurrency,
            trial,
            repeats: config.repeats,
        });
        let port = self.ports.allocate()?;
        let url = config.url(port);
        events.emit(&SweepEvent::PortAllocated {
            concurrency,
            trial,
            port,
            url: url.clone(),
        });

        let server = self.lifecycle.start(port)?;
        let outcome = run_trial(&mut self.tool, &url, config.requests, concurrency);
        self.lifecycle.stop(server);
        outcome
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepSummary {
    pub rows: usize,
    pub skipped: Vec<u32>,
    pub trials_run: u64,
    pub trials_ok: u64,
    pub interrupted: bool,
}

pub fn run_sweep<P, T, A, W, E>(
    config: &SweepConfig,
    harness: &mut Harness<P, T, A>,
    sink: &mut ResultSink<W>,
    events: &mut E,
    shutdown: &AtomicBool,
) -> Result<SweepSummary>
where
    P: ProcessControl,
    T: LoadTool,
    A: PortAllocator,
    W: Write,
    E: EventSink + ?Sized,
{
    let mut summary = SweepSummary::default();

    'levels: for &concurrency in &config.concurrency {
        if shutdown.load(Ordering::Relaxed) {
            summary.interrupted = true;
            break;
        }
        events.emit(&SweepEvent::ConfigurationStarted {
            concurrency,
            repeats: config.repeats,
        });

        let mut successes: Vec<TrialMetrics> = Vec::with_capacity(config.repeats as usize);
        for trial in 1..=config.repeats {
            if shutdown.load(Ordering::Relaxed) {
                summary.interrupted = true;
                break 'levels;
            }
            summary.trials_run += 1;
            match harness.trial(config, concurrency, trial, events) {
                Ok(metrics) => {
                    events.emit(&SweepEvent::TrialSucceeded { concurrency, trial, metrics });
                    summary.trials_ok += 1;
                    successes.push(metrics);
                }
                Err(e) => {
                    events.emit(&SweepEvent::TrialFailed {
                        concurrency,
                        trial,
                        kind: e.kind(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // CTRL-C DURING THE LAST TRIAL: THE LEVEL IS STILL PARTIAL
        if shutdown.load(Ordering::Relaxed) {
            summary.interrupted = true;
            break;
        }

        match aggregate(concurrency, config.requests, config.repeats, &successes) {
            Some(result) => {
                sink.append(&result)?;
                summary.rows += 1;
                events.emit(&SweepEvent::ConfigurationCompleted { result });
            }
            None => {
                summary.skipped.push(concurrency);
                events.emit(&SweepEvent::ConfigurationSkipped {
                    concurrency,
                    trials: config.repeats,
                });
            }
        }
    }

    if summary.interrupted {
        info!(
            rows = summary.rows,
            trials = summary.trials_run,
            "sweep interrupted, partial configuration discarded"
        );
    }
    Ok(summary)
}
