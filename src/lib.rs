// LOADSWEEP -- BENCHMARK ORCHESTRATION HARNESS
// LAUNCHES A SERVER-UNDER-TEST, DRIVES IT WITH AN EXTERNAL LOAD TOOL ACROSS A
// MATRIX OF CONCURRENCY LEVELS, AVERAGES REPEATED TRIALS, WRITES ONE CSV ROW
// PER LEVEL FOR THE PLOTTING SCRIPTS.

pub mod config;
pub mod error;
pub mod event;
pub mod port;
pub mod process;
pub mod report;
pub mod sink;
pub mod sweep;
pub mod trial;
