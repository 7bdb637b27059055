// LOADSWEEP RESULT SINK
// ONE CSV PER SWEEP: HEADER ONCE, THEN ONE ROW PER CONFIGURATION IN SWEEP ORDER.
// FLUSHED AFTER EVERY ROW SO AN INTERRUPTED SWEEP KEEPS WHAT IT MEASURED.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::sweep::ConfigurationResult;

// COLUMN NAMES ARE READ BY THE PLOTTING SCRIPTS. DO NOT RENAME.
pub const HEADER: [&str; 5] = ["concurrency", "requests", "rps", "tpr", "transfer"];

pub struct ResultSink<W: Write> {
    writer: Writer<W>,
    rows: usize,
}

impl ResultSink<File> {
    // TRUNCATES ANY PREVIOUS FILE
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("cannot open {} for writing", path.display()))?;
        Self::from_writer(file)
    }
}

impl<W: Write> ResultSink<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = Writer::from_writer(inner);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn append(&mut self, result: &ConfigurationResult) -> Result<()> {
        self.writer.write_record([
            result.concurrency.to_string(),
            result.requests.to_string(),
            format_value(result.rps),
            format_value(result.tpr_ms),
            format_value(result.transfer_rate),
        ])?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing results: {}", e.error()))
    }
}

// SHORTEST ROUND-TRIP FORM WITH A DECIMAL POINT: 500.0, 2.0, 0.25.
// EMPTY CELL WHEN NO SUCCESSFUL TRIAL REPORTED THE METRIC.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:?}", v),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(concurrency: u32, rps: f64) -> ConfigurationResult {
        ConfigurationResult {
            concurrency,
            requests: 1000,
            rps: Some(rps),
            tpr_ms: Some(2.0),
            transfer_rate: Some(1000.0),
            successes: 1,
            trials: 1,
        }
    }

    fn render(rows: &[ConfigurationResult]) -> String {
        let mut sink = ResultSink::from_writer(Vec::new()).unwrap();
        for r in rows {
            sink.append(r).unwrap();
        }
        String::from_utf8(sink.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn header_only_when_empty() {
        assert_eq!(render(&[]), "concurrency,requests,rps,tpr,transfer\n");
    }

    #[test]
    fn rows_keep_append_order() {
        let out = render(&[row(50, 10.0), row(1, 900.5)]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "50,1000,10.0,2.0,1000.0");
        assert_eq!(lines[2], "1,1000,900.5,2.0,1000.0");
    }

    #[test]
    fn floats_are_plain_decimal() {
        assert_eq!(format_value(Some(500.0)), "500.0");
        assert_eq!(format_value(Some(0.25)), "0.25");
        assert_eq!(format_value(Some(4329.12)), "4329.12");
        assert_eq!(format_value(None), "");
    }

    #[test]
    fn missing_metric_is_empty_cell() {
        let mut r = row(5, 1.0);
        r.tpr_ms = None;
        let out = render(&[r]);
        assert_eq!(out.lines().nth(1), Some("5,1000,1.0,,1000.0"));
    }
}
