// LOADSWEEP REPORT PARSER
// EXTRACTS LABELED NUMBERS FROM THE LOAD TOOL'S HUMAN-READABLE REPORT.
// ONE PATTERN PER METRIC, FIRST MATCH WINS. A MISSING METRIC IS None,
// NEVER 0.0, AND NEVER AFFECTS THE OTHERS.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Metric {
    RequestsPerSecond,
    TimePerRequest,
    TransferRate,
    FailedRequests,
    CompleteRequests,
    TimeTaken,
    Concurrency,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::RequestsPerSecond,
        Metric::TimePerRequest,
        Metric::TransferRate,
        Metric::FailedRequests,
        Metric::CompleteRequests,
        Metric::TimeTaken,
        Metric::Concurrency,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::RequestsPerSecond => "rps",
            Self::TimePerRequest => "tpr",
            Self::TransferRate => "tr",
            Self::FailedRequests => "fail",
            Self::CompleteRequests => "done",
            Self::TimeTaken => "time",
            Self::Concurrency => "conc",
        }
    }

    // LABELS ARE VERBATIM FROM THE LOAD TOOL. "Time per request" APPEARS
    // TWICE; ONLY THE LINE ENDING IN "(mean)" IS THE PER-REQUEST MEAN.
    fn pattern(self) -> &'static str {
        match self {
            Self::RequestsPerSecond => r"Requests per second:\s*([\d.]+)",
            Self::TimePerRequest => r"Time per request:\s*([\d.]+) \[ms\] \(mean\)",
            Self::TransferRate => r"Transfer rate:\s*([\d.]+)",
            Self::FailedRequests => r"Failed requests:\s*(\d+)",
            Self::CompleteRequests => r"Complete requests:\s*(\d+)",
            Self::TimeTaken => r"Time taken for tests:\s*([\d.]+)",
            Self::Concurrency => r"Concurrency Level:\s*(\d+)",
        }
    }
}

fn patterns() -> &'static [(Metric, Regex)] {
    static PATTERNS: OnceLock<Vec<(Metric, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        Metric::ALL
            .iter()
            .map(|&m| {
                // PATTERNS ARE COMPILE-TIME CONSTANTS; COVERED BY TESTS
                let re = Regex::new(m.pattern()).expect("metric pattern is valid");
                (m, re)
            })
            .collect()
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrialMetrics {
    pub rps: Option<f64>,
    pub tpr_ms: Option<f64>,
    pub transfer_rate: Option<f64>,
    pub failed: Option<f64>,
    pub complete: Option<f64>,
    pub elapsed_s: Option<f64>,
    pub concurrency: Option<f64>,
}

impl TrialMetrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::RequestsPerSecond => self.rps,
            Metric::TimePerRequest => self.tpr_ms,
            Metric::TransferRate => self.transfer_rate,
            Metric::FailedRequests => self.failed,
            Metric::CompleteRequests => self.complete,
            Metric::TimeTaken => self.elapsed_s,
            Metric::Concurrency => self.concurrency,
        }
    }

    fn slot(&mut self, metric: Metric) -> &mut Option<f64> {
        match metric {
            Metric::RequestsPerSecond => &mut self.rps,
            Metric::TimePerRequest => &mut self.tpr_ms,
            Metric::TransferRate => &mut self.transfer_rate,
            Metric::FailedRequests => &mut self.failed,
            Metric::CompleteRequests => &mut self.complete,
            Metric::TimeTaken => &mut self.elapsed_s,
            Metric::Concurrency => &mut self.concurrency,
        }
    }

    // (METRIC, VALUE) FOR EVERY FIELD THAT WAS FOUND, IN Metric::ALL ORDER
    pub fn present(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL
            .into_iter()
            .filter_map(move |m| self.get(m).map(|v| (m, v)))
    }

    // NO FIELDS AT ALL == PARSE FAILURE, EVEN IF THE TOOL EXITED 0
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

pub fn parse_report(text: &str) -> TrialMetrics {
    let mut metrics = TrialMetrics::default();
    for (metric, re) in patterns() {
        let value = re
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        *metrics.slot(*metric) = value;
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    // TRIMMED ApacheBench 2.3 OUTPUT
    const AB_REPORT: &str = "\
This is ApacheBench, Version 2.3 <$Revision: 1903618 $>
Benchmarking 127.0.0.1 (be patient)

Server Software:
Server Hostname:        127.0.0.1
Server Port:            23456

Document Path:          /
Document Length:        612 bytes

Concurrency Level:      10
Time taken for tests:   0.231 seconds
Complete requests:      1000
Failed requests:        0
Total transferred:      845000 bytes
HTML transferred:       612000 bytes
Requests per second:    4329.00 [#/sec] (mean)
Time per request:       2.310 [ms] (mean)
Time per request:       0.231 [ms] (mean, across all concurrent requests)
Transfer rate:          3572.31 [Kbytes/sec] received
";

    #[test]
    fn parses_full_report() {
        let m = parse_report(AB_REPORT);
        assert_eq!(m.rps, Some(4329.0));
        assert_eq!(m.tpr_ms, Some(2.31));
        assert_eq!(m.transfer_rate, Some(3572.31));
        assert_eq!(m.failed, Some(0.0));
        assert_eq!(m.complete, Some(1000.0));
        assert_eq!(m.elapsed_s, Some(0.231));
        assert_eq!(m.concurrency, Some(10.0));
        assert_eq!(m.present().count(), 7);
    }

    #[test]
    fn tpr_uses_mean_line_not_across_all() {
        let text = "Time per request:       0.231 [ms] (mean, across all concurrent requests)\n\
                    Time per request:       2.310 [ms] (mean)\n";
        assert_eq!(parse_report(text).tpr_ms, Some(2.31));
    }

    #[test]
    fn first_occurrence_wins() {
        let text = "Requests per second: 10.5\nRequests per second: 99.0\n";
        assert_eq!(parse_report(text).rps, Some(10.5));
    }

    #[test]
    fn zero_is_distinct_from_missing() {
        let m = parse_report("Failed requests:        0\n");
        assert_eq!(m.failed, Some(0.0));
        assert_eq!(m.rps, None);
        assert!(!m.is_empty());
    }

    #[test]
    fn subset_yields_exactly_those_keys() {
        let text = "Transfer rate:          12.5 [Kbytes/sec] received\n\
                    Concurrency Level:      4\n";
        let m = parse_report(text);
        let keys: Vec<&str> = m.present().map(|(k, _)| k.key()).collect();
        assert_eq!(keys, ["tr", "conc"]);
        assert_eq!(m.transfer_rate, Some(12.5));
        assert_eq!(m.concurrency, Some(4.0));
    }

    #[test]
    fn every_single_label_parses_alone() {
        let lines = [
            (Metric::RequestsPerSecond, "Requests per second:    123.45 [#/sec] (mean)"),
            (Metric::TimePerRequest, "Time per request:       8.100 [ms] (mean)"),
            (Metric::TransferRate, "Transfer rate:          77.7 [Kbytes/sec] received"),
            (Metric::FailedRequests, "Failed requests:        3"),
            (Metric::CompleteRequests, "Complete requests:      500"),
            (Metric::TimeTaken, "Time taken for tests:   1.500 seconds"),
            (Metric::Concurrency, "Concurrency Level:      50"),
        ];
        for (metric, line) in lines {
            let m = parse_report(line);
            let present: Vec<Metric> = m.present().map(|(k, _)| k).collect();
            assert_eq!(present, [metric], "line: {}", line);
        }
    }

    #[test]
    fn garbage_is_empty() {
        assert!(parse_report("").is_empty());
        assert!(parse_report("apr_socket_recv: Connection refused (111)").is_empty());
    }

    #[test]
    fn malformed_number_is_missing() {
        let m = parse_report("Requests per second:    1.2.3\nConcurrency Level: 2\n");
        assert_eq!(m.rps, None);
        assert_eq!(m.concurrency, Some(2.0));
    }

    #[test]
    fn parse_is_pure() {
        assert_eq!(parse_report(AB_REPORT), parse_report(AB_REPORT));
    }
}
