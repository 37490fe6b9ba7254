//! `/proc/stat` reader: aggregate and per-core CPU times, interrupt and
//! context-switch counters.
//!
//! One pass reads, in order: the aggregate `cpu` line, one `cpuN` line per
//! core, then skips forward to the `intr` record and reads the `ctxt`
//! record right after it.

use std::collections::BTreeSet;

use crate::collector::procfs::parser::{ParseError, count_cores, cpu_column, is_core_label, parse_field};
use crate::collector::reader::{RawSample, ReaderKind, SourceReader};

/// Keys of the `/proc/stat` trailer records rather than CPU columns.
const INTR: &str = "intr";
const CTXT: &str = "ctxt";

/// Reader for `/proc/stat`.
///
/// The number of per-core lines is fixed when the reader is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcStatReader {
    cores: usize,
}

impl ProcStatReader {
    pub fn new(cores: usize) -> Self {
        Self { cores }
    }

    /// Builds a reader with the core count found in `content`.
    pub fn detect(content: &str) -> Self {
        Self::new(count_cores(content))
    }

    pub fn cores(&self) -> usize {
        self.cores
    }
}

impl SourceReader for ProcStatReader {
    fn parse(&self, content: &str, keys: &BTreeSet<String>) -> Result<Vec<RawSample>, ParseError> {
        let kind = ReaderKind::ProcStat;
        let cpu_keys = keys
            .iter()
            .map(String::as_str)
            .filter(|key| *key != INTR && *key != CTXT)
            .map(|key| {
                cpu_column(key)
                    .map(|idx| (key, idx))
                    .ok_or_else(|| ParseError::new(format!("unknown /proc/stat key {}", key)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let want_intr = keys.contains(INTR);
        let want_ctxt = keys.contains(CTXT);

        let mut samples = Vec::with_capacity(cpu_keys.len() * (self.cores + 1) + 2);
        let mut lines = content.lines();

        let aggregate = lines
            .next()
            .ok_or_else(|| ParseError::new("missing aggregate cpu line"))?;
        let fields: Vec<&str> = aggregate.split_whitespace().collect();
        if fields.first() != Some(&"cpu") {
            return Err(ParseError::new(format!(
                "expected aggregate cpu line, got {:?}",
                aggregate
            )));
        }
        for &(key, idx) in &cpu_keys {
            let value = parse_field(&fields, idx, key)?;
            samples.push(RawSample::new(kind.topic(key), value));
        }

        for core in 0..self.cores {
            let line = lines
                .next()
                .ok_or_else(|| ParseError::new(format!("missing line for core {}", core)))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let label = fields.first().copied().unwrap_or_default();
            if !is_core_label(label) {
                return Err(ParseError::new(format!(
                    "expected line for core {}, got {:?}",
                    core, line
                )));
            }
            for &(key, idx) in &cpu_keys {
                let value = parse_field(&fields, idx, key)?;
                samples.push(RawSample::new(kind.scoped_topic(label, key), value));
            }
        }

        if !want_intr && !want_ctxt {
            return Ok(samples);
        }

        let intr = lines
            .by_ref()
            .find(|line| line.split_whitespace().next() == Some(INTR))
            .ok_or_else(|| ParseError::new("missing intr record"))?;
        if want_intr {
            let fields: Vec<&str> = intr.split_whitespace().collect();
            samples.push(RawSample::new(kind.topic(INTR), parse_field(&fields, 1, INTR)?));
        }

        let ctxt = lines
            .next()
            .ok_or_else(|| ParseError::new("missing ctxt record"))?;
        if want_ctxt {
            let fields: Vec<&str> = ctxt.split_whitespace().collect();
            if fields.first() != Some(&CTXT) {
                return Err(ParseError::new(format!(
                    "expected ctxt record after intr, got {:?}",
                    ctxt
                )));
            }
            samples.push(RawSample::new(kind.topic(CTXT), parse_field(&fields, 1, CTXT)?));
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::proc_stat_fixture;

    const STAT: &str = "\
cpu  10000 500 3000 80000 1000 200 100 7 0 0
cpu0 2500 125 750 20000 250 50 25 1 0 0
cpu1 2600 126 751 20001 251 51 26 2 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
";

    fn keys(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn topics(samples: &[RawSample]) -> Vec<&str> {
        samples.iter().map(|s| s.topic.as_str()).collect()
    }

    #[test]
    fn test_detect_cores() {
        assert_eq!(ProcStatReader::detect(STAT).cores(), 2);
        assert_eq!(ProcStatReader::detect(&proc_stat_fixture(8, 0)).cores(), 8);
    }

    #[test]
    fn test_user_yields_aggregate_plus_one_per_core() {
        for cores in [1, 4, 16] {
            let content = proc_stat_fixture(cores, 0);
            let samples = ProcStatReader::new(cores).parse(&content, &keys(&["user"])).unwrap();
            assert_eq!(samples.len(), cores + 1);
            assert_eq!(samples[0].topic.as_str(), "perf.proc.stat.user");
            assert_eq!(samples[cores].topic.to_string(), format!("perf.proc.stat.cpu{}.user", cores - 1));
        }
    }

    #[test]
    fn test_all_keys() {
        let all = keys(&[
            "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal", "intr", "ctxt",
        ]);
        let samples = ProcStatReader::new(2).parse(STAT, &all).unwrap();

        // 8 cpu columns × 3 lines + intr + ctxt
        assert_eq!(samples.len(), 26);
        let find = |topic: &str| samples.iter().find(|s| s.topic.as_str() == topic).unwrap().value;
        assert_eq!(find("perf.proc.stat.user"), 10000);
        assert_eq!(find("perf.proc.stat.steal"), 7);
        assert_eq!(find("perf.proc.stat.cpu1.idle"), 20001);
        assert_eq!(find("perf.proc.stat.cpu0.softirq"), 25);
        assert_eq!(find("perf.proc.stat.intr"), 1000000);
        assert_eq!(find("perf.proc.stat.ctxt"), 500000);
    }

    #[test]
    fn test_sample_order_is_line_then_key() {
        let samples = ProcStatReader::new(1)
            .parse(STAT, &keys(&["nice", "user", "ctxt"]))
            .unwrap();
        assert_eq!(
            topics(&samples),
            vec![
                "perf.proc.stat.nice",
                "perf.proc.stat.user",
                "perf.proc.stat.cpu0.nice",
                "perf.proc.stat.cpu0.user",
                "perf.proc.stat.ctxt",
            ]
        );
    }

    #[test]
    fn test_trailer_only() {
        let samples = ProcStatReader::new(2).parse(STAT, &keys(&["intr"])).unwrap();
        assert_eq!(topics(&samples), vec!["perf.proc.stat.intr"]);
    }

    #[test]
    fn test_skips_lines_before_intr() {
        let content = "\
cpu  1 2 3 4 5 6 7 8 0 0
cpu0 1 2 3 4 5 6 7 8 0 0
cpu1 1 2 3 4 5 6 7 8 0 0
intr 42 0
ctxt 99
";
        // Reader built for one core: the second core line is skipped.
        let samples = ProcStatReader::new(1)
            .parse(content, &keys(&["intr", "ctxt"]))
            .unwrap();
        assert_eq!(samples[0].value, 42);
        assert_eq!(samples[1].value, 99);
    }

    #[test]
    fn test_offline_core_keeps_kernel_label() {
        let content = "\
cpu  2 2 2 2 2 2 2 2 0 0
cpu0 1 1 1 1 1 1 1 1 0 0
cpu2 1 1 1 1 1 1 1 1 0 0
intr 1
ctxt 1
";
        let samples = ProcStatReader::detect(content).parse(content, &keys(&["idle"])).unwrap();
        assert_eq!(samples[2].topic.as_str(), "perf.proc.stat.cpu2.idle");
    }

    #[test]
    fn test_truncated_core_line_is_error() {
        let content = "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750
intr 1
ctxt 1
";
        let err = ProcStatReader::new(1).parse(content, &keys(&["idle"])).unwrap_err();
        assert!(err.message.contains("truncated"));
    }

    #[test]
    fn test_missing_core_line_is_error() {
        let content = "cpu  1 2 3 4 5 6 7 8 0 0\n";
        let err = ProcStatReader::new(2).parse(content, &keys(&["user"])).unwrap_err();
        assert!(err.message.contains("missing line for core 0"));
    }

    #[test]
    fn test_core_line_replaced_by_trailer_is_error() {
        let err = ProcStatReader::new(3).parse(STAT, &keys(&["user"])).unwrap_err();
        assert!(err.message.contains("expected line for core 2"));
    }

    #[test]
    fn test_missing_aggregate_is_error() {
        assert!(ProcStatReader::new(0).parse("", &keys(&["user"])).is_err());
        assert!(ProcStatReader::new(0).parse("cpu0 1 2 3\n", &keys(&["user"])).is_err());
    }

    #[test]
    fn test_missing_intr_is_error_only_when_requested() {
        let content = "cpu  1 2 3 4 5 6 7 8 0 0\n";
        assert!(ProcStatReader::new(0).parse(content, &keys(&["user"])).is_ok());
        let err = ProcStatReader::new(0).parse(content, &keys(&["intr"])).unwrap_err();
        assert!(err.message.contains("missing intr"));
    }

    #[test]
    fn test_ctxt_must_follow_intr() {
        let content = "\
cpu  1 2 3 4 5 6 7 8 0 0
intr 5
btime 1700000000
";
        let err = ProcStatReader::new(0).parse(content, &keys(&["ctxt"])).unwrap_err();
        assert!(err.message.contains("expected ctxt"));
    }

    #[test]
    fn test_unknown_key_is_error() {
        assert!(ProcStatReader::new(0).parse(STAT, &keys(&["guest"])).is_err());
    }
}
