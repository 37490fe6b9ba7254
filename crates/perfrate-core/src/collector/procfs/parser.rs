//! Field-level parsers for kernel pseudo-files.
//!
//! These are pure functions over string content so they can be tested
//! without any filesystem. Every failure is a `ParseError`: a short or
//! non-numeric counter field means the kernel interface cannot be trusted
//! for this tick.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Column of each CPU time field on a `/proc/stat` `cpu` line.
/// Column 0 is the `cpu`/`cpuN` label.
pub const CPU_COLUMNS: &[(&str, usize)] = &[
    ("user", 1),
    ("nice", 2),
    ("system", 3),
    ("idle", 4),
    ("iowait", 5),
    ("irq", 6),
    ("softirq", 7),
    ("steal", 8),
];

/// Returns the `/proc/stat` column of a CPU time key.
pub fn cpu_column(key: &str) -> Option<usize> {
    CPU_COLUMNS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|&(_, idx)| idx)
}

/// Parses the integer at `idx` of an already split line.
///
/// `name` only feeds the error message.
pub fn parse_field(fields: &[&str], idx: usize, name: &str) -> Result<u64, ParseError> {
    let raw = fields.get(idx).ok_or_else(|| {
        ParseError::new(format!(
            "truncated line: {} needs column {}, got {} fields",
            name,
            idx,
            fields.len()
        ))
    })?;
    raw.parse()
        .map_err(|_| ParseError::new(format!("invalid {}: {:?}", name, raw)))
}

/// Returns true for per-core `/proc/stat` labels (`cpu0`, `cpu17`, ...).
pub fn is_core_label(label: &str) -> bool {
    label
        .strip_prefix("cpu")
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

/// Counts the per-core lines of `/proc/stat` content.
pub fn count_cores(content: &str) -> usize {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|label| is_core_label(label))
        .count()
}

/// Looks up `Label:  value kB` lines of `/proc/meminfo` content.
///
/// Returns one value per requested label, in order. A requested label that
/// is absent or not an integer is an error; other lines are ignored.
pub fn parse_meminfo_fields(content: &str, labels: &[&str]) -> Result<Vec<u64>, ParseError> {
    let mut values: Vec<Option<u64>> = vec![None; labels.len()];

    for line in content.lines() {
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        let label = label.trim();
        let Some(slot) = labels.iter().position(|wanted| *wanted == label) else {
            continue;
        };
        let fields: Vec<&str> = rest.split_whitespace().collect();
        values[slot] = Some(parse_field(&fields, 0, label)?);
    }

    labels
        .iter()
        .zip(values)
        .map(|(label, value)| {
            value.ok_or_else(|| ParseError::new(format!("missing {} in meminfo", label)))
        })
        .collect()
}

/// Parses a single-value attribute file (sysfs style): the first token of
/// the first line.
pub fn parse_single_value(content: &str, name: &str) -> Result<u64, ParseError> {
    let line = content
        .lines()
        .next()
        .ok_or_else(|| ParseError::new(format!("empty {} file", name)))?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    parse_field(&fields, 0, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_column_mapping() {
        assert_eq!(cpu_column("user"), Some(1));
        assert_eq!(cpu_column("softirq"), Some(7));
        assert_eq!(cpu_column("steal"), Some(8));
        assert_eq!(cpu_column("guest"), None);
        assert_eq!(cpu_column("ctxt"), None);
    }

    #[test]
    fn test_parse_field() {
        let fields: Vec<&str> = "cpu 10 20 30".split_whitespace().collect();
        assert_eq!(parse_field(&fields, 2, "nice").unwrap(), 20);

        let err = parse_field(&fields, 5, "iowait").unwrap_err();
        assert!(err.message.contains("truncated"));
        assert!(err.message.contains("iowait"));

        let fields = ["cpu", "12x"];
        let err = parse_field(&fields, 1, "user").unwrap_err();
        assert!(err.message.contains("invalid user"));
    }

    #[test]
    fn test_negative_counter_rejected() {
        let fields = ["ctxt", "-5"];
        assert!(parse_field(&fields, 1, "ctxt").is_err());
    }

    #[test]
    fn test_is_core_label() {
        assert!(is_core_label("cpu0"));
        assert!(is_core_label("cpu127"));
        assert!(!is_core_label("cpu"));
        assert!(!is_core_label("cpux"));
        assert!(!is_core_label("ctxt"));
    }

    #[test]
    fn test_count_cores() {
        let content = "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50
ctxt 500000
";
        assert_eq!(count_cores(content), 2);
        assert_eq!(count_cores(""), 0);
    }

    #[test]
    fn test_parse_meminfo_fields() {
        let content = "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
Active(anon):    1024000 kB
HugePages_Total:       0
";
        let values =
            parse_meminfo_fields(content, &["MemFree", "Active(anon)", "HugePages_Total"]).unwrap();
        assert_eq!(values, vec![8192000, 1024000, 0]);
    }

    #[test]
    fn test_parse_meminfo_missing_label() {
        let content = "MemTotal:       16384000 kB\n";
        let err = parse_meminfo_fields(content, &["MemTotal", "Shmem"]).unwrap_err();
        assert!(err.message.contains("missing Shmem"));
    }

    #[test]
    fn test_parse_meminfo_empty_value() {
        let content = "MemTotal:\n";
        assert!(parse_meminfo_fields(content, &["MemTotal"]).is_err());
    }

    #[test]
    fn test_parse_single_value() {
        assert_eq!(parse_single_value("4123\n", "energy").unwrap(), 4123);
        assert!(parse_single_value("", "energy").is_err());
        assert!(parse_single_value("n/a\n", "energy").is_err());
    }
}
