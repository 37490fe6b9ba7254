//! System-bus energy reader.
//!
//! Reads an INA3221-style power monitor attribute exposed under
//! `/sys/bus/i2c`: a single integer per read.

use std::collections::BTreeSet;

use crate::collector::procfs::parser::{ParseError, parse_single_value};
use crate::collector::reader::{RawSample, ReaderKind, SourceReader};

/// Default power monitor attribute (Jetson-class boards, rail 0).
pub const DEFAULT_ENERGY_PATH: &str = "/sys/bus/i2c/drivers/ina3221x/1-0040/iio:device0/in_power0_input";

const ENERGY: &str = "energy";

/// Reader for the system-bus energy attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusEnergyReader;

impl BusEnergyReader {
    pub fn new() -> Self {
        Self
    }
}

impl SourceReader for BusEnergyReader {
    fn parse(&self, content: &str, keys: &BTreeSet<String>) -> Result<Vec<RawSample>, ParseError> {
        if let Some(key) = keys.iter().find(|key| key.as_str() != ENERGY) {
            return Err(ParseError::new(format!("unknown energy key {}", key)));
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let value = parse_single_value(content, ENERGY)?;
        Ok(vec![RawSample::new(ReaderKind::BusEnergy.topic(ENERGY), value)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_energy_reading() {
        let samples = BusEnergyReader::new().parse("4125\n", &keys(&["energy"])).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].topic.as_str(), "perf.sys.bus.energy");
        assert_eq!(samples[0].value, 4125);
    }

    #[test]
    fn test_malformed_reading_is_error() {
        assert!(BusEnergyReader::new().parse("", &keys(&["energy"])).is_err());
        assert!(BusEnergyReader::new().parse("-\n", &keys(&["energy"])).is_err());
    }

    #[test]
    fn test_unknown_key_is_error() {
        assert!(BusEnergyReader::new().parse("1\n", &keys(&["voltage"])).is_err());
    }
}
