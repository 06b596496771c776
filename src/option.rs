//! Scan planning options.

use std::{collections::BTreeMap, time::Duration};

use crate::{
    observability::log_warn,
    table::{SPLIT_LOOKBACK, SPLIT_OPEN_FILE_COST, SPLIT_TARGET_SIZE},
};

const DEFAULT_SPLIT_TARGET_SIZE: u64 = 128 * 1024 * 1024;
const DEFAULT_OPEN_FILE_COST: u64 = 4 * 1024 * 1024;
const DEFAULT_SPLIT_LOOKBACK: usize = 10;

/// Knobs of merge-on-read scan planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub(crate) split_target_size: u64,
    pub(crate) open_file_cost: u64,
    pub(crate) split_lookback: usize,
    pub(crate) case_sensitive: bool,
    pub(crate) io_timeout: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            split_target_size: DEFAULT_SPLIT_TARGET_SIZE,
            open_file_cost: DEFAULT_OPEN_FILE_COST,
            split_lookback: DEFAULT_SPLIT_LOOKBACK,
            case_sensitive: true,
            io_timeout: None,
        }
    }
}

impl ScanOptions {
    /// Defaults overridden by the `read.split.*` table properties.
    ///
    /// Values that do not parse as positive integers are ignored.
    #[must_use]
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Self {
        let mut options = ScanOptions::default();
        if let Some(value) = positive_property(properties, SPLIT_TARGET_SIZE) {
            options.split_target_size = value;
        }
        if let Some(value) = positive_property(properties, SPLIT_OPEN_FILE_COST) {
            options.open_file_cost = value;
        }
        if let Some(value) = positive_property(properties, SPLIT_LOOKBACK) {
            options.split_lookback = usize::try_from(value).unwrap_or(usize::MAX);
        }
        options
    }

    /// Target total weight of one combined scan task. Zero is raised to one.
    #[must_use]
    pub fn split_target_size(self, split_target_size: u64) -> Self {
        ScanOptions {
            split_target_size: split_target_size.max(1),
            ..self
        }
    }

    /// Minimum weight a file contributes to bin packing.
    #[must_use]
    pub fn open_file_cost(self, open_file_cost: u64) -> Self {
        ScanOptions {
            open_file_cost,
            ..self
        }
    }

    /// Number of open bins kept while packing. Zero is raised to one.
    #[must_use]
    pub fn split_lookback(self, split_lookback: usize) -> Self {
        ScanOptions {
            split_lookback: split_lookback.max(1),
            ..self
        }
    }

    /// Whether filter columns resolve against the schema case-sensitively.
    #[must_use]
    pub fn case_sensitive(self, case_sensitive: bool) -> Self {
        ScanOptions {
            case_sensitive,
            ..self
        }
    }

    /// Upper bound for every table-store call made while planning.
    #[must_use]
    pub fn io_timeout(self, io_timeout: Duration) -> Self {
        ScanOptions {
            io_timeout: Some(io_timeout),
            ..self
        }
    }
}

fn positive_property(properties: &BTreeMap<String, String>, key: &str) -> Option<u64> {
    let raw = properties.get(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            log_warn!(
                component = "scan",
                event = "invalid_table_property",
                key = key,
                value = raw.as_str(),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ScanOptions::default();
        assert_eq!(options.split_target_size, 128 * 1024 * 1024);
        assert_eq!(options.open_file_cost, 4 * 1024 * 1024);
        assert_eq!(options.split_lookback, 10);
        assert!(options.case_sensitive);
        assert_eq!(options.io_timeout, None);
    }

    #[test]
    fn properties_override_defaults_and_garbage_is_ignored() {
        let mut props = BTreeMap::new();
        props.insert(SPLIT_TARGET_SIZE.to_string(), "1024".to_string());
        props.insert(SPLIT_OPEN_FILE_COST.to_string(), "lots".to_string());
        props.insert(SPLIT_LOOKBACK.to_string(), "0".to_string());
        let options = ScanOptions::from_properties(&props);
        assert_eq!(options.split_target_size, 1024);
        assert_eq!(options.open_file_cost, DEFAULT_OPEN_FILE_COST);
        assert_eq!(options.split_lookback, DEFAULT_SPLIT_LOOKBACK);
    }

    #[test]
    fn builder_clamps_degenerate_values() {
        let options = ScanOptions::default()
            .split_target_size(0)
            .split_lookback(0)
            .io_timeout(Duration::from_millis(5));
        assert_eq!(options.split_target_size, 1);
        assert_eq!(options.split_lookback, 1);
        assert_eq!(options.io_timeout, Some(Duration::from_millis(5)));
    }
}
