//! Operational knobs the worker pool and completion queue leave tunable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProcessorError;

/// Configuration for a [`crate::Processor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Size of the cryptographic worker pool.
    pub worker_threads: usize,
    /// Scheduling yield the completion queue inserts between items.
    #[serde(with = "duration_millis")]
    pub completion_yield: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            completion_yield: Duration::from_millis(10),
        }
    }
}

impl ProcessorConfig {
    /// Parses a TOML document, falling back to [`ProcessorConfig::default`]
    /// for any field it omits.
    pub fn from_toml_str(text: &str) -> Result<Self, ProcessorError> {
        toml::from_str(text).map_err(|e| ProcessorError::Config(e.to_string()))
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_threads_matches_num_cpus() {
        let cfg = ProcessorConfig::default();
        assert_eq!(cfg.worker_threads, num_cpus::get());
        assert_eq!(cfg.completion_yield, Duration::from_millis(10));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg = ProcessorConfig::from_toml_str("worker_threads = 4\n").unwrap();
        assert_eq!(cfg.worker_threads, 4);
        assert_eq!(cfg.completion_yield, Duration::from_millis(10));
    }
}
