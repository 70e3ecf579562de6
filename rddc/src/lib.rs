#![allow(clippy::type_complexity)]

use std::path::Path;

use serde::Deserialize;

pub mod core;
pub mod error;

pub use crate::core::{
    capture::{Capture, CapturedFn, Env},
    context::Context,
    executor::LocalTransport,
    partitioner::HashPartitioner,
    rdd::{Data, Dataset},
    task::{Task, TaskKind},
    transport::Transport,
};
pub use error::{CaptureError, Error, Result, TaskError, TransportError};

/// Defaults a [`Context`] injects where a call doesn't spell them out.
/// Applications can build it by hand or load it from a toml file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Slice count used by `parallelize` when none is given.
    /// Falls back to the transport's worker count.
    pub default_slices: Option<usize>,
    /// Seeds the generator repartition seeds are drawn from.
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Config = toml::from_str(source)?;
        if let Some(slices) = config.default_slices {
            error::require_positive("default_slices", slices)?;
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_toml() {
        let config = Config::from_toml("default_slices = 6\nseed = 42\n").unwrap();
        assert_eq!(config.default_slices, Some(6));
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn missing_keys_fall_back() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.default_slices, None);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn zero_slices_is_rejected() {
        let err = Config::from_toml("default_slices = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed = 7").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn bad_toml_is_a_format_error() {
        let err = Config::from_toml("default_slices = \"many\"").unwrap_err();
        assert!(matches!(err, Error::ConfigFormat(_)), "{err}");
    }
}
