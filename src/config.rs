//! Store configuration: the file-rotation threshold and the compactor's
//! wake period and trigger. This is an external-collaborator concern (the
//! storage engine itself is configured by passing a [`Config`] to
//! [`crate::Store::open_with_config`]) but the loader below is kept as
//! ambient scaffolding, the same way the teacher repository's server
//! layers a `config`-crate loader over its engine.

use serde::Deserialize;

/// Default file-rotation size trigger: 10 MiB.
pub const DEFAULT_THRESHOLD: u64 = 10 * 1024 * 1024;
/// Default compactor wake period, in seconds.
pub const DEFAULT_MERGE_INTERVAL_SECS: u64 = 60;
/// Default minimum data-file count that triggers a merge pass.
pub const DEFAULT_MERGE_FILE_LIMIT: usize = 10;

/// Tunable parameters for a [`crate::Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File size, in bytes, above which the active file is rotated.
    pub threshold: u64,
    /// How often, in seconds, the compactor wakes to check whether a
    /// merge pass is warranted.
    pub merge_interval_secs: u64,
    /// Minimum number of data files that must be present for a wake-up to
    /// trigger a merge pass.
    pub merge_file_limit: usize,
    /// Whether to `fsync` after every write, instead of the default
    /// best-effort `flush` to the OS buffer cache.
    pub sync_on_write: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            merge_interval_secs: DEFAULT_MERGE_INTERVAL_SECS,
            merge_file_limit: DEFAULT_MERGE_FILE_LIMIT,
            sync_on_write: false,
        }
    }
}

impl Config {
    /// Loads configuration from an optional TOML file layered under
    /// environment variables prefixed `CASKDB_` (e.g. `CASKDB_THRESHOLD`),
    /// falling back to [`Config::default`] for anything unset.
    pub fn load(path: Option<&str>) -> crate::error::Result<Config> {
        let mut builder = config::Config::builder()
            .set_default("threshold", DEFAULT_THRESHOLD as i64)
            .map_err(config_err)?
            .set_default("merge_interval_secs", DEFAULT_MERGE_INTERVAL_SECS as i64)
            .map_err(config_err)?
            .set_default("merge_file_limit", DEFAULT_MERGE_FILE_LIMIT as i64)
            .map_err(config_err)?
            .set_default("sync_on_write", false)
            .map_err(config_err)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("CASKDB"));

        let raw = builder.build().map_err(config_err)?;
        raw.try_deserialize().map_err(config_err)
    }
}

fn config_err(err: config::ConfigError) -> crate::error::Error {
    crate::error::Error::InvalidArgument(format!("invalid configuration: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.threshold, 10 * 1024 * 1024);
        assert_eq!(config.merge_interval_secs, 60);
        assert_eq!(config.merge_file_limit, 10);
        assert!(!config.sync_on_write);
    }

    #[test]
    fn load_without_file_returns_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_missing_file_is_not_an_error() {
        let config = Config::load(Some("/nonexistent/caskdb/config")).unwrap();
        assert_eq!(config, Config::default());
    }
}
