// bench/src/config.rs
//
// Benchmark configuration.
//
// Priority order (highest to lowest):
// 1. Command-line flags (ConfigOverrides, applied after load())
// 2. Environment variables (INDEX_BENCH__* prefix)
// 3. Config file (TOML/YAML/JSON, picked by extension)
// 4. Built-in defaults

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workload::BatchShape;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "INDEX_BENCH";

/// Full benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Flat binary file of native-endian u64 keys
    pub keys_file: PathBuf,

    /// Keys to load from the file; the workload ends once all are inserted
    pub total_keys: usize,

    /// Keys bulk loaded into the index before the first batch
    pub initial_keys: usize,

    /// Lookups plus inserts per batch
    pub batch_size: usize,

    /// Share of `batch_size` spent on inserts, in (0, 1]
    pub insert_fraction: f64,

    /// In-place updates per batch, on top of `batch_size`
    pub updates_per_batch: usize,

    /// Fixed RNG seed; entropy-seeded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Show a progress bar over batches on stderr
    pub progress: bool,

    /// Write the run summary as JSON to this path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_path: Option<PathBuf>,

    /// Write one CSV row per batch to this path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_csv_path: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            keys_file: PathBuf::from("resources/uniform_dense_200M_uint64"),
            total_keys: 200_000_000,
            initial_keys: 0,
            batch_size: 25_000_000,
            insert_fraction: 0.5,
            updates_per_batch: 1_000_000,
            seed: None,
            progress: false,
            results_path: None,
            batch_csv_path: None,
        }
    }
}

/// Command-line overrides, the highest-priority layer.
///
/// Every field left unset keeps the value from the lower layers.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    /// Key file path
    #[arg(long)]
    pub keys_file: Option<PathBuf>,
    /// Keys to load and insert
    #[arg(long)]
    pub total_keys: Option<usize>,
    /// Keys bulk loaded before the first batch
    #[arg(long)]
    pub initial_keys: Option<usize>,
    /// Lookups plus inserts per batch
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Share of each batch spent on inserts
    #[arg(long)]
    pub insert_fraction: Option<f64>,
    /// Updates per batch
    #[arg(long)]
    pub updates_per_batch: Option<usize>,
    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,
    /// Write the run summary as JSON
    #[arg(long = "results")]
    pub results_path: Option<PathBuf>,
    /// Write one CSV row per batch
    #[arg(long = "batch-csv")]
    pub batch_csv_path: Option<PathBuf>,
}

impl BenchConfig {
    /// Merge defaults, the config file (if provided) and INDEX_BENCH__*
    /// environment variables, lowest priority first.
    ///
    /// The result is not validated: apply any [`ConfigOverrides`] first, then
    /// call [`BenchConfig::validate`].
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let defaults_json =
            serde_json::to_string(&Self::default()).context("Failed to serialize defaults")?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // An explicitly named file must exist
        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().context("Failed to build config")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize config")
    }

    /// Apply command-line overrides on top of the loaded layers.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            keys_file,
            total_keys,
            initial_keys,
            batch_size,
            insert_fraction,
            updates_per_batch,
            seed,
            progress,
            results_path,
            batch_csv_path,
        } = overrides;

        if let Some(v) = keys_file {
            self.keys_file = v;
        }
        if let Some(v) = total_keys {
            self.total_keys = v;
        }
        if let Some(v) = initial_keys {
            self.initial_keys = v;
        }
        if let Some(v) = batch_size {
            self.batch_size = v;
        }
        if let Some(v) = insert_fraction {
            self.insert_fraction = v;
        }
        if let Some(v) = updates_per_batch {
            self.updates_per_batch = v;
        }
        if seed.is_some() {
            self.seed = seed;
        }
        if progress {
            self.progress = true;
        }
        if results_path.is_some() {
            self.results_path = results_path;
        }
        if batch_csv_path.is_some() {
            self.batch_csv_path = batch_csv_path;
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.keys_file.as_os_str().is_empty(),
            "keys_file cannot be empty"
        );
        anyhow::ensure!(self.total_keys > 0, "total_keys must be > 0");
        anyhow::ensure!(
            self.initial_keys <= self.total_keys,
            "initial_keys ({}) cannot exceed total_keys ({})",
            self.initial_keys,
            self.total_keys
        );
        anyhow::ensure!(self.batch_size > 0, "batch_size must be > 0");
        anyhow::ensure!(
            self.insert_fraction > 0.0 && self.insert_fraction <= 1.0,
            "insert_fraction must be in (0.0, 1.0], got {}",
            self.insert_fraction
        );
        anyhow::ensure!(
            self.batch_shape().inserts > 0,
            "batch_size {} with insert_fraction {} leaves no inserts per batch",
            self.batch_size,
            self.insert_fraction
        );
        Ok(())
    }

    /// Per-batch operation counts.
    pub fn batch_shape(&self) -> BatchShape {
        // Truncates like an integer cast of batch_size * insert_fraction
        let inserts = ((self.batch_size as f64) * self.insert_fraction) as usize;
        let inserts = inserts.min(self.batch_size);
        BatchShape {
            lookups: self.batch_size - inserts,
            updates: self.updates_per_batch,
            inserts,
        }
    }

    /// Number of batches the workload runs before every key is inserted.
    pub fn planned_batches(&self) -> usize {
        self.batch_shape()
            .batches_between(self.initial_keys, self.total_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    // load() reads the process environment, so tests that call it take turns
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets INDEX_BENCH__* variables and removes them again on drop.
    struct ScopedEnv {
        names: Vec<String>,
        _lock: MutexGuard<'static, ()>,
    }

    impl ScopedEnv {
        fn new(vars: &[(&str, &str)]) -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let names = vars
                .iter()
                .map(|(field, value)| {
                    let name = format!("{ENV_PREFIX}__{field}");
                    std::env::set_var(&name, value);
                    name
                })
                .collect();
            Self { names, _lock: lock }
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            for name in &self.names {
                std::env::remove_var(name);
            }
        }
    }

    fn small_config() -> BenchConfig {
        BenchConfig {
            total_keys: 100,
            batch_size: 40,
            insert_fraction: 0.5,
            updates_per_batch: 5,
            ..BenchConfig::default()
        }
    }

    #[test]
    fn test_default_config_validates() {
        BenchConfig::default()
            .validate()
            .expect("Default config should be valid");
    }

    #[test]
    fn test_default_batch_shape() {
        let shape = BenchConfig::default().batch_shape();
        assert_eq!(shape.inserts, 12_500_000);
        assert_eq!(shape.lookups, 12_500_000);
        assert_eq!(shape.updates, 1_000_000);
        assert_eq!(BenchConfig::default().planned_batches(), 16);
    }

    #[test]
    fn test_small_workload_runs_five_batches() {
        let config = small_config();
        let shape = config.batch_shape();
        assert_eq!(shape.inserts, 20);
        assert_eq!(shape.lookups, 20);
        assert_eq!(config.planned_batches(), 5);
    }

    #[test]
    fn test_initial_keys_shorten_the_run() {
        let config = BenchConfig {
            initial_keys: 40,
            ..small_config()
        };
        assert_eq!(config.planned_batches(), 3);
    }

    #[test]
    fn test_full_insert_fraction_has_no_lookups() {
        let config = BenchConfig {
            insert_fraction: 1.0,
            ..small_config()
        };
        assert_eq!(config.batch_shape().lookups, 0);
        assert_eq!(config.planned_batches(), 3);
    }

    #[test]
    fn test_invalid_insert_fraction() {
        for fraction in [0.0, -0.5, 1.5, f64::NAN] {
            let config = BenchConfig {
                insert_fraction: fraction,
                ..small_config()
            };
            assert!(config.validate().is_err(), "fraction {fraction} accepted");
        }
    }

    #[test]
    fn test_fraction_rounding_to_zero_inserts_is_rejected() {
        let config = BenchConfig {
            batch_size: 3,
            insert_fraction: 0.2,
            ..small_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_keys_cannot_exceed_total() {
        let config = BenchConfig {
            initial_keys: 101,
            ..small_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_totals_are_rejected() {
        assert!(BenchConfig {
            total_keys: 0,
            ..small_config()
        }
        .validate()
        .is_err());
        assert!(BenchConfig {
            batch_size: 0,
            ..small_config()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let _env = ScopedEnv::new(&[]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(
            &path,
            "keys_file = \"data/keys.bin\"\ntotal_keys = 1000\nbatch_size = 100\nseed = 7\n",
        )
        .unwrap();

        let config = BenchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.keys_file, PathBuf::from("data/keys.bin"));
        assert_eq!(config.total_keys, 1000);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.seed, Some(7));
        // untouched fields keep their defaults
        assert_eq!(config.insert_fraction, 0.5);
        assert_eq!(config.updates_per_batch, 1_000_000);
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "total_keys = 10\nbogus = 1\n").unwrap();
        let _env = ScopedEnv::new(&[]);

        assert!(BenchConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let _env = ScopedEnv::new(&[]);
        let dir = tempfile::tempdir().unwrap();
        assert!(BenchConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_env_overrides_defaults() {
        let _env = ScopedEnv::new(&[
            ("TOTAL_KEYS", "123"),
            ("SEED", "9"),
            ("KEYS_FILE", "x.bin"),
        ]);

        let config = BenchConfig::load(None).unwrap();
        assert_eq!(config.total_keys, 123);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.keys_file, PathBuf::from("x.bin"));
        assert_eq!(config.batch_size, 25_000_000);
    }

    #[test]
    fn test_env_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "total_keys = 1000\nbatch_size = 100\n").unwrap();
        let _env = ScopedEnv::new(&[("TOTAL_KEYS", "2000")]);

        let config = BenchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.total_keys, 2000);
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_overrides_beat_env() {
        let _env = ScopedEnv::new(&[("TOTAL_KEYS", "2000"), ("SEED", "1")]);

        let mut config = BenchConfig::load(None).unwrap();
        config.apply_overrides(ConfigOverrides {
            total_keys: Some(3000),
            progress: true,
            ..ConfigOverrides::default()
        });

        assert_eq!(config.total_keys, 3000);
        assert_eq!(config.seed, Some(1));
        assert!(config.progress);
    }

    #[test]
    fn test_overrides_can_repair_invalid_lower_layers() {
        // 1 * 0.5 truncates to zero inserts per batch
        let _env = ScopedEnv::new(&[("BATCH_SIZE", "1")]);

        let mut config = BenchConfig::load(None).unwrap();
        assert!(config.validate().is_err());

        config.apply_overrides(ConfigOverrides {
            insert_fraction: Some(1.0),
            ..ConfigOverrides::default()
        });
        config.validate().unwrap();
        assert_eq!(config.batch_shape().inserts, 1);
    }

    #[test]
    fn test_invalid_file_values_load_until_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "initial_keys = 300000000\n").unwrap();
        let _env = ScopedEnv::new(&[]);

        let mut config = BenchConfig::load(Some(&path)).unwrap();
        assert!(config.validate().is_err());

        config.apply_overrides(ConfigOverrides {
            total_keys: Some(400_000_000),
            ..ConfigOverrides::default()
        });
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let mut config = small_config();
        config.apply_overrides(ConfigOverrides::default());
        assert_eq!(config, small_config());
    }
}
