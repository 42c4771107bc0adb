//! Harness configuration.
//!
//! Resolution order: built-in defaults, then an optional YAML file, then
//! explicit CLI flags (applied by the caller through [`ConfigOverrides`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// Default location of the external convolution executable.
pub const DEFAULT_CONV_PATH: &str = "../conv";
/// Default directory for generated test data.
pub const DEFAULT_DATA_DIR: &str = "test_data";
/// Default per-invocation timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Absolute error tolerances used when comparing against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Harness-generated deterministic inputs.
    pub deterministic: f64,
    /// Inputs generated by the external program.
    pub generated: f64,
    /// Above `generated` but below this: pass with a warning.
    pub generated_warn: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            deterministic: 1e-6,
            generated: 1e-3,
            generated_warn: 1e-2,
        }
    }
}

/// Fully resolved harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub conv_path: PathBuf,
    pub data_dir: PathBuf,
    pub timeout_secs: u64,
    pub keep_data: bool,
    pub tolerances: Tolerances,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            conv_path: PathBuf::from(DEFAULT_CONV_PATH),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            keep_data: false,
            tolerances: Tolerances::default(),
        }
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub conv_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub keep_data: bool,
}

impl HarnessConfig {
    /// Parse a YAML config. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, HarnessError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Resolve defaults, optional file and CLI overrides into one config.
    pub fn resolve(
        file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, HarnessError> {
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(ref p) = overrides.conv_path {
            config.conv_path.clone_from(p);
        }
        if let Some(ref d) = overrides.data_dir {
            config.data_dir.clone_from(d);
        }
        if let Some(t) = overrides.timeout_secs {
            config.timeout_secs = t;
        }
        config.keep_data |= overrides.keep_data;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the run meaningless.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.timeout_secs == 0 {
            return Err(HarnessError::Config("timeout_secs must be > 0".to_string()));
        }
        let t = &self.tolerances;
        for (name, value) in [
            ("deterministic", t.deterministic),
            ("generated", t.generated),
            ("generated_warn", t.generated_warn),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(HarnessError::Config(format!(
                    "tolerance '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        if t.generated_warn < t.generated {
            return Err(HarnessError::Config(format!(
                "generated_warn ({}) must be >= generated ({})",
                t.generated_warn, t.generated
            )));
        }
        Ok(())
    }
}
