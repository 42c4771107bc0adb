//! Per-run state shared by all scenarios: data directory, tolerances and
//! the process runner. The only mutable part is the record of files the
//! run owns, which cleanup uses instead of wiping the directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::codec::{read_matrix, write_matrix};
use crate::config::{HarnessConfig, Tolerances};
use crate::error::HarnessError;
use crate::exec::{ConvInvocation, ConvRunner, ExecutionResult, Expectation};
use crate::generator::{generate, Pattern};
use crate::interrupt::InterruptFlag;
use crate::matrix::Matrix;
use crate::metadata::save_metadata;

#[derive(Debug)]
pub struct ScenarioContext {
    data_dir: PathBuf,
    tolerances: Tolerances,
    runner: ConvRunner,
    owned: Mutex<BTreeSet<PathBuf>>,
}

impl ScenarioContext {
    pub fn new(config: &HarnessConfig, interrupt: InterruptFlag) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            tolerances: config.tolerances,
            runner: ConvRunner::new(&config.conv_path, config.timeout_secs)
                .with_interrupt(interrupt),
            owned: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    pub fn interrupted(&self) -> bool {
        self.runner.interrupt().is_triggered()
    }

    /// Path of `name` inside the data directory. The file is recorded as
    /// owned by this run whether the harness or the program writes it.
    pub fn path(&self, name: &str) -> PathBuf {
        let path = self.data_dir.join(name);
        self.claim(&path);
        path
    }

    fn claim(&self, path: &Path) {
        self.owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf());
    }

    /// Every path this run has handed out, sorted.
    pub fn owned_files(&self) -> Vec<PathBuf> {
        self.owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Path of `name` with any file left by an earlier run removed, so
    /// existence checks only see what this run produced.
    pub fn fresh_path(&self, name: &str) -> Result<PathBuf, HarnessError> {
        let path = self.path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(path)
    }

    /// Write `matrix` as fixture `name`.
    pub fn write_fixture(&self, name: &str, matrix: &Matrix) -> Result<PathBuf, HarnessError> {
        let path = self.path(name);
        write_matrix(matrix, &path)?;
        Ok(path)
    }

    /// Generate an `h x w` `pattern` matrix and write it as fixture `name`.
    pub fn write_pattern(
        &self,
        name: &str,
        h: usize,
        w: usize,
        pattern: Pattern,
    ) -> Result<(PathBuf, Matrix), HarnessError> {
        let matrix = generate(h, w, pattern)?;
        let path = self.write_fixture(name, &matrix)?;
        Ok((path, matrix))
    }

    pub fn read(&self, path: &Path) -> Result<Matrix, HarnessError> {
        read_matrix(path)
    }

    pub fn save_metadata(
        &self,
        test_name: &str,
        input: &Matrix,
        kernel: &Matrix,
        expected: &Matrix,
    ) -> Result<PathBuf, HarnessError> {
        let path = save_metadata(&self.data_dir, test_name, input, kernel, expected)?;
        self.claim(&path);
        Ok(path)
    }

    /// Invoke the external program expecting success.
    pub fn run(&self, invocation: &ConvInvocation) -> ExecutionResult {
        self.runner.invoke(invocation, Expectation::Success)
    }

    /// Invoke the external program in inverted mode.
    pub fn run_expecting_failure(&self, invocation: &ConvInvocation) -> ExecutionResult {
        self.runner.invoke(invocation, Expectation::Failure)
    }
}

/// Create the data directory if needed. Returns whether it was created
/// here, i.e. whether the whole directory belongs to this run.
pub fn prepare_data_dir(dir: &Path) -> Result<bool, HarnessError> {
    let created = !dir.exists();
    std::fs::create_dir_all(dir)?;
    info!(dir = %dir.display(), created, "test data directory ready");
    Ok(created)
}

/// `.txt` and `.json` files in the data directory, sorted.
pub fn list_data_files(dir: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "txt" || ext == "json")
        })
        .collect();
    files.sort_by(|a, b| {
        let is_json = |p: &Path| p.extension().is_some_and(|e| e == "json");
        is_json(a).cmp(&is_json(b)).then_with(|| a.cmp(b))
    });
    Ok(files)
}

/// Remove the listed files that exist. Returns the ones removed.
pub fn remove_files(files: &[PathBuf]) -> Result<Vec<PathBuf>, HarnessError> {
    let mut removed = Vec::new();
    for path in files {
        match std::fs::remove_file(path) {
            Ok(()) => removed.push(path.clone()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    debug!(count = removed.len(), "removed test files");
    Ok(removed)
}

/// Remove the data directory and everything in it.
pub fn remove_data_dir(dir: &Path) -> Result<(), HarnessError> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
        info!(dir = %dir.display(), "test data removed");
    }
    Ok(())
}
