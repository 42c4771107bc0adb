//! Per-scenario JSON dumps of inputs and expected results.
//!
//! Written to `<data_dir>/<name>_metadata.json` so a failing comparison
//! can be debugged from the kept data directory without rerunning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::matrix::Matrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetadata {
    pub test_name: String,
    pub input_shape: (usize, usize),
    pub kernel_shape: (usize, usize),
    pub input_data: Vec<Vec<f64>>,
    pub kernel_data: Vec<Vec<f64>>,
    pub expected_result: Vec<Vec<f64>>,
}

impl ScenarioMetadata {
    pub fn new(test_name: &str, input: &Matrix, kernel: &Matrix, expected: &Matrix) -> Self {
        Self {
            test_name: test_name.to_string(),
            input_shape: input.shape(),
            kernel_shape: kernel.shape(),
            input_data: input.to_rows(),
            kernel_data: kernel.to_rows(),
            expected_result: expected.to_rows(),
        }
    }
}

/// Path the metadata for `test_name` is written to.
pub fn metadata_path(dir: &Path, test_name: &str) -> PathBuf {
    dir.join(format!("{test_name}_metadata.json"))
}

/// Serialize and write the metadata, returning the file path.
pub fn save_metadata(
    dir: &Path,
    test_name: &str,
    input: &Matrix,
    kernel: &Matrix,
    expected: &Matrix,
) -> Result<PathBuf, HarnessError> {
    let meta = ScenarioMetadata::new(test_name, input, kernel, expected);
    let path = metadata_path(dir, test_name);
    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, serde_json::to_string_pretty(&meta)?)?;
    Ok(path)
}

/// Read back a metadata file.
pub fn load_metadata(path: &Path) -> Result<ScenarioMetadata, HarnessError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{generate, Pattern};
    use crate::reference::convolve;

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let input = generate(3, 2, Pattern::Sequential).unwrap();
        let kernel = generate(1, 3, Pattern::Ones).unwrap();
        let expected = convolve(&input, &kernel);

        let path = save_metadata(dir.path(), "stability_0", &input, &kernel, &expected).unwrap();
        assert!(path.ends_with("stability_0_metadata.json"));

        let meta = load_metadata(&path).unwrap();
        assert_eq!(meta.test_name, "stability_0");
        assert_eq!(meta.input_shape, (3, 2));
        assert_eq!(meta.kernel_shape, (1, 3));
        assert_eq!(meta.expected_result, expected.to_rows());
    }

    #[test]
    fn json_field_names() {
        let one = Matrix::new(1, 1, vec![1.0]).unwrap();
        let meta = ScenarioMetadata::new("t", &one, &one, &one);
        let json = serde_json::to_string(&meta).unwrap();
        for key in [
            "test_name",
            "input_shape",
            "kernel_shape",
            "input_data",
            "kernel_data",
            "expected_result",
        ] {
            assert!(json.contains(key), "missing {key}");
        }
    }
}
