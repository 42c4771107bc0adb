//! Shared helpers for the conv-harness integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use conv_harness::matrix::Matrix;
use proptest::prelude::*;

/// Strategy for a matrix of shape `rows x cols` within the given bounds,
/// with values in `[-100, 100]`.
pub fn matrix_strategy(
    rows: std::ops::RangeInclusive<usize>,
    cols: std::ops::RangeInclusive<usize>,
) -> impl Strategy<Value = Matrix> {
    (rows, cols).prop_flat_map(|(h, w)| {
        proptest::collection::vec(-100.0f64..100.0, h * w)
            .prop_map(move |data| Matrix::new(h, w, data).unwrap())
    })
}

/// Asserts two matrices have the same shape and agree element-wise within `tol`.
pub fn assert_close(actual: &Matrix, expected: &Matrix, tol: f64) {
    assert_eq!(actual.shape(), expected.shape(), "shape differs");
    for (k, (a, e)) in actual
        .as_slice()
        .iter()
        .zip(expected.as_slice())
        .enumerate()
    {
        assert!(
            (a - e).abs() <= tol,
            "element {k}: actual {a}, expected {e}, tol {tol}"
        );
    }
}

/// Write an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
