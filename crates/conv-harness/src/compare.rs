//! Tolerance-based comparison of an observed matrix against a reference.
//!
//! Tolerances are absolute. Summation order in the external program may
//! differ from the reference, so exact equality is never required.

use std::fmt::Write as _;

use serde::Serialize;

use crate::matrix::Matrix;

/// Outcome of a tolerance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    /// Outside the strict tolerance but inside the warning band.
    Warn,
    Fail,
}

/// Element-wise difference summary between `expected` and `actual`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub expected_shape: (usize, usize),
    pub actual_shape: (usize, usize),
    /// Largest `|actual - expected|`; infinite when shapes differ.
    pub max_abs_error: f64,
    /// Position of `max_abs_error`.
    pub worst_index: Option<(usize, usize)>,
    /// Largest `|expected|`, for relative error.
    pub max_abs_expected: f64,
}

impl Comparison {
    pub fn new(expected: &Matrix, actual: &Matrix) -> Self {
        let max_abs_expected = expected
            .as_slice()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));

        if expected.shape() != actual.shape() {
            return Self {
                expected_shape: expected.shape(),
                actual_shape: actual.shape(),
                max_abs_error: f64::INFINITY,
                worst_index: None,
                max_abs_expected,
            };
        }

        let cols = expected.cols();
        let mut max_abs_error = 0.0_f64;
        let mut worst_index = None;
        for (idx, (e, a)) in expected
            .as_slice()
            .iter()
            .zip(actual.as_slice())
            .enumerate()
        {
            let err = (a - e).abs();
            if worst_index.is_none() || err > max_abs_error {
                max_abs_error = err;
                worst_index = Some((idx / cols, idx % cols));
            }
        }

        Self {
            expected_shape: expected.shape(),
            actual_shape: actual.shape(),
            max_abs_error,
            worst_index,
            max_abs_expected,
        }
    }

    pub fn shapes_match(&self) -> bool {
        self.expected_shape == self.actual_shape
    }

    /// `max_abs_error / max|expected|`, or 0 when the reference is all zeros.
    pub fn relative_error(&self) -> f64 {
        if self.max_abs_expected > 0.0 {
            self.max_abs_error / self.max_abs_expected
        } else {
            0.0
        }
    }

    /// Shapes agree and every element is within `tolerance`.
    pub fn within(&self, tolerance: f64) -> bool {
        self.shapes_match() && self.max_abs_error <= tolerance
    }

    /// [`Verdict::Pass`] within `tolerance`, [`Verdict::Warn`] strictly
    /// below `warn_limit`, otherwise [`Verdict::Fail`].
    pub fn verdict(&self, tolerance: f64, warn_limit: f64) -> Verdict {
        if self.within(tolerance) {
            Verdict::Pass
        } else if self.shapes_match() && self.max_abs_error < warn_limit {
            Verdict::Warn
        } else {
            Verdict::Fail
        }
    }

    /// One-line summary of shapes and error magnitude.
    pub fn summary(&self) -> String {
        if !self.shapes_match() {
            return format!(
                "shape mismatch: expected {:?}, got {:?}",
                self.expected_shape, self.actual_shape
            );
        }
        match self.worst_index {
            Some((i, j)) => format!(
                "max abs error {:.3e} at ({i}, {j}), relative {:.6}",
                self.max_abs_error,
                self.relative_error()
            ),
            None => "no elements compared".to_string(),
        }
    }
}

/// Full mismatch report: summary plus top-left corners of both matrices.
pub fn mismatch_report(expected: &Matrix, actual: &Matrix, corner: usize) -> String {
    let cmp = Comparison::new(expected, actual);
    let mut out = String::new();
    let _ = writeln!(out, "{}", cmp.summary());
    if let Some((i, j)) = cmp.worst_index {
        let _ = writeln!(
            out,
            "worst element: expected {:.6}, actual {:.6}",
            expected.get(i, j),
            actual.get(i, j)
        );
    }
    let _ = writeln!(out, "expected (top-left {corner}x{corner}):");
    out.push_str(&expected.corner(corner, corner).to_string());
    let _ = writeln!(out, "actual (top-left {corner}x{corner}):");
    out.push_str(&actual.corner(corner, corner).to_string());
    out
}
