//! Deterministic test matrix patterns.
//!
//! Patterns are pure functions of `(i, j, H, W)`, so expected results can
//! be recomputed without relying on the external program's own random
//! generation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::matrix::Matrix;

/// Matrix fill pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// `(i*W + j + 1) * 0.1`
    Sequential,
    /// All entries `1.0`.
    Ones,
    /// `1.0` on the main diagonal (`i == j`), `0.0` elsewhere.
    IdentityLike,
    /// Checkerboard: `1.0` where `i + j` is even.
    Alternating,
    /// `((i*W + j) mod 10) / 10`, easy to read in fixture files.
    Debug,
}

impl Pattern {
    pub const ALL: [Pattern; 5] = [
        Pattern::Sequential,
        Pattern::Ones,
        Pattern::IdentityLike,
        Pattern::Alternating,
        Pattern::Debug,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Ones => "ones",
            Self::IdentityLike => "identity_like",
            Self::Alternating => "alternating",
            Self::Debug => "debug",
        }
    }

    /// Value at `(i, j)` of an `h x w` matrix.
    #[allow(clippy::cast_precision_loss)]
    pub fn value(self, i: usize, j: usize, w: usize) -> f64 {
        match self {
            Self::Sequential => (i * w + j + 1) as f64 * 0.1,
            Self::Ones => 1.0,
            Self::IdentityLike => {
                if i == j {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Alternating => {
                if (i + j) % 2 == 0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Debug => ((i * w + j) % 10) as f64 / 10.0,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                format!("unknown pattern '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// Build an `h x w` matrix filled with `pattern`.
///
/// # Errors
///
/// Returns [`HarnessError::EmptyMatrix`] if `h` or `w` is zero.
pub fn generate(h: usize, w: usize, pattern: Pattern) -> Result<Matrix, HarnessError> {
    Matrix::from_fn(h, w, |i, j| pattern.value(i, j, w))
}
