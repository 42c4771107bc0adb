//! Plain-text matrix file format.
//!
//! ```text
//! H W
//! v00 v01 ... v0(W-1)
//! ...
//! v(H-1)0 ... v(H-1)(W-1)
//! ```
//!
//! Values are written with [`DEFAULT_PRECISION`] decimal digits. Reading
//! accepts any float syntax Rust's `f64` parser does. Lines after the
//! H-th data row are ignored.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::HarnessError;
use crate::matrix::Matrix;

/// Decimal digits used by [`write_matrix`].
pub const DEFAULT_PRECISION: usize = 3;

/// Render `matrix` in the text format with `precision` decimal digits.
pub fn format_matrix(matrix: &Matrix, precision: usize) -> String {
    let mut out = String::with_capacity(matrix.rows() * matrix.cols() * (precision + 4) + 16);
    let _ = writeln!(out, "{} {}", matrix.rows(), matrix.cols());
    for i in 0..matrix.rows() {
        let row: Vec<String> = matrix
            .row(i)
            .iter()
            .map(|v| format!("{v:.precision$}"))
            .collect();
        out.push_str(&row.join(" "));
        out.push('\n');
    }
    out
}

/// Write `matrix` to `path` with [`DEFAULT_PRECISION`] decimals.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the file cannot be written.
pub fn write_matrix(matrix: &Matrix, path: &Path) -> Result<(), HarnessError> {
    write_matrix_with_precision(matrix, path, DEFAULT_PRECISION)
}

/// Write `matrix` to `path` with `precision` decimals.
pub fn write_matrix_with_precision(
    matrix: &Matrix,
    path: &Path,
    precision: usize,
) -> Result<(), HarnessError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, format_matrix(matrix, precision))?;
    Ok(())
}

/// Read a matrix file.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the file cannot be read, or
/// [`HarnessError::Format`] if the header is missing or unparsable, a
/// data row is missing, or a row does not hold exactly W finite values.
pub fn read_matrix(path: &Path) -> Result<Matrix, HarnessError> {
    let content = std::fs::read_to_string(path)?;
    parse_matrix(&content, &path.display().to_string())
}

/// Parse the text format. `source` names the origin in error messages.
pub fn parse_matrix(content: &str, source: &str) -> Result<Matrix, HarnessError> {
    let mut lines = content.lines();

    let header = lines
        .next()
        .ok_or_else(|| HarnessError::format(source, 1, "missing header line"))?;
    let (rows, cols) = parse_header(header, source)?;

    let mut data = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        let line_no = i + 2;
        let line = lines.next().ok_or_else(|| {
            HarnessError::format(
                source,
                line_no,
                format!("expected {rows} data rows, found {i}"),
            )
        })?;
        let before = data.len();
        for token in line.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| {
                HarnessError::format(source, line_no, format!("invalid number '{token}'"))
            })?;
            if !value.is_finite() {
                return Err(HarnessError::format(
                    source,
                    line_no,
                    format!("non-finite value '{token}'"),
                ));
            }
            data.push(value);
        }
        let got = data.len() - before;
        if got != cols {
            return Err(HarnessError::format(
                source,
                line_no,
                format!("expected {cols} values, got {got}"),
            ));
        }
    }

    Matrix::new(rows, cols, data)
}

fn parse_header(header: &str, source: &str) -> Result<(usize, usize), HarnessError> {
    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(HarnessError::format(
            source,
            1,
            format!("header must be 'H W', got '{}'", header.trim()),
        ));
    }
    let parse_dim = |token: &str| -> Result<usize, HarnessError> {
        match token.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(HarnessError::format(
                source,
                1,
                format!("dimension must be a positive integer, got '{token}'"),
            )),
        }
    };
    Ok((parse_dim(tokens[0])?, parse_dim(tokens[1])?))
}
