//! Stand-in for the external convolution program.
//!
//! Speaks the same flags (`-f -g -H -W -kH -kW -o`) and file format, and
//! computes the result with the harness's own reference engine. Used to
//! exercise `convh` end to end.
//!
//! `CONV_LOOPBACK_OFFSET` adds a constant to every output value, which
//! lets tests provoke accuracy failures.

use std::path::{Path, PathBuf};
use std::process;

use conv_harness::codec::{read_matrix, write_matrix};
use conv_harness::generator::{generate, Pattern};
use conv_harness::matrix::Matrix;
use conv_harness::reference::convolve;

#[derive(Debug, Default)]
struct Args {
    input_file: Option<PathBuf>,
    kernel_file: Option<PathBuf>,
    height: Option<usize>,
    width: Option<usize>,
    kernel_height: Option<usize>,
    kernel_width: Option<usize>,
    output_file: Option<PathBuf>,
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut it = argv.into_iter();
    while let Some(flag) = it.next() {
        let value = it
            .next()
            .ok_or_else(|| format!("missing value for {flag}"))?;
        let number = || {
            value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("{flag} expects a positive integer, got '{value}'"))
        };
        match flag.as_str() {
            "-f" => args.input_file = Some(PathBuf::from(&value)),
            "-g" => args.kernel_file = Some(PathBuf::from(&value)),
            "-H" => args.height = Some(number()?),
            "-W" => args.width = Some(number()?),
            "-kH" => args.kernel_height = Some(number()?),
            "-kW" => args.kernel_width = Some(number()?),
            "-o" => args.output_file = Some(PathBuf::from(&value)),
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(args)
}

/// Generate from a shape (writing to `file` if given) or read `file`.
fn operand(
    what: &str,
    file: Option<&Path>,
    shape: (Option<usize>, Option<usize>),
) -> Result<Matrix, String> {
    match (shape, file) {
        ((Some(h), Some(w)), file) => {
            let m = generate(h, w, Pattern::Debug).map_err(|e| e.to_string())?;
            if let Some(path) = file {
                write_matrix(&m, path).map_err(|e| format!("writing {}: {e}", path.display()))?;
            }
            Ok(m)
        }
        ((None, None), Some(path)) => {
            read_matrix(path).map_err(|e| format!("reading {what} {}: {e}", path.display()))
        }
        ((None, None), None) => Err(format!("no {what} given")),
        _ => Err(format!("{what} needs both dimensions")),
    }
}

/// Parse the optional output offset. A value that does not parse is an
/// error rather than no offset.
fn output_offset(raw: Option<&str>) -> Result<Option<f64>, String> {
    raw.map(|v| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| format!("CONV_LOOPBACK_OFFSET is not a finite number: '{v}'"))
    })
    .transpose()
}

fn execute(args: &Args) -> Result<(), String> {
    let input = operand(
        "input matrix",
        args.input_file.as_deref(),
        (args.height, args.width),
    )?;
    let kernel = operand(
        "kernel",
        args.kernel_file.as_deref(),
        (args.kernel_height, args.kernel_width),
    )?;
    let exact = convolve(&input, &kernel);
    let offset = output_offset(std::env::var("CONV_LOOPBACK_OFFSET").ok().as_deref())?;
    let result = match offset {
        Some(offset) => Matrix::from_fn(exact.rows(), exact.cols(), |i, j| exact.get(i, j) + offset)
            .map_err(|e| e.to_string())?,
        None => exact,
    };

    if let Some(path) = &args.output_file {
        write_matrix(&result, path).map_err(|e| format!("writing {}: {e}", path.display()))?;
    }
    Ok(())
}

fn main() {
    let result = parse_args(std::env::args().skip(1)).and_then(|args| execute(&args));
    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
