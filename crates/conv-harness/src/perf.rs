//! Benchmark log aggregation.
//!
//! Each `*threads.log` file holds a header line and a data line
//! `threads,elapsed_seconds,matrix_elements,kernel_elements`. Records are
//! sorted by thread count; the lowest thread count is the baseline for
//! speedup (`t0 / ti`) and efficiency (`speedup / threads`).
//!
//! The `N×N` matrix label assumes the benchmarked matrices were square
//! (`N = floor(sqrt(matrix_elements))`). Non-square runs get a
//! meaningless label; nothing here tries to recover the real shape.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::HarnessError;

/// Suffix identifying benchmark logs.
pub const LOG_SUFFIX: &str = "threads.log";

/// One parsed benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub threads: u32,
    pub elapsed_secs: f64,
    pub matrix_elements: u64,
    pub kernel_elements: u64,
}

/// One row of the report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerfRow {
    pub threads: u32,
    pub elapsed_secs: f64,
    pub speedup: f64,
    pub efficiency: f64,
}

/// Speedup/efficiency report across thread counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfReport {
    pub rows: Vec<PerfRow>,
    /// `floor(sqrt(matrix_elements))` of the baseline record.
    pub matrix_side: Option<u64>,
    /// `floor(sqrt(kernel_elements))` of the baseline record.
    pub kernel_side: Option<u64>,
    pub matrix_elements: Option<u64>,
    pub kernel_elements: Option<u64>,
}

impl PerfReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `"Matrix: N×N, Kernel: K×K"` under the square-shape assumption.
    pub fn shape_label(&self) -> Option<String> {
        let n = self.matrix_side?;
        let k = self.kernel_side?;
        Some(format!("Matrix: {n}×{n}, Kernel: {k}×{k}"))
    }
}

/// Parse the content of one log file.
///
/// # Errors
///
/// Returns a reason string if there is no second line, it does not hold
/// exactly four comma-separated fields, a field does not parse, or the
/// thread count / elapsed time is not positive.
pub fn parse_record(content: &str) -> Result<BenchmarkRecord, String> {
    let line = content
        .lines()
        .nth(1)
        .ok_or_else(|| "missing data line".to_string())?;
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(format!("expected 4 fields, got {}", fields.len()));
    }

    let threads: u32 = fields[0]
        .parse()
        .map_err(|_| format!("invalid thread count '{}'", fields[0]))?;
    let elapsed_secs: f64 = fields[1]
        .parse()
        .map_err(|_| format!("invalid elapsed time '{}'", fields[1]))?;
    let matrix_elements: u64 = fields[2]
        .parse()
        .map_err(|_| format!("invalid matrix size '{}'", fields[2]))?;
    let kernel_elements: u64 = fields[3]
        .parse()
        .map_err(|_| format!("invalid kernel size '{}'", fields[3]))?;

    if threads == 0 {
        return Err("thread count must be > 0".to_string());
    }
    if !(elapsed_secs.is_finite() && elapsed_secs > 0.0) {
        return Err(format!("elapsed time must be > 0, got {elapsed_secs}"));
    }

    Ok(BenchmarkRecord {
        threads,
        elapsed_secs,
        matrix_elements,
        kernel_elements,
    })
}

/// Files in `dir` whose name ends with [`LOG_SUFFIX`], sorted by path.
pub fn discover_logs(dir: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    let mut logs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(LOG_SUFFIX))
        })
        .collect();
    logs.sort();
    Ok(logs)
}

/// Discover and parse every log in `dir`, skipping malformed files.
pub fn load_records(dir: &Path) -> Result<Vec<BenchmarkRecord>, HarnessError> {
    let mut records = Vec::new();
    for path in discover_logs(dir)? {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable log");
                continue;
            }
        };
        match parse_record(&content) {
            Ok(r) => {
                debug!(path = %path.display(), threads = r.threads, "parsed log");
                records.push(r);
            }
            Err(reason) => warn!(path = %path.display(), %reason, "skipping malformed log"),
        }
    }
    Ok(records)
}

/// Sort by thread count and compute speedup/efficiency.
pub fn analyze(mut records: Vec<BenchmarkRecord>) -> PerfReport {
    records.sort_by(|a, b| {
        a.threads
            .cmp(&b.threads)
            .then(a.elapsed_secs.total_cmp(&b.elapsed_secs))
    });

    let baseline = records.first().copied();
    let rows = records
        .iter()
        .map(|r| {
            let base_time = baseline.map_or(r.elapsed_secs, |b| b.elapsed_secs);
            let speedup = base_time / r.elapsed_secs;
            PerfRow {
                threads: r.threads,
                elapsed_secs: r.elapsed_secs,
                speedup,
                efficiency: speedup / f64::from(r.threads),
            }
        })
        .collect();

    PerfReport {
        rows,
        matrix_side: baseline.map(|b| isqrt(b.matrix_elements)),
        kernel_side: baseline.map(|b| isqrt(b.kernel_elements)),
        matrix_elements: baseline.map(|b| b.matrix_elements),
        kernel_elements: baseline.map(|b| b.kernel_elements),
    }
}

/// Load and analyze all logs in `dir`.
pub fn aggregate_dir(dir: &Path) -> Result<PerfReport, HarnessError> {
    Ok(analyze(load_records(dir)?))
}

/// Integer square root (floor).
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn isqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r.checked_mul(r).is_none_or(|sq| sq > n) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).is_some_and(|sq| sq <= n) {
        r += 1;
    }
    r
}

/// Plain-text table.
pub fn format_text(report: &PerfReport) -> String {
    if report.is_empty() {
        return "No benchmark logs found.\n".to_string();
    }
    let mut out = String::new();
    if let Some(label) = report.shape_label() {
        let _ = writeln!(out, "Parallel Convolution Performance ({label})\n");
    }
    out.push_str("Threads | Time (s) | Speedup | Efficiency\n");
    let _ = writeln!(out, "{}", "-".repeat(40));
    for r in &report.rows {
        let _ = writeln!(
            out,
            "{:7} | {:8.2} | {:7.2} | {:10.2}",
            r.threads, r.elapsed_secs, r.speedup, r.efficiency
        );
    }
    out
}

/// GitHub-flavored markdown table.
pub fn format_markdown(report: &PerfReport) -> String {
    let mut out = String::new();
    if let Some(label) = report.shape_label() {
        let _ = writeln!(out, "**{label}**\n");
    }
    out.push_str("| Threads | Time | Speedup | Efficiency |\n");
    out.push_str("|--------:|-----:|--------:|-----------:|\n");
    for r in &report.rows {
        let _ = writeln!(
            out,
            "| {} | {:.2}s | {:.2}x | {:.2} |",
            r.threads, r.elapsed_secs, r.speedup, r.efficiency
        );
    }
    out
}

/// ASCII bar chart of measured speedup against ideal (linear) speedup.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn format_chart(report: &PerfReport, width: usize) -> String {
    if report.is_empty() {
        return "No benchmark logs found.\n".to_string();
    }
    let width = width.max(10);
    let scale = report
        .rows
        .iter()
        .map(|r| r.speedup.max(f64::from(r.threads)))
        .fold(1.0_f64, f64::max);

    let mut out = String::from("Speedup vs threads (# measured, | ideal)\n");
    for r in &report.rows {
        let bar = ((r.speedup / scale) * width as f64).round() as usize;
        let ideal = ((f64::from(r.threads) / scale) * width as f64).round() as usize;
        let mut cells: Vec<char> = (0..width).map(|c| if c < bar { '#' } else { ' ' }).collect();
        if ideal > 0 && ideal <= width {
            cells[ideal - 1] = '|';
        }
        let line: String = cells.into_iter().collect();
        let _ = writeln!(
            out,
            "{:>5} [{line}] {:.2}x ({:.0}% eff)",
            r.threads,
            r.speedup,
            r.efficiency * 100.0
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(threads: u32, elapsed_secs: f64) -> BenchmarkRecord {
        BenchmarkRecord {
            threads,
            elapsed_secs,
            matrix_elements: 1_000_000,
            kernel_elements: 9,
        }
    }

    #[test]
    fn parse_valid_log() {
        let r = parse_record("threads,time,matrix,kernel\n4, 2.5 ,1000000,9\n").unwrap();
        assert_eq!(r.threads, 4);
        assert_eq!(r.elapsed_secs, 2.5);
        assert_eq!(r.matrix_elements, 1_000_000);
        assert_eq!(r.kernel_elements, 9);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(parse_record("header only\n").is_err());
        assert!(parse_record("h\n1,2.0,3\n").is_err());
        assert!(parse_record("h\n1,2.0,3,4,5\n").is_err());
        assert!(parse_record("h\nx,2.0,3,4\n").is_err());
        assert!(parse_record("h\n0,2.0,3,4\n").is_err());
        assert!(parse_record("h\n1,0.0,3,4\n").is_err());
    }

    #[test]
    fn speedup_and_efficiency() {
        let report = analyze(vec![rec(4, 4.0), rec(1, 10.0), rec(2, 6.0)]);
        let threads: Vec<u32> = report.rows.iter().map(|r| r.threads).collect();
        assert_eq!(threads, vec![1, 2, 4]);
        let expected = [(1.0, 1.0), (10.0 / 6.0, 10.0 / 12.0), (2.5, 0.625)];
        for (row, (s, e)) in report.rows.iter().zip(expected) {
            assert!((row.speedup - s).abs() < 1e-9);
            assert!((row.efficiency - e).abs() < 1e-9);
        }
    }

    #[test]
    fn baseline_is_lowest_thread_count() {
        let report = analyze(vec![rec(8, 1.0), rec(2, 4.0)]);
        assert_eq!(report.rows[0].threads, 2);
        assert_eq!(report.rows[0].speedup, 1.0);
        assert_eq!(report.rows[0].efficiency, 0.5);
        assert_eq!(report.rows[1].speedup, 4.0);
    }

    #[test]
    fn square_label() {
        let report = analyze(vec![rec(1, 1.0)]);
        assert_eq!(report.matrix_side, Some(1000));
        assert_eq!(report.kernel_side, Some(3));
        assert_eq!(
            report.shape_label().unwrap(),
            "Matrix: 1000×1000, Kernel: 3×3"
        );
    }

    #[test]
    fn isqrt_exact_and_floor() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(8), 2);
        assert_eq!(isqrt(9), 3);
        assert_eq!(isqrt(1_410_065_408), 37_550);
        assert_eq!(isqrt(u64::MAX), 4_294_967_295);
    }

    #[test]
    fn empty_report() {
        let report = analyze(Vec::new());
        assert!(report.is_empty());
        assert!(report.shape_label().is_none());
        assert!(format_text(&report).contains("No benchmark logs"));
    }

    #[test]
    fn text_table_layout() {
        let report = analyze(vec![rec(1, 10.0), rec(2, 6.0)]);
        let text = format_text(&report);
        assert!(text.contains("Threads | Time (s) | Speedup | Efficiency"));
        assert!(text.contains("      1 |    10.00 |    1.00 |       1.00"));
        assert!(text.contains("      2 |     6.00 |    1.67 |       0.83"));
    }

    #[test]
    fn markdown_and_chart() {
        let report = analyze(vec![rec(1, 10.0), rec(4, 4.0)]);
        let md = format_markdown(&report);
        assert!(md.contains("| 4 | 4.00s | 2.50x | 0.62 |") || md.contains("| 4 | 4.00s | 2.50x | 0.63 |"));
        let chart = format_chart(&report, 20);
        assert_eq!(chart.lines().count(), 3);
        assert!(chart.contains("2.50x"));
    }

    #[test]
    fn discovers_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1threads.log"), "h\n1,10.0,100,9\n").unwrap();
        std::fs::write(dir.path().join("2threads.log"), "h\n2,6.0,100,9\n").unwrap();
        std::fs::write(dir.path().join("bad_4threads.log"), "h\n4,oops,100,9\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "h\n8,1.0,100,9\n").unwrap();

        assert_eq!(discover_logs(dir.path()).unwrap().len(), 3);
        let report = aggregate_dir(dir.path()).unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.matrix_side, Some(10));
    }
}
