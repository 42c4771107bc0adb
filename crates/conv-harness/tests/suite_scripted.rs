//! Drive individual scenarios against small shell scripts standing in
//! for the external program.
#![cfg(unix)]

mod common;

use conv_harness::config::HarnessConfig;
use conv_harness::interrupt::InterruptFlag;
use conv_harness::suite::{Harness, ScenarioId, TestReport};

/// Copies the `-f` file to the `-o` file, which is exactly what a 1x1
/// unit kernel should do.
const COPY_INPUT: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    -f) f="$2" ;;
    -o) o="$2" ;;
  esac
  shift 2
done
[ -f "$f" ] || { echo "error: cannot open $f" >&2; exit 1; }
cp "$f" "$o""#;

fn run_with_script(body: &str, scenarios: &[ScenarioId]) -> (tempfile::TempDir, TestReport) {
    let dir = tempfile::tempdir().unwrap();
    let conv = common::write_script(dir.path(), "conv", body);
    let config = HarnessConfig {
        conv_path: conv,
        data_dir: dir.path().join("data"),
        timeout_secs: 10,
        ..HarnessConfig::default()
    };
    let mut harness = Harness::new(config, InterruptFlag::new());
    harness.preflight().unwrap();
    let report = harness.run(scenarios, &mut ());
    (dir, report)
}

#[test]
fn copying_program_passes_unit_kernel_accuracy() {
    let (dir, report) = run_with_script(COPY_INPUT, &[ScenarioId::AccuracyEdgeKernel]);
    assert!(report.all_passed(), "{:?}", report.outcomes);
    assert!(dir
        .path()
        .join("data/edge_kernel_accuracy_metadata.json")
        .is_file());
}

#[test]
fn copying_program_fails_diagonal_accuracy_with_diagnostics() {
    let (_dir, report) = run_with_script(COPY_INPUT, &[ScenarioId::AccuracySimple]);
    let outcome = &report.outcomes[0];
    assert!(!outcome.passed);
    assert!(outcome.diagnostics.contains("outside tolerance"));
    assert!(outcome.diagnostics.contains("max abs error"));
}

#[test]
fn copying_program_rejects_missing_files() {
    let (_dir, report) = run_with_script(COPY_INPUT, &[ScenarioId::InvalidArguments]);
    let outcome = &report.outcomes[0];
    assert!(outcome.passed);
    assert!(!outcome.soft_pass);
}

#[test]
fn silent_success_on_missing_files_is_a_soft_pass() {
    let (_dir, report) = run_with_script("exit 0", &[ScenarioId::InvalidArguments]);
    let outcome = &report.outcomes[0];
    assert!(outcome.passed);
    assert!(outcome.soft_pass);
    assert!(outcome.warning.is_some());
}

#[test]
fn missing_output_file_fails_each_scenario_independently() {
    let (_dir, report) = run_with_script(
        "exit 0",
        &[
            ScenarioId::ArrayGeneration,
            ScenarioId::OutputWithoutFile,
            ScenarioId::LargeMatrices,
        ],
    );
    assert_eq!(report.total, 3);
    assert_eq!(report.passed, 1);
    assert!(report.outcomes[0].diagnostics.contains("not created"));
    assert!(report.outcomes[1].passed);
    assert!(report.outcomes[2].diagnostics.contains("not created"));
}

#[test]
fn crashing_program_is_reported_not_raised() {
    let (_dir, report) = run_with_script(
        "echo 'Segmentation fault' >&2; kill -SEGV $$",
        &[ScenarioId::EdgeCases, ScenarioId::InvalidArguments],
    );
    assert!(!report.outcomes[0].passed);
    assert!(report.outcomes[0].diagnostics.contains("signal"));
    assert!(report.outcomes[1].passed);
}

#[test]
fn garbage_output_is_a_format_failure() {
    let body = r#"
while [ $# -gt 0 ]; do
  [ "$1" = "-o" ] && o="$2"
  shift 2
done
printf '5 7\n1 2 3\n' > "$o""#;
    let (_dir, report) = run_with_script(body, &[ScenarioId::ArrayGeneration]);
    assert!(!report.outcomes[0].passed);
    assert!(report.outcomes[0].diagnostics.contains("Malformed"));
}
