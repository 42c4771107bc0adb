//! Differential test suite.
//!
//! A fixed battery of [`ScenarioId`]s, each independently building its
//! inputs, driving the external program and validating what it wrote.
//! Scenarios share nothing but the data directory; their outcomes are
//! folded into a [`TestReport`] after the fact.

pub mod context;
mod scenarios;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::interrupt::InterruptFlag;

pub use context::ScenarioContext;

/// Result of a scenario's validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Pass,
    /// Passed, but with a numeric warning.
    Warn(String),
    /// Passed under a known soft limitation of the external program.
    SoftPass(String),
    Fail(String),
}

/// Every scenario of the battery, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    BasicFileInput,
    ArrayGeneration,
    MixedMode,
    NonSquareMatrices,
    EdgeCases,
    OutputWithoutFile,
    LargeMatrices,
    BoundaryConditions,
    AccuracySimple,
    AccuracyComplex,
    AccuracyEdgeKernel,
    GeneratedArrayAccuracy,
    NumericalStability,
    InvalidArguments,
}

impl ScenarioId {
    pub const ALL: [ScenarioId; 14] = [
        ScenarioId::BasicFileInput,
        ScenarioId::ArrayGeneration,
        ScenarioId::MixedMode,
        ScenarioId::NonSquareMatrices,
        ScenarioId::EdgeCases,
        ScenarioId::OutputWithoutFile,
        ScenarioId::LargeMatrices,
        ScenarioId::BoundaryConditions,
        ScenarioId::AccuracySimple,
        ScenarioId::AccuracyComplex,
        ScenarioId::AccuracyEdgeKernel,
        ScenarioId::GeneratedArrayAccuracy,
        ScenarioId::NumericalStability,
        ScenarioId::InvalidArguments,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BasicFileInput => "basic_file_input",
            Self::ArrayGeneration => "array_generation",
            Self::MixedMode => "mixed_mode",
            Self::NonSquareMatrices => "non_square_matrices",
            Self::EdgeCases => "edge_cases",
            Self::OutputWithoutFile => "output_without_file",
            Self::LargeMatrices => "large_matrices",
            Self::BoundaryConditions => "boundary_conditions",
            Self::AccuracySimple => "accuracy_simple",
            Self::AccuracyComplex => "accuracy_complex",
            Self::AccuracyEdgeKernel => "accuracy_edge_kernel",
            Self::GeneratedArrayAccuracy => "generated_array_accuracy",
            Self::NumericalStability => "numerical_stability",
            Self::InvalidArguments => "invalid_arguments",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::BasicFileInput => "Basic file input",
            Self::ArrayGeneration => "Array generation mode (-H -W -kH -kW)",
            Self::MixedMode => "Mixed mode (files + shapes)",
            Self::NonSquareMatrices => "Non-square matrices",
            Self::EdgeCases => "Edge cases (1x1 kernel, kernel larger than input)",
            Self::OutputWithoutFile => "Run without output file",
            Self::LargeMatrices => "Large matrices (50x50)",
            Self::BoundaryConditions => "Boundary conditions",
            Self::AccuracySimple => "Simple accuracy check",
            Self::AccuracyComplex => "Non-square accuracy check",
            Self::AccuracyEdgeKernel => "1x1 kernel accuracy check",
            Self::GeneratedArrayAccuracy => "Generated array accuracy check",
            Self::NumericalStability => "Numerical stability",
            Self::InvalidArguments => "Invalid arguments (nonexistent files)",
        }
    }

    /// Run the scenario's setup and validation.
    pub fn run(self, ctx: &ScenarioContext) -> ScenarioRun {
        let mut notes = Vec::new();
        let result = match self {
            Self::BasicFileInput => scenarios::basic_file_input(ctx, &mut notes),
            Self::ArrayGeneration => scenarios::array_generation(ctx, &mut notes),
            Self::MixedMode => scenarios::mixed_mode(ctx, &mut notes),
            Self::NonSquareMatrices => scenarios::non_square_matrices(ctx, &mut notes),
            Self::EdgeCases => scenarios::edge_cases(ctx, &mut notes),
            Self::OutputWithoutFile => scenarios::output_without_file(ctx, &mut notes),
            Self::LargeMatrices => scenarios::large_matrices(ctx, &mut notes),
            Self::BoundaryConditions => scenarios::boundary_conditions(ctx, &mut notes),
            Self::AccuracySimple => scenarios::accuracy_simple(ctx, &mut notes),
            Self::AccuracyComplex => scenarios::accuracy_complex(ctx, &mut notes),
            Self::AccuracyEdgeKernel => scenarios::accuracy_edge_kernel(ctx, &mut notes),
            Self::GeneratedArrayAccuracy => scenarios::generated_array_accuracy(ctx, &mut notes),
            Self::NumericalStability => scenarios::numerical_stability(ctx, &mut notes),
            Self::InvalidArguments => scenarios::invalid_arguments(ctx, &mut notes),
        };
        let check = result.unwrap_or_else(|e| Check::Fail(format!("error: {e}")));
        ScenarioRun { check, notes }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| format!("unknown scenario '{s}'"))
    }
}

/// Raw output of one scenario before it becomes a [`TestOutcome`].
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub check: Check,
    /// Informational lines collected while the scenario ran.
    pub notes: Vec<String>,
}

/// Scored result of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    pub scenario: ScenarioId,
    pub name: String,
    pub passed: bool,
    /// Passed only because of a tolerated limitation.
    pub soft_pass: bool,
    pub warning: Option<String>,
    /// Failure diagnostics, empty on success.
    pub diagnostics: String,
    pub notes: Vec<String>,
    pub elapsed_ms: u64,
}

impl TestOutcome {
    pub fn from_run(scenario: ScenarioId, run: ScenarioRun, elapsed_ms: u64) -> Self {
        let (passed, soft_pass, warning, diagnostics) = match run.check {
            Check::Pass => (true, false, None, String::new()),
            Check::Warn(w) => (true, false, Some(w), String::new()),
            Check::SoftPass(w) => (true, true, Some(w), String::new()),
            Check::Fail(d) => (false, false, None, d),
        };
        Self {
            scenario,
            name: scenario.name().to_string(),
            passed,
            soft_pass,
            warning,
            diagnostics,
            notes: run.notes,
            elapsed_ms,
        }
    }
}

/// Aggregated suite result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub total: usize,
    pub passed: usize,
    pub interrupted: bool,
    pub outcomes: Vec<TestOutcome>,
}

impl TestReport {
    /// Fold outcomes into a report.
    pub fn from_outcomes(outcomes: Vec<TestOutcome>, interrupted: bool) -> Self {
        let passed = outcomes.iter().filter(|o| o.passed).count();
        Self {
            total: outcomes.len(),
            passed,
            interrupted,
            outcomes,
        }
    }

    pub fn all_passed(&self) -> bool {
        !self.interrupted && self.passed == self.total
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    /// Pass percentage, 0 when nothing ran.
    #[allow(clippy::cast_precision_loss)]
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }

    pub fn format_summary(&self) -> String {
        let mut out = format!(
            "Results: {}/{} passed\nSuccess rate: {:.1}%\n",
            self.passed,
            self.total,
            self.pass_rate()
        );
        if self.interrupted {
            out.push_str("Run interrupted before all scenarios completed.\n");
        }
        if self.all_passed() {
            out.push_str("All scenarios passed.\n");
        } else {
            let failed: Vec<&str> = self
                .outcomes
                .iter()
                .filter(|o| !o.passed)
                .map(|o| o.name.as_str())
                .collect();
            if !failed.is_empty() {
                out.push_str(&format!("Failed: {}\n", failed.join(", ")));
            }
        }
        out
    }
}

/// Progress callbacks for a suite run.
pub trait SuiteObserver {
    fn scenario_started(&mut self, _id: ScenarioId) {}
    fn scenario_finished(&mut self, _outcome: &TestOutcome) {}
}

impl SuiteObserver for () {}

/// Check the external executable exists. The only fatal pre-run error.
pub fn check_executable(path: &std::path::Path) -> Result<(), HarnessError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(HarnessError::ExecutableMissing(path.to_path_buf()))
    }
}

/// What happened to the data directory at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDisposition {
    Kept { dir: PathBuf, files: Vec<PathBuf> },
    /// The harness created the directory and removed it whole.
    Removed { dir: PathBuf },
    /// The directory existed before the run; only files this run owned
    /// were removed.
    Cleaned { dir: PathBuf, removed: Vec<PathBuf> },
}

/// A configured harness: one data directory, one runner, one battery.
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    ctx: ScenarioContext,
    created_data_dir: bool,
}

impl Harness {
    pub fn new(config: HarnessConfig, interrupt: InterruptFlag) -> Self {
        let ctx = ScenarioContext::new(&config, interrupt);
        Self {
            config,
            ctx,
            created_data_dir: false,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Verify the executable and create the data directory.
    pub fn preflight(&mut self) -> Result<(), HarnessError> {
        check_executable(&self.config.conv_path)?;
        self.created_data_dir = context::prepare_data_dir(&self.config.data_dir)?;
        Ok(())
    }

    /// Run `scenarios` in order. Stops early if interrupted.
    pub fn run<O: SuiteObserver + ?Sized>(
        &self,
        scenarios: &[ScenarioId],
        observer: &mut O,
    ) -> TestReport {
        let mut outcomes = Vec::with_capacity(scenarios.len());
        let mut interrupted = false;

        for &id in scenarios {
            if self.ctx.interrupted() {
                interrupted = true;
                warn!(next = id.name(), "interrupted, skipping remaining scenarios");
                break;
            }
            observer.scenario_started(id);
            let start = Instant::now();
            let run = id.run(&self.ctx);
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let outcome = TestOutcome::from_run(id, run, elapsed_ms);
            info!(scenario = id.name(), passed = outcome.passed, elapsed_ms, "scenario finished");
            observer.scenario_finished(&outcome);
            outcomes.push(outcome);
        }

        if self.ctx.interrupted() {
            interrupted = true;
        }
        TestReport::from_outcomes(outcomes, interrupted)
    }

    /// Keep the data directory per `keep_data`, otherwise clean up. A
    /// directory that predates the run is never removed, only the files
    /// the scenarios wrote into it.
    pub fn finish(&self) -> Result<DataDisposition, HarnessError> {
        let dir = self.config.data_dir.clone();
        if self.config.keep_data {
            let files = if dir.is_dir() {
                context::list_data_files(&dir)?
            } else {
                Vec::new()
            };
            Ok(DataDisposition::Kept { dir, files })
        } else if self.created_data_dir {
            context::remove_data_dir(&dir)?;
            Ok(DataDisposition::Removed { dir })
        } else {
            let removed = context::remove_files(&self.ctx.owned_files())?;
            Ok(DataDisposition::Cleaned { dir, removed })
        }
    }
}

/// Resolve `--only` names into scenario ids, preserving battery order.
pub fn select_scenarios(names: &[String]) -> Result<Vec<ScenarioId>, HarnessError> {
    if names.is_empty() {
        return Ok(ScenarioId::ALL.to_vec());
    }
    let mut wanted = Vec::with_capacity(names.len());
    for name in names {
        wanted.push(name.parse::<ScenarioId>().map_err(HarnessError::Config)?);
    }
    Ok(ScenarioId::ALL
        .into_iter()
        .filter(|id| wanted.contains(id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Pattern;

    fn outcome(id: ScenarioId, check: Check) -> TestOutcome {
        TestOutcome::from_run(
            id,
            ScenarioRun {
                check,
                notes: Vec::new(),
            },
            0,
        )
    }

    #[test]
    fn names_are_unique_and_parse() {
        let mut names: Vec<&str> = ScenarioId::ALL.iter().map(|id| id.name()).collect();
        for id in ScenarioId::ALL {
            assert_eq!(id.name().parse::<ScenarioId>().unwrap(), id);
        }
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ScenarioId::ALL.len());
    }

    #[test]
    fn outcome_from_checks() {
        let pass = outcome(ScenarioId::MixedMode, Check::Pass);
        assert!(pass.passed && !pass.soft_pass && pass.warning.is_none());

        let warn = outcome(ScenarioId::GeneratedArrayAccuracy, Check::Warn("small".into()));
        assert!(warn.passed);
        assert_eq!(warn.warning.as_deref(), Some("small"));

        let soft = outcome(ScenarioId::InvalidArguments, Check::SoftPass("clean exit".into()));
        assert!(soft.passed && soft.soft_pass);

        let fail = outcome(ScenarioId::EdgeCases, Check::Fail("boom".into()));
        assert!(!fail.passed);
        assert_eq!(fail.diagnostics, "boom");
    }

    #[test]
    fn report_reduction() {
        let report = TestReport::from_outcomes(
            vec![
                outcome(ScenarioId::BasicFileInput, Check::Pass),
                outcome(ScenarioId::ArrayGeneration, Check::Fail("x".into())),
                outcome(ScenarioId::MixedMode, Check::Pass),
                outcome(ScenarioId::EdgeCases, Check::Pass),
            ],
            false,
        );
        assert_eq!(report.total, 4);
        assert_eq!(report.passed, 3);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_passed());
        assert!((report.pass_rate() - 75.0).abs() < 1e-12);
        let summary = report.format_summary();
        assert!(summary.contains("3/4"));
        assert!(summary.contains("75.0%"));
        assert!(summary.contains("array_generation"));
    }

    #[test]
    fn interrupted_report_is_not_a_pass() {
        let report =
            TestReport::from_outcomes(vec![outcome(ScenarioId::BasicFileInput, Check::Pass)], true);
        assert!(!report.all_passed());
        assert!(report.format_summary().contains("interrupted"));
    }

    #[test]
    fn empty_report_rate() {
        let report = TestReport::from_outcomes(Vec::new(), false);
        assert_eq!(report.pass_rate(), 0.0);
        assert!(report.all_passed());
    }

    #[test]
    fn selection_preserves_battery_order() {
        let ids = select_scenarios(&["invalid_arguments".into(), "mixed_mode".into()]).unwrap();
        assert_eq!(ids, vec![ScenarioId::MixedMode, ScenarioId::InvalidArguments]);
        assert_eq!(select_scenarios(&[]).unwrap().len(), 14);
        assert!(select_scenarios(&["nope".into()]).is_err());
    }

    #[test]
    fn missing_executable_is_fatal() {
        let err = check_executable(std::path::Path::new("/no/such/conv")).unwrap_err();
        assert!(matches!(err, HarnessError::ExecutableMissing(_)));
    }

    #[test]
    fn missing_executable_scenarios_fail_independently() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            conv_path: PathBuf::from("/no/such/conv"),
            data_dir: dir.path().join("data"),
            timeout_secs: 5,
            ..HarnessConfig::default()
        };
        let harness = Harness::new(config, InterruptFlag::new());
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let report = harness.run(
            &[ScenarioId::ArrayGeneration, ScenarioId::AccuracySimple],
            &mut (),
        );
        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 0);
        assert!(report.outcomes[0].diagnostics.contains("launch failed"));
    }

    #[test]
    fn interrupt_stops_before_first_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            data_dir: dir.path().to_path_buf(),
            ..HarnessConfig::default()
        };
        let flag = InterruptFlag::new();
        flag.trigger();
        let report = Harness::new(config, flag).run(&ScenarioId::ALL, &mut ());
        assert_eq!(report.total, 0);
        assert!(report.interrupted);
    }

    fn harness_in(root: &std::path::Path, dir: &std::path::Path, keep_data: bool) -> Harness {
        let conv = root.join("conv");
        std::fs::write(&conv, "").unwrap();
        let config = HarnessConfig {
            conv_path: conv,
            data_dir: dir.to_path_buf(),
            keep_data,
            ..HarnessConfig::default()
        };
        Harness::new(config, InterruptFlag::new())
    }

    #[test]
    fn finish_keeps_or_removes() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");

        let mut keep = harness_in(root.path(), &dir, true);
        keep.preflight().unwrap();
        std::fs::write(dir.join("a.txt"), "1 1\n0\n").unwrap();
        match keep.finish().unwrap() {
            DataDisposition::Kept { files, .. } => assert_eq!(files.len(), 1),
            other => panic!("expected Kept, got {other:?}"),
        }
        std::fs::remove_dir_all(&dir).unwrap();

        let mut clean = harness_in(root.path(), &dir, false);
        clean.preflight().unwrap();
        std::fs::write(dir.join("a.txt"), "1 1\n0\n").unwrap();
        assert!(matches!(
            clean.finish().unwrap(),
            DataDisposition::Removed { .. }
        ));
        assert!(!dir.exists());
    }

    #[test]
    fn finish_spares_preexisting_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("mydir");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("thesis.tex"), "keep me").unwrap();

        let mut harness = harness_in(root.path(), &dir, false);
        harness.preflight().unwrap();
        let written = harness
            .ctx
            .write_pattern("accuracy_f_simple.txt", 2, 2, Pattern::Ones)
            .unwrap()
            .0;

        match harness.finish().unwrap() {
            DataDisposition::Cleaned { removed, .. } => assert_eq!(removed, [written.clone()]),
            other => panic!("expected Cleaned, got {other:?}"),
        }
        assert!(dir.join("thesis.tex").is_file());
        assert!(!written.exists());
    }

    #[test]
    fn finish_without_preflight_never_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");
        std::fs::create_dir_all(&dir).unwrap();
        let harness = harness_in(root.path(), &dir, false);
        assert!(matches!(
            harness.finish().unwrap(),
            DataDisposition::Cleaned { .. }
        ));
        assert!(dir.is_dir());
    }
}
