use std::path::{Path, PathBuf};

use conv_harness::config::{ConfigOverrides, HarnessConfig};
use conv_harness::error::HarnessError;
use conv_harness::interrupt::InterruptFlag;
use conv_harness::suite::{
    select_scenarios, DataDisposition, Harness, ScenarioId, SuiteObserver, TestOutcome,
    TestReport,
};

/// Inputs of the `run` subcommand after clap parsing.
pub struct RunArgs {
    pub overrides: ConfigOverrides,
    pub config: Option<PathBuf>,
    pub only: Vec<String>,
    pub report: Option<PathBuf>,
}

/// Prints one line per scenario as the suite progresses.
struct ConsolePrinter {
    index: usize,
    total: usize,
}

impl SuiteObserver for ConsolePrinter {
    fn scenario_started(&mut self, id: ScenarioId) {
        self.index += 1;
        println!("[{}/{}] {}", self.index, self.total, id.description());
    }

    fn scenario_finished(&mut self, outcome: &TestOutcome) {
        for note in &outcome.notes {
            for line in note.lines() {
                println!("    {line}");
            }
        }
        if outcome.passed {
            match (&outcome.warning, outcome.soft_pass) {
                (Some(w), true) => println!("  PASS {} (soft limitation: {w})", outcome.name),
                (Some(w), false) => println!("  PASS {} (warning: {w})", outcome.name),
                (None, _) => println!("  PASS {}", outcome.name),
            }
        } else {
            println!("  FAIL {}", outcome.name);
            for line in outcome.diagnostics.lines() {
                println!("    {line}");
            }
        }
    }
}

/// Print the scenario battery.
pub fn list() {
    for id in ScenarioId::ALL {
        println!("{:<26} {}", id.name(), id.description());
    }
}

pub fn run(args: &RunArgs, interrupt: InterruptFlag) -> Result<(), Box<dyn std::error::Error>> {
    let config = HarnessConfig::resolve(args.config.as_deref(), &args.overrides)?;
    let scenarios = select_scenarios(&args.only)?;
    let mut harness = Harness::new(config, interrupt);

    if let Err(e) = harness.preflight() {
        return Err(match e {
            HarnessError::ExecutableMissing(_) => {
                format!("{e}\nBuild the convolution program first or pass --conv-path").into()
            }
            other => other.into(),
        });
    }

    let config = harness.config();
    println!("Testing {}", config.conv_path.display());
    println!("Data directory: {}", config.data_dir.display());
    println!(
        "Tolerances: deterministic {:e}, generated {:e} (warn below {:e})\n",
        config.tolerances.deterministic,
        config.tolerances.generated,
        config.tolerances.generated_warn
    );

    let mut printer = ConsolePrinter {
        index: 0,
        total: scenarios.len(),
    };
    let report = harness.run(&scenarios, &mut printer);

    println!();
    print!("{}", report.format_summary());

    match harness.finish()? {
        DataDisposition::Kept { dir, files } => {
            println!("\nTest data kept in {}:", dir.display());
            for file in files {
                let name = file.file_name().map_or_else(
                    || file.display().to_string(),
                    |n| n.to_string_lossy().into_owned(),
                );
                println!("  {name}");
            }
        }
        DataDisposition::Removed { dir } => {
            println!("\nRemoved test data directory {}", dir.display());
        }
        DataDisposition::Cleaned { dir, removed } => {
            println!(
                "\nRemoved {} test file(s) from {} (directory predates the run, left in place)",
                removed.len(),
                dir.display()
            );
        }
    }

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        println!("Report written to {}", path.display());
    }

    if report.interrupted {
        Err(HarnessError::Interrupted.into())
    } else if report.all_passed() {
        Ok(())
    } else {
        Err(format!("{} of {} scenario(s) failed", report.failed(), report.total).into())
    }
}

fn write_report(path: &Path, report: &TestReport) -> Result<(), HarnessError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
