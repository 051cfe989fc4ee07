//! Report rendering for scenario runs.
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use crate::scenarios::ScenarioReport;

/// Aggregate of one tester invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub reports: Vec<ScenarioReport>,
    pub total_scenarios: usize,
    pub passed_scenarios: usize,
}

impl RunReport {
    #[must_use]
    pub fn new(reports: Vec<ScenarioReport>) -> Self {
        let total_scenarios = reports.len();
        let passed_scenarios = reports.iter().filter(|r| r.passed).count();
        Self {
            reports,
            total_scenarios,
            passed_scenarios,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.passed_scenarios == self.total_scenarios
    }
}

/// Render the run as colored console output.
pub fn write_console(out: &mut dyn Write, run: &RunReport, verbose: bool) -> Result<()> {
    for report in &run.reports {
        let header = format!(
            "{} (seed {}, {:.2}s)",
            report.scenario, report.seed, report.duration_secs
        );
        if report.passed {
            writeln!(out, "{} {}", "PASS".green().bold(), header)?;
        } else {
            writeln!(out, "{} {}", "FAIL".red().bold(), header)?;
        }
        for check in &report.checks {
            if check.passed && !verbose {
                continue;
            }
            let marker = if check.passed {
                "ok".green()
            } else {
                "failed".red()
            };
            writeln!(out, "  [{marker}] {} - {}", check.name, check.details)?;
        }
    }
    writeln!(
        out,
        "{} {}/{} scenarios passed",
        "SUMMARY".bold(),
        run.passed_scenarios,
        run.total_scenarios
    )?;
    Ok(())
}

/// Render the run as pretty JSON.
pub fn write_json(out: &mut dyn Write, run: &RunReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, run)?;
    writeln!(out)?;
    Ok(())
}
