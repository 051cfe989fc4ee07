mod reports;
mod scenarios;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::process::ExitCode;

use reports::{RunReport, write_console, write_json};
use scenarios::{list_scenarios, run_scenario};

#[derive(Debug, Parser)]
#[command(name = "sundae-tester", version)]
#[command(about = "Automated QA harness for the Sundae game backend core")]
struct Args {
    /// Scenarios to run (comma-separated)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations for randomized scenarios
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json"])]
    report: String,

    /// Verbose output (show passing checks too)
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn run(args: &Args) -> Result<RunReport> {
    let scenario_names = split_csv(&args.scenarios);
    if scenario_names.is_empty() {
        bail!("no scenarios requested");
    }
    let seeds: Vec<u64> = split_csv(&args.seeds)
        .iter()
        .map(|seed| {
            seed.parse::<u64>()
                .with_context(|| format!("invalid seed '{seed}'"))
        })
        .collect::<Result<_>>()?;
    if seeds.is_empty() {
        bail!("no seeds requested");
    }

    let mut reports = Vec::new();
    for name in &scenario_names {
        for seed in &seeds {
            let report = run_scenario(name, *seed, args.iterations)
                .with_context(|| format!("unknown scenario '{name}'"))?;
            log::info!(
                "scenario {name} seed {seed}: {}",
                if report.passed { "pass" } else { "fail" }
            );
            reports.push(report);
        }
    }
    Ok(RunReport::new(reports))
}

fn write_report(args: &Args, run: &RunReport) -> Result<()> {
    let mut sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(stdout()),
    };
    match args.report.as_str() {
        "json" => write_json(&mut sink, run)?,
        _ => write_console(&mut sink, run, args.verbose)?,
    }
    sink.flush()?;
    Ok(())
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    if args.list_scenarios {
        for name in list_scenarios() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let run = run(&args)?;
    write_report(&args, &run)?;

    if run.all_passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
