//! Sitecheck CLI: run browser smoke scenarios against a deployed site
//!
//! ## Usage
//!
//! ```bash
//! sitecheck list                                # Built-in scenarios
//! sitecheck show deep-link-modal                # Scenario as YAML
//! sitecheck run deep-link-modal                 # Run against $YIYU_BASE
//! sitecheck run-file checks/custom.yaml -v      # Run a YAML scenario
//! ```
//!
//! The verdict is printed as JSON on stdout; exit status 0 means every
//! required check passed, 2 means anything else.

use chrono::Local;
use clap::Parser;
use console::Term;
use sitecheck::{catalog, Verdict, EXIT_FAILURE};
use sitecheck_cli::{
    harness_config, init_logging, run_target, CheckReporter, Cli, CliError, CliResult, Commands,
    RunArgs, RunTarget, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    init_logging(verbosity, cli.log_json);

    match cli.command {
        Commands::Run { scenario, args } => run(&RunTarget::Builtin(scenario), &args, verbosity),
        Commands::RunFile { path, args } => run(&RunTarget::File(path), &args, verbosity),
        Commands::List => finish(list()),
        Commands::Show { scenario } => finish(show(&scenario)),
    }
}

fn finish(result: CliResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(target: &RunTarget, args: &RunArgs, verbosity: Verbosity) -> ExitCode {
    let verdict = run_target(target, harness_config(args));
    CheckReporter::new(Term::stderr().is_term(), verbosity.is_quiet()).report(&verdict);
    match print_verdict(&verdict) {
        Ok(()) => ExitCode::from(verdict.exit_code()),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn print_verdict(verdict: &Verdict) -> CliResult<()> {
    let json = verdict.to_json_pretty()?;
    println!("{json}");
    Ok(())
}

fn list() -> CliResult<()> {
    for scenario in catalog::all(Local::now()) {
        println!(
            "{:<26} {:<12} {}",
            scenario.name, scenario.check_id, scenario.description
        );
    }
    Ok(())
}

fn show(name: &str) -> CliResult<()> {
    let scenario =
        catalog::find(name, Local::now()).ok_or_else(|| CliError::unknown_scenario(name))?;
    print!("{}", scenario.to_yaml()?);
    Ok(())
}
