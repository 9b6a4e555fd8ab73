//! `cstr-sim`: runs a reactor simulation described by a JSON or task file, prints the
//! results table and optionally writes it as CSV.
//!
//! The log level is read from `CSTR_LOG` (`error`, `warn`, `info`, `debug`, `trace`).

use cstr_control::{SimulationConfig, SimulationError};

use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage: cstr-sim <config.json | task.txt> [output.csv]";

fn main() -> ExitCode {
    let level = env::var("CSTR_LOG")
        .ok()
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    if let Err(e) =
        TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
    {
        eprintln!("cannot initialise logging: {}", e);
    }

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.len() > 2 {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }

    match run(&args[0], args.get(1).map(PathBuf::from)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str, output: Option<PathBuf>) -> Result<(), SimulationError> {
    let config = SimulationConfig::from_file(config_path)?;
    config.validate()?;

    let mut simulation = config.build()?;
    let record = simulation.run()?;
    println!("{}", record);

    if let Some(path) = output.or_else(|| config.output.clone()) {
        let written = record.save_csv(path)?;
        info!("saved {} rows in '{}'", record.len(), written.display());
    }
    Ok(())
}
