use std::process::ExitCode;

use clap::Parser;
use moneystore::{
    config::{CliArgs, Config},
    migrate, open_store,
    store::backend_name,
    telemetry::init_tracing,
    Error, MigrationReport,
};

fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging);

    match run(&config).and_then(|report| render(&report, cli.json)) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Migration failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<MigrationReport, Error> {
    tracing::info!(
        source = backend_name(&config.source),
        target = backend_name(&config.target),
        "Starting migration"
    );
    let source = open_store(&config.source)?;
    let target = open_store(&config.target)?;

    let report = migrate(source.as_ref(), target.as_ref())?;

    source.close()?;
    target.close()?;
    Ok(report)
}

fn render(report: &MigrationReport, json: bool) -> Result<String, Error> {
    if json {
        Ok(serde_json::to_string_pretty(report)?)
    } else {
        Ok(report.to_string())
    }
}
