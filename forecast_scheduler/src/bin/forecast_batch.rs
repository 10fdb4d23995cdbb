//! Run one forecast batch over a CSV of observations and print the JSON report.

use clap::Parser;
use forecast_scheduler::loader::BatchInput;
use forecast_scheduler::{ForecastOrchestrator, InMemoryForecastStore, SchedulerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "forecast-batch")]
#[command(about = "Forecast every entity in an observations CSV")]
struct Args {
    /// Observations CSV with kind, name, locality, date, count and optional population columns
    input: PathBuf,

    /// Periods to forecast; defaults to the configured horizon
    #[arg(long)]
    horizon: Option<usize>,

    /// Configuration file layered under HEALTH_FORECAST__* variables
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forecast_scheduler=info,demand_forecast=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "forecast batch aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> forecast_scheduler::Result<()> {
    let config = SchedulerConfig::load(args.config.as_deref())?;
    let horizon = args.horizon.unwrap_or(config.default_horizon);
    tracing::info!(horizon, input = %args.input.display(), "configuration loaded");

    let (entities, source) = BatchInput::from_csv(&args.input)?.into_source();
    let store = Arc::new(InMemoryForecastStore::new());
    let orchestrator = ForecastOrchestrator::new(config, Arc::new(source), store)?;

    let report = orchestrator.generate_batch(&entities, horizon).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_args_are_named() {
        let args = Args::try_parse_from([
            "forecast-batch",
            "obs.csv",
            "--horizon",
            "14",
            "--config",
            "cfg.toml",
        ])
        .unwrap();

        assert_eq!(args.input, PathBuf::from("obs.csv"));
        assert_eq!(args.horizon, Some(14));
        assert_eq!(args.config, Some(PathBuf::from("cfg.toml")));
    }

    #[test]
    fn test_horizon_defaults_to_none() {
        let args = Args::try_parse_from(["forecast-batch", "obs.csv"]).unwrap();
        assert_eq!(args.horizon, None);
        assert_eq!(args.config, None);
    }

    #[test]
    fn test_bad_horizon_is_rejected() {
        let err = Args::try_parse_from(["forecast-batch", "obs.csv", "--horizon", "abc"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_stray_positional_is_rejected() {
        let err = Args::try_parse_from(["forecast-batch", "obs.csv", "cfg.toml"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_input_is_required() {
        let err = Args::try_parse_from(["forecast-batch"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
