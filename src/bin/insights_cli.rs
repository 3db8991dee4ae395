//! therapy-insights CLI entry point.
//!
//! Runs forecasts and checks over JSON series files, and the retraining check
//! against the analytics database. Results go to stdout as pretty JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use therapy_insights::application::forecast::{
    exponential_smoothing, forecast_capacity, forecast_workload, linear_trend, moving_average,
    seasonal_forecast, validate_series,
};
use therapy_insights::application::learning::{LearningLoop, LearningStores};
use therapy_insights::domain::{AnalyticsError, Failure, TimeSeriesPoint};
use therapy_insights::infra::app_config::{AnalyticsConfig, load_config, load_config_from};
use therapy_insights::infra::db::Database;

#[derive(Parser, Debug)]
#[command(name = "therapy-insights")]
#[command(version)]
#[command(about = "Forecasting and learning-loop checks for therapy centers", long_about = None)]
struct Args {
    /// Config file (defaults to THERAPY_INSIGHTS_CONFIG or the data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Forecast a JSON series of {timestamp, value} points
    Forecast {
        input: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Method::Seasonal)]
        method: Method,
        #[arg(long, default_value = "7")]
        horizon: usize,
        /// Moving-average window
        #[arg(long, default_value = "7")]
        window: usize,
        /// Exponential-smoothing factor
        #[arg(long, default_value = "0.3")]
        alpha: f64,
        /// Seasonal period length
        #[arg(long, default_value = "7")]
        season: usize,
    },

    /// Check a series for gaps, bad values and outliers
    Validate { input: PathBuf },

    /// Forecast capacity use from booked-capacity percentages
    Capacity {
        input: PathBuf,
        #[arg(long, default_value = "14")]
        horizon: usize,
    },

    /// Forecast therapist workload from sessions per period
    Workload {
        input: PathBuf,
        #[arg(long, default_value = "14")]
        horizon: usize,
    },

    /// Decide whether recent feedback warrants retraining
    Retraining {
        /// Database file (defaults to the configured location)
        #[arg(long)]
        database: Option<PathBuf>,
        /// End of the feedback window, RFC3339 (defaults to now)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    MovingAverage,
    ExponentialSmoothing,
    LinearTrend,
    Seasonal,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    config.validate()?;

    match run(args.command, &config).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => match err.downcast_ref::<AnalyticsError>() {
            Some(analytics) => {
                eprintln!("{}", serde_json::to_string_pretty(&Failure::from(analytics))?);
                std::process::exit(1);
            }
            None => Err(err),
        },
    }
}

async fn run(command: Commands, config: &AnalyticsConfig) -> Result<serde_json::Value> {
    let forecast_config = &config.forecast;
    let value = match command {
        Commands::Forecast {
            input,
            method,
            horizon,
            window,
            alpha,
            season,
        } => {
            let points = read_series(&input)?;
            let result = match method {
                Method::MovingAverage => moving_average(&points, window, horizon)?,
                Method::ExponentialSmoothing => exponential_smoothing(&points, alpha, horizon)?,
                Method::LinearTrend => linear_trend(&points, horizon)?,
                Method::Seasonal => seasonal_forecast(&points, season, horizon, forecast_config)?,
            };
            serde_json::to_value(result)?
        }
        Commands::Validate { input } => {
            serde_json::to_value(validate_series(&read_series(&input)?)?)?
        }
        Commands::Capacity { input, horizon } => serde_json::to_value(forecast_capacity(
            &read_series(&input)?,
            horizon,
            forecast_config,
        )?)?,
        Commands::Workload { input, horizon } => serde_json::to_value(forecast_workload(
            &read_series(&input)?,
            horizon,
            forecast_config,
        )?)?,
        Commands::Retraining { database, as_of } => {
            let db = match database {
                Some(path) => Database::open_at(path)?,
                None => Database::open_at(config.database_path())?,
            };
            let stores = LearningStores {
                recommendations: Arc::new(db.recommendation_repo()),
                feedback: Arc::new(db.feedback_repo()),
                learning: Arc::new(db.learning_repo()),
            };
            let learning = LearningLoop::new(stores, config.learning.clone());
            let assessment = learning
                .evaluate_retraining(as_of.unwrap_or_else(Utc::now))
                .await?;
            serde_json::to_value(assessment)?
        }
    };
    Ok(value)
}

fn read_series(path: &Path) -> Result<Vec<TimeSeriesPoint>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read series {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse series {}", path.display()))
}
