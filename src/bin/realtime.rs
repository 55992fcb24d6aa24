use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Europe::London;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use darwinflow::config::Config;
use darwinflow::darwin::client;
use darwinflow::features::{HolidayCalendar, SegmentFeatureBuilder, TimeFeatureExtractor};
use darwinflow::models::WeightedEnsemble;
use darwinflow::route::Route;
use darwinflow::runtime::{RealtimePipeline, RecentSegmentCache};
use darwinflow::stations::StationTable;
use darwinflow::store::RealtimeStore;

const WRITER_QUEUE_SIZE: usize = 5000;
const WRITER_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(
    name = "realtime",
    about = "Consume the Darwin PushPort stream, extract route segments, and predict delays"
)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// How long to run, in minutes (-1 for unlimited)
    #[arg(long, default_value_t = 5.0)]
    minutes: f64,
    /// Do not print predictions to the terminal
    #[arg(long)]
    no_print: bool,
    /// Max number of recent segments kept in memory
    #[arg(long, default_value_t = 500)]
    cache_size: usize,
    /// Weights filename inside the weights directory
    #[arg(long, default_value = "model_weights.json")]
    weights: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config).expect("Failed to load config");

    let stations = StationTable::load(&config.paths.stations_csv)
        .expect("Failed to load station reference table");
    let route = Route::from_table(&stations);
    tracing::info!(
        stations = stations.len(),
        route_stations = route.stations().len(),
        "Loaded station reference data"
    );

    let holidays = match &config.paths.holidays_csv {
        Some(path) => match HolidayCalendar::load(path) {
            Ok(calendar) => {
                tracing::info!(holidays = calendar.len(), "Loaded holiday calendar");
                calendar
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load holiday calendar, holidays disabled");
                HolidayCalendar::empty()
            }
        },
        None => HolidayCalendar::empty(),
    };

    let ensemble = WeightedEnsemble::load(
        config.paths.weights_dir.join(&args.weights),
        config.paths.models_dir.clone(),
    )
    .expect("Failed to load ensemble weights");
    tracing::info!(pairs = ensemble.pair_count(), "Loaded ensemble weights");

    let store = RealtimeStore::open(&config.paths.database, WRITER_QUEUE_SIZE)
        .await
        .expect("Failed to open prediction store");
    tracing::info!(db = %config.paths.database.display(), "Opened prediction store");

    let mut pipeline = RealtimePipeline::new(
        route,
        RecentSegmentCache::new(args.cache_size),
        store,
        SegmentFeatureBuilder::new(TimeFeatureExtractor::new(holidays), London),
        ensemble,
        London,
        !args.no_print,
    );

    let deadline = async {
        if args.minutes < 0.0 {
            tracing::info!("Running unlimited (Ctrl+C to stop)");
            futures::future::pending::<()>().await
        } else {
            tracing::info!(minutes = args.minutes, "Running for a bounded duration");
            tokio::time::sleep(Duration::from_secs_f64(args.minutes * 60.0)).await
        }
    };

    tokio::select! {
        _ = client::run(&config.darwin, &mut pipeline) => {}
        _ = deadline => tracing::info!("Run duration elapsed"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    pipeline.shutdown(WRITER_JOIN_TIMEOUT).await;
}
