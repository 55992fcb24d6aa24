use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use darwinflow::config::Config;
use darwinflow::enrich::{self, EnrichOptions};
use darwinflow::hsp::HspClient;
use darwinflow::route::Route;
use darwinflow::stations::StationTable;

/// HSP responses can be slow for long services.
const HSP_TIMEOUT_SECS: f64 = 25.0;

#[derive(Parser, Debug)]
#[command(
    name = "enrich",
    about = "Fetch HSP service details and store actual-arrival ground truth for past predictions"
)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// Path to the SQLite database (default: taken from the config)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Only process rows with ssd before this YYYY-MM-DD date
    /// (default: today in Europe/London)
    #[arg(long)]
    before_date: Option<String>,
    /// Max number of candidate prediction rows to scan
    #[arg(long, default_value_t = 50_000)]
    limit_rows: i64,
    /// Max distinct service ids to call HSP for in one run
    #[arg(long, default_value_t = 2000)]
    max_rids: usize,
    /// Sleep seconds between HSP requests
    #[arg(long, default_value_t = 0.0)]
    sleep: f64,
    /// Do not write to the database, just count
    #[arg(long)]
    dry_run: bool,
    /// Verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config = Config::load(&args.config).expect("Failed to load config");

    let stations = StationTable::load(&config.paths.stations_csv)
        .expect("Failed to load station reference table");
    let route = Route::from_table(&stations);

    let hsp = HspClient::new(
        config.hsp.service_details_url.clone(),
        config.hsp.username.clone(),
        config.hsp.password.clone(),
        HSP_TIMEOUT_SECS,
    )
    .expect("Failed to build HSP client");

    let options = EnrichOptions {
        db_path: args.db.unwrap_or_else(|| config.paths.database.clone()),
        before_date: args.before_date,
        limit_rows: args.limit_rows,
        max_rids: args.max_rids,
        sleep_secs: args.sleep,
        dry_run: args.dry_run,
    };

    if let Err(e) = enrich::run(&options, &route, &hsp).await {
        tracing::error!(error = %e, "Enrichment failed");
        std::process::exit(1);
    }
}
