use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use car_rank_scraper::config::Config;
use car_rank_scraper::crawler::fetcher::HttpSource;
use car_rank_scraper::crawler::service::{CrawlEnd, CrawlService};
use car_rank_scraper::ingest::service::IngestService;
use car_rank_scraper::storage::sink::CsvSink;
use car_rank_scraper::storage::sqlite::Storage;

#[derive(Parser)]
#[command(name = "car-rank-scraper", about = "Car-market ranking scraper and ingester")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl ranking pages until interrupted, resuming from the cursor log
    Crawl,
    /// Clean the durable sink and bulk-load it into the relational store
    Ingest,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    match cli.command {
        Command::Crawl => {
            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received; stopping after the current page");
                    let _ = stop_tx.send(true);
                }
            });

            let source = HttpSource::new(cfg.clone())?;
            let mut service = CrawlService::new(cfg, source, stop_rx);
            match service.run().await {
                Ok(CrawlEnd::Terminated) => info!("Crawl stopped by operator"),
                Err(e) => {
                    error!(error = %e, "Crawl failed");
                    return Err(e.into());
                }
            }
        }

        Command::Ingest => {
            let storage = Storage::new(&cfg.database_url).await?;
            storage.init_schema().await?;

            let service = IngestService::new(CsvSink::new(&cfg.sink_path), storage);
            let report = service.run().await?;
            println!(
                "inserted {} rows ({} read, {} skipped missing, {} duplicate)",
                report.inserted, report.read, report.skipped_missing, report.skipped_duplicate
            );
        }
    }

    Ok(())
}
