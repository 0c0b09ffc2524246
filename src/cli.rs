use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use lotto_weather::api::{IngestOutcome, OpenWeatherClient};
use lotto_weather::config::{Config, tolerance_from_minutes};
use lotto_weather::reports;
use lotto_weather::scheduler::{Scheduler, parse_schedule};
use lotto_weather::scraper::ArchiveScraper;
use lotto_weather::store::{DrawStore, ResultStore, WeatherStore};
use lotto_weather::use_cases::{
    DrawUseCase, MatchUseCase, Pipeline, ReportUseCase, WeatherUseCase, open_store,
};

#[derive(Debug, Parser)]
#[command(
    name = "lotto-weather",
    version,
    about = "Collects 4x20 draws and weather samples and joins them by time"
)]
pub struct Cli {
    /// TOML file with settings; environment variables still override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database and tables if missing.
    Init,

    /// Scrape the draw archive and store new draws.
    Scrape,

    /// Fetch and store one current weather sample.
    Weather,

    /// Rebuild the joined results table.
    Match {
        /// Overrides MATCH_TOLERANCE_MINUTES for this run.
        #[arg(long)]
        tolerance_minutes: Option<i64>,

        /// Also write an HTML report to REPORT_PATH.
        #[arg(long)]
        html: bool,
    },

    /// Print the stored joined results.
    Show,

    /// Run scrape, weather and match at every configured slot until Ctrl-C.
    Schedule,
}

impl Cli {
    pub async fn run(self, config: Config) -> Result<()> {
        let config = Arc::new(config);

        match self.command {
            Command::Init => {
                let path = config.database_path.clone();
                let cfg = Arc::clone(&config);
                let (draws, weather, results) = tokio::task::spawn_blocking(move || {
                    let store = open_store(&cfg)?;
                    anyhow::Ok((
                        store.count_draws()?,
                        store.count_weather()?,
                        store.count_results()?,
                    ))
                })
                .await??;
                println!("✅ Database ready at {}", path.display());
                println!("   draws: {draws}, weather samples: {weather}, joined rows: {results}");
            }
            Command::Scrape => {
                let source = ArchiveScraper::new(config.draws_archive_url.clone())?;
                let summary = DrawUseCase::new(Arc::clone(&config), Box::new(source))
                    .scrape()
                    .await?;
                println!(
                    "🎲 Draws added: {}, already stored or skipped: {}",
                    summary.added, summary.skipped
                );
            }
            Command::Weather => {
                let client =
                    OpenWeatherClient::new(config.weather.api_key.clone(), config.weather.city.clone())?;
                match WeatherUseCase::new(Arc::clone(&config), Box::new(client))
                    .fetch()
                    .await?
                {
                    IngestOutcome::Inserted => println!("🌦  Weather sample stored"),
                    IngestOutcome::AlreadyPresent => {
                        println!("⚠ A sample with this observation time is already stored")
                    }
                }
            }
            Command::Match {
                tolerance_minutes,
                html,
            } => {
                let tolerance = match_tolerance(tolerance_minutes, &config)?;
                let outcome = MatchUseCase::new(Arc::clone(&config)).run(tolerance).await?;
                print!("{}", reports::render_summary(&outcome, tolerance));

                if html {
                    let path = ReportUseCase::new(Arc::clone(&config)).save_html(&outcome, tolerance)?;
                    println!("📋 HTML report written to {}", path.display());
                }
            }
            Command::Show => {
                let results = ReportUseCase::new(Arc::clone(&config))
                    .stored_results()
                    .await?;
                print!("{}", reports::render_results_table(&results));
            }
            Command::Schedule => {
                let slots = parse_schedule(&config.schedule_times)?;
                let pipeline = Pipeline::new(
                    Arc::clone(&config),
                    Box::new(ArchiveScraper::new(config.draws_archive_url.clone())?),
                    Box::new(OpenWeatherClient::new(
                        config.weather.api_key.clone(),
                        config.weather.city.clone(),
                    )?),
                );
                let scheduler = Scheduler::new(pipeline, slots, config.retry_policy());

                let cancel = CancellationToken::new();
                let trigger = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Ctrl-C received, stopping");
                        trigger.cancel();
                    }
                });

                scheduler.run(cancel).await?;
            }
        }

        Ok(())
    }
}

fn match_tolerance(flag: Option<i64>, config: &Config) -> Result<TimeDelta> {
    match flag {
        Some(m) => tolerance_from_minutes(m).context("Invalid --tolerance-minutes"),
        None => Ok(config.tolerance()),
    }
}
