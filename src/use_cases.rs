use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, TimeDelta};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::api::{IngestOutcome, WeatherSource, ingest_weather};
use crate::config::Config;
use crate::database::SqliteStore;
use crate::matcher::{JoinOutcome, run_match};
use crate::reports;
use crate::scheduler::{Job, JobRunner};
use crate::scraper::{DrawSource, IngestSummary, ingest_draws};
use crate::store::ResultStore;
use crate::types::JoinedResult;

/// Opens the configured store. Called from blocking tasks only.
pub fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path, config.busy_timeout())
        .with_context(|| format!("Failed to open store at {}", config.database_path.display()))
}

async fn with_store<T, F>(config: &Arc<Config>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&SqliteStore) -> Result<T> + Send + 'static,
{
    let config = Arc::clone(config);
    tokio::task::spawn_blocking(move || {
        let store = open_store(&config)?;
        work(&store)
    })
    .await
    .context("store task panicked")?
}

pub struct DrawUseCase {
    config: Arc<Config>,
    source: Box<dyn DrawSource>,
}

impl DrawUseCase {
    pub fn new(config: Arc<Config>, source: Box<dyn DrawSource>) -> Self {
        Self { config, source }
    }

    /// Checks the store, scrapes the archive and inserts new draws.
    pub async fn scrape(&self) -> Result<IngestSummary> {
        // fail before touching the network when the store is down
        with_store(&self.config, |_| Ok(())).await?;

        let parsed = self.source.fetch_draws().await?;
        info!(
            draws = parsed.draws.len(),
            rejected = parsed.rejected,
            "archive parsed"
        );

        let draws = parsed.draws;
        with_store(&self.config, move |store| {
            ingest_draws(store, &draws).map_err(Into::into)
        })
        .await
    }
}

pub struct WeatherUseCase {
    config: Arc<Config>,
    source: Box<dyn WeatherSource>,
}

impl WeatherUseCase {
    pub fn new(config: Arc<Config>, source: Box<dyn WeatherSource>) -> Self {
        Self { config, source }
    }

    pub async fn fetch(&self) -> Result<IngestOutcome> {
        let record = self.source.fetch_current().await?;
        info!(
            temperature = record.temperature,
            humidity = record.humidity,
            pressure = record.pressure,
            wind = %record.wind_direction,
            precipitation = %record.precipitation,
            "weather sample received"
        );

        with_store(&self.config, move |store| {
            ingest_weather(store, &record).map_err(Into::into)
        })
        .await
    }
}

pub struct MatchUseCase {
    config: Arc<Config>,
}

impl MatchUseCase {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub async fn run(&self, tolerance: TimeDelta) -> Result<JoinOutcome> {
        with_store(&self.config, move |store| {
            run_match(store, tolerance).map_err(Into::into)
        })
        .await
    }
}

pub struct ReportUseCase {
    config: Arc<Config>,
}

impl ReportUseCase {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub async fn stored_results(&self) -> Result<Vec<JoinedResult>> {
        with_store(&self.config, |store| store.list_all().map_err(Into::into)).await
    }

    pub fn save_html(&self, outcome: &JoinOutcome, tolerance: TimeDelta) -> Result<PathBuf> {
        let generated_at = Local::now().naive_local();
        let html = reports::generate_html_report(outcome, tolerance, &generated_at);
        let filename = reports::report_file_name(&generated_at);
        reports::save_html_report_to_path(&html, &filename, &self.config.report_path)
    }
}

/// The job chain the scheduler runs at every slot.
pub struct Pipeline {
    draws: DrawUseCase,
    weather: WeatherUseCase,
    matching: MatchUseCase,
    tolerance: TimeDelta,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        draw_source: Box<dyn DrawSource>,
        weather_source: Box<dyn WeatherSource>,
    ) -> Self {
        let tolerance = config.tolerance();
        Self {
            draws: DrawUseCase::new(Arc::clone(&config), draw_source),
            weather: WeatherUseCase::new(Arc::clone(&config), weather_source),
            matching: MatchUseCase::new(config),
            tolerance,
        }
    }
}

#[async_trait]
impl JobRunner for Pipeline {
    async fn run_job(&self, job: Job) -> Result<()> {
        match job {
            Job::ScrapeDraws => {
                self.draws.scrape().await?;
            }
            Job::FetchWeather => {
                self.weather.fetch().await?;
            }
            Job::Match => {
                let outcome = self.matching.run(self.tolerance).await?;
                info!("{}", reports::summary_line(&outcome));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScrapeError, WeatherError};
    use crate::scraper::ParsedArchive;
    use crate::types::{DrawRecord, Precipitation, WeatherRecord, WindDirection};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    struct FixedDraws(Vec<DrawRecord>);

    #[async_trait]
    impl DrawSource for FixedDraws {
        async fn fetch_draws(&self) -> Result<ParsedArchive, ScrapeError> {
            Ok(ParsedArchive {
                draws: self.0.clone(),
                rejected: 0,
            })
        }
    }

    struct FixedWeather(WeatherRecord);

    #[async_trait]
    impl WeatherSource for FixedWeather {
        async fn fetch_current(&self) -> Result<WeatherRecord, WeatherError> {
            Ok(self.0.clone())
        }
    }

    fn config_in(dir: &tempfile::TempDir) -> Arc<Config> {
        Arc::new(Config {
            database_path: dir.path().join("db").join("lottery.db"),
            report_path: dir.path().join("reports"),
            log_dir: None,
            ..Config::default()
        })
    }

    fn pipeline(config: Arc<Config>) -> Pipeline {
        let draws = vec![
            DrawRecord {
                draw_number: 1001,
                draw_time: at(10, 0),
                numbers: [1, 2, 3, 4, 5, 6, 7, 8],
            },
            DrawRecord {
                draw_number: 1002,
                draw_time: at(9, 0),
                numbers: [8, 7, 6, 5, 4, 3, 2, 1],
            },
        ];
        let weather = WeatherRecord {
            observation_time: at(10, 7),
            temperature: 1.5,
            humidity: 90,
            pressure: 751,
            wind_speed: 2.25,
            wind_direction: WindDirection::NorthEast,
            precipitation: Precipitation::Drizzle,
        };
        Pipeline::new(
            config,
            Box::new(FixedDraws(draws)),
            Box::new(FixedWeather(weather)),
        )
    }

    #[tokio::test]
    async fn job_chain_fills_the_result_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        let pipeline = pipeline(Arc::clone(&config));

        for job in Job::CHAIN {
            pipeline.run_job(job).await.unwrap();
        }
        // the same sample again is tolerated
        pipeline.run_job(Job::FetchWeather).await.unwrap();

        let results = ReportUseCase::new(config).stored_results().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].draw.draw_number, 1001);
        assert_eq!(results[0].time_delta_minutes, 7);
    }

    #[tokio::test]
    async fn rescrape_skips_known_draws() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(config_in(&dir));

        let first = pipeline.draws.scrape().await.unwrap();
        let second = pipeline.draws.scrape().await.unwrap();
        assert_eq!(first, IngestSummary { added: 2, skipped: 0 });
        assert_eq!(second, IngestSummary { added: 0, skipped: 2 });
    }

    #[tokio::test]
    async fn html_report_lands_in_report_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        let pipeline = pipeline(Arc::clone(&config));
        pipeline.run_job(Job::ScrapeDraws).await.unwrap();

        let outcome = pipeline.matching.run(config.tolerance()).await.unwrap();
        assert_eq!(reports::summary_line(&outcome), "0 processed matches, 2 unmatched (total draws: 2)");

        let path = ReportUseCase::new(Arc::clone(&config))
            .save_html(&outcome, config.tolerance())
            .unwrap();
        assert!(path.starts_with(&config.report_path));
        assert!(path.exists());
    }
}
