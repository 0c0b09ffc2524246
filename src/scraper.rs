use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ScrapeError, StoreError};
use crate::html;
use crate::store::DrawStore;
use crate::types::{DrawRecord, NUMBERS_PER_DRAW};
use crate::utils::{parse_draw_number, parse_draw_time};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
// The archive table opens with two header rows.
const HEADER_ROWS: usize = 2;
const MIN_CELLS: usize = 4;

#[async_trait]
pub trait DrawSource: Send + Sync {
    async fn fetch_draws(&self) -> Result<ParsedArchive, ScrapeError>;
}

pub struct ArchiveScraper {
    url: String,
    http: Client,
}

impl ArchiveScraper {
    pub fn new(url: impl Into<String>) -> Result<Self, ScrapeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl DrawSource for ArchiveScraper {
    async fn fetch_draws(&self) -> Result<ParsedArchive, ScrapeError> {
        info!(url = %self.url, "loading draw archive");
        let res = self.http.get(&self.url).send().await?;

        check_status(res.status())?;

        let body = res.text().await?;
        parse_archive(&body)
    }
}

fn check_status(status: StatusCode) -> Result<(), ScrapeError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ScrapeError::Status { status })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedArchive {
    pub draws: Vec<DrawRecord>,
    /// Data rows that could not be turned into a draw.
    pub rejected: usize,
}

pub fn parse_archive(body: &str) -> Result<ParsedArchive, ScrapeError> {
    let table = html::first_element(body, "table").ok_or(ScrapeError::MissingTable)?;
    let rows = html::elements(table, "tr");
    debug!(rows = rows.len(), "archive table found");

    let mut parsed = ParsedArchive::default();
    for row in rows.into_iter().skip(HEADER_ROWS) {
        let cells: Vec<String> = html::elements(row, "td")
            .into_iter()
            .map(|cell| html::text(html::inner(cell).unwrap_or_default()))
            .collect();
        if cells.len() < MIN_CELLS {
            continue;
        }

        match parse_row(&cells) {
            Some(draw) => parsed.draws.push(draw),
            None => parsed.rejected += 1,
        }
    }

    Ok(parsed)
}

fn parse_row(cells: &[String]) -> Option<DrawRecord> {
    let numbers: Vec<i32> = cells[2]
        .split_whitespace()
        .filter(|token| token.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|token| token.parse().ok())
        .collect();
    if numbers.len() < NUMBERS_PER_DRAW {
        debug!(cell = %cells[2], "row has fewer than 8 numbers");
        return None;
    }

    let Some(draw_number) = parse_draw_number(&cells[1]) else {
        debug!(cell = %cells[1], "row has no draw number");
        return None;
    };
    let Some(draw_time) = parse_draw_time(&cells[0]) else {
        warn!(draw = draw_number, date = %cells[0], "unparsable draw date, row skipped");
        return None;
    };

    let mut balls = [0; NUMBERS_PER_DRAW];
    balls.copy_from_slice(&numbers[..NUMBERS_PER_DRAW]);

    Some(DrawRecord {
        draw_number,
        draw_time,
        numbers: balls,
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Inserts every draw not yet stored. Existing draw numbers count as skipped.
pub fn ingest_draws<S: DrawStore>(store: &S, draws: &[DrawRecord]) -> Result<IngestSummary, StoreError> {
    let mut summary = IngestSummary::default();

    for draw in draws {
        if store.insert_draw(draw)? {
            info!(draw = draw.draw_number, time = %draw.draw_time, "draw added");
            summary.added += 1;
        } else {
            summary.skipped += 1;
        }
    }

    info!(
        added = summary.added,
        skipped = summary.skipped,
        "draw ingest finished"
    );
    Ok(summary)
}
