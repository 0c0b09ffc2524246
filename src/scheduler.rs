//! Daily job timetable with bounded retries.
//!
//! At every slot the scrape, weather and match jobs run one after another.
//! Each job gets its own [`RetryPolicy`]; an exhausted job is logged and the
//! chain moves on. Every wait (attempt, backoff, sleep until the next slot)
//! races the cancellation token, so Ctrl-C stops the loop promptly.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    /// Upper bound for a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(10),
            timeout: Duration::from_secs(180),
        }
    }
}

/// Parses `"10:00, 16:20"` into sorted, de-duplicated times of day.
pub fn parse_schedule(raw: &str) -> Result<Vec<NaiveTime>> {
    let mut slots = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let slot = NaiveTime::parse_from_str(part, "%H:%M")
            .with_context(|| format!("'{}' is not an HH:MM time", part))?;
        slots.push(slot);
    }
    if slots.is_empty() {
        bail!("schedule has no time slots");
    }
    slots.sort();
    slots.dedup();
    Ok(slots)
}

/// First slot strictly after `now`, rolling over to tomorrow.
pub fn next_slot(now: NaiveDateTime, slots: &[NaiveTime]) -> Option<NaiveDateTime> {
    let today = now.date();
    slots
        .iter()
        .map(|slot| today.and_time(*slot))
        .find(|candidate| *candidate > now)
        .or_else(|| {
            let first = slots.first()?;
            let tomorrow = today.succ_opt()?;
            Some(tomorrow.and_time(*first))
        })
}

/// Runs `operation` until it succeeds or the policy is used up.
pub async fn run_with_retry<T, F, Fut>(
    name: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, SchedulerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(SchedulerError::Cancelled);
        }
        info!(job = name, attempt, "starting attempt");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SchedulerError::Cancelled),
            outcome = tokio::time::timeout(policy.timeout, operation()) => outcome,
        };

        match outcome {
            Ok(Ok(value)) => {
                info!(job = name, attempt, "job finished");
                return Ok(value);
            }
            Ok(Err(e)) => warn!(job = name, attempt, error = ?e, "attempt failed"),
            Err(_) => warn!(
                job = name,
                attempt,
                timeout_secs = policy.timeout.as_secs(),
                "attempt timed out"
            ),
        }

        if attempt < policy.max_attempts {
            info!(job = name, backoff_secs = policy.backoff.as_secs(), "retrying after backoff");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SchedulerError::Cancelled),
                _ = tokio::time::sleep(policy.backoff) => {}
            }
        }
    }

    error!(job = name, attempts = policy.max_attempts, "all attempts failed");
    Err(SchedulerError::Exhausted {
        job: name.to_string(),
        attempts: policy.max_attempts,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    ScrapeDraws,
    FetchWeather,
    Match,
}

impl Job {
    /// Order in which a slot runs the jobs.
    pub const CHAIN: [Job; 3] = [Job::ScrapeDraws, Job::FetchWeather, Job::Match];

    pub fn as_str(&self) -> &'static str {
        match self {
            Job::ScrapeDraws => "scrape-draws",
            Job::FetchWeather => "fetch-weather",
            Job::Match => "match",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, job: Job) -> Result<()>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlotReport {
    pub succeeded: Vec<Job>,
    pub failed: Vec<Job>,
}

pub struct Scheduler<R> {
    runner: R,
    slots: Vec<NaiveTime>,
    policy: RetryPolicy,
}

impl<R: JobRunner> Scheduler<R> {
    pub fn new(runner: R, slots: Vec<NaiveTime>, policy: RetryPolicy) -> Self {
        Self {
            runner,
            slots,
            policy,
        }
    }

    /// Runs the whole job chain once.
    pub async fn run_slot(&self, cancel: &CancellationToken) -> Result<SlotReport, SchedulerError> {
        let mut report = SlotReport::default();

        for job in Job::CHAIN {
            match run_with_retry(job.as_str(), &self.policy, cancel, || self.runner.run_job(job)).await {
                Ok(()) => report.succeeded.push(job),
                Err(SchedulerError::Cancelled) => return Err(SchedulerError::Cancelled),
                Err(e) => {
                    error!(job = %job, error = %e, "job gave up until the next slot");
                    report.failed.push(job);
                }
            }
        }

        Ok(report)
    }

    /// Sleeps until each slot and runs the chain, until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let slots: Vec<String> = self
            .slots
            .iter()
            .map(|s| s.format("%H:%M").to_string())
            .collect();
        info!(slots = %slots.join(", "), "scheduler started");

        loop {
            let now = Local::now().naive_local();
            let Some(next) = next_slot(now, &self.slots) else {
                bail!("schedule has no time slots");
            };
            let wait = (next - now).max(TimeDelta::zero()).to_std().unwrap_or_default();
            info!(next = %next, wait_secs = wait.as_secs(), "waiting for next slot");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            match self.run_slot(&cancel).await {
                Ok(report) => info!(
                    succeeded = report.succeeded.len(),
                    failed = report.failed.len(),
                    "slot finished"
                ),
                Err(SchedulerError::Cancelled) => break,
                Err(e) => error!(error = %e, "slot failed"),
            }
        }

        info!("scheduler stopped");
        Ok(())
    }
}
