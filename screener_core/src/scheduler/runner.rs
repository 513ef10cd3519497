use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::cron::CronExpr;
use super::guard::InFlightGuard;
use crate::credentials::refresher::{SweepReport, TokenRefresher};
use crate::pipeline::engine::ScreeningPipeline;
use crate::pipeline::models::TickReport;
use crate::Result;

/// Cadences of the two independent triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub tick: CronExpr,
    pub sweep: CronExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Started,
    /// A previous tick was still running; this trigger was dropped.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Pipeline,
    Sweep,
}

/// Drives the pipeline tick and the token sweep from their cron expressions.
///
/// Ticks run as their own task so the timer keeps firing while a long paced batch
/// is in progress; the in-flight guard drops a trigger that arrives meanwhile.
pub struct Scheduler {
    pipeline: Arc<ScreeningPipeline>,
    refresher: Arc<TokenRefresher>,
    schedule: ScheduleConfig,
    in_flight: InFlightGuard,
    current: Mutex<Option<JoinHandle<TickReport>>>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<ScreeningPipeline>,
        refresher: Arc<TokenRefresher>,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            pipeline,
            refresher,
            schedule,
            in_flight: InFlightGuard::new(),
            current: Mutex::new(None),
        }
    }

    /// Run both schedules until `shutdown` resolves, then wait for an in-flight tick.
    #[tracing::instrument(level = "info", skip(self, shutdown), fields(tick = %self.schedule.tick, sweep = %self.schedule.sweep))]
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tracing::info!("scheduler started");
        tokio::select! {
            r = self.cron_loop(Job::Pipeline) => r?,
            r = self.cron_loop(Job::Sweep) => r?,
            _ = shutdown => tracing::info!("shutdown requested; no new ticks will start"),
        }
        if self.in_flight.is_busy() {
            tracing::info!("waiting for the in-flight tick to finish");
        }
        self.wait_in_flight().await;
        tracing::info!("scheduler stopped");
        Ok(())
    }

    async fn cron_loop(&self, job: Job) -> Result<()> {
        let cron = match job {
            Job::Pipeline => &self.schedule.tick,
            Job::Sweep => &self.schedule.sweep,
        };
        loop {
            let wait = cron.until_next(Utc::now())?;
            tokio::time::sleep(wait).await;
            match job {
                Job::Pipeline => {
                    self.fire_pipeline().await;
                }
                Job::Sweep => {
                    self.run_sweep().await;
                }
            }
        }
    }

    /// Start a tick in the background unless one is already running.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fire_pipeline(&self) -> FireOutcome {
        let Some(permit) = self.in_flight.try_acquire() else {
            tracing::warn!("previous tick still running; trigger dropped");
            return FireOutcome::Skipped;
        };
        let pipeline = self.pipeline.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            pipeline.run_tick().await
        });
        *self.current.lock().await = Some(handle);
        FireOutcome::Started
    }

    /// Await the most recently started tick, if any.
    pub async fn wait_in_flight(&self) -> Option<TickReport> {
        let handle = self.current.lock().await.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "tick task did not complete");
                None
            }
        }
    }

    /// Refresh every stored identity now. Errors are logged.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn run_sweep(&self) -> Option<SweepReport> {
        match self.refresher.sweep(Utc::now()).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "token sweep failed");
                None
            }
        }
    }
}
