//! Daily sweep returning lapsed subscriptions to the free tier

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use common::AppResult;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::repositories::PaymentStore;

/// Midnight every day
pub const DEFAULT_SCHEDULE: &str = "0 0 0 * * *";

/// Offset the schedule is read in (IST)
pub const SCHEDULE_UTC_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

#[derive(Clone)]
pub struct PlanExpiryJob {
    store: Arc<dyn PaymentStore>,
}

impl PlanExpiryJob {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let expired = self.store.expire_lapsed_plans(now).await?;
        info!("Plan expiry sweep moved {} users to the free tier", expired);
        Ok(expired)
    }

    /// Register the sweep with a scheduler and start it
    pub async fn start(&self, schedule: &str) -> Result<JobScheduler> {
        let job_runner = self.clone();
        let timezone = FixedOffset::east_opt(SCHEDULE_UTC_OFFSET_SECONDS)
            .ok_or_else(|| anyhow::anyhow!("Invalid schedule offset"))?;

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async_tz(schedule, timezone, move |_, _| {
            let job_runner = job_runner.clone();
            Box::pin(async move {
                info!("Plan expiry job executed");
                if let Err(e) = job_runner.run_once(Utc::now()).await {
                    error!("Plan expiry sweep failed: {}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started plan expiry scheduler with schedule: {}", schedule);
        Ok(scheduler)
    }
}
