//! Scheduled task runner
//!
//! Fires the nightly rollover, the monthly category reset and the evening
//! reflection reminder at wall-clock times (UTC) taken from [`ScheduleConfig`].
//! Jobs run one after another on a single tokio task. Each job is also a plain
//! async function so it can be triggered by hand.

use crate::{
    config::settings::{DailyAt, MonthlyAt, ScheduleConfig},
    core::{
        calendar,
        monthly::{MonthlyResetResult, process_monthly_reset},
        reflection::users_without_reflection,
        rollover::{DailyRunReport, run_daily_rollover},
        wishlist::promote_ready_items,
    },
    entities::user,
    errors::Result,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

/// When a job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every day at a time of day
    Daily(DailyAt),
    /// Every month on a day of month at a time of day
    Monthly(MonthlyAt),
}

fn at_time(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    calendar::start_of_day(date)
        + Duration::hours(i64::from(hour))
        + Duration::minutes(i64::from(minute))
}

impl Trigger {
    /// The first firing time strictly after `now`.
    #[must_use]
    pub fn next_after(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        match self {
            Self::Daily(at) => {
                let candidate = at_time(today, at.hour, at.minute);
                if candidate > now {
                    candidate
                } else {
                    candidate + Duration::days(1)
                }
            }
            Self::Monthly(at) => {
                // Configured days stop at 28, so the offset never leaves the month
                let offset = Duration::days(i64::from(at.day.saturating_sub(1)));
                let this_month = calendar::first_of_month(today) + offset;
                let candidate = at_time(this_month, at.hour, at.minute);
                if candidate > now {
                    candidate
                } else {
                    let next_month = calendar::first_of_next_month(today) + offset;
                    at_time(next_month, at.hour, at.minute)
                }
            }
        }
    }
}

/// The maintenance jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Evaluate yesterday for every user and promote wishlist items
    MidnightRollover,
    /// Reset category limits for the new month
    MonthlyReset,
    /// List users who have not reflected today
    ReflectionReminder,
}

impl Job {
    /// Every job, in the order they run when due together.
    pub const ALL: [Self; 3] = [
        Self::MidnightRollover,
        Self::MonthlyReset,
        Self::ReflectionReminder,
    ];

    /// The job's trigger under `config`.
    #[must_use]
    pub const fn trigger(self, config: &ScheduleConfig) -> Trigger {
        match self {
            Self::MidnightRollover => Trigger::Daily(config.midnight_rollover),
            Self::MonthlyReset => Trigger::Monthly(config.monthly_reset),
            Self::ReflectionReminder => Trigger::Daily(config.reflection_reminder),
        }
    }

    /// Runs the job once as of `now`.
    pub async fn run(self, db: &DatabaseConnection, now: DateTime<Utc>) -> Result<()> {
        match self {
            Self::MidnightRollover => run_midnight(db, now).await.map(|_| ()),
            Self::MonthlyReset => run_monthly_reset(db, now.date_naive()).await.map(|_| ()),
            Self::ReflectionReminder => run_reflection_reminder(db, now.date_naive())
                .await
                .map(|_| ()),
        }
    }
}

/// What the midnight job did
#[derive(Debug, Clone, Default)]
pub struct MidnightReport {
    /// The day that was evaluated
    pub evaluated_day: Option<NaiveDate>,
    /// Per-user outcome of the rollover
    pub rollover: DailyRunReport,
    /// Wishlist items moved to ready
    pub promoted_items: u64,
}

/// Evaluates the day before `now` for every user, then promotes wishlist items
/// whose cooldown has elapsed.
pub async fn run_midnight(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<MidnightReport> {
    let yesterday = now.date_naive() - Duration::days(1);
    let rollover = run_daily_rollover(db, yesterday).await?;
    let promoted_items = promote_ready_items(db, now).await?;
    info!(
        "Midnight job: evaluated {}, promoted {} wishlist items",
        yesterday, promoted_items
    );
    Ok(MidnightReport {
        evaluated_day: Some(yesterday),
        rollover,
        promoted_items,
    })
}

/// Resets category limits if this month's reset has not happened yet.
pub async fn run_monthly_reset(
    db: &DatabaseConnection,
    today: NaiveDate,
) -> Result<Option<MonthlyResetResult>> {
    let result = process_monthly_reset(db, today).await?;
    if result.is_none() {
        info!("Monthly reset already done for {}", today.format("%B %Y"));
    }
    Ok(result)
}

/// Finds users who have not reflected on `today`.
///
/// Delivery is left to the caller; the job only logs the audience.
pub async fn run_reflection_reminder(
    db: &DatabaseConnection,
    today: NaiveDate,
) -> Result<Vec<user::Model>> {
    let users = users_without_reflection(db, today).await?;
    for user in &users {
        info!("Reflection reminder due for user {} ({})", user.id, user.email);
    }
    info!("{} users still to reflect on {}", users.len(), today);
    Ok(users)
}

/// Runs the jobs on their triggers until shut down.
pub struct TaskRunner {
    db: DatabaseConnection,
    config: ScheduleConfig,
}

/// Handle to a started [`TaskRunner`]
pub struct RunnerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunnerHandle {
    /// Asks the runner to stop and waits for it. A job already running is finished first.
    pub async fn shutdown(self) {
        if self.shutdown_tx.send(true).is_err() {
            warn!("Task runner already stopped");
        }
        if let Err(e) = self.task.await {
            error!("Task runner ended abnormally: {}", e);
        }
    }
}

impl TaskRunner {
    /// Creates a runner over `db` with the given triggers.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: ScheduleConfig) -> Self {
        Self { db, config }
    }

    /// Spawns the runner loop.
    #[must_use]
    pub fn start(self) -> RunnerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        RunnerHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let now = Utc::now();
        let mut schedule: Vec<(Job, DateTime<Utc>)> = Job::ALL
            .iter()
            .map(|job| (*job, job.trigger(&self.config).next_after(now)))
            .collect();
        for (job, at) in &schedule {
            info!("Scheduled {:?} at {}", job, at);
        }

        loop {
            let Some(next) = schedule.iter().map(|(_, at)| *at).min() else {
                return;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Task runner stopping");
                        return;
                    }
                    continue;
                }
            }

            let fired_at = Utc::now();
            for (job, at) in &mut schedule {
                if *at > fired_at {
                    continue;
                }
                if let Err(e) = job.run(&self.db, fired_at).await {
                    error!("{:?} failed, retrying at its next trigger: {}", job, e);
                }
                *at = job.trigger(&self.config).next_after(fired_at);
            }
        }
    }
}
