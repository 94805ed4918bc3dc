//! Periodic maintenance. Each job is its own plugin so a failing sweep never
//! delays another; every job is idempotent and safe to skip.

use crate::{prelude::*, state::AppState};

/// Wall-clock cadence in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
  Hourly,
  DailyAt(u32),
  MonthlyAt { day: u32, hour: u32 },
}

impl Schedule {
  /// First firing strictly after `now`.
  pub fn next_after(self, now: DateTime) -> Result<DateTime> {
    let next = match self {
      Schedule::Hourly => {
        utils::start_of_day(now) + TimeDelta::hours(i64::from(now.hour()) + 1)
      }
      Schedule::DailyAt(hour) => {
        let at = utils::start_of_day(now) + TimeDelta::hours(i64::from(hour));
        if at > now { at } else { at + TimeDelta::days(1) }
      }
      Schedule::MonthlyAt { day, hour } => {
        let offset = |month: DateTime| {
          month
            + TimeDelta::days(i64::from(day.max(1) - 1))
            + TimeDelta::hours(i64::from(hour))
        };
        let at = offset(utils::start_of_month(now));
        if at > now {
          at
        } else {
          offset(utils::add_months(utils::start_of_month(now), 1)?)
        }
      }
    };
    Ok(next)
  }
}

#[async_trait]
pub trait Job: Send + Sync + 'static {
  const NAME: &'static str;
  const SCHEDULE: Schedule;

  /// Returns how many rows the run touched.
  async fn run(&self, app: &AppState, now: DateTime) -> Result<u64>;
}

pub struct Cron<J>(pub J);

#[async_trait]
impl<J: Job> super::Plugin for Cron<J> {
  fn name(&self) -> &'static str {
    J::NAME
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    loop {
      let next = J::SCHEDULE.next_after(now())?;
      let wait = (next - now()).to_std().unwrap_or(Duration::ZERO);
      debug!("Job `{}` next run at {}", J::NAME, utils::format_date(next));
      time::sleep(wait).await;

      match self.0.run(&app, now()).await {
        Ok(0) => debug!("Job `{}` had nothing to do", J::NAME),
        Ok(touched) => info!("Job `{}` processed {touched} row(s)", J::NAME),
        Err(err) => error!("Job `{}` failed: {err}", J::NAME),
      }
    }
  }
}

pub struct ExpireOrders;

#[async_trait]
impl Job for ExpireOrders {
  const NAME: &'static str = "expire-orders";
  const SCHEDULE: Schedule = Schedule::Hourly;

  async fn run(&self, app: &AppState, now: DateTime) -> Result<u64> {
    app.sv().order.expire_stale(now).await
  }
}

pub struct ExpireLicenses;

#[async_trait]
impl Job for ExpireLicenses {
  const NAME: &'static str = "expire-licenses";
  const SCHEDULE: Schedule = Schedule::DailyAt(0);

  async fn run(&self, app: &AppState, now: DateTime) -> Result<u64> {
    app.sv().license.expire_due(now).await
  }
}

pub struct RemindExpiring;

#[async_trait]
impl Job for RemindExpiring {
  const NAME: &'static str = "remind-expiring";
  const SCHEDULE: Schedule = Schedule::DailyAt(9);

  async fn run(&self, app: &AppState, now: DateTime) -> Result<u64> {
    let sent = app
      .sv()
      .license
      .remind_expiring(now, app.config.reminder_window_days)
      .await?;
    Ok(sent as u64)
  }
}

/// Drops expired sessions along with idle OTP entries and seat locks.
pub struct PurgeSessions;

#[async_trait]
impl Job for PurgeSessions {
  const NAME: &'static str = "purge-sessions";
  const SCHEDULE: Schedule = Schedule::Hourly;

  async fn run(&self, app: &AppState, now: DateTime) -> Result<u64> {
    let purged = app.sv().session.purge_expired(now).await?;
    let evicted = app.store.gc();
    app.seats.gc();

    if evicted > 0 {
      debug!("Evicted {evicted} ephemeral entries");
    }
    Ok(purged)
  }
}

pub struct PurgeActivity;

#[async_trait]
impl Job for PurgeActivity {
  const NAME: &'static str = "purge-activity";
  const SCHEDULE: Schedule = Schedule::MonthlyAt { day: 1, hour: 0 };

  async fn run(&self, app: &AppState, now: DateTime) -> Result<u64> {
    let cutoff = now - TimeDelta::days(app.config.activity_retention_days);
    app.sv().usage.purge_older_than(cutoff).await
  }
}
