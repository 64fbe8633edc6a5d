use crate::config::{Config, MAX_POLICY_DAYS};
use crate::error::{Result, WatchError};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// The UTC instant at which `date` begins in a zone `offset` away from UTC.
pub fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset.local_minus_utc()))))
}

fn policy_days(name: &str, days: i64) -> Result<Duration> {
    if !(0..=MAX_POLICY_DAYS).contains(&days) {
        return Err(WatchError::InvalidConfig(format!(
            "policy.{name}={days} must be between 0 and {MAX_POLICY_DAYS}"
        )));
    }
    Ok(Duration::days(days))
}

// ---------------------------------------------------------------------------
// EvaluationContext
// ---------------------------------------------------------------------------

/// Constants shared by every team evaluation in one run.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub now: DateTime<Utc>,
    /// Midnight-aligned instant; activity at or before it is stagnant.
    pub deadline: DateTime<Utc>,
    pub days_until_stagnant: i64,
    pub vacation_credit: bool,
    pub offset: FixedOffset,
    pub days_to_correct: i64,
    /// The run falls before the configured auto-closure launch date.
    pub prelaunch: bool,
}

impl EvaluationContext {
    pub fn new(config: &Config, now: DateTime<Utc>) -> Result<Self> {
        let offset = config.campus.offset()?;
        let today = now.with_timezone(&offset).date_naive();
        let threshold = policy_days("days_until_stagnant", config.policy.days_until_stagnant)?;
        policy_days("days_to_correct", config.policy.days_to_correct)?;
        let deadline = local_midnight(today, offset)
            .checked_sub_signed(threshold)
            .ok_or_else(|| {
                WatchError::InvalidConfig("policy.days_until_stagnant is out of range".into())
            })?;
        let prelaunch = config
            .policy
            .launch_date
            .is_some_and(|launch| now < local_midnight(launch, offset));
        Ok(Self {
            now,
            deadline,
            days_until_stagnant: config.policy.days_until_stagnant,
            vacation_credit: config.policy.vacation_credit,
            offset,
            days_to_correct: config.policy.days_to_correct,
            prelaunch,
        })
    }

    /// Upper bound of the creation-time range used for selection. One day
    /// past the deadline so never-locked teams can still be warned.
    pub fn look_ahead(&self) -> DateTime<Utc> {
        self.deadline + Duration::days(1)
    }

    pub fn correction_window(&self) -> Duration {
        Duration::days(self.days_to_correct.clamp(0, MAX_POLICY_DAYS))
    }

    /// Local calendar date of the run, used to title reports.
    pub fn run_date(&self) -> NaiveDate {
        self.now.with_timezone(&self.offset).date_naive()
    }
}
