use crate::activity::ActivityProber;
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::types::{Classification, Team};
use crate::vacation::VacationLedger;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Assessment (output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub classification: Classification,
    /// Most recent commit; `None` for an empty repository.
    pub last_commit: Option<DateTime<Utc>>,
    /// The instant compared against the deadline: last commit, else lock time.
    pub reference: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_hours")]
    pub credit: Duration,
    pub effective_deadline: DateTime<Utc>,
}

fn serialize_hours<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_hours())
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The status of a team whose reference instant is `last`.
///
/// Deadline checks run before the future-timestamp check, so a team that is
/// both past the deadline and dated in the future is `Stagnant`.
pub fn decide(
    last: DateTime<Utc>,
    deadline: DateTime<Utc>,
    credit: Duration,
    now: DateTime<Utc>,
) -> Classification {
    let effective = deadline - credit;
    if last <= effective {
        Classification::Stagnant
    } else if last - Duration::hours(24) <= effective {
        Classification::Warned
    } else if last > now {
        Classification::Cheat
    } else {
        Classification::Ok
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub struct Classifier<'a> {
    prober: ActivityProber<'a>,
    ledger: VacationLedger<'a>,
}

impl<'a> Classifier<'a> {
    pub fn new(prober: ActivityProber<'a>, ledger: VacationLedger<'a>) -> Self {
        Self { prober, ledger }
    }

    pub async fn classify(&self, team: &Team, ctx: &EvaluationContext) -> Result<Assessment> {
        let activity = self.prober.last_activity(team).await?;
        let last_commit = activity.last_commit();

        let Some(reference) = last_commit.or(team.locked_at) else {
            // Never committed and never locked: nothing to measure from.
            return Ok(Assessment {
                classification: Classification::Stagnant,
                last_commit: None,
                reference: None,
                credit: Duration::zero(),
                effective_deadline: ctx.deadline,
            });
        };

        let credit = if ctx.vacation_credit {
            self.ledger.team_credit(team, last_commit, ctx.deadline).await
        } else {
            Duration::zero()
        };

        Ok(Assessment {
            classification: decide(reference, ctx.deadline, credit, ctx.now),
            last_commit,
            reference: Some(reference),
            credit,
            effective_deadline: ctx.deadline - credit,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
