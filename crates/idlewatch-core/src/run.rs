//! One assessment pass over every eligible team.
//!
//! Teams are evaluated one at a time in selection order. Selection failures
//! abort the pass; anything that goes wrong for a single team is logged,
//! recorded in its report row, and the pass moves on.

use crate::activity::ActivityProber;
use crate::cache::Cache;
use crate::classifier::{Assessment, Classifier};
use crate::config::Config;
use crate::context::EvaluationContext;
use crate::directory::Directory;
use crate::dispatcher::{plan, Action, Dispatcher};
use crate::eligibility::{select, SelectionCriteria};
use crate::error::Result;
use crate::notify::{Composer, Mailer};
use crate::summary::{Outcome, ReportRow, RunReport};
use crate::transport::RemoteExec;
use crate::types::Team;
use crate::vacation::{VacationLedger, VacationSource};
use serde::Serialize;

/// External collaborators of a pass.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub directory: &'a dyn Directory,
    pub vacations: &'a dyn VacationSource,
    pub exec: &'a dyn RemoteExec,
    pub mailer: &'a dyn Mailer,
}

impl<'a> Services<'a> {
    fn classifier<'c>(&self, config: &'c Config) -> Classifier<'c>
    where
        'a: 'c,
    {
        Classifier::new(
            ActivityProber::new(self.exec, &config.repository.base_path),
            VacationLedger::new(self.vacations),
        )
    }
}

pub async fn run_pass(
    config: &Config,
    ctx: &EvaluationContext,
    services: Services<'_>,
    cache: &mut Cache,
    dry_run: bool,
) -> Result<RunReport> {
    let criteria = SelectionCriteria::new(config, ctx);
    let teams = select(services.directory, cache, &criteria).await?;

    let classifier = services.classifier(config);
    let dispatcher = Dispatcher::new(
        services.directory,
        services.mailer,
        Composer::new(config, ctx),
        dry_run,
    );

    let mut report = RunReport::new(ctx.run_date(), dry_run);
    for mut team in teams {
        let project = cache.project_name(services.directory, team.project_id).await;
        let row = evaluate(&classifier, &dispatcher, cache, &mut team, &project, ctx).await;
        report.push(row);
    }

    for line in report.summary_lines() {
        tracing::info!("{line}");
    }
    Ok(report)
}

async fn evaluate(
    classifier: &Classifier<'_>,
    dispatcher: &Dispatcher<'_>,
    cache: &mut Cache,
    team: &mut Team,
    project: &str,
    ctx: &EvaluationContext,
) -> ReportRow {
    let assessment = match classifier.classify(team, ctx).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(team = team.id, project, logins = %team.login_list(), error = %e, "probe failed");
            return ReportRow::new(team, project, Outcome::Error(e.to_string()));
        }
    };
    tracing::info!(
        team = team.id,
        project,
        logins = %team.login_list(),
        status = %assessment.classification,
        "checked"
    );

    let mut row = ReportRow::new(team, project, Outcome::Classified(assessment.classification));
    row.last_update = assessment.last_commit;
    row.effective_deadline = Some(assessment.effective_deadline);

    match dispatcher
        .act(
            team,
            project,
            assessment.classification,
            assessment.last_commit,
            ctx,
        )
        .await
    {
        Ok(dispatch) => {
            if team.closed_at.is_some() {
                cache.insert_team(team.clone());
            }
            row.action = Some(dispatch.action);
            row.error = dispatch
                .notice_error
                .map(|e| format!("notice not delivered: {e}"));
        }
        Err(e) => {
            let action = plan(assessment.classification, ctx.prelaunch);
            tracing::warn!(team = team.id, %action, error = %e, "action failed");
            row.error = Some(format!("{action} failed: {e}"));
        }
    }
    row
}

// ---------------------------------------------------------------------------
// Single-team check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub team: Team,
    pub project: String,
    pub assessment: Assessment,
    /// What a live run would do with this team today.
    pub planned: Action,
}

/// Fetch, probe and classify one team without acting on it.
pub async fn check_team(
    config: &Config,
    ctx: &EvaluationContext,
    services: Services<'_>,
    cache: &mut Cache,
    team_id: u64,
) -> Result<CheckResult> {
    let team = cache.load_team(services.directory, team_id).await?;
    let project = cache.project_name(services.directory, team.project_id).await;
    let assessment = services.classifier(config).classify(&team, ctx).await?;
    let planned = plan(assessment.classification, ctx.prelaunch);
    Ok(CheckResult {
        team,
        project,
        assessment,
        planned,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
