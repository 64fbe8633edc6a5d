use crate::context::EvaluationContext;
use crate::directory::Directory;
use crate::error::Result;
use crate::notify::{Composer, Mailer, NoticeKind};
use crate::types::{Classification, Team};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Close the team, then send the closed notice.
    Close,
    /// Advance notice only; auto-closure is not live yet.
    Prelaunch,
    Warn,
    None,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Close => "close",
            Action::Prelaunch => "prelaunch",
            Action::Warn => "warn",
            Action::None => "none",
        }
    }

    fn notice(self) -> Option<NoticeKind> {
        match self {
            Action::Close => Some(NoticeKind::Closed),
            Action::Prelaunch => Some(NoticeKind::Prelaunch),
            Action::Warn => Some(NoticeKind::Warning),
            Action::None => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a classification calls for. Warnings are only sent once auto-closure
/// is live; before that a stagnant team gets the advance notice instead.
pub fn plan(classification: Classification, prelaunch: bool) -> Action {
    match (classification, prelaunch) {
        (Classification::Stagnant, true) => Action::Prelaunch,
        (Classification::Stagnant, false) => Action::Close,
        (Classification::Warned, false) => Action::Warn,
        (Classification::Warned, true) | (Classification::Cheat, _) | (Classification::Ok, _) => {
            Action::None
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// What [`Dispatcher::act`] did for one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub action: Action,
    pub notice_error: Option<String>,
}

impl Dispatch {
    fn done(action: Action) -> Self {
        Self {
            action,
            notice_error: None,
        }
    }
}

pub struct Dispatcher<'a> {
    directory: &'a dyn Directory,
    mailer: &'a dyn Mailer,
    composer: Composer<'a>,
    dry_run: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        directory: &'a dyn Directory,
        mailer: &'a dyn Mailer,
        composer: Composer<'a>,
        dry_run: bool,
    ) -> Self {
        Self {
            directory,
            mailer,
            composer,
            dry_run,
        }
    }

    /// Carry out the action for `classification`.
    ///
    /// A failed close propagates and suppresses the notice. A failed notice
    /// does not undo the close; it is returned in [`Dispatch::notice_error`].
    pub async fn act(
        &self,
        team: &mut Team,
        project_name: &str,
        classification: Classification,
        last_commit: Option<DateTime<Utc>>,
        ctx: &EvaluationContext,
    ) -> Result<Dispatch> {
        let action = plan(classification, ctx.prelaunch);
        if action == Action::None {
            return Ok(Dispatch::done(action));
        }
        if self.dry_run {
            tracing::info!(team = team.id, action = %action, "dry run: skipping action");
            return Ok(Dispatch::done(action));
        }

        if action == Action::Close {
            self.close(team, ctx).await?;
        }
        let mut dispatch = Dispatch::done(action);
        if let Some(kind) = action.notice() {
            if let Err(e) = self.notify(kind, team, project_name, last_commit).await {
                tracing::warn!(team = team.id, kind = kind.as_str(), error = %e, "notice not delivered");
                dispatch.notice_error = Some(e.to_string());
            }
        }
        Ok(dispatch)
    }

    async fn close(&self, team: &mut Team, ctx: &EvaluationContext) -> Result<()> {
        let closed_at = ctx.deadline;
        let terminating_at = closed_at + ctx.correction_window();
        self.directory
            .close_team(team.id, closed_at, terminating_at)
            .await?;
        team.closed_at = Some(closed_at);
        team.terminating_at = Some(terminating_at);
        tracing::info!(team = team.id, %terminating_at, "team closed");
        Ok(())
    }

    async fn notify(
        &self,
        kind: NoticeKind,
        team: &Team,
        project_name: &str,
        last_commit: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let notice = self.composer.compose(kind, team, project_name, last_commit)?;
        self.mailer.send(&notice).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::{ctx, deadline, team};
    use crate::directory::tests::FakeDirectory;
    use crate::notify::tests::FakeMailer;
    use chrono::Duration;

    #[test]
    fn action_table() {
        use Classification::*;
        assert_eq!(plan(Stagnant, false), Action::Close);
        assert_eq!(plan(Stagnant, true), Action::Prelaunch);
        assert_eq!(plan(Warned, false), Action::Warn);
        assert_eq!(plan(Warned, true), Action::None);
        assert_eq!(plan(Cheat, false), Action::None);
        assert_eq!(plan(Cheat, true), Action::None);
        assert_eq!(plan(Ok, false), Action::None);
        assert_eq!(plan(Ok, true), Action::None);
    }

    #[tokio::test]
    async fn stagnant_team_is_closed_then_notified() {
        let cfg = crate::config::tests::sample();
        let ctx = ctx(true);
        let directory = FakeDirectory::default();
        let mailer = FakeMailer::default();
        let dispatcher =
            Dispatcher::new(&directory, &mailer, Composer::new(&cfg, &ctx), false);

        let mut t = team(None, Some(deadline() - Duration::days(10)));
        let dispatch = dispatcher
            .act(&mut t, "ft_ls", Classification::Stagnant, None, &ctx)
            .await
            .unwrap();

        assert_eq!(dispatch, Dispatch::done(Action::Close));
        let closed = directory.closed.lock().unwrap();
        assert_eq!(
            closed.as_slice(),
            &[(42, deadline(), deadline() + Duration::days(7))]
        );
        assert_eq!(t.closed_at, Some(deadline()));
        assert_eq!(t.terminating_at, Some(deadline() + Duration::days(7)));
        assert_eq!(mailer.kinds(), vec![NoticeKind::Closed]);
    }

    #[tokio::test]
    async fn failed_close_leaves_team_untouched_and_sends_nothing() {
        let cfg = crate::config::tests::sample();
        let ctx = ctx(true);
        let directory = FakeDirectory {
            fail_close: true,
            ..FakeDirectory::default()
        };
        let mailer = FakeMailer::default();
        let dispatcher =
            Dispatcher::new(&directory, &mailer, Composer::new(&cfg, &ctx), false);

        let mut t = team(None, None);
        let result = dispatcher
            .act(&mut t, "ft_ls", Classification::Stagnant, None, &ctx)
            .await;

        assert!(result.is_err());
        assert!(t.closed_at.is_none());
        assert!(t.terminating_at.is_none());
        assert!(mailer.kinds().is_empty());
    }

    #[tokio::test]
    async fn warned_team_gets_warning_only() {
        let cfg = crate::config::tests::sample();
        let ctx = ctx(true);
        let directory = FakeDirectory::default();
        let mailer = FakeMailer::default();
        let dispatcher =
            Dispatcher::new(&directory, &mailer, Composer::new(&cfg, &ctx), false);

        let mut t = team(None, None);
        let last = Some(deadline() + Duration::hours(23));
        let dispatch = dispatcher
            .act(&mut t, "ft_ls", Classification::Warned, last, &ctx)
            .await
            .unwrap();

        assert_eq!(dispatch.action, Action::Warn);
        assert!(directory.closed.lock().unwrap().is_empty());
        assert_eq!(mailer.kinds(), vec![NoticeKind::Warning]);
    }

    #[tokio::test]
    async fn prelaunch_run_only_notifies_stagnant_teams() {
        let cfg = crate::config::tests::sample();
        let mut ctx = ctx(true);
        ctx.prelaunch = true;
        let directory = FakeDirectory::default();
        let mailer = FakeMailer::default();
        let dispatcher =
            Dispatcher::new(&directory, &mailer, Composer::new(&cfg, &ctx), false);

        let mut t = team(None, None);
        for c in Classification::all() {
            dispatcher.act(&mut t, "ft_ls", *c, None, &ctx).await.unwrap();
        }
        assert!(directory.closed.lock().unwrap().is_empty());
        assert_eq!(mailer.kinds(), vec![NoticeKind::Prelaunch]);
    }

    #[tokio::test]
    async fn notice_failure_does_not_undo_close() {
        let cfg = crate::config::tests::sample();
        let ctx = ctx(true);
        let directory = FakeDirectory::default();
        let mailer = FakeMailer::failing();
        let dispatcher =
            Dispatcher::new(&directory, &mailer, Composer::new(&cfg, &ctx), false);

        let mut t = team(None, None);
        let dispatch = dispatcher
            .act(&mut t, "ft_ls", Classification::Stagnant, None, &ctx)
            .await
            .unwrap();
        assert_eq!(dispatch.action, Action::Close);
        assert!(dispatch.notice_error.is_some());
        assert_eq!(t.closed_at, Some(deadline()));
        assert_eq!(directory.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notice_for_team_without_members_is_reported() {
        let cfg = crate::config::tests::sample();
        let ctx = ctx(true);
        let directory = FakeDirectory::default();
        let mailer = FakeMailer::default();
        let dispatcher =
            Dispatcher::new(&directory, &mailer, Composer::new(&cfg, &ctx), false);

        let mut t = team(None, None);
        t.users.clear();
        let dispatch = dispatcher
            .act(&mut t, "ft_ls", Classification::Warned, None, &ctx)
            .await
            .unwrap();
        assert_eq!(dispatch.action, Action::Warn);
        assert!(dispatch.notice_error.unwrap().contains("42"));
        assert!(mailer.kinds().is_empty());
    }

    #[tokio::test]
    async fn dry_run_has_no_side_effects() {
        let cfg = crate::config::tests::sample();
        let ctx = ctx(true);
        let directory = FakeDirectory::default();
        let mailer = FakeMailer::default();
        let dispatcher = Dispatcher::new(&directory, &mailer, Composer::new(&cfg, &ctx), true);

        let mut t = team(None, None);
        let dispatch = dispatcher
            .act(&mut t, "ft_ls", Classification::Stagnant, None, &ctx)
            .await
            .unwrap();
        assert_eq!(dispatch.action, Action::Close);
        assert!(directory.closed.lock().unwrap().is_empty());
        assert!(mailer.kinds().is_empty());
        assert!(t.closed_at.is_none());
    }
}
