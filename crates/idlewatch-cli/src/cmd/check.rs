use crate::output::print_json;
use anyhow::Context;
use idlewatch_core::cache::Cache;
use idlewatch_core::config::Secrets;
use idlewatch_core::directory::DirectoryClient;
use idlewatch_core::notify::{time_elapsed, Sendmail};
use idlewatch_core::run::{check_team, CheckResult, Services};
use idlewatch_core::transport::SshSession;
use idlewatch_core::vacation::PortalClient;
use std::path::Path;

pub async fn run(config_path: &Path, team_id: u64, json: bool) -> anyhow::Result<()> {
    let (config, ctx) = super::load(config_path)?;
    let secrets = Secrets::from_env().context("missing credentials")?;
    let http = reqwest::Client::new();

    let session = SshSession::open(&config.repository)
        .await
        .context("failed to open repository host session")?;
    let directory = DirectoryClient::new(
        http.clone(),
        &config.directory,
        secrets.client_id,
        secrets.client_secret,
    );
    let vacations = PortalClient::new(
        http,
        config.vacations.endpoint.clone(),
        secrets.vacations_token,
        ctx.offset,
    );
    // Never invoked: a check does not act.
    let mailer = Sendmail::new(config.mail.sendmail.clone(), config.mail.from.clone());

    let services = Services {
        directory: &directory,
        vacations: &vacations,
        exec: &session,
        mailer: &mailer,
    };
    let mut cache = Cache::new();
    let result = check_team(&config, &ctx, services, &mut cache, team_id).await;
    session.close().await;
    let result = result.with_context(|| format!("failed to check team {team_id}"))?;

    if json {
        print_json(&result)?;
    } else {
        print_result(&result, ctx.now);
    }
    Ok(())
}

fn print_result(result: &CheckResult, now: chrono::DateTime<chrono::Utc>) {
    let a = &result.assessment;
    println!(
        "Team {} ({}): {}",
        result.team.id,
        result.project,
        result.team.login_list()
    );
    println!("Status:             {}", a.classification);
    match a.last_commit {
        Some(t) => println!("Last commit:        {t} ({})", time_elapsed(Some(t), now)),
        None => println!("Last commit:        never"),
    }
    if let Some(locked) = result.team.locked_at {
        println!("Locked:             {locked}");
    }
    println!("Vacation credit:    {}h", a.credit.num_hours());
    println!("Effective deadline: {}", a.effective_deadline);
    println!("Planned action:     {}", result.planned);
}
