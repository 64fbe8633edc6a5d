use crate::output::{print_json, print_table};
use anyhow::Context;
use idlewatch_core::cache::Cache;
use idlewatch_core::config::Secrets;
use idlewatch_core::directory::DirectoryClient;
use idlewatch_core::notify::Sendmail;
use idlewatch_core::run::{run_pass, Services};
use idlewatch_core::summary::{publish, REPORT_HEADERS};
use idlewatch_core::transport::SshSession;
use idlewatch_core::vacation::PortalClient;
use std::path::Path;

pub async fn run(config_path: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let (config, ctx) = super::load(config_path)?;
    let secrets = Secrets::from_env().context("missing credentials")?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("idlewatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")?;

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
        http.clone(),
        config.vacations.endpoint.clone(),
        secrets.vacations_token,
        ctx.offset,
    );
    let mailer = Sendmail::new(config.mail.sendmail.clone(), config.mail.from.clone());

    let outcome = async {
        directory
            .authenticate()
            .await
            .context("directory authentication failed")?;
        let services = Services {
            directory: &directory,
            vacations: &vacations,
            exec: &session,
            mailer: &mailer,
        };
        let mut cache = Cache::new();
        run_pass(&config, &ctx, services, &mut cache, dry_run)
            .await
            .context("team selection failed")
    }
    .await;
    session.close().await;
    let report = outcome?;

    if json {
        print_json(&report)?;
    } else {
        print_table(&REPORT_HEADERS, &report.table_rows());
        println!();
        for line in report.summary_lines() {
            println!("{line}");
        }
    }

    match (&config.summary.channel, &secrets.chat_token) {
        (Some(_), _) if dry_run => tracing::info!("dry run: report not published"),
        (Some(channel), Some(token)) => {
            if let Err(e) = publish(&http, &config.summary.api_url, token, channel, &report).await
            {
                tracing::warn!(error = %e, "report upload failed");
            }
        }
        (Some(_), None) => tracing::warn!("summary channel set without a chat token"),
        (None, _) => {}
    }

    Ok(())
}
