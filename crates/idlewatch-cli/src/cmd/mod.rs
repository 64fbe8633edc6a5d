pub mod check;
pub mod config;
pub mod run;

use anyhow::Context;
use chrono::Utc;
use idlewatch_core::config::Config;
use idlewatch_core::context::EvaluationContext;
use std::path::Path;

/// Load the config and fix the run's clock.
pub fn load(path: &Path) -> anyhow::Result<(Config, EvaluationContext)> {
    let config =
        Config::load(path).with_context(|| format!("failed to load {}", path.display()))?;
    let ctx = EvaluationContext::new(&config, Utc::now()).context("invalid campus settings")?;
    tracing::debug!(
        deadline = %ctx.deadline,
        prelaunch = ctx.prelaunch,
        "evaluation context"
    );
    Ok((config, ctx))
}
