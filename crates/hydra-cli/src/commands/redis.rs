use crate::output::Output;
use crate::session::Session;
use anyhow::{Context, Result};
use async_process::{Command, Stdio};
use tracing::debug;

pub async fn info(session: &mut Session) -> Result<Output> {
    let report = session.registry().await?.redis_info().await?;
    Ok(Output::Text(report.replace("\r\n", "\n").trim_end().to_string()))
}

/// Hand the terminal to `redis-cli` connected with the active profile
pub async fn shell(session: &mut Session) -> Result<Output> {
    let profile = session.active_profile()?;

    let mut command = Command::new("redis-cli");
    command
        .arg("-h")
        .arg(&profile.redis_url)
        .arg("-p")
        .arg(profile.redis_port.to_string())
        .arg("-n")
        .arg(profile.redis_db.to_string());
    if let Some(password) = &profile.redis_password {
        command.arg("-a").arg(password).arg("--no-auth-warning");
    }
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    debug!("Launching redis-cli for profile '{}'", profile.name);
    let status = command
        .status()
        .await
        .context("Failed to launch redis-cli; is it installed?")?;

    if status.success() {
        Ok(Output::Empty)
    } else {
        Ok(Output::text(format!("redis-cli exited with {}", status)))
    }
}
