use crate::output::Output;
use crate::session::Session;
use anyhow::{Context, Result};
use hydra_registry::{Envelope, check_rest_args};
use std::path::{Path, PathBuf};

/// Print a message skeleton to fill in
pub fn create() -> Result<Output> {
    Ok(Output::Json(Envelope::template()))
}

pub async fn send(session: &mut Session, file: &Path) -> Result<Output> {
    let envelope = read_envelope(file).await?;
    session.registry().await?.send_message(&envelope).await?;
    Ok(Output::text(format!("Sent message {} to {}", envelope.mid, envelope.to)))
}

pub async fn queue(session: &mut Session, file: &Path) -> Result<Output> {
    let envelope = read_envelope(file).await?;
    session.registry().await?.queue_message(&envelope).await?;
    Ok(Output::text(format!("Queued message {} for {}", envelope.mid, envelope.to)))
}

/// Call a service endpoint and print its reply
pub async fn rest(session: &mut Session, route: &str, payload: Option<PathBuf>) -> Result<Output> {
    // Rejected requests never open a connection
    check_rest_args(route, payload.as_deref())?;

    let response = session
        .registry()
        .await?
        .rest_invoke(route, payload.as_deref())
        .await?;
    Output::json(&response)
}

async fn read_envelope(file: &Path) -> Result<Envelope> {
    let text = async_fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read message file {}", file.display()))?;
    Ok(Envelope::from_json(&text)?)
}
