use crate::output::Output;
use crate::session::Session;
use anyhow::{Context, Result};
use hydra_registry::{ConfigLabel, Error};
use serde_json::Value;
use std::path::Path;

/// Upload a JSON config file under `label`
pub async fn push(session: &mut Session, label: &str, file: &Path) -> Result<Output> {
    ConfigLabel::parse(label)?;
    let text = async_fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read config file {}", file.display()))?;
    let payload: Value = serde_json::from_str(&text).map_err(|e| {
        Error::InvalidArguments(format!("{} is not valid JSON: {}", file.display(), e))
    })?;

    session
        .registry()
        .await?
        .push_config(label, &payload)
        .await?;
    Ok(Output::text(format!("Stored config {}", label)))
}

pub async fn pull(session: &mut Session, label: &str) -> Result<Output> {
    ConfigLabel::parse(label)?;
    let config = session.registry().await?.pull_config(label).await?;
    Ok(Output::Json(config))
}

/// Labels of one service, or of every service
pub async fn list(session: &mut Session, service: Option<String>) -> Result<Output> {
    let registry = session.registry().await?;
    let labels = match service {
        Some(service) => registry.list_config_versions(&service).await?,
        None => registry.list_all_config_versions().await?,
    };
    Output::json(&labels)
}

pub async fn remove(session: &mut Session, label: &str) -> Result<Output> {
    ConfigLabel::parse(label)?;
    let removed = session
        .registry()
        .await?
        .remove_config_version(label)
        .await?;

    if removed {
        Ok(Output::text(format!("Removed config {}", label)))
    } else {
        Ok(Output::text(format!("Config {} not found", label)))
    }
}
