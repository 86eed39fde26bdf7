use crate::output::Output;
use crate::session::Session;
use anyhow::Result;
use hydra_registry::NodeFilter;
use std::time::Duration;

pub async fn list(session: &mut Session, service: Option<String>, active: bool) -> Result<Output> {
    let mut filter = NodeFilter::all();
    if let Some(service) = service {
        filter = filter.service(service);
    }
    if active {
        filter = filter.active_within(session.settings().active_threshold);
    }

    let nodes = session.registry().await?.list_nodes(&filter).await?;
    Output::json(&nodes)
}

/// Drop instances that stopped heartbeating
pub async fn refresh(session: &mut Session, stale_after: Option<u64>) -> Result<Output> {
    let threshold = stale_after
        .map(Duration::from_secs)
        .unwrap_or(session.settings().stale_threshold);

    let removed = session
        .registry()
        .await?
        .prune_stale_nodes(threshold)
        .await?;
    Ok(Output::text(format!(
        "Removed {} stale node(s) older than {}s",
        removed,
        threshold.as_secs()
    )))
}
