use crate::output::Output;
use crate::session::Session;
use anyhow::Result;

pub async fn routes(session: &mut Session, service: Option<String>) -> Result<Output> {
    let routes = session
        .registry()
        .await?
        .list_routes(service.as_deref())
        .await?;
    Output::json(&routes)
}

pub async fn services(session: &mut Session, service: Option<String>) -> Result<Output> {
    let services = session
        .registry()
        .await?
        .list_services(service.as_deref())
        .await?;
    Output::json(&services)
}

pub async fn health(session: &mut Session, service: Option<String>) -> Result<Output> {
    let health = session
        .registry()
        .await?
        .get_health(service.as_deref())
        .await?;
    Output::json(&health)
}

pub async fn health_log(
    session: &mut Session,
    service: &str,
    limit: Option<usize>,
) -> Result<Output> {
    let limit = limit.unwrap_or(session.settings().health_log_limit);
    let entries = session
        .registry()
        .await?
        .get_health_log(service, limit)
        .await?;
    Output::json(&entries)
}
