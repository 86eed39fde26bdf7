//! Registry query and mutation engine

use crate::backend::RegistryBackend;
use crate::connection::RegistryConnection;
use crate::error::{Error, Result};
use crate::messaging::{
    CLI_SENDER, Envelope, MessageTransport, RegistryTransport, RestResponse, RouteSpec,
};
use crate::models::*;
use crate::settings::Settings;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which nodes `list_nodes` returns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    /// Only nodes of this service
    pub service: Option<String>,
    /// Only nodes updated within this window
    pub active_within: Option<Duration>,
}

impl NodeFilter {
    /// Every node of every service
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one service
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Restrict to nodes updated within `window`
    pub fn active_within(mut self, window: Duration) -> Self {
        self.active_within = Some(window);
        self
    }
}

/// Check a REST invocation before anything touches the network
///
/// `get` and `delete` requests may not carry a payload.
pub fn check_rest_args(route_spec: &str, payload_file: Option<&Path>) -> Result<RouteSpec> {
    let route = RouteSpec::parse(route_spec)?;
    if payload_file.is_some() && route.forbids_payload() {
        return Err(Error::InvalidArguments(format!(
            "{} requests to {} cannot carry a payload",
            route.method.to_uppercase(),
            route_spec
        )));
    }
    Ok(route)
}

/// Whole seconds of `duration`, saturating at `i64::MAX`
fn whole_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Registry client over one open connection
pub struct Registry {
    conn: RegistryConnection,
    settings: Settings,
    transport: Box<dyn MessageTransport>,
}

impl Registry {
    /// Engine over `conn`, delivering messages through the registry
    pub fn new(conn: RegistryConnection, settings: Settings) -> Self {
        let transport = RegistryTransport::new(conn.shared_backend(), settings.clone());
        Self {
            conn,
            settings,
            transport: Box::new(transport),
        }
    }

    /// Replace the message transport
    pub fn with_transport(mut self, transport: impl MessageTransport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    /// Close the connection; safe to call twice
    pub async fn close(&mut self) {
        self.conn.close().await;
    }

    fn backend(&self) -> Result<&dyn RegistryBackend> {
        self.conn.ensure_ready()?;
        Ok(self.conn.backend())
    }

    /// Every parseable node, keyed by its hash field, with `elapsed` set
    async fn annotated_nodes(&self) -> Result<Vec<(String, NodeEntry)>> {
        let raw = self.backend()?.hgetall(&self.settings.keys().nodes()).await?;
        let now = Utc::now();

        let mut nodes = Vec::with_capacity(raw.len());
        for (field, value) in raw {
            match serde_json::from_str::<NodeEntry>(&value) {
                Ok(node) => nodes.push((field, node.with_elapsed(now))),
                Err(e) => warn!("Skipping malformed node entry {}: {}", field, e),
            }
        }
        Ok(nodes)
    }

    /// List registered nodes
    pub async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<NodeEntry>> {
        let mut nodes: Vec<NodeEntry> = self
            .annotated_nodes()
            .await?
            .into_iter()
            .map(|(_, node)| node)
            .filter(|node| match &filter.service {
                Some(service) => &node.service_name == service,
                None => true,
            })
            .filter(|node| match filter.active_within {
                Some(window) => node.elapsed.unwrap_or(i64::MAX) < whole_secs(window),
                None => true,
            })
            .collect();

        nodes.sort_by(|a, b| {
            (&a.service_name, &a.instance_id).cmp(&(&b.service_name, &b.instance_id))
        });
        Ok(nodes)
    }

    /// Remove nodes not updated for longer than `stale_threshold`
    ///
    /// All stale ids go out in one `HDEL`. Returns how many were removed.
    pub async fn prune_stale_nodes(&self, stale_threshold: Duration) -> Result<usize> {
        let threshold = whole_secs(stale_threshold);
        let stale: Vec<String> = self
            .annotated_nodes()
            .await?
            .into_iter()
            .filter(|(_, node)| node.elapsed.unwrap_or(0) > threshold)
            .map(|(field, _)| field)
            .collect();

        if stale.is_empty() {
            debug!("No nodes older than {}s", threshold);
            return Ok(0);
        }

        let removed = self
            .backend()?
            .hdel(&self.settings.keys().nodes(), &stale)
            .await?;
        info!("Pruned {} stale node(s)", removed);
        Ok(removed as usize)
    }

    /// Route patterns by service
    ///
    /// Services without routes are left out.
    pub async fn list_routes(
        &self,
        service: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let backend = self.backend()?;
        let keys = self.settings.keys();
        let mut routes = BTreeMap::new();

        for key in backend.keys(&keys.routes_pattern()).await? {
            let Some(name) = keys.service_from_routes_key(&key) else {
                continue;
            };
            if service.is_some_and(|wanted| wanted != name) {
                continue;
            }

            let mut patterns = backend.smembers(&key).await?;
            if patterns.is_empty() {
                continue;
            }
            patterns.sort();
            routes.insert(name.to_string(), patterns);
        }

        Ok(routes)
    }

    /// Registered services
    pub async fn list_services(&self, service: Option<&str>) -> Result<Vec<ServiceEntry>> {
        let backend = self.backend()?;
        let keys = self.settings.keys();
        let mut services = Vec::new();

        for key in backend.keys(&keys.services_pattern()).await? {
            let Some(name) = keys.service_from_service_key(&key) else {
                continue;
            };
            if service.is_some_and(|wanted| wanted != name) {
                continue;
            }
            let Some(raw) = backend.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<ServiceEntry>(&raw) {
                Ok(entry) => services.push(entry),
                Err(e) => warn!("Skipping malformed service entry {}: {}", key, e),
            }
        }

        services.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        Ok(services)
    }

    /// Latest health snapshots, one list per service
    pub async fn get_health(&self, service: Option<&str>) -> Result<Vec<Vec<HealthSnapshot>>> {
        let backend = self.backend()?;
        let keys = self.settings.keys();
        let mut by_service: BTreeMap<String, Vec<HealthSnapshot>> = BTreeMap::new();

        for key in backend.keys(&keys.health_pattern()).await? {
            let Some((name, _instance)) = keys.health_key_parts(&key) else {
                continue;
            };
            let Some(raw) = backend.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<HealthSnapshot>(&raw) {
                Ok(snapshot) => by_service.entry(name.to_string()).or_default().push(snapshot),
                Err(e) => debug!("Skipping unreadable health snapshot {}: {}", key, e),
            }
        }

        Ok(by_service
            .into_values()
            .filter(|snapshots| match (service, snapshots.first()) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(wanted), Some(first)) => first.service_name == wanted,
            })
            .collect())
    }

    /// Recent health log entries of every instance of `service`
    ///
    /// All instance logs are read in one atomic transaction.
    pub async fn get_health_log(&self, service: &str, limit: usize) -> Result<Vec<HealthEntry>> {
        let backend = self.backend()?;
        let mut log_keys = backend
            .keys(&self.settings.keys().health_log_pattern(service))
            .await?;
        if log_keys.is_empty() {
            debug!("No health logs for {}", service);
            return Ok(Vec::new());
        }
        log_keys.sort();

        let stop = isize::try_from(limit).unwrap_or(isize::MAX);
        let batches = backend.lrange_atomic(&log_keys, 0, stop).await?;

        let mut entries = Vec::new();
        for raw in batches.into_iter().flatten() {
            match serde_json::from_str::<HealthEntry>(&raw) {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!("Skipping unreadable health log entry: {}", e),
            }
        }
        Ok(entries)
    }

    /// Stored config labels of a service, sorted
    pub async fn list_config_versions(&self, service: &str) -> Result<Vec<String>> {
        let versions = self
            .backend()?
            .hgetall(&self.settings.keys().configs(service))
            .await?;
        let mut labels: Vec<String> = versions
            .into_keys()
            .map(|version| format!("{}:{}", service, version))
            .collect();
        labels.sort();
        Ok(labels)
    }

    /// Stored config labels of every service
    pub async fn list_all_config_versions(&self) -> Result<Vec<String>> {
        let keys = self.settings.keys();
        let mut services: Vec<String> = self
            .backend()?
            .keys(&keys.configs_pattern())
            .await?
            .iter()
            .filter_map(|key| keys.service_from_configs_key(key).map(str::to_string))
            .collect();
        services.sort();

        let mut labels = Vec::new();
        for service in services {
            labels.extend(self.list_config_versions(&service).await?);
        }
        Ok(labels)
    }

    /// Fetch one stored config
    pub async fn pull_config(&self, label: &str) -> Result<Value> {
        let label = ConfigLabel::parse(label)?;
        let raw = self
            .backend()?
            .hget(&self.settings.keys().configs(&label.service), &label.version)
            .await?
            .ok_or_else(|| Error::NotFound(format!("config {}", label)))?;

        serde_json::from_str(&raw)
            .map_err(|e| Error::Upstream(format!("config {} is not valid JSON: {}", label, e)))
    }

    /// Store a config under `label`, replacing any previous payload
    pub async fn push_config(&self, label: &str, payload: &Value) -> Result<()> {
        let label = ConfigLabel::parse(label)?;
        let raw = serde_json::to_string(payload)?;
        self.backend()?
            .hset(&self.settings.keys().configs(&label.service), &label.version, &raw)
            .await?;
        info!("Stored config {}", label);
        Ok(())
    }

    /// Remove a stored config
    ///
    /// Returns `false` when nothing was stored under `label`.
    pub async fn remove_config_version(&self, label: &str) -> Result<bool> {
        let label = ConfigLabel::parse(label)?;
        let removed = self
            .backend()?
            .hdel(
                &self.settings.keys().configs(&label.service),
                &[label.version.clone()],
            )
            .await?;
        if removed > 0 {
            info!("Removed config {}", label);
        }
        Ok(removed > 0)
    }

    /// Deliver a message now
    pub async fn send_message(&self, envelope: &Envelope) -> Result<()> {
        self.conn.ensure_ready()?;
        envelope.route()?;
        self.transport.send(envelope).await
    }

    /// Queue a message for later pickup
    pub async fn queue_message(&self, envelope: &Envelope) -> Result<()> {
        self.conn.ensure_ready()?;
        envelope.route()?;
        self.transport.queue(envelope).await
    }

    /// Call a service endpoint and return its response
    pub async fn rest_invoke(
        &self,
        route_spec: &str,
        payload_file: Option<&Path>,
    ) -> Result<RestResponse> {
        check_rest_args(route_spec, payload_file)?;
        self.conn.ensure_ready()?;

        let body = match payload_file {
            Some(path) => {
                let text = async_fs::read_to_string(path).await?;
                serde_json::from_str(&text).map_err(|e| {
                    Error::InvalidArguments(format!("payload {:?} is not JSON: {}", path, e))
                })?
            }
            None => Value::Null,
        };

        let envelope = Envelope::new(route_spec, CLI_SENDER, body);
        let raw = self.transport.request(&envelope).await?;
        Ok(RestResponse::from(raw))
    }

    /// Server report from a secondary connection
    pub async fn redis_info(&self) -> Result<String> {
        self.conn.admin_info().await
    }
}
