//! Message envelopes and the transport that delivers them
//!
//! Services address each other with route strings of the form
//! `[instanceID@]serviceName:[method]/path`. The short form
//! `serviceName:method@/path` is accepted as well.

use crate::backend::RegistryBackend;
use crate::error::{Error, Result};
use crate::models::NodeEntry;
use crate::settings::Settings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Envelope format version stamped on new messages
pub const UMF_VERSION: &str = "UMF/1.4.6";

/// Sender address used for messages built by the CLI
pub const CLI_SENDER: &str = "hydra-cli:/";

const METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

/// Addressed message exchanged between services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Destination route
    pub to: String,

    /// Sender route
    pub from: String,

    /// Message id
    #[serde(default = "new_mid")]
    pub mid: String,

    /// Creation time
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Envelope format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional transport headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,

    /// Payload
    pub body: Value,
}

fn new_mid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_version() -> String {
    UMF_VERSION.to_string()
}

impl Envelope {
    /// Build a fresh envelope
    pub fn new(to: impl Into<String>, from: impl Into<String>, body: Value) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            mid: new_mid(),
            timestamp: Utc::now(),
            version: default_version(),
            headers: None,
            body,
        }
    }

    /// Parse an envelope document and check its destination
    pub fn from_json(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| Error::InvalidArguments(format!("invalid message: {}", e)))?;
        envelope.route()?;
        Ok(envelope)
    }

    /// Parsed destination
    pub fn route(&self) -> Result<RouteSpec> {
        RouteSpec::parse(&self.to)
    }

    /// Skeleton document for operators to fill in
    pub fn template() -> Value {
        serde_json::json!({
            "to": "{serviceName here}:/",
            "from": CLI_SENDER,
            "mid": new_mid(),
            "timestamp": Utc::now(),
            "version": UMF_VERSION,
            "body": {}
        })
    }
}

/// Parsed destination of an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    /// Specific instance, when addressed
    pub instance: Option<String>,
    /// Target service
    pub service: String,
    /// Lowercase HTTP method
    pub method: String,
    /// Request path
    pub path: String,
}

impl RouteSpec {
    /// Parse a route string
    pub fn parse(route: &str) -> Result<Self> {
        let invalid = |why: &str| Error::InvalidArguments(format!("route '{}' {}", route, why));

        let colon = route.find(':').ok_or_else(|| invalid("has no service name"))?;
        let (instance, service) = match route[..colon].split_once('@') {
            Some((id, service)) => (Some(id.to_string()), service),
            None => (None, &route[..colon]),
        };
        if service.is_empty() || instance.as_deref() == Some("") {
            return Err(invalid("has no service name"));
        }

        let target = &route[colon + 1..];
        let (method, path) = if let Some(rest) = target.strip_prefix('[') {
            rest.split_once(']')
                .ok_or_else(|| invalid("has an unterminated [method]"))?
        } else if let Some((method, path)) = target.split_once('@') {
            (method, path)
        } else {
            ("get", target)
        };

        let method = method.to_ascii_lowercase();
        if !METHODS.contains(&method.as_str()) {
            return Err(invalid("has an unknown http method"));
        }

        let path = match path {
            "" => "/".to_string(),
            p if p.starts_with('/') => p.to_string(),
            _ => return Err(invalid("path must start with '/'")),
        };

        Ok(Self {
            instance,
            service: service.to_string(),
            method,
            path,
        })
    }

    /// Whether requests with this method may not carry a payload
    pub fn forbids_payload(&self) -> bool {
        matches!(self.method.as_str(), "get" | "delete")
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.instance {
            write!(f, "{}@", id)?;
        }
        write!(f, "{}:[{}]{}", self.service, self.method, self.path)
    }
}

/// Response as it came off the wire
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status
    pub status: u16,
    /// Raw body bytes
    pub body: Vec<u8>,
}

/// Response handed back to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestResponse {
    /// HTTP status
    pub status: u16,
    /// Body as JSON when it parses, as a string otherwise
    pub body: Value,
}

impl From<RawResponse> for RestResponse {
    fn from(raw: RawResponse) -> Self {
        let text = String::from_utf8_lossy(&raw.body).into_owned();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Self {
            status: raw.status,
            body,
        }
    }
}

/// Delivers envelopes to services
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver now; no reply is awaited
    async fn send(&self, envelope: &Envelope) -> Result<()>;

    /// Queue for later pickup; no reply is awaited
    async fn queue(&self, envelope: &Envelope) -> Result<()>;

    /// Request/response exchange
    async fn request(&self, envelope: &Envelope) -> Result<RawResponse>;
}

/// Transport that goes through the registry itself
///
/// Messages are published on the service channel, queued messages are
/// pushed onto the service queue, and requests are sent over HTTP to a live
/// instance found in the nodes hash.
pub struct RegistryTransport {
    backend: Arc<dyn RegistryBackend>,
    settings: Settings,
}

impl RegistryTransport {
    /// Transport over `backend`
    pub fn new(backend: Arc<dyn RegistryBackend>, settings: Settings) -> Self {
        Self { backend, settings }
    }

    /// Pick the addressed instance, or the most recently updated one
    async fn resolve_instance(&self, route: &RouteSpec) -> Result<NodeEntry> {
        let nodes = self.backend.hgetall(&self.settings.keys().nodes()).await?;
        let candidates = nodes
            .values()
            .filter_map(|raw| serde_json::from_str::<NodeEntry>(raw).ok())
            .filter(|node| node.service_name == route.service);

        let chosen = match &route.instance {
            Some(id) => candidates.into_iter().find(|node| &node.instance_id == id),
            None => candidates.max_by_key(|node| node.updated_on),
        };

        chosen.ok_or_else(|| Error::NotFound(format!("no live instance for route {}", route)))
    }
}

#[async_trait]
impl MessageTransport for RegistryTransport {
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        let route = envelope.route()?;
        let channel = self
            .settings
            .keys()
            .message_channel(&route.service, route.instance.as_deref());
        let receivers = self
            .backend
            .publish(&channel, &serde_json::to_string(envelope)?)
            .await?;
        info!("Published message {} on {} ({} receivers)", envelope.mid, channel, receivers);
        Ok(())
    }

    async fn queue(&self, envelope: &Envelope) -> Result<()> {
        let route = envelope.route()?;
        let queue = self.settings.keys().message_queue(&route.service);
        self.backend
            .lpush(&queue, &serde_json::to_string(envelope)?)
            .await?;
        info!("Queued message {} on {}", envelope.mid, queue);
        Ok(())
    }

    async fn request(&self, envelope: &Envelope) -> Result<RawResponse> {
        let route = envelope.route()?;
        let node = self.resolve_instance(&route).await?;
        let (Some(ip), Some(port)) = (node.ip(), node.port()) else {
            return Err(Error::Upstream(format!(
                "instance {} of {} has no reachable address",
                node.instance_id, node.service_name
            )));
        };

        let url = format!("http://{}:{}{}", ip, port, route.path);
        let method = reqwest::Method::from_bytes(route.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::InvalidArguments(e.to_string()))?;
        let headers = envelope.headers.clone().unwrap_or_default();
        let body = envelope.body.clone();
        debug!("{} {}", method, url);

        smol::unblock(move || -> Result<RawResponse> {
            let client = reqwest::blocking::Client::new();
            let mut request = client.request(method, &url);
            for (name, value) in &headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
            if !body.is_null() {
                request = request.json(&body);
            }

            let response = request.send()?;
            let status = response.status().as_u16();
            let body = response.bytes()?.to_vec();
            Ok(RawResponse { status, body })
        })
        .await
    }
}
