//! Data models for registry entries

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A live service instance registration
///
/// Stored as JSON in the nodes hash, keyed by instance id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEntry {
    /// Service this instance belongs to
    pub service_name: String,

    /// Unique instance identifier
    #[serde(rename = "instanceID")]
    pub instance_id: String,

    /// Last heartbeat
    pub updated_on: DateTime<Utc>,

    /// Seconds since `updated_on`, computed at query time
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<i64>,

    /// Everything else the service reported (ip, port, version, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeEntry {
    /// Whole seconds between `updated_on` and `now`
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_on).num_seconds()
    }

    /// Annotate the entry with its age at `now`
    pub fn with_elapsed(mut self, now: DateTime<Utc>) -> Self {
        // A stored value would otherwise land in `extra` and shadow ours
        self.extra.remove("elapsed");
        self.elapsed = Some(self.elapsed_at(now));
        self
    }

    /// Reported IP address, if any
    pub fn ip(&self) -> Option<&str> {
        self.extra.get("ip").and_then(Value::as_str)
    }

    /// Reported port, if any (numbers and numeric strings are accepted)
    pub fn port(&self) -> Option<u16> {
        match self.extra.get("port")? {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// A service registration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    /// Service name
    pub service_name: String,

    /// Service type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    /// Registration time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_on: Option<DateTime<Utc>>,

    /// Other registration fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Latest health report of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Service that reported
    pub service_name: String,

    /// Remaining report fields (memory, uptime, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of an instance's health log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEntry {
    /// Log level or category (info, error, fatal, ...)
    #[serde(rename = "type")]
    pub entry_type: String,

    /// When the entry was written
    pub ts: DateTime<Utc>,

    /// Process that wrote the entry
    #[serde(rename = "processID")]
    pub process_id: Value,

    /// Log message
    pub message: String,

    /// Anything else the service attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Compound `serviceName:version` label of a stored config
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigLabel {
    /// Owning service
    pub service: String,
    /// Version tag
    pub version: String,
}

impl ConfigLabel {
    /// Parse a label, requiring exactly two non-empty `:` segments
    pub fn parse(label: &str) -> Result<Self> {
        let segments: Vec<&str> = label.split(':').collect();
        match segments.as_slice() {
            [service, version] if !service.is_empty() && !version.is_empty() => Ok(Self {
                service: service.to_string(),
                version: version.to_string(),
            }),
            _ => Err(Error::InvalidArguments(format!(
                "config label '{}' must have the form serviceName:version",
                label
            ))),
        }
    }
}

impl fmt::Display for ConfigLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.version)
    }
}
