//! Runtime settings and the registry key namespace

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default key prefix shared by every hydra service
pub const DEFAULT_KEY_PREFIX: &str = "hydra:service";

/// Client settings
///
/// Every field has a default, so a partial JSON document deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix of every registry key
    pub key_prefix: String,
    /// How long to wait for the registry handshake
    #[serde(with = "secs")]
    pub connect_timeout: Duration,
    /// Nodes updated more recently than this are listed as active
    #[serde(with = "secs")]
    pub active_threshold: Duration,
    /// Nodes not updated for longer than this are pruned by `refresh`
    #[serde(with = "secs")]
    pub stale_threshold: Duration,
    /// Default number of health log entries fetched per instance
    pub health_log_limit: usize,
    /// Wait before process exit so shutdown writes can flush
    #[serde(with = "millis")]
    pub shutdown_grace: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(5),
            active_threshold: Duration::from_secs(5),
            stale_threshold: Duration::from_secs(60),
            health_log_limit: 100,
            shutdown_grace: Duration::from_millis(250),
        }
    }
}

impl Settings {
    /// Key builder for this prefix
    pub fn keys(&self) -> Keys<'_> {
        Keys {
            prefix: &self.key_prefix,
        }
    }
}

/// Builds registry keys under a prefix
#[derive(Debug, Clone, Copy)]
pub struct Keys<'a> {
    prefix: &'a str,
}

impl<'a> Keys<'a> {
    /// Hash of instance id to node entry
    pub fn nodes(&self) -> String {
        format!("{}:nodes", self.prefix)
    }

    /// Pattern matching every service route set
    pub fn routes_pattern(&self) -> String {
        format!("{}:*:service:routes", self.prefix)
    }

    /// Extract the service name from a route set key
    pub fn service_from_routes_key<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.prefix)?
            .strip_prefix(':')?
            .strip_suffix(":service:routes")
    }

    /// Pattern matching every service registration
    pub fn services_pattern(&self) -> String {
        format!("{}:*:service", self.prefix)
    }

    /// Extract the service name from a registration key
    pub fn service_from_service_key<'k>(&self, key: &'k str) -> Option<&'k str> {
        let name = key
            .strip_prefix(self.prefix)?
            .strip_prefix(':')?
            .strip_suffix(":service")?;
        // `hydra:service:mc:svc:service` style keys are not registrations
        (!name.is_empty() && !name.contains(':')).then_some(name)
    }

    /// Pattern matching the health snapshot of every instance
    pub fn health_pattern(&self) -> String {
        format!("{}:*:*:health", self.prefix)
    }

    /// Split a health snapshot key into service name and instance id
    pub fn health_key_parts<'k>(&self, key: &'k str) -> Option<(&'k str, &'k str)> {
        key.strip_prefix(self.prefix)?
            .strip_prefix(':')?
            .strip_suffix(":health")?
            .split_once(':')
    }

    /// Pattern matching the health log of every instance of a service
    pub fn health_log_pattern(&self, service: &str) -> String {
        format!("*:{}:*:health:log", service)
    }

    /// Hash of version label to config payload
    pub fn configs(&self, service: &str) -> String {
        format!("{}:{}:configs", self.prefix, service)
    }

    /// Pattern matching the config hash of every service
    pub fn configs_pattern(&self) -> String {
        format!("{}:*:configs", self.prefix)
    }

    /// Extract the service name from a config hash key
    pub fn service_from_configs_key<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.prefix)?
            .strip_prefix(':')?
            .strip_suffix(":configs")
    }

    /// Pub/sub channel of a service, or of one of its instances
    pub fn message_channel(&self, service: &str, instance: Option<&str>) -> String {
        match instance {
            Some(id) => format!("{}:mc:{}:{}", self.prefix, service, id),
            None => format!("{}:mc:{}", self.prefix, service),
        }
    }

    /// Durable message queue of a service
    pub fn message_queue(&self, service: &str) -> String {
        format!("{}:{}:mqrecieved", self.prefix, service)
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespace() {
        let settings = Settings::default();
        let keys = settings.keys();
        assert_eq!(keys.nodes(), "hydra:service:nodes");
        assert_eq!(keys.routes_pattern(), "hydra:service:*:service:routes");
        assert_eq!(keys.configs("svc"), "hydra:service:svc:configs");
        assert_eq!(keys.health_log_pattern("svc"), "*:svc:*:health:log");
        assert_eq!(keys.message_queue("svc"), "hydra:service:svc:mqrecieved");
        assert_eq!(
            keys.message_channel("svc", Some("abc")),
            "hydra:service:mc:svc:abc"
        );
    }

    #[test]
    fn test_service_name_extraction() {
        let settings = Settings::default();
        let keys = settings.keys();
        assert_eq!(
            keys.service_from_routes_key("hydra:service:user-svc:service:routes"),
            Some("user-svc")
        );
        assert_eq!(keys.service_from_routes_key("other:user-svc:service:routes"), None);
        assert_eq!(
            keys.service_from_service_key("hydra:service:user-svc:service"),
            Some("user-svc")
        );
        assert_eq!(keys.service_from_service_key("hydra:service:a:b:service"), None);
        assert_eq!(
            keys.health_key_parts("hydra:service:user-svc:a1b2:health"),
            Some(("user-svc", "a1b2"))
        );
        assert_eq!(
            keys.service_from_configs_key("hydra:service:user-svc:configs"),
            Some("user-svc")
        );
    }

    #[test]
    fn test_partial_settings_document() {
        let settings: Settings =
            serde_json::from_str(r#"{"stale_threshold": 120}"#).unwrap();
        assert_eq!(settings.stale_threshold, Duration::from_secs(120));
        assert_eq!(settings.active_threshold, Duration::from_secs(5));
        assert_eq!(settings.key_prefix, DEFAULT_KEY_PREFIX);
    }
}
