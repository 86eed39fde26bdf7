//! Common test utilities for registry engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hydra_registry::messaging::{Envelope, MessageTransport, RawResponse};
use hydra_registry::{MemoryBackend, Registry, RegistryConnection, Result, Settings};
use std::sync::{Arc, Mutex};

/// Registry over a fresh in-memory backend, plus a handle on that backend
pub fn memory_registry() -> (Registry, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let conn = RegistryConnection::from_backend(backend.clone());
    (Registry::new(conn, Settings::default()), backend)
}

/// Seed a node entry that last heartbeated `age_secs` ago
pub fn seed_node(backend: &MemoryBackend, service: &str, instance: &str, age_secs: i64) {
    let node = serde_json::json!({
        "serviceName": service,
        "instanceID": instance,
        "updatedOn": (Utc::now() - Duration::seconds(age_secs)).to_rfc3339(),
        "processID": 4242,
        "ip": "127.0.0.1",
        "port": 8080,
    });
    backend.set_hash_field("hydra:service:nodes", instance, &node.to_string());
}

/// Transport that records envelopes instead of delivering them
#[derive(Default, Clone)]
pub struct RecordingTransport {
    pub calls: Arc<Mutex<Vec<(String, Envelope)>>>,
    pub reply: Vec<u8>,
}

impl RecordingTransport {
    pub fn replying(body: &[u8]) -> Self {
        Self {
            calls: Arc::default(),
            reply: body.to_vec(),
        }
    }

    pub fn calls(&self) -> Vec<(String, Envelope)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, kind: &str, envelope: &Envelope) {
        self.calls
            .lock()
            .unwrap()
            .push((kind.to_string(), envelope.clone()));
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        self.record("send", envelope);
        Ok(())
    }

    async fn queue(&self, envelope: &Envelope) -> Result<()> {
        self.record("queue", envelope);
        Ok(())
    }

    async fn request(&self, envelope: &Envelope) -> Result<RawResponse> {
        self.record("request", envelope);
        Ok(RawResponse {
            status: 200,
            body: self.reply.clone(),
        })
    }
}
