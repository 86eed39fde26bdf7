//! Bounded-time connection to the registry

use crate::backend::{RedisBackend, RegistryBackend};
use crate::error::{Error, Result};
use crate::profile::Profile;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifecycle of a registry connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing opened, or closed again
    Disconnected,
    /// Handshake in flight
    Connecting,
    /// Handshake succeeded
    Ready,
    /// Handshake failed or timed out
    Failed,
}

/// The one primary registry connection of an invocation
pub struct RegistryConnection {
    backend: Arc<dyn RegistryBackend>,
    state: ConnectionState,
}

impl RegistryConnection {
    /// Connect to the registry described by `profile`
    ///
    /// Gives up after `timeout`; the abandoned attempt is dropped and never
    /// retried.
    pub async fn open(profile: &Profile, timeout: Duration) -> Result<Self> {
        debug!(
            "Opening registry connection for profile '{}' ({:?})",
            profile.name,
            ConnectionState::Connecting
        );
        let attempt = async {
            let backend = RedisBackend::connect(profile).await?;
            Ok::<_, Error>(Arc::new(backend) as Arc<dyn RegistryBackend>)
        };
        let backend = race_timeout(attempt, profile, timeout).await?;

        Ok(Self {
            backend,
            state: ConnectionState::Ready,
        })
    }

    /// Wrap an already connected backend
    pub fn from_backend(backend: impl RegistryBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            state: ConnectionState::Ready,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Backend handle for queries
    pub fn backend(&self) -> &dyn RegistryBackend {
        self.backend.as_ref()
    }

    /// Shared backend handle for collaborators such as the message transport
    pub fn shared_backend(&self) -> Arc<dyn RegistryBackend> {
        self.backend.clone()
    }

    /// Run `INFO` on a short-lived secondary connection
    pub async fn admin_info(&self) -> Result<String> {
        self.ensure_ready()?;
        self.backend.info().await
    }

    /// Release the connection; closing twice is a no-op
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.backend.close().await;
        self.state = ConnectionState::Disconnected;
        debug!("Registry connection closed");
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        match self.state {
            ConnectionState::Ready => Ok(()),
            state => Err(Error::Connection(format!(
                "registry connection is {:?}",
                state
            ))),
        }
    }
}

/// Race a connection attempt against a timer
///
/// Whichever settles first wins. A failed handshake is reported as-is; the
/// timer firing becomes `ConnectionTimeout`.
pub async fn race_timeout<T>(
    attempt: impl Future<Output = Result<T>>,
    profile: &Profile,
    timeout: Duration,
) -> Result<T> {
    let timer = async {
        smol::Timer::after(timeout).await;
        Err(Error::ConnectionTimeout {
            host: profile.redis_url.clone(),
            port: profile.redis_port,
            timeout,
        })
    };

    let outcome = smol::future::or(attempt, timer).await;
    if let Err(e) = &outcome {
        warn!("Registry connection {:?}: {}", ConnectionState::Failed, e);
    }
    outcome
}
