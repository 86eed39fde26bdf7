//! Per-invocation state threaded through every command

use hydra_registry::{
    Error, Profile, ProfileState, ProfileStore, Registry, RegistryConnection, Result, Settings,
};
use std::path::PathBuf;
use tracing::debug;

/// Settings, persisted profiles and the registry connection of one run
pub struct Session {
    settings: Settings,
    store: ProfileStore,
    state: Option<ProfileState>,
    /// A state file exists but could not be read
    unreadable: bool,
    registry: Option<Registry>,
}

impl Session {
    /// Load profile state from `state_file`, or from the default location
    pub async fn load(settings: Settings, state_file: Option<PathBuf>) -> Self {
        let store = ProfileStore::new(state_file.unwrap_or_else(ProfileStore::default_path));
        let state = store.load().await;
        let unreadable = state.is_none() && store.exists().await;
        debug!(
            "Profile state {} from {}",
            if state.is_some() { "loaded" } else { "absent" },
            store.path().display()
        );

        Self {
            settings,
            store,
            state,
            unreadable,
            registry: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Loaded state, if any
    pub fn state(&self) -> Option<&ProfileState> {
        self.state.as_ref()
    }

    /// Loaded state, or `ConfigAbsent`
    pub fn require_state(&self) -> Result<&ProfileState> {
        self.state.as_ref().ok_or(Error::ConfigAbsent)
    }

    /// Profile used for connections
    pub fn active_profile(&self) -> Result<&Profile> {
        self.require_state()?
            .active_profile()
            .ok_or(Error::ConfigAbsent)
    }

    /// Move an unreadable state file aside so it is not overwritten
    ///
    /// Returns the backup path when a file was moved.
    pub async fn back_up_unreadable(&mut self) -> Result<Option<PathBuf>> {
        if !self.unreadable {
            return Ok(None);
        }
        let backup = self.store.back_up().await?;
        self.unreadable = false;
        Ok(Some(backup))
    }

    /// Persist `state` and keep it as the session state
    pub async fn save_state(&mut self, state: ProfileState) -> Result<()> {
        self.store.save(&state).await?;
        self.state = Some(state);
        Ok(())
    }

    /// Registry over the active profile, connecting on first use
    pub async fn registry(&mut self) -> Result<&Registry> {
        let registry = match self.registry.take() {
            Some(registry) => registry,
            None => {
                let profile = self.active_profile()?;
                let conn = RegistryConnection::open(profile, self.settings.connect_timeout).await?;
                Registry::new(conn, self.settings.clone())
            }
        };
        let registry: &Registry = self.registry.insert(registry);
        Ok(registry)
    }

    /// Close the registry connection, if one was opened
    pub async fn close(&mut self) {
        if let Some(registry) = self.registry.as_mut() {
            registry.close().await;
        }
    }
}
