//! Named connection profiles and their persisted state
//!
//! The state file is one JSON document. Each profile is stored under its own
//! name, and the active profile's fields are mirrored at the top level so
//! older readers that only know `redisUrl`/`redisPort`/`redisDb` keep working:
//!
//! ```json
//! {
//!   "version": 2,
//!   "name": "local",
//!   "redisUrl": "127.0.0.1",
//!   "redisPort": 6379,
//!   "redisDb": 15,
//!   "local": { "name": "local", "redisUrl": "127.0.0.1", "redisPort": 6379, "redisDb": 15 }
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current schema tag of the state document
pub const STATE_VERSION: u64 = 2;

/// File name of the state document under the home directory
pub const STATE_FILE_NAME: &str = ".hydra-cli";

/// Name given to a pre-profile state that only has top-level fields
pub const LEGACY_PROFILE_NAME: &str = "default";

const RESERVED_KEYS: &[&str] = &[
    "version",
    "name",
    "redisUrl",
    "redisPort",
    "redisDb",
    "redisPassword",
];

/// Connection parameters for one registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile name
    #[serde(default)]
    pub name: String,
    /// Registry host
    pub redis_url: String,
    /// Registry port
    pub redis_port: u16,
    /// Database index
    #[serde(default)]
    pub redis_db: i64,
    /// Optional password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_password: Option<String>,
}

impl Profile {
    /// Create a profile without a password
    pub fn new(name: impl Into<String>, url: impl Into<String>, port: u16, db: i64) -> Self {
        Self {
            name: name.into(),
            redis_url: url.into(),
            redis_port: port,
            redis_db: db,
            redis_password: None,
        }
    }

    /// Set the password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.redis_password = Some(password.into());
        self
    }
}

/// Everything persisted in the state file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileState {
    /// Schema tag
    pub version: u64,
    /// Profile mirrored at the top level
    pub active: Option<Profile>,
    /// Profiles by name
    pub profiles: BTreeMap<String, Profile>,
    /// Top-level fields that are not profiles, written back untouched
    pub extra: Map<String, Value>,
}

impl ProfileState {
    /// Empty state at the current schema version
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            active: None,
            profiles: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Names of all stored profiles, sorted
    pub fn list_profiles(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// The profile used for connections
    pub fn active_profile(&self) -> Option<&Profile> {
        self.active.as_ref()
    }

    /// Name of the active profile, if it has one
    pub fn active_name(&self) -> Option<&str> {
        self.active
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Copy of the state with `name` mirrored as the active profile
    pub fn switch_active(&self, name: &str) -> Result<ProfileState> {
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("profile '{}'", name)))?;

        let mut next = self.clone();
        next.active = Some(profile.clone());
        Ok(next)
    }

    /// Insert or overwrite a profile
    ///
    /// The top-level fields follow only when `name` is already active, or
    /// when nothing is active yet.
    pub fn set_profile(&mut self, name: &str, mut profile: Profile) -> Result<()> {
        if name.is_empty() || RESERVED_KEYS.contains(&name) {
            return Err(Error::InvalidArguments(format!(
                "'{}' cannot be used as a profile name",
                name
            )));
        }

        profile.name = name.to_string();
        let mirror = match self.active_name() {
            Some(active) => active == name,
            None => self.active.is_none(),
        };
        if mirror {
            self.active = Some(profile.clone());
        }
        self.extra.remove(name);
        self.profiles.insert(name.to_string(), profile);
        Ok(())
    }

    /// Render the state as its JSON document
    pub fn to_document(&self) -> Result<Value> {
        let mut doc = self.extra.clone();
        doc.insert("version".to_string(), Value::from(self.version));

        if let Some(active) = &self.active {
            if let Value::Object(fields) = serde_json::to_value(active)? {
                doc.extend(fields);
            }
        }

        for (name, profile) in &self.profiles {
            doc.insert(name.clone(), serde_json::to_value(profile)?);
        }

        Ok(Value::Object(doc))
    }

    /// Read a state document
    ///
    /// Absent or unknown versions are read as the current schema. Unknown
    /// fields, and objects that do not read as profiles, are kept in `extra`.
    pub fn from_document(doc: Value) -> Result<Self> {
        let Value::Object(mut doc) = doc else {
            return Err(Error::ConfigCorrupt(
                "state document is not a JSON object".to_string(),
            ));
        };

        let version = doc.remove("version").and_then(|v| v.as_u64());
        if version != Some(STATE_VERSION) {
            debug!(?version, "Reading state as schema version {}", STATE_VERSION);
        }

        let mut top = Map::new();
        for key in RESERVED_KEYS.iter().skip(1) {
            if let Some(value) = doc.remove(*key) {
                top.insert(key.to_string(), value);
            }
        }

        let mut profiles = BTreeMap::new();
        let mut extra = Map::new();
        for (name, value) in doc {
            if !value.is_object() {
                extra.insert(name, value);
                continue;
            }
            match serde_json::from_value::<Profile>(value.clone()) {
                Ok(mut profile) => {
                    profile.name = name.clone();
                    profiles.insert(name, profile);
                }
                Err(e) => {
                    warn!("Keeping '{}' from the state file, not a profile: {}", name, e);
                    extra.insert(name, value);
                }
            }
        }

        let active = if top.contains_key("redisUrl") {
            let mut profile: Profile = serde_json::from_value(Value::Object(top))
                .map_err(|e| Error::ConfigCorrupt(format!("active profile: {}", e)))?;
            if profile.name.is_empty() {
                profile.name = LEGACY_PROFILE_NAME.to_string();
                profiles
                    .entry(profile.name.clone())
                    .or_insert_with(|| profile.clone());
            }
            Some(profile)
        } else {
            None
        };

        Ok(Self {
            version: STATE_VERSION,
            active,
            profiles,
            extra,
        })
    }
}

/// Loads and saves the state file
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.hydra-cli`, falling back to the working directory
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(STATE_FILE_NAME)
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a state file is present, readable or not
    pub async fn exists(&self) -> bool {
        async_fs::metadata(&self.path).await.is_ok()
    }

    /// Move the state file aside to `<file>.bak` and return the new path
    pub async fn back_up(&self) -> Result<PathBuf> {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".bak");
        let backup = self.path.with_file_name(name);
        async_fs::rename(&self.path, &backup).await?;
        warn!("Moved state file {:?} to {:?}", self.path, backup);
        Ok(backup)
    }

    /// Read the state, or `None` when it is missing or unreadable
    pub async fn load(&self) -> Option<ProfileState> {
        let contents = match async_fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No profile state at {:?}: {}", self.path, e);
                return None;
            }
        };

        let parsed = serde_json::from_str::<Value>(&contents)
            .map_err(|e| Error::ConfigCorrupt(e.to_string()))
            .and_then(ProfileState::from_document);

        match parsed {
            Ok(state) => Some(state),
            Err(e) => {
                debug!("Ignoring profile state at {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Write the whole state as one document
    ///
    /// The document goes to a sibling temp file that is renamed into place.
    pub async fn save(&self, state: &ProfileState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                async_fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_string_pretty(&state.to_document()?)?;
        let tmp = self.path.with_extension("tmp");
        async_fs::write(&tmp, contents).await?;
        async_fs::rename(&tmp, &self.path).await?;

        info!("Saved {} profile(s) to {:?}", state.profiles.len(), self.path);
        Ok(())
    }
}
