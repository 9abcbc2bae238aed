//! Stream destination registry
//!
//! Long-lived fan-out configuration, independent of any single session. The
//! registry validates and stores destination configs and is the source of
//! truth the recording controller consults for the fan-out set; it never
//! moves bytes itself.

use crate::error::{StudioError, StudioResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a stream destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(Uuid);

impl DestinationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DestinationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One fan-out destination config. A control-plane record only; no wire
/// protocol is implied.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDestination {
    pub id: DestinationId,
    pub name: String,
    pub enabled: bool,
    pub endpoint_url: String,
    pub credential_secret: String,
}

impl StreamDestination {
    /// New destination, disabled until the operator toggles it on.
    pub fn new(
        name: impl Into<String>,
        endpoint_url: impl Into<String>,
        credential_secret: impl Into<String>,
    ) -> Self {
        Self {
            id: DestinationId::new(),
            name: name.into(),
            enabled: false,
            endpoint_url: endpoint_url.into(),
            credential_secret: credential_secret.into(),
        }
    }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }
}

// Keep the stream key out of logs and error output.
impl fmt::Debug for StreamDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDestination")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("endpoint_url", &self.endpoint_url)
            .field("credential_secret", &"<redacted>")
            .finish()
    }
}

/// Validated store of fan-out destinations
#[derive(Default)]
pub struct StreamDestinationRegistry {
    inner: RwLock<HashMap<DestinationId, StreamDestination>>,
}

impl StreamDestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks a destination config. An enabled destination must carry a
    /// non-empty endpoint URL and credential secret; every offending field
    /// is named in the error.
    pub fn validate(destination: &StreamDestination) -> StudioResult<()> {
        if !destination.enabled {
            return Ok(());
        }
        let mut fields = Vec::new();
        if destination.endpoint_url.trim().is_empty() {
            fields.push("endpointUrl");
        }
        if destination.credential_secret.is_empty() {
            fields.push("credentialSecret");
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(StudioError::InvalidDestinationConfig {
                name: destination.name.clone(),
                fields,
            })
        }
    }

    /// Inserts or replaces a destination. Invalid configs are rejected
    /// before anything is stored, never partially applied.
    pub fn upsert(&self, destination: StreamDestination) -> StudioResult<DestinationId> {
        Self::validate(&destination)?;
        let id = destination.id;
        tracing::info!(%id, name = %destination.name, enabled = destination.enabled, "destination upserted");
        self.inner.write().insert(id, destination);
        Ok(id)
    }

    /// Flips a destination's enabled flag. Enabling re-validates the stored
    /// config; an invalid destination stays disabled.
    pub fn toggle(&self, id: DestinationId) -> StudioResult<bool> {
        let mut inner = self.inner.write();
        let destination = inner
            .get_mut(&id)
            .ok_or(StudioError::UnknownDestination { id })?;

        if destination.enabled {
            destination.enabled = false;
        } else {
            let mut candidate = destination.clone();
            candidate.enabled = true;
            Self::validate(&candidate)?;
            destination.enabled = true;
        }
        tracing::info!(%id, enabled = destination.enabled, "destination toggled");
        Ok(destination.enabled)
    }

    pub fn get(&self, id: DestinationId) -> Option<StreamDestination> {
        self.inner.read().get(&id).cloned()
    }

    pub fn remove(&self, id: DestinationId) -> StudioResult<StreamDestination> {
        self.inner
            .write()
            .remove(&id)
            .ok_or(StudioError::UnknownDestination { id })
    }

    /// Every stored destination, sorted by name for stable display.
    pub fn all(&self) -> Vec<StreamDestination> {
        let mut destinations: Vec<_> = self.inner.read().values().cloned().collect();
        destinations.sort_by(|a, b| a.name.cmp(&b.name));
        destinations
    }

    /// The current fan-out set.
    pub fn enabled_destinations(&self) -> Vec<StreamDestination> {
        self.all().into_iter().filter(|d| d.enabled).collect()
    }

    /// Serializes the registry for persistence alongside studio settings.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.all())
    }

    /// Restores a registry previously serialized with [`Self::to_json`].
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let destinations: Vec<StreamDestination> = serde_json::from_str(json)?;
        let registry = Self::new();
        {
            let mut inner = registry.inner.write();
            for destination in destinations {
                inner.insert(destination.id, destination);
            }
        }
        Ok(registry)
    }
}
