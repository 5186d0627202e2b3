use std::fmt::{self, Display};

use chrono::Utc;
use log::warn;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};

/// The fixed key identities are persisted under.
pub const IDENTITY_KEY: &str = "syncwatch_user_id";

const SUFFIX_LENGTH: usize = 9;

/// A stable identifier for one participant, tagged onto every event they
/// emit so that receivers can tell self from peer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh identity. Uniqueness comes from the timestamp plus
    /// a random suffix; the format carries no other meaning.
    pub fn generate() -> Self {
        let suffix: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LENGTH)
            .map(|byte| (byte as char).to_ascii_lowercase())
            .collect();

        Self(format!("user_{}_{}", Utc::now().timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local persistence for the identity value, a single string under
/// [`IDENTITY_KEY`].
pub trait IdentityStorage {
    fn read(&self, key: &str) -> Option<String>;
    /// Returns false when the value could not be persisted.
    fn write(&self, key: &str, value: &str) -> bool;
}

/// Returns the identity stored on this client, creating and persisting one
/// on first run. This never fails: when persistence is unavailable the
/// client continues with a fresh in-memory identity.
pub fn get_or_create_identity(storage: &dyn IdentityStorage) -> SessionId {
    if let Some(existing) = storage.read(IDENTITY_KEY) {
        return SessionId(existing);
    }

    let fresh = SessionId::generate();

    if !storage.write(IDENTITY_KEY, fresh.as_str()) {
        warn!("identity could not be persisted, continuing with an in-memory identity");
    }

    fresh
}
