//! Participant identity resolution.
//!
//! An identity is established once per client session by a registration
//! flow outside this core; this module only looks it up, caches it, and
//! exposes an explicit `reset()` lifecycle. Resolution performs no
//! network mutation.

mod store;

pub use store::{FileIdentityStore, IdentityStore, StoredIdentity};

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::domain::ParticipantIdentity;

/// Resolves an opaque local participant token to a cached identity.
///
/// The cache lives for the life of the resolver; `reset()` is the only
/// way to drop it (explicit logout).
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,

    /// Topic key scoping identities in the local store
    topic: String,

    cached: Option<ParticipantIdentity>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>, topic: impl Into<String>) -> Self {
        Self {
            store,
            topic: topic.into(),
            cached: None,
        }
    }

    /// Resolve a local token to an identity, caching the first hit.
    ///
    /// Returns `None` if no identity has been registered for this topic;
    /// callers must fall back to the registration flow before messages
    /// can be authored.
    pub async fn resolve(&mut self, token: &str) -> Result<Option<ParticipantIdentity>> {
        if let Some(identity) = &self.cached {
            return Ok(Some(identity.clone()));
        }

        let stored = self.store.get(&self.topic, token).await?;

        let identity = stored.map(|s| ParticipantIdentity {
            member_id: s.member_id,
            role: s.role,
            display_label: s.display_name,
        });

        if let Some(identity) = &identity {
            debug!(member_id = %identity.member_id, topic = %self.topic, "Identity resolved");
            self.cached = Some(identity.clone());
        }

        Ok(identity)
    }

    /// Currently cached identity, if any
    pub fn current(&self) -> Option<&ParticipantIdentity> {
        self.cached.as_ref()
    }

    /// Drop the cached identity (explicit logout/reset)
    pub fn reset(&mut self) {
        self.cached = None;
    }
}
