//! Local identity store.
//!
//! A small key-value persistence surface scoped per topic. Written by the
//! registration flow (out of scope here); this core only reads it.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Role;

/// Identity record as persisted by the registration flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub member_id: String,
    pub role: Role,
    pub display_name: String,
}

/// Read surface over the local identity store
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the identity registered under a topic for a local token
    async fn get(&self, topic: &str, token: &str) -> Result<Option<StoredIdentity>>;
}

/// File layout: `{ "<topic>": { "<token>": StoredIdentity } }`
type IdentityFile = HashMap<String, HashMap<String, StoredIdentity>>;

/// JSON-file-backed identity store (~/.colloq/identities.json by default)
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_file(&self) -> Result<IdentityFile> {
        if !self.path.exists() {
            return Ok(IdentityFile::new());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read identity store: {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse identity store: {}", self.path.display()))
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn get(&self, topic: &str, token: &str) -> Result<Option<StoredIdentity>> {
        let file = self.read_file().await?;
        Ok(file
            .get(topic)
            .and_then(|entries| entries.get(token))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_store(dir: &TempDir, content: &str) -> FileIdentityStore {
        let path = dir.path().join("identities.json");
        tokio::fs::write(&path, content).await.unwrap();
        FileIdentityStore::new(path)
    }

    #[tokio::test]
    async fn test_get_existing_identity() {
        let dir = TempDir::new().unwrap();
        let store = write_store(
            &dir,
            r#"{"topic-1": {"tok-a": {"member_id": "m-1", "role": "teacher", "display_name": "Dr. Ngo"}}}"#,
        )
        .await;

        let identity = store.get("topic-1", "tok-a").await.unwrap().unwrap();
        assert_eq!(identity.member_id, "m-1");
        assert_eq!(identity.role, Role::Teacher);
    }

    #[tokio::test]
    async fn test_get_unknown_topic_or_token() {
        let dir = TempDir::new().unwrap();
        let store = write_store(
            &dir,
            r#"{"topic-1": {"tok-a": {"member_id": "m-1", "role": "student", "display_name": "Sam"}}}"#,
        )
        .await;

        assert!(store.get("topic-2", "tok-a").await.unwrap().is_none());
        assert!(store.get("topic-1", "tok-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileIdentityStore::new(dir.path().join("absent.json"));

        assert!(store.get("topic-1", "tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = write_store(&dir, "not json").await;

        assert!(store.get("topic-1", "tok").await.is_err());
    }
}
