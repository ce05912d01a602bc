//! Process-wide session store for the bearer token.
//!
//! The token lives in memory and, when a token file is configured, on disk so
//! that `campusctl login` survives between invocations.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Bearer token holder shared by every request of the process.
#[derive(Debug, Default)]
pub struct SessionStore {
    token_file: Option<PathBuf>,
    token: RwLock<Option<String>>,
    overridden: AtomicBool,
}

impl SessionStore {
    /// A session that is never persisted.
    pub fn in_memory(token: Option<String>) -> Self {
        Self {
            token_file: None,
            token: RwLock::new(token),
            overridden: AtomicBool::new(false),
        }
    }

    /// Load the session from `path`. A missing file means "not logged in".
    pub fn load(path: &Path) -> Result<Self> {
        let token = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session file: {}", path.display()))?;
            let trimmed = content.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        } else {
            None
        };

        debug!(
            "Session loaded from {} (token present: {})",
            path.display(),
            token.is_some()
        );

        Ok(Self {
            token_file: Some(path.to_path_buf()),
            token: RwLock::new(token),
            overridden: AtomicBool::new(false),
        })
    }

    /// Current token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// Replace the token in memory without touching the token file.
    pub fn override_token(&self, token: String) {
        *self.token.write() = Some(token);
        self.overridden.store(true, Ordering::SeqCst);
    }

    /// Store a new token and persist it.
    pub fn set_token(&self, token: String) -> Result<()> {
        if let Some(ref path) = self.token_file {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory: {}", parent.display())
                })?;
            }
            std::fs::write(path, &token)
                .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        }
        *self.token.write() = Some(token);
        self.overridden.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// The services rejected the current token. An overriding token is only
    /// dropped from memory; a stored one is removed from disk as well.
    pub fn expire(&self) {
        if self.overridden.swap(false, Ordering::SeqCst) {
            *self.token.write() = None;
        } else {
            self.clear();
        }
    }

    /// Forget the token and remove the token file.
    pub fn clear(&self) {
        *self.token.write() = None;
        self.overridden.store(false, Ordering::SeqCst);

        if let Some(ref path) = self.token_file {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove session file {}: {}", path.display(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(&dir.path().join("session")).unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_set_token_persists_and_clear_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session");

        let store = SessionStore::load(&path).unwrap();
        store.set_token("abc123".to_string()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc123");

        let reloaded = SessionStore::load(&path).unwrap();
        assert_eq!(reloaded.token().as_deref(), Some("abc123"));

        reloaded.clear();
        assert!(!path.exists());
        assert!(reloaded.token().is_none());
    }

    #[test]
    fn test_override_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");

        let store = SessionStore::load(&path).unwrap();
        store.override_token("temp".to_string());
        assert_eq!(store.token().as_deref(), Some("temp"));
        assert!(!path.exists());
    }

    #[test]
    fn test_expired_override_keeps_stored_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        std::fs::write(&path, "stored").unwrap();

        let store = SessionStore::load(&path).unwrap();
        store.override_token("bad".to_string());
        store.expire();

        assert!(!store.is_authenticated());
        assert!(path.exists());

        let stored = SessionStore::load(&path).unwrap();
        stored.expire();
        assert!(!path.exists());
    }
}
