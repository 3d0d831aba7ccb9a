/*
 * Copyright 2025 Carver Automation Corporation.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Session credential storage.
//!
//! The credential is persisted as two string entries, `username` and
//! `token`. Both must be present for a session to exist; the backend may
//! still reject the token, in which case the poller calls
//! [`SessionStore::expire`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::api::StatusApi;
use crate::error::{Error, Result};

/// Username plus the opaque authorization token issued at login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub username: String,
    /// Sent verbatim as the `Authorization` header; never parsed.
    pub token: String,
}

impl SessionCredential {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Stored entries; either may be missing after a partial write.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredEntries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl StoredEntries {
    fn into_credential(self) -> Option<SessionCredential> {
        match (self.username, self.token) {
            (Some(username), Some(token)) if !username.is_empty() && !token.is_empty() => {
                Some(SessionCredential { username, token })
            }
            _ => None,
        }
    }
}

/// Durable storage for the session credential.
pub trait CredentialStorage: Send + Sync {
    /// Returns `None` unless both entries are present.
    fn load(&self) -> Result<Option<SessionCredential>>;
    fn save(&self, credential: &SessionCredential) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON file holding `{"username": ..., "token": ...}`.
#[derive(Debug, Clone)]
pub struct FileCredentialStorage {
    path: PathBuf,
}

impl FileCredentialStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::Storage {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl CredentialStorage for FileCredentialStorage {
    fn load(&self) -> Result<Option<SessionCredential>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };

        match serde_json::from_slice::<StoredEntries>(&data) {
            Ok(entries) => Ok(entries.into_credential()),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring unreadable session file"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, credential: &SessionCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let entries = StoredEntries {
            username: Some(credential.username.clone()),
            token: Some(credential.token.clone()),
        };
        let json = serde_json::to_vec_pretty(&entries)?;

        // Replaced atomically via a sibling temp file.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_error(e))?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// In-process storage, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCredentialStorage {
    entry: Mutex<Option<SessionCredential>>,
}

impl MemoryCredentialStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self) -> MutexGuard<'_, Option<SessionCredential>> {
        self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStorage for MemoryCredentialStorage {
    fn load(&self) -> Result<Option<SessionCredential>> {
        Ok(self.entry().clone())
    }

    fn save(&self, credential: &SessionCredential) -> Result<()> {
        *self.entry() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.entry() = None;
        Ok(())
    }
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    Logout,
    Expired,
}

/// Explicit session context shared by the login flow and the poller.
///
/// Writers go through [`login`](Self::login), [`set`](Self::set),
/// [`logout`](Self::logout) and [`expire`](Self::expire); readers take a
/// snapshot with [`current`](Self::current) or follow changes through
/// [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn CredentialStorage>,
    tx: Arc<watch::Sender<Option<SessionCredential>>>,
    last_sign_out: Arc<Mutex<Option<SignOutReason>>>,
}

impl SessionStore {
    /// Restore the persisted credential, if any.
    ///
    /// A partially written credential counts as signed out and is removed.
    pub fn open(storage: Arc<dyn CredentialStorage>) -> Result<Self> {
        let restored = storage.load()?;
        if restored.is_none() {
            storage.clear()?;
        } else {
            tracing::info!("restored stored session");
        }

        let (tx, _rx) = watch::channel(restored);
        Ok(Self {
            storage,
            tx: Arc::new(tx),
            last_sign_out: Arc::new(Mutex::new(None)),
        })
    }

    pub fn in_memory() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            storage: Arc::new(MemoryCredentialStorage::new()),
            tx: Arc::new(tx),
            last_sign_out: Arc::new(Mutex::new(None)),
        }
    }

    pub fn current(&self) -> Option<SessionCredential> {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionCredential>> {
        self.tx.subscribe()
    }

    /// Reason for the most recent sign-out, if one happened.
    pub fn last_sign_out(&self) -> Option<SignOutReason> {
        *self
            .last_sign_out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist and publish a credential.
    pub fn set(&self, credential: SessionCredential) -> Result<()> {
        self.storage.save(&credential)?;
        tracing::info!(username = %credential.username, "session started");
        self.tx.send_replace(Some(credential));
        Ok(())
    }

    /// Authenticate against the backend and store the issued token.
    pub async fn login(
        &self,
        api: &dyn StatusApi,
        username: &str,
        password: &str,
    ) -> Result<SessionCredential> {
        let credential = api.login(username, password).await?;
        self.set(credential.clone())?;
        Ok(credential)
    }

    /// User-initiated logout.
    pub fn logout(&self) -> Result<()> {
        self.sign_out(SignOutReason::Logout)
    }

    /// Logout forced by an expired-token response.
    pub fn expire(&self) -> Result<()> {
        self.sign_out(SignOutReason::Expired)
    }

    fn sign_out(&self, reason: SignOutReason) -> Result<()> {
        *self
            .last_sign_out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(reason);

        // Subscribers observe the sign-out even when clearing storage fails.
        let previous = self.tx.send_replace(None);
        if let Some(previous) = previous {
            tracing::info!(username = %previous.username, ?reason, "session ended");
        }
        self.storage.clear()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("credential", &*self.tx.borrow())
            .finish()
    }
}
