//! Durable client session: the bearer token and the logged-in user
//!
//! This is the only state that survives between invocations. Everything
//! else lives in page controllers and is dropped with them.

use netdesk_core::{Error, Result, types::User};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage for the auth token and user object
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Current bearer token, if logged in
    fn token(&self) -> Option<String>;

    /// Logged-in user, if known
    fn user(&self) -> Option<User>;

    /// Store a new token
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted.
    fn set_token(&self, token: &str) -> Result<()>;

    /// Store the user object
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted.
    fn set_user(&self, user: &User) -> Result<()>;

    /// Forget token and user
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted.
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<User>,
}

/// Session kept only in memory
#[derive(Debug, Default)]
pub struct MemorySession {
    data: RwLock<SessionData>,
}

impl MemorySession {
    /// Empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that already holds a token
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            data: RwLock::new(SessionData {
                token: Some(token.into()),
                user: None,
            }),
        }
    }
}

impl SessionStore for MemorySession {
    fn token(&self) -> Option<String> {
        self.data.read().token.clone()
    }

    fn user(&self) -> Option<User> {
        self.data.read().user.clone()
    }

    fn set_token(&self, token: &str) -> Result<()> {
        self.data.write().token = Some(token.to_string());
        Ok(())
    }

    fn set_user(&self, user: &User) -> Result<()> {
        self.data.write().user = Some(user.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.data.write() = SessionData::default();
        Ok(())
    }
}

/// Session persisted as a small JSON file
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    data: RwLock<SessionData>,
}

impl FileSession {
    /// Open the session file, starting empty when it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => SessionData::default(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {}", path.display());
                SessionData::default()
            }
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Location of the session file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &SessionData) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(data)?)?;
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut SessionData)) -> Result<()> {
        let mut data = self.data.write();
        change(&mut data);
        self.persist(&data)
    }
}

impl SessionStore for FileSession {
    fn token(&self) -> Option<String> {
        self.data.read().token.clone()
    }

    fn user(&self) -> Option<User> {
        self.data.read().user.clone()
    }

    fn set_token(&self, token: &str) -> Result<()> {
        self.update(|data| data.token = Some(token.to_string()))
    }

    fn set_user(&self, user: &User) -> Result<()> {
        self.update(|data| data.user = Some(user.clone()))
    }

    fn clear(&self) -> Result<()> {
        self.update(|data| *data = SessionData::default())
    }
}
