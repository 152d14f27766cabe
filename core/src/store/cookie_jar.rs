//! File-backed cookie jar.
//!
//! Layout (`cookies.json`):
//!
//! ```text
//! {
//!   "version": 1,
//!   "cookies": {
//!     "web_2025_itf_forest_user_id": { "value": "user_...", "expires_at": "2026-..." },
//!     "web_2025_itf_forest_token":   { "value": "...",      "expires_at": null }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{Clock, PersistentStore, StoreError, SystemClock, Ttl};

const JAR_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Cookie {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JarFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    cookies: BTreeMap<String, Cookie>,
}

fn default_version() -> u32 {
    JAR_VERSION
}

impl Default for JarFile {
    fn default() -> Self {
        Self {
            version: JAR_VERSION,
            cookies: BTreeMap::new(),
        }
    }
}

/// Cookie jar persisted as a single JSON file.
///
/// An unreadable or corrupt file reads as an empty jar; the next write
/// replaces it. Writers hold an exclusive lock on a `<jar>.lock` sibling
/// for the whole read-modify-write cycle, so handles in different
/// processes never drop each other's keys.
pub struct CookieJar {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    // Serializes writers sharing this handle.
    write_lock: Mutex<()>,
}

impl CookieJar {
    pub fn new(path: PathBuf) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self {
            path,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn load(&self) -> JarFile {
        if !self.path.exists() {
            return JarFile::default();
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("could not read cookie jar {}: {e}", self.path.display());
                return JarFile::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(jar) => jar,
            Err(e) => {
                tracing::warn!("ignoring corrupt cookie jar {}: {e}", self.path.display());
                JarFile::default()
            }
        }
    }

    /// Atomically replace the jar through a uniquely named temp file in the
    /// same directory.
    fn save(&self, jar: &JarFile) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(jar)?;
        let mut tmp = NamedTempFile::new_in(self.parent_dir())?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut JarFile, DateTime<Utc>),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| std::io::Error::other(format!("cookie jar lock poisoned: {e}")))?;

        fs::create_dir_all(self.parent_dir())?;
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        // Blocks while another writer holds the jar; released when
        // `lock_file` drops.
        FileExt::lock_exclusive(&lock_file)?;

        let now = self.clock.now();
        let mut jar = self.load();
        jar.cookies
            .retain(|_, cookie| cookie.expires_at.is_none_or(|exp| exp > now));
        f(&mut jar, now);
        self.save(&jar)
    }
}

impl PersistentStore for CookieJar {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let jar = self.load();
        let cookie = jar.cookies.get(key)?;
        if cookie.expires_at.is_some_and(|exp| exp <= now) {
            tracing::debug!("cookie {key} expired at {:?}", cookie.expires_at);
            return None;
        }
        Some(cookie.value.clone())
    }

    fn set(&self, key: &str, value: &str, ttl: Ttl) -> Result<(), StoreError> {
        self.modify(|jar, now| {
            jar.cookies.insert(
                key.to_string(),
                Cookie {
                    value: value.to_string(),
                    expires_at: ttl.expires_at(now),
                },
            );
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.modify(|jar, _| {
            jar.cookies.remove(key);
        })
    }
}
