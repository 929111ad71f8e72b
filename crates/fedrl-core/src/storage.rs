//! Storage layer: a cookie jar persisted as YAML, plus the YAML helpers.
//!
//! The jar mirrors browser cookie semantics closely enough for the session:
//! every entry carries an absolute expiry, and expired entries are invisible
//! to readers and dropped on the next write.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

// ─── YAML I/O ────────────────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

pub fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T>
where
    T: Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    let val = serde_yaml::from_str(&content)?;
    Ok(val)
}

// ─── Cookies ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

/// Attributes applied when a cookie is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieOptions {
    pub expires_in: Duration,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieOptions {
    /// Plain cookie living `days` days.
    pub fn days(days: i64) -> Self {
        Self {
            expires_in: Duration::days(days),
            secure: false,
            same_site: SameSite::Lax,
        }
    }

    /// Secure, strict same-site cookie living `days` days.
    pub fn secure_strict(days: i64) -> Self {
        Self {
            expires_in: Duration::days(days),
            secure: true,
            same_site: SameSite::Strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSite,
}

impl StoredCookie {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Name → cookie map, either in memory or backed by a YAML file that is
/// rewritten after every mutation.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    path: Option<PathBuf>,
    cookies: BTreeMap<String, StoredCookie>,
}

impl CookieJar {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or lazily create) a file-backed jar. A missing file is an empty jar.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut cookies: BTreeMap<String, StoredCookie> = load_yaml(&path)?;
        let now = Utc::now();
        cookies.retain(|_, c| !c.is_expired_at(now));
        debug!(path = %path.display(), cookies = cookies.len(), "Opened cookie jar");
        Ok(Self {
            path: Some(path),
            cookies,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_at(name, Utc::now())
    }

    pub fn get_at(&self, name: &str, now: DateTime<Utc>) -> Option<&str> {
        self.cookies
            .get(name)
            .filter(|c| !c.is_expired_at(now))
            .map(|c| c.value.as_str())
    }

    pub fn cookie(&self, name: &str) -> Option<&StoredCookie> {
        self.cookies.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>, options: CookieOptions) -> Result<()> {
        self.set_at(name, value, options, Utc::now())
    }

    pub fn set_at(
        &mut self,
        name: &str,
        value: impl Into<String>,
        options: CookieOptions,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.cookies.insert(
            name.to_string(),
            StoredCookie {
                value: value.into(),
                expires_at: now + options.expires_in,
                secure: options.secure,
                same_site: options.same_site,
            },
        );
        self.flush()
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        if self.cookies.remove(name).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Names of cookies that have not expired yet.
    pub fn names(&self) -> Vec<&str> {
        let now = Utc::now();
        self.cookies
            .iter()
            .filter(|(_, c)| !c.is_expired_at(now))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }

    /// Write the jar to its backing file, dropping expired entries first.
    pub fn flush(&mut self) -> Result<()> {
        let now = Utc::now();
        self.cookies.retain(|_, c| !c.is_expired_at(now));
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }
        let content = serde_yaml::to_string(&self.cookies)?;
        write_private(path, content.as_bytes())
    }
}

/// Write `content` to a file only the owner can read. The mode is set before
/// any bytes land, including when the file already existed.
#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content)?;
    Ok(())
}
