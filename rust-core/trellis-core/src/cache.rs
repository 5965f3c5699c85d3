//! # Route Cache
//!
//! Persists the compiled route table as JSON so production boots skip
//! descriptor extraction and compilation:
//!
//! ```json
//! {"generated_at": 1760000000, "version": "0.1.1", "routes": [ ... ]}
//! ```
//!
//! The cache is an optimization only. A missing, unreadable, malformed or
//! foreign-version file is a miss and the table is rebuilt.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::route::RouteEntry;
use crate::router::RouteTable;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// On-disk shape of the cache file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePayload {
    /// Unix timestamp (seconds) of the build
    pub generated_at: u64,
    /// Crate version that wrote the file
    pub version: String,
    /// Route entries in priority order
    pub routes: Vec<RouteEntry>,
}

/// File-backed route table cache
#[derive(Debug, Clone)]
pub struct RouteCache {
    path: PathBuf,
    enabled: bool,
}

impl RouteCache {
    /// Cache at `path`, always enabled
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
        }
    }

    /// Cache enabled only in production
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            path: config.routing.cache_path.clone(),
            enabled: config.is_production(),
        }
    }

    /// Cache file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether reads and writes happen at all
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Restore the table, or `None` on any kind of miss
    #[must_use]
    pub fn get_cached(&self) -> Option<RouteTable> {
        if !self.enabled {
            return None;
        }
        match self.read() {
            Ok(Some(table)) => {
                info!(path = %self.path.display(), routes = table.len(), "Route cache hit");
                Some(table)
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "Route cache miss");
                None
            }
            Err(error) => {
                warn!(code = error.code(), error = %error, "Ignoring route cache");
                None
            }
        }
    }

    /// Read and validate the file regardless of the environment
    ///
    /// `Ok(None)` means there is no file or it was written by another
    /// version.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheCorruption` when the file exists but cannot be
    /// trusted.
    pub fn read(&self) -> Result<Option<RouteTable>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(e)),
        };

        let payload: CachePayload = serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e))?;
        if payload.version != crate::VERSION {
            info!(
                cached = %payload.version,
                current = crate::VERSION,
                "Route cache written by another version"
            );
            return Ok(None);
        }

        let mut routes = payload.routes;
        for entry in &mut routes {
            entry.compile().map_err(|e| self.corrupt(e))?;
        }
        Ok(Some(RouteTable::new(routes)))
    }

    /// Persist the table; returns `false` when the cache is disabled
    ///
    /// The file is written next to its destination and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Json` when the file cannot be written.
    pub fn cache(&self, table: &RouteTable) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        let payload = CachePayload {
            generated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: crate::VERSION.to_string(),
            routes: table.entries().to_vec(),
        };
        let json = serde_json::to_vec_pretty(&payload)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &self.path)?;

        info!(path = %self.path.display(), routes = table.len(), "Route cache written");
        Ok(true)
    }

    /// Delete the file; returns `false` if there was none
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for failures other than a missing file.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Route cache cleared");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn corrupt(&self, reason: impl ToString) -> Error {
        Error::CacheCorruption {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
