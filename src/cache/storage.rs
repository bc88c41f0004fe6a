//! SQLite-based durable cache backing with file blob support
//!
//! Stores small payloads inline in SQLite, large payloads (>10KB) as files.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::key::{CacheKey, KeyFilter};
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

/// Payloads larger than this are stored as external blobs
const INLINE_THRESHOLD: usize = 10 * 1024; // 10KB

type Result<T> = std::result::Result<T, CacheError>;

/// A payload read back from durable storage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub data: Vec<u8>,
    pub written_at: DateTime<Utc>,
}

/// Durable storage behind a [`TtlCache`](super::TtlCache).
///
/// Errors are returned here but never leave the cache layer.
pub trait CacheBackend: Send + Sync {
    /// Load an unexpired entry
    fn load(&self, key: &CacheKey) -> Result<Option<StoredEntry>>;

    fn store(&self, key: &CacheKey, data: &[u8], ttl: Duration) -> Result<()>;

    fn remove(&self, key: &CacheKey) -> Result<()>;

    /// Remove every entry the filter selects, returning how many went.
    fn remove_matching(&self, filter: &KeyFilter) -> Result<usize>;
}

/// SQLite-backed cache storage
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    blobs_dir: PathBuf,
}

impl SqliteBackend {
    /// Open or create storage at the default cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Cache directory path (~/.cache/agent-inbox on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("agent-inbox"))
    }

    /// Open storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let blobs_dir = cache_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create blobs dir: {}", e)))?;

        let conn = Connection::open(&db_path)?;

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path, &blobs_dir)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY NOT NULL,
                scope TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                thread_id TEXT,
                data TEXT,
                blob_path TEXT,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_expires_at ON cache_entries(expires_at);
            CREATE INDEX IF NOT EXISTS idx_scope ON cache_entries(scope);
            CREATE INDEX IF NOT EXISTS idx_thread_id ON cache_entries(thread_id);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
            blobs_dir,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clear all cache entries
    pub fn clear_all(&self) -> Result<ClearStats> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        conn.execute("DELETE FROM cache_entries", [])?;

        if self.blobs_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.blobs_dir) {
                log::warn!("Failed to clear blobs directory: {}", e);
            }
            std::fs::create_dir_all(&self.blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to recreate blobs dir: {}", e)))?;
        }

        Ok(ClearStats {
            entries_removed: count as usize,
        })
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now().timestamp_millis();
        let conn = self.conn();

        let total_entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        let valid_entries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?1",
            [now],
            |r| r.get(0),
        )?;

        let total_size: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
            [],
            |r| r.get(0),
        )?;

        let (oldest, newest): (Option<i64>, Option<i64>) = conn.query_row(
            "SELECT MIN(created_at), MAX(created_at) FROM cache_entries WHERE expires_at > ?1",
            [now],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        Ok(CacheStats {
            total_entries: total_entries as usize,
            valid_entries: valid_entries as usize,
            expired_entries: (total_entries - valid_entries) as usize,
            total_size_bytes: total_size as usize,
            oldest_entry: oldest.and_then(DateTime::from_timestamp_millis),
            newest_entry: newest.and_then(DateTime::from_timestamp_millis),
        })
    }

    /// Write a blob file, sharded by first 2 chars of the fingerprint
    fn write_blob(&self, fingerprint: &str, data: &[u8]) -> Result<String> {
        let shard = &fingerprint[..2.min(fingerprint.len())];
        let shard_dir = self.blobs_dir.join(shard);
        std::fs::create_dir_all(&shard_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create shard dir: {}", e)))?;

        let filename = format!("{}.json", fingerprint);
        let rel_path = format!("{}/{}", shard, filename);

        std::fs::write(shard_dir.join(&filename), data)
            .map_err(|e| CacheError::Io(format!("Failed to write blob: {}", e)))?;

        Ok(rel_path)
    }

    fn remove_blobs(&self, paths: impl IntoIterator<Item = String>) {
        for path in paths {
            if let Err(e) = std::fs::remove_file(self.blobs_dir.join(&path)) {
                log::debug!("Blob {} not removed: {}", path, e);
            }
        }
    }

    /// Nuke the cache (delete DB and all blobs)
    fn nuke(db_path: &Path, blobs_dir: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        if blobs_dir.exists() {
            std::fs::remove_dir_all(blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to remove blobs dir: {}", e)))?;
        }
        Ok(())
    }
}

impl CacheBackend for SqliteBackend {
    fn load(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        let fingerprint = key.fingerprint();
        let now = Utc::now().timestamp_millis();
        let conn = self.conn();

        let row: Option<(Option<String>, Option<String>, i64)> = conn
            .query_row(
                "SELECT data, blob_path, created_at FROM cache_entries
                 WHERE cache_key = ?1 AND expires_at > ?2",
                params![fingerprint, now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((data, blob_path, created_at)) = row else {
            return Ok(None);
        };
        let written_at = DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now);

        let data = match (data, blob_path) {
            (Some(data), None) => data.into_bytes(),
            (None, Some(blob_path)) => match std::fs::read(self.blobs_dir.join(&blob_path)) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Failed to read blob {}: {}", blob_path, e);
                    conn.execute(
                        "DELETE FROM cache_entries WHERE cache_key = ?1",
                        [&fingerprint],
                    )?;
                    return Ok(None);
                }
            },
            _ => return Ok(None),
        };

        Ok(Some(StoredEntry { data, written_at }))
    }

    fn store(&self, key: &CacheKey, data: &[u8], ttl: Duration) -> Result<()> {
        let fingerprint = key.fingerprint();
        let now = Utc::now().timestamp_millis();
        let expires = now + ttl.as_millis() as i64;
        let scope = key.scope().to_string();
        let endpoint = key.endpoint().as_str();

        let (inline, blob_path) = if data.len() <= INLINE_THRESHOLD {
            (Some(String::from_utf8_lossy(data).into_owned()), None)
        } else {
            (None, Some(self.write_blob(&fingerprint, data)?))
        };

        self.conn().execute(
            "INSERT OR REPLACE INTO cache_entries
             (cache_key, scope, endpoint, thread_id, data, blob_path, created_at, expires_at, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                fingerprint,
                scope,
                endpoint,
                key.thread_id(),
                inline,
                blob_path,
                now,
                expires,
                data.len()
            ],
        )?;
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<()> {
        let fingerprint = key.fingerprint();
        let conn = self.conn();

        let blob: Option<Option<String>> = conn
            .query_row(
                "SELECT blob_path FROM cache_entries WHERE cache_key = ?1",
                [&fingerprint],
                |r| r.get(0),
            )
            .optional()?;
        conn.execute(
            "DELETE FROM cache_entries WHERE cache_key = ?1",
            [&fingerprint],
        )?;
        drop(conn);

        self.remove_blobs(blob.flatten());
        Ok(())
    }

    fn remove_matching(&self, filter: &KeyFilter) -> Result<usize> {
        let scope = filter.scope.to_string();
        let endpoint = filter.endpoint.map(|e| e.as_str());
        let thread_id = filter.thread_id.as_deref();
        let conn = self.conn();

        const MATCH: &str = "scope = ?1
             AND (?2 IS NULL OR endpoint = ?2)
             AND (?3 IS NULL OR thread_id = ?3)";

        let blobs = {
            let mut stmt = conn.prepare(&format!(
                "SELECT blob_path FROM cache_entries WHERE blob_path IS NOT NULL AND {}",
                MATCH
            ))?;
            stmt.query_map(params![scope, endpoint, thread_id], |r| r.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let deleted = conn.execute(
            &format!("DELETE FROM cache_entries WHERE {}", MATCH),
            params![scope, endpoint, thread_id],
        )?;
        drop(conn);

        self.remove_blobs(blobs);
        Ok(deleted)
    }
}

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub entries_removed: usize,
}

/// Statistics about cache state
#[derive(Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}
