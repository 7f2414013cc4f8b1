//! Storage mediums behind the cache store
//!
//! A medium is a plain string-to-string map that may fail (disk full, quota,
//! corrupt database). `SqliteMedium` persists across runs; small values live
//! inline in SQLite and large ones (>10KB) as blob files. `MemoryMedium` is
//! process-local.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

/// Values larger than this are stored as external blobs
const INLINE_THRESHOLD: usize = 10 * 1024; // 10KB

type Result<T> = std::result::Result<T, CacheError>;

/// Synchronous key-value persistence.
pub trait StorageMedium: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&mut self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    /// Remove everything, returning how many entries were dropped.
    fn clear(&mut self) -> Result<usize>;

    /// Human-readable location, for status output.
    fn location(&self) -> String;
}

/// In-process medium, optionally capped at a byte budget.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    items: HashMap<String, String>,
    max_bytes: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium that rejects writes pushing total value bytes over `max_bytes`.
    pub fn with_limit(max_bytes: usize) -> Self {
        Self {
            items: HashMap::new(),
            max_bytes: Some(max_bytes),
        }
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum()
    }
}

impl StorageMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(limit) = self.max_bytes {
            let needed = self.used_bytes_excluding(key) + value.len();
            if needed > limit {
                return Err(CacheError::QuotaExceeded { needed, limit });
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }

    fn clear(&mut self) -> Result<usize> {
        let count = self.items.len();
        self.items.clear();
        Ok(count)
    }

    fn location(&self) -> String {
        "in-memory".to_string()
    }
}

/// SQLite-backed medium with file blob support
pub struct SqliteMedium {
    conn: Connection,
    dir: PathBuf,
    blobs_dir: PathBuf,
    max_bytes: Option<usize>,
}

impl SqliteMedium {
    /// Open or create storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/matchday on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("matchday"))
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

        // Check schema version - nuke if mismatched
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
            CREATE TABLE IF NOT EXISTS cache_items (
                cache_key TEXT PRIMARY KEY NOT NULL,
                data TEXT,
                blob_path TEXT,
                size_bytes INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn,
            dir: cache_dir.to_path_buf(),
            blobs_dir,
            max_bytes: None,
        })
    }

    /// Cap total stored bytes; writes beyond it fail with `QuotaExceeded`.
    pub fn with_limit(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    fn used_bytes_excluding(&self, key: &str) -> Result<usize> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_items WHERE cache_key != ?1",
            [key],
            |r| r.get(0),
        )?;
        Ok(used.max(0) as usize)
    }

    /// Blob file path relative to the blobs dir, sharded by the first 2 hex chars.
    ///
    /// Keys contain `:` and arbitrary ids, so the file name is their SHA-256.
    fn blob_rel_path(key: &str) -> String {
        let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
        format!("{}/{}.json", &digest[..2], digest)
    }

    fn write_blob(&self, key: &str, value: &str) -> Result<String> {
        let rel_path = Self::blob_rel_path(key);
        let full_path = self.blobs_dir.join(&rel_path);
        if let Some(shard_dir) = full_path.parent() {
            std::fs::create_dir_all(shard_dir)
                .map_err(|e| CacheError::Io(format!("Failed to create shard dir: {}", e)))?;
        }
        std::fs::write(&full_path, value)
            .map_err(|e| CacheError::Io(format!("Failed to write blob: {}", e)))?;
        Ok(rel_path)
    }

    fn remove_blob(&self, rel_path: &str) {
        let full_path = self.blobs_dir.join(rel_path);
        if full_path.exists()
            && let Err(e) = std::fs::remove_file(&full_path)
        {
            log::warn!("Failed to remove blob {}: {}", rel_path, e);
        }
    }

    fn blob_path_for(&self, key: &str) -> Result<Option<String>> {
        let path: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT blob_path FROM cache_items WHERE cache_key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.flatten())
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

impl StorageMedium for SqliteMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>, Option<String>)> = self
            .conn
            .query_row(
                "SELECT data, blob_path FROM cache_items WHERE cache_key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((Some(data), None)) => Ok(Some(data)),
            Some((None, Some(blob_path))) => {
                match std::fs::read_to_string(self.blobs_dir.join(&blob_path)) {
                    Ok(data) => Ok(Some(data)),
                    Err(e) => {
                        log::warn!("Failed to read blob {}: {}", blob_path, e);
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(limit) = self.max_bytes {
            let needed = self.used_bytes_excluding(key)? + value.len();
            if needed > limit {
                return Err(CacheError::QuotaExceeded { needed, limit });
            }
        }

        let now = Utc::now().timestamp_millis();
        let previous_blob = self.blob_path_for(key)?;

        if value.len() <= INLINE_THRESHOLD {
            self.conn.execute(
                "INSERT OR REPLACE INTO cache_items
                 (cache_key, data, blob_path, size_bytes, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?4)",
                params![key, value, value.len(), now],
            )?;
            if let Some(old) = previous_blob {
                self.remove_blob(&old);
            }
        } else {
            let blob_path = self.write_blob(key, value)?;
            self.conn.execute(
                "INSERT OR REPLACE INTO cache_items
                 (cache_key, data, blob_path, size_bytes, updated_at)
                 VALUES (?1, NULL, ?2, ?3, ?4)",
                params![key, blob_path, value.len(), now],
            )?;
        }
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        if let Some(blob_path) = self.blob_path_for(key)? {
            self.remove_blob(&blob_path);
        }
        self.conn
            .execute("DELETE FROM cache_items WHERE cache_key = ?1", [key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT cache_key FROM cache_items")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn clear(&mut self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_items", [], |r| r.get(0))?;

        self.conn.execute("DELETE FROM cache_items", [])?;

        if self.blobs_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.blobs_dir) {
                log::warn!("Failed to clear blobs directory: {}", e);
            }
            std::fs::create_dir_all(&self.blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to recreate blobs dir: {}", e)))?;
        }

        Ok(count.max(0) as usize)
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_medium() -> (SqliteMedium, TempDir) {
        let dir = TempDir::new().unwrap();
        let medium = SqliteMedium::open_at(dir.path()).unwrap();
        (medium, dir)
    }

    #[test]
    fn test_memory_set_get_remove() {
        let mut medium = MemoryMedium::new();
        medium.set_item("k", "v").unwrap();
        assert_eq!(medium.get_item("k").unwrap().as_deref(), Some("v"));

        medium.remove_item("k").unwrap();
        assert_eq!(medium.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_memory_limit_rejects_overflow() {
        let mut medium = MemoryMedium::with_limit(8);
        medium.set_item("a", "1234").unwrap();
        // Overwriting the same key does not double count it
        medium.set_item("a", "12345678").unwrap();

        let err = medium.set_item("b", "x").unwrap_err();
        assert!(matches!(err, CacheError::QuotaExceeded { limit: 8, .. }));
    }

    #[test]
    fn test_sqlite_put_get_inline() {
        let (mut medium, _dir) = test_medium();
        medium.set_item("league-table:l1:3", "small data").unwrap();

        let result = medium.get_item("league-table:l1:3").unwrap();
        assert_eq!(result.as_deref(), Some("small data"));
    }

    #[test]
    fn test_sqlite_put_get_blob() {
        let (mut medium, _dir) = test_medium();
        let data = "x".repeat(20_000); // 20KB - will use blob

        medium.set_item("chat:l1", &data).unwrap();

        let result = medium.get_item("chat:l1").unwrap();
        assert_eq!(result, Some(data));
    }

    #[test]
    fn test_sqlite_blob_shrinks_back_inline() {
        let (mut medium, _dir) = test_medium();
        medium.set_item("k", &"y".repeat(20_000)).unwrap();
        medium.set_item("k", "tiny").unwrap();

        assert_eq!(medium.get_item("k").unwrap().as_deref(), Some("tiny"));
        assert_eq!(medium.blob_path_for("k").unwrap(), None);
    }

    #[test]
    fn test_sqlite_remove_and_keys() {
        let (mut medium, _dir) = test_medium();
        medium.set_item("k1", "d1").unwrap();
        medium.set_item("k2", &"z".repeat(20_000)).unwrap();

        let mut keys = medium.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["k1".to_string(), "k2".to_string()]);

        medium.remove_item("k2").unwrap();
        assert_eq!(medium.get_item("k2").unwrap(), None);
        assert_eq!(medium.keys().unwrap(), vec!["k1".to_string()]);
    }

    #[test]
    fn test_sqlite_clear() {
        let (mut medium, _dir) = test_medium();
        medium.set_item("k1", "d1").unwrap();
        medium.set_item("k2", "d2").unwrap();

        assert_eq!(medium.clear().unwrap(), 2);
        assert!(medium.get_item("k1").unwrap().is_none());
        assert!(medium.keys().unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut medium = SqliteMedium::open_at(dir.path()).unwrap();
            medium.set_item("season-table:l1", "[]").unwrap();
        }
        let medium = SqliteMedium::open_at(dir.path()).unwrap();
        assert_eq!(
            medium.get_item("season-table:l1").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn test_sqlite_limit() {
        let (medium, _dir) = test_medium();
        let mut medium = medium.with_limit(10);
        medium.set_item("a", "12345").unwrap();

        let err = medium.set_item("b", "123456").unwrap_err();
        assert!(matches!(err, CacheError::QuotaExceeded { needed: 11, .. }));
    }

    #[test]
    fn test_blob_path_is_sharded_hash() {
        let path = SqliteMedium::blob_rel_path("chat:league/1");
        let (shard, file) = path.split_once('/').unwrap();
        assert_eq!(shard.len(), 2);
        assert!(file.starts_with(shard));
        assert!(file.ends_with(".json"));
    }
}
