//! Local cache of confirmed lookups.
//!
//! Confirmed block data never changes, so a txid resolved once does not need
//! another request, even from a different dataset or output file. Only
//! confirmed, error-free records are cached; unconfirmed transactions and
//! failures are always fetched again.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{iso_utc, LookupRecord};
use crate::txid::Txid;

/// `SQLite`-backed lookup cache.
#[derive(Debug)]
pub struct LookupCache {
    path: PathBuf,
    conn: Connection,
}

/// Statistics about the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cached lookups.
    pub entries: i64,
    /// When the oldest entry was fetched.
    pub oldest_fetch: Option<DateTime<Utc>>,
    /// When the newest entry was fetched.
    pub newest_fetch: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

impl LookupCache {
    /// Open or create a cache database at the given path.
    ///
    /// Creates the parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening lookup cache at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self { path, conn })
    }

    /// Create an in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a cached record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, txid: &Txid) -> Result<Option<LookupRecord>> {
        let record = self
            .conn
            .query_row(
                r"
                SELECT txid, block_height, block_time, block_hash, api_source
                FROM lookups WHERE txid = ?1
                ",
                [txid.as_str()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Store a record if it is confirmed and error-free.
    ///
    /// Returns `true` if the record was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put(&self, record: &LookupRecord) -> Result<bool> {
        let Some(height) = record.block_height.filter(|_| record.is_confirmed()) else {
            return Ok(false);
        };
        let height = i64::try_from(height)
            .map_err(|_| Error::internal(format!("block height {height} out of range")))?;

        self.conn.execute(
            r"
            INSERT OR REPLACE INTO lookups
                (txid, block_height, block_time, block_hash, api_source, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                record.txid,
                height,
                record.block_time_unix,
                record.block_hash,
                record.api_source,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(true)
    }

    /// Count cached lookups.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lookups", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete every cached lookup. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let affected = self.conn.execute("DELETE FROM lookups", [])?;
        if affected > 0 {
            info!("Cleared {} cached lookups", affected);
        }
        Ok(affected)
    }

    /// Get cache statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<CacheStats> {
        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(fetched_at), MAX(fetched_at) FROM lookups",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let parse = |s: String| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(CacheStats {
            entries: self.count()?,
            oldest_fetch: oldest.and_then(parse),
            newest_fetch: newest.and_then(parse),
            db_size_bytes,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<LookupRecord> {
        let txid: String = row.get(0)?;
        let block_height: i64 = row.get(1)?;
        let block_time: Option<i64> = row.get(2)?;
        let block_hash: Option<String> = row.get(3)?;
        let api_source: String = row.get(4)?;

        Ok(LookupRecord {
            txid,
            block_height: u64::try_from(block_height).ok(),
            block_time_unix: block_time,
            block_time_utc_iso: block_time.and_then(iso_utc),
            block_hash,
            api_source,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::esplora::TxStatus;

    const TXID: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";

    fn create_test_cache() -> LookupCache {
        LookupCache::open_in_memory().expect("failed to create test cache")
    }

    fn txid() -> Txid {
        Txid::parse(TXID).unwrap()
    }

    fn confirmed() -> LookupRecord {
        let status = TxStatus {
            confirmed: true,
            block_height: Some(170),
            block_hash: Some(
                "00000000d1145790a8694403d4063f323d499e655c83426834d4ce2f8dd4a2ee".to_string(),
            ),
            block_time: Some(1_231_731_025),
        };
        LookupRecord::from_status(&txid(), &status, "mempool")
    }

    #[test]
    fn test_put_and_get() {
        let cache = create_test_cache();
        assert!(cache.put(&confirmed()).unwrap());

        let cached = cache.get(&txid()).unwrap().unwrap();
        assert_eq!(cached, confirmed());
    }

    #[test]
    fn test_get_missing() {
        let cache = create_test_cache();
        assert!(cache.get(&txid()).unwrap().is_none());
    }

    #[test]
    fn test_put_skips_failures_and_unconfirmed() {
        let cache = create_test_cache();

        let failed = LookupRecord::failed(&txid(), "blockstream", "HTTP 500");
        assert!(!cache.put(&failed).unwrap());

        let unconfirmed = LookupRecord::from_status(&txid(), &TxStatus::default(), "blockstream");
        assert!(!cache.put(&unconfirmed).unwrap());

        assert_eq!(cache.count().unwrap(), 0);
    }

    #[test]
    fn test_put_replaces() {
        let cache = create_test_cache();
        cache.put(&confirmed()).unwrap();
        let mut newer = confirmed();
        newer.api_source = "blockstream".to_string();
        cache.put(&newer).unwrap();

        assert_eq!(cache.count().unwrap(), 1);
        assert_eq!(cache.get(&txid()).unwrap().unwrap().api_source, "blockstream");
    }

    #[test]
    fn test_clear() {
        let cache = create_test_cache();
        cache.put(&confirmed()).unwrap();

        assert_eq!(cache.clear().unwrap(), 1);
        assert_eq!(cache.count().unwrap(), 0);
        assert_eq!(cache.clear().unwrap(), 0);
    }

    #[test]
    fn test_stats_empty() {
        let cache = create_test_cache();
        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 0);
        assert!(stats.oldest_fetch.is_none());
        assert!(stats.newest_fetch.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_entries() {
        let cache = create_test_cache();
        cache.put(&confirmed()).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 1);
        assert!(stats.oldest_fetch.is_some());
        assert_eq!(stats.oldest_fetch, stats.newest_fetch);
    }

    #[test]
    fn test_open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/lookups.db");

        let cache = LookupCache::open(&path).unwrap();
        cache.put(&confirmed()).unwrap();
        assert_eq!(cache.path(), path);
        assert!(path.exists());
        assert!(cache.stats().unwrap().db_size_bytes > 0);
    }

    #[test]
    fn test_file_cache_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookups.db");

        {
            let cache = LookupCache::open(&path).unwrap();
            cache.put(&confirmed()).unwrap();
        }

        let reopened = LookupCache::open(&path).unwrap();
        assert_eq!(reopened.get(&txid()).unwrap(), Some(confirmed()));
    }
}
