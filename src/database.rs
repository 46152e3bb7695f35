use crate::error::CatalogError;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{
    params, params_from_iter, types::Value, Connection, OptionalExtension, Result as SqlResult,
    Row, TransactionBehavior,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, MAIN_SEPARATOR};

mod read_queries;

pub use read_queries::{ListFilter, SortKey};

/// SQLite keeps a hard cap on bound parameters; stay far below it.
const ID_LOOKUP_CHUNK: usize = 500;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Thread-safe catalog handle backed by an r2d2 connection pool.
///
/// Cloning is cheap; every clone shares the same pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

fn apply_connection_pragmas(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys=ON;
         PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA cache_size=-65536;
         PRAGMA temp_store=MEMORY;
         PRAGMA busy_timeout=5000;
         PRAGMA wal_autocheckpoint=4000;
         PRAGMA journal_size_limit=134217728;",
    )?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// One catalog entry in the shape the presentation layer consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: String,
    pub path: String,
    pub filename: String,
    pub kind: MediaKind,
    pub size: u64,
    pub thumbnail_path: Option<String>,
}

/// Record plus scan-only bookkeeping for bulk writes.
#[derive(Debug, Clone)]
pub struct UpsertRecord {
    pub record: MediaRecord,
    pub file_mtime: Option<i64>,
}

/// Stored state the scanner reconciles against, tombstones included.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: String,
    pub path: String,
    pub size: u64,
    pub thumbnail_path: Option<String>,
    pub removed: bool,
}

/// Everything the thumbnail engine needs to decide whether to decode.
#[derive(Debug, Clone)]
pub struct ThumbnailState {
    pub record: MediaRecord,
    pub thumb_source_size: Option<u64>,
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn size_from_sql(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl Database {
    /// Opens or creates the catalog at `db_path` using a connection pool.
    pub fn open(db_path: &Path, pool_size: u32) -> CatalogResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager =
            SqliteConnectionManager::file(db_path).with_init(|conn| apply_connection_pragmas(conn));
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        let db = Database { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> CatalogResult<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS media (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                path TEXT UNIQUE NOT NULL,
                filename TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('image', 'video')),
                size INTEGER NOT NULL,
                file_mtime INTEGER,
                thumbnail_path TEXT,
                thumb_source_size INTEGER,
                favorite INTEGER NOT NULL DEFAULT 0,
                indexed_at TEXT NOT NULL,
                removed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_media_filename ON media(filename);
            CREATE INDEX IF NOT EXISTS idx_media_removed_at ON media(removed_at);",
        )?;
        Ok(())
    }

    // ────────────────────────────── Writes ──────────────────────────────

    /// Inserts or replaces a record by id. Revives a tombstoned record.
    pub fn upsert(&self, record: &MediaRecord) -> CatalogResult<()> {
        self.bulk_upsert(&[UpsertRecord {
            record: record.clone(),
            file_mtime: None,
        }])?;
        Ok(())
    }

    /// Upserts many records in a single transaction.
    ///
    /// Either every row lands or none does. A row keeps its insertion
    /// sequence and favorite flag across updates and revivals.
    pub fn bulk_upsert(&self, records: &[UpsertRecord]) -> CatalogResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let indexed_at = now_timestamp();
        {
            // A path can only move to a different id when the id scheme changes.
            let mut evict_stmt =
                tx.prepare_cached("DELETE FROM media WHERE path = ?1 AND id <> ?2")?;
            let mut upsert_stmt = tx.prepare_cached(
                "INSERT INTO media
                    (id, path, filename, kind, size, file_mtime, thumbnail_path,
                     thumb_source_size, indexed_at, removed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)
                 ON CONFLICT(id) DO UPDATE SET
                     path=excluded.path,
                     filename=excluded.filename,
                     kind=excluded.kind,
                     size=excluded.size,
                     file_mtime=COALESCE(excluded.file_mtime, media.file_mtime),
                     thumbnail_path=excluded.thumbnail_path,
                     thumb_source_size=CASE
                         WHEN excluded.thumbnail_path IS NULL THEN NULL
                         WHEN excluded.thumbnail_path IS media.thumbnail_path
                             THEN COALESCE(media.thumb_source_size, excluded.thumb_source_size)
                         ELSE excluded.thumb_source_size
                     END,
                     indexed_at=excluded.indexed_at,
                     removed_at=NULL",
            )?;

            for upsert in records {
                let record = &upsert.record;
                evict_stmt.execute(params![record.path, record.id])?;
                let thumb_source_size = record
                    .thumbnail_path
                    .as_ref()
                    .map(|_| size_to_sql(record.size));
                upsert_stmt.execute(params![
                    record.id,
                    record.path,
                    record.filename,
                    record.kind.as_str(),
                    size_to_sql(record.size),
                    upsert.file_mtime,
                    record.thumbnail_path,
                    thumb_source_size,
                    indexed_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Tombstones a record. It disappears from reads but keeps its
    /// metadata until [`Database::sweep_tombstones`] runs.
    pub fn delete(&self, id: &str) -> CatalogResult<()> {
        let removed = self.tombstone_many(&[id.to_string()])?;
        if removed == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Tombstones every listed live record in one transaction.
    pub fn tombstone_many(&self, ids: &[String]) -> CatalogResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed_at = now_timestamp();
        let mut count = 0usize;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE media SET removed_at = ?1 WHERE id = ?2 AND removed_at IS NULL",
            )?;
            for id in ids {
                count += stmt.execute(params![removed_at, id])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Hard-deletes a record, tombstoned or not. Returns its thumbnail path.
    pub fn purge(&self, id: &str) -> CatalogResult<Option<String>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let thumbnail: Option<Option<String>> = tx
            .query_row(
                "SELECT thumbnail_path FROM media WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(thumbnail) = thumbnail else {
            return Err(CatalogError::NotFound(id.to_string()));
        };
        tx.execute("DELETE FROM media WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(thumbnail)
    }

    /// Hard-deletes tombstones older than `older_than`.
    ///
    /// Returns the thumbnail paths the swept rows referenced so the caller
    /// can unlink them.
    pub fn sweep_tombstones(&self, older_than: DateTime<Utc>) -> CatalogResult<Vec<String>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let cutoff = timestamp(older_than);
        let mut thumbnails = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT thumbnail_path FROM media
                 WHERE removed_at IS NOT NULL AND removed_at < ?1 AND thumbnail_path IS NOT NULL",
            )?;
            let rows = stmt.query_map(params![cutoff], |row| row.get::<_, String>(0))?;
            for row in rows {
                thumbnails.push(row?);
            }
        }
        let swept = tx.execute(
            "DELETE FROM media WHERE removed_at IS NOT NULL AND removed_at < ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        log::info!("Swept {} tombstoned catalog records", swept);
        Ok(thumbnails)
    }

    /// Records a generated thumbnail.
    ///
    /// Fails with `NotFound` when the id is absent or tombstoned, and with
    /// `Stale` when the catalog size no longer matches the size the
    /// thumbnail was produced from.
    pub fn set_thumbnail(
        &self,
        id: &str,
        thumbnail_path: &str,
        source_size: u64,
    ) -> CatalogResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let size: Option<i64> = tx
            .query_row(
                "SELECT size FROM media WHERE id = ?1 AND removed_at IS NULL",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(size) = size.map(size_from_sql) else {
            return Err(CatalogError::NotFound(id.to_string()));
        };
        if size != source_size {
            return Err(CatalogError::Stale {
                id: id.to_string(),
                expected: size,
                actual: source_size,
            });
        }
        tx.execute(
            "UPDATE media SET thumbnail_path = ?1, thumb_source_size = ?2 WHERE id = ?3",
            params![thumbnail_path, size_to_sql(source_size), id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Clears a thumbnail reference, returning the previous path.
    pub fn clear_thumbnail(&self, id: &str) -> CatalogResult<Option<String>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let previous: Option<Option<String>> = tx
            .query_row(
                "SELECT thumbnail_path FROM media WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(previous) = previous else {
            return Err(CatalogError::NotFound(id.to_string()));
        };
        tx.execute(
            "UPDATE media SET thumbnail_path = NULL, thumb_source_size = NULL WHERE id = ?1",
            params![id],
        )?;
        tx.commit()?;
        Ok(previous)
    }

    pub fn set_favorite(&self, id: &str, favorite: bool) -> CatalogResult<()> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE media SET favorite = ?1 WHERE id = ?2 AND removed_at IS NULL",
            params![favorite, id],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Folds the WAL back into the main database file.
    pub fn checkpoint(&self) -> CatalogResult<()> {
        let conn = self.pool.get()?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }

    // ────────────────────────────── Reads ──────────────────────────────

    /// Snapshot of every live record in insertion order.
    pub fn get_all(&self) -> CatalogResult<Vec<MediaRecord>> {
        self.list(&ListFilter::default(), SortKey::Inserted)
    }

    /// Live records for the requested ids. Unknown ids are simply absent.
    pub fn get_by_ids(&self, ids: &[String]) -> CatalogResult<HashMap<String, MediaRecord>> {
        let mut results = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(results);
        }

        // One read transaction pins a single WAL snapshot across chunks.
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        for chunk in ids.chunks(ID_LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT id, path, filename, kind, size, thumbnail_path
                 FROM media
                 WHERE removed_at IS NULL AND id IN ({})",
                placeholders
            );
            let params: Vec<Value> = chunk.iter().map(|id| Value::Text(id.clone())).collect();
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params), media_record_from_row)?;
            for row in rows {
                let record = row?;
                results.insert(record.id.clone(), record);
            }
        }
        tx.commit()?;
        Ok(results)
    }

    pub fn get_by_id(&self, id: &str) -> CatalogResult<Option<MediaRecord>> {
        let conn = self.pool.get()?;
        let record = conn
            .query_row(
                "SELECT id, path, filename, kind, size, thumbnail_path
                 FROM media
                 WHERE id = ?1 AND removed_at IS NULL",
                params![id],
                media_record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Live records plus the size their current thumbnail was made from.
    pub fn get_thumbnail_states(
        &self,
        ids: &[String],
    ) -> CatalogResult<HashMap<String, ThumbnailState>> {
        let mut results = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(results);
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        for chunk in ids.chunks(ID_LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT id, path, filename, kind, size, thumbnail_path, thumb_source_size
                 FROM media
                 WHERE removed_at IS NULL AND id IN ({})",
                placeholders
            );
            let params: Vec<Value> = chunk.iter().map(|id| Value::Text(id.clone())).collect();
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params), |row| {
                Ok(ThumbnailState {
                    record: media_record_from_row(row)?,
                    thumb_source_size: row.get::<_, Option<i64>>(6)?.map(size_from_sql),
                })
            })?;
            for row in rows {
                let state = row?;
                results.insert(state.record.id.clone(), state);
            }
        }
        tx.commit()?;
        Ok(results)
    }

    /// Every stored entry (live or tombstoned) whose path lies under `root`.
    pub fn records_under_root(&self, root: &Path) -> CatalogResult<Vec<StoredEntry>> {
        let conn = self.pool.get()?;
        let prefix = root_prefix(root);
        let mut stmt = conn.prepare(
            "SELECT id, path, size, thumbnail_path, removed_at IS NOT NULL
             FROM media
             WHERE substr(path, 1, length(?1)) = ?1",
        )?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok(StoredEntry {
                id: row.get(0)?,
                path: row.get(1)?,
                size: size_from_sql(row.get(2)?),
                thumbnail_path: row.get(3)?,
                removed: row.get(4)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Number of live records.
    pub fn count(&self) -> CatalogResult<u64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM media WHERE removed_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(size_from_sql(count))
    }

    /// Every id the catalog knows, tombstones included.
    pub fn all_ids(&self) -> CatalogResult<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id FROM media")?;
        let rows = stmt.query_map([], |row: &Row<'_>| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

/// Path prefix (with trailing separator) that every descendant of `root` shares.
fn root_prefix(root: &Path) -> String {
    let mut prefix = root.to_string_lossy().to_string();
    if !prefix.ends_with(MAIN_SEPARATOR) {
        prefix.push(MAIN_SEPARATOR);
    }
    prefix
}

pub(crate) fn media_record_from_row(row: &Row<'_>) -> SqlResult<MediaRecord> {
    let kind_text: String = row.get(3)?;
    let kind = MediaKind::parse(&kind_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown media kind {:?}", kind_text).into(),
        )
    })?;
    Ok(MediaRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        filename: row.get(2)?,
        kind,
        size: size_from_sql(row.get(4)?),
        thumbnail_path: row.get(5)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::media_id::id_for;
    use std::path::PathBuf;

    pub(crate) fn open_temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let db = Database::open(&dir.path().join("catalog.db"), 4).expect("failed to open db");
        (dir, db)
    }

    pub(crate) fn sample_record(path: &str, kind: MediaKind, size: u64) -> MediaRecord {
        let path_buf = PathBuf::from(path);
        MediaRecord {
            id: id_for(&path_buf),
            path: path.to_string(),
            filename: path_buf
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            kind,
            size,
            thumbnail_path: None,
        }
    }

    #[test]
    fn test_upsert_is_idempotent_and_keeps_insertion_order() {
        let (_dir, db) = open_temp_db();
        let first = sample_record("/lib/b.jpg", MediaKind::Image, 10);
        let second = sample_record("/lib/a.mp4", MediaKind::Video, 20);
        db.upsert(&first).expect("upsert first");
        db.upsert(&second).expect("upsert second");
        db.upsert(&first).expect("re-upsert first");

        let all = db.get_all().expect("get_all");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[1].id, second.id);
    }

    #[test]
    fn test_get_by_ids_skips_unknown_and_tombstoned() {
        let (_dir, db) = open_temp_db();
        let a = sample_record("/lib/a.jpg", MediaKind::Image, 1);
        let b = sample_record("/lib/b.jpg", MediaKind::Image, 2);
        db.upsert(&a).expect("upsert a");
        db.upsert(&b).expect("upsert b");
        db.delete(&b.id).expect("delete b");

        let found = db
            .get_by_ids(&[a.id.clone(), b.id.clone(), "missing".to_string()])
            .expect("get_by_ids");
        assert_eq!(found.len(), 1);
        assert_eq!(found.get(&a.id), Some(&a));
    }

    #[test]
    fn test_batch_reads_span_multiple_lookup_chunks() {
        let (_dir, db) = open_temp_db();
        let records: Vec<UpsertRecord> = (0..(ID_LOOKUP_CHUNK * 2 + 17))
            .map(|idx| UpsertRecord {
                record: sample_record(&format!("/lib/img-{}.jpg", idx), MediaKind::Image, 3),
                file_mtime: None,
            })
            .collect();
        db.bulk_upsert(&records).expect("bulk upsert");
        let ids: Vec<String> = records.iter().map(|r| r.record.id.clone()).collect();

        let found = db.get_by_ids(&ids).expect("get_by_ids");
        assert_eq!(found.len(), ids.len());
        let states = db.get_thumbnail_states(&ids).expect("states");
        assert_eq!(states.len(), ids.len());
        assert!(ids.iter().all(|id| states[id].record == found[id]));
    }

    #[test]
    fn test_set_thumbnail_requires_live_record_with_matching_size() {
        let (_dir, db) = open_temp_db();
        let record = sample_record("/lib/a.jpg", MediaKind::Image, 100);
        db.upsert(&record).expect("upsert");

        let missing = db.set_thumbnail("nope", "/cache/nope.jpg", 1);
        assert!(matches!(missing, Err(CatalogError::NotFound(_))));

        let stale = db.set_thumbnail(&record.id, "/cache/a.jpg", 99);
        assert!(matches!(stale, Err(CatalogError::Stale { .. })));

        db.set_thumbnail(&record.id, "/cache/a.jpg", 100)
            .expect("set_thumbnail");
        let stored = db.get_by_id(&record.id).expect("get").expect("present");
        assert_eq!(stored.thumbnail_path.as_deref(), Some("/cache/a.jpg"));
    }

    #[test]
    fn test_delete_tombstones_and_upsert_revives_with_favorite() {
        let (_dir, db) = open_temp_db();
        let record = sample_record("/vol/a.jpg", MediaKind::Image, 5);
        db.upsert(&record).expect("upsert");
        db.set_favorite(&record.id, true).expect("favorite");
        db.delete(&record.id).expect("delete");
        assert!(db.get_all().expect("get_all").is_empty());
        assert!(matches!(
            db.delete(&record.id),
            Err(CatalogError::NotFound(_))
        ));

        db.upsert(&record).expect("revive");
        let favorites = db
            .list(
                &ListFilter {
                    favorites_only: true,
                    ..Default::default()
                },
                SortKey::Inserted,
            )
            .expect("list favorites");
        assert_eq!(favorites.len(), 1);
    }

    #[test]
    fn test_sweep_tombstones_hard_deletes_and_reports_thumbnails() {
        let (_dir, db) = open_temp_db();
        let record = sample_record("/vol/a.jpg", MediaKind::Image, 5);
        db.upsert(&record).expect("upsert");
        db.set_thumbnail(&record.id, "/cache/a.jpg", 5)
            .expect("thumbnail");
        db.delete(&record.id).expect("delete");

        let swept = db
            .sweep_tombstones(Utc::now() + chrono::Duration::seconds(5))
            .expect("sweep");
        assert_eq!(swept, vec!["/cache/a.jpg".to_string()]);
        assert!(db.all_ids().expect("ids").is_empty());
    }

    #[test]
    fn test_records_under_root_does_not_match_sibling_prefix() {
        let (_dir, db) = open_temp_db();
        let sep = MAIN_SEPARATOR;
        let inside = sample_record(&format!("{sep}data{sep}photos{sep}a.jpg"), MediaKind::Image, 1);
        let sibling = sample_record(
            &format!("{sep}data{sep}photos-old{sep}b.jpg"),
            MediaKind::Image,
            1,
        );
        db.upsert(&inside).expect("upsert inside");
        db.upsert(&sibling).expect("upsert sibling");

        let root = PathBuf::from(format!("{sep}data{sep}photos"));
        let entries = db.records_under_root(&root).expect("records_under_root");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, inside.id);
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("catalog.db");
        let record = sample_record("/lib/a.jpg", MediaKind::Image, 7);
        {
            let db = Database::open(&db_path, 2).expect("open");
            db.upsert(&record).expect("upsert");
        }
        let reopened = Database::open(&db_path, 2).expect("reopen");
        assert_eq!(reopened.get_all().expect("get_all"), vec![record]);
    }

    #[test]
    fn test_bulk_upsert_with_update_clears_thumbnail() {
        let (_dir, db) = open_temp_db();
        let mut record = sample_record("/lib/a.jpg", MediaKind::Image, 7);
        db.upsert(&record).expect("upsert");
        db.set_thumbnail(&record.id, "/cache/a.jpg", 7)
            .expect("thumbnail");

        record.size = 8;
        record.thumbnail_path = None;
        db.bulk_upsert(&[UpsertRecord {
            record: record.clone(),
            file_mtime: Some(42),
        }])
        .expect("bulk upsert");

        let stored = db.get_by_id(&record.id).expect("get").expect("present");
        assert_eq!(stored.size, 8);
        assert!(stored.thumbnail_path.is_none());
        let state = db
            .get_thumbnail_states(&[record.id.clone()])
            .expect("states");
        assert!(state[&record.id].thumb_source_size.is_none());
    }
}
