//! Persistent image index: thread-safe, transactional storage for images,
//! sources, and palettes (spec.md §4.1).
//!
//! All public operations acquire the internal lock for their whole
//! duration, so a sequence of operations issued from one thread appears
//! atomic to every other caller. `close()` holds the lock too, and is
//! idempotent — calling it twice, or calling any other method after it,
//! returns [`DbError::Closed`] rather than panicking.

mod models;
mod schema;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::DbError;
use crate::model::{ImageRecord, PaletteRecord, PaletteStatus, SourceRecord};

/// Number of rows per transaction/IN-clause chunk, kept comfortably under
/// SQLite's parameter-count limit (spec.md §4.1).
const BATCH_CHUNK: usize = 500;

/// Bucketed counts grouped by a single dimension, for `get_statistics()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketCounts {
    pub buckets: Vec<(String, i64)>,
}

/// Aggregate counters computed in one GROUP-BY-CASE scan per dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub total_images: i64,
    pub total_favorites: i64,
    pub total_with_palettes: i64,
    pub total_shown: i64,
    pub by_lightness: BucketCounts,
    pub by_hue_family: BucketCounts,
    pub by_saturation: BucketCounts,
    pub by_freshness: BucketCounts,
}

pub struct ImageDatabase {
    conn: Mutex<Option<Connection>>,
}

impl ImageDatabase {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> Result<R, DbError>) -> Result<R, DbError> {
        let guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(DbError::Closed),
        }
    }

    /// Idempotent: closing an already-closed database is a no-op.
    pub fn close(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    // ---- images: singles ----------------------------------------------

    pub fn upsert_image(&self, image: &ImageRecord) -> Result<(), DbError> {
        self.with_conn(|conn| {
            upsert_image_stmt(conn, image)?;
            Ok(())
        })
    }

    pub fn get_image(&self, filepath: &str) -> Result<Option<ImageRecord>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM images WHERE filepath = ?1",
                    [filepath],
                    models::image_from_row,
                )
                .optional()?)
        })
    }

    pub fn delete_image(&self, filepath: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM images WHERE filepath = ?1", [filepath])?;
            Ok(())
        })
    }

    /// Sets `last_shown_at := now` and increments `times_shown`.
    pub fn record_image_shown(&self, filepath: &str, now: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE images SET last_shown_at = ?1, times_shown = times_shown + 1 WHERE filepath = ?2",
                params![now, filepath],
            )?;
            Ok(())
        })
    }

    // ---- sources --------------------------------------------------------

    pub fn upsert_source(&self, source: &SourceRecord) -> Result<(), DbError> {
        self.with_conn(|conn| {
            upsert_source_stmt(conn, source)?;
            Ok(())
        })
    }

    pub fn record_source_shown(&self, source_id: &str, now: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sources SET last_shown_at = ?1, times_shown = times_shown + 1 WHERE source_id = ?2",
                params![now, source_id],
            )?;
            Ok(())
        })
    }

    pub fn get_sources_by_ids(&self, ids: &[String]) -> Result<Vec<SourceRecord>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let mut results = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(BATCH_CHUNK) {
                let placeholders = placeholders(chunk.len());
                let sql = format!("SELECT * FROM sources WHERE source_id IN ({placeholders})");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(
                    rusqlite::params_from_iter(chunk.iter()),
                    models::source_from_row,
                )?;
                for row in rows {
                    results.push(row?);
                }
            }
            Ok(results)
        })
    }

    // ---- palettes -------------------------------------------------------

    pub fn upsert_palette(&self, palette: &PaletteRecord) -> Result<(), DbError> {
        self.with_conn(|conn| {
            upsert_palette_stmt(conn, palette)?;
            conn.execute(
                "UPDATE images SET palette_status = 'extracted' WHERE filepath = ?1",
                [&palette.filepath],
            )?;
            Ok(())
        })
    }

    pub fn get_palette(&self, filepath: &str) -> Result<Option<PaletteRecord>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM palettes WHERE filepath = ?1",
                    [filepath],
                    models::palette_from_row,
                )
                .optional()?)
        })
    }

    pub fn get_palettes_by_filepaths(
        &self,
        filepaths: &[String],
    ) -> Result<HashMap<String, PaletteRecord>, DbError> {
        if filepaths.is_empty() {
            return Ok(HashMap::new());
        }
        self.with_conn(|conn| {
            let mut out = HashMap::with_capacity(filepaths.len());
            for chunk in filepaths.chunks(BATCH_CHUNK) {
                let placeholders = placeholders(chunk.len());
                let sql = format!("SELECT * FROM palettes WHERE filepath IN ({placeholders})");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(
                    rusqlite::params_from_iter(chunk.iter()),
                    models::palette_from_row,
                )?;
                for row in rows {
                    let palette = row?;
                    out.insert(palette.filepath.clone(), palette);
                }
            }
            Ok(out)
        })
    }

    pub fn get_images_without_palettes(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ImageRecord>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM images WHERE palette_status != 'extracted' \
                 ORDER BY filepath LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(params![limit, offset], models::image_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    // ---- batch operations -------------------------------------------------

    pub fn batch_upsert_images(&self, images: &[ImageRecord]) -> Result<(), DbError> {
        self.with_conn(|conn| {
            for chunk in images.chunks(BATCH_CHUNK) {
                let tx = conn.unchecked_transaction()?;
                for image in chunk {
                    upsert_image_stmt(&tx, image)?;
                }
                tx.commit()?;
            }
            Ok(())
        })
    }

    pub fn batch_upsert_sources(&self, sources: &[SourceRecord]) -> Result<(), DbError> {
        self.with_conn(|conn| {
            for chunk in sources.chunks(BATCH_CHUNK) {
                let tx = conn.unchecked_transaction()?;
                for source in chunk {
                    upsert_source_stmt(&tx, source)?;
                }
                tx.commit()?;
            }
            Ok(())
        })
    }

    /// Deletes image rows (and, via cascade, their palette rows) for the
    /// given filepaths, chunked to respect the parameter limit.
    pub fn batch_delete_images(&self, filepaths: &[String]) -> Result<(), DbError> {
        if filepaths.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            for chunk in filepaths.chunks(BATCH_CHUNK) {
                let placeholders = placeholders(chunk.len());
                let sql = format!("DELETE FROM images WHERE filepath IN ({placeholders})");
                conn.execute(&sql, rusqlite::params_from_iter(chunk.iter()))?;
                // Cascade via ON DELETE CASCADE depends on `PRAGMA foreign_keys`
                // being on for this connection (set at open time), but we also
                // delete explicitly so callers relying on older SQLite builds
                // without FK enforcement still see consistent results.
                let sql = format!("DELETE FROM palettes WHERE filepath IN ({placeholders})");
                conn.execute(&sql, rusqlite::params_from_iter(chunk.iter()))?;
            }
            Ok(())
        })
    }

    /// `{filepath -> file_mtime}` for every indexed image whose path
    /// starts with `prefix`.
    pub fn get_indexed_mtime_map(&self, prefix: &str) -> Result<HashMap<String, i64>, DbError> {
        self.with_conn(|conn| {
            let like_pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
            let mut stmt = conn.prepare(
                "SELECT filepath, file_mtime FROM images WHERE filepath LIKE ?1 ESCAPE '\\'",
            )?;
            let rows = stmt.query_map([like_pattern], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut map = HashMap::new();
            for row in rows {
                let (path, mtime) = row?;
                map.insert(path, mtime);
            }
            Ok(map)
        })
    }

    // ---- candidate queries for the selector -------------------------------

    /// All images matching the selector's non-palette constraints. Palette
    /// constraints are applied by the selector after a batch palette load.
    pub fn query_candidates(
        &self,
        min_width: Option<u32>,
        min_height: Option<u32>,
        min_aspect_ratio: Option<f64>,
        max_aspect_ratio: Option<f64>,
        source_whitelist: Option<&[String]>,
        favorites_only: bool,
    ) -> Result<Vec<ImageRecord>, DbError> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM images WHERE 1=1");
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(w) = min_width {
                sql.push_str(" AND width >= ?");
                args.push(Box::new(w));
            }
            if let Some(h) = min_height {
                sql.push_str(" AND height >= ?");
                args.push(Box::new(h));
            }
            if favorites_only {
                sql.push_str(" AND is_favorite = 1");
            }
            if let Some(whitelist) = source_whitelist {
                if whitelist.is_empty() {
                    return Ok(Vec::new());
                }
                let placeholders = placeholders(whitelist.len());
                sql.push_str(&format!(" AND source_id IN ({placeholders})"));
                for s in whitelist {
                    args.push(Box::new(s.clone()));
                }
            }

            let mut stmt = conn.prepare(&sql)?;
            let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
            let rows = stmt.query_map(arg_refs.as_slice(), models::image_from_row)?;

            let mut out = Vec::new();
            for row in rows {
                let image = row?;
                if let Some(ratio) = image.aspect_ratio() {
                    if let Some(min) = min_aspect_ratio {
                        if ratio < min {
                            continue;
                        }
                    }
                    if let Some(max) = max_aspect_ratio {
                        if ratio > max {
                            continue;
                        }
                    }
                }
                out.push(image);
            }
            Ok(out)
        })
    }

    // ---- aggregates --------------------------------------------------------

    pub fn aggregates(&self) -> Result<Aggregates, DbError> {
        self.with_conn(|conn| {
            let total_images: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |r| r.get(0))?;
            let total_favorites: i64 =
                conn.query_row("SELECT COUNT(*) FROM images WHERE is_favorite = 1", [], |r| {
                    r.get(0)
                })?;
            let total_with_palettes: i64 =
                conn.query_row("SELECT COUNT(*) FROM palettes", [], |r| r.get(0))?;
            let total_shown: i64 = conn.query_row(
                "SELECT COUNT(*) FROM images WHERE times_shown > 0",
                [],
                |r| r.get(0),
            )?;

            let by_lightness = bucket_query(
                conn,
                "SELECT \
                    CASE \
                        WHEN avg_lightness < 0.33 THEN 'dark' \
                        WHEN avg_lightness < 0.66 THEN 'medium' \
                        ELSE 'light' \
                    END AS bucket, COUNT(*) \
                 FROM palettes GROUP BY bucket",
            )?;

            let by_hue_family = bucket_query(
                conn,
                "SELECT \
                    CASE \
                        WHEN avg_hue < 30 OR avg_hue >= 330 THEN 'red' \
                        WHEN avg_hue < 90 THEN 'yellow' \
                        WHEN avg_hue < 150 THEN 'green' \
                        WHEN avg_hue < 210 THEN 'cyan' \
                        WHEN avg_hue < 270 THEN 'blue' \
                        ELSE 'magenta' \
                    END AS bucket, COUNT(*) \
                 FROM palettes GROUP BY bucket",
            )?;

            let by_saturation = bucket_query(
                conn,
                "SELECT \
                    CASE \
                        WHEN avg_saturation < 0.33 THEN 'muted' \
                        WHEN avg_saturation < 0.66 THEN 'moderate' \
                        ELSE 'vivid' \
                    END AS bucket, COUNT(*) \
                 FROM palettes GROUP BY bucket",
            )?;

            let by_freshness = bucket_query(
                conn,
                "SELECT \
                    CASE \
                        WHEN last_shown_at IS NULL THEN 'never_shown' \
                        WHEN times_shown <= 1 THEN 'new' \
                        ELSE 'seen' \
                    END AS bucket, COUNT(*) \
                 FROM images GROUP BY bucket",
            )?;

            Ok(Aggregates {
                total_images,
                total_favorites,
                total_with_palettes,
                total_shown,
                by_lightness,
                by_hue_family,
                by_saturation,
                by_freshness,
            })
        })
    }

    /// Resets every image's and source's shown-history counters without
    /// removing any rows (spec.md §6 `clear_history()`).
    pub fn clear_history(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE images SET last_shown_at = NULL, times_shown = 0",
                [],
            )?;
            conn.execute(
                "UPDATE sources SET last_shown_at = NULL, times_shown = 0",
                [],
            )?;
            Ok(())
        })
    }

    // ---- maintenance --------------------------------------------------------

    pub fn vacuum(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute_batch("VACUUM;")?;
            Ok(())
        })
    }

    pub fn verify_integrity(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let result: String =
                conn.query_row("PRAGMA integrity_check", [], |r| r.get(0))?;
            if result == "ok" {
                Ok(())
            } else {
                Err(DbError::IntegrityCheckFailed(result))
            }
        })
    }

    /// Deletes palette rows whose filepath is absent from `images`.
    pub fn cleanup_orphans(&self) -> Result<u64, DbError> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM palettes WHERE filepath NOT IN (SELECT filepath FROM images)",
                [],
            )?;
            Ok(deleted as u64)
        })
    }

    /// Deletes image rows whose filepath no longer exists on disk.
    pub fn remove_missing_files(&self) -> Result<u64, DbError> {
        let paths: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT filepath FROM images")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })?;

        let missing: Vec<String> = paths
            .into_iter()
            .filter(|p| !Path::new(p).exists())
            .collect();
        let count = missing.len() as u64;
        self.batch_delete_images(&missing)?;
        Ok(count)
    }

    /// Backs up to `target`, preferring SQLite's native online backup API,
    /// falling back to a checkpoint-then-copy if unavailable.
    pub fn backup(&self, target: &Path) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            let mut dst = Connection::open(target)?;
            let backup = rusqlite::backup::Backup::new(conn, &mut dst)?;
            backup.run_to_completion(100, std::time::Duration::from_millis(0), None)?;
            Ok(())
        })
    }
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}

fn bucket_query(conn: &Connection, sql: &str) -> Result<BucketCounts, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    let mut buckets = Vec::new();
    for row in rows {
        buckets.push(row?);
    }
    Ok(BucketCounts { buckets })
}

fn upsert_image_stmt(conn: &Connection, image: &ImageRecord) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO images (
            filepath, filename, source_id, width, height, file_size, file_mtime,
            is_favorite, first_indexed_at, last_indexed_at, last_shown_at, times_shown,
            palette_status
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)
        ON CONFLICT(filepath) DO UPDATE SET
            filename = excluded.filename,
            source_id = excluded.source_id,
            width = excluded.width,
            height = excluded.height,
            file_size = excluded.file_size,
            file_mtime = excluded.file_mtime,
            is_favorite = excluded.is_favorite,
            last_indexed_at = excluded.last_indexed_at,
            last_shown_at = excluded.last_shown_at,
            times_shown = excluded.times_shown,
            palette_status = excluded.palette_status",
        params![
            image.filepath,
            image.filename,
            image.source_id,
            image.width,
            image.height,
            image.file_size,
            image.file_mtime,
            image.is_favorite as i64,
            image.first_indexed_at,
            image.last_indexed_at,
            image.last_shown_at,
            image.times_shown,
            image.palette_status.as_str(),
        ],
    )?;
    Ok(())
}

fn upsert_source_stmt(conn: &Connection, source: &SourceRecord) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO sources (source_id, source_type, last_shown_at, times_shown)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(source_id) DO UPDATE SET
            source_type = excluded.source_type,
            last_shown_at = excluded.last_shown_at,
            times_shown = excluded.times_shown",
        params![
            source.source_id,
            source.source_type,
            source.last_shown_at,
            source.times_shown,
        ],
    )?;
    Ok(())
}

fn upsert_palette_stmt(conn: &Connection, palette: &PaletteRecord) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO palettes (
            filepath,
            color0, color1, color2, color3, color4, color5, color6, color7,
            color8, color9, color10, color11, color12, color13, color14, color15,
            background, foreground, cursor,
            avg_hue, avg_saturation, avg_lightness, color_temperature, indexed_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25)
        ON CONFLICT(filepath) DO UPDATE SET
            color0=excluded.color0, color1=excluded.color1, color2=excluded.color2, color3=excluded.color3,
            color4=excluded.color4, color5=excluded.color5, color6=excluded.color6, color7=excluded.color7,
            color8=excluded.color8, color9=excluded.color9, color10=excluded.color10, color11=excluded.color11,
            color12=excluded.color12, color13=excluded.color13, color14=excluded.color14, color15=excluded.color15,
            background=excluded.background, foreground=excluded.foreground, cursor=excluded.cursor,
            avg_hue=excluded.avg_hue, avg_saturation=excluded.avg_saturation,
            avg_lightness=excluded.avg_lightness, color_temperature=excluded.color_temperature,
            indexed_at=excluded.indexed_at",
        params![
            palette.filepath,
            palette.colors[0], palette.colors[1], palette.colors[2], palette.colors[3],
            palette.colors[4], palette.colors[5], palette.colors[6], palette.colors[7],
            palette.colors[8], palette.colors[9], palette.colors[10], palette.colors[11],
            palette.colors[12], palette.colors[13], palette.colors[14], palette.colors[15],
            palette.background, palette.foreground, palette.cursor,
            palette.avg_hue, palette.avg_saturation, palette.avg_lightness, palette.color_temperature,
            palette.indexed_at,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image(path: &str) -> ImageRecord {
        ImageRecord {
            filepath: path.to_string(),
            filename: path.to_string(),
            source_id: Some("A".to_string()),
            width: Some(1920),
            height: Some(1080),
            file_size: Some(1024),
            file_mtime: 100,
            is_favorite: false,
            first_indexed_at: 1,
            last_indexed_at: 1,
            last_shown_at: None,
            times_shown: 0,
            palette_status: PaletteStatus::Pending,
        }
    }

    #[test]
    fn upsert_and_get_roundtrip() {
        let db = ImageDatabase::open_in_memory().unwrap();
        let img = sample_image("/a.jpg");
        db.upsert_image(&img).unwrap();
        let fetched = db.get_image("/a.jpg").unwrap().unwrap();
        assert_eq!(fetched.filepath, "/a.jpg");
        assert_eq!(fetched.times_shown, 0);
        assert!(fetched.last_shown_at.is_none());
    }

    #[test]
    fn record_shown_twice_increments_by_two() {
        let db = ImageDatabase::open_in_memory().unwrap();
        db.upsert_image(&sample_image("/a.jpg")).unwrap();
        db.record_image_shown("/a.jpg", 10).unwrap();
        db.record_image_shown("/a.jpg", 20).unwrap();
        let fetched = db.get_image("/a.jpg").unwrap().unwrap();
        assert_eq!(fetched.times_shown, 2);
        assert_eq!(fetched.last_shown_at, Some(20));
    }

    #[test]
    fn reindex_preserves_history_when_row_is_upserted_with_same_values() {
        let db = ImageDatabase::open_in_memory().unwrap();
        let mut img = sample_image("/a.jpg");
        db.upsert_image(&img).unwrap();
        db.record_image_shown("/a.jpg", 50).unwrap();

        // Simulate an indexer re-upsert that preserves history fields, as
        // the indexer itself is responsible for copying them forward.
        let existing = db.get_image("/a.jpg").unwrap().unwrap();
        img.first_indexed_at = existing.first_indexed_at;
        img.times_shown = existing.times_shown;
        img.last_shown_at = existing.last_shown_at;
        img.file_mtime = 200;
        db.upsert_image(&img).unwrap();

        let fetched = db.get_image("/a.jpg").unwrap().unwrap();
        assert_eq!(fetched.times_shown, 1);
        assert_eq!(fetched.last_shown_at, Some(50));
        assert_eq!(fetched.file_mtime, 200);
    }

    #[test]
    fn batch_delete_removes_image_and_palette() {
        let db = ImageDatabase::open_in_memory().unwrap();
        db.upsert_image(&sample_image("/a.jpg")).unwrap();
        let palette = PaletteRecord {
            filepath: "/a.jpg".to_string(),
            colors: std::array::from_fn(|_| "#000000".to_string()),
            background: "#000000".to_string(),
            foreground: "#ffffff".to_string(),
            cursor: "#ffffff".to_string(),
            avg_hue: 0.0,
            avg_saturation: 0.0,
            avg_lightness: 0.0,
            color_temperature: 0.0,
            indexed_at: 1,
        };
        db.upsert_palette(&palette).unwrap();

        db.batch_delete_images(&["/a.jpg".to_string()]).unwrap();

        assert!(db.get_image("/a.jpg").unwrap().is_none());
        assert!(db.get_palette("/a.jpg").unwrap().is_none());
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_use() {
        let db = ImageDatabase::open_in_memory().unwrap();
        db.close();
        db.close();
        assert!(matches!(db.get_image("/a.jpg"), Err(DbError::Closed)));
    }

    #[test]
    fn backup_has_identical_row_counts() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("src.db");
        let dst_path = dir.path().join("dst.db");

        let db = ImageDatabase::open(&src_path).unwrap();
        db.upsert_image(&sample_image("/a.jpg")).unwrap();
        db.upsert_image(&sample_image("/b.jpg")).unwrap();
        db.upsert_source(&SourceRecord {
            source_id: "A".to_string(),
            source_type: "folder".to_string(),
            last_shown_at: None,
            times_shown: 0,
        })
        .unwrap();
        db.backup(&dst_path).unwrap();

        let restored = ImageDatabase::open(&dst_path).unwrap();
        assert_eq!(
            db.aggregates().unwrap().total_images,
            restored.aggregates().unwrap().total_images
        );
    }

    #[test]
    fn candidate_query_filters_by_favorite_and_aspect() {
        let db = ImageDatabase::open_in_memory().unwrap();
        let mut fav = sample_image("/fav.jpg");
        fav.is_favorite = true;
        db.upsert_image(&fav).unwrap();
        let mut tall = sample_image("/tall.jpg");
        tall.width = Some(100);
        tall.height = Some(1000);
        db.upsert_image(&tall).unwrap();

        let favorites = db
            .query_candidates(None, None, None, None, None, true)
            .unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].filepath, "/fav.jpg");

        let widescreen = db
            .query_candidates(None, None, Some(1.0), None, None, false)
            .unwrap();
        assert_eq!(widescreen.len(), 1);
        assert_eq!(widescreen[0].filepath, "/fav.jpg");
    }

    #[test]
    fn clear_history_resets_counters_without_deleting_rows() {
        let db = ImageDatabase::open_in_memory().unwrap();
        db.upsert_image(&sample_image("/a.jpg")).unwrap();
        db.upsert_source(&SourceRecord {
            source_id: "A".to_string(),
            source_type: "folder".to_string(),
            last_shown_at: None,
            times_shown: 0,
        })
        .unwrap();
        db.record_image_shown("/a.jpg", 50).unwrap();
        db.record_source_shown("A", 50).unwrap();

        db.clear_history().unwrap();

        let image = db.get_image("/a.jpg").unwrap().unwrap();
        assert_eq!(image.times_shown, 0);
        assert!(image.last_shown_at.is_none());
        let sources = db.get_sources_by_ids(&["A".to_string()]).unwrap();
        assert_eq!(sources[0].times_shown, 0);
    }
}
