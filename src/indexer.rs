//! Directory scan and incremental mtime-diff indexing (spec.md §4.2).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use crate::db::ImageDatabase;
use crate::error::IndexError;
use crate::model::{ImageRecord, PaletteStatus, SourceRecord};

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "avif"];

/// Result of a single `index_folder` or `rebuild_index` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingResult {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl IndexingResult {
    fn merge(&mut self, other: IndexingResult) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
    }
}

/// Progress callback: `(current, total, message)`.
pub type ProgressCallback<'a> = dyn FnMut(usize, usize, &str) + 'a;

pub struct Indexer<'a> {
    db: &'a ImageDatabase,
    favorites_root: Option<PathBuf>,
}

impl<'a> Indexer<'a> {
    pub fn new(db: &'a ImageDatabase) -> Self {
        Self {
            db,
            favorites_root: None,
        }
    }

    pub fn with_favorites_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.favorites_root = Some(root.into());
        self
    }

    /// Bring the database into incremental consistency with `folder`'s
    /// on-disk contents. A nonexistent folder is treated as empty, which
    /// results in removal of any index entries beneath it.
    pub fn index_folder(
        &self,
        folder: &Path,
        recursive: bool,
        progress: Option<&mut ProgressCallback>,
    ) -> Result<IndexingResult, IndexError> {
        self.index_folder_with_source(folder, recursive, None, progress)
    }

    pub fn index_folder_with_source(
        &self,
        folder: &Path,
        recursive: bool,
        source_id: Option<&str>,
        mut progress: Option<&mut ProgressCallback>,
    ) -> Result<IndexingResult, IndexError> {
        let prefix = folder.to_string_lossy().to_string();
        let existing = self.db.get_indexed_mtime_map(&prefix)?;

        let on_disk = scan_directory(folder, recursive);

        let mut new_paths = Vec::new();
        let mut modified_paths = Vec::new();
        let mut unchanged: HashSet<String> = HashSet::new();

        for (path, mtime) in &on_disk {
            match existing.get(path) {
                None => new_paths.push(path.clone()),
                Some(&old_mtime) if old_mtime != *mtime => modified_paths.push(path.clone()),
                Some(_) => {
                    unchanged.insert(path.clone());
                }
            }
        }

        let on_disk_paths: HashSet<&String> = on_disk.iter().map(|(p, _)| p).collect();
        let removed: Vec<String> = existing
            .keys()
            .filter(|p| !on_disk_paths.contains(p))
            .cloned()
            .collect();

        let total = new_paths.len() + modified_paths.len();
        let mut current = 0;
        let mut batch = Vec::with_capacity(500);
        let mut added = 0;
        let mut updated = 0;

        for path in new_paths.iter().chain(modified_paths.iter()) {
            current += 1;
            if let Some(cb) = progress.as_deref_mut() {
                cb(current, total, path);
            }

            let existing_record = if modified_paths.contains(path) {
                self.db.get_image(path)?
            } else {
                None
            };

            match build_record(path, source_id, self.favorites_root.as_deref(), existing_record) {
                Some(record) => {
                    if modified_paths.contains(path) {
                        updated += 1;
                    } else {
                        added += 1;
                    }
                    batch.push(record);
                }
                None => {
                    tracing::warn!(path, "unreadable image file, skipping");
                }
            }

            if batch.len() >= 500 {
                self.db.batch_upsert_images(&batch)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.db.batch_upsert_images(&batch)?;
        }

        self.db.batch_delete_images(&removed)?;

        Ok(IndexingResult {
            added,
            updated,
            removed: removed.len(),
        })
    }

    /// Re-index several folders after taking a backup, preserving history
    /// on paths that remain indexed (spec.md §4.4 "Rebuild index").
    pub fn rebuild_index(
        &self,
        folders: &[PathBuf],
        backup_path: Option<&Path>,
        mut progress: Option<&mut ProgressCallback>,
    ) -> Result<IndexingResult, IndexError> {
        if let Some(backup_path) = backup_path {
            self.db.backup(backup_path)?;
        }

        let mut total = IndexingResult::default();
        for folder in folders {
            let result = self.index_folder(folder, true, progress.as_deref_mut())?;
            total.merge(result);
        }
        Ok(total)
    }

    /// Index a single path on the fly (used by `record_shown` when the
    /// shown image isn't already in the database).
    pub fn index_single(
        &self,
        path: &Path,
        source_id: Option<&str>,
    ) -> Result<Option<ImageRecord>, IndexError> {
        let path_str = path.to_string_lossy().to_string();
        let existing = self.db.get_image(&path_str)?;
        match build_record(&path_str, source_id, self.favorites_root.as_deref(), existing) {
            Some(record) => {
                self.db.upsert_image(&record)?;
                if let Some(ref sid) = record.source_id {
                    self.db.upsert_source(&SourceRecord {
                        source_id: sid.clone(),
                        source_type: "folder".to_string(),
                        last_shown_at: None,
                        times_shown: 0,
                    })?;
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// Walks `folder`, following symlinked directories once per real path to
/// avoid cycles, returning `(path, mtime)` for every file with a known
/// wallpaper extension. A nonexistent folder yields an empty result.
fn scan_directory(folder: &Path, recursive: bool) -> Vec<(String, i64)> {
    if !folder.exists() {
        return Vec::new();
    }

    let mut visited_real_paths = HashSet::new();
    let mut out = Vec::new();

    let walker = if recursive {
        WalkDir::new(folder).follow_links(true)
    } else {
        WalkDir::new(folder).max_depth(1).follow_links(true)
    };

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();

        if let Ok(real) = path.canonicalize() {
            if !visited_real_paths.insert(real) {
                continue;
            }
        }

        if !has_wallpaper_extension(path) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        out.push((path.to_string_lossy().to_string(), mtime));
    }

    out
}

fn has_wallpaper_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Builds an `ImageRecord` for `path`, preserving `first_indexed_at`,
/// `times_shown`, and `last_shown_at` from `existing` when present.
/// Returns `None` if the file can't be read as an image.
fn build_record(
    path: &str,
    source_id: Option<&str>,
    favorites_root: Option<&Path>,
    existing: Option<ImageRecord>,
) -> Option<ImageRecord> {
    let path_buf = Path::new(path);
    let (width, height) = image::image_dimensions(path_buf).ok()?;

    let metadata = std::fs::metadata(path_buf).ok();
    let file_size = metadata.as_ref().map(|m| m.len());
    let mtime = metadata
        .as_ref()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let is_favorite = favorites_root
        .map(|root| path_buf.starts_with(root))
        .unwrap_or(false);

    let filename = path_buf
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());

    let now = crate::now_unix();

    let (first_indexed_at, times_shown, last_shown_at) = match &existing {
        Some(record) => (
            record.first_indexed_at,
            record.times_shown,
            record.last_shown_at,
        ),
        None => (now, 0, None),
    };

    Some(ImageRecord {
        filepath: path.to_string(),
        filename,
        source_id: source_id.map(|s| s.to_string()),
        width: Some(width),
        height: Some(height),
        file_size,
        file_mtime: mtime,
        is_favorite,
        first_indexed_at,
        last_indexed_at: now,
        last_shown_at,
        times_shown,
        palette_status: existing
            .map(|r| r.palette_status)
            .unwrap_or(PaletteStatus::Pending),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_png(path: &Path) {
        // Smallest valid 1x1 PNG.
        const PNG_1X1: &[u8] = &[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00,
            0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08,
            0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0x18, 0xDD, 0x8D,
            0xB0, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ];
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(PNG_1X1).unwrap();
    }

    #[test]
    fn index_then_reindex_detects_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| dir.path().join(format!("{i}.png")))
            .collect();
        for p in &paths {
            write_test_png(p);
        }

        let db = ImageDatabase::open_in_memory().unwrap();
        let indexer = Indexer::new(&db);
        let result = indexer.index_folder(dir.path(), false, None).unwrap();
        assert_eq!(result.added, 5);
        assert_eq!(result.removed, 0);

        // Mark one image shown so we can assert its history is untouched.
        let kept_path = paths[0].to_string_lossy().to_string();
        db.record_image_shown(&kept_path, 999).unwrap();

        std::fs::remove_file(&paths[2]).unwrap();

        let result = indexer.index_folder(dir.path(), false, None).unwrap();
        assert_eq!(result.removed, 1);
        assert_eq!(result.added, 0);

        let removed_path = paths[2].to_string_lossy().to_string();
        assert!(db.get_image(&removed_path).unwrap().is_none());
        assert!(db.get_palette(&removed_path).unwrap().is_none());

        let kept = db.get_image(&kept_path).unwrap().unwrap();
        assert_eq!(kept.times_shown, 1);
        assert_eq!(kept.last_shown_at, Some(999));
    }

    #[test]
    fn nonexistent_folder_is_treated_as_empty() {
        let db = ImageDatabase::open_in_memory().unwrap();
        let indexer = Indexer::new(&db);
        let result = indexer
            .index_folder(Path::new("/does/not/exist"), true, None)
            .unwrap();
        assert_eq!(result, IndexingResult::default());
    }

    #[test]
    fn favorites_root_marks_favorite() {
        let dir = tempfile::tempdir().unwrap();
        let fav_dir = dir.path().join("favorites");
        std::fs::create_dir_all(&fav_dir).unwrap();
        let fav_path = fav_dir.join("a.png");
        write_test_png(&fav_path);

        let db = ImageDatabase::open_in_memory().unwrap();
        let indexer = Indexer::new(&db).with_favorites_root(&fav_dir);
        indexer.index_folder(dir.path(), true, None).unwrap();

        let record = db
            .get_image(&fav_path.to_string_lossy())
            .unwrap()
            .unwrap();
        assert!(record.is_favorite);
    }
}
