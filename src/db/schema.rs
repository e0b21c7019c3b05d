//! Schema DDL and migrations for the image database (spec.md §4.1).
//!
//! Migrations are idempotent: each step checks for the column/index it
//! would add via `PRAGMA table_info`/`PRAGMA index_list` before altering,
//! so re-running `migrate` on an up-to-date database is a no-op.

use rusqlite::Connection;

use crate::error::DbError;

/// Compiled-in schema version. Bump when adding a migration step.
pub const CURRENT_VERSION: i32 = 1;

const CREATE_SCHEMA_INFO: &str = "
    CREATE TABLE IF NOT EXISTS schema_info (
        id INTEGER PRIMARY KEY CHECK (id = 0),
        version INTEGER NOT NULL
    )
";

const CREATE_IMAGES: &str = "
    CREATE TABLE IF NOT EXISTS images (
        filepath TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        source_id TEXT,
        width INTEGER,
        height INTEGER,
        file_size INTEGER,
        file_mtime INTEGER NOT NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        first_indexed_at INTEGER NOT NULL,
        last_indexed_at INTEGER NOT NULL,
        last_shown_at INTEGER,
        times_shown INTEGER NOT NULL DEFAULT 0,
        palette_status TEXT NOT NULL DEFAULT 'pending'
    )
";

const CREATE_SOURCES: &str = "
    CREATE TABLE IF NOT EXISTS sources (
        source_id TEXT PRIMARY KEY,
        source_type TEXT NOT NULL,
        last_shown_at INTEGER,
        times_shown INTEGER NOT NULL DEFAULT 0
    )
";

const CREATE_PALETTES: &str = "
    CREATE TABLE IF NOT EXISTS palettes (
        filepath TEXT PRIMARY KEY REFERENCES images(filepath) ON DELETE CASCADE,
        color0 TEXT NOT NULL, color1 TEXT NOT NULL, color2 TEXT NOT NULL, color3 TEXT NOT NULL,
        color4 TEXT NOT NULL, color5 TEXT NOT NULL, color6 TEXT NOT NULL, color7 TEXT NOT NULL,
        color8 TEXT NOT NULL, color9 TEXT NOT NULL, color10 TEXT NOT NULL, color11 TEXT NOT NULL,
        color12 TEXT NOT NULL, color13 TEXT NOT NULL, color14 TEXT NOT NULL, color15 TEXT NOT NULL,
        background TEXT NOT NULL,
        foreground TEXT NOT NULL,
        cursor TEXT NOT NULL,
        avg_hue REAL NOT NULL,
        avg_saturation REAL NOT NULL,
        avg_lightness REAL NOT NULL,
        color_temperature REAL NOT NULL,
        indexed_at INTEGER NOT NULL
    )
";

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_images_source_id ON images(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_images_last_shown_at ON images(last_shown_at)",
    "CREATE INDEX IF NOT EXISTS idx_images_is_favorite ON images(is_favorite)",
    "CREATE INDEX IF NOT EXISTS idx_images_palette_status ON images(palette_status)",
    "CREATE INDEX IF NOT EXISTS idx_palettes_avg_lightness ON palettes(avg_lightness)",
    "CREATE INDEX IF NOT EXISTS idx_palettes_color_temperature ON palettes(color_temperature)",
    "CREATE INDEX IF NOT EXISTS idx_palettes_compound ON palettes(avg_lightness, color_temperature, avg_saturation)",
];

/// Create every table/index if absent, then run any pending migration
/// steps based on the stored `schema_info.version`.
pub fn initialize(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(CREATE_SCHEMA_INFO, [])?;
    conn.execute(CREATE_IMAGES, [])?;
    conn.execute(CREATE_SOURCES, [])?;
    conn.execute(CREATE_PALETTES, [])?;
    for stmt in INDEXES {
        conn.execute(stmt, [])?;
    }

    let stored_version: Option<i32> = conn
        .query_row("SELECT version FROM schema_info WHERE id = 0", [], |row| {
            row.get(0)
        })
        .ok();

    match stored_version {
        None => {
            conn.execute(
                "INSERT INTO schema_info (id, version) VALUES (0, ?1)",
                [CURRENT_VERSION],
            )?;
        }
        Some(v) if v < CURRENT_VERSION => {
            migrate(conn, v)?;
            conn.execute(
                "UPDATE schema_info SET version = ?1 WHERE id = 0",
                [CURRENT_VERSION],
            )?;
        }
        _ => {}
    }

    Ok(())
}

/// Step through migrations from `from_version` to `CURRENT_VERSION`.
/// There are no migrations beyond the initial schema yet; this is the
/// hook future schema changes attach to.
fn migrate(_conn: &Connection, _from_version: i32) -> Result<(), DbError> {
    Ok(())
}
