//! Row ↔ struct mapping for the image database.

use rusqlite::Row;

use crate::model::{ImageRecord, PaletteRecord, PaletteStatus, SourceRecord};

pub fn image_from_row(row: &Row) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        filepath: row.get("filepath")?,
        filename: row.get("filename")?,
        source_id: row.get("source_id")?,
        width: row.get("width")?,
        height: row.get("height")?,
        file_size: row.get("file_size")?,
        file_mtime: row.get("file_mtime")?,
        is_favorite: row.get::<_, i64>("is_favorite")? != 0,
        first_indexed_at: row.get("first_indexed_at")?,
        last_indexed_at: row.get("last_indexed_at")?,
        last_shown_at: row.get("last_shown_at")?,
        times_shown: row.get::<_, i64>("times_shown")? as u32,
        palette_status: PaletteStatus::from_str(&row.get::<_, String>("palette_status")?),
    })
}

pub fn source_from_row(row: &Row) -> rusqlite::Result<SourceRecord> {
    Ok(SourceRecord {
        source_id: row.get("source_id")?,
        source_type: row.get("source_type")?,
        last_shown_at: row.get("last_shown_at")?,
        times_shown: row.get::<_, i64>("times_shown")? as u32,
    })
}

pub fn palette_from_row(row: &Row) -> rusqlite::Result<PaletteRecord> {
    let colors: [String; 16] = std::array::from_fn(|i| {
        row.get::<_, String>(format!("color{i}").as_str())
            .unwrap_or_default()
    });
    Ok(PaletteRecord {
        filepath: row.get("filepath")?,
        colors,
        background: row.get("background")?,
        foreground: row.get("foreground")?,
        cursor: row.get("cursor")?,
        avg_hue: row.get("avg_hue")?,
        avg_saturation: row.get("avg_saturation")?,
        avg_lightness: row.get("avg_lightness")?,
        color_temperature: row.get("color_temperature")?,
        indexed_at: row.get("indexed_at")?,
    })
}
