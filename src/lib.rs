//! Smart Selection Engine: weighted wallpaper selection informed by
//! recency, source diversity, favorites, color palettes, and
//! time-of-day, plus a coupled theming engine that regenerates
//! terminal/bar/editor color themes from the selected image's palette.

pub mod analyzer_config;
pub mod cli;
pub mod cli_args;
pub mod color;
pub mod config;
pub mod db;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod model;
pub mod palette_extractor;
pub mod selector;
pub mod stats;
pub mod theming;
pub mod time_adapter;
pub mod weight;

/// Current Unix timestamp in seconds. Centralized so every component
/// stamps records using the same clock source.
pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
