//! Command-line argument definitions for the `smart-selection` binary.
//!
//! This binary is ambient developer/test tooling, not the "host"
//! application described by the core's contract; it exercises the public
//! API through a thin `clap::Parser` front end.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "smart-selection", version, about = "Weighted wallpaper selection engine with palette-aware theming")]
pub struct Cli {
    /// Path to the image database file.
    #[arg(long, global = true, default_value = "smart_selection.db")]
    pub db_path: PathBuf,

    /// Path to the selection.toml tunables file.
    #[arg(long, global = true, default_value = "selection.toml")]
    pub config_path: PathBuf,

    /// Path to write logs to.
    #[arg(long, global = true)]
    pub log_path: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Generate shell completions for the specified shell and exit.
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<clap_complete::Shell>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan one or more folders and bring the index up to date.
    Index {
        folders: Vec<PathBuf>,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        favorites_root: Option<PathBuf>,
        #[arg(long)]
        source_id: Option<String>,
    },

    /// Select N images under the given constraints.
    Select {
        #[arg(long, default_value_t = 1)]
        count: usize,
        #[arg(long)]
        favorites_only: bool,
        #[arg(long)]
        min_width: Option<u32>,
        #[arg(long)]
        min_height: Option<u32>,
        #[arg(long)]
        source: Vec<String>,
        #[arg(long)]
        min_similarity: Option<f64>,
        #[arg(long)]
        continuity: bool,
    },

    /// Record that a path was just shown as the desktop wallpaper.
    RecordShown { path: PathBuf },

    /// Back up the database, then re-scan every given folder.
    RebuildIndex { folders: Vec<PathBuf> },

    /// Extract palettes for every indexed image missing one.
    ExtractPalettes {
        #[arg(long)]
        wallust_toml: PathBuf,
        #[arg(long)]
        cache_root: PathBuf,
    },

    /// Print aggregate library statistics as JSON.
    Stats,

    /// Clear all shown-history counters (does not remove images).
    ClearHistory,

    /// Print the current day/night period and palette target.
    TimePeriod,

    /// Apply the theming engine to a single image path.
    Theme {
        #[command(subcommand)]
        action: ThemeCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ThemeCommand {
    /// Render templates for `path`'s cached palette.
    Apply {
        path: PathBuf,
        #[arg(long)]
        registry: PathBuf,
        #[arg(long)]
        overlay: Option<PathBuf>,
    },
}
