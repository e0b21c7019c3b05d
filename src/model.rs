//! Core data model: images, sources, palettes, and selection parameters.
//!
//! Mirrors spec.md §3. `SelectionConstraints` and `PaletteTarget` derive
//! `Default` so a host can build them incrementally, the same pattern the
//! teacher uses for `ColorConfig`.

use serde::{Deserialize, Serialize};

/// Status of palette extraction for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteStatus {
    Pending,
    Extracted,
    Failed,
}

impl PaletteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracted => "extracted",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "extracted" => Self::Extracted,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Primary entity, keyed by absolute file path.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub filepath: String,
    pub filename: String,
    pub source_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_size: Option<u64>,
    pub file_mtime: i64,
    pub is_favorite: bool,
    pub first_indexed_at: i64,
    pub last_indexed_at: i64,
    pub last_shown_at: Option<i64>,
    pub times_shown: u32,
    pub palette_status: PaletteStatus,
}

impl ImageRecord {
    /// `width / height` when both dimensions are known.
    pub fn aspect_ratio(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if h != 0 => Some(w as f64 / h as f64),
            _ => None,
        }
    }
}

/// A named rotation source: a folder, an API feed, a favorites bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub source_id: String,
    pub source_type: String,
    pub last_shown_at: Option<i64>,
    pub times_shown: u32,
}

/// Sixteen-color palette plus derived metrics, keyed by filepath.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteRecord {
    pub filepath: String,
    pub colors: [String; 16],
    pub background: String,
    pub foreground: String,
    pub cursor: String,
    pub avg_hue: f64,
    pub avg_saturation: f64,
    pub avg_lightness: f64,
    pub color_temperature: f64,
    pub indexed_at: i64,
}

impl PaletteRecord {
    pub fn color(&self, index: usize) -> Option<&str> {
        self.colors.get(index).map(|s| s.as_str())
    }
}

/// Decay shape applied to the recency and source-recency factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyDecay {
    #[default]
    Exponential,
    Linear,
    Step,
}

/// How the time adapter determines day/night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAdaptationMethod {
    #[default]
    SunriseSunset,
    Fixed,
    SystemTheme,
}

/// Target palette metrics used by color affinity and by the time adapter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PaletteTarget {
    pub lightness: Option<f64>,
    pub temperature: Option<f64>,
    pub saturation: Option<f64>,
    /// Minimum similarity required to pass the hard filter; `None` disables it.
    pub tolerance: Option<f64>,
}

/// Optional per-call filters for `select()`.
#[derive(Debug, Clone, Default)]
pub struct SelectionConstraints {
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub min_aspect_ratio: Option<f64>,
    pub max_aspect_ratio: Option<f64>,
    pub source_whitelist: Option<Vec<String>>,
    pub favorites_only: bool,
    pub target_palette: Option<PaletteTarget>,
    pub min_similarity: Option<f64>,
    /// Continuity mode: target the palette of the image currently shown.
    pub continuity: bool,
    pub continuity_weight: f64,
}

impl SelectionConstraints {
    pub fn with_favorites_only() -> Self {
        Self {
            favorites_only: true,
            ..Default::default()
        }
    }
}

/// Named palette-target presets used by the time adapter (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalettePreset {
    BrightDay,
    NeutralDay,
    CozyNight,
    CoolNight,
    DarkMode,
}

impl PalettePreset {
    pub fn target(self) -> PaletteTarget {
        let (l, t, s) = match self {
            Self::BrightDay => (0.7, 0.3, 0.6),
            Self::NeutralDay => (0.6, 0.0, 0.5),
            Self::CozyNight => (0.3, 0.4, 0.4),
            Self::CoolNight => (0.25, -0.3, 0.5),
            Self::DarkMode => (0.2, 0.0, 0.4),
        };
        PaletteTarget {
            lightness: Some(l),
            temperature: Some(t),
            saturation: Some(s),
            tolerance: None,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "bright_day" => Some(Self::BrightDay),
            "neutral_day" => Some(Self::NeutralDay),
            "cozy_night" => Some(Self::CozyNight),
            "cool_night" => Some(Self::CoolNight),
            "dark_mode" => Some(Self::DarkMode),
            _ => None,
        }
    }
}
