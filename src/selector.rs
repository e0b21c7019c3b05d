//! Weighted image selection and shown-history recording (spec.md §4.4).

use std::path::Path;

use crate::color::{self, PaletteMetrics};
use crate::config::SelectionConfig;
use crate::db::ImageDatabase;
use crate::error::CoreError;
use crate::indexer::Indexer;
use crate::model::{ImageRecord, PaletteRecord, PaletteTarget, SelectionConstraints};
use crate::palette_extractor::PaletteExtractor;
use crate::stats::StatisticsCache;
use crate::weight::{self, CandidateInputs};

/// Facade over the database, weight calculator, and sampler (spec.md §4.4).
/// The palette extractor and statistics cache are optional: a host that
/// never extracts synchronously or never caches statistics can omit them.
pub struct Selector<'a> {
    db: &'a ImageDatabase,
    extractor: Option<&'a PaletteExtractor>,
    stats: Option<&'a StatisticsCache<'a>>,
}

impl<'a> Selector<'a> {
    pub fn new(db: &'a ImageDatabase) -> Self {
        Self {
            db,
            extractor: None,
            stats: None,
        }
    }

    pub fn with_palette_extractor(mut self, extractor: &'a PaletteExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_statistics_cache(mut self, stats: &'a StatisticsCache<'a>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Select up to `count` images without replacement, weighted per
    /// spec.md §4.3. Returns fewer than `count` if too few candidates
    /// survive the constraints; never errors on a simple shortage.
    pub fn select(
        &self,
        count: usize,
        config: &SelectionConfig,
        constraints: &SelectionConstraints,
        now: i64,
    ) -> Result<Vec<ImageRecord>, CoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut candidates = self.db.query_candidates(
            constraints.min_width,
            constraints.min_height,
            constraints.min_aspect_ratio,
            constraints.max_aspect_ratio,
            constraints.source_whitelist.as_deref(),
            constraints.favorites_only,
        )?;

        candidates.retain(|image| Path::new(&image.filepath).exists());

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let filepaths: Vec<String> = candidates.iter().map(|i| i.filepath.clone()).collect();
        let palettes = self.db.get_palettes_by_filepaths(&filepaths)?;

        let target = resolve_target(constraints, &palettes, &candidates);

        if let Some(PaletteTarget {
            tolerance: Some(min_similarity),
            ..
        }) = target
        {
            candidates.retain(|image| {
                palettes
                    .get(&image.filepath)
                    .map(|p| metric_similarity(p, &target) >= min_similarity)
                    .unwrap_or(false)
            });
        }
        if let Some(min_similarity) = constraints.min_similarity {
            candidates.retain(|image| {
                palettes
                    .get(&image.filepath)
                    .map(|p| metric_similarity(p, &target) >= min_similarity)
                    .unwrap_or(false)
            });
        }

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let source_ids: Vec<String> = candidates
            .iter()
            .filter_map(|i| i.source_id.clone())
            .collect();
        let source_last_shown: std::collections::HashMap<String, Option<i64>> = self
            .db
            .get_sources_by_ids(&source_ids)?
            .into_iter()
            .map(|s| (s.source_id, s.last_shown_at))
            .collect();

        let weights: Vec<f64> = candidates
            .iter()
            .map(|image| {
                let metrics = palettes.get(&image.filepath).map(metrics_of);
                let inputs = CandidateInputs {
                    now,
                    last_shown_at: image.last_shown_at,
                    source_last_shown_at: image
                        .source_id
                        .as_ref()
                        .and_then(|id| source_last_shown.get(id).copied().flatten()),
                    is_favorite: image.is_favorite,
                    times_shown: image.times_shown,
                    palette_metrics: metrics.as_ref(),
                };
                weight::weight(&inputs, config, target.as_ref())
            })
            .collect();

        let chosen = sample_without_replacement(&weights, count.min(candidates.len()));
        Ok(chosen.into_iter().map(|i| candidates[i].clone()).collect())
    }

    /// Records that `filepath` was just shown as the desktop wallpaper
    /// (spec.md §4.4): (a) indexes the path on the fly if it isn't already
    /// in the database, (b) updates the image's shown fields, (c) updates
    /// its source, (d) persists `palette` if supplied, else extracts
    /// synchronously when a palette extractor is configured, (e)
    /// invalidates the statistics cache if one is configured.
    pub fn record_shown(
        &self,
        filepath: &str,
        palette: Option<PaletteRecord>,
        now: i64,
    ) -> Result<(), CoreError> {
        if self.db.get_image(filepath)?.is_none() {
            Indexer::new(self.db).index_single(Path::new(filepath), None)?;
        }

        self.db.record_image_shown(filepath, now)?;

        if let Some(image) = self.db.get_image(filepath)? {
            if let Some(source_id) = image.source_id {
                self.db.record_source_shown(&source_id, now)?;
            }
        }

        match palette {
            Some(palette) => self.db.upsert_palette(&palette)?,
            None => {
                if let Some(extractor) = self.extractor {
                    match extractor.extract(filepath) {
                        Ok(palette) => self.db.upsert_palette(&palette)?,
                        Err(e) => {
                            tracing::warn!(filepath, error = %e, "synchronous palette extraction failed");
                        }
                    }
                }
            }
        }

        if let Some(stats) = self.stats {
            stats.invalidate();
        }

        Ok(())
    }
}

fn metrics_of(palette: &PaletteRecord) -> PaletteMetrics {
    PaletteMetrics {
        avg_hue: palette.avg_hue,
        avg_saturation: palette.avg_saturation,
        avg_lightness: palette.avg_lightness,
        color_temperature: palette.color_temperature,
    }
}

fn metric_similarity(palette: &PaletteRecord, target: &Option<PaletteTarget>) -> f64 {
    let Some(target) = target else { return 1.0 };
    color::similarity_to_target(
        &metrics_of(palette),
        target.lightness,
        target.temperature,
        target.saturation,
    )
}

/// Continuity mode targets the currently-shown image's own palette;
/// otherwise the caller-supplied target palette is used as-is.
fn resolve_target(
    constraints: &SelectionConstraints,
    palettes: &std::collections::HashMap<String, PaletteRecord>,
    candidates: &[ImageRecord],
) -> Option<PaletteTarget> {
    if constraints.continuity {
        let most_recent = candidates
            .iter()
            .filter(|i| i.last_shown_at.is_some())
            .max_by_key(|i| i.last_shown_at.unwrap());
        if let Some(image) = most_recent {
            if let Some(palette) = palettes.get(&image.filepath) {
                return Some(PaletteTarget {
                    lightness: Some(palette.avg_lightness),
                    temperature: Some(palette.color_temperature),
                    saturation: Some(palette.avg_saturation),
                    tolerance: constraints.target_palette.and_then(|t| t.tolerance),
                });
            }
        }
    }
    constraints.target_palette
}

/// Weighted sampling without replacement via a cumulative-weight array and
/// binary search (`partition_point`), O(n log n) for n draws.
fn sample_without_replacement(weights: &[f64], count: usize) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..weights.len()).collect();
    let mut remaining_weights: Vec<f64> = weights.to_vec();
    let mut chosen = Vec::with_capacity(count);

    for _ in 0..count {
        if remaining.is_empty() {
            break;
        }
        let total: f64 = remaining_weights.iter().sum();
        if total <= 0.0 {
            let idx = fastrand::usize(..remaining.len());
            chosen.push(remaining.remove(idx));
            remaining_weights.remove(idx);
            continue;
        }

        let mut cumulative = Vec::with_capacity(remaining_weights.len());
        let mut running = 0.0;
        for w in &remaining_weights {
            running += w;
            cumulative.push(running);
        }

        let target = fastrand::f64() * total;
        let pos = cumulative.partition_point(|&c| c < target);
        let pos = pos.min(remaining.len() - 1);

        chosen.push(remaining.remove(pos));
        remaining_weights.remove(pos);
    }

    chosen
}
