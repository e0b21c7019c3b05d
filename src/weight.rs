//! Pure weight computation for a single candidate image (spec.md §4.3).

use crate::color::{self, PaletteMetrics};
use crate::config::SelectionConfig;
use crate::model::{PaletteTarget, RecencyDecay};

/// Floor applied to the final weight so no eligible image reaches zero
/// probability (spec.md §4.3).
pub const MIN_WEIGHT: f64 = 1e-6;

/// Everything `weight()` needs about one candidate image, gathered by the
/// selector from the database ahead of time.
#[derive(Debug, Clone, Copy)]
pub struct CandidateInputs<'a> {
    pub now: i64,
    pub last_shown_at: Option<i64>,
    pub source_last_shown_at: Option<i64>,
    pub is_favorite: bool,
    pub times_shown: u32,
    pub palette_metrics: Option<&'a PaletteMetrics>,
}

/// Multiplicative weight: `recency * source_recency * favorite * newness * color_affinity`.
pub fn weight(
    inputs: &CandidateInputs,
    config: &SelectionConfig,
    target: Option<&PaletteTarget>,
) -> f64 {
    let recency = recency_factor(
        inputs.last_shown_at,
        inputs.now,
        config.image_cooldown_days,
        config.recency_decay,
    );
    let source_recency = recency_factor(
        inputs.source_last_shown_at,
        inputs.now,
        config.source_cooldown_days,
        config.recency_decay,
    );
    let favorite = if inputs.is_favorite {
        config.favorite_boost
    } else {
        1.0
    };
    let newness = newness_factor(inputs.times_shown, config.new_image_boost);
    let color_affinity = color_affinity_factor(
        inputs.palette_metrics,
        target,
        config.color_match_weight,
    );

    (recency * source_recency * favorite * newness * color_affinity).max(MIN_WEIGHT)
}

/// `1.0` when never shown; otherwise decays from `0` (just shown) toward
/// `1.0` as elapsed time passes `cooldown_days`, per the configured curve.
fn recency_factor(last_shown_at: Option<i64>, now: i64, cooldown_days: f64, decay: RecencyDecay) -> f64 {
    let Some(last) = last_shown_at else {
        return 1.0;
    };
    if cooldown_days <= 0.0 {
        return 1.0;
    }
    let elapsed_days = ((now - last).max(0) as f64) / 86_400.0;
    let ratio = (elapsed_days / cooldown_days).min(1.0);

    match decay {
        // Sigmoid centered on the cooldown's midpoint: ratio 0 -> ~0,
        // ratio 0.5 -> 0.5, ratio 1 -> ~1 (spec.md §4.3).
        RecencyDecay::Exponential => 1.0 / (1.0 + (-12.0 * (ratio - 0.5)).exp()),
        RecencyDecay::Linear => ratio,
        RecencyDecay::Step => {
            if ratio >= 1.0 {
                1.0
            } else {
                0.0
            }
        }
    }
    .clamp(0.0, 1.0)
}

/// `new_image_boost` if the image has never been shown, else `1.0`
/// (spec.md §4.3).
fn newness_factor(times_shown: u32, new_image_boost: f64) -> f64 {
    if times_shown == 0 {
        new_image_boost
    } else {
        1.0
    }
}

/// `1.0` when there's no target to match against. Without a palette,
/// applies the flat penalty from spec.md §4.3/§7 rather than excluding the
/// image outright.
fn color_affinity_factor(
    metrics: Option<&PaletteMetrics>,
    target: Option<&PaletteTarget>,
    color_match_weight: f64,
) -> f64 {
    let Some(target) = target else {
        return 1.0;
    };
    if target.lightness.is_none() && target.temperature.is_none() && target.saturation.is_none() {
        return 1.0;
    }

    let Some(metrics) = metrics else {
        return 0.8;
    };

    let similarity = color::similarity_to_target(
        metrics,
        target.lightness,
        target.temperature,
        target.saturation,
    );
    let w = color_match_weight.clamp(0.0, 1.0);
    let factor = if similarity >= 0.5 {
        1.0 + (similarity - 0.5) * 2.0 * w
    } else {
        0.1 + (similarity / 0.5) * 0.9
    };
    factor.clamp(0.1, 2.0)
}
