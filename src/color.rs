//! Color utilities: hex↔HSL conversion, circular hue statistics, color
//! temperature, and palette similarity (spec.md §3, §4.3, §4.5).

use palette::{FromColor, Hsl, Srgb};

/// Parse a `#rrggbb` (or `rrggbb`) hex string into sRGB.
pub fn hex_to_rgb(hex: &str) -> Option<Srgb<u8>> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Srgb::new(r, g, b))
}

pub fn rgb_to_hex(rgb: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
}

/// Convert a hex color to HSL with components in `(0..360, 0..1, 0..1)`.
pub fn hex_to_hsl(hex: &str) -> Option<(f64, f64, f64)> {
    let rgb = hex_to_rgb(hex)?;
    let float_rgb: Srgb<f32> = rgb.into_format();
    let hsl = Hsl::from_color(float_rgb);
    let hue = hsl.hue.into_positive_degrees() as f64;
    Some((hue, hsl.saturation as f64, hsl.lightness as f64))
}

/// Convert HSL (hue in degrees, saturation/lightness in `0..1`) back to hex.
pub fn hsl_to_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let hsl = Hsl::new(
        hue as f32,
        saturation.clamp(0.0, 1.0) as f32,
        lightness.clamp(0.0, 1.0) as f32,
    );
    let rgb_f = Srgb::from_color(hsl);
    let rgb_u8: Srgb<u8> = rgb_f.into_format();
    rgb_to_hex(rgb_u8)
}

/// Circular mean of a set of hues (degrees), via the summed unit-vector
/// representation, as spec.md §3 requires for `avg_hue`.
pub fn circular_mean_hue(hues: &[f64]) -> f64 {
    if hues.is_empty() {
        return 0.0;
    }
    let (sum_sin, sum_cos) = hues.iter().fold((0.0, 0.0), |(s, c), &h| {
        let rad = h.to_radians();
        (s + rad.sin(), c + rad.cos())
    });
    let angle = sum_sin.atan2(sum_cos).to_degrees();
    normalize_hue(angle)
}

/// Normalize a hue into `[0, 360)`.
pub fn normalize_hue(hue: f64) -> f64 {
    let h = hue % 360.0;
    if h < 0.0 { h + 360.0 } else { h }
}

/// Circular distance between two hues in `[0, 180]` degrees.
pub fn hue_distance(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// Derived metrics for a sixteen-color palette.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteMetrics {
    pub avg_hue: f64,
    pub avg_saturation: f64,
    pub avg_lightness: f64,
    pub color_temperature: f64,
}

/// Derive aggregate HSL metrics and color temperature from sixteen hex
/// colors, per spec.md §4.5 step 5.
pub fn derive_metrics(colors: &[String; 16]) -> PaletteMetrics {
    let hsls: Vec<(f64, f64, f64)> = colors
        .iter()
        .filter_map(|c| hex_to_hsl(c))
        .collect();

    if hsls.is_empty() {
        return PaletteMetrics {
            avg_hue: 0.0,
            avg_saturation: 0.0,
            avg_lightness: 0.0,
            color_temperature: 0.0,
        };
    }

    let hues: Vec<f64> = hsls.iter().map(|(h, _, _)| *h).collect();
    let avg_hue = circular_mean_hue(&hues);
    let n = hsls.len() as f64;
    let avg_saturation = hsls.iter().map(|(_, s, _)| s).sum::<f64>() / n;
    let avg_lightness = hsls.iter().map(|(_, _, l)| l).sum::<f64>() / n;
    let color_temperature = temperature(&hsls);

    PaletteMetrics {
        avg_hue,
        avg_saturation,
        avg_lightness,
        color_temperature,
    }
}

/// Saturation-weighted warm/cool scale from a set of (hue, saturation, _)
/// triples. Red/orange/yellow map positive, cyan/blue/violet negative;
/// when summed saturation is below 0.1 the result is 0 (spec.md §4.5 / §3).
fn temperature(hsls: &[(f64, f64, f64)]) -> f64 {
    let total_saturation: f64 = hsls.iter().map(|(_, s, _)| s).sum();
    if total_saturation < 0.1 {
        return 0.0;
    }

    let weighted: f64 = hsls
        .iter()
        .map(|(h, s, _)| hue_temperature(*h) * s)
        .sum();

    (weighted / total_saturation).clamp(-1.0, 1.0)
}

/// Warm/cool contribution of a single hue in `[-1, 1]`.
///
/// Red (0) through yellow (60) is warm, green (60..180) transitions to
/// neutral/cool, cyan/blue/violet (180..300) is cool, and magenta/red
/// (300..360) warms back up.
fn hue_temperature(hue: f64) -> f64 {
    let h = normalize_hue(hue);
    // Piecewise-linear warm/cool curve peaking at orange (30°) and
    // trough at cyan (210°), matching spec.md's verbal description.
    let shifted = normalize_hue(h - 30.0);
    let radians = shifted.to_radians();
    -radians.cos()
}

/// Weighted similarity between two palettes' aggregate metrics, per
/// spec.md §4.3. Symmetric, `sim(a, a) == 1.0`, monotone in distance.
pub fn similarity(a: &PaletteMetrics, b: &PaletteMetrics) -> f64 {
    let hue_sub = 1.0 - hue_distance(a.avg_hue, b.avg_hue) / 180.0;
    let sat_sub = 1.0 - (a.avg_saturation - b.avg_saturation).abs();
    let light_sub = 1.0 - (a.avg_lightness - b.avg_lightness).abs();
    let temp_sub = 1.0 - (a.color_temperature - b.color_temperature).abs() / 2.0;

    let score = 0.35 * hue_sub + 0.15 * sat_sub + 0.35 * light_sub + 0.15 * temp_sub;
    score.clamp(0.0, 1.0)
}

/// Similarity against a partial target (only the metrics the caller cares
/// about are compared; absent target fields don't penalize).
pub fn similarity_to_target(
    metrics: &PaletteMetrics,
    target_lightness: Option<f64>,
    target_temperature: Option<f64>,
    target_saturation: Option<f64>,
) -> f64 {
    let mut weight_sum = 0.0;
    let mut score = 0.0;

    if let Some(l) = target_lightness {
        score += 0.35 * (1.0 - (metrics.avg_lightness - l).abs());
        weight_sum += 0.35;
    }
    if let Some(t) = target_temperature {
        score += 0.15 * (1.0 - (metrics.color_temperature - t).abs() / 2.0);
        weight_sum += 0.15;
    }
    if let Some(s) = target_saturation {
        score += 0.15 * (1.0 - (metrics.avg_saturation - s).abs());
        weight_sum += 0.15;
    }

    if weight_sum == 0.0 {
        1.0
    } else {
        (score / weight_sum).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hex_roundtrip_within_one_rgb_unit() {
        for hex in ["#ff0000", "#00ff00", "#123456", "#abcdef", "#000000", "#ffffff"] {
            let (h, s, l) = hex_to_hsl(hex).unwrap();
            let back = hsl_to_hex(h, s, l);
            let orig = hex_to_rgb(hex).unwrap();
            let round = hex_to_rgb(&back).unwrap();
            assert!((orig.red as i32 - round.red as i32).abs() <= 1, "{hex} -> {back}");
            assert!((orig.green as i32 - round.green as i32).abs() <= 1, "{hex} -> {back}");
            assert!((orig.blue as i32 - round.blue as i32).abs() <= 1, "{hex} -> {back}");
        }
    }

    #[test]
    fn circular_mean_wraps_correctly() {
        // 350 and 10 degrees average to 0, not 180.
        let mean = circular_mean_hue(&[350.0, 10.0]);
        assert!(mean < 1.0 || mean > 359.0, "mean was {mean}");
    }

    #[test]
    fn circular_mean_empty_is_zero() {
        assert_eq!(circular_mean_hue(&[]), 0.0);
    }

    #[test]
    fn hue_distance_is_bounded() {
        assert_abs_diff_eq!(hue_distance(10.0, 350.0), 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hue_distance(0.0, 180.0), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn low_saturation_palette_has_zero_temperature() {
        let gray = "#808080".to_string();
        let colors: [String; 16] = std::array::from_fn(|_| gray.clone());
        let metrics = derive_metrics(&colors);
        assert_eq!(metrics.color_temperature, 0.0);
    }

    #[test]
    fn warm_palette_has_positive_temperature() {
        let red = "#ff2200".to_string();
        let colors: [String; 16] = std::array::from_fn(|_| red.clone());
        let metrics = derive_metrics(&colors);
        assert!(metrics.color_temperature > 0.0, "{}", metrics.color_temperature);
    }

    #[test]
    fn cool_palette_has_negative_temperature() {
        let cyan = "#00aadd".to_string();
        let colors: [String; 16] = std::array::from_fn(|_| cyan.clone());
        let metrics = derive_metrics(&colors);
        assert!(metrics.color_temperature < 0.0, "{}", metrics.color_temperature);
    }

    #[test]
    fn avg_hue_in_range() {
        let colors: [String; 16] = std::array::from_fn(|i| format!("#{:02x}{:02x}{:02x}", i * 16, 255 - i * 10, 128));
        let metrics = derive_metrics(&colors);
        assert!((0.0..360.0).contains(&metrics.avg_hue));
        assert!((0.0..=1.0).contains(&metrics.avg_saturation));
        assert!((0.0..=1.0).contains(&metrics.avg_lightness));
        assert!((-1.0..=1.0).contains(&metrics.color_temperature));
    }

    #[test]
    fn similarity_is_symmetric_and_reflexive() {
        let a = PaletteMetrics {
            avg_hue: 30.0,
            avg_saturation: 0.5,
            avg_lightness: 0.4,
            color_temperature: 0.3,
        };
        let b = PaletteMetrics {
            avg_hue: 200.0,
            avg_saturation: 0.2,
            avg_lightness: 0.7,
            color_temperature: -0.4,
        };
        assert_abs_diff_eq!(similarity(&a, &a), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(similarity(&a, &b), similarity(&b, &a), epsilon = 1e-9);
    }

    #[test]
    fn similarity_decreases_with_distance() {
        let base = PaletteMetrics {
            avg_hue: 0.0,
            avg_saturation: 0.5,
            avg_lightness: 0.5,
            color_temperature: 0.0,
        };
        let near = PaletteMetrics {
            avg_hue: 10.0,
            ..base
        };
        let far = PaletteMetrics {
            avg_hue: 170.0,
            ..base
        };
        assert!(similarity(&base, &near) > similarity(&base, &far));
    }
}
