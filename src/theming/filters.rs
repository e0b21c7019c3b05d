//! Filter pipeline applied to template variable references (spec.md §4.7).

use crate::color;

/// A single named filter with its optional numeric/color argument, as
/// parsed from `filter(arg)` syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Strip,
    Darken(f64),
    Lighten(f64),
    Saturate(f64),
    Desaturate(f64),
    Blend(String),
}

impl Filter {
    pub fn parse(name: &str, arg: Option<&str>) -> Option<Self> {
        match name {
            "strip" => Some(Self::Strip),
            "darken" => arg.and_then(|a| a.parse().ok()).map(Self::Darken),
            "lighten" => arg.and_then(|a| a.parse().ok()).map(Self::Lighten),
            "saturate" => arg.and_then(|a| a.parse().ok()).map(Self::Saturate),
            "desaturate" => arg.and_then(|a| a.parse().ok()).map(Self::Desaturate),
            "blend" => arg.map(|a| Self::Blend(a.to_string())),
            _ => None,
        }
    }
}

/// Applies `filters` left to right to `hex_color`, resolving `blend`
/// arguments through `lookup` (another palette identifier).
pub fn apply(hex_color: &str, filters: &[Filter], lookup: &dyn Fn(&str) -> String) -> String {
    let mut current_hex = hex_color.to_string();
    let mut stripped = false;

    for filter in filters {
        match filter {
            Filter::Strip => stripped = true,
            Filter::Darken(amount) => current_hex = adjust_lightness(&current_hex, -amount),
            Filter::Lighten(amount) => current_hex = adjust_lightness(&current_hex, *amount),
            Filter::Saturate(amount) => current_hex = adjust_saturation(&current_hex, *amount),
            Filter::Desaturate(amount) => current_hex = adjust_saturation(&current_hex, -amount),
            Filter::Blend(other_name) => {
                let other_hex = lookup(other_name);
                current_hex = blend(&current_hex, &other_hex);
            }
        }
    }

    if stripped {
        current_hex.trim_start_matches('#').to_string()
    } else {
        current_hex
    }
}

fn adjust_lightness(hex: &str, delta: f64) -> String {
    let Some((h, s, l)) = color::hex_to_hsl(hex) else {
        return hex.to_string();
    };
    color::hsl_to_hex(h, s, (l + delta).clamp(0.0, 1.0))
}

fn adjust_saturation(hex: &str, delta: f64) -> String {
    let Some((h, s, l)) = color::hex_to_hsl(hex) else {
        return hex.to_string();
    };
    color::hsl_to_hex(h, (s + delta).clamp(0.0, 1.0), l)
}

fn blend(hex_a: &str, hex_b: &str) -> String {
    let (Some(rgb_a), Some(rgb_b)) = (color::hex_to_rgb(hex_a), color::hex_to_rgb(hex_b)) else {
        return hex_a.to_string();
    };
    let r = ((rgb_a.red as u16 + rgb_b.red as u16) / 2) as u8;
    let g = ((rgb_a.green as u16 + rgb_b.green as u16) / 2) as u8;
    let b = ((rgb_a.blue as u16 + rgb_b.blue as u16) / 2) as u8;
    color::rgb_to_hex(palette::Srgb::new(r, g, b))
}
