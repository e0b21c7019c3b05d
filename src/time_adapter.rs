//! Time-of-day palette target adaptation (spec.md §4.6).

use chrono::{DateTime, Datelike, Local, NaiveTime, Timelike};

use crate::config::TimeAdaptationConfig;
use crate::model::{PalettePreset, PaletteTarget, TimeAdaptationMethod};

/// Which half of the day/night cycle it currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Night,
}

/// Abstracts over reading the host desktop's light/dark preference so the
/// time adapter doesn't hard-code a single desktop environment.
pub trait SystemThemeProvider {
    /// Returns `true` if the desktop is currently in dark mode.
    fn is_dark_mode(&self) -> Option<bool>;
}

/// Reads GNOME/freedesktop's `color-scheme` setting via `gsettings`,
/// falling back to the `SMARTSEL_DARK_MODE` environment variable when the
/// binary isn't available (headless/CI environments, spec.md §4.6).
pub struct FreedesktopThemeProvider;

impl SystemThemeProvider for FreedesktopThemeProvider {
    fn is_dark_mode(&self) -> Option<bool> {
        if let Ok(output) = std::process::Command::new("gsettings")
            .args(["get", "org.gnome.desktop.interface", "color-scheme"])
            .output()
        {
            if output.status.success() {
                let text = String::from_utf8_lossy(&output.stdout);
                return Some(text.contains("dark"));
            }
        }

        std::env::var("SMARTSEL_DARK_MODE")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }
}

pub struct TimeAdapter<'a> {
    config: &'a TimeAdaptationConfig,
    theme_provider: Box<dyn SystemThemeProvider>,
}

impl<'a> TimeAdapter<'a> {
    pub fn new(config: &'a TimeAdaptationConfig) -> Self {
        Self {
            config,
            theme_provider: Box::new(FreedesktopThemeProvider),
        }
    }

    pub fn with_theme_provider(mut self, provider: Box<dyn SystemThemeProvider>) -> Self {
        self.theme_provider = provider;
        self
    }

    /// Period at `now`, per the configured method.
    pub fn current_period(&self, now: DateTime<Local>) -> Period {
        match self.config.method {
            TimeAdaptationMethod::Fixed => self.fixed_period(now),
            TimeAdaptationMethod::SunriseSunset => self.sunrise_sunset_period(now),
            TimeAdaptationMethod::SystemTheme => match self.theme_provider.is_dark_mode() {
                Some(true) => Period::Night,
                Some(false) => Period::Day,
                None => self.fixed_period(now),
            },
        }
    }

    /// The palette target for the current period: the configured preset,
    /// with `config.tolerance` carried through as the hard-filter bound.
    pub fn palette_target(&self, now: DateTime<Local>) -> PaletteTarget {
        let period = self.current_period(now);
        let preset_name = match period {
            Period::Day => &self.config.day_preset,
            Period::Night => &self.config.night_preset,
        };
        let mut target = PalettePreset::by_name(preset_name)
            .map(PalettePreset::target)
            .unwrap_or_default();
        target.tolerance = self.config.tolerance;
        target
    }

    fn fixed_period(&self, now: DateTime<Local>) -> Period {
        let day_start = self
            .config
            .day_start
            .as_deref()
            .and_then(parse_time)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        let night_start = self
            .config
            .night_start
            .as_deref()
            .and_then(parse_time)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(19, 0, 0).unwrap());
        let current = now.time();

        if day_start <= night_start {
            if current >= day_start && current < night_start {
                Period::Day
            } else {
                Period::Night
            }
        } else {
            // Day window wraps past midnight.
            if current >= day_start || current < night_start {
                Period::Day
            } else {
                Period::Night
            }
        }
    }

    fn sunrise_sunset_period(&self, now: DateTime<Local>) -> Period {
        let (Some(lat), Some(lon)) = (self.config.latitude, self.config.longitude) else {
            return self.fixed_period(now);
        };
        let (sunrise, sunset) = sunrise_sunset(now, lat, lon);
        let current = now.time();
        if current >= sunrise && current < sunset {
            Period::Day
        } else {
            Period::Night
        }
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// Compact NOAA solar-position approximation, returning today's local
/// sunrise and sunset times for `(latitude, longitude)` in degrees.
/// Accurate to within a few minutes, which is ample for palette switching.
fn sunrise_sunset(now: DateTime<Local>, latitude: f64, longitude: f64) -> (NaiveTime, NaiveTime) {
    let day_of_year = now.ordinal() as f64;
    let lat_rad = latitude.to_radians();

    // Fractional year, in radians.
    let gamma = 2.0 * std::f64::consts::PI / 365.0 * (day_of_year - 1.0);

    // Equation of time (minutes) and solar declination (radians), per the
    // standard NOAA approximation.
    let eqtime = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());
    let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    let zenith = 90.833f64.to_radians();
    let cos_hour_angle =
        (zenith.cos() / (lat_rad.cos() * decl.cos())) - (lat_rad.tan() * decl.tan());
    let cos_hour_angle = cos_hour_angle.clamp(-1.0, 1.0);
    let hour_angle = cos_hour_angle.acos().to_degrees();

    let utc_offset_minutes = now.offset().local_minus_utc() as f64 / 60.0;
    let solar_noon = 720.0 - 4.0 * longitude - eqtime + utc_offset_minutes;

    let sunrise_minutes = solar_noon - 4.0 * hour_angle;
    let sunset_minutes = solar_noon + 4.0 * hour_angle;

    (minutes_to_time(sunrise_minutes), minutes_to_time(sunset_minutes))
}

fn minutes_to_time(mut minutes: f64) -> NaiveTime {
    minutes = minutes.rem_euclid(1440.0);
    let hours = (minutes / 60.0).floor() as u32;
    let mins = (minutes % 60.0).floor() as u32;
    NaiveTime::from_hms_opt(hours.min(23), mins.min(59), 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config_fixed(day_start: &str, night_start: &str) -> TimeAdaptationConfig {
        TimeAdaptationConfig {
            method: TimeAdaptationMethod::Fixed,
            latitude: None,
            longitude: None,
            day_start: Some(day_start.to_string()),
            night_start: Some(night_start.to_string()),
            day_preset: "neutral_day".to_string(),
            night_preset: "dark_mode".to_string(),
            tolerance: None,
        }
    }

    #[test]
    fn fixed_schedule_picks_day_at_noon() {
        let config = config_fixed("07:00", "19:00");
        let adapter = TimeAdapter::new(&config);
        let noon = Local.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(adapter.current_period(noon), Period::Day);
    }

    #[test]
    fn fixed_schedule_picks_night_at_midnight() {
        let config = config_fixed("07:00", "19:00");
        let adapter = TimeAdapter::new(&config);
        let midnight = Local.with_ymd_and_hms(2026, 6, 1, 0, 30, 0).unwrap();
        assert_eq!(adapter.current_period(midnight), Period::Night);
    }

    #[test]
    fn wrapping_day_window_handles_past_midnight() {
        // Day window from 22:00 to 06:00 (overnight shift workers).
        let config = config_fixed("22:00", "06:00");
        let adapter = TimeAdapter::new(&config);
        let late_night = Local.with_ymd_and_hms(2026, 6, 1, 23, 0, 0).unwrap();
        assert_eq!(adapter.current_period(late_night), Period::Day);
    }

    #[test]
    fn palette_target_matches_configured_preset() {
        let config = config_fixed("07:00", "19:00");
        let adapter = TimeAdapter::new(&config);
        let noon = Local.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let target = adapter.palette_target(noon);
        assert_eq!(target, PalettePreset::NeutralDay.target());
    }

    struct FixedProvider(bool);
    impl SystemThemeProvider for FixedProvider {
        fn is_dark_mode(&self) -> Option<bool> {
            Some(self.0)
        }
    }

    #[test]
    fn system_theme_method_uses_provider() {
        let mut config = config_fixed("07:00", "19:00");
        config.method = TimeAdaptationMethod::SystemTheme;
        let adapter = TimeAdapter::new(&config).with_theme_provider(Box::new(FixedProvider(true)));
        let noon = Local.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(adapter.current_period(noon), Period::Night);
    }

    #[test]
    fn sunrise_sunset_produces_plausible_day_window() {
        // Near the equator, day should span roughly 06:00-18:00 year-round.
        let (sunrise, sunset) = sunrise_sunset(
            Local.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap(),
            0.0,
            0.0,
        );
        assert!(sunrise.hour() >= 4 && sunrise.hour() <= 8, "{sunrise}");
        assert!(sunset.hour() >= 16 && sunset.hour() <= 20, "{sunset}");
    }
}
