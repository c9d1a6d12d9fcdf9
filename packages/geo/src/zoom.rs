//! Radius-derived query parameters.
//!
//! A query radius is an angle in radians, where `π/2` spans a quarter of
//! the Earth's circumference. Every other level-of-detail value is a
//! function of that angle.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::distance::EARTH_RADIUS_METERS;

/// Radius used when a query omits one or supplies something unusable.
pub const DEFAULT_RADIUS: f64 = FRAC_PI_2;

/// Simplification tolerance per radian of query radius.
const TOLERANCE_PER_RADIAN: f64 = 0.18;

/// Parses a raw radius, falling back to [`DEFAULT_RADIUS`] when it is
/// absent, unparseable, non-finite, or not positive.
#[must_use]
pub fn resolve_radius(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(DEFAULT_RADIUS)
}

/// Maps a radius to a discrete zoom tier.
///
/// The tier is `max(1, floor(log2(2π / r)))`: a half-turn radius is tier 1
/// and every halving of the radius adds one tier.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn zoom_for_radius(radius: f64) -> u32 {
    let tier = (2.0 * PI / radius).log2().floor();

    if tier.is_nan() || tier < 1.0 {
        1
    } else if tier >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        tier as u32
    }
}

/// Converts an angular radius into meters along the Earth's surface.
#[must_use]
pub fn search_radius_meters(radius: f64) -> f64 {
    EARTH_RADIUS_METERS * radius
}

/// Simplification tolerance for geometries returned at this radius.
#[must_use]
pub fn simplification_tolerance(radius: f64) -> f64 {
    TOLERANCE_PER_RADIAN * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_turn_is_tier_one() {
        assert_eq!(zoom_for_radius(PI), 1);
    }

    #[test]
    fn quarter_pi_is_tier_three() {
        assert_eq!(zoom_for_radius(PI / 4.0), 3);
        assert_eq!(zoom_for_radius(FRAC_PI_2), 2);
    }

    #[test]
    fn huge_radius_clamps_to_one() {
        assert_eq!(zoom_for_radius(100.0), 1);
        assert_eq!(zoom_for_radius(f64::INFINITY), 1);
    }

    #[test]
    fn tier_is_non_increasing_in_radius() {
        let mut previous = u32::MAX;
        let mut radius = 1e-6;
        while radius < 10.0 {
            let tier = zoom_for_radius(radius);
            assert!(tier <= previous, "tier rose to {tier} at radius {radius}");
            previous = tier;
            radius *= 1.37;
        }
    }

    #[test]
    fn missing_or_bad_radius_defaults() {
        assert!((resolve_radius(None) - FRAC_PI_2).abs() < f64::EPSILON);
        assert!((resolve_radius(Some("abc")) - FRAC_PI_2).abs() < f64::EPSILON);
        assert!((resolve_radius(Some("NaN")) - FRAC_PI_2).abs() < f64::EPSILON);
        assert!((resolve_radius(Some("-1")) - FRAC_PI_2).abs() < f64::EPSILON);
        assert!((resolve_radius(Some("0.25")) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn tolerance_scales_with_radius() {
        assert!((simplification_tolerance(0.1) - 0.018).abs() < 1e-12);
    }

    #[test]
    fn quarter_turn_is_ten_thousand_km() {
        assert!((search_radius_meters(FRAC_PI_2) - 10_000_000.0).abs() < 1e-6);
        assert!((search_radius_meters(PI) - 20_000_000.0).abs() < 1e-6);
    }
}
