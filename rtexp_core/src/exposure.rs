//! Exposure time model.
//!
//! Empirical inverse-square, thickness power law:
//!
//! ```text
//! t[s] = K * max(thickness, 0.001)^alpha * (SFD[m])^2 * max(films, 1) / A_eff[MBq]
//! ```
//!
//! K and alpha come from the exposure chart row that matched the shot.

use crate::ExposureTiming;

/// Smallest thickness fed to the power law, in mm
pub const MIN_THICKNESS_MM: f64 = 0.001;

/// Total exposure time in seconds for a batch of `total_film` films
///
/// Returns 0 when `effective_activity` is not positive: a spent source has
/// no finite exposure time.
pub fn exposure_seconds(
    base_constant: f64,
    alpha: f64,
    thickness_mm: f64,
    sfd_mm: f64,
    total_film: u32,
    effective_activity: f64,
) -> f64 {
    // also catches NaN
    if !(effective_activity > 0.0) {
        return 0.0;
    }

    let alpha = if alpha.is_nan() { 0.0 } else { alpha };
    let thickness_term = thickness_mm.max(MIN_THICKNESS_MM).powf(alpha);
    let distance_m = sfd_mm / 1000.0;
    let distance_term = distance_m * distance_m;

    base_constant * thickness_term * distance_term * film_count(total_film) / effective_activity
}

fn film_count(total_film: u32) -> f64 {
    f64::from(total_film.max(1))
}

impl ExposureTiming {
    /// Derive per-film figures from a batch total
    pub fn derive(
        effective_activity_mbq: f64,
        total_seconds: f64,
        total_film: u32,
        setting_time_s: f64,
        movement_time_s: f64,
    ) -> Self {
        let each_seconds = total_seconds / film_count(total_film);
        Self {
            effective_activity_mbq,
            total_seconds,
            each_seconds,
            each_with_overhead_seconds: each_seconds + setting_time_s + movement_time_s,
        }
    }
}

/// Round to whole seconds for storage
///
/// Half rounds away from zero. Negative and non-finite values store as 0.
pub fn round_seconds(seconds: f64) -> i64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    seconds.round() as i64
}
