//! Radioactive decay of sealed sources.
//!
//! `A = A0 * 0.5^(dt / T_half)`, with `dt` the signed, fractional number of
//! days between the calibration instant and the instant of interest.

use crate::{Error, Isotope, Result};
use chrono::{DateTime, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Physical half-life of an isotope, in days
pub fn half_life_days(isotope: Isotope) -> f64 {
    match isotope {
        Isotope::Ir192 => 73.83,
        Isotope::Co60 => 5.271 * 365.25,
    }
}

/// Signed, fractional days from `from` to `to`
pub fn elapsed_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Activity of a source at `at`, given its activity `a0` at `ref_date`
///
/// `at` may precede `ref_date`, in which case the result is larger than
/// `a0`. A zero `a0` gives zero; a negative or non-finite `a0` is rejected.
pub fn decayed_activity(
    a0: f64,
    ref_date: DateTime<Utc>,
    at: DateTime<Utc>,
    isotope: Isotope,
) -> Result<f64> {
    if !a0.is_finite() || a0 < 0.0 {
        return Err(Error::InvalidActivity(a0));
    }

    let half_lives = elapsed_days(ref_date, at) / half_life_days(isotope);
    let activity = a0 * (-half_lives).exp2();

    tracing::trace!(
        %isotope,
        a0,
        half_lives,
        activity,
        "Computed decayed activity"
    );

    Ok(activity)
}

/// Same as [`decayed_activity`] for an isotope given by its tag
pub fn decayed_activity_for_tag(
    a0: f64,
    ref_date: DateTime<Utc>,
    at: DateTime<Utc>,
    isotope: &str,
) -> Result<f64> {
    let isotope: Isotope = isotope.parse()?;
    decayed_activity(a0, ref_date, at, isotope)
}
