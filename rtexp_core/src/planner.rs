//! Exposure planning: ties decay, chart lookup and timing together.
//!
//! For every shot:
//! 1. Resolve the source and decay it to the exposure instant
//! 2. Look up K and alpha for (isotope, technique, film, material, thickness)
//! 3. No chart row → `NoChartMatch`, nothing is computed
//! 4. Otherwise compute total, per-film and per-film-with-overhead seconds

use crate::exposure::{exposure_seconds, round_seconds};
use crate::repository::Repository;
use crate::{
    Casting, CastingStatus, ChartKey, Error, ExposureOutcome, ExposurePlan, ExposureRecord,
    ExposureRequest, ExposureTiming, Result, DEFAULT_MATERIAL, DEFAULT_MOVEMENT_TIME_S,
    DEFAULT_SETTING_TIME_S,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of recording an exposure line
#[derive(Clone, Debug, PartialEq)]
pub enum RecordOutcome {
    Recorded {
        plan: ExposurePlan,
        record: ExposureRecord,
    },
    NoChartMatch { key: ChartKey },
}

impl ExposureRequest {
    /// A request with the default material and overhead times
    pub fn new(
        source_id: Uuid,
        at: DateTime<Utc>,
        technique: impl Into<String>,
        film_speed: impl Into<String>,
        thickness_mm: f64,
        sfd_mm: f64,
        total_film: u32,
    ) -> Self {
        Self {
            source_id,
            at,
            technique: technique.into(),
            film_speed: film_speed.into(),
            material: DEFAULT_MATERIAL.to_string(),
            thickness_mm,
            sfd_mm,
            total_film,
            setting_time_s: DEFAULT_SETTING_TIME_S,
            movement_time_s: DEFAULT_MOVEMENT_TIME_S,
        }
    }

    /// Reject inputs that cannot describe a real shot
    pub fn validate(&self) -> Result<()> {
        if !self.thickness_mm.is_finite() || self.thickness_mm <= 0.0 {
            return Err(Error::Validation(format!(
                "Thickness must be positive, got {} mm",
                self.thickness_mm
            )));
        }
        if !self.sfd_mm.is_finite() || self.sfd_mm <= 0.0 {
            return Err(Error::Validation(format!(
                "SFD must be positive, got {} mm",
                self.sfd_mm
            )));
        }
        if !self.setting_time_s.is_finite() || self.setting_time_s < 0.0 {
            return Err(Error::Validation(format!(
                "Setting time cannot be negative, got {} s",
                self.setting_time_s
            )));
        }
        if !self.movement_time_s.is_finite() || self.movement_time_s < 0.0 {
            return Err(Error::Validation(format!(
                "Movement time cannot be negative, got {} s",
                self.movement_time_s
            )));
        }
        if self.technique.trim().is_empty() || self.film_speed.trim().is_empty() {
            return Err(Error::Validation(
                "Technique and film speed are required".into(),
            ));
        }
        Ok(())
    }
}

/// Compute the exposure for a request without persisting anything
pub fn plan_exposure<R: Repository + ?Sized>(
    repo: &R,
    request: &ExposureRequest,
) -> Result<ExposureOutcome> {
    request.validate()?;

    let source = repo
        .source(request.source_id)?
        .ok_or(Error::SourceNotFound(request.source_id))?;
    let effective_activity = source.activity_at(request.at)?;

    let key = ChartKey {
        isotope: source.isotope,
        technique: request.technique.clone(),
        film_speed: request.film_speed.clone(),
        material: request.material.clone(),
        thickness_mm: request.thickness_mm,
    };

    let Some(entry) = repo.chart_entry(&key)? else {
        tracing::warn!("No exposure chart row for {}", key);
        return Ok(ExposureOutcome::NoChartMatch { key });
    };

    let total_seconds = exposure_seconds(
        entry.base_constant,
        entry.alpha,
        request.thickness_mm,
        request.sfd_mm,
        request.total_film,
        effective_activity,
    );
    let timing = ExposureTiming::derive(
        effective_activity,
        total_seconds,
        request.total_film,
        request.setting_time_s,
        request.movement_time_s,
    );

    tracing::info!(
        "Planned {} exposure: A_eff {:.1} MBq, total {:.3} s, per film {:.3} s (+overhead {:.3} s)",
        source.isotope,
        timing.effective_activity_mbq,
        timing.total_seconds,
        timing.each_seconds,
        timing.each_with_overhead_seconds
    );

    Ok(ExposureOutcome::Computed(ExposurePlan {
        request: request.clone(),
        isotope: source.isotope,
        chart_entry: entry,
        timing,
    }))
}

impl ExposurePlan {
    /// The persisted form of this plan, seconds rounded
    pub fn to_record(&self, casting_id: Uuid) -> ExposureRecord {
        let request = &self.request;
        ExposureRecord {
            id: Uuid::new_v4(),
            casting_id,
            source_id: request.source_id,
            isotope: self.isotope,
            recorded_at: request.at,
            technique: request.technique.clone(),
            film_speed: request.film_speed.clone(),
            material: request.material.clone(),
            thickness_mm: request.thickness_mm,
            sfd_mm: request.sfd_mm,
            total_film: request.total_film,
            setting_time_s: request.setting_time_s,
            movement_time_s: request.movement_time_s,
            effective_activity_mbq: self.timing.effective_activity_mbq,
            total_exposure_s: round_seconds(self.timing.total_seconds),
            per_casting_s: round_seconds(self.timing.each_with_overhead_seconds),
            chart_entry_id: Some(self.chart_entry.id),
        }
    }
}

/// Plan an exposure for a casting and persist it when it could be computed
pub fn record_exposure<R: Repository + ?Sized>(
    repo: &mut R,
    casting: &Casting,
    request: &ExposureRequest,
) -> Result<RecordOutcome> {
    if casting.status == CastingStatus::Completed {
        return Err(Error::Validation(format!(
            "Casting {} is completed; reopen it before adding exposures",
            casting.id
        )));
    }

    match plan_exposure(&*repo, request)? {
        ExposureOutcome::Computed(plan) => {
            let record = plan.to_record(casting.id);
            repo.persist(&record)?;
            tracing::info!("Recorded exposure {} on casting {}", record.id, casting.id);
            Ok(RecordOutcome::Recorded { plan, record })
        }
        ExposureOutcome::NoChartMatch { key } => Ok(RecordOutcome::NoChartMatch { key }),
    }
}
