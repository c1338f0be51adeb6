//! Filtering and totals over recorded exposure lines.

use crate::{Casting, CastingStatus, ExposureRecord, Isotope, Registry};
use chrono::NaiveDate;
use uuid::Uuid;

/// Criteria for selecting exposure lines; unset fields match everything
#[derive(Clone, Debug, Default)]
pub struct ReportFilter {
    /// Case-insensitive substring of the customer name
    pub customer: Option<String>,
    pub casting_id: Option<Uuid>,
    pub isotope: Option<Isotope>,
    /// Inclusive lower bound on the exposure date (UTC)
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the exposure date (UTC)
    pub to: Option<NaiveDate>,
    pub status: Option<CastingStatus>,
}

/// A recorded line joined with its casting
#[derive(Clone, Debug)]
pub struct ReportRow<'a> {
    pub record: &'a ExposureRecord,
    pub casting: Option<&'a Casting>,
}

/// Totals over a set of lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub lines: usize,
    pub total_films: u64,
    pub total_exposure_s: i64,
    pub total_per_casting_s: i64,
}

impl ReportFilter {
    fn matches(&self, record: &ExposureRecord, casting: Option<&Casting>) -> bool {
        if let Some(id) = self.casting_id {
            if record.casting_id != id {
                return false;
            }
        }
        if let Some(isotope) = self.isotope {
            if record.isotope != isotope {
                return false;
            }
        }

        let day = record.recorded_at.date_naive();
        if self.from.is_some_and(|from| day < from) || self.to.is_some_and(|to| day > to) {
            return false;
        }

        if let Some(ref customer) = self.customer {
            let needle = customer.to_lowercase();
            match casting {
                Some(c) if c.customer.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if let Some(status) = self.status {
            match casting {
                Some(c) if c.status == status => {}
                _ => return false,
            }
        }

        true
    }

    /// Select matching lines, oldest first
    pub fn apply<'a>(
        &self,
        records: &'a [ExposureRecord],
        registry: &'a Registry,
    ) -> Vec<ReportRow<'a>> {
        let mut rows: Vec<ReportRow<'a>> = records
            .iter()
            .map(|record| ReportRow {
                record,
                casting: registry.castings.get(&record.casting_id),
            })
            .filter(|row| self.matches(row.record, row.casting))
            .collect();

        rows.sort_by(|a, b| {
            a.record
                .recorded_at
                .cmp(&b.record.recorded_at)
                .then(a.record.id.cmp(&b.record.id))
        });
        rows
    }
}

/// Sum the stored, already rounded seconds of `rows`
pub fn summarize(rows: &[ReportRow<'_>]) -> ReportSummary {
    rows.iter().fold(ReportSummary::default(), |mut acc, row| {
        acc.lines += 1;
        acc.total_films += u64::from(row.record.total_film);
        acc.total_exposure_s += row.record.total_exposure_s;
        acc.total_per_casting_s += row.record.per_casting_s;
        acc
    })
}

/// Human readable duration: `1h 2m 3s`, `2m 3s` or `3s`
pub fn format_seconds(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}
