//! Occurrence date arithmetic for recurring bookings.
//!
//! All arithmetic is done in UTC; weekly and bi-weekly series step in whole
//! UTC days, monthly series step by calendar month. Month-end policy: each
//! tick is `anchor + n months` computed from the anchor itself, so a day-31
//! anchor clamps to the last day of shorter months and returns to the 31st
//! in longer ones (chrono `Months` semantics).

use chrono::{DateTime, Duration, Months, Utc};

use crate::recurrence::Frequency;

/// Dates a recurrence rule produces inside `[range_start, range_end)`,
/// never before the anchor. Finite: bounded by the supplied range.
pub fn occurrences_in_range(
    anchor: DateTime<Utc>,
    frequency: Frequency,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> OccurrenceDates {
    let (next, months_ahead) = match frequency {
        Frequency::OneTime => (None, 0),
        Frequency::Weekly | Frequency::BiWeekly => {
            let step = Duration::days(frequency.step_days().unwrap_or(7));
            let mut candidate = if range_start <= anchor {
                anchor
            } else {
                let delta = range_start - anchor;
                let whole_steps = delta.num_seconds().div_euclid(step.num_seconds());
                anchor + step * whole_steps as i32
            };
            while candidate < range_start && candidate < range_end {
                candidate += step;
            }
            (Some(candidate), 0)
        }
        Frequency::Monthly => {
            let mut n = 0u32;
            let mut candidate = anchor;
            while candidate < range_start && candidate < range_end {
                n += 1;
                candidate = add_months(anchor, n);
            }
            (Some(candidate), n)
        }
    };

    OccurrenceDates {
        anchor,
        frequency,
        range_end,
        next,
        months_ahead,
    }
}

/// The first `count` ticks strictly after the anchor. Used to materialize
/// the fixed horizon of future occurrences.
pub fn next_occurrences(
    anchor: DateTime<Utc>,
    frequency: Frequency,
    count: usize,
) -> Vec<DateTime<Utc>> {
    match frequency {
        Frequency::OneTime => Vec::new(),
        Frequency::Weekly | Frequency::BiWeekly => {
            let step = frequency.step_days().unwrap_or(7);
            (1..=count)
                .map(|i| anchor + Duration::days(step * i as i64))
                .collect()
        }
        Frequency::Monthly => (1..=count).map(|i| add_months(anchor, i as u32)).collect(),
    }
}

fn add_months(anchor: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    // Saturates at the far end of chrono's representable range, which also
    // terminates any range-bounded loop.
    anchor
        .checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub struct OccurrenceDates {
    anchor: DateTime<Utc>,
    frequency: Frequency,
    range_end: DateTime<Utc>,
    next: Option<DateTime<Utc>>,
    months_ahead: u32,
}

impl Iterator for OccurrenceDates {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<DateTime<Utc>> {
        let current = self.next?;
        if current >= self.range_end {
            self.next = None;
            return None;
        }
        self.next = match self.frequency {
            Frequency::OneTime => None,
            Frequency::Weekly | Frequency::BiWeekly => {
                let step = Duration::days(self.frequency.step_days().unwrap_or(7));
                Some(current + step)
            }
            Frequency::Monthly => {
                self.months_ahead += 1;
                Some(add_months(self.anchor, self.months_ahead))
            }
        };
        Some(current)
    }
}
