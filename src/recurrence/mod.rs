pub mod dates;
pub mod reconciler;

use serde::{Deserialize, Serialize};

pub use dates::{next_occurrences, occurrences_in_range};
pub use reconciler::{reconcile, OCCURRENCE_HORIZON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OneTime,
    Weekly,
    BiWeekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Weekly => "weekly",
            Self::BiWeekly => "bi_weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_time" => Some(Self::OneTime),
            "weekly" => Some(Self::Weekly),
            "bi_weekly" => Some(Self::BiWeekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn is_recurring(self) -> bool {
        !matches!(self, Self::OneTime)
    }

    /// Fixed step in days for the day-stepped frequencies; monthly steps by
    /// calendar month instead.
    pub fn step_days(self) -> Option<i64> {
        match self {
            Self::Weekly => Some(7),
            Self::BiWeekly => Some(14),
            _ => None,
        }
    }
}
