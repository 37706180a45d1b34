use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};

use super::ValidationErrors;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Window in which a withdrawal may be scheduled, evaluated in the
/// service's configured time zone.
#[derive(Debug, Clone, Copy)]
pub struct SchedulePolicy {
    pub offset: FixedOffset,
    pub max_ahead: Duration,
}

impl SchedulePolicy {
    pub fn new(offset: FixedOffset, max_days: i64) -> Self {
        Self {
            offset,
            max_ahead: Duration::days(max_days),
        }
    }

    /// `scheduled_for` must be strictly after `now` and no later than
    /// `now + max_ahead`.
    pub fn check(&self, scheduled_for: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let now = now.with_timezone(&self.offset);
        let at = scheduled_for.with_timezone(&self.offset);

        if at <= now {
            return Err(ValidationErrors::single("Scheduled date must be in the future"));
        }
        if at > now + self.max_ahead {
            return Err(ValidationErrors::single(format!(
                "Cannot schedule more than {} days in advance",
                self.max_ahead.num_days()
            )));
        }
        Ok(())
    }
}

/// Parses a client-supplied schedule. Timestamps carrying an offset are
/// taken as-is; bare local times are read in `offset`. Unparseable input is
/// a validation error, never silently treated as "immediate".
pub fn parse_schedule(raw: &str, offset: FixedOffset) -> Result<DateTime<Utc>, ValidationErrors> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ValidationErrors::single(format!("Invalid schedule date '{raw}'")))
}
