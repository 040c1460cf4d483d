use super::{ClockEvent, ClockType};
use chrono::{DateTime, Duration, Utc};

/// Worked time for one day, derived from its clock events.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DailySummary {
    /// Closed IN/OUT pairs only; an open shift is not counted.
    pub total_worked: Duration,
    /// Site of the latest event.
    pub site_name: Option<String>,
    /// Start of the open shift when the latest event is an IN.
    pub open_since: Option<DateTime<Utc>>,
}

impl DailySummary {
    /// Build the summary from events ordered oldest first.
    #[must_use]
    pub fn from_events(events: &[ClockEvent]) -> Self {
        let Some(last) = events.last() else {
            return Self::default();
        };

        let mut total = Duration::zero();
        let mut shift_start: Option<DateTime<Utc>> = None;

        for event in events {
            match event.kind {
                ClockType::In => shift_start = Some(event.timestamp),
                ClockType::Out => {
                    if let Some(start) = shift_start.take() {
                        // an OUT stamped before its IN counts as nothing
                        total += (event.timestamp - start).max(Duration::zero());
                    }
                }
            }
        }

        Self {
            total_worked: total,
            site_name: last.site_name.clone().filter(|name| !name.is_empty()),
            open_since: if last.kind == ClockType::In {
                shift_start
            } else {
                None
            },
        }
    }

    #[must_use]
    pub fn total_hours(&self) -> f64 {
        // whole milliseconds are precise enough for a display
        #[allow(clippy::cast_precision_loss)]
        let millis = self.total_worked.num_milliseconds() as f64;
        millis / 3_600_000.0
    }

    /// Length of the open shift at `now`, zero when clocked out.
    #[must_use]
    pub fn open_shift(&self, now: DateTime<Utc>) -> Duration {
        self.open_since
            .map_or_else(Duration::zero, |start| (now - start).max(Duration::zero()))
    }
}

/// `HH:MM:SS`, hours not capped at 24. Negative durations read as zero.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
