use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Round a UTC instant down to the start of its hour.
///
/// Session blocks anchor to hour boundaries.
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::hours(1)).unwrap_or(ts)
}

/// Converts canonical UTC instants into the display timezone.
///
/// UTC is authoritative everywhere inside the engine; conversion happens
/// once, at the UI boundary, through this handle.
pub struct TimezoneHandler {
    display_tz: Tz,
}

impl TimezoneHandler {
    /// Create a handler for the given IANA timezone name.
    ///
    /// Unrecognised names fall back to UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(timezone = tz_name, "unrecognised timezone, falling back to UTC");
            Tz::UTC
        });
        Self { display_tz: tz }
    }

    /// Validate that `tz_name` is a recognised IANA timezone identifier.
    pub fn validate(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    /// Convert a UTC instant into the display timezone.
    pub fn to_display(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.display_tz)
    }

    /// Short clock string (HH:MM) in the display timezone.
    pub fn clock(&self, dt: DateTime<Utc>) -> String {
        self.to_display(dt).format("%H:%M").to_string()
    }

    /// The configured display timezone.
    pub fn display_tz(&self) -> Tz {
        self.display_tz
    }
}
