//! Simulated market clock.
//!
//! Session boundaries are fixed clock times in the market time zone. The clock
//! does not know about exchange holidays or early closes; a holiday looks like
//! an ordinary session to it.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;

/// Layout of timestamps in historical files and configuration.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Regular trading hours in a named time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub timezone: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for MarketHours {
    fn default() -> Self {
        MarketHours {
            timezone: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).expect("09:30:00 is a valid time"),
            close: NaiveTime::from_hms_opt(16, 0, 0).expect("16:00:00 is a valid time"),
        }
    }
}

impl MarketHours {
    /// Parse a `YYYY-MM-DD HH:MM:SS` wall-clock timestamp in the market zone.
    pub fn parse_timestamp(&self, value: &str) -> Result<DateTime<Tz>, chrono::ParseError> {
        let naive = NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)?;
        Ok(self.localize(naive))
    }

    /// Attach the market zone to a wall-clock time. Ambiguous times resolve
    /// to the earlier instant; times inside a DST gap are read as UTC.
    pub fn localize(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| self.timezone.from_utc_datetime(&naive))
    }

    /// Open and close instants for a calendar day.
    pub fn session_bounds(&self, date: NaiveDate) -> (DateTime<Tz>, DateTime<Tz>) {
        (
            self.localize(date.and_time(self.open)),
            self.localize(date.and_time(self.close)),
        )
    }
}

pub fn is_weekend(t: &DateTime<Tz>) -> bool {
    matches!(t.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPhase {
    PreOpen,
    Open,
    ClosedSameDay,
    ClosedWeekend,
}

#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now: DateTime<Tz>,
    session_open: DateTime<Tz>,
    session_close: DateTime<Tz>,
    session_date: NaiveDate,
    step: Duration,
    phase: ClockPhase,
    hours: MarketHours,
}

impl SimulatedClock {
    /// Create a clock whose first `advance` lands exactly on `start`.
    pub fn new(start: DateTime<Tz>, step: Duration, hours: MarketHours) -> Self {
        let session_date = start.date_naive();
        let (session_open, session_close) = hours.session_bounds(session_date);
        let mut clock = SimulatedClock {
            now: start - step,
            session_open,
            session_close,
            session_date,
            step,
            phase: ClockPhase::PreOpen,
            hours,
        };
        clock.phase = clock.classify();
        clock
    }

    /// Move forward one step and reclassify.
    pub fn advance(&mut self) {
        self.advance_by(self.step);
    }

    /// Move forward an arbitrary amount and reclassify.
    pub fn advance_by(&mut self, delta: Duration) {
        self.now = self.now + delta;

        let today = self.now.date_naive();
        if today != self.session_date {
            let (open, close) = self.hours.session_bounds(today);
            self.session_open = open;
            self.session_close = close;
            self.session_date = today;
        }

        self.phase = self.classify();
    }

    fn classify(&self) -> ClockPhase {
        if is_weekend(&self.now) {
            ClockPhase::ClosedWeekend
        } else if self.now < self.session_open {
            ClockPhase::PreOpen
        } else if self.now > self.session_close {
            ClockPhase::ClosedSameDay
        } else {
            ClockPhase::Open
        }
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.now
    }

    pub fn session_open(&self) -> DateTime<Tz> {
        self.session_open
    }

    pub fn session_close(&self) -> DateTime<Tz> {
        self.session_close
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn hours(&self) -> &MarketHours {
        &self.hours
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase == ClockPhase::Open
    }

    /// Time left until today's close, or `None` on weekends and after close.
    pub fn time_until_close(&self) -> Option<Duration> {
        match self.phase {
            ClockPhase::PreOpen | ClockPhase::Open => Some(self.session_close - self.now),
            ClockPhase::ClosedSameDay | ClockPhase::ClosedWeekend => None,
        }
    }
}
