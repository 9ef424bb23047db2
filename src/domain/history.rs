//! Historical minute-bar series.
//!
//! The series is built by walking a [`SimulatedClock`] over the raw records in
//! lock-step, so that every open minute between the first and last matched
//! record has exactly one sample. Missing minutes repeat the previous sample.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::clock::{MarketHours, SimulatedClock, TIMESTAMP_FORMAT};
use super::error::TraderError;
use super::price::{BarRecord, PriceSample};

/// One calendar year of one-minute clock steps.
pub const DEFAULT_MAX_ITERATIONS: usize = 366 * 24 * 60;

const SECONDS_PER_MINUTE: i64 = 60;

/// Round an epoch timestamp down to the start of its minute.
pub fn minute_start(epoch: i64) -> i64 {
    epoch - epoch.rem_euclid(SECONDS_PER_MINUTE)
}

/// How to walk the raw records when building a series.
#[derive(Debug, Clone)]
pub struct SeriesOptions {
    pub start: DateTime<Tz>,
    pub step: Duration,
    pub hours: MarketHours,
    pub max_iterations: usize,
}

impl SeriesOptions {
    pub fn new(start: DateTime<Tz>, hours: MarketHours) -> Self {
        SeriesOptions {
            start,
            step: Duration::seconds(SECONDS_PER_MINUTE),
            hours,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoricalSeries {
    samples: BTreeMap<i64, PriceSample>,
    start_time: DateTime<Tz>,
    end_time: DateTime<Tz>,
    symbol_start_price: Decimal,
    symbol_end_price: Decimal,
}

impl HistoricalSeries {
    /// Build a series from time-ordered records.
    ///
    /// Every record must parse, even ones that end up skipped. Records whose
    /// timestamp precedes the current open minute are dropped as stale.
    pub fn load(records: &[BarRecord], options: &SeriesOptions) -> Result<Self, TraderError> {
        info!(records = records.len(), "reading historical data");

        let parsed = records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                let line = idx + 1;
                let t = options
                    .hours
                    .parse_timestamp(&record.timestamp)
                    .map_err(|e| TraderError::DataFormat {
                        line,
                        reason: format!("invalid timestamp {:?}: {}", record.timestamp, e),
                    })?;
                Ok((t, record.parse_prices(line)?))
            })
            .collect::<Result<Vec<_>, TraderError>>()?;

        let mut clock = SimulatedClock::new(options.start, options.step, options.hours);
        let mut samples = BTreeMap::new();
        let mut first: Option<(DateTime<Tz>, PriceSample)> = None;
        let mut last: Option<(DateTime<Tz>, PriceSample)> = None;
        let mut next = 0usize;
        let mut iterations = 0usize;
        let mut stale = 0usize;

        while next < parsed.len() {
            iterations += 1;
            if iterations > options.max_iterations {
                return Err(TraderError::MalformedSeries {
                    iterations: options.max_iterations,
                });
            }

            clock.advance();
            if !clock.is_open() {
                continue;
            }
            let now = clock.now();

            while next < parsed.len() {
                let (t, sample) = parsed[next];
                if now > t {
                    stale += 1;
                    next += 1;
                    continue;
                }
                if now < t {
                    if let Some((_, prev)) = last {
                        samples.insert(now.timestamp(), prev);
                    }
                    break;
                }

                samples.insert(t.timestamp(), sample);
                if first.is_none() {
                    first = Some((t, sample));
                }
                last = Some((t, sample));
                next += 1;
                break;
            }
        }

        let (Some((start_time, start_sample)), Some((end_time, end_sample))) = (first, last) else {
            return Err(TraderError::DataSource {
                reason: format!(
                    "no records fall inside market hours on or after {}",
                    options.start.format(TIMESTAMP_FORMAT)
                ),
            });
        };

        debug!(stale, iterations, "historical walk complete");
        info!(
            samples = samples.len(),
            end = %end_time.format(TIMESTAMP_FORMAT),
            "finished reading historical data"
        );

        Ok(HistoricalSeries {
            samples,
            start_time,
            end_time,
            symbol_start_price: start_sample.close,
            symbol_end_price: end_sample.close,
        })
    }

    /// The sample for the minute containing `t`.
    pub fn lookup(&self, t: DateTime<Tz>) -> Result<PriceSample, TraderError> {
        let key = minute_start(t.timestamp());
        let in_range = key >= self.start_time.timestamp() && key <= self.end_time.timestamp();
        self.samples
            .get(&key)
            .filter(|_| in_range)
            .copied()
            .ok_or_else(|| TraderError::NoData {
                timestamp: t.format(TIMESTAMP_FORMAT).to_string(),
            })
    }

    /// Up to `n` consecutive one-minute samples ending with the minute that
    /// contains `t`, oldest first. Stops early at the first missing minute.
    pub fn recent_samples(&self, t: DateTime<Tz>, n: usize) -> Vec<PriceSample> {
        let end = minute_start(t.timestamp());
        let mut out: Vec<PriceSample> = (0..n as i64)
            .map(|back| self.samples.get(&(end - back * SECONDS_PER_MINUTE)))
            .take_while(Option::is_some)
            .flatten()
            .copied()
            .collect();
        out.reverse();
        out
    }

    pub fn start_time(&self) -> DateTime<Tz> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Tz> {
        self.end_time
    }

    pub fn symbol_start_price(&self) -> Decimal {
        self.symbol_start_price
    }

    pub fn symbol_end_price(&self) -> Decimal {
        self.symbol_end_price
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn hours() -> MarketHours {
        MarketHours::default()
    }

    fn at(ts: &str) -> DateTime<Tz> {
        hours().parse_timestamp(ts).unwrap()
    }

    fn record(ts: &str, close: &str) -> BarRecord {
        BarRecord::new(ts, close, close, close, close)
    }

    fn options(start: &str) -> SeriesOptions {
        SeriesOptions::new(at(start), hours())
    }

    #[test]
    fn consecutive_minutes_are_recorded() {
        let records = vec![
            record("2020-01-02 09:30:00", "100"),
            record("2020-01-02 09:31:00", "101"),
            record("2020-01-02 09:32:00", "102"),
        ];
        let series = HistoricalSeries::load(&records, &options("2020-01-02 04:00:00")).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.start_time(), at("2020-01-02 09:30:00"));
        assert_eq!(series.end_time(), at("2020-01-02 09:32:00"));
        assert_eq!(series.lookup(at("2020-01-02 09:31:00")).unwrap().close, dec!(101));
    }

    #[test]
    fn gaps_carry_previous_sample_forward() {
        let records = vec![
            record("2020-01-02 09:30:00", "100"),
            record("2020-01-02 09:33:00", "103"),
        ];
        let series = HistoricalSeries::load(&records, &options("2020-01-02 09:30:00")).unwrap();

        assert_eq!(series.lookup(at("2020-01-02 09:31:00")).unwrap().close, dec!(100));
        assert_eq!(series.lookup(at("2020-01-02 09:32:00")).unwrap().close, dec!(100));
        // The record after the gap is still consumed on its own minute.
        assert_eq!(series.lookup(at("2020-01-02 09:33:00")).unwrap().close, dec!(103));
        assert_eq!(series.symbol_end_price(), dec!(103));
    }

    #[test]
    fn stale_and_duplicate_records_are_skipped() {
        let records = vec![
            record("2020-01-02 09:30:00", "100"),
            record("2020-01-02 09:30:00", "999"),
            record("2020-01-02 09:31:00", "101"),
        ];
        let series = HistoricalSeries::load(&records, &options("2020-01-02 09:30:00")).unwrap();

        assert_eq!(series.lookup(at("2020-01-02 09:30:00")).unwrap().close, dec!(100));
        assert_eq!(series.lookup(at("2020-01-02 09:31:00")).unwrap().close, dec!(101));
    }

    #[test]
    fn records_outside_market_hours_are_ignored() {
        let records = vec![
            record("2020-01-02 08:00:00", "90"),
            record("2020-01-02 09:30:00", "100"),
            record("2020-01-02 17:00:00", "110"),
            record("2020-01-03 09:30:00", "105"),
        ];
        let series = HistoricalSeries::load(&records, &options("2020-01-02 04:00:00")).unwrap();

        assert_eq!(series.symbol_start_price(), dec!(100));
        assert_eq!(series.symbol_end_price(), dec!(105));
        assert!(series.lookup(at("2020-01-02 08:00:00")).is_err());
        assert!(series.lookup(at("2020-01-02 17:00:00")).is_err());
        // Every open minute of the first session was backfilled.
        assert_eq!(series.lookup(at("2020-01-02 15:59:00")).unwrap().close, dec!(100));
        assert_eq!(series.lookup(at("2020-01-02 16:00:00")).unwrap().close, dec!(100));
    }

    #[test]
    fn records_before_start_are_skipped() {
        let records = vec![
            record("2020-01-02 09:30:00", "100"),
            record("2020-01-02 09:31:00", "101"),
        ];
        let series = HistoricalSeries::load(&records, &options("2020-01-02 09:31:00")).unwrap();
        assert_eq!(series.start_time(), at("2020-01-02 09:31:00"));
        assert_eq!(series.symbol_start_price(), dec!(101));
    }

    #[test]
    fn malformed_number_fails_whole_load() {
        let records = vec![
            record("2020-01-02 09:30:00", "100"),
            BarRecord::new("2020-01-02 09:31:00", "1", "1", "x", "1"),
        ];
        let err = HistoricalSeries::load(&records, &options("2020-01-02 09:30:00")).unwrap_err();
        assert!(matches!(err, TraderError::DataFormat { line: 2, .. }));
    }

    #[test]
    fn malformed_timestamp_fails_whole_load() {
        let records = vec![record("02/01/2020 09:30", "100")];
        let err = HistoricalSeries::load(&records, &options("2020-01-02 09:30:00")).unwrap_err();
        assert!(matches!(err, TraderError::DataFormat { line: 1, .. }));
    }

    #[test]
    fn runaway_walk_is_capped() {
        let records = vec![
            record("2020-01-02 09:30:00", "100"),
            record("2021-06-01 09:30:00", "101"),
        ];
        let mut opts = options("2020-01-02 09:30:00");
        opts.max_iterations = 10_000;
        let err = HistoricalSeries::load(&records, &opts).unwrap_err();
        assert!(matches!(err, TraderError::MalformedSeries { iterations: 10_000 }));
    }

    #[test]
    fn no_usable_records_is_an_error() {
        let records = vec![record("2020-01-02 08:00:00", "100")];
        let err = HistoricalSeries::load(&records, &options("2020-01-02 04:00:00")).unwrap_err();
        assert!(matches!(err, TraderError::DataSource { .. }));
    }

    #[test]
    fn lookup_outside_range_is_no_data() {
        let records = vec![record("2020-01-02 09:30:00", "100")];
        let series = HistoricalSeries::load(&records, &options("2020-01-02 09:30:00")).unwrap();

        let err = series.lookup(at("2020-01-02 09:31:00")).unwrap_err();
        assert!(matches!(err, TraderError::NoData { .. }));
        assert!(series.lookup(at("2020-01-01 09:30:00")).is_err());
    }

    #[test]
    fn lookup_truncates_to_minute() {
        let records = vec![record("2020-01-02 09:30:00", "100")];
        let series = HistoricalSeries::load(&records, &options("2020-01-02 09:30:00")).unwrap();
        assert_eq!(series.lookup(at("2020-01-02 09:30:45")).unwrap().close, dec!(100));
    }

    #[test]
    fn recent_samples_end_at_current_minute() {
        let records = vec![
            record("2020-01-02 09:30:00", "100"),
            record("2020-01-02 09:31:00", "101"),
            record("2020-01-02 09:32:00", "102"),
        ];
        let series = HistoricalSeries::load(&records, &options("2020-01-02 09:30:00")).unwrap();

        let closes: Vec<Decimal> = series
            .recent_samples(at("2020-01-02 09:32:30"), 3)
            .iter()
            .map(|s| s.close)
            .collect();
        assert_eq!(closes, vec![dec!(100), dec!(101), dec!(102)]);

        // Only two minutes exist before 09:31 inclusive.
        assert_eq!(series.recent_samples(at("2020-01-02 09:31:00"), 3).len(), 2);
    }

    #[test]
    fn minute_start_rounds_down() {
        assert_eq!(minute_start(125), 120);
        assert_eq!(minute_start(120), 120);
        assert_eq!(minute_start(-1), -60);
    }
}
