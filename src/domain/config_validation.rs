//! Configuration validation.
//!
//! Validates the `[backtest]`, `[strategy]` and `[market]` sections before a
//! run. Required keys are enforced when the typed configs are built; these
//! checks cover the ranges and formats of whatever is present. Every check
//! reads the raw text, so a present value that does not parse is rejected
//! instead of falling back to the getter default.

use crate::domain::clock::MarketHours;
use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

/// Series keys are whole minutes, so historical data must be one-minute bars.
pub const SUPPORTED_DATA_STEP_SECONDS: i64 = 60;

const BACKTEST_FLAGS: [&str; 2] = ["data_has_headers", "print_day_details"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_starting_cash(config)?;
    validate_data_step(config)?;
    validate_fill_probability(config)?;
    u64_value(config, "backtest", "seed")?;
    validate_positive_int(config, "backtest", "max_series_iterations")?;
    for key in BACKTEST_FLAGS {
        bool_value(config, "backtest", key)?;
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_symbol(config)?;
    validate_purchase_quantity(config)?;
    validate_max_concurrent(config)?;
    validate_historical_bars(config)?;
    decimal_value(config, "strategy", "min_slope_required_to_buy")?;
    bool_value(config, "strategy", "all_sequential_increases_required")?;
    validate_positive_int(config, "strategy", "time_step_seconds")?;
    validate_positive_int(config, "strategy", "stale_buy_order_minutes")?;
    validate_liquidation_window(config)?;
    validate_bracket(config)?;
    Ok(())
}

pub fn validate_market_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    market_hours(config).map(|_| ())
}

/// Market hours from `[market]`, defaulting to New York regular hours.
pub fn market_hours(config: &dyn ConfigPort) -> Result<MarketHours, TraderError> {
    let defaults = MarketHours::default();
    let timezone = match config.get_string("market", "timezone") {
        Some(name) => Tz::from_str(name.trim()).map_err(|_| {
            TraderError::config_invalid("market", "timezone", format!("unknown time zone {name:?}"))
        })?,
        None => defaults.timezone,
    };
    let open = time_of_day(config, "open_time")?.unwrap_or(defaults.open);
    let close = time_of_day(config, "close_time")?.unwrap_or(defaults.close);
    if open >= close {
        return Err(TraderError::config_invalid(
            "market",
            "close_time",
            "close_time must be after open_time",
        ));
    }
    Ok(MarketHours {
        timezone,
        open,
        close,
    })
}

fn time_of_day(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveTime>, TraderError> {
    config
        .get_string("market", key)
        .map(|value| {
            NaiveTime::parse_from_str(value.trim(), TIME_OF_DAY_FORMAT).map_err(|_| {
                TraderError::config_invalid("market", key, "invalid time (expected HH:MM:SS)")
            })
        })
        .transpose()
}

/// A decimal-valued key, parsed from its text so it never passes through `f64`.
pub fn decimal_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Decimal>, TraderError> {
    config
        .get_string(section, key)
        .map(|value| {
            Decimal::from_str(value.trim()).map_err(|_| {
                TraderError::config_invalid(section, key, format!("{value:?} is not a decimal number"))
            })
        })
        .transpose()
}

pub fn u64_value(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<u64>, TraderError> {
    config
        .get_string(section, key)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|_| {
                TraderError::config_invalid(section, key, format!("{value:?} is not a non-negative integer"))
            })
        })
        .transpose()
}

pub fn int_value(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, TraderError> {
    config
        .get_string(section, key)
        .map(|value| {
            value.trim().parse::<i64>().map_err(|_| {
                TraderError::config_invalid(section, key, format!("{value:?} is not an integer"))
            })
        })
        .transpose()
}

pub fn float_value(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TraderError> {
    config
        .get_string(section, key)
        .map(|value| {
            value.trim().parse::<f64>().map_err(|_| {
                TraderError::config_invalid(section, key, format!("{value:?} is not a number"))
            })
        })
        .transpose()
}

/// Accepts `true/yes/1` and `false/no/0`, in any case.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub fn bool_value(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<bool>, TraderError> {
    config
        .get_string(section, key)
        .map(|value| {
            parse_bool(&value).ok_or_else(|| {
                TraderError::config_invalid(section, key, format!("{value:?} is not a boolean"))
            })
        })
        .transpose()
}

fn validate_positive_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TraderError> {
    if int_value(config, section, key)?.is_some_and(|v| v <= 0) {
        return Err(TraderError::config_invalid(
            section,
            key,
            format!("{key} must be positive"),
        ));
    }
    Ok(())
}

fn validate_data_step(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let step = int_value(config, "backtest", "data_step_seconds")?;
    if step.is_some_and(|v| v != SUPPORTED_DATA_STEP_SECONDS) {
        return Err(TraderError::config_invalid(
            "backtest",
            "data_step_seconds",
            "only one-minute data (60 seconds) is supported",
        ));
    }
    Ok(())
}

fn validate_starting_cash(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(cash) = decimal_value(config, "backtest", "starting_cash")? {
        if cash <= Decimal::ZERO {
            return Err(TraderError::config_invalid(
                "backtest",
                "starting_cash",
                "starting_cash must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_fill_probability(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = float_value(config, "backtest", "fill_probability")?;
    if value.is_some_and(|v| !(0.0..=1.0).contains(&v)) {
        return Err(TraderError::config_invalid(
            "backtest",
            "fill_probability",
            "fill_probability must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(symbol) = config.get_string("strategy", "symbol") {
        if symbol.trim().is_empty() {
            return Err(TraderError::config_invalid(
                "strategy",
                "symbol",
                "symbol must not be empty",
            ));
        }
    }
    Ok(())
}

fn validate_purchase_quantity(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(qty) = decimal_value(config, "strategy", "purchase_quantity")? {
        if qty <= Decimal::ZERO {
            return Err(TraderError::config_invalid(
                "strategy",
                "purchase_quantity",
                "purchase_quantity must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_max_concurrent(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if int_value(config, "strategy", "max_concurrent_purchases")?.is_some_and(|v| v < 1) {
        return Err(TraderError::config_invalid(
            "strategy",
            "max_concurrent_purchases",
            "max_concurrent_purchases must be at least 1",
        ));
    }
    Ok(())
}

fn validate_historical_bars(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if int_value(config, "strategy", "num_historical_bars")?.is_some_and(|v| v < 2) {
        return Err(TraderError::config_invalid(
            "strategy",
            "num_historical_bars",
            "num_historical_bars must be at least 2 to fit a slope",
        ));
    }
    Ok(())
}

fn validate_liquidation_window(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if int_value(config, "strategy", "liquidate_before_close_minutes")?.is_some_and(|v| v < 0) {
        return Err(TraderError::config_invalid(
            "strategy",
            "liquidate_before_close_minutes",
            "liquidate_before_close_minutes must be non-negative",
        ));
    }
    Ok(())
}

fn validate_bracket(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for key in ["take_profit_pct", "stop_loss_pct", "stop_limit_pct"] {
        if let Some(pct) = decimal_value(config, "strategy", key)? {
            if pct <= Decimal::ZERO || pct >= Decimal::ONE_HUNDRED {
                return Err(TraderError::config_invalid(
                    "strategy",
                    key,
                    format!("{key} must be between 0 and 100"),
                ));
            }
        }
    }
    let stop = decimal_value(config, "strategy", "stop_loss_pct")?.unwrap_or(Decimal::new(12, 2));
    let limit = decimal_value(config, "strategy", "stop_limit_pct")?.unwrap_or(Decimal::new(17, 2));
    if limit < stop {
        return Err(TraderError::config_invalid(
            "strategy",
            "stop_limit_pct",
            "stop_limit_pct must not be tighter than stop_loss_pct",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(err: TraderError) -> String {
        match err {
            TraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other}"),
        }
    }

    const VALID: &str = r#"
[backtest]
data_file = spy.csv
start_time = 2020-01-02 09:30:00
starting_cash = 100000
fill_probability = 0.75
seed = 7

[strategy]
symbol = SPY
purchase_quantity = 10
max_concurrent_purchases = 20
num_historical_bars = 3
min_slope_required_to_buy = 1.3

[market]
timezone = America/New_York
open_time = 09:30:00
close_time = 16:00:00
"#;

    #[test]
    fn valid_config_passes() {
        let c = config(VALID);
        validate_backtest_config(&c).unwrap();
        validate_strategy_config(&c).unwrap();
        validate_market_config(&c).unwrap();
    }

    #[test]
    fn empty_sections_pass_with_defaults() {
        let c = config("[backtest]\n[strategy]\n");
        validate_backtest_config(&c).unwrap();
        validate_strategy_config(&c).unwrap();
        assert_eq!(market_hours(&c).unwrap(), MarketHours::default());
    }

    #[test]
    fn rejects_non_positive_cash() {
        let err = validate_backtest_config(&config("[backtest]\nstarting_cash = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "starting_cash");
    }

    #[test]
    fn rejects_non_decimal_cash() {
        let err =
            validate_backtest_config(&config("[backtest]\nstarting_cash = lots\n")).unwrap_err();
        assert_eq!(invalid_key(err), "starting_cash");
    }

    #[test]
    fn rejects_fill_probability_out_of_range() {
        let err =
            validate_backtest_config(&config("[backtest]\nfill_probability = 1.5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "fill_probability");
    }

    #[test]
    fn rejects_negative_seed() {
        let err = validate_backtest_config(&config("[backtest]\nseed = -3\n")).unwrap_err();
        assert_eq!(invalid_key(err), "seed");
    }

    #[test]
    fn rejects_zero_quantity() {
        let err =
            validate_strategy_config(&config("[strategy]\npurchase_quantity = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "purchase_quantity");
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = validate_strategy_config(&config("[strategy]\nmax_concurrent_purchases = 0\n"))
            .unwrap_err();
        assert_eq!(invalid_key(err), "max_concurrent_purchases");
    }

    #[test]
    fn rejects_single_bar_window() {
        let err =
            validate_strategy_config(&config("[strategy]\nnum_historical_bars = 1\n")).unwrap_err();
        assert_eq!(invalid_key(err), "num_historical_bars");
    }

    #[test]
    fn rejects_bad_slope() {
        let err = validate_strategy_config(&config("[strategy]\nmin_slope_required_to_buy = steep\n"))
            .unwrap_err();
        assert_eq!(invalid_key(err), "min_slope_required_to_buy");
    }

    #[test]
    fn rejects_stop_limit_inside_stop() {
        let err = validate_strategy_config(&config(
            "[strategy]\nstop_loss_pct = 0.2\nstop_limit_pct = 0.1\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(err), "stop_limit_pct");
    }

    #[test]
    fn rejects_zero_time_step() {
        let err =
            validate_strategy_config(&config("[strategy]\ntime_step_seconds = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "time_step_seconds");
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = validate_market_config(&config("[market]\ntimezone = Mars/Olympus\n")).unwrap_err();
        assert_eq!(invalid_key(err), "timezone");
    }

    #[test]
    fn rejects_inverted_session() {
        let err = validate_market_config(&config(
            "[market]\nopen_time = 16:00:00\nclose_time = 09:30:00\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(err), "close_time");
    }

    #[test]
    fn custom_market_hours() {
        let hours = market_hours(&config(
            "[market]\ntimezone = Europe/London\nopen_time = 08:00:00\nclose_time = 16:30:00\n",
        ))
        .unwrap();
        assert_eq!(hours.timezone, chrono_tz::Europe::London);
        assert_eq!(hours.open, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(hours.close, NaiveTime::from_hms_opt(16, 30, 0).unwrap());
    }

    #[test]
    fn rejects_unparsable_integers() {
        for key in [
            "num_historical_bars",
            "max_concurrent_purchases",
            "time_step_seconds",
            "stale_buy_order_minutes",
            "liquidate_before_close_minutes",
        ] {
            let ini = format!("[strategy]\n{key} = five\n");
            let err = validate_strategy_config(&config(&ini)).unwrap_err();
            assert_eq!(invalid_key(err), key);
        }
        let err = validate_strategy_config(&config("[strategy]\ntime_step_seconds = 60s\n"))
            .unwrap_err();
        assert_eq!(invalid_key(err), "time_step_seconds");
        let err = validate_backtest_config(&config("[backtest]\nmax_series_iterations = 1e6\n"))
            .unwrap_err();
        assert_eq!(invalid_key(err), "max_series_iterations");
    }

    #[test]
    fn rejects_unparsable_fill_probability() {
        for value in ["0,5", "most", "nan"] {
            let ini = format!("[backtest]\nfill_probability = {value}\n");
            let err = validate_backtest_config(&config(&ini)).unwrap_err();
            assert_eq!(invalid_key(err), "fill_probability");
        }
    }

    #[test]
    fn rejects_unparsable_flags() {
        let err = validate_strategy_config(&config(
            "[strategy]\nall_sequential_increases_required = ture\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(err), "all_sequential_increases_required");

        for key in BACKTEST_FLAGS {
            let ini = format!("[backtest]\n{key} = maybe\n");
            let err = validate_backtest_config(&config(&ini)).unwrap_err();
            assert_eq!(invalid_key(err), key);
        }
    }

    #[test]
    fn flag_spellings() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("ture"), None);
    }

    #[test]
    fn only_one_minute_data_step() {
        validate_backtest_config(&config("[backtest]\ndata_step_seconds = 60\n")).unwrap();
        for value in ["300", "30", "0"] {
            let ini = format!("[backtest]\ndata_step_seconds = {value}\n");
            let err = validate_backtest_config(&config(&ini)).unwrap_err();
            assert_eq!(invalid_key(err), "data_step_seconds");
        }
    }

    #[test]
    fn decimal_value_keeps_exact_text() {
        let c = config("[strategy]\nmin_slope_required_to_buy = 0.1\n");
        assert_eq!(
            decimal_value(&c, "strategy", "min_slope_required_to_buy").unwrap(),
            Some(Decimal::new(1, 1))
        );
        assert_eq!(decimal_value(&c, "strategy", "missing").unwrap(), None);
    }
}
