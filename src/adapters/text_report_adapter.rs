//! Plain-text backtest report implementing ReportPort.
//!
//! Cash prints with two decimals, percentages with three, rounded half away
//! from zero.

use std::fmt::{self, Write};

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::backtest::{BacktestResult, DayReport};
use crate::ports::report_port::ReportPort;

const DAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

fn cash(value: Decimal) -> String {
    fixed(value, 2)
}

fn percent(value: Decimal) -> String {
    format!("{}%", fixed(value, 3))
}

fn write_day(out: &mut String, day: &DayReport) -> fmt::Result {
    writeln!(out, "Time: {}", day.time.format(DAY_TIME_FORMAT))?;
    writeln!(out, "Orders created: {}", day.orders_created)?;
    writeln!(out, "Profit/Loss - Day: {}", percent(day.profit_loss_percent()))?;
    writeln!(
        out,
        "Symbol Profit/Loss - Day: {}",
        percent(day.symbol_profit_loss_percent())
    )?;
    writeln!(out, "Algo Benefit - Day: {}", percent(day.algorithm_benefit()))?;
    writeln!(out, "Cash: {}", cash(day.cash.end))?;
    writeln!(out)
}

fn write_report(out: &mut String, result: &BacktestResult) -> fmt::Result {
    writeln!(out, "starting cash: {}", cash(result.starting_cash))?;
    if result.print_day_details {
        for day in &result.days {
            write_day(out, day)?;
        }
    }
    writeln!(out, "Ending Cash: {}", cash(result.ending_cash))?;
    writeln!(out, "Profit/Loss: {}", percent(result.profit_loss_percent()))?;
    writeln!(
        out,
        "Symbol Profit/Loss: {}",
        percent(result.symbol_profit_loss_percent())
    )?;
    writeln!(out, "Algo Benefit: {}", percent(result.algorithm_benefit()))
}

#[derive(Debug, Default)]
pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn new() -> Self {
        TextReportAdapter
    }
}

impl ReportPort for TextReportAdapter {
    fn render(&self, result: &BacktestResult) -> String {
        let mut out = String::new();
        // fmt::Write for String never fails.
        let _ = write_report(&mut out, result);
        out
    }
}
