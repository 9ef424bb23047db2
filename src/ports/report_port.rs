//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TraderError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn render(&self, result: &BacktestResult) -> String;

    /// Write the rendered report to `output_path`, or stdout when `None`.
    fn write(&self, result: &BacktestResult, output_path: Option<&str>) -> Result<(), TraderError> {
        let text = self.render(result);
        match output_path {
            Some(path) => std::fs::write(path, text).map_err(|e| TraderError::Report {
                reason: format!("failed to write {path}: {e}"),
            }),
            None => {
                print!("{text}");
                Ok(())
            }
        }
    }
}
