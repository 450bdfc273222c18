//! Derived reports: financial summaries, ledger export and dashboard analytics.
//!
//! Everything here is computed on demand from the database; nothing is
//! cached or stored.

pub mod analytics;
pub mod export;
pub mod finance;

pub use analytics::{dashboard, find_metric, metrics, DashboardStats, Metric};
pub use export::{export_filename, export_transactions, parse_fields, ExportError, ExportFormat};
pub use finance::{financial_summary, FinancialSummary};

/// Percentage of `part` in `whole`, rounded to two decimals; 0 when `whole` is 0
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        round2(part / whole * 100.0)
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
