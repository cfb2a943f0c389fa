//! # SaaS Metrics Reconciler
//!
//! A library for aligning actual and budgeted SaaS metrics (MRR, revenue,
//! margins, CAC/LTV, EBITDA) from two independently shaped feeds into a single
//! normalized monthly dataset.
//!
//! ## Core Concepts
//!
//! - **Raw rows**: mappings from column name to raw cell, as produced by a CSV reader
//! - **Period keys**: raw period labels normalized to `YYYY-MM` so that
//!   `"2024-03-15"` and `"March 2024"` land in the same period
//! - **Sides**: every metric is tracked as `<metric>_Actual` and `<metric>_Budget`;
//!   columns may arrive bare (side implied by the feed) or already suffixed
//! - **Derivation**: OpEx, EBITDA, margins, MRR/ARR and Rule of 40 are computed
//!   per side when the feeds do not supply them, never overwriting supplied values
//!
//! ## Example
//!
//! ```rust
//! use saas_metrics_reconciler::*;
//!
//! let actual = vec![raw_row([("Month", "2024-01"), ("Revenue", "100"), ("COGS", "40")])];
//! let budget = vec![raw_row([("Month", "2024-01-01"), ("Revenue_Budget", "90")])];
//!
//! let records = merge(&actual, &budget);
//! assert_eq!(records.len(), 1);
//! let gross_margin = records[0].get("Gross Margin %", Side::Actual).unwrap();
//! assert!((gross_margin - 0.6).abs() < 1e-9);
//! assert_eq!(records[0].get("Revenue", Side::Budget), Some(90.0));
//! ```

pub mod derivation;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod report;
pub mod schema;
pub mod utils;

pub use derivation::{derive_metrics, DerivedMetric};
pub use engine::{
    merge, DuplicatePeriod, PeriodIssue, ReconcileDiagnostics, Reconciler, Reconciliation,
};
pub use error::{ReconcileError, Result};
pub use ingestion::*;
pub use metrics::{format_metric, is_favorable, MetricKind};
pub use report::{metric_series, period_labels, DashboardReport, KpiCard, VarianceCell, VarianceRow};
pub use schema::*;
pub use utils::{normalize_period, parse_number, parse_period};

/// Reconciles both feeds with an explicit configuration.
pub fn reconcile(
    actual_rows: &[RawRow],
    budget_rows: &[RawRow],
    config: ReconcilerConfig,
) -> Result<Reconciliation> {
    Reconciler::new(config)?.reconcile(actual_rows, budget_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        ARR, COGS, EBITDA, EBITDA_MARGIN, GROSS_MARGIN, MRR, OPEX, REVENUE, RULE_OF_40,
    };

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("expected a value");
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_end_to_end_single_period() {
        let actual = vec![raw_row([
            ("Month", RawCell::from("2024-01")),
            ("Revenue", RawCell::Number(100.0)),
            ("COGS", RawCell::Number(40.0)),
        ])];
        let budget = vec![raw_row([
            ("Month", RawCell::from("2024-01")),
            ("Revenue_Budget", RawCell::Number(90.0)),
            ("COGS_Budget", RawCell::Number(30.0)),
        ])];

        let records = merge(&actual, &budget);
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.month.as_str(), "2024-01");
        assert_eq!(record.get(REVENUE, Side::Actual), Some(100.0));
        assert_eq!(record.get(COGS, Side::Actual), Some(40.0));
        assert_close(record.get(GROSS_MARGIN, Side::Actual), 0.6);
        assert_eq!(record.get(REVENUE, Side::Budget), Some(90.0));
        assert_eq!(record.get(COGS, Side::Budget), Some(30.0));
        assert_close(record.get(GROSS_MARGIN, Side::Budget), 0.667);

        assert_eq!(record.get(OPEX, Side::Actual), Some(0.0));
        assert_eq!(record.get(EBITDA, Side::Actual), Some(60.0));
        assert_close(record.get(EBITDA_MARGIN, Side::Actual), 0.6);
        assert_eq!(record.get(EBITDA, Side::Budget), Some(60.0));
        assert!(record.has_field(RULE_OF_40, Side::Actual));
        assert_eq!(record.get(RULE_OF_40, Side::Actual), None);
        assert_eq!(record.get(RULE_OF_40, Side::Budget), None);
    }

    #[test]
    fn test_budget_only_period() {
        let actual = vec![raw_row([("Month", "2024-01"), ("Revenue", "100")])];
        let budget = vec![
            raw_row([("Month", "2024-01"), ("Revenue", "90")]),
            raw_row([("Month", "2024-02"), ("Revenue", "95")]),
        ];

        let records = merge(&actual, &budget);
        assert_eq!(records.len(), 2);

        let february = &records[1];
        assert_eq!(february.month.as_str(), "2024-02");
        assert!(february.actual.is_empty());
        assert_eq!(february.get(REVENUE, Side::Budget), Some(95.0));
    }

    #[test]
    fn test_duplicate_actual_period_last_wins() {
        let actual = vec![
            raw_row([("Month", "2024-01-05"), ("Revenue", "100")]),
            raw_row([("Month", "January 2024"), ("Revenue", "250")]),
        ];

        let records = merge(&actual, &[]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get(REVENUE, Side::Actual), Some(250.0));
    }

    #[test]
    fn test_mrr_derived_from_arr() {
        let actual = vec![raw_row([("Month", "2024-01"), ("ARR", "$1,200")])];

        let records = merge(&actual, &[]);
        assert_eq!(records[0].get(MRR, Side::Actual), Some(100.0));
        assert_eq!(records[0].get(ARR, Side::Actual), Some(1200.0));
    }

    #[test]
    fn test_union_completeness_and_order() {
        let actual = vec![
            raw_row([("Month", "2024-03"), ("Revenue", "3")]),
            raw_row([("Month", "2024-01"), ("Revenue", "1")]),
        ];
        let budget = vec![
            raw_row([("Month", "02/01/2024"), ("Revenue", "2")]),
            raw_row([("Month", "2024-03-31"), ("Revenue", "3")]),
        ];

        let records = merge(&actual, &budget);
        let months: Vec<&str> = records.iter().map(|r| r.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);
    }

    #[test]
    fn test_reconcile_rejects_invalid_config() {
        let config = ReconcilerConfig {
            period_column: String::new(),
            ..ReconcilerConfig::default()
        };

        let result = reconcile(&[], &[], config);
        assert!(matches!(result, Err(ReconcileError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_feeds() {
        assert!(merge(&[], &[]).is_empty());
    }
}
