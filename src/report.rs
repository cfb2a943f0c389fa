//! Budget-vs-actual views computed from reconciled records: the variance
//! table, headline KPI cards and per-metric chart series.

use crate::metrics::{
    format_percent, is_favorable, MetricKind, CAC, CHURN_RATE, COGS, EBITDA, EBITDA_MARGIN,
    GENERAL_AND_ADMIN, GROSS_MARGIN, LTV, MRR, OPEX, RESEARCH_AND_DEVELOPMENT, REVENUE,
    RULE_OF_40, SALES_AND_MARKETING,
};
use crate::schema::{NormalizedRecord, PeriodKey, Side};
use serde::Serialize;

pub const HEADLINE_METRICS: &[&str] = &[
    MRR,
    REVENUE,
    GROSS_MARGIN,
    EBITDA,
    EBITDA_MARGIN,
    RULE_OF_40,
];

pub const VARIANCE_METRICS: &[&str] = &[
    MRR,
    REVENUE,
    COGS,
    GROSS_MARGIN,
    SALES_AND_MARKETING,
    RESEARCH_AND_DEVELOPMENT,
    GENERAL_AND_ADMIN,
    OPEX,
    EBITDA,
    EBITDA_MARGIN,
    CAC,
    LTV,
    CHURN_RATE,
    RULE_OF_40,
];

/// Number of trailing periods shown in a KPI sparkline.
pub const TRAILING_PERIODS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceCell {
    pub metric: String,
    pub actual: Option<f64>,
    pub budget: Option<f64>,
    /// `actual - budget`, when both are known.
    pub delta: Option<f64>,
    /// `delta / |budget|`, when the budget is known and non-zero.
    pub delta_pct: Option<f64>,
    pub favorable: Option<bool>,
}

impl VarianceCell {
    pub fn new(metric: &str, actual: Option<f64>, budget: Option<f64>) -> Self {
        let delta = match (actual, budget) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };
        let delta_pct = match (delta, budget) {
            (Some(d), Some(b)) if b != 0.0 => Some(d / b.abs()),
            _ => None,
        };

        Self {
            metric: metric.to_string(),
            actual,
            budget,
            delta,
            delta_pct,
            favorable: delta.map(|d| is_favorable(metric, d)),
        }
    }

    /// The delta in the metric's own unit (percentage points for percent metrics).
    pub fn formatted_delta(&self) -> String {
        MetricKind::of(&self.metric).format(self.delta)
    }

    pub fn formatted_delta_pct(&self) -> String {
        format_percent(self.delta_pct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceRow {
    pub month: PeriodKey,
    pub cells: Vec<VarianceCell>,
}

impl VarianceRow {
    pub fn from_record(record: &NormalizedRecord, metrics: &[&str]) -> Self {
        Self {
            month: record.month.clone(),
            cells: metrics
                .iter()
                .map(|metric| {
                    VarianceCell::new(
                        metric,
                        record.get(metric, Side::Actual),
                        record.get(metric, Side::Budget),
                    )
                })
                .collect(),
        }
    }

    pub fn cell(&self, metric: &str) -> Option<&VarianceCell> {
        self.cells.iter().find(|cell| cell.metric == metric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiCard {
    pub name: String,
    pub actual: Option<f64>,
    pub budget: Option<f64>,
    pub favorable: Option<bool>,
    /// Actual values of the trailing periods, oldest first.
    pub trailing: Vec<(PeriodKey, Option<f64>)>,
}

impl KpiCard {
    /// Builds the card from the latest record; `records` must be sorted by period.
    pub fn build(name: &str, records: &[NormalizedRecord]) -> Self {
        let latest = records.last();
        let actual = latest.and_then(|r| r.get(name, Side::Actual));
        let budget = latest.and_then(|r| r.get(name, Side::Budget));

        let start = records.len().saturating_sub(TRAILING_PERIODS);
        let trailing = records[start..]
            .iter()
            .map(|r| (r.month.clone(), r.get(name, Side::Actual)))
            .collect();

        Self {
            name: name.to_string(),
            actual,
            budget,
            favorable: VarianceCell::new(name, actual, budget).favorable,
            trailing,
        }
    }

    pub fn formatted_actual(&self) -> String {
        MetricKind::of(&self.name).format(self.actual)
    }
}

/// Period labels for a chart's x axis.
pub fn period_labels(records: &[NormalizedRecord]) -> Vec<PeriodKey> {
    records.iter().map(|r| r.month.clone()).collect()
}

/// One chart line: the metric's value on `side` for every record, aligned
/// with [`period_labels`].
pub fn metric_series(records: &[NormalizedRecord], metric: &str, side: Side) -> Vec<Option<f64>> {
    records.iter().map(|r| r.get(metric, side)).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardReport {
    pub kpis: Vec<KpiCard>,
    pub variance: Vec<VarianceRow>,
}

impl DashboardReport {
    pub fn build(records: &[NormalizedRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        Self {
            kpis: HEADLINE_METRICS
                .iter()
                .map(|name| KpiCard::build(name, records))
                .collect(),
            variance: records
                .iter()
                .map(|record| VarianceRow::from_record(record, VARIANCE_METRICS))
                .collect(),
        }
    }

    pub fn kpi(&self, name: &str) -> Option<&KpiCard> {
        self.kpis.iter().find(|card| card.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Variance table as Markdown: one row per period, `Δ` and `Δ%` columns per metric.
    pub fn variance_markdown(&self, metrics: &[&str]) -> String {
        let mut output = String::new();

        output.push_str("| Month |");
        for metric in metrics {
            output.push_str(&format!(" {} Δ | {} Δ% |", metric, metric));
        }
        output.push('\n');

        output.push_str("|---|");
        for _ in metrics {
            output.push_str("---:|---:|");
        }
        output.push('\n');

        for row in &self.variance {
            output.push_str(&format!("| {} |", row.month));
            for metric in metrics {
                match row.cell(metric) {
                    Some(cell) => output.push_str(&format!(
                        " {} | {} |",
                        cell.formatted_delta(),
                        cell.formatted_delta_pct()
                    )),
                    None => output.push_str(" | |"),
                }
            }
            output.push('\n');
        }

        output
    }
}
