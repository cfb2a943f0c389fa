//! Metric names and the classification tables shared by every consumer of the
//! reconciled dataset: how each metric is displayed and which direction of
//! variance is favorable.

pub const MRR: &str = "MRR";
pub const ARR: &str = "ARR";
pub const REVENUE: &str = "Revenue";
pub const COGS: &str = "COGS";
pub const SALES_AND_MARKETING: &str = "Sales & Marketing";
pub const RESEARCH_AND_DEVELOPMENT: &str = "R&D";
pub const GENERAL_AND_ADMIN: &str = "G&A";
pub const OPEX: &str = "OpEx";
pub const EBITDA: &str = "EBITDA";
pub const EBITDA_MARGIN: &str = "EBITDA Margin";
pub const GROSS_MARGIN: &str = "Gross Margin %";
pub const YOY_GROWTH: &str = "YoY Growth";
pub const RULE_OF_40: &str = "Rule of 40";
pub const CAC: &str = "CAC";
pub const LTV: &str = "LTV";
pub const CHURN_RATE: &str = "Churn Rate";
pub const NRR: &str = "NRR %";
pub const GRR: &str = "GRR %";
pub const MAGIC_NUMBER: &str = "Magic Number";

pub const CURRENCY_METRICS: &[&str] = &[
    MRR,
    ARR,
    REVENUE,
    COGS,
    SALES_AND_MARKETING,
    RESEARCH_AND_DEVELOPMENT,
    GENERAL_AND_ADMIN,
    OPEX,
    EBITDA,
    CAC,
    LTV,
];

pub const PERCENT_METRICS: &[&str] = &[
    GROSS_MARGIN,
    EBITDA_MARGIN,
    NRR,
    GRR,
    MAGIC_NUMBER,
    RULE_OF_40,
    YOY_GROWTH,
    CHURN_RATE,
];

/// Costs and churn: a negative variance against budget is good news.
pub const LOWER_IS_BETTER: &[&str] = &[
    COGS,
    OPEX,
    SALES_AND_MARKETING,
    RESEARCH_AND_DEVELOPMENT,
    GENERAL_AND_ADMIN,
    CAC,
    CHURN_RATE,
];

/// Shown in place of a missing value.
pub const PLACEHOLDER: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Currency,
    Percent,
    Number,
}

impl MetricKind {
    /// Percent takes precedence over currency; unknown metrics are plain numbers.
    pub fn of(metric: &str) -> Self {
        if PERCENT_METRICS.contains(&metric) {
            MetricKind::Percent
        } else if CURRENCY_METRICS.contains(&metric) {
            MetricKind::Currency
        } else {
            MetricKind::Number
        }
    }

    pub fn format(self, value: Option<f64>) -> String {
        match self {
            MetricKind::Currency => format_currency(value),
            MetricKind::Percent => format_percent(value),
            MetricKind::Number => format_number(value),
        }
    }
}

pub fn is_lower_better(metric: &str) -> bool {
    LOWER_IS_BETTER.contains(&metric)
}

/// Whether a variance (`actual - budget`) is good news for `metric`.
pub fn is_favorable(metric: &str, delta: f64) -> bool {
    if is_lower_better(metric) {
        delta <= 0.0
    } else {
        delta >= 0.0
    }
}

/// Formats a metric value according to its [`MetricKind`].
pub fn format_metric(metric: &str, value: Option<f64>) -> String {
    MetricKind::of(metric).format(value)
}

/// Whole US dollars with thousands separators: `$1,234`, `-$56`.
pub fn format_currency(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return PLACEHOLDER.to_string();
    };

    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!(
        "{}${}",
        sign,
        group_thousands(&format!("{:.0}", rounded.abs()))
    )
}

/// Ratio rendered as a percentage with one decimal: `0.256` -> `25.6%`.
pub fn format_percent(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        // `+ 0.0` folds negative zero into zero.
        Some(value) => format!("{:.1}%", value * 100.0 + 0.0),
        None => PLACEHOLDER.to_string(),
    }
}

/// Grouped number with up to three decimals, trailing zeros dropped.
pub fn format_number(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return PLACEHOLDER.to_string();
    };

    let fixed = format!("{:.3}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut out = String::new();
    if value < 0.0 && (integer != "0" || !fraction.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_thousands(integer));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
