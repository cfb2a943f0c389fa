use crate::metrics::{
    ARR, COGS, EBITDA, EBITDA_MARGIN, GENERAL_AND_ADMIN, GROSS_MARGIN, MRR, OPEX,
    RESEARCH_AND_DEVELOPMENT, REVENUE, RULE_OF_40, SALES_AND_MARKETING, YOY_GROWTH,
};
use crate::schema::{metric_value, MetricView};

/// Metrics that can be computed from other fields of the same view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedMetric {
    /// Sales & Marketing + R&D + G&A
    OpEx,
    /// Revenue - COGS - OpEx
    Ebitda,
    /// EBITDA / Revenue
    EbitdaMargin,
    /// 1 - COGS / Revenue
    GrossMargin,
    /// ARR / 12
    Mrr,
    /// MRR * 12
    Arr,
    /// YoY Growth + EBITDA Margin
    RuleOf40,
}

impl DerivedMetric {
    /// Evaluation order. Later rules may consume the output of earlier ones.
    pub const ALL: [DerivedMetric; 7] = [
        DerivedMetric::OpEx,
        DerivedMetric::Ebitda,
        DerivedMetric::EbitdaMargin,
        DerivedMetric::GrossMargin,
        DerivedMetric::Mrr,
        DerivedMetric::Arr,
        DerivedMetric::RuleOf40,
    ];

    pub fn target(self) -> &'static str {
        match self {
            DerivedMetric::OpEx => OPEX,
            DerivedMetric::Ebitda => EBITDA,
            DerivedMetric::EbitdaMargin => EBITDA_MARGIN,
            DerivedMetric::GrossMargin => GROSS_MARGIN,
            DerivedMetric::Mrr => MRR,
            DerivedMetric::Arr => ARR,
            DerivedMetric::RuleOf40 => RULE_OF_40,
        }
    }

    /// MRR and ARR only appear when they can actually be computed; the other
    /// targets are always emitted, as null when undefined.
    fn records_null(self) -> bool {
        !matches!(self, DerivedMetric::Mrr | DerivedMetric::Arr)
    }

    fn compute(self, view: &MetricView) -> Option<f64> {
        let get = |metric: &str| metric_value(view, metric);
        let or_zero = |metric: &str| get(metric).unwrap_or(0.0);

        match self {
            DerivedMetric::OpEx => Some(
                or_zero(SALES_AND_MARKETING)
                    + or_zero(RESEARCH_AND_DEVELOPMENT)
                    + or_zero(GENERAL_AND_ADMIN),
            ),
            DerivedMetric::Ebitda => Some(or_zero(REVENUE) - or_zero(COGS) - or_zero(OPEX)),
            DerivedMetric::EbitdaMargin => ratio(get(EBITDA), get(REVENUE)),
            DerivedMetric::GrossMargin => {
                ratio(Some(or_zero(COGS)), get(REVENUE)).map(|cost_share| 1.0 - cost_share)
            }
            DerivedMetric::Mrr => get(ARR).map(|arr| arr / 12.0),
            DerivedMetric::Arr => get(MRR).map(|mrr| mrr * 12.0),
            DerivedMetric::RuleOf40 => match (get(YOY_GROWTH), get(EBITDA_MARGIN)) {
                (Some(growth), Some(margin)) => Some(growth + margin),
                _ => None,
            },
        }
    }
}

/// `numerator / denominator`, or `None` when either side is missing or the
/// denominator is zero.
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d).filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Fills every [`DerivedMetric`] whose target the view does not already
/// contain. Keys present in the input, explicit nulls included, are returned
/// untouched.
pub fn derive_metrics(view: &MetricView) -> MetricView {
    let mut derived = view.clone();

    for rule in DerivedMetric::ALL {
        if derived.contains_key(rule.target()) {
            continue;
        }

        let value = rule.compute(&derived);
        if value.is_some() || rule.records_null() {
            derived.insert(rule.target().to_string(), value);
        }
    }

    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(entries: &[(&str, Option<f64>)]) -> MetricView {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("expected a value");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_pnl_derivations() {
        let derived = derive_metrics(&view(&[
            (REVENUE, Some(1000.0)),
            (COGS, Some(250.0)),
            (SALES_AND_MARKETING, Some(300.0)),
            (RESEARCH_AND_DEVELOPMENT, Some(150.0)),
        ]));

        assert_close(derived[OPEX], 450.0);
        assert_close(derived[EBITDA], 300.0);
        assert_close(derived[EBITDA_MARGIN], 0.3);
        assert_close(derived[GROSS_MARGIN], 0.75);
        assert_eq!(derived[RULE_OF_40], None);
        assert!(!derived.contains_key(MRR));
        assert!(!derived.contains_key(ARR));
    }

    #[test]
    fn test_explicit_values_are_never_overwritten() {
        let derived = derive_metrics(&view(&[
            (REVENUE, Some(1000.0)),
            (COGS, Some(900.0)),
            (OPEX, Some(50.0)),
            (EBITDA, Some(12345.0)),
        ]));

        assert_eq!(derived[OPEX], Some(50.0));
        assert_eq!(derived[EBITDA], Some(12345.0));
        assert_close(derived[EBITDA_MARGIN], 12.345);
    }

    #[test]
    fn test_division_by_missing_or_zero_revenue() {
        let derived = derive_metrics(&view(&[(REVENUE, None), (COGS, Some(5.0))]));
        assert_eq!(derived[GROSS_MARGIN], None);
        assert_eq!(derived[EBITDA_MARGIN], None);
        assert_close(derived[EBITDA], -5.0);

        let derived = derive_metrics(&view(&[(REVENUE, Some(0.0)), (COGS, Some(5.0))]));
        assert_eq!(derived[GROSS_MARGIN], None);
        assert_eq!(derived[EBITDA_MARGIN], None);
    }

    #[test]
    fn test_recurring_revenue_round_trip() {
        let from_arr = derive_metrics(&view(&[(ARR, Some(1200.0))]));
        assert_close(from_arr[MRR], 100.0);
        assert_close(from_arr[ARR], 1200.0);

        let from_mrr = derive_metrics(&view(&[(MRR, Some(50.0))]));
        assert_close(from_mrr[ARR], 600.0);

        let both = derive_metrics(&view(&[(MRR, Some(10.0)), (ARR, Some(999.0))]));
        assert_eq!(both[MRR], Some(10.0));
        assert_eq!(both[ARR], Some(999.0));
    }

    #[test]
    fn test_rule_of_40_needs_growth_and_margin() {
        let derived = derive_metrics(&view(&[
            (REVENUE, Some(100.0)),
            (COGS, Some(20.0)),
            (YOY_GROWTH, Some(0.35)),
        ]));
        assert_close(derived[RULE_OF_40], 0.35 + 0.8);

        let no_revenue = derive_metrics(&view(&[(YOY_GROWTH, Some(0.35))]));
        assert_eq!(no_revenue[RULE_OF_40], None);
    }

    #[test]
    fn test_present_null_targets_are_kept() {
        let derived = derive_metrics(&view(&[
            (REVENUE, Some(100.0)),
            (COGS, Some(40.0)),
            (SALES_AND_MARKETING, Some(10.0)),
            (OPEX, None),
            (EBITDA, None),
        ]));

        assert_eq!(derived[OPEX], None);
        assert_eq!(derived[EBITDA], None);
        assert_eq!(derived[EBITDA_MARGIN], None);
        assert_close(derived[GROSS_MARGIN], 0.6);
        assert_eq!(derived[RULE_OF_40], None);
    }

    #[test]
    fn test_null_mrr_blocks_arr() {
        let derived = derive_metrics(&view(&[(MRR, None)]));
        assert_eq!(derived[MRR], None);
        assert!(!derived.contains_key(ARR));
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let inputs = [
            view(&[]),
            view(&[(REVENUE, Some(100.0)), (COGS, Some(40.0))]),
            view(&[(REVENUE, None), (COGS, Some(5.0))]),
            view(&[(ARR, Some(1200.0)), (YOY_GROWTH, Some(0.5))]),
            view(&[
                (REVENUE, Some(0.0)),
                (EBITDA, Some(-20.0)),
                (MRR, Some(3.0)),
                (GENERAL_AND_ADMIN, Some(7.0)),
            ]),
        ];

        for input in inputs {
            let once = derive_metrics(&input);
            let twice = derive_metrics(&once);
            assert_eq!(once, twice);
        }
    }
}
