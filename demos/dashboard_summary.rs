use saas_metrics_reconciler::metrics::{CAC, EBITDA, GROSS_MARGIN, MRR, REVENUE};
use saas_metrics_reconciler::{
    metric_series, period_labels, reconcile_files, DashboardReport, ReconcilerConfig, Side,
};
use std::path::Path;

fn main() -> anyhow::Result<()> {
    let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/data");
    let reconciliation = reconcile_files(
        data.join("actuals.csv"),
        data.join("budget.csv"),
        ReconcilerConfig::default(),
    )?;

    let records = &reconciliation.records;
    println!("Reconciled {} periods", records.len());
    if !reconciliation.diagnostics.is_clean() {
        println!("Diagnostics: {:#?}", reconciliation.diagnostics);
    }

    let report = DashboardReport::build(records);

    println!("\nHeadline KPIs (latest period):");
    for card in &report.kpis {
        let status = match card.favorable {
            Some(true) => "on track",
            Some(false) => "behind plan",
            None => "no comparison",
        };
        println!(" - {:<16} {:>12}  ({})", card.name, card.formatted_actual(), status);
    }

    println!("\nVariance vs budget:");
    print!("{}", report.variance_markdown(&[REVENUE, GROSS_MARGIN, EBITDA, CAC]));

    println!("\nMRR chart:");
    let actual = metric_series(records, MRR, Side::Actual);
    let budget = metric_series(records, MRR, Side::Budget);
    for ((label, actual), budget) in period_labels(records).iter().zip(actual).zip(budget) {
        println!(" {}  actual={:?}  budget={:?}", label, actual, budget);
    }

    println!("\nFirst record as JSON:");
    if let Some(first) = records.first() {
        println!("{}", serde_json::to_string_pretty(first)?);
    }

    Ok(())
}
