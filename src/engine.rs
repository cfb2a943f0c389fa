use crate::derivation::derive_metrics;
use crate::error::{ReconcileError, Result};
use crate::schema::*;
use crate::utils::{parse_number, resolve_period};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// A row whose period label could not be read as a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodIssue {
    pub side: Side,
    /// Zero-based position of the row in its feed.
    pub row: usize,
    pub label: String,
}

/// A row that replaced an earlier row with the same period key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicatePeriod {
    pub side: Side,
    pub key: PeriodKey,
    pub replaced_row: usize,
    pub winning_row: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileDiagnostics {
    /// Labels that were kept verbatim as their own period key.
    pub fallback_periods: Vec<PeriodIssue>,
    /// Rows with no usable period cell at all.
    pub missing_periods: Vec<PeriodIssue>,
    pub duplicate_periods: Vec<DuplicatePeriod>,
}

impl ReconcileDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.fallback_periods.is_empty()
            && self.missing_periods.is_empty()
            && self.duplicate_periods.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub records: Vec<NormalizedRecord>,
    pub diagnostics: ReconcileDiagnostics,
}

static NULL_CELL: RawCell = RawCell::Null;

// A feed row with its period resolved and its columns tagged, keyed by the
// original column name so the other feed can be looked up under the same name.
struct KeyedRow<'a> {
    index: usize,
    key: PeriodKey,
    columns: BTreeMap<&'a str, (ColumnKey, &'a RawCell)>,
}

impl<'a> KeyedRow<'a> {
    /// `None` when the column is absent or blank, `Some(None)` when the cell
    /// holds something that is not a number.
    fn value(&self, column: &str) -> Option<Option<f64>> {
        self.columns
            .get(column)
            .filter(|(_, cell)| !cell.is_blank())
            .map(|(_, cell)| parse_number(cell))
    }
}

// Internal struct to accumulate one period's raw fields before derivation
#[derive(Default)]
struct PeriodSlot {
    actual: MetricView,
    budget: MetricView,
}

impl PeriodSlot {
    fn side_mut(&mut self, side: Side) -> &mut MetricView {
        match side {
            Side::Actual => &mut self.actual,
            Side::Budget => &mut self.budget,
        }
    }

    fn set(&mut self, base: &str, side: Side, value: Option<Option<f64>>) {
        if let Some(value) = value {
            self.side_mut(side).insert(base.to_string(), value);
        }
    }

    /// Derives computed metrics for each side that carries any raw field. A side
    /// with no raw fields stays empty rather than gaining zero-valued totals.
    fn into_record(self, month: PeriodKey) -> NormalizedRecord {
        let finish = |view: MetricView| {
            if view.is_empty() {
                view
            } else {
                derive_metrics(&view)
            }
        };

        NormalizedRecord {
            month,
            actual: finish(self.actual),
            budget: finish(self.budget),
        }
    }
}

#[derive(Default)]
pub struct Reconciler {
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Merges both feeds into one record per period. Never fails: unparsable
    /// period labels fall back to their literal text regardless of policy.
    pub fn merge(&self, actual_rows: &[RawRow], budget_rows: &[RawRow]) -> Vec<NormalizedRecord> {
        self.run(actual_rows, budget_rows).records
    }

    /// Merges both feeds, honouring the configured [`PeriodPolicy`] and
    /// reporting what was degraded along the way.
    pub fn reconcile(&self, actual_rows: &[RawRow], budget_rows: &[RawRow]) -> Result<Reconciliation> {
        let reconciliation = self.run(actual_rows, budget_rows);

        if self.config.period_policy == PeriodPolicy::Strict {
            let diagnostics = &reconciliation.diagnostics;
            if let Some(issue) = diagnostics
                .missing_periods
                .iter()
                .chain(&diagnostics.fallback_periods)
                .min_by_key(|issue| (issue.side, issue.row))
            {
                return Err(ReconcileError::UnparsablePeriod {
                    side: issue.side,
                    row: issue.row,
                    label: issue.label.clone(),
                });
            }
        }

        Ok(reconciliation)
    }

    fn run(&self, actual_rows: &[RawRow], budget_rows: &[RawRow]) -> Reconciliation {
        let mut diagnostics = ReconcileDiagnostics::default();

        let actual_keyed = self.key_rows(Side::Actual, actual_rows, &mut diagnostics);
        let budget_keyed = self.key_rows(Side::Budget, budget_rows, &mut diagnostics);

        // 1. Index actuals by period, last row wins
        let mut actual_index: BTreeMap<PeriodKey, KeyedRow> = BTreeMap::new();
        for row in actual_keyed {
            let (key, index) = (row.key.clone(), row.index);
            if let Some(replaced) = actual_index.insert(key.clone(), row) {
                record_duplicate(&mut diagnostics, Side::Actual, key, replaced.index, index);
            }
        }

        // 2. Budget-driven periods, cross-filled from the matching actual row
        let mut periods: BTreeMap<PeriodKey, (usize, PeriodSlot)> = BTreeMap::new();
        for row in &budget_keyed {
            let slot = collect_fields(actual_index.get(&row.key), Some(row));
            if let Some((replaced, _)) = periods.insert(row.key.clone(), (row.index, slot)) {
                record_duplicate(
                    &mut diagnostics,
                    Side::Budget,
                    row.key.clone(),
                    replaced,
                    row.index,
                );
            }
        }

        // 3. Actual-only periods
        let mut actual_only = 0;
        for (key, row) in &actual_index {
            if !periods.contains_key(key) {
                periods.insert(key.clone(), (row.index, collect_fields(Some(row), None)));
                actual_only += 1;
            }
        }

        // 4. BTreeMap iteration yields keys in ascending lexicographic order
        let records: Vec<NormalizedRecord> = periods
            .into_iter()
            .map(|(key, (_, slot))| slot.into_record(key))
            .collect();

        info!(
            "Reconciled {} actual rows and {} budget rows into {} periods",
            actual_rows.len(),
            budget_rows.len(),
            records.len()
        );
        debug!(
            "{} periods had no budget row; {} fallback period labels; {} duplicate periods",
            actual_only,
            diagnostics.fallback_periods.len(),
            diagnostics.duplicate_periods.len()
        );

        Reconciliation {
            records,
            diagnostics,
        }
    }

    fn key_rows<'a>(
        &self,
        side: Side,
        rows: &'a [RawRow],
        diagnostics: &mut ReconcileDiagnostics,
    ) -> Vec<KeyedRow<'a>> {
        let period_column = self.config.period_column.as_str();

        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let cell = row.get(period_column).unwrap_or(&NULL_CELL);
                let (key, parsed) = resolve_period(cell);

                if cell.is_blank() {
                    warn!("{} row #{} has no '{}' value", side, index, period_column);
                    diagnostics.missing_periods.push(PeriodIssue {
                        side,
                        row: index,
                        label: String::new(),
                    });
                } else if !parsed {
                    warn!(
                        "{} row #{}: period '{}' is not a recognizable date, using it verbatim",
                        side, index, key
                    );
                    diagnostics.fallback_periods.push(PeriodIssue {
                        side,
                        row: index,
                        label: key.as_str().to_string(),
                    });
                }

                let columns = row
                    .iter()
                    .filter(|(name, _)| name.as_str() != period_column)
                    .map(|(name, cell)| (name.as_str(), (ColumnKey::parse(name), cell)))
                    .collect();

                KeyedRow {
                    index,
                    key,
                    columns,
                }
            })
            .collect()
    }
}

fn record_duplicate(
    diagnostics: &mut ReconcileDiagnostics,
    side: Side,
    key: PeriodKey,
    replaced_row: usize,
    winning_row: usize,
) {
    debug!(
        "{} period '{}': row #{} replaces row #{}",
        side, key, winning_row, replaced_row
    );
    diagnostics.duplicate_periods.push(DuplicatePeriod {
        side,
        key,
        replaced_row,
        winning_row,
    });
}

/// Builds the field set of one period from its actual and budget rows.
///
/// Bare columns are split by the feed they came from. Blank cells contribute
/// nothing, while non-numeric text becomes a null field that derivation will
/// not overwrite. Suffixed columns prefer their own side and fall back to the
/// other feed under the same column name when that side's cell is blank;
/// a budget-suffixed column is only honoured when the period has a budget row.
/// Suffixed columns are applied after bare ones, so `Revenue_Actual` beats a
/// bare `Revenue` in the actuals feed.
fn collect_fields(actual: Option<&KeyedRow>, budget: Option<&KeyedRow>) -> PeriodSlot {
    let mut slot = PeriodSlot::default();

    let columns: BTreeMap<&str, &ColumnKey> = actual
        .into_iter()
        .chain(budget)
        .flat_map(|row| row.columns.iter().map(|(name, (key, _))| (*name, key)))
        .collect();

    let (bare, suffixed): (Vec<_>, Vec<_>) = columns
        .into_iter()
        .partition(|(_, key)| key.tag == ColumnTag::Bare);

    for (name, key) in bare {
        slot.set(&key.base, Side::Actual, value_in(actual, name));
        slot.set(&key.base, Side::Budget, value_in(budget, name));
    }

    for (name, key) in suffixed {
        match key.tag {
            ColumnTag::Suffixed(Side::Actual) => {
                let value = value_in(actual, name).or_else(|| value_in(budget, name));
                slot.set(&key.base, Side::Actual, value);
            }
            ColumnTag::Suffixed(Side::Budget) if budget.is_some() => {
                let value = value_in(budget, name).or_else(|| value_in(actual, name));
                slot.set(&key.base, Side::Budget, value);
            }
            _ => {}
        }
    }

    slot
}

fn value_in(row: Option<&KeyedRow>, column: &str) -> Option<Option<f64>> {
    row.and_then(|r| r.value(column))
}

/// Merges actual and budget rows with the default configuration (`Month`
/// period column, fallback period keys).
pub fn merge(actual_rows: &[RawRow], budget_rows: &[RawRow]) -> Vec<NormalizedRecord> {
    Reconciler::default().merge(actual_rows, budget_rows)
}
