use crate::error::{ReconcileError, Result};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of the period field in every serialized [`NormalizedRecord`].
pub const PERIOD_FIELD: &str = "Month";

/// A single cell as handed over by the CSV layer, before numeric coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawCell {
    Number(f64),
    Text(String),
    Null,
}

impl RawCell {
    /// Null cells and whitespace-only text both count as "no value".
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Null => true,
            RawCell::Text(text) => text.trim().is_empty(),
            RawCell::Number(_) => false,
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        RawCell::Text(value.to_string())
    }
}

impl From<String> for RawCell {
    fn from(value: String) -> Self {
        RawCell::Text(value)
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

impl<T: Into<RawCell>> From<Option<T>> for RawCell {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawCell::Null, Into::into)
    }
}

pub type RawRow = BTreeMap<String, RawCell>;

/// Builds a [`RawRow`] from `(column, cell)` pairs.
pub fn raw_row<I, K, V>(cells: I) -> RawRow
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<RawCell>,
{
    cells
        .into_iter()
        .map(|(column, cell)| (column.into(), cell.into()))
        .collect()
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum Side {
    #[schemars(description = "Realized, measured value for a period")]
    Actual,

    #[schemars(description = "Planned or target value for a period")]
    Budget,
}

impl Side {
    pub fn suffix(self) -> &'static str {
        match self {
            Side::Actual => "_Actual",
            Side::Budget => "_Budget",
        }
    }

    /// Output field name for `metric` on this side, e.g. `Revenue_Actual`.
    pub fn field_name(self, metric: &str) -> String {
        format!("{}{}", metric, self.suffix())
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Actual => write!(f, "actual"),
            Side::Budget => write!(f, "budget"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnTag {
    /// No side suffix: the side is implied by the feed the column came from.
    Bare,
    Suffixed(Side),
}

/// A raw column name split into its metric base and side tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnKey {
    pub base: String,
    pub tag: ColumnTag,
}

impl ColumnKey {
    /// Suffix matching is ASCII case-insensitive; the suffix alone is not a
    /// suffixed column.
    pub fn parse(name: &str) -> Self {
        for side in [Side::Actual, Side::Budget] {
            if let Some(base) = strip_suffix_ignore_case(name, side.suffix()) {
                return Self {
                    base: base.to_string(),
                    tag: ColumnTag::Suffixed(side),
                };
            }
        }

        Self {
            base: name.to_string(),
            tag: ColumnTag::Bare,
        }
    }
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    let base = name.get(..split)?;
    let tail = name.get(split..)?;

    (!base.is_empty() && tail.eq_ignore_ascii_case(suffix)).then_some(base)
}

/// Canonical reporting period. Parsed labels become `YYYY-MM`; anything else is
/// kept verbatim, so ordering is only meaningful between parsed keys.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct PeriodKey(String);

impl PeriodKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(format!("{:04}-{:02}", date.year(), date.month()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PeriodKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One side of one period: metric base name to coerced value. A key holding
/// `None` was computed but has no defined value (e.g. a margin on zero revenue).
pub type MetricView = BTreeMap<String, Option<f64>>;

/// Looks up a metric, treating a missing key and an explicit null alike.
pub fn metric_value(view: &MetricView, metric: &str) -> Option<f64> {
    view.get(metric).copied().flatten()
}

/// One output row of the reconciliation: a period with its actual and budget
/// views. Serializes flat as `{"Month": .., "<metric>_Actual": .., "<metric>_Budget": ..}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    pub month: PeriodKey,
    pub actual: MetricView,
    pub budget: MetricView,
}

impl NormalizedRecord {
    pub fn new(month: PeriodKey) -> Self {
        Self {
            month,
            ..Self::default()
        }
    }

    pub fn view(&self, side: Side) -> &MetricView {
        match side {
            Side::Actual => &self.actual,
            Side::Budget => &self.budget,
        }
    }

    pub fn get(&self, metric: &str, side: Side) -> Option<f64> {
        metric_value(self.view(side), metric)
    }

    /// True when the record carries the `<metric>_<side>` field, even if null.
    pub fn has_field(&self, metric: &str, side: Side) -> bool {
        self.view(side).contains_key(metric)
    }

    /// Metric base names present on either side.
    pub fn metric_names(&self) -> BTreeSet<&str> {
        self.actual
            .keys()
            .chain(self.budget.keys())
            .map(String::as_str)
            .collect()
    }

    /// Flattened `(field name, value)` pairs, grouped by metric, actual before budget.
    pub fn fields(&self) -> Vec<(String, Option<f64>)> {
        let mut fields = Vec::new();
        for metric in self.metric_names() {
            for side in [Side::Actual, Side::Budget] {
                if let Some(value) = self.view(side).get(metric) {
                    fields.push((side.field_name(metric), *value));
                }
            }
        }
        fields
    }
}

impl Serialize for NormalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = self.fields();
        let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
        map.serialize_entry(PERIOD_FIELD, &self.month)?;
        for (name, value) in &fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum PeriodPolicy {
    #[default]
    #[schemars(
        description = "Unparsable period labels are kept verbatim as their own period key and reported as diagnostics. Such keys may sort out of calendar order."
    )]
    Fallback,

    #[schemars(
        description = "Any unparsable or missing period label aborts reconciliation with an error."
    )]
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReconcilerConfig {
    #[schemars(
        description = "Name of the column holding the period label in both feeds (e.g. 'Month'). Values like '2024-03-15', 'March 2024' or '03/15/2024' are normalized to 'YYYY-MM'."
    )]
    pub period_column: String,

    #[schemars(description = "What to do with period labels that cannot be read as a date")]
    pub period_policy: PeriodPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            period_column: PERIOD_FIELD.to_string(),
            period_policy: PeriodPolicy::Fallback,
        }
    }
}

impl ReconcilerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.period_column.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "period_column must not be empty".to_string(),
            ));
        }

        if let ColumnTag::Suffixed(side) = ColumnKey::parse(&self.period_column).tag {
            return Err(ReconcileError::InvalidConfig(format!(
                "period_column '{}' must not carry the {} suffix",
                self.period_column,
                side.suffix()
            )));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReconcilerConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
