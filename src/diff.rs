//! Scenario diff engine.
//!
//! Computes per-activity differences between two override maps and rolls them
//! up by catalog category or layer. Missing sides are reported as `null`
//! totals but count as zero in arithmetic.
use crate::canonical::CanonicalEncoder;
use crate::catalog::Catalog;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Totals closer than this are considered unchanged.
pub const CHANGE_EPSILON: f64 = 1e-9;

/// Bucket for activities the catalog cannot resolve.
pub const OTHER_GROUP: &str = "Other";

/// One row of comparison between base and compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDelta {
    pub activity_id: String,
    /// `total_compare - total_base`, with a missing side counted as zero.
    pub delta: f64,
    /// `None` when the activity does not exist on the base side.
    pub total_base: Option<f64>,
    /// `None` when the activity was removed on the compare side.
    pub total_compare: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDiff {
    pub changed: Vec<ActivityDelta>,
    pub added: Vec<ActivityDelta>,
    pub removed: Vec<ActivityDelta>,
}

impl ScenarioDiff {
    pub fn len(&self) -> usize {
        self.changed.len() + self.added.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rows in `changed`, `added`, `removed` order.
    pub fn rows(&self) -> impl Iterator<Item = &ActivityDelta> {
        self.changed
            .iter()
            .chain(self.added.iter())
            .chain(self.removed.iter())
    }
}

/// Grouping key for category aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Category,
    Layer,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Category => "category",
            GroupBy::Layer => "layer",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-group rollup of a diff.
///
/// `delta_pct` is `+inf`/`-inf` when the group had no base total and a
/// non-zero delta; those serialize as the strings `"Infinity"`/`"-Infinity"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAggregate {
    pub key: String,
    pub label: String,
    pub delta: f64,
    #[serde(serialize_with = "serialize_pct")]
    pub delta_pct: f64,
    pub total_base: f64,
    pub total_compare: f64,
}

/// An activity delta resolved to its catalog label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelledDelta {
    pub activity_id: String,
    pub label: String,
    pub delta: f64,
    pub total_base: Option<f64>,
    pub total_compare: Option<f64>,
}

/// Classify every activity id present on either side.
pub fn compute_diff(base: &BTreeMap<String, f64>, compare: &BTreeMap<String, f64>) -> ScenarioDiff {
    let ids: BTreeSet<&String> = base.keys().chain(compare.keys()).collect();
    let mut diff = ScenarioDiff::default();
    for id in ids {
        match (base.get(id).copied(), compare.get(id).copied()) {
            (Some(before), Some(after)) => {
                if (after - before).abs() > CHANGE_EPSILON {
                    diff.changed.push(ActivityDelta {
                        activity_id: id.clone(),
                        delta: after - before,
                        total_base: Some(before),
                        total_compare: Some(after),
                    });
                }
            }
            (None, Some(after)) => diff.added.push(ActivityDelta {
                activity_id: id.clone(),
                delta: after,
                total_base: None,
                total_compare: Some(after),
            }),
            (Some(before), None) => diff.removed.push(ActivityDelta {
                activity_id: id.clone(),
                delta: -before,
                total_base: Some(before),
                total_compare: None,
            }),
            (None, None) => {}
        }
    }
    tracing::debug!(
        changed = diff.changed.len(),
        added = diff.added.len(),
        removed = diff.removed.len(),
        "scenario diff computed"
    );
    diff
}

#[derive(Default)]
struct GroupTotals {
    delta: f64,
    total_base: f64,
    total_compare: f64,
}

/// Roll a diff up by category or layer, largest absolute swings first.
pub fn aggregate_by_category(
    diff: &ScenarioDiff,
    group_by: GroupBy,
    catalog: &Catalog,
    encoder: &CanonicalEncoder,
) -> Vec<CategoryAggregate> {
    let mut groups: BTreeMap<String, GroupTotals> = BTreeMap::new();
    for row in diff.rows() {
        let key = catalog
            .activity(&row.activity_id)
            .map(|activity| match group_by {
                GroupBy::Category => activity.category.as_str(),
                GroupBy::Layer => activity.layer_id.as_str(),
            })
            .filter(|key| !key.trim().is_empty())
            .unwrap_or(OTHER_GROUP);
        let totals = groups.entry(key.to_string()).or_default();
        totals.delta += row.delta;
        totals.total_base += row.total_base.unwrap_or(0.0);
        totals.total_compare += row.total_compare.unwrap_or(0.0);
    }

    let mut rows: Vec<CategoryAggregate> = groups
        .into_iter()
        .map(|(key, totals)| {
            let delta = encoder.round(totals.delta);
            let total_base = encoder.round(totals.total_base);
            CategoryAggregate {
                label: humanize(&key),
                key,
                delta,
                delta_pct: delta_pct(delta, total_base, encoder),
                total_base,
                total_compare: encoder.round(totals.total_compare),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.delta
            .abs()
            .total_cmp(&a.delta.abs())
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}

/// Flatten a diff into labelled rows, largest absolute swings first.
pub fn list_activity_deltas(
    diff: &ScenarioDiff,
    catalog: &Catalog,
    encoder: &CanonicalEncoder,
) -> Vec<LabelledDelta> {
    let mut rows: Vec<LabelledDelta> = diff
        .rows()
        .map(|row| LabelledDelta {
            activity_id: row.activity_id.clone(),
            label: catalog
                .activity(&row.activity_id)
                .map(|activity| activity.label.clone())
                .unwrap_or_else(|| row.activity_id.clone()),
            delta: encoder.round(row.delta),
            total_base: row.total_base.map(|value| encoder.round(value)),
            total_compare: row.total_compare.map(|value| encoder.round(value)),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.delta
            .abs()
            .total_cmp(&a.delta.abs())
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.activity_id.cmp(&b.activity_id))
    });
    rows
}

/// Percentage change with the zero-base sentinel policy.
///
/// A zero base yields `+inf`, `-inf`, or `0` by the sign of `delta`.
pub fn delta_pct(delta: f64, total_base: f64, encoder: &CanonicalEncoder) -> f64 {
    if total_base == 0.0 {
        if delta > 0.0 {
            f64::INFINITY
        } else if delta < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        }
    } else {
        encoder.round(delta / total_base)
    }
}

/// Turn `snake_case` identifiers into Title Case labels.
pub fn humanize(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn serialize_pct<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_nan() {
        serializer.serialize_none()
    } else if *value == f64::INFINITY {
        serializer.serialize_str("Infinity")
    } else if *value == f64::NEG_INFINITY {
        serializer.serialize_str("-Infinity")
    } else {
        serializer.serialize_f64(*value)
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
