use super::*;
use crate::catalog::sample_catalog;

fn overrides(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(id, value)| (id.to_string(), *value))
        .collect()
}

fn encoder() -> CanonicalEncoder {
    CanonicalEncoder::default()
}

#[test]
fn test_added_and_removed_activities() {
    let base = overrides(&[("ACT.ONE", 5.0), ("ACT.TWO", 2.0)]);
    let compare = overrides(&[("ACT.ONE", 5.0), ("ACT.THREE", 2.0)]);

    let diff = compute_diff(&base, &compare);

    assert!(diff.changed.is_empty());
    assert_eq!(
        diff.removed,
        vec![ActivityDelta {
            activity_id: "ACT.TWO".to_string(),
            delta: -2.0,
            total_base: Some(2.0),
            total_compare: None,
        }]
    );
    assert_eq!(
        diff.added,
        vec![ActivityDelta {
            activity_id: "ACT.THREE".to_string(),
            delta: 2.0,
            total_base: None,
            total_compare: Some(2.0),
        }]
    );
}

#[test]
fn test_missing_totals_serialize_as_null() {
    let diff = compute_diff(&overrides(&[]), &overrides(&[("ACT.ONE", 1.5)]));
    let json = serde_json::to_value(&diff).expect("serialize diff");
    assert!(json["added"][0]["total_base"].is_null());
    assert_eq!(json["added"][0]["total_compare"], 1.5);
}

#[test]
fn test_changed_requires_difference_beyond_epsilon() {
    let base = overrides(&[("ACT.ONE", 1.0), ("ACT.TWO", 3.0)]);
    let compare = overrides(&[("ACT.ONE", 1.0 + 1e-12), ("ACT.TWO", 4.5)]);

    let diff = compute_diff(&base, &compare);

    assert_eq!(diff.changed.len(), 1);
    assert_eq!(diff.changed[0].activity_id, "ACT.TWO");
    assert_eq!(diff.changed[0].delta, 1.5);
    assert_eq!(diff.len(), 1);
}

#[test]
fn test_every_id_lands_in_exactly_one_bucket() {
    let base = overrides(&[("A", 1.0), ("B", 2.0), ("C", 3.0), ("D", 0.0)]);
    let compare = overrides(&[("B", 2.0), ("C", 4.0), ("E", 5.0), ("F", 0.0)]);

    let diff = compute_diff(&base, &compare);

    let added: Vec<&str> = diff.added.iter().map(|d| d.activity_id.as_str()).collect();
    let removed: Vec<&str> = diff.removed.iter().map(|d| d.activity_id.as_str()).collect();
    let changed: Vec<&str> = diff.changed.iter().map(|d| d.activity_id.as_str()).collect();
    assert_eq!(added, vec!["E", "F"]);
    assert_eq!(removed, vec!["A", "D"]);
    assert_eq!(changed, vec!["C"]);
}

#[test]
fn test_identical_sides_produce_empty_diff() {
    let side = overrides(&[("ACT.ONE", 5.0)]);
    assert!(compute_diff(&side, &side).is_empty());
}

#[test]
fn test_aggregate_groups_by_category_and_conserves_delta() {
    let base = overrides(&[("ACT.ONE", 10.0), ("ACT.TWO", 4.0), ("ACT.THREE", 2.0)]);
    let compare = overrides(&[
        ("ACT.ONE", 7.5),
        ("ACT.THREE", 3.25),
        ("ACT.FIVE", 1.0),
        ("ACT.UNKNOWN", 0.5),
    ]);
    let diff = compute_diff(&base, &compare);
    let catalog = sample_catalog();

    let rows = aggregate_by_category(&diff, GroupBy::Category, &catalog, &encoder());

    let keys: Vec<&str> = rows.iter().map(|row| row.key.as_str()).collect();
    assert_eq!(keys, vec!["home_energy", "transport", "food_and_diet", "Other"]);

    let home = &rows[0];
    assert_eq!(home.label, "Home Energy");
    assert_eq!(home.delta, -6.5);
    assert_eq!(home.total_base, 14.0);
    assert_eq!(home.total_compare, 7.5);
    assert_eq!(home.delta_pct, -0.4643);

    let row_sum: f64 = rows.iter().map(|row| row.delta).sum();
    let diff_sum: f64 = diff.rows().map(|row| row.delta).sum();
    assert!((row_sum - diff_sum).abs() < 1e-6);
}

#[test]
fn test_sub_precision_deltas_are_conserved_only_to_the_precision() {
    let diff = compute_diff(
        &BTreeMap::new(),
        &overrides(&[("ACT.ONE", 4e-5), ("ACT.THREE", 4e-5), ("ACT.FIVE", 4e-5)]),
    );
    let catalog = sample_catalog();
    let diff_sum: f64 = diff.rows().map(|row| row.delta).sum();

    let rows = aggregate_by_category(&diff, GroupBy::Category, &catalog, &encoder());
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.delta == 0.0));
    let row_sum: f64 = rows.iter().map(|row| row.delta).sum();
    let half_unit = 0.5e-4;
    assert!((row_sum - diff_sum).abs() <= half_unit * rows.len() as f64);

    let fine = CanonicalEncoder::new(6);
    let rows = aggregate_by_category(&diff, GroupBy::Category, &catalog, &fine);
    let row_sum: f64 = rows.iter().map(|row| row.delta).sum();
    assert!((row_sum - diff_sum).abs() < 1e-6);
}

#[test]
fn test_aggregate_by_layer() {
    let diff = compute_diff(
        &overrides(&[("ACT.THREE", 1.0)]),
        &overrides(&[("ACT.THREE", 2.0), ("ACT.FOUR", 1.0)]),
    );
    let rows = aggregate_by_category(&diff, GroupBy::Layer, &sample_catalog(), &encoder());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, "mobility");
    assert_eq!(rows[0].label, "Mobility");
    assert_eq!(rows[0].delta, 2.0);
    assert_eq!(rows[0].delta_pct, 2.0);
}

#[test]
fn test_zero_base_pct_sentinels() {
    let enc = encoder();
    assert_eq!(delta_pct(3.0, 0.0, &enc), f64::INFINITY);
    assert_eq!(delta_pct(-3.0, 0.0, &enc), f64::NEG_INFINITY);
    assert_eq!(delta_pct(0.0, 0.0, &enc), 0.0);
    assert_eq!(delta_pct(1.0, 3.0, &enc), 0.3333);
}

#[test]
fn test_added_only_group_has_infinite_pct_serialized_as_string() {
    let diff = compute_diff(&overrides(&[]), &overrides(&[("ACT.FIVE", 2.0)]));
    let rows = aggregate_by_category(&diff, GroupBy::Category, &sample_catalog(), &encoder());
    assert_eq!(rows[0].delta_pct, f64::INFINITY);

    let json = serde_json::to_value(&rows[0]).expect("serialize aggregate");
    assert_eq!(json["delta_pct"], "Infinity");
    assert_eq!(json["total_base"], 0.0);
}

#[test]
fn test_aggregate_ties_break_by_key() {
    let diff = compute_diff(
        &overrides(&[]),
        &overrides(&[("ACT.FIVE", 1.0), ("ACT.ONE", -1.0), ("ACT.THREE", 1.0)]),
    );
    let rows = aggregate_by_category(&diff, GroupBy::Category, &sample_catalog(), &encoder());
    let keys: Vec<&str> = rows.iter().map(|row| row.key.as_str()).collect();
    assert_eq!(keys, vec!["food_and_diet", "home_energy", "transport"]);
    assert_eq!(rows[1].delta_pct, f64::NEG_INFINITY);
}

#[test]
fn test_list_activity_deltas_labels_and_orders() {
    let base = overrides(&[("ACT.ONE", 1.0), ("ACT.TWO", 2.0)]);
    let compare = overrides(&[("ACT.ONE", 1.333333), ("ZZZ.RAW", 2.0)]);
    let diff = compute_diff(&base, &compare);

    let rows = list_activity_deltas(&diff, &sample_catalog(), &encoder());

    let labels: Vec<&str> = rows.iter().map(|row| row.label.as_str()).collect();
    assert_eq!(labels, vec!["Natural gas heating", "ZZZ.RAW", "Grid electricity"]);
    assert_eq!(rows[2].delta, 0.3333);
    assert_eq!(rows[2].total_compare, Some(1.3333));
    assert_eq!(rows[0].total_compare, None);
}

#[test]
fn test_humanize_labels() {
    assert_eq!(humanize("food_and_diet"), "Food And Diet");
    assert_eq!(humanize("Other"), "Other");
    assert_eq!(humanize("energy__use_"), "Energy Use");
    assert_eq!(humanize(""), "");
}
