//! Quartile classification
//!
//! Quartile membership normally comes from the query layer: each record
//! arrives already labeled and the classifier only groups, orders and totals.
//! [`label_by_cumulative_share`] is the client-side alternative that walks the
//! ranked population and closes a quartile once it holds a quarter of the
//! grand total.
//!
//! Ordering inside a bucket is metric descending, then [`AgentKey`] ascending,
//! so equal metrics render in the same order on every refresh.

use crate::identity::{normalize, AgentKey, Timestamp};
use crate::quartile::Quartile;
use crate::record::{LabeledRecord, MetricRecord};
use crate::snapshot::ClassificationSnapshot;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Rank order: higher metric first, then agent key ascending.
pub fn rank_order(a: &MetricRecord, b: &MetricRecord) -> Ordering {
    b.metric_value
        .cmp(&a.metric_value)
        .then_with(|| a.agent_key.cmp(&b.agent_key))
}

/// Group labeled records into a snapshot.
///
/// Zero-activity agents always land in [`Quartile::Fourth`] so they stay in
/// the population count instead of disappearing in sparse periods.
pub fn classify(rows: Vec<LabeledRecord>, captured_at: Timestamp) -> ClassificationSnapshot {
    let mut buckets: [Vec<MetricRecord>; 4] = Default::default();
    for labeled in merge_duplicates(rows) {
        let quartile = if labeled.record.metric_value == 0 {
            Quartile::Fourth
        } else {
            labeled.quartile
        };
        buckets[quartile.index()].push(labeled.record);
    }
    for bucket in &mut buckets {
        bucket.sort_by(rank_order);
    }
    ClassificationSnapshot::from_buckets(buckets, captured_at)
}

/// Like [`classify`], but every roster agent missing from `rows` is added to
/// [`Quartile::Fourth`] with a zero metric.
pub fn classify_with_roster<S: AsRef<str>>(
    mut rows: Vec<LabeledRecord>,
    roster: &[S],
    captured_at: Timestamp,
) -> ClassificationSnapshot {
    let mut present: Vec<AgentKey> = rows.iter().map(|r| r.record.agent_key.clone()).collect();
    for agent_ref in roster {
        let key = normalize(agent_ref.as_ref());
        if key.is_empty() || present.contains(&key) {
            continue;
        }
        present.push(key);
        rows.push(LabeledRecord::new(agent_ref.as_ref(), 0, Quartile::Fourth));
    }
    classify(rows, captured_at)
}

/// Assign quartiles by cumulative share of the grand total.
///
/// Walking the ranked population, a quartile is closed as soon as the metric
/// accumulated inside it reaches 25% of the grand total; whatever remains after
/// the third quartile closes belongs to the fourth. With a zero grand total
/// every agent is placed in the fourth quartile.
pub fn label_by_cumulative_share(mut records: Vec<MetricRecord>) -> Vec<LabeledRecord> {
    records.sort_by(rank_order);
    let grand_total = records
        .iter()
        .map(|r| r.metric_value)
        .fold(0, u64::saturating_add);
    if grand_total == 0 {
        return records
            .into_iter()
            .map(|r| r.labeled(Quartile::Fourth))
            .collect();
    }

    let target = grand_total as f64 / 4.0;
    let mut current = Quartile::First;
    let mut accumulated = 0u64;
    let mut labeled = Vec::with_capacity(records.len());
    for record in records {
        accumulated = accumulated.saturating_add(record.metric_value);
        let value_reached = accumulated as f64 >= target;
        labeled.push(record.labeled(current));
        if value_reached && current != Quartile::Fourth {
            current = Quartile::from_index(current.index() + 1).unwrap_or(Quartile::Fourth);
            accumulated = 0;
        }
    }
    labeled
}

/// Collapse records that normalize to the same agent: metrics are summed,
/// the best label wins and the first non-empty display is kept.
fn merge_duplicates(rows: Vec<LabeledRecord>) -> Vec<LabeledRecord> {
    let mut index: HashMap<AgentKey, usize> = HashMap::with_capacity(rows.len());
    let mut merged: Vec<LabeledRecord> = Vec::with_capacity(rows.len());
    for row in rows {
        match index.get(&row.record.agent_key) {
            Some(&at) => {
                let existing = &mut merged[at];
                existing.record.metric_value =
                    existing.record.metric_value.saturating_add(row.record.metric_value);
                if row.quartile.is_better_than(existing.quartile) {
                    existing.quartile = row.quartile;
                }
                if existing.record.agent_display.is_empty() {
                    existing.record.agent_display = row.record.agent_display;
                }
            }
            None => {
                index.insert(row.record.agent_key.clone(), merged.len());
                merged.push(row);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn keys(bucket: &[MetricRecord]) -> Vec<&str> {
        bucket.iter().map(|r| r.agent_key.as_str()).collect()
    }

    #[test]
    fn test_single_day_fixed_roster_scenario() {
        let rows = vec![
            LabeledRecord::new("11 - Ana", 80, Quartile::First),
            LabeledRecord::new("12 - Caio", 100, Quartile::First),
            LabeledRecord::new("13 - Duda", 0, Quartile::Fourth),
        ];
        let snapshot = classify(rows, Utc::now());
        assert_eq!(snapshot.totals(), [180, 0, 0, 0]);
        assert_eq!(snapshot.total_agents(), 3);
        assert_eq!(snapshot.percentages(), [100.0, 0.0, 0.0, 0.0]);
        assert_eq!(keys(snapshot.bucket(Quartile::First)), vec!["12", "11"]);
        assert_eq!(keys(snapshot.bucket(Quartile::Fourth)), vec!["13"]);
    }

    #[test]
    fn test_empty_population() {
        let snapshot = classify(Vec::new(), Utc::now());
        assert!(snapshot.is_empty());
        for q in Quartile::ALL {
            assert!(snapshot.bucket(q).is_empty());
        }
    }

    #[test]
    fn test_zero_activity_forced_into_fourth() {
        let rows = vec![
            LabeledRecord::new("1", 0, Quartile::First),
            LabeledRecord::new("2", 5, Quartile::First),
        ];
        let snapshot = classify(rows, Utc::now());
        assert_eq!(keys(snapshot.bucket(Quartile::First)), vec!["2"]);
        assert_eq!(keys(snapshot.bucket(Quartile::Fourth)), vec!["1"]);
        assert_eq!(snapshot.total_agents(), 2);
    }

    #[test]
    fn test_ties_ordered_by_agent_key() {
        let rows = vec![
            LabeledRecord::new("30", 50, Quartile::Second),
            LabeledRecord::new("4", 50, Quartile::Second),
            LabeledRecord::new("100", 70, Quartile::Second),
        ];
        let snapshot = classify(rows, Utc::now());
        assert_eq!(keys(snapshot.bucket(Quartile::Second)), vec!["100", "4", "30"]);
    }

    #[test]
    fn test_duplicate_refs_merge() {
        let rows = vec![
            LabeledRecord::new("10", 20, Quartile::Third),
            LabeledRecord::new("10 - Ana", 30, Quartile::Second),
        ];
        let snapshot = classify(rows, Utc::now());
        assert_eq!(snapshot.total_agents(), 1);
        let (q, record) = snapshot.quartile_of(&AgentKey::from("10")).unwrap();
        assert_eq!(q, Quartile::Second);
        assert_eq!(record.metric_value, 50);
        assert_eq!(record.agent_display, "10");
    }

    #[test]
    fn test_duplicate_merge_saturates() {
        let rows = vec![
            LabeledRecord::new("10", u64::MAX, Quartile::First),
            LabeledRecord::new("10 - Ana", 5, Quartile::First),
        ];
        let snapshot = classify(rows, Utc::now());
        assert_eq!(snapshot.total(Quartile::First), u64::MAX);

        let labeled = label_by_cumulative_share(vec![
            MetricRecord::from_ref("1", u64::MAX),
            MetricRecord::from_ref("2", u64::MAX),
        ]);
        assert_eq!(labeled.len(), 2);
    }

    #[test]
    fn test_roster_padding() {
        let rows = vec![LabeledRecord::new("1 - Ana", 9, Quartile::First)];
        let roster = ["1", "2 - Bia", "3"];
        let snapshot = classify_with_roster(rows, &roster, Utc::now());
        assert_eq!(snapshot.total_agents(), 3);
        assert_eq!(keys(snapshot.bucket(Quartile::Fourth)), vec!["2", "3"]);
        assert_eq!(snapshot.bucket(Quartile::Fourth)[0].agent_display, "2 - Bia");
    }

    #[test]
    fn test_cumulative_share_closes_on_quarter() {
        let records = [40, 30, 20, 10]
            .iter()
            .enumerate()
            .map(|(i, v)| MetricRecord::from_ref(&(i + 1).to_string(), *v))
            .collect();
        let labels: Vec<Quartile> = label_by_cumulative_share(records)
            .into_iter()
            .map(|l| l.quartile)
            .collect();
        assert_eq!(
            labels,
            vec![Quartile::First, Quartile::Second, Quartile::Third, Quartile::Third]
        );
    }

    #[test]
    fn test_cumulative_share_even_population() {
        let records = (1..=8).map(|i| MetricRecord::from_ref(&i.to_string(), 10)).collect();
        let labeled = label_by_cumulative_share(records);
        let counts = Quartile::ALL.map(|q| labeled.iter().filter(|l| l.quartile == q).count());
        assert_eq!(counts, [2, 2, 2, 2]);
    }

    #[test]
    fn test_cumulative_share_zero_total() {
        let records = vec![MetricRecord::from_ref("1", 0), MetricRecord::from_ref("2", 0)];
        assert!(label_by_cumulative_share(records)
            .iter()
            .all(|l| l.quartile == Quartile::Fourth));
    }

    fn arb_population() -> impl Strategy<Value = Vec<LabeledRecord>> {
        prop::collection::vec((0u32..500, 0u64..10_000, 1u8..=4), 0..60).prop_map(|rows| {
            rows.into_iter()
                .map(|(id, metric, q)| {
                    LabeledRecord::new(
                        &id.to_string(),
                        metric,
                        Quartile::try_from(q).unwrap_or(Quartile::Fourth),
                    )
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn totals_conserve_population_sum(rows in arb_population()) {
            let expected: u64 = rows.iter().map(|r| r.record.metric_value).sum();
            let snapshot = classify(rows, Utc::now());
            prop_assert_eq!(snapshot.totals().iter().sum::<u64>(), expected);
        }

        #[test]
        fn buckets_sorted_descending(rows in arb_population()) {
            let snapshot = classify(rows, Utc::now());
            for q in Quartile::ALL {
                let bucket = snapshot.bucket(q);
                prop_assert!(bucket.windows(2).all(|w| w[0].metric_value >= w[1].metric_value));
            }
        }

        #[test]
        fn cumulative_share_keeps_everyone(metrics in prop::collection::vec(0u64..1_000, 0..40)) {
            let records: Vec<MetricRecord> = metrics
                .iter()
                .enumerate()
                .map(|(i, m)| MetricRecord::from_ref(&i.to_string(), *m))
                .collect();
            let labeled = label_by_cumulative_share(records);
            prop_assert_eq!(labeled.len(), metrics.len());
            prop_assert!(labeled.windows(2).all(|w| w[0].quartile <= w[1].quartile));
        }
    }
}
