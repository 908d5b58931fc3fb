//! Snapshot diffing
//!
//! Compares the current classification against the previous one and reports,
//! per agent, quartile transitions and metric increases. Agents seen for the
//! first time never count as having moved: without a prior quartile there is
//! nothing to compare against, so a cold start must not flood the board with
//! promotions. They can still count as improved when their metric is positive.

use crate::identity::AgentKey;
use crate::quartile::Quartile;
use crate::snapshot::ClassificationSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Movement of one agent between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDescriptor {
    pub agent_key: AgentKey,
    pub from_quartile: Option<Quartile>,
    pub to_quartile: Quartile,
    pub moved_up: bool,
    pub moved_down: bool,
    pub metric_increased: bool,
    pub metric_before: u64,
    pub metric_after: u64,
}

/// Descriptors keyed by agent. Agents with no change are absent.
pub type MovementMap = BTreeMap<AgentKey, MovementDescriptor>;

/// Counts over a [`MovementMap`], mostly for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSummary {
    pub promoted: usize,
    pub demoted: usize,
    pub improved: usize,
}

impl MovementSummary {
    pub fn of(movements: &MovementMap) -> Self {
        movements.values().fold(Self::default(), |mut acc, m| {
            acc.promoted += usize::from(m.moved_up);
            acc.demoted += usize::from(m.moved_down);
            acc.improved += usize::from(m.metric_increased);
            acc
        })
    }
}

/// Diff `current` against `previous` (`None` on the first run).
pub fn diff(
    previous: Option<&ClassificationSnapshot>,
    current: &ClassificationSnapshot,
) -> MovementMap {
    let prior = previous.map(ClassificationSnapshot::lookup).unwrap_or_default();

    let mut movements = MovementMap::new();
    for (to_quartile, record) in current.iter() {
        let before = prior.get(&record.agent_key).copied();
        let from_quartile = before.map(|(q, _)| q);
        let metric_before = before.map(|(_, m)| m).unwrap_or(0);
        let metric_after = record.metric_value;

        let quartile_changed = from_quartile.is_some_and(|from| from != to_quartile);
        let metric_increased = metric_after > metric_before;
        if !quartile_changed && !metric_increased {
            continue;
        }

        let moved_up = from_quartile.is_some_and(|from| to_quartile.is_better_than(from));
        let moved_down = from_quartile.is_some_and(|from| from.is_better_than(to_quartile));
        movements.insert(
            record.agent_key.clone(),
            MovementDescriptor {
                agent_key: record.agent_key.clone(),
                from_quartile,
                to_quartile,
                moved_up,
                moved_down,
                metric_increased,
                metric_before,
                metric_after,
            },
        );
    }
    movements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::record::LabeledRecord;
    use chrono::Utc;
    use proptest::prelude::*;

    fn snapshot(rows: &[(&str, u64, Quartile)]) -> ClassificationSnapshot {
        classify(
            rows.iter()
                .map(|(agent, metric, q)| LabeledRecord::new(agent, *metric, *q))
                .collect(),
            Utc::now(),
        )
    }

    #[test]
    fn test_promotion_across_label_formats() {
        let a = snapshot(&[("10", 50, Quartile::Second)]);
        let b = snapshot(&[("10 - Ana", 70, Quartile::First)]);
        let movements = diff(Some(&a), &b);
        assert_eq!(movements.len(), 1);
        let m = &movements[&AgentKey::from("10")];
        assert_eq!(m.from_quartile, Some(Quartile::Second));
        assert_eq!(m.to_quartile, Quartile::First);
        assert!(m.moved_up);
        assert!(!m.moved_down);
        assert!(m.metric_increased);
        assert_eq!((m.metric_before, m.metric_after), (50, 70));
    }

    #[test]
    fn test_cold_start_never_moves() {
        let current = snapshot(&[
            ("1", 10, Quartile::First),
            ("2", 0, Quartile::Fourth),
        ]);
        let movements = diff(None, &current);
        assert_eq!(movements.len(), 1);
        let m = &movements[&AgentKey::from("1")];
        assert_eq!(m.from_quartile, None);
        assert!(!m.moved_up && !m.moved_down);
        assert!(m.metric_increased);
    }

    #[test]
    fn test_demotion_without_increase() {
        let a = snapshot(&[("7", 40, Quartile::First)]);
        let b = snapshot(&[("7", 40, Quartile::Third)]);
        let movements = diff(Some(&a), &b);
        let m = &movements[&AgentKey::from("7")];
        assert!(m.moved_down);
        assert!(!m.metric_increased);
        assert_eq!(MovementSummary::of(&movements), MovementSummary {
            promoted: 0,
            demoted: 1,
            improved: 0,
        });
    }

    #[test]
    fn test_metric_decrease_same_quartile_is_absent() {
        let a = snapshot(&[("7", 40, Quartile::Second)]);
        let b = snapshot(&[("7", 30, Quartile::Second)]);
        assert!(diff(Some(&a), &b).is_empty());
    }

    #[test]
    fn test_new_agent_in_later_snapshot() {
        let a = snapshot(&[("1", 10, Quartile::First)]);
        let b = snapshot(&[("1", 10, Quartile::First), ("2", 3, Quartile::Second)]);
        let movements = diff(Some(&a), &b);
        let m = &movements[&AgentKey::from("2")];
        assert_eq!(m.from_quartile, None);
        assert!(m.metric_increased && !m.moved_up);
        assert!(!movements.contains_key(&AgentKey::from("1")));
    }

    fn arb_snapshot() -> impl Strategy<Value = ClassificationSnapshot> {
        prop::collection::vec((0u32..50, 0u64..500, 1u8..=4), 0..30).prop_map(|rows| {
            classify(
                rows.into_iter()
                    .map(|(id, metric, q)| {
                        LabeledRecord::new(
                            &id.to_string(),
                            metric,
                            Quartile::try_from(q).unwrap_or(Quartile::Fourth),
                        )
                    })
                    .collect(),
                Utc::now(),
            )
        })
    }

    proptest! {
        #[test]
        fn identical_snapshots_diff_empty(s in arb_snapshot()) {
            prop_assert!(diff(Some(&s), &s).is_empty());
        }

        #[test]
        fn cold_start_flags_only_positive_metrics(s in arb_snapshot()) {
            let movements = diff(None, &s);
            prop_assert!(movements.values().all(|m| !m.moved_up && !m.moved_down));
            let positive = s.iter().filter(|(_, r)| r.metric_value > 0).count();
            prop_assert_eq!(movements.len(), positive);
        }

        #[test]
        fn up_and_down_are_exclusive(a in arb_snapshot(), b in arb_snapshot()) {
            for m in diff(Some(&a), &b).values() {
                prop_assert!(!(m.moved_up && m.moved_down));
                prop_assert_eq!(m.moved_up || m.moved_down, m.from_quartile.is_some_and(|f| f != m.to_quartile));
            }
        }
    }
}
