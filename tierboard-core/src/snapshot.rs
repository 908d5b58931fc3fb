//! Classification snapshot

use crate::identity::{new_snapshot_id, AgentKey, SnapshotId, Timestamp};
use crate::quartile::Quartile;
use crate::record::MetricRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time classification of the whole agent population under the
/// active filters.
///
/// Snapshots are produced by [`crate::classifier`] and never mutated. A newer
/// snapshot replaces an older one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSnapshot {
    id: SnapshotId,
    quartiles: [Vec<MetricRecord>; 4],
    totals: [u64; 4],
    total_agents: usize,
    captured_at: Timestamp,
}

/// Summary statistics for one quartile bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuartileStats {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    /// Mean metric rounded to two decimals.
    pub mean: f64,
    pub total: u64,
}

impl QuartileStats {
    pub const EMPTY: QuartileStats = QuartileStats {
        count: 0,
        min: 0,
        max: 0,
        mean: 0.0,
        total: 0,
    };
}

impl ClassificationSnapshot {
    /// Assemble a snapshot from already sorted buckets.
    pub(crate) fn from_buckets(quartiles: [Vec<MetricRecord>; 4], captured_at: Timestamp) -> Self {
        let totals = [0, 1, 2, 3].map(|i| {
            quartiles[i]
                .iter()
                .map(|r| r.metric_value)
                .fold(0, u64::saturating_add)
        });
        let total_agents = quartiles.iter().map(Vec::len).sum();
        Self {
            id: new_snapshot_id(),
            quartiles,
            totals,
            total_agents,
            captured_at,
        }
    }

    /// Snapshot with four empty buckets.
    pub fn empty(captured_at: Timestamp) -> Self {
        Self::from_buckets(Default::default(), captured_at)
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn captured_at(&self) -> Timestamp {
        self.captured_at
    }

    pub fn bucket(&self, quartile: Quartile) -> &[MetricRecord] {
        &self.quartiles[quartile.index()]
    }

    pub fn totals(&self) -> [u64; 4] {
        self.totals
    }

    pub fn total(&self, quartile: Quartile) -> u64 {
        self.totals[quartile.index()]
    }

    pub fn total_agents(&self) -> usize {
        self.total_agents
    }

    pub fn is_empty(&self) -> bool {
        self.total_agents == 0
    }

    pub fn grand_total(&self) -> u64 {
        self.totals.iter().copied().fold(0, u64::saturating_add)
    }

    /// Share of the grand total held by each quartile, in percent.
    /// All zeros when nothing was recorded.
    pub fn percentages(&self) -> [f64; 4] {
        let grand = self.grand_total();
        if grand == 0 {
            return [0.0; 4];
        }
        self.totals.map(|t| t as f64 / grand as f64 * 100.0)
    }

    /// Iterate every record with its quartile, best bucket first.
    pub fn iter(&self) -> impl Iterator<Item = (Quartile, &MetricRecord)> {
        Quartile::ALL
            .into_iter()
            .flat_map(move |q| self.bucket(q).iter().map(move |r| (q, r)))
    }

    pub fn quartile_of(&self, agent: &AgentKey) -> Option<(Quartile, &MetricRecord)> {
        self.iter().find(|(_, r)| &r.agent_key == agent)
    }

    /// `AgentKey -> (quartile, metric)` lookup used for diffing.
    pub fn lookup(&self) -> HashMap<&AgentKey, (Quartile, u64)> {
        self.iter()
            .map(|(q, r)| (&r.agent_key, (q, r.metric_value)))
            .collect()
    }

    pub fn stats(&self, quartile: Quartile) -> QuartileStats {
        let bucket = self.bucket(quartile);
        if bucket.is_empty() {
            return QuartileStats::EMPTY;
        }
        let values = bucket.iter().map(|r| r.metric_value);
        let min = values.clone().min().unwrap_or(0);
        let max = values.max().unwrap_or(0);
        let total = self.total(quartile);
        let mean = total as f64 / bucket.len() as f64;
        QuartileStats {
            count: bucket.len(),
            min,
            max,
            mean: (mean * 100.0).round() / 100.0,
            total,
        }
    }
}
