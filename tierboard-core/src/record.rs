//! Per-agent metric records

use crate::identity::{display_name, normalize, AgentKey};
use crate::quartile::Quartile;
use serde::{Deserialize, Serialize};

/// One agent's metric for one classification snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub agent_key: AgentKey,
    /// Label as received from the backend, kept only for rendering.
    pub agent_display: String,
    pub metric_value: u64,
}

impl MetricRecord {
    /// Build a record from a raw agent reference such as `"10 - Ana"`.
    pub fn from_ref(agent_ref: &str, metric_value: u64) -> Self {
        Self {
            agent_key: normalize(agent_ref),
            agent_display: agent_ref.trim().to_string(),
            metric_value,
        }
    }

    /// Name for display: the part after `" - "` when present, else the key.
    pub fn name(&self) -> &str {
        display_name(&self.agent_display).unwrap_or(self.agent_key.as_str())
    }

    pub fn labeled(self, quartile: Quartile) -> LabeledRecord {
        LabeledRecord {
            record: self,
            quartile,
        }
    }
}

/// A record together with the quartile label assigned by the query layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub record: MetricRecord,
    pub quartile: Quartile,
}

impl LabeledRecord {
    pub fn new(agent_ref: &str, metric_value: u64, quartile: Quartile) -> Self {
        MetricRecord::from_ref(agent_ref, metric_value).labeled(quartile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_prefers_display_suffix() {
        assert_eq!(MetricRecord::from_ref("10 - Ana", 1).name(), "Ana");
        assert_eq!(MetricRecord::from_ref(" 11 ", 1).name(), "11");
        assert_eq!(MetricRecord::from_ref("12 - ", 1).name(), "12");
    }
}
