//! Change signal for the presentation layer.
//!
//! Highlights are keyed by `(agent, generation)`. The generation only moves
//! when some agent's metric went up, so a plain re-render (or a promotion
//! without new activity) never replays the effect.

use crate::differ::MovementMap;
use crate::identity::AgentKey;
use serde::{Deserialize, Serialize};

/// Key the presentation layer attaches to a transient highlight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HighlightKey {
    pub agent_key: AgentKey,
    pub generation: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationSignal {
    generation: u64,
}

impl AnimationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bump the generation when any descriptor reports a metric increase.
    /// Returns whether it was bumped.
    pub fn observe(&mut self, movements: &MovementMap) -> bool {
        let improved = any_improved(movements);
        if improved {
            self.generation += 1;
        }
        improved
    }

    /// Highlight keys for every improved agent at the current generation.
    pub fn highlights(&self, movements: &MovementMap) -> Vec<HighlightKey> {
        movements
            .values()
            .filter(|m| m.metric_increased)
            .map(|m| HighlightKey {
                agent_key: m.agent_key.clone(),
                generation: self.generation,
            })
            .collect()
    }
}

pub fn any_improved(movements: &MovementMap) -> bool {
    movements.values().any(|m| m.metric_increased)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::MovementDescriptor;
    use crate::quartile::Quartile;

    fn descriptor(agent: &str, metric_increased: bool, moved_up: bool) -> (AgentKey, MovementDescriptor) {
        let key = AgentKey::from(agent);
        (
            key.clone(),
            MovementDescriptor {
                agent_key: key,
                from_quartile: Some(Quartile::Second),
                to_quartile: if moved_up { Quartile::First } else { Quartile::Second },
                moved_up,
                moved_down: false,
                metric_increased,
                metric_before: 1,
                metric_after: if metric_increased { 2 } else { 1 },
            },
        )
    }

    #[test]
    fn test_bumps_on_improvement() {
        let mut signal = AnimationSignal::new();
        let movements: MovementMap = [descriptor("1", true, false)].into_iter().collect();
        assert!(signal.observe(&movements));
        assert_eq!(signal.generation(), 1);
        assert!(signal.observe(&movements));
        assert_eq!(signal.generation(), 2);
        assert_eq!(
            signal.highlights(&movements),
            vec![HighlightKey {
                agent_key: AgentKey::from("1"),
                generation: 2,
            }]
        );
    }

    #[test]
    fn test_promotion_alone_does_not_animate() {
        let mut signal = AnimationSignal::new();
        let movements: MovementMap = [descriptor("1", false, true)].into_iter().collect();
        assert!(!signal.observe(&movements));
        assert_eq!(signal.generation(), 0);
        assert!(signal.highlights(&movements).is_empty());
    }

    #[test]
    fn test_empty_map_is_stable() {
        let mut signal = AnimationSignal::new();
        assert!(!signal.observe(&MovementMap::new()));
        assert_eq!(signal.generation(), 0);
    }
}
