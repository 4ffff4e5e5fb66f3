//! Leech detection and caller-side remediation.

use serde::{Deserialize, Serialize};

use crate::config::{LeechAction, LeechConfig};
use crate::models::Reviewable;

/// Tag added to leeches under [`LeechAction::Tag`]
pub const LEECH_TAG: &str = "leech";

/// True when the item has lapsed at least `threshold` times.
pub const fn is_leech(item: &Reviewable, threshold: u32) -> bool {
    item.lapses >= threshold
}

/// What the remediation step did to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeechOutcome {
    Suspended,
    Tagged,
    Warned,
}

/// Apply the configured action to a leech.
///
/// Called by collection operations after scheduling, never by the engine.
pub fn apply_leech_action(item: &mut Reviewable, config: &LeechConfig) -> Option<LeechOutcome> {
    if !is_leech(item, config.threshold) {
        return None;
    }

    let outcome = match config.action {
        LeechAction::Suspend => {
            item.suspended = true;
            LeechOutcome::Suspended
        }
        LeechAction::Tag => {
            item.tags.insert(LEECH_TAG.to_string());
            LeechOutcome::Tagged
        }
        LeechAction::Warn => LeechOutcome::Warned,
    };

    tracing::warn!(
        "Item {} is a leech ({} lapses, threshold {}): {:?}",
        item.id,
        item.lapses,
        config.threshold,
        outcome
    );
    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item_with_lapses(lapses: u32) -> Reviewable {
        let mut item = Reviewable::new("q", "a", Utc::now());
        item.lapses = lapses;
        item
    }

    #[test]
    fn test_is_leech_iff_lapses_reach_threshold() {
        for threshold in 1..6 {
            for lapses in 0..10 {
                assert_eq!(
                    is_leech(&item_with_lapses(lapses), threshold),
                    lapses >= threshold
                );
            }
        }
    }

    #[test]
    fn test_is_leech_monotonic_in_lapses() {
        let mut seen_leech = false;
        for lapses in 0..20 {
            let leech = is_leech(&item_with_lapses(lapses), 4);
            assert!(!seen_leech || leech);
            seen_leech |= leech;
        }
    }

    #[test]
    fn test_apply_suspend() {
        let mut item = item_with_lapses(3);
        let config = LeechConfig {
            threshold: 3,
            action: LeechAction::Suspend,
        };
        assert_eq!(
            apply_leech_action(&mut item, &config),
            Some(LeechOutcome::Suspended)
        );
        assert!(item.suspended);
    }

    #[test]
    fn test_apply_tag_and_warn() {
        let mut tagged = item_with_lapses(5);
        let tag_config = LeechConfig {
            threshold: 2,
            action: LeechAction::Tag,
        };
        assert_eq!(
            apply_leech_action(&mut tagged, &tag_config),
            Some(LeechOutcome::Tagged)
        );
        assert!(tagged.tags.contains(LEECH_TAG));
        assert!(!tagged.suspended);

        let mut warned = item_with_lapses(5);
        let warn_config = LeechConfig {
            threshold: 2,
            action: LeechAction::Warn,
        };
        let before = warned.clone();
        assert_eq!(
            apply_leech_action(&mut warned, &warn_config),
            Some(LeechOutcome::Warned)
        );
        assert_eq!(warned, before);
    }

    #[test]
    fn test_apply_below_threshold_is_noop() {
        let mut item = item_with_lapses(1);
        let before = item.clone();
        assert_eq!(apply_leech_action(&mut item, &LeechConfig::default()), None);
        assert_eq!(item, before);
    }
}
