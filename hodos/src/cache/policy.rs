//! Which values are cached, and which are recomputed regardless

use crate::filter::Matcher;
use crate::graph::{OptionId, StepId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Forces recomputation of cached values for one execute call.
///
/// A reset never deletes anything up front. Affected keys are looked up
/// as misses the first time they are met in a call, and the fresh value
/// overwrites the stale one. Later reads of the same key in that call are
/// served from the refreshed entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheReset {
    #[default]
    None,
    /// Recompute the target steps
    LastStep,
    /// Recompute every cache-eligible step
    All,
}

/// Names a step, optionally only some of its options, for cache inclusion
/// or exclusion.
#[derive(Debug, Clone)]
pub struct CacheRule {
    step: StepId,
    option: Matcher,
}

impl CacheRule {
    pub fn new(step: impl Into<StepId>, option: impl Into<Matcher>) -> Self {
        Self {
            step: step.into(),
            option: option.into(),
        }
    }

    /// Every option of `step`
    pub fn step(step: impl Into<StepId>) -> Self {
        Self::new(step, Matcher::Any)
    }

    pub fn step_id(&self) -> &StepId {
        &self.step
    }

    pub fn matches(&self, step: &StepId, option: &OptionId) -> bool {
        &self.step == step && self.option.matches(option)
    }
}

/// Eligibility for one call: the targets plus any extra rules, minus the
/// excluded ones. Exclusion wins, even over a target.
#[derive(Debug, Clone, Default)]
pub struct Eligibility {
    targets: HashSet<StepId>,
    rules: Vec<CacheRule>,
    excluded: Vec<CacheRule>,
    reset: CacheReset,
}

impl Eligibility {
    pub fn new(targets: impl IntoIterator<Item = StepId>, rules: Vec<CacheRule>, reset: CacheReset) -> Self {
        Self {
            targets: targets.into_iter().collect(),
            rules,
            excluded: Vec::new(),
            reset,
        }
    }

    pub fn excluding(mut self, rules: Vec<CacheRule>) -> Self {
        self.excluded = rules;
        self
    }

    pub fn reset(&self) -> CacheReset {
        self.reset
    }

    /// Whether values of `step = option` are read from and written to the cache
    pub fn is_eligible(&self, step: &StepId, option: &OptionId) -> bool {
        if self.excluded.iter().any(|rule| rule.matches(step, option)) {
            return false;
        }
        self.targets.contains(step) || self.rules.iter().any(|rule| rule.matches(step, option))
    }

    /// Whether cached values of `step = option` must be ignored on first read
    pub fn is_reset(&self, step: &StepId, option: &OptionId) -> bool {
        match self.reset {
            CacheReset::None => false,
            CacheReset::LastStep => self.targets.contains(step) && self.is_eligible(step, option),
            CacheReset::All => self.is_eligible(step, option),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_are_always_eligible() {
        let eligibility = Eligibility::new(["out".into()], vec![], CacheReset::None);
        assert!(eligibility.is_eligible(&"out".into(), &"any".into()));
        assert!(!eligibility.is_eligible(&"mid".into(), &"any".into()));
    }

    #[test]
    fn test_rules_extend_eligibility() {
        let rules = vec![CacheRule::new("mid", "slow"), CacheRule::step("first")];
        let eligibility = Eligibility::new(["out".into()], rules, CacheReset::All);
        assert!(eligibility.is_eligible(&"mid".into(), &"slow".into()));
        assert!(!eligibility.is_eligible(&"mid".into(), &"fast".into()));
        assert!(eligibility.is_eligible(&"first".into(), &"x".into()));
        assert!(eligibility.is_reset(&"first".into(), &"x".into()));
        assert!(!eligibility.is_reset(&"mid".into(), &"fast".into()));
    }

    #[test]
    fn test_exclusion_wins_over_targets_and_rules() {
        let rules = vec![CacheRule::step("mid")];
        let eligibility = Eligibility::new(["out".into()], rules, CacheReset::All).excluding(vec![
            CacheRule::new("mid", "huge"),
            CacheRule::step("out"),
        ]);
        assert!(eligibility.is_eligible(&"mid".into(), &"small".into()));
        assert!(!eligibility.is_eligible(&"mid".into(), &"huge".into()));
        assert!(!eligibility.is_eligible(&"out".into(), &"o".into()));
        assert!(!eligibility.is_reset(&"out".into(), &"o".into()));
    }

    #[test]
    fn test_last_step_reset_only_touches_targets() {
        let rules = vec![CacheRule::step("mid")];
        let eligibility = Eligibility::new(["out".into()], rules, CacheReset::LastStep);
        assert!(eligibility.is_reset(&"out".into(), &"o".into()));
        assert!(!eligibility.is_reset(&"mid".into(), &"o".into()));
    }
}
