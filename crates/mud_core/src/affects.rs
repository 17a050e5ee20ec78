//! Timed modifiers ("affects") carried by a character.
//!
//! Each kind has one [`MergePolicy`] deciding what happens when a second
//! instance of the same kind is applied; nothing merges implicitly.

use serde::{Deserialize, Serialize};

/// Kinds of timed modifier the combat rules query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AffectKind {
    /// Ward whose modifier is its remaining strength.
    Sanctuary,
    /// Magical shield trading mana for damage.
    Shield,
    /// Attacks may swing at thin air; modifier counts remaining misses.
    Hallucinate,
    /// Recently dealt damage.
    Anger,
    /// Dodge penalty left by a maul.
    Maul,
    /// Stacking buff earned by mauling.
    MaulBuff,
    /// Defensive stance; modifier is the defend skill knowledge.
    Defend,
    /// Evasion training: attackers suffer an extra malus.
    Evasion,
}

/// Stat a modifier applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ApplyLocation {
    /// Modifier is read by the rule that owns the affect.
    #[default]
    None,
    /// Offensive bonus.
    Ob,
    /// Dodge.
    Dodge,
    /// Parry.
    Parry,
    /// Maul stack counter.
    Maul,
}

/// How a new instance merges with an existing one of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The new instance replaces the old one.
    Replace,
    /// Durations and modifiers add up.
    Accumulate,
    /// Durations add up to `cap`; each application bumps the counter.
    Stack {
        /// Duration ceiling.
        cap: i32,
    },
}

impl AffectKind {
    /// Merge policy of this kind.
    #[must_use]
    pub const fn merge_policy(self) -> MergePolicy {
        match self {
            AffectKind::Maul => MergePolicy::Accumulate,
            AffectKind::MaulBuff => MergePolicy::Stack { cap: 200 },
            _ => MergePolicy::Replace,
        }
    }
}

/// One timed modifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Affect {
    /// Kind.
    pub kind: AffectKind,
    /// Remaining fast updates; negative means permanent.
    pub duration: i32,
    /// Magnitude.
    pub modifier: i32,
    /// Stat the modifier applies to.
    pub location: ApplyLocation,
    /// Number of stacked applications.
    pub counter: i32,
}

impl Affect {
    /// Affect with no stat modifier.
    #[must_use]
    pub const fn new(kind: AffectKind, duration: i32, modifier: i32) -> Self {
        Self {
            kind,
            duration,
            modifier,
            location: ApplyLocation::None,
            counter: 1,
        }
    }

    /// Affect modifying a stat.
    #[must_use]
    pub const fn with_location(mut self, location: ApplyLocation) -> Self {
        self.location = location;
        self
    }
}

/// Result of [`AffectSet::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// No instance existed.
    Added,
    /// Merged into the existing instance.
    Merged,
    /// Stack is full; nothing changed.
    Refused,
}

/// Affects on one character, at most one per kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AffectSet {
    affects: Vec<Affect>,
}

impl AffectSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Affect of the given kind.
    #[must_use]
    pub fn get(&self, kind: AffectKind) -> Option<&Affect> {
        self.affects.iter().find(|a| a.kind == kind)
    }

    /// Mutable affect of the given kind.
    pub fn get_mut(&mut self, kind: AffectKind) -> Option<&mut Affect> {
        self.affects.iter_mut().find(|a| a.kind == kind)
    }

    /// Whether an affect of the kind is present.
    #[must_use]
    pub fn has(&self, kind: AffectKind) -> bool {
        self.get(kind).is_some()
    }

    /// Apply an affect using the kind's merge policy.
    pub fn apply(&mut self, affect: Affect) -> ApplyResult {
        let Some(existing) = self.get_mut(affect.kind) else {
            self.affects.push(affect);
            return ApplyResult::Added;
        };

        match affect.kind.merge_policy() {
            MergePolicy::Replace => *existing = affect,
            MergePolicy::Accumulate => {
                existing.duration += affect.duration;
                existing.modifier += affect.modifier;
            }
            MergePolicy::Stack { cap } => {
                let total = existing.duration + affect.duration;
                if existing.duration >= cap && total > cap {
                    return ApplyResult::Refused;
                }
                existing.duration = total.min(cap);
                existing.counter += affect.counter;
                existing.location = affect.location;
            }
        }
        ApplyResult::Merged
    }

    /// Remove the affect of the given kind.
    pub fn remove(&mut self, kind: AffectKind) -> Option<Affect> {
        let idx = self.affects.iter().position(|a| a.kind == kind)?;
        Some(self.affects.remove(idx))
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.affects.clear();
    }

    /// Sum of modifiers applying to a stat.
    #[must_use]
    pub fn sum_modifier(&self, location: ApplyLocation) -> i32 {
        self.affects
            .iter()
            .filter(|a| a.location == location)
            .map(|a| a.modifier)
            .sum()
    }

    /// Advance durations by one fast update; returns the kinds that expired.
    pub fn tick(&mut self) -> Vec<AffectKind> {
        let mut expired = Vec::new();
        self.affects.retain_mut(|a| {
            if a.duration < 0 {
                return true;
            }
            if a.duration == 0 {
                expired.push(a.kind);
                return false;
            }
            a.duration -= 1;
            true
        });
        expired
    }

    /// Iterate over present affects.
    pub fn iter(&self) -> impl Iterator<Item = &Affect> {
        self.affects.iter()
    }

    /// Number of affects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.affects.len()
    }

    /// Whether no affect is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.affects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_refreshes() {
        let mut set = AffectSet::new();
        assert_eq!(set.apply(Affect::new(AffectKind::Anger, 2, 0)), ApplyResult::Added);
        assert_eq!(set.apply(Affect::new(AffectKind::Anger, 5, 0)), ApplyResult::Merged);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(AffectKind::Anger).unwrap().duration, 5);
    }

    #[test]
    fn test_maul_penalty_accumulates() {
        let mut set = AffectSet::new();
        let hit = Affect::new(AffectKind::Maul, 8, -5).with_location(ApplyLocation::Dodge);
        set.apply(hit.clone());
        set.apply(hit);
        let maul = set.get(AffectKind::Maul).unwrap();
        assert_eq!(maul.duration, 16);
        assert_eq!(maul.modifier, -10);
        assert_eq!(set.sum_modifier(ApplyLocation::Dodge), -10);
    }

    #[test]
    fn test_maul_buff_caps_and_refuses() {
        let mut set = AffectSet::new();
        let buff = Affect::new(AffectKind::MaulBuff, 150, 0).with_location(ApplyLocation::Maul);
        set.apply(buff.clone());
        assert_eq!(set.apply(buff.clone()), ApplyResult::Merged);
        let stacked = set.get(AffectKind::MaulBuff).unwrap();
        assert_eq!(stacked.duration, 200);
        assert_eq!(stacked.counter, 2);

        assert_eq!(set.apply(buff), ApplyResult::Refused);
        assert_eq!(set.get(AffectKind::MaulBuff).unwrap().counter, 2);
    }

    #[test]
    fn test_tick_expires_after_zero() {
        let mut set = AffectSet::new();
        set.apply(Affect::new(AffectKind::Defend, 1, 50));
        set.apply(Affect::new(AffectKind::Evasion, -1, 0));
        assert!(set.tick().is_empty());
        assert_eq!(set.tick(), vec![AffectKind::Defend]);
        assert!(set.has(AffectKind::Evasion));
        assert!(!set.has(AffectKind::Defend));
    }
}
