//! Combat readiness.
//!
//! The three lowest states are a pure function of vitality and constitution;
//! the postures above them are requested by the character. `Fighting` is only
//! ever entered through engagement.

use serde::{Deserialize, Serialize};

/// Ordered readiness of a character.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Position {
    /// Terminal; only the death pipeline moves a character out of it.
    Dead,
    /// Will die if not aided.
    Incapacitated,
    /// Knocked out, will probably recover.
    Stunned,
    /// Asleep.
    Sleeping,
    /// Resting.
    Resting,
    /// Sitting.
    Sitting,
    /// Engaged in melee.
    Fighting,
    /// Standing.
    #[default]
    Standing,
}

impl Position {
    /// Numeric rank, `Dead` = 0 up to `Standing` = 7.
    #[must_use]
    pub const fn rank(self) -> i32 {
        self as i32
    }

    /// Readiness derived from vitality `hit` and constitution `con`.
    ///
    /// Above zero vitality the result is `Fighting` when engaged and
    /// `Standing` otherwise.
    #[must_use]
    pub const fn from_vitality(hit: i32, con: i32, engaged: bool) -> Self {
        if hit > 0 {
            if engaged {
                Position::Fighting
            } else {
                Position::Standing
            }
        } else if hit <= -con / 2 {
            Position::Dead
        } else if hit <= -con / 4 {
            Position::Incapacitated
        } else {
            Position::Stunned
        }
    }

    /// Conscious enough to act.
    #[must_use]
    pub const fn is_awake(self) -> bool {
        self.rank() > Position::Sleeping.rank()
    }

    /// States derived from vitality alone.
    #[must_use]
    pub const fn is_vitality_state(self) -> bool {
        matches!(
            self,
            Position::Dead | Position::Incapacitated | Position::Stunned
        )
    }

    /// Postures a conscious character may request.
    #[must_use]
    pub const fn is_posture(self) -> bool {
        matches!(
            self,
            Position::Sleeping | Position::Resting | Position::Sitting | Position::Standing
        )
    }

    /// Lower-case display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Position::Dead => "dead",
            Position::Incapacitated => "incapacitated",
            Position::Stunned => "stunned",
            Position::Sleeping => "sleeping",
            Position::Resting => "resting",
            Position::Sitting => "sitting",
            Position::Fighting => "fighting",
            Position::Standing => "standing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ordering() {
        assert!(Position::Dead < Position::Incapacitated);
        assert!(Position::Stunned < Position::Sleeping);
        assert!(Position::Sitting < Position::Fighting);
        assert!(Position::Fighting < Position::Standing);
    }

    #[test]
    fn test_wounded_but_engaged_fights() {
        assert_eq!(Position::from_vitality(15, 20, true), Position::Fighting);
        assert_eq!(Position::from_vitality(15, 20, false), Position::Standing);
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(Position::from_vitality(0, 20, true), Position::Stunned);
        assert_eq!(Position::from_vitality(-4, 20, false), Position::Stunned);
        assert_eq!(Position::from_vitality(-5, 20, false), Position::Incapacitated);
        assert_eq!(Position::from_vitality(-9, 20, false), Position::Incapacitated);
        assert_eq!(Position::from_vitality(-10, 20, false), Position::Dead);
        assert_eq!(Position::from_vitality(-12, 20, false), Position::Dead);
    }

    #[test]
    fn test_awake() {
        assert!(!Position::Sleeping.is_awake());
        assert!(Position::Resting.is_awake());
        assert!(!Position::Stunned.is_awake());
    }

    proptest! {
        #[test]
        fn prop_positive_vitality_is_never_down(hit in 1i32..10_000, con in 0i32..100, engaged: bool) {
            let pos = Position::from_vitality(hit, con, engaged);
            prop_assert!(pos == Position::Fighting || pos == Position::Standing);
        }

        #[test]
        fn prop_non_positive_vitality_is_vitality_state(hit in -10_000i32..=0, con in 0i32..100, engaged: bool) {
            let pos = Position::from_vitality(hit, con, engaged);
            prop_assert!(pos.is_vitality_state());
            prop_assert_eq!(pos, Position::from_vitality(hit, con, !engaged));
        }

        #[test]
        fn prop_lower_vitality_never_raises_position(hit in -500i32..500, drop in 0i32..500, con in 0i32..100) {
            let before = Position::from_vitality(hit, con, false);
            let after = Position::from_vitality(hit - drop, con, false);
            prop_assert!(after <= before);
        }
    }
}
