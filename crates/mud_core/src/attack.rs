//! Attack kinds and what they imply: hit nouns, resistance classes and the
//! condition a corpse is left in.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::character::Skill;

/// Melee hit kinds, as produced by weapons and natural attacks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum HitKind {
    /// Bare hands or an unclassified object.
    #[default]
    Hit,
    /// Blunt weapons.
    Bludgeon,
    /// Thrusting points.
    Pierce,
    /// Edged weapons.
    Slash,
    /// Daggers.
    Stab,
    /// Whips.
    Whip,
    /// Spears; pass through armor more easily.
    Spears,
    /// Claws.
    Claw,
    /// Teeth.
    Bite,
    /// Stingers.
    Sting,
    /// Axes.
    Cleave,
    /// Flails.
    Flail,
    /// Smiting weapons; may crunch rigid armor.
    Smite,
    /// Crushing blows.
    Crush,
}

impl HitKind {
    /// Hit kind for a weapon type code as stored in object data.
    ///
    /// Codes 13 and 14 both resolve to bludgeon.
    #[must_use]
    pub const fn from_weapon_type(code: u8) -> Self {
        match code {
            0..=2 => HitKind::Whip,
            3 | 4 => HitKind::Slash,
            5 => HitKind::Flail,
            6 => HitKind::Crush,
            7 | 13 | 14 => HitKind::Bludgeon,
            8 | 9 => HitKind::Cleave,
            10 => HitKind::Spears,
            11 => HitKind::Pierce,
            12 => HitKind::Smite,
            _ => HitKind::Hit,
        }
    }

    /// Singular and plural verb used in damage messages.
    #[must_use]
    pub const fn nouns(self) -> (&'static str, &'static str) {
        match self {
            HitKind::Hit => ("hit", "hits"),
            HitKind::Bludgeon => ("bludgeon", "bludgeons"),
            HitKind::Pierce => ("pierce", "pierces"),
            HitKind::Slash => ("slash", "slashes"),
            HitKind::Stab => ("stab", "stabs"),
            HitKind::Whip => ("whip", "whips"),
            HitKind::Spears => ("skewer", "skewers"),
            HitKind::Claw => ("claw", "claws"),
            HitKind::Bite => ("bite", "bites"),
            HitKind::Sting => ("sting", "stings"),
            HitKind::Cleave => ("cleave", "cleaves"),
            HitKind::Flail => ("flail", "flails"),
            HitKind::Smite => ("smite", "smites"),
            HitKind::Crush => ("crush", "crushes"),
        }
    }
}

/// Offensive spell effects that can be fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SpellEffect {
    Scorch,
    Chill,
    Lightning,
    MagicMissile,
    DarkBolt,
    Firebolt,
    Fireball,
    ConeOfCold,
    Earthquake,
    Terror,
    Agony,
    Torment,
    Shock,
    BlackArrow,
    Leach,
    Torture,
}

/// What dealt a blow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    /// Melee weapon or natural attack.
    Weapon(HitKind),
    /// Combat skill (kick, bash, bite, ...).
    Skill(Skill),
    /// Poison ticking in the blood.
    Poison,
    /// Will against will.
    Mental,
    /// Offensive spell.
    Spell(SpellEffect),
    /// Immortal slay.
    Slay,
}

bitflags! {
    /// Damage classes a character may resist or be vulnerable to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
    pub struct DamageClasses: u16 {
        /// Edged and clawed attacks.
        const SLASH = 0x0001;
        /// Points and teeth.
        const PIERCE = 0x0002;
        /// Blunt force.
        const BLUDGEON = 0x0004;
        /// Fire.
        const FIRE = 0x0008;
        /// Cold.
        const COLD = 0x0010;
        /// Lightning.
        const LIGHTNING = 0x0020;
        /// Darkness.
        const DARKNESS = 0x0040;
        /// Poison.
        const POISON = 0x0080;
        /// Attacks on the mind.
        const MIND = 0x0100;
    }
}

impl AttackKind {
    /// Physical blows: weapons and combat skills.
    #[must_use]
    pub const fn is_physical(self) -> bool {
        matches!(self, AttackKind::Weapon(_) | AttackKind::Skill(_))
    }

    /// Resistance class of the attack.
    #[must_use]
    pub const fn damage_class(self) -> DamageClasses {
        match self {
            AttackKind::Weapon(kind) => match kind {
                HitKind::Pierce
                | HitKind::Stab
                | HitKind::Spears
                | HitKind::Bite
                | HitKind::Sting => DamageClasses::PIERCE,
                HitKind::Slash | HitKind::Claw | HitKind::Cleave | HitKind::Whip => {
                    DamageClasses::SLASH
                }
                HitKind::Hit
                | HitKind::Bludgeon
                | HitKind::Flail
                | HitKind::Smite
                | HitKind::Crush => DamageClasses::BLUDGEON,
            },
            AttackKind::Skill(skill) => match skill {
                Skill::Bite | Skill::Ambush => DamageClasses::PIERCE,
                Skill::Rend | Skill::Maul => DamageClasses::SLASH,
                _ => DamageClasses::BLUDGEON,
            },
            AttackKind::Poison => DamageClasses::POISON,
            AttackKind::Mental => DamageClasses::MIND,
            AttackKind::Spell(effect) => match effect {
                SpellEffect::Scorch | SpellEffect::Firebolt | SpellEffect::Fireball => {
                    DamageClasses::FIRE
                }
                SpellEffect::Chill | SpellEffect::ConeOfCold => DamageClasses::COLD,
                SpellEffect::Lightning | SpellEffect::Shock => DamageClasses::LIGHTNING,
                SpellEffect::DarkBolt | SpellEffect::BlackArrow => DamageClasses::DARKNESS,
                SpellEffect::Earthquake => DamageClasses::BLUDGEON,
                SpellEffect::MagicMissile => DamageClasses::empty(),
                SpellEffect::Terror
                | SpellEffect::Agony
                | SpellEffect::Torment
                | SpellEffect::Leach
                | SpellEffect::Torture => DamageClasses::MIND,
            },
            AttackKind::Slay => DamageClasses::empty(),
        }
    }

    /// Word describing a corpse left by this attack.
    #[must_use]
    pub const fn corpse_condition(self) -> &'static str {
        match self {
            AttackKind::Weapon(kind) => match kind {
                HitKind::Hit => "badly beaten",
                HitKind::Bludgeon | HitKind::Smite | HitKind::Crush => "crushed",
                HitKind::Pierce => "pierced",
                HitKind::Slash => "slashed",
                HitKind::Stab => "stabbed",
                HitKind::Whip => "whipped",
                HitKind::Spears => "skewered",
                HitKind::Claw => "clawed",
                HitKind::Bite => "bitten",
                HitKind::Sting => "poisoned",
                HitKind::Cleave => "hacked",
                HitKind::Flail => "disfigured",
            },
            AttackKind::Poison => "rancid",
            AttackKind::Slay => "cleanly slain",
            AttackKind::Spell(effect) => match effect {
                SpellEffect::Scorch => "slightly charred",
                SpellEffect::Chill => "slightly chilled",
                SpellEffect::Lightning => "electrocuted",
                SpellEffect::MagicMissile => "battered",
                SpellEffect::DarkBolt => "darkened",
                SpellEffect::Firebolt => "burnt",
                SpellEffect::Fireball => "badly burnt",
                SpellEffect::ConeOfCold => "frozen",
                SpellEffect::Earthquake => "almost unrecognisable",
                SpellEffect::Terror => "harrowing",
                SpellEffect::Agony => "agonised",
                SpellEffect::Torment => "tormented",
                SpellEffect::Shock => "shocked",
                SpellEffect::BlackArrow => "horribly darkened",
                SpellEffect::Leach => "husk-like",
                SpellEffect::Torture => "tortured",
            },
            AttackKind::Skill(_) | AttackKind::Mental => "silent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weapon_type_table() {
        assert_eq!(HitKind::from_weapon_type(0), HitKind::Whip);
        assert_eq!(HitKind::from_weapon_type(4), HitKind::Slash);
        assert_eq!(HitKind::from_weapon_type(10), HitKind::Spears);
        assert_eq!(HitKind::from_weapon_type(12), HitKind::Smite);
        assert_eq!(HitKind::from_weapon_type(13), HitKind::Bludgeon);
        assert_eq!(HitKind::from_weapon_type(99), HitKind::Hit);
    }

    #[test]
    fn test_corpse_conditions() {
        assert_eq!(AttackKind::Weapon(HitKind::Hit).corpse_condition(), "badly beaten");
        assert_eq!(AttackKind::Poison.corpse_condition(), "rancid");
        assert_eq!(AttackKind::Slay.corpse_condition(), "cleanly slain");
        assert_eq!(
            AttackKind::Spell(SpellEffect::Leach).corpse_condition(),
            "husk-like"
        );
        assert_eq!(AttackKind::Skill(Skill::Kick).corpse_condition(), "silent");
    }

    #[test]
    fn test_physical() {
        assert!(AttackKind::Weapon(HitKind::Slash).is_physical());
        assert!(AttackKind::Skill(Skill::Bash).is_physical());
        assert!(!AttackKind::Mental.is_physical());
        assert!(!AttackKind::Spell(SpellEffect::Fireball).is_physical());
    }
}
