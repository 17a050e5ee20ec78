//! Characters: players and NPCs with the statistics melee reads.

use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::affects::{AffectSet, ApplyLocation};
use crate::attack::{DamageClasses, HitKind};
use crate::body::BodyType;
use crate::ids::{CharId, ObjId, RoomId};
use crate::objects::WearSlot;
use crate::position::Position;

bitflags! {
    /// NPC behaviour flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
    pub struct MobFlags: u32 {
        /// Attacks anyone.
        const AGGRESSIVE = 0x0001;
        /// Attacks good races.
        const AGGR_GOOD = 0x0002;
        /// Attacks evil races.
        const AGGR_EVIL = 0x0004;
        /// Remembers players who attacked it.
        const MEMORY = 0x0008;
        /// Flees when badly hurt.
        const WIMPY = 0x0010;
        /// Acts quickly.
        const FAST = 0x0020;
        /// Switches opponents.
        const SWITCHING = 0x0040;
        /// Has a special procedure.
        const SPEC = 0x0080;
        /// Friendly to orcs.
        const ORC_FRIEND = 0x0100;
        /// Someone's pet.
        const PET = 0x0200;
        /// Cannot be bashed or kicked.
        const NOBASH = 0x0400;
        /// Never leaves its zone.
        const STAY_ZONE = 0x0800;
        /// Never leaves its sector type.
        const STAY_SECTOR = 0x1000;
        /// A guardian summoned to protect; never takes orders.
        const GUARDIAN = 0x2000;
    }
}

bitflags! {
    /// Transient status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
    pub struct StatusFlags: u16 {
        /// Hidden from sight.
        const HIDDEN = 0x0001;
        /// Wielding with both hands.
        const TWO_HANDED = 0x0002;
        /// Charmed by its master.
        const CHARMED = 0x0004;
        /// A spirit: physical blows pass through.
        const INCORPOREAL = 0x0008;
        /// Fights with the will instead of weapons.
        const MENTAL_FIGHTER = 0x0010;
    }
}

/// Player or NPC identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    /// A player.
    Player {
        /// Persistent player id.
        idnum: u32,
        /// Whether a session is attached.
        connected: bool,
    },
    /// A non-player character.
    Npc {
        /// Prototype virtual number.
        vnum: u32,
        /// Behaviour flags.
        flags: MobFlags,
    },
}

/// Races.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[allow(missing_docs)]
pub enum Race {
    #[default]
    Human,
    Dwarf,
    WoodElf,
    Hobbit,
    HighElf,
    Beorning,
    Uruk,
    Orc,
    Harad,
    Olog,
    Easterling,
    /// Animals and monsters.
    Beast,
}

impl Race {
    /// Races on the good side.
    #[must_use]
    pub const fn is_good(self) -> bool {
        matches!(
            self,
            Race::Human
                | Race::Dwarf
                | Race::WoodElf
                | Race::Hobbit
                | Race::HighElf
                | Race::Beorning
        )
    }

    /// Races on the evil side.
    #[must_use]
    pub const fn is_evil(self) -> bool {
        matches!(
            self,
            Race::Uruk | Race::Orc | Race::Harad | Race::Olog | Race::Easterling
        )
    }

    /// Races too light to break doors down.
    #[must_use]
    pub const fn is_light(self) -> bool {
        matches!(self, Race::WoodElf | Race::HighElf | Race::Hobbit)
    }

    /// How a player corpse of this race is named.
    #[must_use]
    pub const fn corpse_name(self) -> &'static str {
        match self {
            Race::Human => "a Human",
            Race::Dwarf => "a Dwarf",
            Race::WoodElf | Race::HighElf => "an Elf",
            Race::Hobbit => "a Hobbit",
            Race::Beorning => "a Beorning",
            Race::Uruk => "an Uruk",
            Race::Orc => "an Orc",
            Race::Harad => "a Haradrim",
            Race::Olog => "an Olog-Hai",
            Race::Easterling => "an Easterling",
            Race::Beast => "a beast",
        }
    }

    /// Whether two races fight on opposite sides.
    #[must_use]
    pub const fn other_side(self, other: Race) -> bool {
        (self.is_good() && other.is_evil()) || (self.is_evil() && other.is_good())
    }
}

/// Trained combat skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Skill {
    Bash,
    Kick,
    Swing,
    Rescue,
    Riposte,
    Accuracy,
    FindWeakness,
    Stealth,
    Defend,
    Bite,
    Rend,
    Maul,
    Ambush,
}

/// Combat tactics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[allow(missing_docs)]
pub enum Tactics {
    Defensive,
    Careful,
    #[default]
    Normal,
    Aggressive,
    /// Cannot flee.
    Berserk,
}

/// Player specialization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[allow(missing_docs)]
pub enum Specialization {
    #[default]
    None,
    WildFighting,
    HeavyFighting,
    Defender,
    Pets,
}

/// Base abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Abilities {
    pub str: i32,
    pub int: i32,
    pub wil: i32,
    pub dex: i32,
    pub con: i32,
    pub lea: i32,
}

impl Default for Abilities {
    fn default() -> Self {
        Self {
            str: 13,
            int: 13,
            wil: 13,
            dex: 13,
            con: 13,
            lea: 13,
        }
    }
}

impl Abilities {
    /// Death attrition: every positive ability drops to two-thirds.
    pub fn attrition(&mut self) {
        for stat in [
            &mut self.str,
            &mut self.int,
            &mut self.wil,
            &mut self.dex,
            &mut self.con,
            &mut self.lea,
        ] {
            if *stat > 0 {
                *stat = *stat * 2 / 3;
            }
        }
    }
}

/// Profession levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[allow(missing_docs)]
pub struct Profs {
    pub mage: i32,
    pub cleric: i32,
    pub ranger: i32,
    pub warrior: i32,
}

/// Hunger, thirst and drunkenness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Conditions {
    pub full: i32,
    pub thirst: i32,
    pub drunk: i32,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            full: 24,
            thirst: 24,
            drunk: 0,
        }
    }
}

/// A character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Character {
    /// Id, assigned by the world.
    pub id: CharId,
    /// Name; the first word doubles as the targeting keyword.
    pub name: String,
    /// Player or NPC.
    pub kind: ActorKind,
    /// Race.
    pub race: Race,
    /// Level.
    pub level: i32,
    /// Body layout.
    pub body: BodyType,
    /// Body weight.
    pub weight: i32,
    /// Current room.
    pub room: RoomId,

    /// Vitality.
    pub hit: i32,
    /// Maximum vitality.
    pub max_hit: i32,
    /// Mana.
    pub mana: i32,
    /// Movement points.
    pub moves: i32,

    /// Abilities.
    pub abilities: Abilities,
    /// Profession levels.
    pub profs: Profs,
    /// Known skills and their knowledge (0-100).
    pub skills: BTreeMap<Skill, i32>,

    /// Base offensive bonus.
    pub ob: i32,
    /// Base dodge.
    pub dodge: i32,
    /// Base parry.
    pub parry: i32,
    /// Damage bonus.
    pub damroll: i32,
    /// Perception (0-100).
    pub perception: i32,
    /// Skill encumbrance penalty.
    pub skill_penalty: i32,
    /// Dodge encumbrance penalty.
    pub dodge_penalty: i32,

    /// Action energy.
    pub energy: i32,
    /// Energy regained per pulse while ready.
    pub energy_regen: i32,
    /// Parry meter (0-100).
    pub current_parry: i32,
    /// Mental action throttle.
    pub mental_delay: i32,
    /// Readiness.
    pub position: Position,
    /// Posture an NPC returns to.
    pub default_position: Position,
    /// Current opponent.
    pub fighting: Option<CharId>,
    /// Tactics.
    pub tactics: Tactics,
    /// Specialization.
    pub specialization: Specialization,
    /// Status bits.
    pub status: StatusFlags,
    /// Resisted damage classes.
    pub resistant: DamageClasses,
    /// Damage classes that hurt more.
    pub vulnerable: DamageClasses,
    /// Timed modifiers.
    pub affects: AffectSet,

    /// Worn and wielded objects.
    pub equipment: BTreeMap<WearSlot, ObjId>,
    /// Inventory.
    pub carrying: Vec<ObjId>,
    /// Gold.
    pub gold: i32,

    /// Experience.
    pub exp: i32,
    /// Alignment.
    pub alignment: i32,
    /// Spirit points.
    pub spirit: i32,
    /// Hunger and thirst.
    pub conditions: Conditions,
    /// Flee automatically below this vitality (players).
    pub wimp_level: i32,

    /// Followed character.
    pub master: Option<CharId>,
    /// Group leader.
    pub group_leader: Option<CharId>,
    /// Mount being ridden.
    pub mount: Option<CharId>,
    /// Players this NPC remembers as attackers.
    pub memory: BTreeSet<CharId>,

    /// Highest attacker level seen (NPCs).
    pub attacked_level: i32,
    /// Natural attack used when unarmed (NPCs).
    pub natural_attack: Option<HitKind>,
    /// Experience scaling in percent; 0 means unscaled.
    pub difficulty: i32,
    /// Pulse the NPC was loaded.
    pub born_pulse: u64,
    /// Cooldowns in fast updates.
    pub skill_timers: BTreeMap<Skill, i32>,
    /// Room the player loads into.
    pub load_room: Option<RoomId>,
    /// Custom death cry.
    pub death_cry: Option<String>,
}

impl Character {
    fn base(name: &str, kind: ActorKind, level: i32) -> Self {
        Self {
            id: CharId::default(),
            name: name.to_string(),
            kind,
            race: Race::default(),
            level,
            body: BodyType::default(),
            weight: 15_000,
            room: RoomId::default(),
            hit: 100,
            max_hit: 100,
            mana: 0,
            moves: 100,
            abilities: Abilities::default(),
            profs: Profs::default(),
            skills: BTreeMap::new(),
            ob: 0,
            dodge: 0,
            parry: 0,
            damroll: 0,
            perception: 0,
            skill_penalty: 0,
            dodge_penalty: 0,
            energy: 0,
            energy_regen: 100,
            current_parry: 100,
            mental_delay: 0,
            position: Position::Standing,
            default_position: Position::Standing,
            fighting: None,
            tactics: Tactics::default(),
            specialization: Specialization::default(),
            status: StatusFlags::empty(),
            resistant: DamageClasses::empty(),
            vulnerable: DamageClasses::empty(),
            affects: AffectSet::new(),
            equipment: BTreeMap::new(),
            carrying: Vec::new(),
            gold: 0,
            exp: 0,
            alignment: 0,
            spirit: 0,
            conditions: Conditions::default(),
            wimp_level: 0,
            master: None,
            group_leader: None,
            mount: None,
            memory: BTreeSet::new(),
            attacked_level: 0,
            natural_attack: None,
            difficulty: 0,
            born_pulse: 0,
            skill_timers: BTreeMap::new(),
            load_room: None,
            death_cry: None,
        }
    }

    /// A connected player.
    #[must_use]
    pub fn player(name: &str, idnum: u32, level: i32) -> Self {
        Self::base(
            name,
            ActorKind::Player {
                idnum,
                connected: true,
            },
            level,
        )
    }

    /// An NPC.
    #[must_use]
    pub fn npc(name: &str, vnum: u32, level: i32) -> Self {
        Self::base(
            name,
            ActorKind::Npc {
                vnum,
                flags: MobFlags::empty(),
            },
            level,
        )
    }

    /// Whether this is an NPC.
    #[must_use]
    pub const fn is_npc(&self) -> bool {
        matches!(self.kind, ActorKind::Npc { .. })
    }

    /// NPCs always count as present; players only with a session.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        match self.kind {
            ActorKind::Player { connected, .. } => connected,
            ActorKind::Npc { .. } => true,
        }
    }

    /// NPC behaviour flags; empty for players.
    #[must_use]
    pub const fn mob_flags(&self) -> MobFlags {
        match self.kind {
            ActorKind::Npc { flags, .. } => flags,
            ActorKind::Player { .. } => MobFlags::empty(),
        }
    }

    /// Whether an NPC carries the flag.
    #[must_use]
    pub const fn has_mob_flag(&self, flag: MobFlags) -> bool {
        self.mob_flags().contains(flag)
    }

    /// Set NPC flags. No effect on players.
    pub fn set_mob_flags(&mut self, new_flags: MobFlags) {
        if let ActorKind::Npc { flags, .. } = &mut self.kind {
            *flags = new_flags;
        }
    }

    /// Corpse owner id: NPC virtual number or negated player id.
    #[must_use]
    pub const fn owner_id(&self) -> i64 {
        match self.kind {
            ActorKind::Player { idnum, .. } => -(idnum as i64),
            ActorKind::Npc { vnum, .. } => vnum as i64,
        }
    }

    /// First word of the name.
    #[must_use]
    pub fn keyword(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    /// Skill knowledge, 0 when untrained.
    #[must_use]
    pub fn skill(&self, skill: Skill) -> i32 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }

    /// Offensive bonus after modifiers.
    #[must_use]
    pub fn real_ob(&self) -> i32 {
        self.ob + self.affects.sum_modifier(ApplyLocation::Ob)
    }

    /// Dodge after modifiers.
    #[must_use]
    pub fn real_dodge(&self) -> i32 {
        self.dodge + self.affects.sum_modifier(ApplyLocation::Dodge)
    }

    /// Parry after modifiers.
    #[must_use]
    pub fn real_parry(&self) -> i32 {
        self.parry + self.affects.sum_modifier(ApplyLocation::Parry)
    }

    /// Whether physical blows pass through this character.
    #[must_use]
    pub const fn is_incorporeal(&self) -> bool {
        self.status.contains(StatusFlags::INCORPOREAL)
    }

    /// Whether this character fights with the will.
    #[must_use]
    pub const fn is_mental(&self) -> bool {
        self.status.contains(StatusFlags::MENTAL_FIGHTER)
    }

    /// Whether charmed.
    #[must_use]
    pub const fn is_charmed(&self) -> bool {
        self.status.contains(StatusFlags::CHARMED)
    }

    /// Whether hidden.
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.status.contains(StatusFlags::HIDDEN)
    }

    /// Whether wielding two-handed.
    #[must_use]
    pub const fn is_two_handed(&self) -> bool {
        self.status.contains(StatusFlags::TWO_HANDED)
    }

    /// Good by alignment.
    #[must_use]
    pub const fn is_good(&self) -> bool {
        self.alignment >= 350
    }

    /// Whether this NPC is hostile to `other` by race.
    #[must_use]
    pub const fn is_aggressive_to(&self, other: &Character) -> bool {
        let flags = self.mob_flags();
        flags.contains(MobFlags::AGGRESSIVE)
            || (flags.contains(MobFlags::AGGR_GOOD) && other.race.is_good())
            || (flags.contains(MobFlags::AGGR_EVIL) && other.race.is_evil())
    }

    /// Resistance to a damage class: 1 resists, -1 vulnerable, 0 neither.
    #[must_use]
    pub fn resistance_to(&self, class: DamageClasses) -> i32 {
        if class.is_empty() {
            0
        } else if self.resistant.intersects(class) {
            1
        } else if self.vulnerable.intersects(class) {
            -1
        } else {
            0
        }
    }

    /// Readiness implied by current vitality.
    #[must_use]
    pub fn derived_position(&self) -> Position {
        Position::from_vitality(self.hit, self.abilities.con, self.fighting.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affects::{Affect, AffectKind};

    #[test]
    fn test_real_stats_include_affects() {
        let mut ch = Character::player("Aragorn", 1, 20);
        ch.dodge = 30;
        ch.affects.apply(Affect::new(AffectKind::Maul, 4, -5).with_location(ApplyLocation::Dodge));
        assert_eq!(ch.real_dodge(), 25);
        assert_eq!(ch.real_ob(), 0);
    }

    #[test]
    fn test_owner_id() {
        assert_eq!(Character::player("Frodo", 42, 5).owner_id(), -42);
        assert_eq!(Character::npc("orc", 3001, 5).owner_id(), 3001);
    }

    #[test]
    fn test_attrition_keeps_non_positive() {
        let mut abilities = Abilities {
            str: 18,
            int: 0,
            wil: 10,
            dex: 3,
            con: 20,
            lea: -2,
        };
        abilities.attrition();
        assert_eq!(abilities.str, 12);
        assert_eq!(abilities.int, 0);
        assert_eq!(abilities.dex, 2);
        assert_eq!(abilities.con, 13);
        assert_eq!(abilities.lea, -2);
    }

    #[test]
    fn test_sides() {
        assert!(Race::Human.other_side(Race::Orc));
        assert!(!Race::Human.other_side(Race::Dwarf));
        assert!(!Race::Beast.other_side(Race::Orc));
    }

    #[test]
    fn test_resistance() {
        let mut ch = Character::npc("wight", 10, 10);
        ch.resistant = DamageClasses::COLD;
        ch.vulnerable = DamageClasses::FIRE;
        assert_eq!(ch.resistance_to(DamageClasses::COLD), 1);
        assert_eq!(ch.resistance_to(DamageClasses::FIRE), -1);
        assert_eq!(ch.resistance_to(DamageClasses::SLASH), 0);
        assert_eq!(ch.resistance_to(DamageClasses::empty()), 0);
    }
}
