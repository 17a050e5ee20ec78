//! Scenario loading and configuration.
//!
//! Scenarios define the rooms, combatants, opening engagements and scripted
//! commands of a headless fight.

use std::collections::BTreeMap;
use std::path::Path;

use mud_core::character::{
    Abilities, Character, Profs, Race, Skill, Specialization, Tactics,
};
use mud_core::commands::CombatCommand;
use mud_core::config::CombatConfig;
use mud_core::engine::CombatEngine;
use mud_core::error::CombatError;
use mud_core::ids::{CharId, RoomId};
use mud_core::objects::{ArmorStats, Object, ObjectLocation, WeaponStats, WearSlot};
use mud_core::world::{Direction, Exit, ExitFlags, Room, RoomFlags, Sector, World};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario describes a world the engine rejects.
    #[error("Failed to build scenario: {0}")]
    Build(#[from] CombatError),
    /// A name used by the scenario matches no combatant.
    #[error("Unknown combatant '{0}'")]
    UnknownCombatant(String),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Default seed when the caller gives none.
    #[serde(default)]
    pub seed: u64,
    /// Combat rules.
    #[serde(default)]
    pub config: CombatConfig,
    /// Rooms.
    pub rooms: Vec<RoomSetup>,
    /// Everyone taking part, in world insertion order.
    pub combatants: Vec<CombatantSetup>,
    /// Opening engagements, attacker first.
    #[serde(default)]
    pub fights: Vec<(String, String)>,
    /// Commands issued during the run.
    #[serde(default)]
    pub script: Vec<ScriptStep>,
    /// Pulse limit for a run.
    #[serde(default = "default_max_pulses")]
    pub max_pulses: u64,
}

fn default_max_pulses() -> u64 {
    12_000
}

/// A room of the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSetup {
    /// Virtual number.
    pub id: u32,
    /// Name.
    pub name: String,
    /// Zone number.
    #[serde(default)]
    pub zone: u32,
    /// Terrain.
    #[serde(default)]
    pub sector: Sector,
    /// Room flags.
    #[serde(default)]
    pub flags: RoomFlags,
    /// Exits.
    #[serde(default)]
    pub exits: Vec<ExitSetup>,
}

/// One exit of a scenario room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSetup {
    /// Direction.
    pub dir: Direction,
    /// Destination room.
    pub to: u32,
    /// Door keyword; the exit starts as a closed door when set.
    #[serde(default)]
    pub door: Option<String>,
    /// Extra exit flags.
    #[serde(default)]
    pub flags: ExitFlags,
}

/// Player or NPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    /// A connected player.
    Player {
        /// Player id number.
        idnum: u32,
    },
    /// An NPC.
    Npc {
        /// Prototype number.
        vnum: u32,
    },
}

/// A combatant of the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantSetup {
    /// Name; the first word is the targeting keyword.
    pub name: String,
    /// Player or NPC.
    pub controller: Controller,
    /// Level.
    pub level: i32,
    /// Starting room.
    pub room: u32,
    /// Race.
    #[serde(default)]
    pub race: Race,
    /// Maximum (and starting) vitality.
    #[serde(default = "default_vitality")]
    pub vitality: i32,
    /// Offensive bonus.
    #[serde(default)]
    pub ob: i32,
    /// Dodge bonus.
    #[serde(default)]
    pub dodge: i32,
    /// Parry bonus.
    #[serde(default)]
    pub parry: i32,
    /// Damage roll.
    #[serde(default)]
    pub damroll: i32,
    /// Ability scores.
    #[serde(default)]
    pub abilities: Option<Abilities>,
    /// Class levels.
    #[serde(default)]
    pub profs: Profs,
    /// Known skills.
    #[serde(default)]
    pub skills: BTreeMap<Skill, i32>,
    /// Fighting stance.
    #[serde(default)]
    pub tactics: Tactics,
    /// Specialization.
    #[serde(default)]
    pub specialization: Specialization,
    /// Wielded weapon.
    #[serde(default)]
    pub weapon: Option<WeaponStats>,
    /// Body armor.
    #[serde(default)]
    pub armor: Option<ArmorStats>,
    /// Gold carried.
    #[serde(default)]
    pub gold: i32,
}

fn default_vitality() -> i32 {
    100
}

/// A command issued at a given pulse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Pulse the command is issued before.
    pub at: u64,
    /// Name of the issuer.
    pub actor: String,
    /// The command.
    pub command: CombatCommand,
}

/// A scenario turned into a live engine.
#[derive(Debug, Clone)]
pub struct BuiltScenario {
    /// The engine, seeded and with opening engagements made.
    pub engine: CombatEngine,
    /// Combatant names to ids.
    pub names: BTreeMap<String, CharId>,
    /// Script with actors resolved.
    pub script: Vec<(u64, CharId, CombatCommand)>,
}

impl BuiltScenario {
    /// Name of a character, or its id when unnamed.
    #[must_use]
    pub fn name_of(&self, id: CharId) -> String {
        self.names
            .iter()
            .find(|(_, v)| **v == id)
            .map_or_else(|| id.to_string(), |(k, _)| k.clone())
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::duel()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A ranger and an orc already at each other's throats.
    #[must_use]
    pub fn duel() -> Self {
        let mut hero = CombatantSetup::new("Beleg", Controller::Player { idnum: 1 }, 20, 10);
        hero.vitality = 220;
        hero.ob = 60;
        hero.dodge = 20;
        hero.parry = 30;
        hero.profs.warrior = 20;
        hero.profs.ranger = 10;
        hero.weapon = Some(WeaponStats {
            damage: 8,
            weapon_type: 3,
            bulk: 3,
            spirit_bane: false,
        });
        let mut orc = CombatantSetup::new("orc", Controller::Npc { vnum: 100 }, 18, 10);
        orc.vitality = 150;
        orc.ob = 50;
        orc.dodge = 14;
        orc.parry = 20;
        orc.profs.warrior = 18;

        Self {
            name: "Duel".to_string(),
            description: "One player against one orc in a closed arena".to_string(),
            seed: 0,
            config: CombatConfig::default(),
            rooms: vec![
                RoomSetup::new(1, "The Temple"),
                RoomSetup::new(2, "The Void"),
                RoomSetup::new(10, "The Arena"),
            ],
            combatants: vec![hero, orc],
            fights: vec![
                ("Beleg".to_string(), "orc".to_string()),
                ("orc".to_string(), "Beleg".to_string()),
            ],
            script: Vec::new(),
            max_pulses: default_max_pulses(),
        }
    }

    /// Build the world and engine for `seed`.
    pub fn build(&self, seed: u64) -> Result<BuiltScenario, ScenarioError> {
        let mut world = World::new();
        for setup in &self.rooms {
            world.add_room(setup.to_room());
        }

        let mut names = BTreeMap::new();
        for setup in &self.combatants {
            let id = world.add_character(setup.to_character());
            if let Some(stats) = setup.weapon {
                world.add_object(
                    Object::weapon("weapon", "a weapon", stats),
                    ObjectLocation::Worn(id, WearSlot::Wield),
                )?;
            }
            if let Some(stats) = setup.armor {
                world.add_object(
                    Object::armor("armor", "a suit of armor", stats),
                    ObjectLocation::Worn(id, WearSlot::Body),
                )?;
            }
            names.insert(setup.name.clone(), id);
        }

        let lookup = |name: &str| {
            names
                .get(name)
                .copied()
                .ok_or_else(|| ScenarioError::UnknownCombatant(name.to_string()))
        };

        let mut engine = CombatEngine::new(self.config.clone(), world, seed);
        for (attacker, victim) in &self.fights {
            let (a, v) = (lookup(attacker)?, lookup(victim)?);
            engine.engage(a, v);
        }

        let mut script = Vec::with_capacity(self.script.len());
        for step in &self.script {
            script.push((step.at, lookup(&step.actor)?, step.command.clone()));
        }

        tracing::debug!(
            scenario = %self.name,
            seed,
            combatants = names.len(),
            "Scenario built"
        );

        Ok(BuiltScenario {
            engine,
            names,
            script,
        })
    }
}

impl RoomSetup {
    /// A plain room without exits.
    #[must_use]
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            zone: 0,
            sector: Sector::default(),
            flags: RoomFlags::empty(),
            exits: Vec::new(),
        }
    }

    fn to_room(&self) -> Room {
        let mut room = Room::new(RoomId(self.id), &self.name);
        room.zone = self.zone;
        room.sector = self.sector;
        room.flags = self.flags;
        for exit in &self.exits {
            let mut built = match &exit.door {
                Some(keyword) => Exit::door(RoomId(exit.to), keyword),
                None => Exit::open(RoomId(exit.to)),
            };
            built.flags |= exit.flags;
            room.exits.insert(exit.dir, built);
        }
        room
    }
}

impl CombatantSetup {
    /// A combatant with default stats.
    #[must_use]
    pub fn new(name: &str, controller: Controller, level: i32, room: u32) -> Self {
        Self {
            name: name.to_string(),
            controller,
            level,
            room,
            race: Race::default(),
            vitality: default_vitality(),
            ob: 0,
            dodge: 0,
            parry: 0,
            damroll: 0,
            abilities: None,
            profs: Profs::default(),
            skills: BTreeMap::new(),
            tactics: Tactics::default(),
            specialization: Specialization::default(),
            weapon: None,
            armor: None,
            gold: 0,
        }
    }

    fn to_character(&self) -> Character {
        let mut ch = match self.controller {
            Controller::Player { idnum } => Character::player(&self.name, idnum, self.level),
            Controller::Npc { vnum } => Character::npc(&self.name, vnum, self.level),
        };
        ch.room = RoomId(self.room);
        ch.race = self.race;
        ch.max_hit = self.vitality;
        ch.hit = self.vitality;
        ch.ob = self.ob;
        ch.dodge = self.dodge;
        ch.parry = self.parry;
        ch.damroll = self.damroll;
        if let Some(abilities) = self.abilities {
            ch.abilities = abilities;
        }
        ch.profs = self.profs;
        ch.skills = self.skills.clone();
        ch.tactics = self.tactics;
        ch.specialization = self.specialization;
        ch.gold = self.gold;
        ch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mud_core::commands::Target;

    const BRIDGE: &str = r#"
(
    name: "Bridge",
    seed: 7,
    rooms: [
        (id: 1, name: "Temple"),
        (id: 20, name: "Bridge", exits: [(dir: East, to: 21, door: Some("gate"))]),
        (id: 21, name: "Far Bank", sector: Field),
    ],
    combatants: [
        (name: "Hurin", controller: Player(idnum: 1), level: 25, room: 20, vitality: 300, ob: 70),
        (name: "troll", controller: Npc(vnum: 500), level: 22, room: 20, vitality: 250),
    ],
    fights: [("troll", "Hurin")],
    script: [(at: 5, actor: "Hurin", command: Hit(Name("troll")))],
)
"#;

    #[test]
    fn test_default_is_duel() {
        let scenario = Scenario::default();
        assert_eq!(scenario.name, "Duel");
        assert_eq!(scenario.combatants.len(), 2);
    }

    #[test]
    fn test_parse_ron() {
        let scenario = Scenario::from_ron_str(BRIDGE).unwrap();
        assert_eq!(scenario.name, "Bridge");
        assert_eq!(scenario.seed, 7);
        assert_eq!(scenario.max_pulses, 12_000);
        assert_eq!(scenario.rooms[1].exits[0].door.as_deref(), Some("gate"));
        assert_eq!(
            scenario.script[0].command,
            CombatCommand::Hit(Target::Name("troll".into()))
        );
    }

    #[test]
    fn test_build_engages_and_equips() {
        let built = Scenario::duel().build(3).unwrap();
        let hero = built.names["Beleg"];
        let orc = built.names["orc"];
        let world = built.engine.world();
        assert_eq!(world.character(hero).unwrap().fighting, Some(orc));
        assert!(world.weapon_of(hero).is_some());
        assert!(world.weapon_of(orc).is_none());
        assert_eq!(built.name_of(orc), "orc");
    }

    #[test]
    fn test_build_doors() {
        let built = Scenario::from_ron_str(BRIDGE).unwrap().build(1).unwrap();
        let exit = built.engine.world().exit(RoomId(20), Direction::East).unwrap();
        assert!(exit.flags.contains(ExitFlags::IS_DOOR | ExitFlags::CLOSED));
        assert_eq!(exit.keyword(), "gate");
        assert_eq!(built.script.len(), 1);
    }

    #[test]
    fn test_unknown_fighter() {
        let mut scenario = Scenario::duel();
        scenario.fights.push(("Beleg".into(), "balrog".into()));
        assert!(matches!(
            scenario.build(0),
            Err(ScenarioError::UnknownCombatant(name)) if name == "balrog"
        ));
    }

    #[test]
    fn test_bad_ron() {
        assert!(matches!(
            Scenario::from_ron_str("(name: "),
            Err(ScenarioError::ParseError(_))
        ));
    }
}
