//! Test fixtures and helpers.
//!
//! Pre-built worlds, fighters and engaged fights for consistent testing.

use mud_core::prelude::*;
use mud_core::objects::{ArmorStats, Material, ObjectLocation, WeaponStats};

/// Respawn room used by fixture worlds.
pub const TEMPLE: RoomId = RoomId(1);
/// Immortal respawn room used by fixture worlds.
pub const VOID: RoomId = RoomId(2);
/// Room every fixture fight happens in.
pub const ARENA: RoomId = RoomId(10);
/// Room north of the arena.
pub const YARD: RoomId = RoomId(11);

/// Respawn rooms, an arena and a yard to flee into.
#[must_use]
pub fn arena_world() -> World {
    let mut world = World::new();
    world.add_room(Room::new(TEMPLE, "The Temple"));
    world.add_room(Room::new(VOID, "The Void"));
    world.add_room(
        Room::new(ARENA, "The Arena")
            .with_exit(Direction::North, mud_core::world::Exit::open(YARD)),
    );
    world.add_room(
        Room::new(YARD, "The Yard")
            .with_exit(Direction::South, mud_core::world::Exit::open(ARENA)),
    );
    world
}

/// A trained player warrior standing in the arena.
#[must_use]
pub fn fighter(name: &str, idnum: u32, level: i32) -> Character {
    let mut ch = Character::player(name, idnum, level);
    ch.room = ARENA;
    ch.max_hit = 60 + level * 8;
    ch.hit = ch.max_hit;
    ch.ob = 20 + level * 2;
    ch.dodge = 10 + level / 2;
    ch.parry = 10 + level;
    ch.profs.warrior = level;
    ch.exp = 10_000;
    ch
}

/// An NPC standing in the arena.
#[must_use]
pub fn monster(name: &str, vnum: u32, level: i32) -> Character {
    let mut ch = Character::npc(name, vnum, level);
    ch.room = ARENA;
    ch.max_hit = 40 + level * 6;
    ch.hit = ch.max_hit;
    ch.ob = 15 + level * 2;
    ch.dodge = 5 + level / 2;
    ch.parry = 5 + level;
    ch.profs.warrior = level;
    ch.gold = level * 3;
    ch
}

/// A one-handed slashing sword.
#[must_use]
pub fn sword() -> Object {
    Object::weapon(
        "sword long",
        "a long sword",
        WeaponStats {
            damage: 8,
            weapon_type: 3,
            bulk: 3,
            spirit_bane: false,
        },
    )
}

/// A leather jerkin.
#[must_use]
pub fn jerkin() -> Object {
    Object::armor(
        "jerkin leather",
        "a leather jerkin",
        ArmorStats {
            min_absorb: 1,
            absorb: 10,
            material: Material::Leather,
        },
    )
}

/// Arm `ch` with a sword and a jerkin.
///
/// # Panics
///
/// Panics if `ch` is not in the world.
pub fn equip(world: &mut World, ch: CharId) {
    world
        .add_object(sword(), ObjectLocation::Worn(ch, WearSlot::Wield))
        .expect("fixture character exists");
    world
        .add_object(jerkin(), ObjectLocation::Worn(ch, WearSlot::Body))
        .expect("fixture character exists");
}

/// A player and an NPC already engaged with each other.
///
/// Returns `(engine, player, npc)`.
#[must_use]
pub fn duel(seed: u64) -> (CombatEngine, CharId, CharId) {
    let mut world = arena_world();
    let hero = world.add_character(fighter("Beleg", 1, 20));
    let orc = world.add_character(monster("orc", 100, 18));
    equip(&mut world, hero);
    let mut engine = CombatEngine::new(CombatConfig::default(), world, seed);
    engine.engage(hero, orc);
    engine.engage(orc, hero);
    (engine, hero, orc)
}

/// Several players against several NPCs, every character engaged.
///
/// Each player attacks the NPC at the same index (wrapping), and each NPC
/// attacks the player at its index.
#[must_use]
pub fn brawl(seed: u64, players: usize, monsters: usize) -> (CombatEngine, Vec<CharId>, Vec<CharId>) {
    let mut world = arena_world();
    let heroes: Vec<CharId> = (0..players)
        .map(|i| {
            let idnum = u32::try_from(i).unwrap_or(0) + 1;
            let level = 10 + i32::try_from(i % 10).unwrap_or(0);
            world.add_character(fighter(&format!("Hero{idnum}"), idnum, level))
        })
        .collect();
    let foes: Vec<CharId> = (0..monsters)
        .map(|i| {
            let vnum = 200 + u32::try_from(i).unwrap_or(0);
            let level = 8 + i32::try_from(i % 12).unwrap_or(0);
            world.add_character(monster("orc", vnum, level))
        })
        .collect();
    for &hero in &heroes {
        equip(&mut world, hero);
    }
    let mut engine = CombatEngine::new(CombatConfig::default(), world, seed);
    if !foes.is_empty() {
        for (i, &hero) in heroes.iter().enumerate() {
            engine.engage(hero, foes[i % foes.len()]);
        }
    }
    if !heroes.is_empty() {
        for (i, &foe) in foes.iter().enumerate() {
            engine.engage(foe, heroes[i % heroes.len()]);
        }
    }
    (engine, heroes, foes)
}

/// Run pulses until nobody is fighting or `max_pulses` have passed.
///
/// Returns the number of pulses run.
pub fn run_until_quiet(engine: &mut CombatEngine, max_pulses: u64) -> u64 {
    for n in 0..max_pulses {
        if engine.roster().is_empty() {
            return n;
        }
        engine.pulse();
    }
    max_pulses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duel_is_engaged() {
        let (engine, hero, orc) = duel(1);
        assert_eq!(engine.world().character(hero).unwrap().fighting, Some(orc));
        assert_eq!(engine.world().character(orc).unwrap().fighting, Some(hero));
        assert!(engine.world().weapon_of(hero).is_some());
        assert!(engine.roster_invariant_holds());
    }

    #[test]
    fn test_brawl_sizes() {
        let (engine, heroes, foes) = brawl(1, 3, 5);
        assert_eq!(heroes.len(), 3);
        assert_eq!(foes.len(), 5);
        assert_eq!(engine.roster().len(), 8);
    }

    #[test]
    fn test_duel_ends() {
        let (mut engine, _, _) = duel(3);
        let pulses = run_until_quiet(&mut engine, 20_000);
        assert!(pulses < 20_000, "duel never ended");
        assert!(engine.roster_invariant_holds());
    }
}
