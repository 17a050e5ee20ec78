//! Running away.

use crate::character::MobFlags;
use crate::engine::{CombatEngine, To};
use crate::ids::{CharId, RoomId};
use crate::position::Position;
use crate::world::{Direction, ExitFlags, RoomFlags};

use super::CommandOutcome;

/// Tries at a random exit before giving up.
const FLEE_ATTEMPTS: usize = 6;

impl CombatEngine {
    /// Flee through a random usable exit.
    ///
    /// Used both by the `flee` command and by automatic flight (wimpy,
    /// linkless players).
    pub(crate) fn flee(&mut self, ch: CharId) -> CommandOutcome {
        if self.is_berserk(ch) {
            return self.reject(ch, "You are too enraged to flee!");
        }
        let Some(position) = self.world.character(ch).map(|c| c.position) else {
            return CommandOutcome::Rejected(String::new());
        };
        if position < Position::Sleeping {
            return CommandOutcome::Rejected(String::new());
        }
        if position < Position::Fighting {
            self.stand(ch);
        }

        for _ in 0..FLEE_ATTEMPTS {
            let last = i32::try_from(Direction::ALL.len()).unwrap_or(1) - 1;
            let index = usize::try_from(self.rng.range(0, last)).unwrap_or(0);
            let dir = Direction::ALL[index];
            let Some((to, cost)) = self.flee_exit(ch, dir) else {
                continue;
            };

            self.act("$n panics, and attempts to flee!", ch, None, To::Room);
            let moves = self.world.character(ch).map_or(0, |c| c.moves);
            if moves < cost {
                if self.rng.range(0, 1) == 1 {
                    self.act("$n tries to flee, but is too exhausted!", ch, None, To::Room);
                    self.tell(ch, "You are too exhausted to flee!");
                }
                break;
            }

            self.escape(ch, dir, to, cost);
            return CommandOutcome::Performed;
        }

        self.tell(ch, "PANIC!  You couldn't escape!");
        self.act("$n panics, and attempts to flee!", ch, None, To::Room);
        CommandOutcome::Rejected("PANIC!  You couldn't escape!".to_string())
    }

    /// Destination and movement cost of a usable escape route.
    fn flee_exit(&self, ch: CharId, dir: Direction) -> Option<(RoomId, i32)> {
        if !self.world.can_go(ch, dir) {
            return None;
        }
        let c = self.world.character(ch)?;
        let here = self.world.room(c.room)?;
        let exit = self.world.exit(c.room, dir)?;
        if exit.flags.intersects(ExitFlags::NO_FLEE | ExitFlags::NO_WALK) {
            return None;
        }
        let there = self.world.room(exit.to_room)?;
        if there.flags.contains(RoomFlags::DEATH) {
            return None;
        }
        if c.has_mob_flag(MobFlags::STAY_ZONE) && there.zone != here.zone {
            return None;
        }
        if c.has_mob_flag(MobFlags::STAY_SECTOR) && there.sector != here.sector {
            return None;
        }
        let cost = (here.sector.move_cost() + there.sector.move_cost()) / 2;
        Some((exit.to_room, cost))
    }

    fn escape(&mut self, ch: CharId, dir: Direction, to: RoomId, cost: i32) {
        let Some(c) = self.world.character(ch) else {
            return;
        };
        if let Some(opponent) = c.fighting {
            let opponent_level = self.world.character(opponent).map_or(0, |o| o.level);
            let loss = c.level + opponent_level;
            let room = c.room;
            if let Some(c) = self.world.character_mut(ch) {
                if !c.is_npc() {
                    c.exp -= loss;
                }
            }
            let attackers: Vec<CharId> = self
                .world
                .people_in(room)
                .into_iter()
                .filter(|&p| {
                    self.world
                        .character(p)
                        .is_some_and(|pc| pc.fighting == Some(ch))
                })
                .collect();
            for attacker in attackers {
                self.disengage(attacker);
            }
            self.disengage(ch);
        }

        self.tell(ch, "You flee head over heels.");
        self.act("$n flees head over heels!", ch, None, To::Room);
        if let Some(c) = self.world.character_mut(ch) {
            c.moves -= cost;
        }
        match self.world.move_character(ch, to) {
            Ok(()) => {
                tracing::debug!(ch = %ch, dir = dir.name(), room = %to, "Fled");
                self.act("$n arrives, panting.", ch, None, To::Room);
            }
            Err(e) => tracing::error!(ch = %ch, error = %e, "Flee destination vanished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Character, Tactics};
    use crate::commands::CombatCommand;
    use crate::config::CombatConfig;
    use crate::world::{Exit, Room, World};

    fn corridor(exit_flags: ExitFlags, deadly: bool) -> (CombatEngine, CharId, CharId) {
        let mut world = World::new();
        let mut exit = Exit::open(RoomId(2));
        exit.flags = exit_flags;
        world.add_room(Room::new(RoomId(1), "Hall").with_exit(Direction::North, exit));
        let mut far = Room::new(RoomId(2), "Gallery");
        if deadly {
            far.flags.insert(RoomFlags::DEATH);
        }
        world.add_room(far);
        let mut hero = Character::player("Turin", 1, 12);
        hero.room = RoomId(1);
        hero.exp = 1000;
        let mut dragon = Character::npc("dragon", 50, 30);
        dragon.room = RoomId(1);
        let hero = world.add_character(hero);
        let dragon = world.add_character(dragon);
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 5);
        engine.engage(hero, dragon);
        engine.engage(dragon, hero);
        (engine, hero, dragon)
    }

    fn flee_until_moved(engine: &mut CombatEngine, hero: CharId) -> bool {
        for _ in 0..50 {
            engine.execute(hero, CombatCommand::Flee).unwrap();
            if engine.world().character(hero).unwrap().room == RoomId(2) {
                return true;
            }
        }
        false
    }

    #[test]
    fn test_flee_escapes_and_costs_exp() {
        let (mut engine, hero, dragon) = corridor(ExitFlags::empty(), false);
        assert!(flee_until_moved(&mut engine, hero));
        let h = engine.world().character(hero).unwrap();
        assert_eq!(h.exp, 1000 - (12 + 30));
        assert!(h.fighting.is_none());
        assert!(h.moves < 100);
        assert!(engine.world().character(dragon).unwrap().fighting.is_none());
    }

    #[test]
    fn test_no_flee_exit_never_used() {
        let (mut engine, hero, _) = corridor(ExitFlags::NO_FLEE, false);
        assert!(!flee_until_moved(&mut engine, hero));
        assert_eq!(engine.world().character(hero).unwrap().exp, 1000);
    }

    #[test]
    fn test_death_room_never_fled_into() {
        let (mut engine, hero, _) = corridor(ExitFlags::empty(), true);
        assert!(!flee_until_moved(&mut engine, hero));
    }

    #[test]
    fn test_exhausted_cannot_flee() {
        let (mut engine, hero, _) = corridor(ExitFlags::empty(), false);
        engine.world_mut().character_mut(hero).unwrap().moves = 0;
        assert!(!flee_until_moved(&mut engine, hero));
    }

    #[test]
    fn test_berserk_refuses() {
        let (mut engine, hero, _) = corridor(ExitFlags::empty(), false);
        engine.world_mut().character_mut(hero).unwrap().tactics = Tactics::Berserk;
        assert_eq!(
            engine.execute(hero, CombatCommand::Flee).unwrap(),
            CommandOutcome::Rejected("You are too enraged to flee!".into())
        );
    }

    #[test]
    fn test_stay_zone_npc_keeps_to_zone() {
        let (mut engine, _, dragon) = corridor(ExitFlags::empty(), false);
        let flags = engine.world().character(dragon).unwrap().mob_flags() | MobFlags::STAY_ZONE;
        engine.world_mut().character_mut(dragon).unwrap().set_mob_flags(flags);
        let mut far = Room::new(RoomId(3), "Elsewhere");
        far.zone = 9;
        engine.world_mut().add_room(far);
        if let Some(exit) = engine.world_mut().exit_mut(RoomId(1), Direction::North) {
            exit.to_room = RoomId(3);
        }
        for _ in 0..30 {
            engine.execute(dragon, CombatCommand::Flee).unwrap();
        }
        assert_eq!(engine.world().character(dragon).unwrap().room, RoomId(1));
    }
}
