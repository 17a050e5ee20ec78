//! Death pipeline: rewards, penalties, corpses and respawn.

use crate::attack::AttackKind;
use crate::character::{Character, MobFlags};
use crate::engine::{CombatEngine, DeathEvent, To};
use crate::error::{CombatError, Result};
use crate::ids::{CharId, ObjId};
use crate::objects::{CorpseData, Object, ObjectKind, ObjectLocation};
use crate::position::Position;
use crate::world::{AuditKind, Direction};

/// Experience below this is never taken away by a death.
const EXP_DEATH_FLOOR: i32 = 3000;

/// Inputs to [`exp_with_modifiers`] that come from the world rather than
/// the two characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpContext {
    /// Current pulse.
    pub pulse: u64,
    /// Pulses per mud hour.
    pub pulses_per_mud_hour: u64,
    /// Average NPC lifetime in mud hours.
    pub average_mob_life: i32,
    /// East-west coordinate of the killer's zone.
    pub zone_x: i32,
}

/// Experience `ch` earns from a `base_exp` share of killing `victim`.
#[must_use]
pub fn exp_with_modifiers(ch: &Character, victim: &Character, base_exp: i32, ctx: ExpContext) -> i32 {
    if ch.race == crate::character::Race::Orc && victim.has_mob_flag(MobFlags::ORC_FRIEND) {
        return 0;
    }

    let mut base = base_exp / (ch.level + 1).max(victim.level - 2).max(1);
    if !victim.is_npc() {
        return base;
    }

    if victim.level + 6 < ch.level {
        base = 6 * base / (ch.level - victim.level);
    }

    let mut exp = base;
    let hours = ctx.pulse.saturating_sub(victim.born_pulse) / ctx.pulses_per_mud_hour.max(1);
    let age = i32::try_from(hours).unwrap_or(i32::MAX / 40) * 40 / (victim.level + 20).max(1);
    let life = ctx.average_mob_life.max(1);

    if victim.level > 5 {
        exp = if age < life {
            exp * (life * 60 + age * 40) / (life * 100)
        } else {
            exp * (140 - 40 * life / age.max(1)) / 100
        };
    }

    if victim.is_aggressive_to(ch) {
        exp += base / 5;
    }
    if victim.has_mob_flag(MobFlags::FAST) {
        exp += base / 10;
    }
    if victim.has_mob_flag(MobFlags::SWITCHING) {
        exp += base / 10;
    }
    if victim.has_mob_flag(MobFlags::MEMORY) {
        exp += base / 20;
    }
    if victim.default_position < Position::Standing {
        exp -= base / 20;
    }
    if ch.is_good() && victim.is_good() {
        exp = exp * 2 / 3;
    }
    if victim.has_mob_flag(MobFlags::SPEC) {
        exp += base / 10;
    }
    if victim.difficulty != 0 {
        exp = exp * victim.difficulty / 100;
    }

    // East of the river pays more for the free peoples.
    if ch.race.is_good() && ctx.zone_x > 8 {
        exp += exp * (ctx.zone_x - 8).min(5) * 3 / 100;
    }

    exp + 2 * exp / (ch.level - 1).max(1)
}

/// Alignment of `ch` after killing `victim`, clamped to `bounds`.
#[must_use]
pub fn change_alignment(ch: &Character, victim: &Character, bounds: (i32, i32)) -> i32 {
    let (mine, theirs) = (ch.alignment, victim.alignment);
    if ch.id == victim.id || theirs == 0 {
        return mine;
    }
    let hostile = victim.is_aggressive_to(ch);

    let shift = if ch.race.is_good() {
        if theirs > 0 {
            if hostile {
                -theirs / 10
            } else {
                -theirs / 2
            }
        } else if mine >= 0 {
            -theirs / 25
        } else if hostile {
            (mine / 2 - theirs).max(0) / 100
        } else {
            (mine / 2 - theirs).max(0) / 200
        }
    } else if theirs < mine {
        1
    } else {
        -theirs / 25
    };

    (mine + shift).clamp(bounds.0, bounds.1)
}

/// Experience a player loses on death.
#[must_use]
pub fn death_penalty(exp: i32, level: i32, full: bool) -> i32 {
    let penalty = (-(exp - EXP_DEATH_FLOOR) / (level + 2).max(1)).min(0);
    if full {
        penalty
    } else {
        penalty / 10
    }
}

impl CombatEngine {
    /// Kill `victim`. Returns the corpse left behind, if any.
    pub fn die(&mut self, victim: CharId, killer: Option<CharId>, kind: AttackKind) -> Option<ObjId> {
        let killer = killer.filter(|&k| k != victim && self.world.contains(k));

        if self.hooks.die(self.hook_ctx(victim, killer)).is_veto() {
            self.disengage_all_against(victim);
            self.disengage(victim);
            self.update_position(victim);
            return None;
        }

        let (name, victim_npc, connected, level, exp) = {
            let v = self.world.character(victim)?;
            (v.name.clone(), v.is_npc(), v.is_connected(), v.level, v.exp)
        };

        if let Some(k) = killer {
            if victim_npc || connected {
                self.group_gain(k, victim);
            }
            self.log_kill(victim, k);
            let forgets = self
                .world
                .character(k)
                .is_some_and(|c| c.has_mob_flag(MobFlags::MEMORY));
            if forgets && !victim_npc {
                if let Some(c) = self.world.character_mut(k) {
                    c.memory.remove(&victim);
                }
            }
        }

        if victim_npc {
            let corpse = self.raw_kill(victim, kind);
            self.record_death(victim, name, kind, corpse);
            return corpse;
        }

        let npc_killer = killer.and_then(|k| {
            self.world.character(k).filter(|c| c.is_npc()).map(|c| {
                (
                    c.name.clone(),
                    c.has_mob_flag(MobFlags::ORC_FRIEND) && c.has_mob_flag(MobFlags::PET),
                )
            })
        });
        if let Some((killer_name, _)) = &npc_killer {
            self.world.record_audit(
                &name,
                AuditKind::MobDeath {
                    killer: killer_name.clone(),
                },
            );
        }

        let penalty = match killer {
            None => death_penalty(exp, level, false),
            Some(_) if kind == AttackKind::Poison => {
                self.world.record_audit(&name, AuditKind::Poison);
                let corpse = self.raw_kill(victim, kind);
                self.record_death(victim, name, kind, corpse);
                return corpse;
            }
            Some(_) => {
                self.world.record_audit(&name, AuditKind::PlayerKill);
                match npc_killer {
                    Some((_, false)) => death_penalty(exp, level, true),
                    Some((_, true)) => death_penalty(exp, level, false),
                    None => {
                        self.world.record_audit(&name, AuditKind::Death);
                        death_penalty(exp, level, false)
                    }
                }
            }
        };

        if let Some(v) = self.world.character_mut(victim) {
            v.exp += penalty;
            v.conditions.full = 24;
            v.conditions.thirst = 24;
            v.conditions.drunk = 0;
        }

        let corpse = self.raw_kill(victim, kind);
        self.record_death(victim, name, kind, corpse);
        corpse
    }

    fn record_death(&mut self, victim: CharId, name: String, kind: AttackKind, corpse: Option<ObjId>) {
        self.events.deaths.push(DeathEvent {
            victim,
            name,
            kind,
            corpse,
        });
    }

    fn log_kill(&self, victim: CharId, killer: CharId) {
        let (Some(v), Some(k)) = (self.world.character(victim), self.world.character(killer)) else {
            return;
        };
        if v.is_npc() {
            return;
        }
        let place = self.world.room(v.room).map_or("nowhere", |r| r.name.as_str());
        let master = k
            .master
            .filter(|_| k.has_mob_flag(MobFlags::PET))
            .and_then(|m| self.world.character(m));
        match master {
            Some(m) => tracing::info!(
                victim = %v.name,
                killer = %k.name,
                master = %m.name,
                room = place,
                "Player killed by pet"
            ),
            None => tracing::info!(victim = %v.name, killer = %k.name, room = place, "Player killed"),
        }
    }

    /// Turn a character into a corpse and take it out of play. Players
    /// respawn in their start room; NPCs leave the world.
    pub fn raw_kill(&mut self, victim: CharId, kind: AttackKind) -> Option<ObjId> {
        if let Some(entry) = self.waits.abort(victim) {
            if entry.has_completion() {
                self.complete_delay(victim, entry, true);
            }
        }
        if self
            .world
            .character(victim)
            .is_some_and(|v| v.fighting.is_some())
        {
            self.disengage(victim);
        }

        if self.hooks.raw_kill(self.hook_ctx(victim, None)).is_veto() {
            return None;
        }

        let v = self.world.character_mut(victim)?;
        v.mount = None;
        v.affects.clear();
        let is_npc = v.is_npc();
        self.death_cry(victim);

        let corpse = match self.make_corpse(victim, kind) {
            Ok(corpse) => corpse,
            Err(e) => {
                tracing::warn!(victim = %victim, error = %e, "Could not build corpse");
                None
            }
        };

        if is_npc {
            if let Err(e) = self.remove_character(victim) {
                tracing::error!(victim = %victim, error = %e, "Failed to remove slain character");
            }
        } else {
            self.respawn(victim);
        }
        corpse
    }

    fn respawn(&mut self, victim: CharId) {
        self.world.persist(victim);
        self.disengage_all_against(victim);
        self.roster.remove(victim);
        self.waits.remove_character(victim);

        let immortal = self.config.level_immortal;
        let Some(v) = self.world.character_mut(victim) else {
            return;
        };
        v.abilities.attrition();
        v.hit = 1;
        v.mana = 0;
        v.moves = 0;
        v.fighting = None;
        v.energy = 0;
        v.mental_delay = 0;
        v.current_parry = 100;
        v.position = Position::Standing;
        let home = if v.level >= immortal {
            self.config.immortal_room
        } else {
            self.config.start_room(v.race)
        };
        v.load_room = Some(home);
        for other in self.world_riders_of(victim) {
            if let Some(o) = self.world.character_mut(other) {
                o.mount = None;
            }
        }
        if let Err(e) = self.world.move_character(victim, home) {
            tracing::warn!(victim = %victim, error = %e, "Respawn room missing");
        }
    }

    fn world_riders_of(&self, mount: CharId) -> Vec<CharId> {
        self.world
            .characters()
            .filter(|c| c.mount == Some(mount))
            .map(|c| c.id)
            .collect()
    }

    fn death_cry(&mut self, ch: CharId) {
        let Some(c) = self.world.character(ch) else {
            return;
        };
        let (near, far) = match &c.death_cry {
            Some(cry) => (cry.clone(), cry.clone()),
            None if c.is_npc() => (
                "Your blood freezes as you hear $n's death cry.".to_string(),
                "Your blood freezes as you hear someone's death cry.".to_string(),
            ),
            None => {
                let text = format!("Your blood freezes as you hear {}'s death cry.", c.name);
                (text.clone(), text)
            }
        };
        let room = c.room;
        self.act(&near, ch, None, To::Room);

        let neighbours: Vec<_> = Direction::ALL
            .into_iter()
            .filter(|&dir| self.world.can_go(ch, dir))
            .filter_map(|dir| self.world.exit(room, dir).map(|e| e.to_room))
            .collect();
        let far = crate::messages::act(&far, "someone", "someone");
        for to_room in neighbours {
            self.world.room_broadcast(to_room, far.clone(), &[]);
        }
    }

    /// Build the corpse of `ch` and move its belongings into it. Incorporeal
    /// characters vanish instead, dropping everything.
    fn make_corpse(&mut self, ch: CharId, kind: AttackKind) -> Result<Option<ObjId>> {
        let c = self.world.require(ch)?;
        let room = c.room;

        let mut belongings: Vec<ObjId> = c.carrying.clone();
        belongings.extend(c.equipment.values().copied());
        let gold = c.gold;
        let gold_in_corpse = c.is_npc() || c.is_connected();

        if c.is_incorporeal() {
            self.act("$n vanishes into thin air.", ch, None, To::Room);
            for obj in belongings {
                self.world.move_object(obj, ObjectLocation::Room(room))?;
            }
            self.world.require_mut(ch)?.gold = 0;
            return Ok(None);
        }

        let carried: i32 = belongings
            .iter()
            .filter_map(|&o| self.world.object(o))
            .map(|o| o.weight)
            .sum();
        let decay = if c.is_npc() {
            if c.has_mob_flag(MobFlags::ORC_FRIEND) {
                self.config.npc_corpse_time + self.config.friendly_corpse_bonus
            } else {
                self.config.npc_corpse_time
            }
        } else {
            self.config.pc_corpse_time
        };
        let whose = if c.is_npc() {
            c.name.clone()
        } else {
            c.race.corpse_name().to_string()
        };
        let condition = kind.corpse_condition();
        let floating = self
            .world
            .room(room)
            .ok_or(CombatError::RoomNotFound(room))?
            .sector
            .is_water();

        let mut corpse = Object::new(
            "corpse",
            &format!("the {condition} corpse of {whose}"),
            ObjectKind::Corpse(CorpseData {
                decay,
                owner: c.owner_id(),
                condition: condition.to_string(),
                level: c.level,
            }),
        );
        corpse.description = format!(
            "The {condition} corpse of {whose} is {} here.",
            if floating { "floating" } else { "lying" }
        );
        corpse.weight = c.weight + carried;

        let id = self.world.add_object(corpse, ObjectLocation::Nowhere)?;
        for obj in belongings {
            self.world.move_object(obj, ObjectLocation::Inside(id))?;
        }
        if gold > 0 {
            let to = if gold_in_corpse {
                ObjectLocation::Inside(id)
            } else {
                ObjectLocation::Room(room)
            };
            self.world.add_object(Object::money(gold), to)?;
        }
        self.world.require_mut(ch)?.gold = 0;
        self.world.move_object(id, ObjectLocation::Room(room))?;
        Ok(Some(id))
    }

    /// Share experience and spirit among the killer's group.
    pub fn group_gain(&mut self, killer: CharId, victim: CharId) {
        let (Some(k), Some(v)) = (self.world.character(killer), self.world.character(victim)) else {
            return;
        };
        if k.room != v.room {
            return;
        }
        let room = k.room;
        let leader = k.group_leader.unwrap_or(killer);
        let members: Vec<CharId> = self
            .world
            .people_in(room)
            .into_iter()
            .filter(|&t| {
                self.world.character(t).is_some_and(|c| {
                    !c.is_npc()
                        && (c.fighting == Some(victim)
                            || c.group_leader == Some(leader)
                            || c.id == leader)
                })
            })
            .collect();
        if members.is_empty() {
            return;
        }

        let mut level_total: i32 = 0;
        let mut perc_total: i32 = 0;
        for &t in &members {
            if let Some(c) = self.world.character(t) {
                level_total += c.level;
                perc_total += c.perception;
            }
        }
        let n = i32::try_from(members.len()).unwrap_or(i32::MAX);

        let Some(v) = self.world.character(victim) else {
            return;
        };
        let mut share = v.exp / 10;
        let mut npc_level_malus = 0;
        let spirit_gain = if v.is_npc() {
            npc_level_malus = v.attacked_level;
            level_total += npc_level_malus;
            share = share * (n + 1) / n;
            v.level * v.perception
        } else {
            v.spirit * 100 / 4
        };
        share /= level_total.max(1);

        let ctx = ExpContext {
            pulse: self.world.pulse,
            pulses_per_mud_hour: self.config.pulses_per_mud_hour,
            average_mob_life: self.config.average_mob_life,
            zone_x: self.world.room(room).map_or(0, |r| r.zone_x),
        };
        let immortal = self.config.level_immortal;

        for t in members {
            if t == victim {
                continue;
            }
            let (Some(member), Some(v)) = (self.world.character(t), self.world.character(victim)) else {
                continue;
            };
            if member.level >= immortal {
                continue;
            }
            let spirit = if perc_total > 0 {
                spirit_gain * member.perception / perc_total / 100
            } else {
                0
            };
            let spirit_ok = member.alignment * v.alignment <= 0 || member.race.is_evil();
            let group_bonus = (share * member.level / 2)
                .min((level_total - npc_level_malus - member.level) * share / 4);
            let gained = exp_with_modifiers(member, v, share * member.level + group_bonus, ctx);
            let bounds = self.config.alignment_bounds(member.race);
            let alignment = change_alignment(member, v, bounds);

            if let Some(m) = self.world.character_mut(t) {
                if spirit != 0 && spirit_ok {
                    m.spirit += spirit;
                }
                m.exp += gained;
                m.alignment = alignment;
            }
            if spirit != 0 && spirit_ok {
                self.tell(t, format!("Your spirit increases by {spirit}."));
            }
            self.tell(
                t,
                format!("You receive your share of experience -- {gained} points."),
            );
            if self.rng.range(0, 9) == 0 {
                self.world.persist(t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::HitKind;
    use crate::character::{Race, StatusFlags};
    use crate::config::CombatConfig;
    use crate::hooks::{HookContext, HookKey, HookVerdict, OnDeath};
    use crate::ids::RoomId;
    use crate::objects::{WearSlot, WeaponStats};
    use crate::world::{Exit, Room, Sector, World};
    use std::sync::Arc;

    const SLASH: AttackKind = AttackKind::Weapon(HitKind::Slash);

    fn ctx() -> ExpContext {
        ExpContext {
            pulse: 0,
            pulses_per_mud_hour: 240,
            average_mob_life: 14,
            zone_x: 0,
        }
    }

    fn arena() -> World {
        let mut world = World::new();
        world.add_room(
            Room::new(RoomId(1), "Arena").with_exit(Direction::North, Exit::open(RoomId(3))),
        );
        world.add_room(Room::new(RoomId(2), "Temple"));
        world.add_room(Room::new(RoomId(3), "Corridor"));
        world
    }

    #[test]
    fn test_exp_orc_friend_gives_orcs_nothing() {
        let mut orc = Character::player("Snaga", 1, 10);
        orc.race = Race::Orc;
        let mut friend = Character::npc("troll", 5, 10);
        friend.set_mob_flags(MobFlags::ORC_FRIEND);
        assert_eq!(exp_with_modifiers(&orc, &friend, 10_000, ctx()), 0);
    }

    #[test]
    fn test_exp_player_victim_is_level_scaled_only() {
        let ch = Character::player("Legolas", 1, 9);
        let victim = Character::player("Ugluk", 2, 20);
        // divided by max(9 + 1, 20 - 2)
        assert_eq!(exp_with_modifiers(&ch, &victim, 1800, ctx()), 100);
    }

    #[test]
    fn test_exp_flags_add_bonuses() {
        let ch = Character::player("Gimli", 1, 5);
        let plain = Character::npc("wolf", 5, 5);
        let mut fast = plain.clone();
        fast.set_mob_flags(MobFlags::FAST | MobFlags::MEMORY);
        let a = exp_with_modifiers(&ch, &plain, 6000, ctx());
        let b = exp_with_modifiers(&ch, &fast, 6000, ctx());
        assert!(b > a);
    }

    #[test]
    fn test_alignment_good_kills_evil() {
        let mut ch = Character::player("Faramir", 1, 20);
        ch.alignment = 500;
        let mut orc = Character::npc("orc", 9, 10);
        orc.alignment = -500;
        orc.id = CharId(9);
        assert_eq!(change_alignment(&ch, &orc, (-1000, 1000)), 520);
    }

    #[test]
    fn test_alignment_good_kills_good() {
        let mut ch = Character::player("Boromir", 1, 20);
        ch.alignment = 200;
        let mut elf = Character::npc("elf", 9, 10);
        elf.alignment = 400;
        elf.id = CharId(9);
        assert_eq!(change_alignment(&ch, &elf, (-1000, 1000)), 0);
        // clamped to race bounds
        assert_eq!(change_alignment(&ch, &elf, (100, 1000)), 100);
    }

    #[test]
    fn test_alignment_evil_side() {
        let mut ch = Character::player("Gorbag", 1, 20);
        ch.race = Race::Uruk;
        ch.alignment = -300;
        let mut victim = Character::npc("dwarf", 9, 10);
        victim.alignment = -500;
        victim.id = CharId(9);
        assert_eq!(change_alignment(&ch, &victim, (-1000, 0)), -299);
        victim.alignment = 500;
        assert_eq!(change_alignment(&ch, &victim, (-1000, 0)), -320);
    }

    #[test]
    fn test_death_penalty() {
        assert_eq!(death_penalty(13_000, 8, true), -1000);
        assert_eq!(death_penalty(13_000, 8, false), -100);
        assert_eq!(death_penalty(1000, 8, true), 0);
    }

    #[test]
    fn test_npc_corpse_holds_inventory() {
        let mut world = arena();
        let mut killer = Character::player("Eomer", 1, 20);
        killer.room = RoomId(1);
        let mut victim = Character::npc("orc", 100, 5);
        victim.room = RoomId(1);
        victim.gold = 12;
        let killer = world.add_character(killer);
        let victim = world.add_character(victim);
        let sword = world
            .add_object(
                Object::weapon(
                    "sword",
                    "a rusty sword",
                    WeaponStats {
                        damage: 5,
                        weapon_type: 3,
                        bulk: 3,
                        spirit_bane: false,
                    },
                ),
                ObjectLocation::Worn(victim, WearSlot::Wield),
            )
            .unwrap();
        let trinket = world
            .add_object(
                Object::new("bone", "a bone", ObjectKind::Trinket),
                ObjectLocation::Carried(victim),
            )
            .unwrap();

        let mut engine = CombatEngine::new(CombatConfig::default(), world, 1);
        let corpse = engine.die(victim, Some(killer), SLASH).unwrap();

        assert!(!engine.world().contains(victim));
        let obj = engine.world().object(corpse).unwrap();
        assert_eq!(obj.location, ObjectLocation::Room(RoomId(1)));
        assert!(obj.contents.contains(&sword));
        assert!(obj.contents.contains(&trinket));
        assert_eq!(obj.contents.len(), 3);
        let data = obj.corpse().unwrap();
        assert_eq!(data.decay, 5);
        assert_eq!(data.owner, 100);
        assert_eq!(obj.short, "the slashed corpse of orc");
        assert!(obj.description.contains("lying"));
    }

    #[test]
    fn test_friendly_corpse_lasts_longer() {
        let mut world = arena();
        let mut victim = Character::npc("warg", 7, 5);
        victim.room = RoomId(1);
        victim.set_mob_flags(MobFlags::ORC_FRIEND);
        let victim = world.add_character(victim);
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 1);
        let corpse = engine.die(victim, None, SLASH).unwrap();
        assert_eq!(engine.world().object(corpse).unwrap().corpse().unwrap().decay, 20);
    }

    #[test]
    fn test_corpse_floats_in_water() {
        let mut world = World::new();
        let mut river = Room::new(RoomId(1), "Anduin");
        river.sector = Sector::WaterSwim;
        world.add_room(river);
        let mut victim = Character::npc("fish", 3, 1);
        victim.room = RoomId(1);
        let victim = world.add_character(victim);
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 1);
        let corpse = engine.die(victim, None, AttackKind::Poison).unwrap();
        let obj = engine.world().object(corpse).unwrap();
        assert_eq!(obj.description, "The rancid corpse of fish is floating here.");
    }

    #[test]
    fn test_incorporeal_victim_vanishes() {
        let mut world = arena();
        let mut wraith = Character::npc("wraith", 66, 30);
        wraith.room = RoomId(1);
        wraith.status.insert(StatusFlags::INCORPOREAL);
        let wraith = world.add_character(wraith);
        let ring = world
            .add_object(
                Object::new("ring", "a ring", ObjectKind::Trinket),
                ObjectLocation::Carried(wraith),
            )
            .unwrap();
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 1);
        assert_eq!(engine.die(wraith, None, AttackKind::Mental), None);
        assert_eq!(
            engine.world().object(ring).unwrap().location,
            ObjectLocation::Room(RoomId(1))
        );
    }

    #[test]
    fn test_player_respawns_with_attrition() {
        let mut world = arena();
        let mut player = Character::player("Pippin", 4, 10);
        player.room = RoomId(1);
        player.exp = 13_000;
        player.abilities.str = 18;
        player.hit = -20;
        player.position = Position::Dead;
        let mut orc = Character::npc("orc", 100, 10);
        orc.room = RoomId(1);
        let player = world.add_character(player);
        let orc = world.add_character(orc);
        let mut config = CombatConfig::default();
        config.default_start_room = RoomId(2);
        let mut engine = CombatEngine::new(config, world, 3);
        engine.engage(orc, player);

        let corpse = engine.die(player, Some(orc), SLASH);
        assert!(corpse.is_some());

        let p = engine.world().character(player).unwrap();
        assert_eq!(p.room, RoomId(2));
        assert_eq!(p.load_room, Some(RoomId(2)));
        assert_eq!(p.hit, 1);
        assert_eq!(p.abilities.str, 12);
        // full penalty: -(13000 - 3000) / (10 + 2)
        assert_eq!(p.exp, 13_000 - 833);
        assert_eq!(p.conditions.full, 24);
        assert_eq!(p.position, Position::Standing);
        assert!(engine.world().persisted().contains(&player));
        assert!(engine.world().character(orc).unwrap().fighting.is_none());
        assert!(engine.roster_invariant_holds());
        assert!(matches!(
            engine.world().audit_log()[0].kind,
            AuditKind::MobDeath { .. }
        ));
    }

    #[test]
    fn test_poison_death_skips_penalty() {
        let mut world = arena();
        let mut player = Character::player("Merry", 4, 10);
        player.room = RoomId(1);
        player.exp = 13_000;
        let mut spider = Character::player("Shelob", 5, 10);
        spider.room = RoomId(1);
        let player = world.add_character(player);
        let spider = world.add_character(spider);
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 3);
        engine.die(player, Some(spider), AttackKind::Poison);
        assert_eq!(engine.world().character(player).unwrap().exp, 13_000);
        assert!(engine
            .world()
            .audit_log()
            .iter()
            .any(|r| r.kind == AuditKind::Poison));
    }

    struct Undying;

    impl OnDeath for Undying {
        fn on_die(&self, _ctx: HookContext<'_>) -> HookVerdict {
            HookVerdict::Veto
        }
    }

    #[test]
    fn test_die_veto_keeps_victim() {
        let mut world = arena();
        let mut a = Character::npc("orc", 100, 10);
        a.room = RoomId(1);
        let mut b = Character::npc("balrog", 200, 50);
        b.room = RoomId(1);
        let a = world.add_character(a);
        let b = world.add_character(b);
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 3);
        engine.hooks_mut().on_death(HookKey::Npc(200), Arc::new(Undying));
        engine.engage(a, b);
        engine.engage(b, a);
        assert_eq!(engine.die(b, Some(a), SLASH), None);
        assert!(engine.world().contains(b));
        assert!(engine.world().character(a).unwrap().fighting.is_none());
        assert!(engine.roster_invariant_holds());
    }

    #[test]
    fn test_group_gain_rewards_fighters() {
        let mut world = arena();
        let mut hero = Character::player("Beregond", 1, 10);
        hero.room = RoomId(1);
        hero.perception = 50;
        let mut troll = Character::npc("troll", 300, 10);
        troll.room = RoomId(1);
        troll.exp = 20_000;
        troll.perception = 20;
        troll.alignment = -400;
        let hero = world.add_character(hero);
        let troll = world.add_character(troll);
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 9);
        engine.engage(hero, troll);
        engine.group_gain(hero, troll);
        let h = engine.world().character(hero).unwrap();
        assert!(h.exp > 0);
        assert!(h.spirit > 0);
        assert!(h.alignment > 0);
    }

    #[test]
    fn test_death_cry_reaches_neighbours() {
        let mut world = arena();
        let mut victim = Character::npc("orc", 100, 5);
        victim.room = RoomId(1);
        let victim = world.add_character(victim);
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 1);
        engine.die(victim, None, SLASH);
        assert!(engine.world().messages().iter().any(|m| {
            m.recipient
                == crate::world::Recipient::Room {
                    room: RoomId(3),
                    exclude: vec![],
                }
                && m.text.contains("someone's death cry")
        }));
    }
}
