//! Starting and steering fights: hit, murder, assist, slay, order, kick,
//! wild swing and the will attack.

use crate::attack::AttackKind;
use crate::character::{Character, MobFlags, Skill, Specialization};
use crate::engine::{CombatEngine, To};
use crate::error::Result;
use crate::ids::CharId;
use crate::position::Position;

use super::{wild_swing_percent, CombatCommand, CommandOutcome, OrderTarget, Target, PEACEFUL};

impl CombatEngine {
    pub(super) fn cmd_hit(&mut self, ch: CharId, target: &Target, murder: bool) -> CommandOutcome {
        if self.in_peace_room(ch) {
            return self.reject(ch, PEACEFUL);
        }
        if self.world.character(ch).is_some_and(Character::is_mental) {
            return self.cmd_will(ch, target);
        }

        let victim = self
            .resolve(ch, target)
            .filter(|&v| self.world.is_same_room(ch, v) && self.world.can_see(ch, v));
        let Some(victim) = victim else {
            let text = if matches!(target, Target::None) {
                "Hit who?"
            } else {
                "They aren't here."
            };
            return self.reject(ch, text);
        };

        if victim == ch {
            self.tell(ch, "You hit yourself...OUCH!.");
            self.act("$n hits $mself, and says OUCH!", ch, None, To::Room);
            return CommandOutcome::Performed;
        }

        let (Some(a), Some(v)) = (self.world.character(ch), self.world.character(victim)) else {
            return self.reject(ch, "They aren't here.");
        };
        if (a.is_charmed() && a.master == Some(victim)) || (v.is_charmed() && v.master == Some(ch)) {
            return self.reject_act(
                ch,
                "$N is just such a good friend, you simply can't hit $M.",
                victim,
            );
        }
        if !murder && !a.is_npc() && v.is_npc() && a.level < 4 && v.level > a.level * 3 + 2 {
            return self.reject(
                ch,
                "Your arm refuses to attack such a powerful opponent. Try to consider your enemy first.",
            );
        }
        if !a.is_npc() && !v.is_npc() && a.level < 10 && a.race.is_good() && v.race.is_good() {
            return self.reject(ch, "The will of the Valar holds your attack in check.");
        }
        if !a.is_npc() && !v.is_npc() && a.level + v.level < 8 && !a.race.other_side(v.race) {
            return self.reject(
                ch,
                "You can't do it now. Group with this person and get some levels instead.",
            );
        }
        let (position, fighting) = (a.position, a.fighting);
        let victim_fights_ch = v.fighting == Some(ch);

        if !self.check_sanctuary(ch, victim) {
            return CommandOutcome::Performed;
        }

        if position == Position::Standing && fighting != Some(victim) {
            self.act("$n attacks $N!", ch, Some(victim), To::NotVict);
            self.act("$n attacks YOU!", ch, Some(victim), To::Vict);
            self.act("You attack $N!", ch, Some(victim), To::Char);
            self.hit(ch, victim);
            self.waits.wait_state(ch, 2);
            return CommandOutcome::Scheduled { cycles: 2 };
        }

        if fighting == Some(victim) {
            self.tell(ch, "You do the best you can!");
        } else if !victim_fights_ch {
            return self.reject(ch, "You already have a fight to worry about.");
        } else {
            if let Some(c) = self.world.character_mut(ch) {
                c.fighting = Some(victim);
            }
            self.act("$n turns to fight you!", ch, Some(victim), To::Vict);
            self.act("$n turns to fight $N.", ch, Some(victim), To::NotVict);
            self.act("You turn to fight $N.", ch, Some(victim), To::Char);
        }
        CommandOutcome::Performed
    }

    pub(super) fn cmd_assist(&mut self, ch: CharId, target: &Target) -> CommandOutcome {
        let Some(c) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        if c.fighting.is_some() {
            return self.reject(ch, "You're already fighting!  How can you assist someone else?");
        }
        let master_here = c
            .master
            .filter(|&m| !c.is_npc() && self.world.is_same_room(ch, m));

        let helpee = self
            .resolve(ch, target)
            .filter(|&h| self.world.is_same_room(ch, h));
        let Some(helpee) = helpee else {
            return self.reject(ch, "Whom do you wish to assist?");
        };
        let helpee = master_here.unwrap_or(helpee);
        if helpee == ch {
            return self.reject(ch, "You can't help yourself any more than this!");
        }

        let Some(opponent) = self.world.character(helpee).and_then(|h| h.fighting) else {
            return self.reject_act(ch, "But nobody is fighting $M!", helpee);
        };
        if !self.world.can_see(ch, opponent) {
            return self.reject_act(ch, "You can't see who is fighting $M!", helpee);
        }

        self.tell(ch, "You join the fight!");
        self.act("$N assists you!", helpee, Some(ch), To::Char);
        self.act("$n assists $N.", ch, Some(helpee), To::NotVict);
        self.cmd_hit(ch, &Target::Character(opponent), true)
    }

    pub(super) fn cmd_slay(&mut self, ch: CharId, target: &Target) -> CommandOutcome {
        let Some(c) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        if c.level < self.config.level_god || c.is_npc() {
            return self.cmd_hit(ch, target, false);
        }
        let level = c.level;

        if matches!(target, Target::None) {
            return self.reject(ch, "Kill who?");
        }
        let Some(victim) = self
            .resolve(ch, target)
            .filter(|&v| self.world.is_same_room(ch, v))
        else {
            return self.reject(ch, "They aren't here.");
        };
        if victim == ch {
            return self.reject(ch, "Your mother would be so sad.. :(");
        }
        if self.world.character(victim).is_some_and(|v| level <= v.level) {
            return self.reject(ch, "You can only slay wimpier things");
        }

        self.act("You chop $N to pieces!  Ah!  The blood!", ch, Some(victim), To::Char);
        self.act("$n chops you to pieces!", ch, Some(victim), To::Vict);
        self.act("$n bloodlessly slays $N!", ch, Some(victim), To::NotVict);
        tracing::info!(slayer = %ch, victim = %victim, "Slain by an immortal");
        self.raw_kill(victim, AttackKind::Slay);
        CommandOutcome::Performed
    }

    pub(super) fn cmd_order(
        &mut self,
        ch: CharId,
        target: OrderTarget,
        command: CombatCommand,
    ) -> Result<CommandOutcome> {
        let Some(c) = self.world.character(ch) else {
            return Ok(CommandOutcome::Rejected(String::new()));
        };
        if c.is_incorporeal() {
            return Ok(self.reject(ch, "Who'd listen to a shadow?"));
        }
        let giver_charmed = c.is_charmed();
        let pets_spec = c.specialization == Specialization::Pets;

        match target {
            OrderTarget::Follower(who) => {
                let Some(follower) = self
                    .resolve(ch, &who)
                    .filter(|&f| self.world.is_same_room(ch, f))
                else {
                    return Ok(self.reject(ch, "That person isn't here."));
                };
                if follower == ch {
                    return Ok(self.reject(ch, "You obviously suffer from schizophrenia."));
                }
                if giver_charmed {
                    return Ok(self.reject(ch, "Your superior would not approve of you giving orders."));
                }
                let Some(f) = self.world.character(follower) else {
                    return Ok(self.reject(ch, "That person isn't here."));
                };
                if f.has_mob_flag(MobFlags::GUARDIAN) {
                    return Ok(self.reject(ch, "Your guardian appears unwilling to do your bidding."));
                }
                let obeys = f.master == Some(ch) && f.is_charmed();

                let heard = format!("$N orders you to '{}'", command.name());
                self.act(&heard, follower, Some(ch), To::Char);
                if !pets_spec {
                    self.act("$n gives $N an order.", ch, Some(follower), To::NotVict);
                }
                if !obeys {
                    self.act("$n has an indifferent look.", follower, None, To::Room);
                    return Ok(CommandOutcome::Performed);
                }
                self.tell(ch, "Ok.");
                self.execute(follower, command)
            }
            OrderTarget::Followers => {
                if giver_charmed {
                    return Ok(self.reject(ch, "Your superior would not approve of you giving orders."));
                }
                self.act("$n issues an order.", ch, None, To::Room);
                let room = self.world.character(ch).map(|c| c.room);
                let followers: Vec<CharId> = room
                    .map(|r| self.world.people_in(r))
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|&f| {
                        self.world.character(f).is_some_and(|fc| {
                            fc.master == Some(ch)
                                && fc.is_charmed()
                                && !fc.has_mob_flag(MobFlags::GUARDIAN)
                        })
                    })
                    .collect();
                if followers.is_empty() {
                    return Ok(self.reject(ch, "Nobody here is willing to carry out your orders!"));
                }
                for follower in followers {
                    if self.world.contains(follower) {
                        self.execute(follower, command.clone())?;
                    }
                }
                self.tell(ch, "Ok.");
                Ok(CommandOutcome::Performed)
            }
        }
    }

    /// Kick, or a wild swing when `swing` is set.
    pub(super) fn cmd_kick(&mut self, ch: CharId, target: &Target, swing: bool) -> CommandOutcome {
        let (skill, who) = if swing {
            (Skill::Swing, "Swing at who?")
        } else {
            (Skill::Kick, "Kick who?")
        };
        if self.in_peace_room(ch) {
            return self.reject(ch, PEACEFUL);
        }
        let Some(victim) = self.resolve_or_opponent(ch, target) else {
            return self.reject(ch, who);
        };
        if !self.world.is_same_room(ch, victim) {
            return self.reject(ch, who);
        }
        if victim == ch {
            return self.reject(ch, "Aren't we funny today...");
        }
        let Some(v) = self.world.character(victim) else {
            return self.reject(ch, who);
        };
        if v.is_incorporeal() {
            let text = if swing {
                "Your swing encounters nothing but thin air."
            } else {
                "Your kick encounters nothing but thin air."
            };
            return self.reject(ch, text);
        }
        if v.has_mob_flag(MobFlags::NOBASH) {
            if swing {
                self.act("You swing at $N, but only bruise yourself.", ch, Some(victim), To::Char);
                self.act("$n swings at $N, but only bruises $mself.", ch, Some(victim), To::Room);
            } else {
                self.act("You kick $N, but only bruise yourself.", ch, Some(victim), To::Char);
                self.act("$n kicks $N, but only bruises $mself.", ch, Some(victim), To::Room);
            }
            return CommandOutcome::Performed;
        }
        let Some(a) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        if a.skill(skill) == 0 {
            return self.reject(ch, "Learn how to do it first!");
        }
        let (warrior, specialization, wild) = (a.profs.warrior, a.specialization, wild_swing_percent(a));

        let prob = self.skill_probability(ch, victim, skill);
        let mut dam = (2 + warrior) * (100 + prob) / 250;
        if swing {
            dam = dam * 3 / 2;
            dam = dam * wild / 100;
        }

        if prob < 0 {
            self.apply_damage(ch, victim, 0, AttackKind::Skill(skill), None);
        } else {
            if specialization == Specialization::HeavyFighting {
                dam += dam / 5;
            }
            self.apply_damage(ch, victim, dam, AttackKind::Skill(skill), None);
        }
        self.attack_skill_delay(ch)
    }

    /// Attack with the will alone.
    pub(super) fn cmd_will(&mut self, ch: CharId, target: &Target) -> CommandOutcome {
        if self.in_peace_room(ch) {
            return self.reject(ch, PEACEFUL);
        }
        let Some(victim) = self
            .resolve_or_opponent(ch, target)
            .filter(|&v| self.world.is_same_room(ch, v))
        else {
            return self.reject(ch, "Whom do you want to attack with your will?");
        };
        if victim == ch {
            return self.reject(ch, "Your mind refuses to turn on itself.");
        }
        if self.world.character(ch).is_some_and(|c| c.mental_delay > 0) {
            return self.reject(ch, "Your mind is not ready yet.");
        }
        match self.mental_strike(ch, victim) {
            Some(_) => CommandOutcome::Performed,
            None => self.reject(ch, "They aren't here."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Race, StatusFlags};
    use crate::config::CombatConfig;
    use crate::ids::RoomId;
    use crate::wait_list::PRIORITY_ATTACK_SKILL;
    use crate::world::{Room, RoomFlags, World};

    fn brawl(peace: bool) -> (CombatEngine, CharId, CharId) {
        let mut world = World::new();
        let mut room = Room::new(RoomId(1), "Weathertop");
        if peace {
            room.flags.insert(RoomFlags::PEACE);
        }
        world.add_room(room);
        let mut hero = Character::player("Hurin", 1, 20);
        hero.room = RoomId(1);
        hero.profs.warrior = 20;
        hero.ob = 60;
        hero.skills.insert(Skill::Kick, 90);
        hero.skills.insert(Skill::Swing, 90);
        let mut orc = Character::npc("orc soldier", 100, 10);
        orc.room = RoomId(1);
        orc.race = Race::Orc;
        let hero = world.add_character(hero);
        let orc = world.add_character(orc);
        (CombatEngine::new(CombatConfig::default(), world, 11), hero, orc)
    }

    #[test]
    fn test_hit_needs_a_target() {
        let (mut engine, hero, _) = brawl(false);
        assert_eq!(
            engine.execute(hero, CombatCommand::Hit(Target::None)).unwrap(),
            CommandOutcome::Rejected("Hit who?".into())
        );
        assert_eq!(
            engine
                .execute(hero, CombatCommand::Hit(Target::Name("troll".into())))
                .unwrap(),
            CommandOutcome::Rejected("They aren't here.".into())
        );
    }

    #[test]
    fn test_peace_room_forbids_attacks() {
        let (mut engine, hero, orc) = brawl(true);
        for cmd in [
            CombatCommand::Hit(Target::Character(orc)),
            CombatCommand::Kick(Target::Character(orc)),
        ] {
            assert_eq!(
                engine.execute(hero, cmd).unwrap(),
                CommandOutcome::Rejected(PEACEFUL.into())
            );
        }
        assert!(engine.world().character(hero).unwrap().fighting.is_none());
    }

    #[test]
    fn test_hit_self_only_hurts_pride() {
        let (mut engine, hero, _) = brawl(false);
        let outcome = engine
            .execute(hero, CombatCommand::Hit(Target::Character(hero)))
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Performed);
        assert_eq!(engine.world().character(hero).unwrap().hit, 100);
    }

    #[test]
    fn test_hit_starts_fight_and_short_wait() {
        let (mut engine, hero, orc) = brawl(false);
        let outcome = engine
            .execute(hero, CombatCommand::Hit(Target::Name("orc".into())))
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Scheduled { cycles: 2 });
        assert_eq!(engine.world().character(hero).unwrap().fighting, Some(orc));
        assert!(engine.roster().contains(hero));
        assert_eq!(engine.waits().cycles(hero), 2);

        let again = engine
            .execute(hero, CombatCommand::Hit(Target::Character(orc)))
            .unwrap();
        assert_eq!(again, CommandOutcome::Performed);
    }

    #[test]
    fn test_low_level_protection_only_for_hit() {
        let (mut engine, hero, orc) = brawl(false);
        engine.world_mut().character_mut(hero).unwrap().level = 2;
        engine.world_mut().character_mut(orc).unwrap().level = 20;
        assert!(engine
            .execute(hero, CombatCommand::Hit(Target::Character(orc)))
            .unwrap()
            .is_rejected());
        assert!(!engine
            .execute(hero, CombatCommand::Murder(Target::Character(orc)))
            .unwrap()
            .is_rejected());
        assert_eq!(engine.world().character(hero).unwrap().fighting, Some(orc));
    }

    #[test]
    fn test_valar_protect_young_good_players() {
        let (mut engine, hero, _) = brawl(false);
        let mut elf = Character::player("Legolas", 2, 5);
        elf.room = RoomId(1);
        elf.race = Race::WoodElf;
        let elf = engine.world_mut().add_character(elf);
        engine.world_mut().character_mut(hero).unwrap().level = 5;
        assert_eq!(
            engine
                .execute(hero, CombatCommand::Hit(Target::Character(elf)))
                .unwrap(),
            CommandOutcome::Rejected("The will of the Valar holds your attack in check.".into())
        );
    }

    #[test]
    fn test_charmed_pet_will_not_hit_master() {
        let (mut engine, hero, orc) = brawl(false);
        let o = engine.world_mut().character_mut(orc).unwrap();
        o.master = Some(hero);
        o.status.insert(StatusFlags::CHARMED);
        assert!(engine
            .execute(orc, CombatCommand::Hit(Target::Character(hero)))
            .unwrap()
            .is_rejected());
    }

    #[test]
    fn test_kick_requires_skill_and_leaves_delay() {
        let (mut engine, hero, orc) = brawl(false);
        engine
            .world_mut()
            .character_mut(hero)
            .unwrap()
            .skills
            .remove(&Skill::Kick);
        assert_eq!(
            engine
                .execute(hero, CombatCommand::Kick(Target::Character(orc)))
                .unwrap(),
            CommandOutcome::Rejected("Learn how to do it first!".into())
        );

        let (mut engine, hero, orc) = brawl(false);
        let outcome = engine
            .execute(hero, CombatCommand::Kick(Target::Character(orc)))
            .unwrap();
        let pv = engine.config().pulse_violence;
        let CommandOutcome::Scheduled { cycles } = outcome else {
            panic!("kick should leave a delay, got {outcome:?}");
        };
        assert!((pv * 4 / 3..=pv * 4 / 3 + pv).contains(&cycles));
        assert_eq!(engine.waits().priority(hero), PRIORITY_ATTACK_SKILL);
        assert_eq!(engine.world().character(orc).unwrap().fighting, Some(hero));
    }

    #[test]
    fn test_kick_bruises_on_unbashable() {
        let (mut engine, hero, orc) = brawl(false);
        let flags = engine.world().character(orc).unwrap().mob_flags() | MobFlags::NOBASH;
        engine.world_mut().character_mut(orc).unwrap().set_mob_flags(flags);
        assert_eq!(
            engine
                .execute(hero, CombatCommand::Swing(Target::Character(orc)))
                .unwrap(),
            CommandOutcome::Performed
        );
        assert!(!engine.waits().contains(hero));
        assert_eq!(engine.world().character(orc).unwrap().hit, 100);
    }

    #[test]
    fn test_slay_needs_god_level() {
        let (mut engine, hero, orc) = brawl(false);
        engine.world_mut().character_mut(hero).unwrap().level = 95;
        assert_eq!(
            engine
                .execute(hero, CombatCommand::Slay(Target::Character(orc)))
                .unwrap(),
            CommandOutcome::Performed
        );
        assert!(!engine.world().contains(orc));

        let (mut engine, hero, orc) = brawl(false);
        engine
            .execute(hero, CombatCommand::Slay(Target::Character(orc)))
            .unwrap();
        assert!(engine.world().contains(orc));
        assert_eq!(engine.world().character(hero).unwrap().fighting, Some(orc));
    }

    #[test]
    fn test_order_charmed_follower() {
        let (mut engine, hero, orc) = brawl(false);
        let mut wolf = Character::npc("wolf", 300, 8);
        wolf.room = RoomId(1);
        wolf.master = Some(hero);
        wolf.status.insert(StatusFlags::CHARMED);
        let wolf = engine.world_mut().add_character(wolf);

        let outcome = engine
            .execute(
                hero,
                CombatCommand::Order {
                    target: OrderTarget::Followers,
                    command: Box::new(CombatCommand::Hit(Target::Character(orc))),
                },
            )
            .unwrap();
        assert!(!outcome.is_rejected());
        assert_eq!(engine.world().character(wolf).unwrap().fighting, Some(orc));
    }

    #[test]
    fn test_order_uncharmed_is_ignored() {
        let (mut engine, hero, orc) = brawl(false);
        let outcome = engine
            .execute(
                hero,
                CombatCommand::Order {
                    target: OrderTarget::Follower(Target::Character(orc)),
                    command: Box::new(CombatCommand::Flee),
                },
            )
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Performed);
        assert_eq!(engine.world().character(orc).unwrap().room, RoomId(1));
    }

    #[test]
    fn test_assist_joins_against_opponent() {
        let (mut engine, hero, orc) = brawl(false);
        let mut friend = Character::player("Beleg", 2, 20);
        friend.room = RoomId(1);
        let friend = engine.world_mut().add_character(friend);
        engine.engage(hero, orc);

        let outcome = engine
            .execute(friend, CombatCommand::Assist(Target::Character(hero)))
            .unwrap();
        assert!(!outcome.is_rejected());
        assert_eq!(engine.world().character(friend).unwrap().fighting, Some(orc));
    }
}
