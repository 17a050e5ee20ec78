//! Rescue, disengage, defend, weapon grip and posture changes.

use crate::affects::{Affect, AffectKind};
use crate::character::{MobFlags, Race, Skill, Specialization, StatusFlags};
use crate::engine::{CombatEngine, To};
use crate::error::{CombatError, Result};
use crate::ids::CharId;
use crate::objects::WearSlot;
use crate::position::Position;
use crate::wait_list::{DelayEntry, DelayFlags, DelayTarget, DelayedCommand, PRIORITY_STAGGERED};

use super::{CommandOutcome, Target};

/// Battle cry of a rescuer, to the rescuer and to the room.
fn rescue_cry(race: Race) -> Option<(&'static str, &'static str)> {
    match race {
        Race::Human => Some((
            "Shouting 'Elendil!', you leap to the rescue!",
            "Shouting 'Elendil', $n fearlessly rescues $N.",
        )),
        Race::Dwarf => Some((
            "A harsh guttural warcry escapes your lips as you leap to the rescue!",
            "Shouting 'Khazad Ai-Menu' $n fearlessly rescues $N.",
        )),
        Race::WoodElf => Some((
            "Shouting 'A Elbereth Githloriel!', you leap to the rescue.",
            "Shouting 'A Elbereth Githloriel', $n fearlessly rescues $N.",
        )),
        Race::Hobbit => Some((
            "Shouting 'For the Shire!', you leap to the rescue.",
            "Shouting 'For the Shire', $n the brave little halfling rescues $N.",
        )),
        Race::HighElf => Some(("Fearless, you leap into harms way!", "$n rescues $N.")),
        Race::Beorning => Some((
            "With a bellowing roar, you leap to the rescue!",
            "Roaring, $n fearlessly rescues $N.",
        )),
        _ => None,
    }
}

impl CombatEngine {
    pub(super) fn cmd_rescue(&mut self, ch: CharId, target: &Target) -> CommandOutcome {
        let Some(c) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        if c.is_incorporeal() {
            return self.reject(ch, "You are too insubstantial to do that.");
        }
        if c.has_mob_flag(MobFlags::ORC_FRIEND) && c.has_mob_flag(MobFlags::PET) {
            if let Some(master) = c.master {
                self.act("$n shrugs at you.", ch, Some(master), To::Vict);
                self.act("$n shrugs at $N.", ch, Some(master), To::NotVict);
            }
            return CommandOutcome::Rejected(String::new());
        }
        let (own_opponent, race, room) = (c.fighting, c.race, c.room);

        let Some(victim) = self
            .resolve(ch, target)
            .filter(|&v| self.world.is_same_room(ch, v))
        else {
            return self.reject(ch, "Who do you want to rescue?");
        };
        if victim == ch {
            return self.reject(ch, "What about fleeing instead?");
        }
        if own_opponent == Some(victim) {
            return self.reject(ch, "How can you rescue someone you are trying to kill?");
        }

        let attacker = self.world.people_in(room).into_iter().find(|&p| {
            self.world
                .character(p)
                .is_some_and(|pc| pc.fighting == Some(victim) && !(pc.is_npc() && pc.is_incorporeal()))
        });
        let Some(attacker) = attacker else {
            return self.reject_act(ch, "But no mortal is fighting $M!", victim);
        };

        let percent = self.rng.range(1, 101);
        let prob = self.world.character(ch).map_or(0, |c| c.skill(Skill::Rescue));
        if percent > prob {
            return self.reject(ch, "You fail the rescue!");
        }
        let Some((to_self, to_room)) = rescue_cry(race) else {
            return self.reject(ch, "You shouldn't have rescue, stop using it!");
        };

        self.tell(ch, to_self);
        self.act("To your relief $N has rescued you.", victim, Some(ch), To::Char);
        self.act(to_room, ch, Some(victim), To::NotVict);

        let fighting = |engine: &Self, who: CharId| engine.world.character(who).and_then(|c| c.fighting);
        if fighting(self, victim) == Some(attacker) {
            self.disengage(victim);
        }
        if fighting(self, attacker).is_some() {
            self.disengage(attacker);
        }
        if fighting(self, victim).is_some() {
            self.disengage(victim);
        }
        self.engage(ch, attacker);
        self.engage(attacker, ch);
        if let Some(a) = self.world.character_mut(attacker) {
            a.fighting = Some(ch);
        }
        tracing::debug!(rescuer = %ch, rescued = %victim, attacker = %attacker, "Rescue");

        let defender = self
            .world
            .character(ch)
            .is_some_and(|c| c.specialization == Specialization::Defender);
        if defender {
            return CommandOutcome::Performed;
        }
        let pv = self.config.pulse_violence;
        self.waits.wait_state(victim, pv / 3);
        self.waits.wait_state(ch, pv / 2);
        CommandOutcome::Scheduled { cycles: pv / 2 }
    }

    pub(super) fn cmd_disengage(&mut self, ch: CharId) -> CommandOutcome {
        let Some(opponent) = self.world.character(ch).and_then(|c| c.fighting) else {
            return self.reject(ch, "You are not fighting anybody.");
        };
        if self
            .world
            .character(opponent)
            .is_some_and(|o| o.fighting == Some(ch))
        {
            return self.reject_act(ch, "$E won't let you off that easy!", opponent);
        }

        let cycles = self.config.pulse_violence * 2;
        self.waits.schedule(
            ch,
            DelayEntry::new(
                cycles,
                DelayedCommand::Wait,
                PRIORITY_STAGGERED,
                DelayTarget::None,
                DelayFlags::WAITING,
            ),
        );
        self.act("$n stops fighting $N.", ch, Some(opponent), To::NotVict);
        self.act("$n stops fighting you.", ch, Some(opponent), To::Vict);
        self.act("You stop fighting $N.", ch, Some(opponent), To::Char);
        self.disengage(ch);
        CommandOutcome::Scheduled { cycles }
    }

    pub(super) fn cmd_defend(&mut self, ch: CharId) -> CommandOutcome {
        let Some(c) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        if c.fighting.is_none() {
            return self.reject(ch, "You are not fighting anybody.");
        }
        if c.specialization != Specialization::Defender {
            return self.reject(ch, "You are not the right specialization for this.");
        }
        let knowledge = c.skill(Skill::Defend);
        if knowledge == 0 {
            return self.reject(ch, "You don't know how to do that.");
        }
        let bear = c.race == Race::Beorning;
        if !bear && !c.equipment.contains_key(&WearSlot::Shield) {
            return self.reject(ch, "You need to be using a shield for this.");
        }
        if c.skill_timers.contains_key(&Skill::Defend) {
            return self.reject(ch, "You can't use this skill yet.");
        }

        if bear {
            self.tell(ch, "You hunker down bracing for impact.");
            self.act("$n hunkers down, ready for incoming blows.", ch, None, To::Room);
        } else {
            self.tell(ch, "You hunker down behind your shield.");
            self.act(
                "$n hunkers down behind $s shield, ready for incoming blows.",
                ch,
                None,
                To::Room,
            );
        }
        let (duration, timer) = (self.config.defend_duration, self.config.defend_timer);
        if let Some(c) = self.world.character_mut(ch) {
            c.affects
                .apply(Affect::new(AffectKind::Defend, duration, knowledge));
            c.skill_timers.insert(Skill::Defend, timer);
        }
        CommandOutcome::Performed
    }

    /// Take the weapon in both hands, or back in one.
    pub(super) fn cmd_grip(&mut self, ch: CharId, two_handed: bool) -> CommandOutcome {
        let Some(c) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        let Some((_, weapon)) = self.world.weapon_of(ch) else {
            return self.reject(ch, "You are not wielding anything.");
        };

        if two_handed {
            if c.is_two_handed() {
                return self.reject(ch, "You are already wielding your weapon with two hands.");
            }
            if c.equipment.contains_key(&WearSlot::Shield) {
                return self.reject(
                    ch,
                    "You can not wield a weapon in two hands while wearing a shield.",
                );
            }
            if weapon.bulk <= 4 {
                self.tell(ch, "This weapon seems too small to be used two-handed.");
            }
            if let Some(c) = self.world.character_mut(ch) {
                c.status.insert(StatusFlags::TWO_HANDED);
            }
            self.tell(ch, "You wield your weapon with both hands.");
            self.act("$n takes $s weapon with both hands.", ch, None, To::Room);
        } else {
            if !c.is_two_handed() {
                return self.reject(ch, "You are already wielding your weapon with one hand.");
            }
            if let Some(c) = self.world.character_mut(ch) {
                c.status.remove(StatusFlags::TWO_HANDED);
            }
            self.tell(ch, "You wield your weapon with one hand.");
            self.act("$n takes $s weapon with one hand.", ch, None, To::Room);
        }
        CommandOutcome::Performed
    }

    pub(super) fn cmd_posture(&mut self, ch: CharId, posture: Position) -> Result<CommandOutcome> {
        match self.request_posture(ch, posture) {
            Ok(now) => {
                self.tell(ch, format!("You are now {}.", now.name()));
                Ok(CommandOutcome::Performed)
            }
            Err(CombatError::InvalidPosture { .. }) => Ok(self.reject(ch, "You can't do that now.")),
            Err(e) => Err(e),
        }
    }
}
