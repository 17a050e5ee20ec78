//! Bear-form skills: bite, rend and maul.

use crate::affects::{Affect, AffectKind, ApplyLocation, ApplyResult};
use crate::attack::AttackKind;
use crate::character::{Race, Skill, Specialization};
use crate::config::CombatConfig;
use crate::engine::CombatEngine;
use crate::ids::CharId;

use super::{CommandOutcome, Target, PEACEFUL};

/// Fast updates a maul lasts for a fighter of the given warrior level.
fn maul_duration(warrior: i32, config: &CombatConfig) -> i32 {
    let fast = config.pulse_fast_update.max(1);
    ((warrior - 10) / 2 * (config.secs_per_mud_hour * 4) / fast).max(0)
}

/// Bear damage is halved unless the bear fights heavy; wild fighters keep
/// three quarters.
fn bear_damage(dam: i32, specialization: Specialization) -> i32 {
    match specialization {
        Specialization::HeavyFighting => dam,
        Specialization::WildFighting => dam * 3 / 4,
        _ => dam / 2,
    }
}

impl CombatEngine {
    /// `Some` holds the refusal when `ch` cannot use the bear skill.
    fn check_bear_skill(&mut self, ch: CharId, skill: Skill) -> Option<CommandOutcome> {
        let c = self.world.character(ch)?;
        if c.race != Race::Beorning {
            return Some(self.reject(ch, "Unrecognized command."));
        }
        if c.is_incorporeal() {
            return Some(self.reject(
                ch,
                "Hmm, perhaps you've spent too much time in the mortal lands.",
            ));
        }
        let known = c.skill(skill);
        if self.in_peace_room(ch) {
            return Some(self.reject(ch, PEACEFUL));
        }
        if known == 0 {
            let text = match skill {
                Skill::Bite => "Learn how to bite first.",
                Skill::Rend => "Learn how to rend first.",
                Skill::Maul => "Learn how to maul first.",
                _ => "Learn the skill first.",
            };
            return Some(self.reject(ch, text));
        }
        None
    }

    fn bear_target(&mut self, ch: CharId, target: &Target, skill: Skill) -> Result<CharId, CommandOutcome> {
        let (who, yourself) = match skill {
            Skill::Rend => ("Rend who?", "But your fur is so nice..."),
            Skill::Maul => ("Maul who?", "You maul yourself!  That's kind of nice..."),
            _ => ("Bite who?", "You bite yourself! Ouch that hurts!"),
        };
        let Some(victim) = self.resolve_or_opponent(ch, target) else {
            return Err(self.reject(ch, who));
        };
        if !self.world.is_same_room(ch, victim) {
            return Err(self.reject(ch, "Your victim is no longer here."));
        }
        if victim == ch {
            return Err(self.reject(ch, yourself));
        }
        if !self.world.can_see(ch, victim) {
            return Err(self.reject(ch, who));
        }
        if skill == Skill::Rend && !self.is_bashed(victim) {
            return Err(self.reject(ch, "You can only rend victims that are bashed."));
        }
        Ok(victim)
    }

    pub(super) fn cmd_bite(&mut self, ch: CharId, target: &Target) -> CommandOutcome {
        self.bear_strike(ch, target, Skill::Bite)
    }

    pub(super) fn cmd_rend(&mut self, ch: CharId, target: &Target) -> CommandOutcome {
        self.bear_strike(ch, target, Skill::Rend)
    }

    fn bear_strike(&mut self, ch: CharId, target: &Target, skill: Skill) -> CommandOutcome {
        if let Some(refusal) = self.check_bear_skill(ch, skill) {
            return refusal;
        }
        let victim = match self.bear_target(ch, target, skill) {
            Ok(victim) => victim,
            Err(refusal) => return refusal,
        };
        self.renounce_sanctuary(ch);

        let prob = self.skill_probability(ch, victim, skill);
        if prob < 0 {
            self.apply_damage(ch, victim, 0, AttackKind::Skill(skill), None);
        } else {
            let Some(c) = self.world.character(ch) else {
                return CommandOutcome::Rejected(String::new());
            };
            let mut dam = (2 + c.profs.warrior) * (100 + prob) / 250 + c.abilities.str;
            if skill == Skill::Rend {
                dam += c.weight / 3500;
            }
            let dam = bear_damage(dam, c.specialization);
            self.apply_damage(ch, victim, dam, AttackKind::Skill(skill), None);
        }
        self.attack_skill_delay(ch)
    }

    pub(super) fn cmd_maul(&mut self, ch: CharId, target: &Target) -> CommandOutcome {
        if let Some(refusal) = self.check_bear_skill(ch, Skill::Maul) {
            return refusal;
        }
        let victim = match self.bear_target(ch, target, Skill::Maul) {
            Ok(victim) => victim,
            Err(refusal) => return refusal,
        };
        let Some(c) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        let cost = if c.specialization == Specialization::Defender {
            5
        } else {
            10
        };
        if c.moves < cost {
            return self.reject(ch, "You are too tired for this right now.");
        }
        let duration = maul_duration(c.profs.warrior, &self.config);
        self.renounce_sanctuary(ch);

        let prob = self.skill_probability(ch, victim, Skill::Maul);
        if prob < 0 {
            self.apply_damage(ch, victim, 0, AttackKind::Skill(Skill::Maul), None);
        } else {
            if let Some(v) = self.world.character_mut(victim) {
                v.affects.apply(
                    Affect::new(AffectKind::Maul, duration / 5, -5).with_location(ApplyLocation::Dodge),
                );
            }
            let stacked = self.world.character_mut(ch).map(|c| {
                c.affects.apply(
                    Affect::new(AffectKind::MaulBuff, duration / 10, 0)
                        .with_location(ApplyLocation::Maul),
                )
            });
            if stacked == Some(ApplyResult::Refused) {
                self.tell(ch, "Your maul buff can't stack anymore.");
            }
            let dam = self.rng.range(1, 4);
            self.apply_damage(ch, victim, dam, AttackKind::Skill(Skill::Maul), None);
        }
        if let Some(c) = self.world.character_mut(ch) {
            c.moves -= cost;
        }
        CommandOutcome::Performed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Character;
    use crate::commands::CombatCommand;
    use crate::ids::RoomId;
    use crate::wait_list::{DelayEntry, DelayFlags, DelayTarget, DelayedCommand, PRIORITY_ATTACK_SKILL};
    use crate::world::{Room, World};

    fn den() -> (CombatEngine, CharId, CharId) {
        let mut world = World::new();
        world.add_room(Room::new(RoomId(1), "Carrock"));
        let mut bear = Character::player("Grimbeorn", 1, 30);
        bear.room = RoomId(1);
        bear.race = Race::Beorning;
        bear.ob = 100;
        bear.profs.warrior = 30;
        for skill in [Skill::Bite, Skill::Rend, Skill::Maul] {
            bear.skills.insert(skill, 100);
        }
        let mut orc = Character::npc("orc", 100, 10);
        orc.room = RoomId(1);
        orc.hit = 500;
        orc.max_hit = 500;
        let bear = world.add_character(bear);
        let orc = world.add_character(orc);
        (CombatEngine::new(CombatConfig::default(), world, 21), bear, orc)
    }

    #[test]
    fn test_maul_duration() {
        let config = CombatConfig::default();
        assert_eq!(maul_duration(30, &config), 200);
        assert_eq!(maul_duration(5, &config), 0);
    }

    #[test]
    fn test_bear_damage_by_specialization() {
        assert_eq!(bear_damage(40, Specialization::HeavyFighting), 40);
        assert_eq!(bear_damage(40, Specialization::WildFighting), 30);
        assert_eq!(bear_damage(40, Specialization::None), 20);
    }

    #[test]
    fn test_only_beornings() {
        let (mut engine, bear, orc) = den();
        engine.world_mut().character_mut(bear).unwrap().race = Race::Human;
        assert_eq!(
            engine
                .execute(bear, CombatCommand::Bite(Target::Character(orc)))
                .unwrap(),
            CommandOutcome::Rejected("Unrecognized command.".into())
        );
    }

    #[test]
    fn test_bite_wounds_and_delays() {
        let (mut engine, bear, orc) = den();
        engine
            .world_mut()
            .character_mut(bear)
            .unwrap()
            .affects
            .apply(Affect::new(AffectKind::Sanctuary, 10, 50));
        let outcome = engine
            .execute(bear, CombatCommand::Bite(Target::Character(orc)))
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Scheduled { .. }));
        assert_eq!(engine.waits().priority(bear), PRIORITY_ATTACK_SKILL);
        assert!(engine.world().character(orc).unwrap().hit < 500);
        assert!(!engine
            .world()
            .character(bear)
            .unwrap()
            .affects
            .has(AffectKind::Sanctuary));
    }

    #[test]
    fn test_rend_needs_bashed_victim() {
        let (mut engine, bear, orc) = den();
        assert_eq!(
            engine
                .execute(bear, CombatCommand::Rend(Target::Character(orc)))
                .unwrap(),
            CommandOutcome::Rejected("You can only rend victims that are bashed.".into())
        );

        engine.waits.schedule(
            orc,
            DelayEntry::new(
                20,
                DelayedCommand::Wait,
                80,
                DelayTarget::None,
                DelayFlags::WAITING | DelayFlags::BASHED,
            ),
        );
        let outcome = engine
            .execute(bear, CombatCommand::Rend(Target::Character(orc)))
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Scheduled { .. }));
    }

    #[test]
    fn test_maul_applies_both_affects() {
        let (mut engine, bear, orc) = den();
        assert_eq!(
            engine
                .execute(bear, CombatCommand::Maul(Target::Character(orc)))
                .unwrap(),
            CommandOutcome::Performed
        );
        let o = engine.world().character(orc).unwrap();
        let maul = o.affects.get(AffectKind::Maul).unwrap();
        assert_eq!((maul.duration, maul.modifier), (40, -5));
        assert_eq!(o.real_dodge(), -5);
        let b = engine.world().character(bear).unwrap();
        assert_eq!(b.affects.get(AffectKind::MaulBuff).unwrap().duration, 20);
        assert_eq!(b.moves, 90);
    }

    #[test]
    fn test_maul_buff_stack_is_capped() {
        let (mut engine, bear, orc) = den();
        engine
            .world_mut()
            .character_mut(bear)
            .unwrap()
            .affects
            .apply(Affect::new(AffectKind::MaulBuff, 200, 0).with_location(ApplyLocation::Maul));
        engine
            .execute(bear, CombatCommand::Maul(Target::Character(orc)))
            .unwrap();
        let b = engine.world().character(bear).unwrap();
        assert_eq!(b.affects.get(AffectKind::MaulBuff).unwrap().duration, 200);
        assert!(engine
            .world()
            .messages()
            .iter()
            .any(|m| m.text == "Your maul buff can't stack anymore."));
    }

    #[test]
    fn test_tired_bear_cannot_maul() {
        let (mut engine, bear, orc) = den();
        engine.world_mut().character_mut(bear).unwrap().moves = 4;
        assert!(engine
            .execute(bear, CombatCommand::Maul(Target::Character(orc)))
            .unwrap()
            .is_rejected());
    }
}
