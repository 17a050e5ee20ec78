//! Player-facing combat actions.
//!
//! Commands arrive already parsed. Each one validates its target the way a
//! player would expect, answers refusals with a message and an
//! [`CommandOutcome::Rejected`] value, and otherwise drives the engine:
//! an immediate blow, or a delay whose completion finishes the action.
//!
//! ```
//! use mud_core::prelude::*;
//!
//! let mut world = World::new();
//! world.add_room(Room::new(RoomId(1), "Bree"));
//! let mut hero = Character::player("Strider", 1, 20);
//! hero.room = RoomId(1);
//! let hero = world.add_character(hero);
//!
//! let mut engine = CombatEngine::new(CombatConfig::default(), world, 7);
//! let outcome = engine
//!     .execute(hero, CombatCommand::Hit(Target::Name("nobody".into())))
//!     .unwrap();
//! assert!(matches!(outcome, CommandOutcome::Rejected(_)));
//! ```

mod attack;
mod bash;
mod beorning;
mod defense;
mod flee;

use serde::{Deserialize, Serialize};

use crate::character::Character;
use crate::engine::CombatEngine;
use crate::error::Result;
use crate::ids::CharId;
use crate::position::Position;
use crate::world::{Direction, RoomFlags};

/// Who a command is aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Target {
    /// Nobody named; commands fall back to the current opponent.
    #[default]
    None,
    /// A known character.
    Character(CharId),
    /// A keyword to look up among the visible people in the room.
    Name(String),
}

/// Who an order goes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderTarget {
    /// One follower.
    Follower(Target),
    /// Every charmed follower in the room.
    Followers,
}

/// A combat command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatCommand {
    /// Attack someone.
    Hit(Target),
    /// Attack someone, ignoring the low-level protection.
    Murder(Target),
    /// Join the fight on someone's side.
    Assist(Target),
    /// Immortal instant kill.
    Slay(Target),
    /// Make followers act.
    Order {
        /// Who is ordered.
        target: OrderTarget,
        /// What they are told to do.
        command: Box<CombatCommand>,
    },
    /// Run away.
    Flee,
    /// Knock someone down, or break a door.
    Bash {
        /// Character to bash.
        target: Target,
        /// Door to break when no character is meant.
        door: Option<Direction>,
    },
    /// Take over someone's fight.
    Rescue(Target),
    /// Kick.
    Kick(Target),
    /// Wild swing.
    Swing(Target),
    /// Stop fighting.
    Disengage,
    /// Brace behind a shield.
    Defend,
    /// Beorning bite.
    Bite(Target),
    /// Beorning rend of a bashed victim.
    Rend(Target),
    /// Beorning maul.
    Maul(Target),
    /// Grip the weapon with both hands.
    TwoHand,
    /// Grip the weapon with one hand.
    OneHand,
    /// Change posture.
    Posture(Position),
    /// Mental attack.
    Will(Target),
}

impl CombatCommand {
    /// Command word, as seen by command hooks.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            CombatCommand::Hit(_) => "hit",
            CombatCommand::Murder(_) => "murder",
            CombatCommand::Assist(_) => "assist",
            CombatCommand::Slay(_) => "slay",
            CombatCommand::Order { .. } => "order",
            CombatCommand::Flee => "flee",
            CombatCommand::Bash { .. } => "bash",
            CombatCommand::Rescue(_) => "rescue",
            CombatCommand::Kick(_) => "kick",
            CombatCommand::Swing(_) => "swing",
            CombatCommand::Disengage => "disengage",
            CombatCommand::Defend => "defend",
            CombatCommand::Bite(_) => "bite",
            CombatCommand::Rend(_) => "rend",
            CombatCommand::Maul(_) => "maul",
            CombatCommand::TwoHand => "twohand",
            CombatCommand::OneHand => "onehand",
            CombatCommand::Posture(_) => "posture",
            CombatCommand::Will(_) => "will",
        }
    }
}

/// What a command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Carried out.
    Performed,
    /// Carried out; the actor is busy for `cycles` pulses.
    Scheduled {
        /// Length of the delay.
        cycles: i32,
    },
    /// Refused; nothing changed. Holds the message sent to the actor.
    Rejected(String),
    /// A command hook took the command over.
    Intercepted,
}

impl CommandOutcome {
    /// Whether the command was refused.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, CommandOutcome::Rejected(_))
    }
}

const PEACEFUL: &str =
    "A peaceful feeling overwhelms you, and you cannot bring yourself to attack.";

impl CombatEngine {
    /// Run a command for `ch`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CombatError::CharacterNotFound`] if `ch`
    /// does not exist. Refusals are not errors.
    pub fn execute(&mut self, ch: CharId, command: CombatCommand) -> Result<CommandOutcome> {
        self.world.require(ch)?;
        if self
            .hooks
            .command(self.hook_ctx(ch, None), command.name())
            .is_veto()
        {
            return Ok(CommandOutcome::Intercepted);
        }
        tracing::debug!(ch = %ch, command = command.name(), "Combat command");

        let outcome = match command {
            CombatCommand::Hit(target) => self.cmd_hit(ch, &target, false),
            CombatCommand::Murder(target) => self.cmd_hit(ch, &target, true),
            CombatCommand::Assist(target) => self.cmd_assist(ch, &target),
            CombatCommand::Slay(target) => self.cmd_slay(ch, &target),
            CombatCommand::Order { target, command } => return self.cmd_order(ch, target, *command),
            CombatCommand::Flee => self.flee(ch),
            CombatCommand::Bash { target, door } => self.cmd_bash(ch, &target, door),
            CombatCommand::Rescue(target) => self.cmd_rescue(ch, &target),
            CombatCommand::Kick(target) => self.cmd_kick(ch, &target, false),
            CombatCommand::Swing(target) => self.cmd_kick(ch, &target, true),
            CombatCommand::Disengage => self.cmd_disengage(ch),
            CombatCommand::Defend => self.cmd_defend(ch),
            CombatCommand::Bite(target) => self.cmd_bite(ch, &target),
            CombatCommand::Rend(target) => self.cmd_rend(ch, &target),
            CombatCommand::Maul(target) => self.cmd_maul(ch, &target),
            CombatCommand::TwoHand => self.cmd_grip(ch, true),
            CombatCommand::OneHand => self.cmd_grip(ch, false),
            CombatCommand::Posture(position) => return self.cmd_posture(ch, position),
            CombatCommand::Will(target) => self.cmd_will(ch, &target),
        };
        Ok(outcome)
    }

    /// Send `text` to `ch` and refuse.
    pub(crate) fn reject(&mut self, ch: CharId, text: &str) -> CommandOutcome {
        self.tell(ch, text);
        CommandOutcome::Rejected(text.to_string())
    }

    /// Like [`Self::reject`], with `$N` naming `victim`.
    pub(crate) fn reject_act(&mut self, ch: CharId, template: &str, victim: CharId) -> CommandOutcome {
        let victim_name = self
            .world
            .character(victim)
            .map_or_else(|| "someone".to_string(), |v| v.name.clone());
        let actor_name = self
            .world
            .character(ch)
            .map_or_else(String::new, |c| c.name.clone());
        let text = crate::messages::act(template, &actor_name, &victim_name);
        self.reject(ch, &text)
    }

    /// Character a target refers to, if it exists.
    pub(crate) fn resolve(&self, ch: CharId, target: &Target) -> Option<CharId> {
        match target {
            Target::None => None,
            Target::Character(id) => self.world.contains(*id).then_some(*id),
            Target::Name(name) => self.world.find_in_room_visible(ch, name),
        }
    }

    /// Target, or the current opponent when nobody was named or found.
    pub(crate) fn resolve_or_opponent(&self, ch: CharId, target: &Target) -> Option<CharId> {
        self.resolve(ch, target)
            .or_else(|| self.world.character(ch).and_then(|c| c.fighting))
    }

    pub(crate) fn in_peace_room(&self, ch: CharId) -> bool {
        self.world
            .character(ch)
            .and_then(|c| self.world.room(c.room))
            .is_some_and(|r| r.flags.contains(RoomFlags::PEACE))
    }

    /// Success roll shared by kick, swing and the bear skills. Negative
    /// means a miss; the margin scales damage.
    pub(crate) fn skill_probability(
        &mut self,
        ch: CharId,
        victim: CharId,
        skill: crate::character::Skill,
    ) -> i32 {
        let (Some(a), Some(v)) = (self.world.character(ch), self.world.character(victim)) else {
            return -1;
        };
        let base = a.skill(skill) - v.real_dodge() / 2 - v.real_parry() / 2 + a.real_ob() / 2;
        base + self.rng.range(1, 100) - 120
    }

    /// Busy delay left by an attack skill; melee continues through it.
    pub(crate) fn attack_skill_delay(&mut self, ch: CharId) -> CommandOutcome {
        let pv = self.config.pulse_violence;
        let cycles = pv * 4 / 3 + self.rng.range(0, pv);
        self.waits.schedule(
            ch,
            crate::wait_list::DelayEntry::new(
                cycles,
                crate::wait_list::DelayedCommand::Wait,
                crate::wait_list::PRIORITY_ATTACK_SKILL,
                crate::wait_list::DelayTarget::None,
                crate::wait_list::DelayFlags::WAITING,
            ),
        );
        CommandOutcome::Scheduled { cycles }
    }

    /// Casting off sanctuary to use a bear skill.
    pub(crate) fn renounce_sanctuary(&mut self, ch: CharId) {
        let removed = self
            .world
            .character_mut(ch)
            .and_then(|c| c.affects.remove(crate::affects::AffectKind::Sanctuary))
            .is_some();
        if removed {
            self.tell(ch, "You cast off your sanctuary!");
            self.act("$n renounces $s sanctuary!", ch, None, crate::engine::To::Room);
        }
    }
}

/// Damage multiplier of a wild fighter's swing, in percent.
pub(crate) fn wild_swing_percent(ch: &Character) -> i32 {
    if ch.specialization == crate::character::Specialization::WildFighting {
        125
    } else {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombatConfig;
    use crate::hooks::{HookContext, HookKey, HookVerdict, OnCommand};
    use crate::ids::RoomId;
    use crate::world::{Room, World};
    use std::sync::Arc;

    struct Mute;

    impl OnCommand for Mute {
        fn on_command(&self, _ctx: HookContext<'_>, command: &str) -> HookVerdict {
            if command == "flee" {
                HookVerdict::Veto
            } else {
                HookVerdict::Proceed
            }
        }
    }

    fn solo() -> (CombatEngine, CharId) {
        let mut world = World::new();
        world.add_room(Room::new(RoomId(1), "Moria"));
        let mut npc = Character::npc("goblin", 42, 5);
        npc.room = RoomId(1);
        let id = world.add_character(npc);
        (CombatEngine::new(CombatConfig::default(), world, 2), id)
    }

    #[test]
    fn test_execute_unknown_character_errors() {
        let (mut engine, _) = solo();
        assert!(engine.execute(CharId(99), CombatCommand::Flee).is_err());
    }

    #[test]
    fn test_command_hook_intercepts() {
        let (mut engine, id) = solo();
        engine.hooks_mut().on_command(HookKey::Npc(42), Arc::new(Mute));
        assert_eq!(
            engine.execute(id, CombatCommand::Flee).unwrap(),
            CommandOutcome::Intercepted
        );
    }

    #[test]
    fn test_resolve_targets() {
        let (engine, id) = solo();
        assert_eq!(engine.resolve(id, &Target::Name("gob".into())), Some(id));
        assert_eq!(engine.resolve(id, &Target::Character(CharId(77))), None);
        assert_eq!(engine.resolve(id, &Target::None), None);
    }

    #[test]
    fn test_command_serde_shape() {
        let cmd = CombatCommand::Order {
            target: OrderTarget::Followers,
            command: Box::new(CombatCommand::Kick(Target::Name("orc".into()))),
        };
        let text = ron::to_string(&cmd).unwrap();
        let back: CombatCommand = ron::from_str(&text).unwrap();
        assert_eq!(back, cmd);
    }
}
