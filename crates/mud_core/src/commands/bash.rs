//! Bash: a wind-up followed by a knock-down, or a shoulder against a door.
//!
//! Every phase after the wind-up runs from the wait-list, so targets are
//! re-validated when the delay completes.

use crate::attack::AttackKind;
use crate::character::{MobFlags, Race, Skill};
use crate::engine::{CombatEngine, To};
use crate::ids::CharId;
use crate::position::Position;
use crate::wait_list::{
    BashPhase, DelayEntry, DelayFlags, DelayTarget, DelayedCommand, PRIORITY_BASH_WINDUP,
    PRIORITY_STAGGERED,
};
use crate::world::{Direction, ExitFlags};

use super::{CommandOutcome, Target, PEACEFUL};

impl CombatEngine {
    pub(super) fn cmd_bash(
        &mut self,
        ch: CharId,
        target: &Target,
        door: Option<Direction>,
    ) -> CommandOutcome {
        let Some(c) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        if c.is_incorporeal() {
            return self.reject(ch, "You are too airy for that.");
        }
        if c.position < Position::Fighting {
            return self.reject(ch, "You need to stand up first.");
        }

        let victim = self
            .resolve(ch, target)
            .filter(|&v| self.world.is_same_room(ch, v))
            .or(c.fighting);

        if let Some(victim) = victim {
            return self.bash_character(ch, victim);
        }
        match door {
            Some(dir) => self.bash_door(ch, dir),
            None => self.reject(ch, "Bash who?"),
        }
    }

    fn bash_character(&mut self, ch: CharId, victim: CharId) -> CommandOutcome {
        if self.in_peace_room(ch) {
            return self.reject(ch, PEACEFUL);
        }
        if victim == ch {
            return self.reject(ch, "Aren't we funny today...");
        }
        if !self.check_hallucinate(ch, victim) {
            return CommandOutcome::Performed;
        }
        if self
            .world
            .character(victim)
            .is_some_and(|v| v.is_incorporeal())
        {
            return self.reject(ch, "Your bash encounters nothing but thin air.");
        }
        if self.world.character(ch).map_or(0, |c| c.skill(Skill::Bash)) == 0 {
            return self.reject(ch, "Learn how to bash properly first!");
        }
        if self.is_bashed(victim) {
            return self.reject(ch, "Your victim is already bashed!");
        }
        self.schedule_bash(ch, BashPhase::Resolve, DelayTarget::Character(victim))
    }

    fn bash_door(&mut self, ch: CharId, dir: Direction) -> CommandOutcome {
        let Some(c) = self.world.character(ch) else {
            return CommandOutcome::Rejected(String::new());
        };
        let (riding, moves) = (c.mount.is_some(), c.moves);
        let Some(exit) = self.world.exit(c.room, dir) else {
            return self.reject(ch, "Bash who?");
        };
        let flags = exit.flags;
        if riding {
            return self.reject(ch, "You cannot do it while riding.");
        }
        if !flags.contains(ExitFlags::IS_DOOR) {
            return self.reject(ch, "That's impossible, I'm afraid.");
        }
        if !flags.contains(ExitFlags::CLOSED) {
            return self.reject(ch, "It's already open!");
        }
        if moves < 10 {
            return self.reject(ch, "You are too tired for that.");
        }
        self.schedule_bash(ch, BashPhase::BreakDoor, DelayTarget::Door(dir))
    }

    fn schedule_bash(&mut self, ch: CharId, phase: BashPhase, target: DelayTarget) -> CommandOutcome {
        let cycles = self.config.bash_beats;
        self.waits.schedule(
            ch,
            DelayEntry::new(
                cycles,
                DelayedCommand::Bash(phase),
                PRIORITY_BASH_WINDUP,
                target,
                DelayFlags::WAITING | DelayFlags::WAIT_WHEEL,
            ),
        );
        CommandOutcome::Scheduled { cycles }
    }

    /// Run a bash phase whose delay completed.
    pub(crate) fn bash_phase(&mut self, ch: CharId, phase: BashPhase, target: DelayTarget) {
        match phase {
            BashPhase::Resolve => self.resolve_bash(ch, target),
            BashPhase::Recover => self.recover_from_bash(ch),
            BashPhase::BreakDoor => self.break_door(ch, target),
            BashPhase::Emergency => {
                self.waits.abort(ch);
            }
        }
    }

    fn resolve_bash(&mut self, ch: CharId, target: DelayTarget) {
        let Some(c) = self.world.character(ch) else {
            return;
        };
        if c.position < Position::Fighting {
            self.tell(ch, "You need to stand up first.");
            return;
        }
        let victim = match target {
            DelayTarget::Character(v) if self.world.contains(v) => v,
            _ => {
                self.tell(ch, "Your victim is no longer among us.");
                return;
            }
        };
        if !self.world.can_see(ch, victim) {
            self.tell(ch, "Bash who?");
            return;
        }
        if !self.world.is_same_room(ch, victim) {
            self.tell(ch, "Your target is not here any longer.");
            return;
        }
        if self
            .world
            .character(victim)
            .is_some_and(|v| v.has_mob_flag(MobFlags::NOBASH))
        {
            self.act("You try to bash $N, but only bruise yourself.", ch, Some(victim), To::Char);
            self.act("$n tries to bash $N, but only bruises $mself.", ch, Some(victim), To::Room);
            return;
        }
        if self.is_bashed(victim) {
            self.tell(ch, "Your victim is already bashed!");
            return;
        }

        let (Some(a), Some(v)) = (self.world.character(ch), self.world.character(victim)) else {
            return;
        };
        let ob = a.real_ob();
        let mut prob = a.skill(Skill::Bash);
        prob += ob * 3 / 2;
        prob -= v.real_dodge();
        prob -= v.real_parry() / 2;
        prob -= v.level * 3;
        prob += a.profs.warrior;
        prob += self.rng.range(0, (35 + ob / 4).max(1));
        prob += self.rng.range(-40, 40);
        prob -= 160;

        tracing::debug!(ch = %ch, victim = %victim, prob, "Bash resolved");
        if prob < 0 {
            self.apply_damage(ch, victim, 0, AttackKind::Skill(Skill::Bash), None);
            return;
        }
        let pv = self.config.pulse_violence;
        let cycles = pv * 3 / 2 + self.rng.range(0, pv / 2);
        self.waits.schedule(
            victim,
            DelayEntry::new(
                cycles,
                DelayedCommand::Bash(BashPhase::Recover),
                PRIORITY_STAGGERED,
                DelayTarget::None,
                DelayFlags::WAITING | DelayFlags::BASHED,
            ),
        );
        self.apply_damage(ch, victim, 1, AttackKind::Skill(Skill::Bash), None);
    }

    fn recover_from_bash(&mut self, ch: CharId) {
        self.waits.abort(ch);
        let Some(position) = self.world.character(ch).map(|c| c.position) else {
            return;
        };
        if position > Position::Incapacitated {
            self.act("$n has recovered from a bash!", ch, None, To::Room);
            self.tell(ch, "You have regained your balance!");
            if position < Position::Fighting {
                self.stand(ch);
            }
        }
    }

    fn break_door(&mut self, ch: CharId, target: DelayTarget) {
        let DelayTarget::Door(dir) = target else {
            self.tell(ch, "Something went wrong in your bashing.");
            return;
        };
        let Some(c) = self.world.character(ch) else {
            return;
        };
        let (room, race, strength, skill) = (c.room, c.race, c.abilities.str, c.skill(Skill::Bash));
        let Some(exit) = self.world.exit(room, dir) else {
            return;
        };
        let (flags, keyword, to_room) = (exit.flags, exit.keyword().to_string(), exit.to_room);
        if !flags.contains(ExitFlags::IS_DOOR) {
            self.tell(ch, "That's impossible, I'm afraid.");
            return;
        }
        if !flags.contains(ExitFlags::CLOSED) {
            self.tell(ch, "It's already open!");
            return;
        }

        let mut prob = (skill / 10 + strength - 20) * 5;
        if race.is_light() {
            self.tell(ch, format!("You throw your light body on the {keyword}."));
            prob = -1;
        } else {
            self.tell(ch, format!("You throw yourself on the {keyword}."));
        }
        self.act(&format!("$n throws $mself on the {keyword}."), ch, None, To::Room);
        match race {
            Race::Uruk | Race::Dwarf => prob += 10,
            Race::Beorning | Race::Olog => prob += 20,
            _ => {}
        }
        if flags.intersects(ExitFlags::HEAVY | ExitFlags::NO_BREAK) {
            prob = -1;
        }

        if prob < 0 {
            self.tell(ch, format!("The {keyword} would not budge."));
            return;
        }
        if self.rng.range(0, 99) > prob {
            self.tell(ch, "You only injure yourself.");
            let hurt = self.rng.range(1, 20);
            if let Some(c) = self.world.character_mut(ch) {
                c.hit -= hurt;
                c.moves -= 10;
            }
            self.update_position(ch);
            match self.world.character(ch).map(|c| c.position) {
                Some(Position::Standing) => {
                    if let Some(c) = self.world.character_mut(ch) {
                        c.position = Position::Resting;
                    }
                }
                Some(Position::Dead) => {
                    self.die(ch, None, AttackKind::Skill(Skill::Bash));
                }
                _ => {}
            }
            return;
        }

        if let Some(exit) = self.world.exit_mut(room, dir) {
            exit.flags.insert(ExitFlags::BROKEN);
            exit.flags.remove(ExitFlags::CLOSED | ExitFlags::LOCKED);
        }
        self.tell(ch, format!("The {keyword} crashes open! You fall through it."));
        self.act(
            &format!("The {keyword} crashes open! $n falls through it."),
            ch,
            None,
            To::Room,
        );

        let back = self
            .world
            .exit_mut(to_room, dir.reverse())
            .filter(|back| back.to_room == room)
            .map(|back| {
                back.flags.insert(ExitFlags::BROKEN);
                back.flags.remove(ExitFlags::CLOSED | ExitFlags::LOCKED);
                back.keyword.clone()
            });
        if let Some(back_keyword) = back {
            let text = if back_keyword.is_empty() {
                "The door is opened from the other side.".to_string()
            } else {
                format!("The {back_keyword} suddenly crashes open.")
            };
            self.world.room_broadcast(to_room, text, &[]);
        }

        if let Some(c) = self.world.character_mut(ch) {
            c.mount = None;
        }
        if let Err(e) = self.world.move_character(ch, to_room) {
            tracing::error!(ch = %ch, error = %e, "Door led nowhere");
        } else {
            self.act("$n falls in.", ch, None, To::Room);
        }
        if let Some(c) = self.world.character_mut(ch) {
            c.position = Position::Sitting;
        }
        let pv = self.config.pulse_violence;
        self.waits.schedule(
            ch,
            DelayEntry::new(
                pv * 3,
                DelayedCommand::Bash(BashPhase::Recover),
                PRIORITY_STAGGERED,
                DelayTarget::None,
                DelayFlags::WAITING | DelayFlags::BASHED,
            ),
        );
    }
}
