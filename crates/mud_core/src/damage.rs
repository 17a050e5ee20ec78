//! Damage pipeline: from raw damage to lost vitality.
//!
//! Every source of harm (melee, skills, ripostes, will contests) funnels
//! through [`CombatEngine::apply_damage`]. Interceptions come first and
//! leave the victim untouched; after them the pipeline engages both
//! parties, scales the damage, subtracts it and reports the result.

use serde::{Deserialize, Serialize};

use crate::affects::{Affect, AffectKind};
use crate::attack::AttackKind;
use crate::character::{Character, MobFlags, Skill, Specialization, Tactics};
use crate::engine::{CombatEngine, DamageEvent, To};
use crate::ids::CharId;
use crate::messages::Blow;
use crate::position::Position;
use crate::wait_list::{DelayFlags, PRIORITY_WHEEL_BREAK};

/// Why a damage call changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageRejection {
    /// Victim does not exist.
    Missing,
    /// Victim is already dead.
    VictimDead,
    /// A hallucinating attacker hit thin air.
    Hallucination,
    /// A special procedure of the attacker took over.
    SpecialIntercept,
    /// Physical blow through an incorporeal victim.
    PassThrough,
    /// Too many players already on the victim.
    Overkill,
    /// The victim's sanctuary held.
    Sanctuary,
    /// The blow went to the master of a charmed victim instead.
    Redirected,
    /// A damage trigger cancelled the blow.
    Vetoed,
}

/// Result of [`CombatEngine::apply_damage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageOutcome {
    /// Nothing happened.
    Ignored(DamageRejection),
    /// Damage applied; the victim lives.
    Survived {
        /// Vitality removed.
        applied: i32,
    },
    /// Damage applied and the victim died.
    Killed {
        /// Vitality removed.
        applied: i32,
    },
}

impl DamageOutcome {
    /// Whether the victim died.
    #[must_use]
    pub const fn is_killed(&self) -> bool {
        matches!(self, DamageOutcome::Killed { .. })
    }

    /// Damage that reached the victim, 0 when ignored.
    #[must_use]
    pub const fn applied(&self) -> i32 {
        match self {
            DamageOutcome::Ignored(_) => 0,
            DamageOutcome::Survived { applied } | DamageOutcome::Killed { applied } => *applied,
        }
    }
}

/// Damage after a resistance (`1`) or vulnerability (`-1`).
#[must_use]
pub const fn resisted(dam: i32, resistance: i32) -> i32 {
    if resistance > 0 {
        dam * 2 / 3
    } else if resistance < 0 {
        dam * 3 / 2
    } else {
        dam
    }
}

/// Mana a shield spends to absorb `absorb` points for a mage of `mage`
/// level, before the rounding roll.
#[must_use]
pub const fn shield_cost(absorb: i32, mage: i32) -> i32 {
    absorb * 15 / mage
}

/// Experience for dealing `dam` to a victim of level `victim_level`.
#[must_use]
pub fn damage_experience(level: i32, victim_level: i32, dam: i32) -> i32 {
    (1 + victim_level) * (20 + level * 2).min(dam) / (1 + level).max(1)
}

impl CombatEngine {
    /// Run `dam` points of `kind` damage from `ch` into `victim`.
    ///
    /// `location` is the body part struck, when there is one. A missing
    /// `ch` is treated as self-inflicted damage.
    pub fn apply_damage(
        &mut self,
        ch: CharId,
        victim: CharId,
        dam: i32,
        kind: AttackKind,
        location: Option<usize>,
    ) -> DamageOutcome {
        let outcome = self.run_damage(ch, victim, dam, kind, location);
        self.events.damage.push(DamageEvent {
            attacker: ch,
            victim,
            kind,
            raw: dam,
            outcome: outcome.clone(),
        });
        outcome
    }

    fn run_damage(
        &mut self,
        ch: CharId,
        victim: CharId,
        mut dam: i32,
        kind: AttackKind,
        location: Option<usize>,
    ) -> DamageOutcome {
        let Some(v) = self.world.character(victim) else {
            return DamageOutcome::Ignored(DamageRejection::Missing);
        };
        if v.position == Position::Dead {
            tracing::error!(victim = %victim, name = %v.name, "Attempt to damage a corpse");
            return DamageOutcome::Ignored(DamageRejection::VictimDead);
        }
        let ch = if self.world.contains(ch) { ch } else { victim };
        let physical = kind.is_physical();

        if physical && !self.check_hallucinate(ch, victim) {
            return DamageOutcome::Ignored(DamageRejection::Hallucination);
        }

        let victim_opponent = self.world.character(victim).and_then(|v| v.fighting);
        if victim_opponent != Some(ch)
            && self
                .hooks
                .special_damage(self.hook_ctx(ch, Some(victim)))
                .is_veto()
        {
            if self
                .world
                .character(ch)
                .is_some_and(|c| c.fighting == Some(victim))
            {
                self.disengage(ch);
            }
            return DamageOutcome::Ignored(DamageRejection::SpecialIntercept);
        }

        if physical
            && self
                .world
                .character(victim)
                .is_some_and(Character::is_incorporeal)
        {
            self.pass_through(ch, victim);
            return DamageOutcome::Ignored(DamageRejection::PassThrough);
        }

        if !self.check_overkill(victim) {
            self.act("There is too much activity to attack $N.", ch, Some(victim), To::Char);
            self.act(
                "$n tried to attack you but could not get close enough.",
                ch,
                Some(victim),
                To::Vict,
            );
            self.act(
                "$n tried to attack $N but could not get close enough.",
                ch,
                Some(victim),
                To::NotVict,
            );
            return DamageOutcome::Ignored(DamageRejection::Overkill);
        }

        if !self.check_sanctuary(ch, victim) {
            return DamageOutcome::Ignored(DamageRejection::Sanctuary);
        }

        if let Some(outcome) = self.engage_for_damage(ch, victim) {
            return outcome;
        }
        self.break_bonds(ch, victim);
        self.reveal_attacker(ch);

        if dam > 0
            && self.waits.has_flag(victim, DelayFlags::WAIT_WHEEL)
            && self.waits.priority(victim) <= PRIORITY_WHEEL_BREAK
        {
            self.waits.abort(victim);
            self.tell(victim, "Your concentration is broken!");
        }

        let (ch_level, ch_npc, wild) = match self.world.character(ch) {
            Some(c) => (
                c.level,
                c.is_npc(),
                c.specialization == Specialization::WildFighting,
            ),
            None => return DamageOutcome::Ignored(DamageRejection::Missing),
        };
        if let Some(v) = self.world.character_mut(victim) {
            if v.is_npc() && v.attacked_level < ch_level {
                v.attacked_level = ch_level;
            }
        }

        dam = self.apply_resistance(victim, dam, kind);

        if physical && wild && self.rng.range(0, 9) == 0 {
            dam = dam * 3 / 2;
            self.tell(ch, "You rush forward wildly.");
            self.act("$n rushes forward wildly.", ch, None, To::Room);
        }

        if kind != AttackKind::Skill(Skill::Ambush) {
            if dam > self.config.overflow_log_threshold {
                tracing::warn!(attacker = %ch, damage = dam, "Damage overflow");
            }
            dam = dam.min(self.config.max_damage);
        }
        dam = dam.max(0);

        if !matches!(
            kind,
            AttackKind::Skill(Skill::Ambush) | AttackKind::Skill(Skill::Bash)
        ) {
            dam = self.absorb_with_shield(victim, dam);
        }

        if physical {
            if let Some(knowledge) = self
                .world
                .character(victim)
                .and_then(|v| v.affects.get(AffectKind::Defend))
                .map(|a| a.modifier)
            {
                dam -= dam * knowledge / 300;
            }
        }

        if self
            .hooks
            .damage(self.hook_ctx(victim, Some(ch)))
            .is_veto()
        {
            self.update_position(victim);
            self.update_position(ch);
            return DamageOutcome::Ignored(DamageRejection::Vetoed);
        }

        let victim_level = self.world.character(victim).map_or(0, |v| v.level);
        if let Some(v) = self.world.character_mut(victim) {
            v.hit -= dam;
        }
        if ch != victim {
            if let Some(c) = self.world.character_mut(ch) {
                c.exp += damage_experience(ch_level, victim_level, dam);
            }
        }
        if !ch_npc {
            let floor = self.config.pvp_floor;
            if let Some(v) = self.world.character_mut(victim) {
                if v.hit < 0 {
                    v.hit = v.hit.min(floor);
                }
            }
        }
        self.update_position(victim);
        self.update_position(ch);

        self.narrate_blow(ch, victim, dam, kind, location);
        self.report_condition(ch, victim, dam);
        self.flee_if_linkless(victim);

        let (awake, fighting, dead) = match self.world.character(victim) {
            Some(v) => (
                v.position.is_awake(),
                v.fighting.is_some(),
                v.position == Position::Dead,
            ),
            None => (false, false, false),
        };
        if !awake && fighting {
            self.disengage(victim);
        }

        if dead {
            self.die(victim, Some(ch), kind);
            DamageOutcome::Killed { applied: dam }
        } else {
            DamageOutcome::Survived { applied: dam }
        }
    }

    /// Returns `Some(outcome)` when the blow went elsewhere.
    fn engage_for_damage(&mut self, ch: CharId, victim: CharId) -> Option<DamageOutcome> {
        let (Some(a), Some(v)) = (self.world.character(ch), self.world.character(victim)) else {
            return None;
        };
        let a_npc = a.is_npc();
        if !a_npc && ch != victim {
            let duration = if v.is_npc() { 2 } else { 5 };
            if let Some(a) = self.world.character_mut(ch) {
                a.affects.apply(Affect::new(AffectKind::Anger, duration, 0));
            }
        }
        if ch == victim {
            return None;
        }

        let attacker_ready = self
            .world
            .character(ch)
            .is_some_and(|a| a.position > Position::Stunned);
        if attacker_ready {
            if self.world.character(ch).is_some_and(|a| a.fighting.is_none()) {
                self.engage(ch, victim);
            }
            if let Some(a) = self.world.character_mut(ch) {
                if a.mount == Some(victim) {
                    a.mount = None;
                }
            }
            if let Some(v) = self.world.character_mut(victim) {
                if v.mount == Some(ch) {
                    v.mount = None;
                }
            }

            let master = self.world.character(victim).and_then(|v| {
                if a_npc && v.is_npc() {
                    v.master
                } else {
                    None
                }
            });
            if let Some(master) = master {
                if self.rng.range(0, 10) == 0
                    && self
                        .world
                        .character(victim)
                        .is_some_and(Character::is_charmed)
                    && self.world.is_same_room(ch, master)
                {
                    if self.world.character(ch).is_some_and(|a| a.fighting.is_some()) {
                        self.disengage(ch);
                    }
                    self.hit(ch, master);
                    return Some(DamageOutcome::Ignored(DamageRejection::Redirected));
                }
            }
        }

        if self
            .world
            .character(victim)
            .is_some_and(|v| v.position > Position::Stunned)
        {
            self.engage(victim, ch);
            self.remember(victim, ch);
        }
        None
    }

    /// Attacking someone ends following and grouping between the two.
    fn break_bonds(&mut self, ch: CharId, victim: CharId) {
        if ch == victim {
            return;
        }
        let ch_leader = self.world.character(ch).and_then(|c| c.group_leader);
        let mut shared_group = false;
        if let Some(v) = self.world.character_mut(victim) {
            if v.master == Some(ch) {
                v.master = None;
            }
            if v.group_leader == Some(ch) {
                v.group_leader = None;
            }
            if ch_leader.is_some() && v.group_leader == ch_leader {
                v.group_leader = None;
                shared_group = true;
            }
        }
        if shared_group {
            if let Some(c) = self.world.character_mut(ch) {
                c.group_leader = None;
            }
        }
    }

    /// Attacking ends the attacker's sanctuary and hiding.
    fn reveal_attacker(&mut self, ch: CharId) {
        let Some(c) = self.world.character_mut(ch) else {
            return;
        };
        let had_sanctuary = c.affects.remove(AffectKind::Sanctuary).is_some();
        let was_hidden = c.is_hidden();
        c.status.remove(crate::character::StatusFlags::HIDDEN);
        if had_sanctuary {
            self.tell(ch, "Your sanctuary is ended!");
        }
        if was_hidden {
            self.act("$n steps out of $s cover.", ch, None, To::Room);
            self.tell(ch, "You step out of your cover.");
        }
    }

    /// A hallucinating attacker may swing at thin air. Each miss weakens
    /// the hallucination; a real hit ends it.
    pub(crate) fn check_hallucinate(&mut self, ch: CharId, victim: CharId) -> bool {
        let Some(modifier) = self
            .world
            .character(ch)
            .and_then(|c| c.affects.get(AffectKind::Hallucinate))
            .map(|a| a.modifier)
        else {
            return true;
        };

        if self.rng.range(1, 100) > 100 / (modifier + 1).max(1) {
            if let Some(c) = self.world.character_mut(ch) {
                let exhausted = c
                    .affects
                    .get_mut(AffectKind::Hallucinate)
                    .map_or(true, |a| {
                        a.modifier -= 1;
                        a.modifier == 0
                    });
                if exhausted {
                    c.affects.remove(AffectKind::Hallucinate);
                }
            }
            self.tell(ch, "You hit thin air!");
            self.act(
                "$N pauses in confusion as they hit thin air!",
                victim,
                Some(ch),
                To::Char,
            );
            self.act(
                "$n pauses in confusion as they hit thin air!",
                ch,
                Some(victim),
                To::NotVict,
            );
            return false;
        }

        if let Some(c) = self.world.character_mut(ch) {
            c.affects.remove(AffectKind::Hallucinate);
        }
        true
    }

    /// Too many players on one humanoid player: most extra blows cannot
    /// get close enough.
    fn check_overkill(&mut self, victim: CharId) -> bool {
        let Some(v) = self.world.character(victim) else {
            return true;
        };
        if v.is_npc() || !v.body.overkill_eligible() {
            return true;
        }
        let attackers = self
            .roster
            .members()
            .iter()
            .filter(|&&m| {
                self.world
                    .character(m)
                    .is_some_and(|c| !c.is_npc() && c.fighting == Some(victim))
            })
            .count();
        if attackers > self.config.overkill_threshold {
            let n = i32::try_from(attackers).unwrap_or(i32::MAX);
            return self.rng.range(0, n) == 0;
        }
        true
    }

    /// Attacks weaken a sanctuary ward by a roll bounded by the attacker's
    /// alignment. Returns whether the attack goes through.
    pub(crate) fn check_sanctuary(&mut self, ch: CharId, victim: CharId) -> bool {
        let Some(ward) = self
            .world
            .character(victim)
            .and_then(|v| v.affects.get(AffectKind::Sanctuary))
            .map(|a| a.modifier)
        else {
            return true;
        };
        let Some(a) = self.world.character(ch) else {
            return true;
        };
        let align = a.alignment;
        let attacker_fighting_victim = a.fighting == Some(victim);

        let erosion = if align < 0 {
            self.rng.range(0, -align / 2)
        } else {
            self.rng.range(0, align)
        };
        let ward = ward - erosion;

        if ward < 0 {
            if let Some(v) = self.world.character_mut(victim) {
                v.affects.remove(AffectKind::Sanctuary);
            }
            if ch == victim {
                self.act("$n's sanctuary is broken!", ch, None, To::Room);
            } else {
                self.act("You break $N's sanctuary!", ch, Some(victim), To::Char);
                self.act("$n breaks $N's sanctuary!", ch, Some(victim), To::Room);
            }
            return true;
        }

        if let Some(a) = self
            .world
            .character_mut(victim)
            .and_then(|v| v.affects.get_mut(AffectKind::Sanctuary))
        {
            a.modifier = ward;
        }
        self.act("You could not break $S sanctity.", ch, Some(victim), To::Char);
        self.act("$n's aura flickers.", victim, None, To::Room);
        if attacker_fighting_victim {
            self.disengage(ch);
        }
        false
    }

    fn apply_resistance(&mut self, victim: CharId, dam: i32, kind: AttackKind) -> i32 {
        let mut resistance = self
            .world
            .character(victim)
            .map_or(0, |v| v.resistance_to(kind.damage_class()));
        if self.rng.range(0, 2) != 0 && kind.is_physical() {
            resistance = 0;
        }
        if resistance > 0 {
            self.tell(victim, "You resist a lot.");
            self.act("$n resists a lot.", victim, None, To::Room);
        } else if resistance < 0 {
            self.tell(victim, "You feel it a lot.");
        }
        resisted(dam, resistance)
    }

    /// A shield soaks up to 40% of the blow, paid in mana.
    fn absorb_with_shield(&mut self, victim: CharId, dam: i32) -> i32 {
        let Some(v) = self.world.character(victim) else {
            return dam;
        };
        if !v.affects.has(AffectKind::Shield) {
            return dam;
        }
        let mage = v.profs.mage.max(1);
        let mut absorbed = (dam * 2 + 4) / 5;
        let mut cost = shield_cost(absorbed, mage);
        if self.rng.range(0, mage) > absorbed * 15 % mage {
            cost += 1;
        }
        let Some(v) = self.world.character_mut(victim) else {
            return dam;
        };
        if cost > v.mana {
            absorbed = absorbed * v.mana / cost;
            v.mana = 0;
        } else {
            v.mana -= cost;
        }
        if v.mana == 0 {
            v.affects.remove(AffectKind::Shield);
        } else if let Some(shield) = v.affects.get_mut(AffectKind::Shield) {
            shield.duration = shield.duration.min(2);
        }
        dam - absorbed
    }

    fn narrate_blow(
        &mut self,
        ch: CharId,
        victim: CharId,
        dam: i32,
        kind: AttackKind,
        location: Option<usize>,
    ) {
        let armed = self.world.weapon_of(ch).is_some();
        let (Some(a), Some(v)) = (self.world.character(ch), self.world.character(victim)) else {
            return;
        };
        let room = v.room;
        let blow = Blow {
            kind,
            damage: dam,
            armed,
            self_hit: ch == victim,
            fatal: v.position == Position::Dead,
            body_part: location.map_or("body", |l| v.body.part_name(l)),
            attacker: &a.name,
            victim: &v.name,
        };
        let narrative = self.messages.narrate(&mut self.rng, &blow);

        if ch != victim {
            self.world.direct_message(ch, narrative.to_attacker);
            self.world.direct_message(victim, narrative.to_victim);
            self.world
                .room_broadcast(room, narrative.to_room, &[ch, victim]);
        } else {
            self.world.direct_message(ch, narrative.to_attacker);
            self.world.room_broadcast(room, narrative.to_room, &[ch]);
        }
    }

    fn report_condition(&mut self, ch: CharId, victim: CharId, dam: i32) {
        let Some(v) = self.world.character(victim) else {
            return;
        };
        match v.position {
            Position::Incapacitated => {
                self.act(
                    "$n is incapacitated and will die, if not aided.",
                    victim,
                    None,
                    To::Room,
                );
                self.tell(
                    victim,
                    "You are incapacitated and will slowly die, if not aided.",
                );
            }
            Position::Stunned => {
                self.act(
                    "$n is stunned, but will probably regain consciousness again.",
                    victim,
                    None,
                    To::Room,
                );
                self.tell(
                    victim,
                    "You're stunned, but will probably regain consciousness again.",
                );
            }
            Position::Dead => {
                self.act("$n is dead!  R.I.P.", victim, None, To::Room);
                self.tell(victim, "You are dead!  Sorry...");
            }
            _ => {
                if dam > v.max_hit / 5 {
                    self.tell(victim, "That really did HURT!");
                }
                self.wound_feedback(ch, victim);
            }
        }
    }

    /// Bleeding warning and wimpy flight.
    pub(crate) fn wound_feedback(&mut self, ch: CharId, victim: CharId) {
        let Some(v) = self.world.character(victim) else {
            return;
        };
        let awake_enough = v.position > Position::Sleeping;
        if v.hit < v.max_hit / 5 {
            let wimpy = v.has_mob_flag(MobFlags::WIMPY);
            self.tell(victim, "You wish that your wounds would stop BLEEDING so much!");
            if wimpy && awake_enough {
                self.flee(victim);
            }
        }

        let Some(v) = self.world.character(victim) else {
            return;
        };
        if !v.is_npc()
            && v.wimp_level > 0
            && victim != ch
            && v.hit < v.wimp_level
            && v.position > Position::Sleeping
            && v.tactics != Tactics::Berserk
        {
            self.tell(victim, "You wimp out, and attempt to flee!");
            self.flee(victim);
        }
    }

    /// A player without a connection runs from any fight it is in.
    pub(crate) fn flee_if_linkless(&mut self, victim: CharId) {
        let linkless = self.world.character(victim).is_some_and(|v| {
            !v.is_npc()
                && !v.is_connected()
                && v.fighting.is_some()
                && v.position > Position::Incapacitated
        });
        if linkless {
            self.flee(victim);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::HitKind;
    use crate::config::CombatConfig;
    use crate::ids::RoomId;
    use crate::world::{Room, World};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    const SLASH: AttackKind = AttackKind::Weapon(HitKind::Slash);

    fn pair() -> (CombatEngine, CharId, CharId) {
        pair_seeded(11)
    }

    fn pair_seeded(seed: u64) -> (CombatEngine, CharId, CharId) {
        let mut world = World::new();
        world.add_room(Room::new(RoomId(1), "Arena"));
        let mut a = Character::npc("orc", 100, 10);
        a.room = RoomId(1);
        let mut b = Character::npc("wolf", 200, 10);
        b.room = RoomId(1);
        b.abilities.con = 20;
        b.hit = 50;
        b.max_hit = 50;
        let a = world.add_character(a);
        let b = world.add_character(b);
        (CombatEngine::new(CombatConfig::default(), world, seed), a, b)
    }

    /// Counts ERROR events seen while installed.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_resisted() {
        assert_eq!(resisted(30, 1), 20);
        assert_eq!(resisted(30, -1), 45);
        assert_eq!(resisted(30, 0), 30);
    }

    #[test]
    fn test_damage_experience() {
        assert_eq!(damage_experience(10, 10, 5), 11 * 5 / 11);
        assert_eq!(damage_experience(0, 0, 500), 20);
    }

    #[test]
    fn test_scenario_wounded_but_fighting() {
        let (mut engine, a, b) = pair();
        let outcome = engine.apply_damage(a, b, 35, AttackKind::Mental, None);
        assert_eq!(outcome, DamageOutcome::Survived { applied: 35 });
        let v = engine.world().character(b).unwrap();
        assert_eq!(v.hit, 15);
        assert_eq!(v.position, Position::Fighting);
        assert_eq!(v.fighting, Some(a));
        assert!(engine.roster_invariant_holds());
    }

    #[test]
    fn test_damaging_the_dead_is_noop() {
        let (mut engine, a, b) = pair();
        {
            let v = engine.world_mut().character_mut(b).unwrap();
            v.hit = -12;
            v.position = Position::Dead;
        }
        let before = engine.state_hash();

        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        let outcome = tracing::subscriber::with_default(subscriber, || {
            engine.apply_damage(a, b, 10, SLASH, None)
        });

        assert_eq!(outcome, DamageOutcome::Ignored(DamageRejection::VictimDead));
        assert_eq!(engine.world().character(b).unwrap().hit, -12);
        assert_eq!(engine.state_hash(), before);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_living_victim_logs_no_error() {
        let (mut engine, a, b) = pair();
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        tracing::subscriber::with_default(subscriber, || {
            engine.apply_damage(a, b, 10, SLASH, None);
        });
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    fn hallucinating(seed: u64, modifier: i32) -> (CombatEngine, CharId, CharId) {
        let (mut engine, a, b) = pair_seeded(seed);
        engine
            .world_mut()
            .character_mut(a)
            .unwrap()
            .affects
            .apply(Affect::new(AffectKind::Hallucinate, 10, modifier));
        (engine, a, b)
    }

    #[test]
    fn test_hallucination_swiff_weakens_affliction() {
        let (mut swiffs, mut real) = (0, 0);
        for seed in 0..100 {
            let (mut engine, a, b) = hallucinating(seed, 3);
            let outcome = engine.apply_damage(a, b, 10, SLASH, None);
            let attacker = engine.world().character(a).unwrap();
            let hallucination = attacker.affects.get(AffectKind::Hallucinate);
            if outcome == DamageOutcome::Ignored(DamageRejection::Hallucination) {
                swiffs += 1;
                assert_eq!(engine.world().character(b).unwrap().hit, 50);
                assert_eq!(hallucination.map(|h| h.modifier), Some(2));
            } else {
                real += 1;
                assert!(hallucination.is_none(), "seed {seed}");
                assert!(outcome.applied() > 0);
            }
        }
        // 100/(3+1): one swing in four gets through
        assert!(swiffs > 0 && real > 0, "swiffs={swiffs} real={real}");
    }

    #[test]
    fn test_last_swiff_ends_hallucination() {
        let mut swiffs = 0;
        for seed in 0..40 {
            let (mut engine, a, b) = hallucinating(seed, 1);
            let outcome = engine.apply_damage(a, b, 10, SLASH, None);
            let attacker = engine.world().character(a).unwrap();
            assert!(attacker.affects.get(AffectKind::Hallucinate).is_none());
            if outcome == DamageOutcome::Ignored(DamageRejection::Hallucination) {
                swiffs += 1;
                assert_eq!(engine.world().character(b).unwrap().hit, 50);
            }
        }
        assert!(swiffs > 0);
    }

    #[test]
    fn test_hallucination_spares_mental_attacks() {
        let (mut engine, a, b) = hallucinating(3, 50);
        assert_eq!(engine.apply_damage(a, b, 10, AttackKind::Mental, None).applied(), 10);
        let attacker = engine.world().character(a).unwrap();
        assert_eq!(attacker.affects.get(AffectKind::Hallucinate).map(|h| h.modifier), Some(50));
    }

    #[test]
    fn test_incorporeal_ignores_physical_only() {
        let (mut engine, a, b) = pair();
        engine
            .world_mut()
            .character_mut(b)
            .unwrap()
            .status
            .insert(crate::character::StatusFlags::INCORPOREAL);
        assert_eq!(
            engine.apply_damage(a, b, 10, SLASH, None),
            DamageOutcome::Ignored(DamageRejection::PassThrough)
        );
        assert_eq!(engine.apply_damage(a, b, 10, AttackKind::Mental, None).applied(), 10);
    }

    #[test]
    fn test_shield_trades_mana() {
        let (mut engine, a, b) = pair();
        {
            let v = engine.world_mut().character_mut(b).unwrap();
            v.hit = 100;
            v.max_hit = 100;
            v.mana = 1000;
            v.profs.mage = 30;
            v.affects.apply(Affect::new(AffectKind::Shield, 10, 0));
        }
        let outcome = engine.apply_damage(a, b, 20, AttackKind::Mental, None);
        // 40% of 20 absorbed
        assert_eq!(outcome.applied(), 12);
        let v = engine.world().character(b).unwrap();
        assert!(v.mana < 1000);
        assert_eq!(v.affects.get(AffectKind::Shield).unwrap().duration, 2);
    }

    #[test]
    fn test_shield_ignores_bash() {
        let (mut engine, a, b) = pair();
        {
            let v = engine.world_mut().character_mut(b).unwrap();
            v.mana = 1000;
            v.affects.apply(Affect::new(AffectKind::Shield, 10, 0));
        }
        let outcome = engine.apply_damage(a, b, 1, AttackKind::Skill(Skill::Bash), None);
        assert_eq!(outcome.applied(), 1);
        assert_eq!(engine.world().character(b).unwrap().mana, 1000);
    }

    #[test]
    fn test_wheel_delay_broken_by_damage() {
        let (mut engine, a, b) = pair();
        engine.waits.schedule(
            b,
            crate::wait_list::DelayEntry::new(
                10,
                crate::wait_list::DelayedCommand::Wait,
                30,
                crate::wait_list::DelayTarget::None,
                DelayFlags::WAITING | DelayFlags::WAIT_WHEEL,
            ),
        );
        engine.apply_damage(a, b, 1, AttackKind::Mental, None);
        assert!(!engine.waits().contains(b));
    }

    #[test]
    fn test_sanctuary_holds_against_neutral() {
        let (mut engine, a, b) = pair();
        engine
            .world_mut()
            .character_mut(b)
            .unwrap()
            .affects
            .apply(Affect::new(AffectKind::Sanctuary, 10, 50));
        // alignment 0 never erodes the ward
        assert_eq!(
            engine.apply_damage(a, b, 10, AttackKind::Mental, None),
            DamageOutcome::Ignored(DamageRejection::Sanctuary)
        );
    }

    #[test]
    fn test_attack_ends_attacker_sanctuary() {
        let (mut engine, a, b) = pair();
        engine
            .world_mut()
            .character_mut(a)
            .unwrap()
            .affects
            .apply(Affect::new(AffectKind::Sanctuary, 10, 50));
        engine.apply_damage(a, b, 1, AttackKind::Mental, None);
        assert!(!engine
            .world()
            .character(a)
            .unwrap()
            .affects
            .has(AffectKind::Sanctuary));
    }

    #[test]
    fn test_overkill_limits_player_mobs() {
        let mut world = World::new();
        world.add_room(Room::new(RoomId(1), "Square"));
        let mut target = Character::player("Boromir", 1, 30);
        target.room = RoomId(1);
        target.max_hit = 10_000;
        target.hit = 10_000;
        let target = world.add_character(target);
        let mut attackers = Vec::new();
        for i in 0..6 {
            let mut p = Character::player(&format!("Easterling{i}"), 10 + i, 10);
            p.room = RoomId(1);
            attackers.push(world.add_character(p));
        }
        let mut engine = CombatEngine::new(CombatConfig::default(), world, 5);
        for &p in &attackers {
            engine.engage(p, target);
        }
        let rejected = (0..200)
            .filter(|_| {
                engine.apply_damage(attackers[0], target, 1, AttackKind::Mental, None)
                    == DamageOutcome::Ignored(DamageRejection::Overkill)
            })
            .count();
        assert!(rejected > 100, "only {rejected} rejected");
    }

    #[test]
    fn test_charmed_pet_redirect_goes_to_master() {
        let (mut engine, a, b) = pair();
        let master = {
            let mut m = Character::player("Gandalf", 5, 30);
            m.room = RoomId(1);
            engine.world_mut().add_character(m)
        };
        {
            let v = engine.world_mut().character_mut(b).unwrap();
            v.master = Some(master);
            v.status.insert(crate::character::StatusFlags::CHARMED);
            v.hit = 10_000;
            v.max_hit = 10_000;
        }
        let redirected = (0..200)
            .filter(|_| {
                engine.apply_damage(a, b, 1, AttackKind::Mental, None)
                    == DamageOutcome::Ignored(DamageRejection::Redirected)
            })
            .count();
        assert!(redirected > 0);
    }

    proptest! {
        #[test]
        fn prop_damage_ceiling(raw in 0i32..5000, seed in 0u64..1000) {
            let mut world = World::new();
            world.add_room(Room::new(RoomId(1), "Arena"));
            let mut a = Character::npc("troll", 1, 30);
            a.room = RoomId(1);
            let mut b = Character::npc("ent", 2, 30);
            b.room = RoomId(1);
            b.max_hit = 100_000;
            b.hit = 100_000;
            let a = world.add_character(a);
            let b = world.add_character(b);
            let mut engine = CombatEngine::new(CombatConfig::default(), world, seed);
            let before = engine.world().character(b).unwrap().hit;
            let outcome = engine.apply_damage(a, b, raw, SLASH, Some(0));
            let after = engine.world().character(b).unwrap().hit;
            prop_assert!(outcome.applied() <= 200);
            prop_assert!(before - after <= 200);
        }
    }
}
