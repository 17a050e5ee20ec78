//! Hit resolution.
//!
//! A swing rolls an offensive bonus against the defender's dodge (with the
//! evasion malus) and then parry. Only a swing that beats both reaches the
//! damage pipeline. A natural roll of [`CRITICAL_ROLL`] cannot be dodged,
//! evaded or parried.

use serde::{Deserialize, Serialize};

use crate::attack::{AttackKind, HitKind};
use crate::character::{Character, Skill, Tactics};
use crate::engine::{CombatEngine, HitEvent, To};
use crate::ids::CharId;
use crate::objects::{ArmorStats, Material, WearSlot};
use crate::position::Position;

/// Die size of the offense roll; rolling the top face is a critical swing.
pub const CRITICAL_ROLL: i32 = 35;

/// How a swing went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitOutcome {
    /// Attacker or victim missing, or not in the same room.
    NotInRoom,
    /// Attacker below `Fighting`.
    NotReady,
    /// Attacker lacked the energy to swing; engagement still happens.
    NoEnergy,
    /// Physical blow went through an incorporeal victim.
    PassedThrough,
    /// Spirit-bane weapon struck an incorporeal victim's will.
    WillpowerStrike,
    /// Victim evaded.
    Evaded,
    /// Victim dodged.
    Dodged,
    /// Victim parried, possibly riposting.
    Parried {
        /// Whether a riposte followed.
        riposte: bool,
    },
    /// The blow landed and was handed to the damage pipeline.
    Landed {
        /// Body location index.
        location: usize,
        /// Damage after armor.
        damage: i32,
    },
}

/// Extra dodge an evading defender imposes on the attacker: a cleric
/// contest offset by the attacker's perception, never below 5.
#[must_use]
pub fn evasion_malus(attacker: &Character, victim: &Character) -> i32 {
    const BASE: i32 = 5;
    if !victim.affects.has(crate::affects::AffectKind::Evasion) {
        return 0;
    }
    let defender_bonus = victim.profs.cleric / 2;
    let mut attacker_offset = attacker.profs.cleric * (100 - attacker.perception) / 200;
    if attacker.is_npc() {
        attacker_offset /= 2;
    }
    if attacker_offset > defender_bonus {
        BASE
    } else {
        BASE + defender_bonus - attacker_offset
    }
}

/// Parry meter after one parry attempt.
#[must_use]
pub const fn decay_parry(meter: i32) -> i32 {
    meter * 2 / 3
}

/// Scale raw blow damage by the offense margin and a 0..=100 roll.
///
/// Accurate blows skip the offense and strength terms.
#[must_use]
pub fn scale_landed_damage(
    dam: i32,
    ob: i32,
    roll: i32,
    accurate: bool,
    two_handed: bool,
    strength: i32,
) -> i32 {
    let dam = i64::from(dam);
    let roll = i64::from(roll);
    let scaled = if accurate {
        dam * (10_000 + roll * roll) / 100_000
    } else {
        let grip = if two_handed { 2 } else { 1 };
        dam * (i64::from(ob) + 100) * (10_000 + roll * roll + grip * 133 * i64::from(strength))
            / 13_300_000
    };
    i32::try_from(scaled).unwrap_or(if scaled < 0 { i32::MIN } else { i32::MAX })
}

/// Damage left after `armor`: minimum absorption, then a percentage.
/// Spears only meet half the percentage.
#[must_use]
pub fn armor_reduction(dam: i32, armor: &ArmorStats, kind: HitKind) -> i32 {
    let dam = dam - armor.min_absorb;
    if kind == HitKind::Spears {
        dam - (dam * armor.absorb + 50) / 200
    } else {
        dam - (dam * armor.absorb + 50) / 100
    }
}

/// What the attacker swings with.
#[derive(Debug, Clone, Copy)]
struct Swing {
    kind: HitKind,
    damage: i32,
    spirit_bane: bool,
}

impl CombatEngine {
    /// Resolve one swing of `ch` at `victim`.
    pub fn hit(&mut self, ch: CharId, victim: CharId) -> HitOutcome {
        let outcome = self.resolve_swing(ch, victim);
        tracing::debug!(attacker = %ch, victim = %victim, ?outcome, "Swing resolved");
        self.events.hits.push(HitEvent {
            attacker: ch,
            victim,
            outcome: outcome.clone(),
        });
        outcome
    }

    fn resolve_swing(&mut self, ch: CharId, victim: CharId) -> HitOutcome {
        let Some(a) = self.world.character(ch) else {
            return HitOutcome::NotInRoom;
        };
        if !self.world.is_same_room(ch, victim) {
            tracing::error!(attacker = %ch, victim = %victim, "Not in the same room when fighting");
            return HitOutcome::NotInRoom;
        }
        if a.position < Position::Fighting {
            return HitOutcome::NotReady;
        }

        let accurate = self.check_accuracy(ch, victim);

        let weapon = self.world.weapon_of(ch).map(|(_, stats)| stats);
        let (Some(a), Some(v)) = (self.world.character(ch), self.world.character(victim)) else {
            return HitOutcome::NotInRoom;
        };
        let swing = match weapon {
            Some(stats) => Swing {
                kind: stats.hit_kind(),
                damage: stats.damage,
                spirit_bane: stats.spirit_bane,
            },
            None if a.is_npc() => Swing {
                kind: a.natural_attack.unwrap_or(HitKind::Hit),
                damage: 0,
                spirit_bane: false,
            },
            None => Swing {
                kind: HitKind::Hit,
                damage: self.config.barehanded_damage * 10,
                spirit_bane: false,
            },
        };
        let base_ob = a.real_ob();
        let energy = a.energy;
        let evasion = if accurate { 0 } else { evasion_malus(a, v) };
        let dodge_malus = if accurate { 0 } else { v.real_dodge() + evasion };
        let victim_position = v.position;
        let victim_incorporeal = v.is_incorporeal();

        let roll = self.rng.range(1, CRITICAL_ROLL);
        let critical = roll == CRITICAL_ROLL;
        let mut ob = base_ob;
        ob += self.rng.range(1, 55 + ob / 4);
        ob += roll;
        ob -= ob / 8;
        ob -= 40;
        if critical {
            ob += 100;
        }
        ob -= dodge_malus;
        if victim_position < Position::Fighting {
            ob += 10 * (Position::Fighting.rank() - victim_position.rank());
        }

        let ene = self.config.energy_to_hit;
        let outcome = if energy >= ene {
            if let Some(a) = self.world.character_mut(ch) {
                a.energy -= ene;
            }

            if victim_incorporeal {
                if swing.spirit_bane {
                    self.willpower_strike(ch, victim);
                    return HitOutcome::WillpowerStrike;
                }
                self.pass_through(ch, victim);
                return HitOutcome::PassedThrough;
            }

            if ob < 0 && !critical {
                if self.rng.range(0, dodge_malus) < evasion {
                    self.act("$N evades your attack.", ch, Some(victim), To::Char);
                    self.act("You evade $n's attack.", ch, Some(victim), To::Vict);
                    self.act("$N evades $n's attack.", ch, Some(victim), To::NotVict);
                    HitOutcome::Evaded
                } else {
                    self.act("$N dodges your attack.", ch, Some(victim), To::Char);
                    self.act("You dodge $n's attack.", ch, Some(victim), To::Vict);
                    self.act("$N dodges $n's attack.", ch, Some(victim), To::NotVict);
                    HitOutcome::Dodged
                }
            } else {
                if let Some(v) = self.world.character_mut(victim) {
                    if v.position > Position::Stunned {
                        ob -= v.real_parry() * v.current_parry / 100;
                    }
                    v.current_parry = decay_parry(v.current_parry);
                }
                if critical {
                    ob = ob.max(0);
                }

                if ob >= 0 {
                    return self.land_blow(ch, victim, swing, ob, accurate, victim_position);
                }

                self.act("$N parries your attack.", ch, Some(victim), To::Char);
                self.act("You parry $n's attack.", ch, Some(victim), To::Vict);
                self.act("$N parries $n's attack.", ch, Some(victim), To::NotVict);
                let (riposte, killed) = self.check_riposte(ch, victim);
                if killed {
                    return HitOutcome::Parried { riposte };
                }
                self.check_grip(ch);
                self.check_grip(victim);
                HitOutcome::Parried { riposte }
            }
        } else {
            HitOutcome::NoEnergy
        };

        self.follow_through(ch, victim);
        outcome
    }

    fn land_blow(
        &mut self,
        ch: CharId,
        victim: CharId,
        swing: Swing,
        ob: i32,
        accurate: bool,
        victim_position: Position,
    ) -> HitOutcome {
        let Some(body) = self.world.character(victim).map(|v| v.body) else {
            return HitOutcome::NotInRoom;
        };
        let location = body.draw_location(&mut self.rng);

        let Some(a) = self.world.character(ch) else {
            return HitOutcome::NotInRoom;
        };
        let mut dam = swing.damage;
        if a.is_npc() {
            dam /= 2;
        }
        dam += a.damroll * 10;
        let (two_handed, strength) = (a.is_two_handed(), a.abilities.str);
        let roll = self.rng.range(0, 100);
        dam = scale_landed_damage(dam, ob, roll, accurate, two_handed, strength);

        dam = self.find_weakness(ch, victim, dam);
        dam = self.armor_effect(ch, victim, dam, body.armor_slot(location), swing.kind);
        if victim_position < Position::Fighting {
            dam += dam / 2;
        }
        dam = dam.max(0);

        self.apply_damage(ch, victim, dam, AttackKind::Weapon(swing.kind), Some(location));
        if dam > 0 {
            self.check_grip(ch);
        }
        HitOutcome::Landed {
            location,
            damage: dam,
        }
    }

    /// Engagement and wound feedback after a swing that did not land.
    fn follow_through(&mut self, ch: CharId, victim: CharId) {
        let Some(a) = self.world.character(ch) else {
            return;
        };
        if a.fighting != Some(victim)
            && self
                .hooks
                .special_damage(self.hook_ctx(ch, Some(victim)))
                .is_veto()
        {
            return;
        }

        if a.position > Position::Stunned && ch != victim {
            self.engage(ch, victim);
        }
        if self
            .world
            .character(victim)
            .is_some_and(|v| v.position > Position::Stunned)
        {
            self.engage(victim, ch);
            self.remember(victim, ch);
        }

        self.wound_feedback(ch, victim);
        self.flee_if_linkless(victim);
    }

    /// An NPC with memory remembers a mortal player who attacked it.
    pub(crate) fn remember(&mut self, ch: CharId, attacker: CharId) {
        let immortal = self.config.level_immortal;
        let Some(a) = self.world.character(attacker) else {
            return;
        };
        if a.is_npc() || a.level >= immortal {
            return;
        }
        if let Some(c) = self.world.character_mut(ch) {
            if c.has_mob_flag(crate::character::MobFlags::MEMORY) {
                c.memory.insert(attacker);
            }
        }
    }

    /// Careful or aggressive fighters may find an opening that bypasses
    /// the dodge roll.
    fn check_accuracy(&mut self, ch: CharId, victim: CharId) -> bool {
        let Some(a) = self.world.character(ch) else {
            return false;
        };
        if !matches!(a.tactics, Tactics::Careful | Tactics::Aggressive) {
            return false;
        }
        let prob = (a.profs.ranger - a.skill_penalty - a.dodge_penalty) * a.skill(Skill::Accuracy)
            / 100;
        if self.rng.range(0, 100) < prob {
            self.act(
                "You manage to find an opening in $N's defense!",
                ch,
                Some(victim),
                To::Char,
            );
            self.act(
                "$n notices an opening in your defense!",
                ch,
                Some(victim),
                To::Vict,
            );
            return true;
        }
        false
    }

    /// After a parry the defender may strike back. Returns whether a
    /// riposte happened and whether it killed the attacker.
    fn check_riposte(&mut self, ch: CharId, victim: CharId) -> (bool, bool) {
        let Some((_, weapon)) = self.world.weapon_of(victim) else {
            return (false, false);
        };
        let bashed = self.is_bashed(victim);
        let Some(v) = self.world.character(victim) else {
            return (false, false);
        };
        if v.skill(Skill::Riposte) == 0
            || v.is_npc()
            || v.position != Position::Fighting
            || bashed
            || weapon.bulk > 3
        {
            return (false, false);
        }
        let prob = (v.skill(Skill::Riposte) + v.skill(Skill::Stealth) + v.abilities.dex * 5)
            * v.profs.ranger
            / 200;
        let dex = v.abilities.dex.min(20);
        if self.rng.range(0, 99) > prob {
            return (false, false);
        }

        self.act("You riposte $N's attack!", victim, Some(ch), To::Char);
        self.act("$n ripostes your attack!", victim, Some(ch), To::Vict);
        self.act("$n ripostes $N's attack!", victim, Some(ch), To::NotVict);
        let dam = weapon.damage * dex / self.rng.range(50, 100);
        let outcome = self.apply_damage(victim, ch, dam, AttackKind::Weapon(weapon.hit_kind()), None);
        (true, outcome.is_killed())
    }

    /// A one-handed weapon held in both hands can slip.
    pub(crate) fn check_grip(&mut self, ch: CharId) {
        let Some((_, weapon)) = self.world.weapon_of(ch) else {
            return;
        };
        if weapon.bulk > 4 || !self.world.character(ch).is_some_and(Character::is_two_handed) {
            return;
        }
        if self.rng.range(0, 99) < 35 - weapon.bulk {
            if let Some(c) = self.world.character_mut(ch) {
                c.energy -= 300 + (5 - weapon.bulk) * 100;
            }
            self.tell(ch, "You struggle to maintain your grip on your weapon.");
        }
    }

    fn find_weakness(&mut self, ch: CharId, victim: CharId, dam: i32) -> i32 {
        let Some(a) = self.world.character(ch) else {
            return dam;
        };
        if a.is_npc() {
            return dam;
        }
        let warrior = a.profs.warrior;
        let mut prob = a.skill(Skill::FindWeakness) / 3 * warrior / 30;
        if warrior > 30 {
            prob += warrior - 30;
        }
        if prob > self.rng.range(0, 99) {
            self.act("You discover a weakness in $N's defense!", ch, Some(victim), To::Char);
            self.act("$n discovers a weakness in $N's defense!", ch, Some(victim), To::NotVict);
            self.act("$n discovers a weakness in your defense!", ch, Some(victim), To::Vict);
            return dam + dam / 2;
        }
        dam
    }

    fn armor_effect(
        &mut self,
        ch: CharId,
        victim: CharId,
        dam: i32,
        slot: Option<WearSlot>,
        kind: HitKind,
    ) -> i32 {
        let Some(armor) = slot.and_then(|s| self.world.armor_at(victim, s)) else {
            return dam;
        };
        let reduced = armor_reduction(dam, &armor, kind);
        if kind == HitKind::Smite && armor.material == Material::Plate && self.rng.one_in(5) {
            self.tell(ch, "Your opponent's bones crunch loudly.");
            self.tell(victim, "OUCH! You hear a crunching sound and feel a sharp pain.");
            if let Some(room) = self.world.character(ch).map(|c| c.room) {
                self.world
                    .room_broadcast(room, "You hear a crunching sound.", &[ch, victim]);
            }
            return dam + (dam - reduced);
        }
        reduced
    }

    pub(crate) fn pass_through(&mut self, ch: CharId, victim: CharId) {
        self.act("Your blow passes right through $N!", ch, Some(victim), To::Char);
        self.act("$n's blow passes harmlessly through you.", ch, Some(victim), To::Vict);
        self.act("$n's blow passes right through $N!", ch, Some(victim), To::NotVict);
    }

    /// A spirit-bane weapon wounds the will of an incorporeal victim.
    fn willpower_strike(&mut self, ch: CharId, victim: CharId) {
        let Some(a) = self.world.character(ch) else {
            return;
        };
        let (wil, damroll) = (a.abilities.wil, a.damroll);
        let dam = self.rng.range(1, wil.max(1)) + damroll.max(0);
        self.act("Your weapon bites into the spirit of $N!", ch, Some(victim), To::Char);
        self.apply_damage(ch, victim, dam, AttackKind::Mental, None);
    }
}
