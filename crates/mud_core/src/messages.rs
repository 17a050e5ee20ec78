//! Damage narration.
//!
//! Weapon blows are described by a template chosen from the damage band and
//! filled in with the weapon's verb and the struck body part. Every other
//! attack kind draws a random entry from its pool in the [`MessageCatalog`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attack::{AttackKind, HitKind};
use crate::character::Skill;
use crate::error::{CombatError, Result};
use crate::rng::GameRng;

/// Templates for one damage band: room, attacker, victim.
struct BandTemplate {
    room: &'static str,
    attacker: &'static str,
    victim: &'static str,
}

// #w weapon verb, #W third person verb, #b " body part", #s "'s", #r "r".
const BANDS: [BandTemplate; 11] = [
    BandTemplate {
        room: "$n misses $N#s#b with $s #w.",
        attacker: "You miss $N#s#b with your #w.",
        victim: "$n misses you#r#b with $s #w.",
    },
    BandTemplate {
        room: "$n grazes $N#s#b with $s #w.",
        attacker: "You graze $N#s#b as you #w $M.",
        victim: "$n grazes you#r#b as $e #W you.",
    },
    BandTemplate {
        room: "$n barely #W $N#s#b.",
        attacker: "You barely #w $N#s#b.",
        victim: "$n barely #W you#r#b.",
    },
    BandTemplate {
        room: "$n lightly #W $N#s#b.",
        attacker: "You lightly #w $N#s#b.",
        victim: "$n lightly #W you#r#b.",
    },
    BandTemplate {
        room: "$n #W $N#s#b.",
        attacker: "You #w $N#s#b.",
        victim: "$n #W you#r#b.",
    },
    BandTemplate {
        room: "$n #W $N#s#b hard.",
        attacker: "You #w $N#s#b hard.",
        victim: "$n #W you#r#b hard.",
    },
    BandTemplate {
        room: "$n #W $N#s#b very hard.",
        attacker: "You #w $N#s#b very hard.",
        victim: "$n #W you#r#b very hard.",
    },
    BandTemplate {
        room: "$n #W $N#s#b brutally hard.",
        attacker: "You #w $N#s#b brutally hard.",
        victim: "$n #W you#r#b brutally hard.",
    },
    BandTemplate {
        room: "$n wounds $N#s#b deeply with $s #w.",
        attacker: "You wound $N#s#b deeply with your #w.",
        victim: "$n wounds you#r#b deeply with $s #w.",
    },
    BandTemplate {
        room: "$n gravely wounds $N#s#b with $s #w!",
        attacker: "You gravely wound $N#s#b with your #w!",
        victim: "$n gravely wounds you#r#b with $s #w!",
    },
    BandTemplate {
        room: "$n SAVAGES $N#s#b with $s deadly #w!!",
        attacker: "You SAVAGE $N#s#b with your deadly #w!!",
        victim: "$n SAVAGES you#r#b with $s deadly #w!!",
    },
];

/// Damage band, 0 (miss) to 10.
#[must_use]
pub const fn damage_band(dam: i32) -> usize {
    match dam {
        i32::MIN..=0 => 0,
        1 => 1,
        2..=3 => 2,
        4..=6 => 3,
        7..=11 => 4,
        12..=17 => 5,
        18..=24 => 6,
        25..=33 => 7,
        34..=60 => 8,
        61..=90 => 9,
        _ => 10,
    }
}

/// Fill in weapon and body part tokens.
#[must_use]
pub fn replace_tokens(template: &str, singular: &str, plural: &str, part: &str) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '#' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('w') => out.push_str(singular),
            Some('W') => out.push_str(plural),
            Some('b') if !part.is_empty() => {
                out.push(' ');
                out.push_str(part);
            }
            Some('s') if !part.is_empty() => out.push_str("'s"),
            Some('r') if !part.is_empty() => out.push('r'),
            Some('b' | 's' | 'r') => {}
            Some(other) => {
                out.push('#');
                out.push(other);
            }
            None => out.push('#'),
        }
    }
    out
}

/// Substitute actor (`$n`) and target (`$N`) names and their pronouns.
#[must_use]
pub fn act(template: &str, actor: &str, target: &str) -> String {
    let mut out = String::with_capacity(template.len() + actor.len() + target.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push_str(actor),
            Some('N') => out.push_str(target),
            Some('s' | 'S') => out.push_str("their"),
            Some('m' | 'M') => out.push_str("them"),
            Some('e' | 'E') => out.push_str("they"),
            Some(other) => {
                out.push('$');
                out.push(other);
            }
            None => out.push('$'),
        }
    }
    out
}

/// Texts for attacker, victim and bystanders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct MessageTriple {
    /// Seen by the attacker.
    pub attacker: String,
    /// Seen by the victim.
    pub victim: String,
    /// Seen by everyone else.
    pub room: String,
}

impl MessageTriple {
    fn new(attacker: &str, victim: &str, room: &str) -> Self {
        Self {
            attacker: attacker.to_string(),
            victim: victim.to_string(),
            room: room.to_string(),
        }
    }
}

/// One pool entry for an attack kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct MessageSet {
    /// The blow killed.
    pub die: MessageTriple,
    /// The blow did no damage.
    pub miss: MessageTriple,
    /// The blow did damage.
    pub hit: MessageTriple,
    /// The attacker struck themselves; the victim text is unused.
    pub self_hit: MessageTriple,
}

/// Message pools per attack kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageCatalog {
    /// Pools.
    pub pools: BTreeMap<AttackKind, Vec<MessageSet>>,
}

/// Rendered narration of one blow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Narrative {
    /// For the attacker.
    pub to_attacker: String,
    /// For the victim; empty when the attacker hit themselves.
    pub to_victim: String,
    /// For everyone else in the room.
    pub to_room: String,
}

/// Everything needed to narrate a blow.
#[derive(Debug, Clone, Copy)]
pub struct Blow<'a> {
    /// Attack kind.
    pub kind: AttackKind,
    /// Damage dealt.
    pub damage: i32,
    /// The attacker wields a weapon.
    pub armed: bool,
    /// The attacker struck themselves.
    pub self_hit: bool,
    /// The blow killed the victim.
    pub fatal: bool,
    /// Struck body part, empty if unknown.
    pub body_part: &'a str,
    /// Attacker name.
    pub attacker: &'a str,
    /// Victim name.
    pub victim: &'a str,
}

fn skill_set(hit: [&str; 3], miss: [&str; 3], die: [&str; 3], self_hit: [&str; 2]) -> MessageSet {
    MessageSet {
        die: MessageTriple::new(die[0], die[1], die[2]),
        miss: MessageTriple::new(miss[0], miss[1], miss[2]),
        hit: MessageTriple::new(hit[0], hit[1], hit[2]),
        self_hit: MessageTriple::new(self_hit[0], "", self_hit[1]),
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        let mut pools = BTreeMap::new();
        pools.insert(
            AttackKind::Skill(Skill::Kick),
            vec![skill_set(
                ["Your kick lands on $N.", "$n kicks you.", "$n kicks $N."],
                ["Your kick misses $N.", "$n tries to kick you but misses.", "$n misses a kick at $N."],
                ["Your kick crushes the life out of $N.", "$n kicks you to death.", "$n kicks $N to death."],
                ["You kick yourself.", "$n kicks $mself."],
            )],
        );
        pools.insert(
            AttackKind::Skill(Skill::Swing),
            vec![skill_set(
                ["Your wild swing catches $N.", "$n's wild swing catches you.", "$n's wild swing catches $N."],
                ["You swing wildly at $N and miss.", "$n swings wildly at you and misses.", "$n swings wildly at $N and misses."],
                ["Your wild swing fells $N for good.", "$n's wild swing fells you for good.", "$n's wild swing fells $N for good."],
                ["You swing at yourself.", "$n swings at $mself."],
            )],
        );
        pools.insert(
            AttackKind::Skill(Skill::Bash),
            vec![skill_set(
                ["You send $N sprawling.", "$n sends you sprawling.", "$n sends $N sprawling."],
                ["You try to bash $N but stumble.", "$n tries to bash you but stumbles.", "$n tries to bash $N but stumbles."],
                ["Your bash breaks $N.", "$n's bash breaks you.", "$n's bash breaks $N."],
                ["You bash yourself.", "$n bashes $mself."],
            )],
        );
        pools.insert(
            AttackKind::Skill(Skill::Bite),
            vec![skill_set(
                ["You sink your teeth into $N.", "$n sinks $s teeth into you.", "$n sinks $s teeth into $N."],
                ["Your jaws snap shut on air.", "$n's jaws snap shut just short of you.", "$n snaps at $N and misses."],
                ["You tear out $N's throat.", "$n tears out your throat.", "$n tears out $N's throat."],
                ["You bite yourself.", "$n bites $mself."],
            )],
        );
        pools.insert(
            AttackKind::Skill(Skill::Rend),
            vec![skill_set(
                ["You rend $N with your claws.", "$n rends you with $s claws.", "$n rends $N with $s claws."],
                ["You claw at $N but find nothing.", "$n claws at you but finds nothing.", "$n claws at $N but finds nothing."],
                ["You rend $N apart.", "$n rends you apart.", "$n rends $N apart."],
                ["You rend yourself.", "$n rends $mself."],
            )],
        );
        pools.insert(
            AttackKind::Skill(Skill::Maul),
            vec![skill_set(
                ["You maul $N.", "$n mauls you.", "$n mauls $N."],
                ["You lunge at $N but they slip away.", "$n lunges at you but you slip away.", "$n lunges at $N, who slips away."],
                ["You maul $N to death.", "$n mauls you to death.", "$n mauls $N to death."],
                ["You maul yourself.", "$n mauls $mself."],
            )],
        );
        pools.insert(
            AttackKind::Skill(Skill::Ambush),
            vec![skill_set(
                ["You leap from hiding and strike $N.", "$n leaps from hiding and strikes you.", "$n leaps from hiding and strikes $N."],
                ["You leap from hiding but $N sees you coming.", "$n leaps from hiding but you see it coming.", "$n leaps from hiding at $N and misses."],
                ["Your ambush slays $N outright.", "$n's ambush slays you outright.", "$n's ambush slays $N outright."],
                ["You ambush yourself.", "$n ambushes $mself."],
            )],
        );
        pools.insert(
            AttackKind::Mental,
            vec![skill_set(
                ["Your will crushes against $N's mind.", "$n's will crushes against your mind.", "$n stares at $N, who flinches."],
                ["$N's mind resists your will.", "Your mind resists $n's will.", "$n stares hard at $N."],
                ["Your will extinguishes $N's mind.", "$n's will extinguishes your mind.", "$N collapses under $n's stare."],
                ["You torment your own mind.", "$n clutches $s head."],
            )],
        );
        pools.insert(
            AttackKind::Poison,
            vec![skill_set(
                ["$N shivers as the poison works.", "You feel the poison burning in your blood.", "$N looks very ill."],
                ["$N shrugs off the poison.", "You shrug off the poison.", "$N looks a little pale."],
                ["$N succumbs to the poison.", "The poison claims you.", "$N succumbs to the poison."],
                ["You feel the poison burning in your blood.", "$n looks very ill."],
            )],
        );
        Self { pools }
    }
}

impl MessageCatalog {
    /// Parse a catalog from RON text.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| CombatError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load a catalog from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CombatError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&contents).map_err(|e| CombatError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Narrate a blow.
    pub fn narrate(&self, rng: &mut GameRng, blow: &Blow<'_>) -> Narrative {
        match blow.kind {
            AttackKind::Weapon(kind) => {
                let kind = if blow.armed { kind } else { HitKind::Hit };
                banded(blow, kind)
            }
            other => {
                let Some(set) = self.pools.get(&other).and_then(|pool| rng.choose(pool)) else {
                    tracing::warn!(kind = ?other, "No damage message pool for attack kind");
                    return banded(blow, HitKind::Hit);
                };
                let fill = |t: &str| act(t, blow.attacker, blow.victim);
                let triple = if blow.self_hit {
                    &set.self_hit
                } else if blow.damage == 0 {
                    &set.miss
                } else if blow.fatal {
                    &set.die
                } else {
                    &set.hit
                };
                Narrative {
                    to_attacker: fill(&triple.attacker),
                    to_victim: if blow.self_hit {
                        String::new()
                    } else {
                        fill(&triple.victim)
                    },
                    to_room: fill(&triple.room),
                }
            }
        }
    }
}

fn banded(blow: &Blow<'_>, kind: HitKind) -> Narrative {
    let band = &BANDS[damage_band(blow.damage)];
    let (singular, plural) = kind.nouns();
    let render = |t: &str| {
        act(
            &replace_tokens(t, singular, plural, blow.body_part),
            blow.attacker,
            blow.victim,
        )
    };
    Narrative {
        to_attacker: render(band.attacker),
        to_victim: render(band.victim),
        to_room: render(band.room),
    }
}
