//! Body layouts: which part a landed blow strikes and which armor covers it.

use serde::{Deserialize, Serialize};

use crate::objects::WearSlot;
use crate::rng::GameRng;

/// One body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyPart {
    /// Name used in damage messages.
    pub name: &'static str,
    /// Chance in percent of being struck.
    pub percent: i32,
    /// Armor slot protecting this part.
    pub armor: Option<WearSlot>,
}

const fn part(name: &'static str, percent: i32, armor: Option<WearSlot>) -> BodyPart {
    BodyPart {
        name,
        percent,
        armor,
    }
}

const HUMANOID: &[BodyPart] = &[
    part("head", 10, Some(WearSlot::Head)),
    part("neck", 5, Some(WearSlot::Neck)),
    part("body", 40, Some(WearSlot::Body)),
    part("arms", 15, Some(WearSlot::Arms)),
    part("hands", 5, Some(WearSlot::Hands)),
    part("legs", 20, Some(WearSlot::Legs)),
    part("feet", 5, Some(WearSlot::Feet)),
];

const ANIMAL: &[BodyPart] = &[
    part("head", 20, Some(WearSlot::Head)),
    part("body", 50, Some(WearSlot::Body)),
    part("forelegs", 15, Some(WearSlot::Arms)),
    part("hindlegs", 15, Some(WearSlot::Legs)),
];

const WINGED: &[BodyPart] = &[
    part("head", 15, Some(WearSlot::Head)),
    part("body", 45, Some(WearSlot::Body)),
    part("wings", 30, None),
    part("talons", 10, Some(WearSlot::Feet)),
];

/// Body layout of a character.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum BodyType {
    /// Two arms, two legs. The only layout crowded out by overkill.
    #[default]
    Humanoid,
    /// Four-legged beasts.
    Animal,
    /// Birds and bats.
    Winged,
    /// Spirits and oozes: no parts, no armor.
    Formless,
}

impl BodyType {
    /// Part table of this layout.
    #[must_use]
    pub const fn parts(self) -> &'static [BodyPart] {
        match self {
            BodyType::Humanoid => HUMANOID,
            BodyType::Animal => ANIMAL,
            BodyType::Winged => WINGED,
            BodyType::Formless => &[],
        }
    }

    /// Whether a crowd of attackers can be crowded out around this body.
    #[must_use]
    pub const fn overkill_eligible(self) -> bool {
        matches!(self, BodyType::Humanoid)
    }

    /// Draw the struck part, weighted by the part percentages.
    pub fn draw_location(self, rng: &mut GameRng) -> usize {
        let parts = self.parts();
        if parts.is_empty() {
            return 0;
        }
        let mut roll = rng.range(1, 100);
        let mut location = 0;
        while roll > 0 && location < parts.len() {
            roll -= parts[location].percent;
            location += 1;
        }
        location.saturating_sub(1)
    }

    /// Name of the part at `location`, empty when the layout has none.
    #[must_use]
    pub fn part_name(self, location: usize) -> &'static str {
        self.parts().get(location).map_or("", |p| p.name)
    }

    /// Armor slot covering the part at `location`.
    #[must_use]
    pub fn armor_slot(self, location: usize) -> Option<WearSlot> {
        self.parts().get(location).and_then(|p| p.armor)
    }
}
