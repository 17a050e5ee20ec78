//! Objects as far as combat cares: weapons, armor, money and corpses.

use serde::{Deserialize, Serialize};

use crate::attack::HitKind;
use crate::ids::{CharId, ObjId, RoomId};

/// Equipment slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum WearSlot {
    Wield,
    Shield,
    Head,
    Neck,
    Body,
    Arms,
    Hands,
    Legs,
    Feet,
}

/// Armor materials. Only rigid metal plate can be crunched by smiting weapons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Material {
    /// Cloth.
    #[default]
    Cloth,
    /// Leather.
    Leather,
    /// Chain mail.
    Chain,
    /// Rigid metal plate.
    Plate,
    /// Mithril.
    Mithril,
}

/// Weapon statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaponStats {
    /// Base damage.
    pub damage: i32,
    /// Weapon type code; see [`HitKind::from_weapon_type`].
    pub weapon_type: u8,
    /// Bulk; 4 or less is a one-handed weapon.
    pub bulk: i32,
    /// Strikes incorporeal beings with the wielder's will.
    pub spirit_bane: bool,
}

impl WeaponStats {
    /// Hit kind this weapon produces.
    #[must_use]
    pub const fn hit_kind(&self) -> HitKind {
        HitKind::from_weapon_type(self.weapon_type)
    }
}

/// Armor statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArmorStats {
    /// Flat damage removed before the percentage.
    pub min_absorb: i32,
    /// Percentage of the remaining damage absorbed.
    pub absorb: i32,
    /// Material.
    pub material: Material,
}

/// Corpse bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorpseData {
    /// Decay countdown.
    pub decay: i32,
    /// NPC virtual number, or the negated player id.
    pub owner: i64,
    /// Condition word, e.g. "slashed".
    pub condition: String,
    /// Level of the deceased.
    pub level: i32,
}

/// What an object is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Weapon.
    Weapon(WeaponStats),
    /// Armor or shield.
    Armor(ArmorStats),
    /// A pile of coins.
    Money(i32),
    /// A corpse.
    Corpse(CorpseData),
    /// Anything else.
    Trinket,
}

/// Where an object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ObjectLocation {
    /// Nowhere (extracted or being created).
    #[default]
    Nowhere,
    /// On the floor of a room.
    Room(RoomId),
    /// In a character's inventory.
    Carried(CharId),
    /// Worn or wielded.
    Worn(CharId, WearSlot),
    /// Inside another object.
    Inside(ObjId),
}

/// An object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Object {
    /// Id.
    pub id: ObjId,
    /// Keywords.
    pub name: String,
    /// Short description ("a long sword").
    pub short: String,
    /// Room description.
    pub description: String,
    /// Kind and statistics.
    pub kind: ObjectKind,
    /// Location.
    pub location: ObjectLocation,
    /// Weight.
    pub weight: i32,
    /// Contained objects.
    pub contents: Vec<ObjId>,
}

impl Object {
    /// New object; the id is assigned when added to the world.
    #[must_use]
    pub fn new(name: &str, short: &str, kind: ObjectKind) -> Self {
        Self {
            id: ObjId::default(),
            name: name.to_string(),
            short: short.to_string(),
            description: String::new(),
            kind,
            location: ObjectLocation::Nowhere,
            weight: 1,
            contents: Vec::new(),
        }
    }

    /// Weapon with the given statistics.
    #[must_use]
    pub fn weapon(name: &str, short: &str, stats: WeaponStats) -> Self {
        Self::new(name, short, ObjectKind::Weapon(stats))
    }

    /// Armor with the given statistics.
    #[must_use]
    pub fn armor(name: &str, short: &str, stats: ArmorStats) -> Self {
        Self::new(name, short, ObjectKind::Armor(stats))
    }

    /// A pile of coins.
    #[must_use]
    pub fn money(amount: i32) -> Self {
        let short = if amount == 1 {
            "a gold coin".to_string()
        } else {
            format!("{amount} gold coins")
        };
        Self::new("coins gold", &short, ObjectKind::Money(amount))
    }

    /// Weapon statistics, if a weapon.
    #[must_use]
    pub fn weapon_stats(&self) -> Option<WeaponStats> {
        match self.kind {
            ObjectKind::Weapon(stats) => Some(stats),
            _ => None,
        }
    }

    /// Armor statistics, if armor.
    #[must_use]
    pub fn armor_stats(&self) -> Option<ArmorStats> {
        match self.kind {
            ObjectKind::Armor(stats) => Some(stats),
            _ => None,
        }
    }

    /// Corpse data, if a corpse.
    #[must_use]
    pub fn corpse(&self) -> Option<&CorpseData> {
        match &self.kind {
            ObjectKind::Corpse(data) => Some(data),
            _ => None,
        }
    }
}
