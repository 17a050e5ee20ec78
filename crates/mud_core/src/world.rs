//! The world the fight reads and mutates: rooms, objects and characters,
//! plus the outbound message queue and the audit log.
//!
//! Everything is keyed by id in ordered maps so iteration order, and with
//! it every random roll that depends on it, is reproducible.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::character::Character;
use crate::error::{CombatError, Result};
use crate::ids::{CharId, ObjId, RoomId};
use crate::objects::{ArmorStats, Object, ObjectLocation, WeaponStats, WearSlot};

bitflags! {
    /// Room flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
    pub struct RoomFlags: u16 {
        /// Nobody may start a fight here.
        const PEACE = 0x0001;
        /// Death trap; fleeing never leads here.
        const DEATH = 0x0002;
    }
}

bitflags! {
    /// Exit flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
    pub struct ExitFlags: u16 {
        /// The exit has a door.
        const IS_DOOR = 0x0001;
        /// The door is closed.
        const CLOSED = 0x0002;
        /// The door is locked.
        const LOCKED = 0x0004;
        /// The door has been broken open.
        const BROKEN = 0x0008;
        /// Too heavy to bash.
        const HEAVY = 0x0010;
        /// Cannot be broken.
        const NO_BREAK = 0x0020;
        /// Cannot be fled through.
        const NO_FLEE = 0x0040;
        /// Cannot be walked through.
        const NO_WALK = 0x0080;
    }
}

/// Compass and vertical directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Direction {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Direction {
    /// All directions in table order.
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    /// Opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Direction whose name starts with `word`.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        if word.is_empty() {
            return None;
        }
        let word = word.to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.name().starts_with(&word))
    }
}

/// Terrain of a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[allow(missing_docs)]
pub enum Sector {
    Inside,
    #[default]
    City,
    Field,
    Forest,
    Hills,
    Mountain,
    WaterSwim,
    WaterNoSwim,
    Underwater,
}

impl Sector {
    /// Water sectors; corpses float here.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(
            self,
            Sector::WaterSwim | Sector::WaterNoSwim | Sector::Underwater
        )
    }

    /// Movement points needed to enter.
    #[must_use]
    pub const fn move_cost(self) -> i32 {
        match self {
            Sector::Inside | Sector::City => 1,
            Sector::Field => 2,
            Sector::Forest | Sector::Hills => 3,
            Sector::Mountain => 6,
            Sector::WaterSwim | Sector::WaterNoSwim | Sector::Underwater => 4,
        }
    }
}

/// One exit of a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exit {
    /// Destination.
    pub to_room: RoomId,
    /// Door keyword ("door", "gate").
    pub keyword: String,
    /// Flags.
    pub flags: ExitFlags,
}

impl Exit {
    /// An open passage.
    #[must_use]
    pub fn open(to_room: RoomId) -> Self {
        Self {
            to_room,
            keyword: String::new(),
            flags: ExitFlags::empty(),
        }
    }

    /// A closed door.
    #[must_use]
    pub fn door(to_room: RoomId, keyword: &str) -> Self {
        Self {
            to_room,
            keyword: keyword.to_string(),
            flags: ExitFlags::IS_DOOR | ExitFlags::CLOSED,
        }
    }

    /// Keyword, or "door" when none was given.
    #[must_use]
    pub fn keyword(&self) -> &str {
        if self.keyword.is_empty() {
            "door"
        } else {
            &self.keyword
        }
    }
}

/// A room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Room {
    /// Virtual number.
    pub id: RoomId,
    /// Name.
    pub name: String,
    /// Zone number.
    pub zone: u32,
    /// East-west coordinate of the zone; 8 is the great river.
    pub zone_x: i32,
    /// Terrain.
    pub sector: Sector,
    /// Flags.
    pub flags: RoomFlags,
    /// Exits.
    pub exits: BTreeMap<Direction, Exit>,
    /// Objects on the floor.
    pub contents: Vec<ObjId>,
}

impl Room {
    /// A plain room.
    #[must_use]
    pub fn new(id: RoomId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            zone: 0,
            zone_x: 0,
            sector: Sector::default(),
            flags: RoomFlags::empty(),
            exits: BTreeMap::new(),
            contents: Vec::new(),
        }
    }

    /// Builder: add an exit.
    #[must_use]
    pub fn with_exit(mut self, dir: Direction, exit: Exit) -> Self {
        self.exits.insert(dir, exit);
        self
    }
}

/// Who receives a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// One character.
    Character(CharId),
    /// Everyone in a room except the listed characters.
    Room {
        /// Room.
        room: RoomId,
        /// Characters who do not receive it.
        exclude: Vec<CharId>,
    },
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Pulse it was produced on.
    pub pulse: u64,
    /// Recipient.
    pub recipient: Recipient,
    /// Text.
    pub text: String,
}

/// Categories of audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditKind {
    /// A player was killed by an NPC.
    MobDeath {
        /// The NPC's name.
        killer: String,
    },
    /// A player died of poison.
    Poison,
    /// A player was killed by someone.
    PlayerKill,
    /// A player was killed by another player.
    Death,
}

/// A death audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Pulse of the death.
    pub pulse: u64,
    /// Name of the player who died.
    pub victim: String,
    /// Category.
    pub kind: AuditKind,
}

/// Rooms, objects and characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct World {
    characters: BTreeMap<CharId, Character>,
    rooms: BTreeMap<RoomId, Room>,
    objects: BTreeMap<ObjId, Object>,
    next_char: u32,
    next_obj: u32,
    /// Current pulse, stamped on messages and audit records.
    pub pulse: u64,
    outbox: Vec<Message>,
    audit: Vec<AuditRecord>,
    saved: Vec<CharId>,
}

impl World {
    /// Empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a room.
    pub fn add_room(&mut self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    /// Add a character; assigns and returns its id.
    pub fn add_character(&mut self, mut ch: Character) -> CharId {
        self.next_char += 1;
        let id = CharId(self.next_char);
        ch.id = id;
        self.characters.insert(id, ch);
        id
    }

    /// Add an object at a location; assigns and returns its id.
    pub fn add_object(&mut self, mut obj: Object, location: ObjectLocation) -> Result<ObjId> {
        self.next_obj += 1;
        let id = ObjId(self.next_obj);
        obj.id = id;
        obj.location = ObjectLocation::Nowhere;
        self.objects.insert(id, obj);
        self.move_object(id, location)?;
        Ok(id)
    }

    /// Character by id.
    #[must_use]
    pub fn character(&self, id: CharId) -> Option<&Character> {
        self.characters.get(&id)
    }

    /// Mutable character by id.
    pub fn character_mut(&mut self, id: CharId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    /// Character by id, or an error.
    pub fn require(&self, id: CharId) -> Result<&Character> {
        self.characters
            .get(&id)
            .ok_or(CombatError::CharacterNotFound(id))
    }

    /// Mutable character by id, or an error.
    pub fn require_mut(&mut self, id: CharId) -> Result<&mut Character> {
        self.characters
            .get_mut(&id)
            .ok_or(CombatError::CharacterNotFound(id))
    }

    /// Whether the character exists.
    #[must_use]
    pub fn contains(&self, id: CharId) -> bool {
        self.characters.contains_key(&id)
    }

    /// All characters in id order.
    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    /// Room by id.
    #[must_use]
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    /// Object by id.
    #[must_use]
    pub fn object(&self, id: ObjId) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// All objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Whether both characters exist and share a room.
    #[must_use]
    pub fn is_same_room(&self, a: CharId, b: CharId) -> bool {
        match (self.character(a), self.character(b)) {
            (Some(a), Some(b)) => a.room == b.room,
            _ => false,
        }
    }

    /// Whether `viewer` can see `target`.
    #[must_use]
    pub fn can_see(&self, viewer: CharId, target: CharId) -> bool {
        if viewer == target {
            return true;
        }
        self.character(target).is_some_and(|t| !t.is_hidden())
    }

    /// Wielded weapon and its statistics.
    #[must_use]
    pub fn weapon_of(&self, ch: CharId) -> Option<(ObjId, WeaponStats)> {
        let id = *self.character(ch)?.equipment.get(&WearSlot::Wield)?;
        let stats = self.object(id)?.weapon_stats()?;
        Some((id, stats))
    }

    /// Armor worn in a slot.
    #[must_use]
    pub fn armor_at(&self, ch: CharId, slot: WearSlot) -> Option<ArmorStats> {
        let id = *self.character(ch)?.equipment.get(&slot)?;
        self.object(id)?.armor_stats()
    }

    /// Characters in a room, in id order.
    #[must_use]
    pub fn people_in(&self, room: RoomId) -> Vec<CharId> {
        self.characters
            .values()
            .filter(|c| c.room == room)
            .map(|c| c.id)
            .collect()
    }

    /// First character in the viewer's room, visible to them, whose keyword
    /// starts with `name` (case-insensitive).
    #[must_use]
    pub fn find_in_room_visible(&self, viewer: CharId, name: &str) -> Option<CharId> {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return None;
        }
        let room = self.character(viewer)?.room;
        if name == "self" || name == "me" {
            return Some(viewer);
        }
        self.people_in(room).into_iter().find(|&id| {
            self.can_see(viewer, id)
                && self.character(id).is_some_and(|c| {
                    c.name
                        .split_whitespace()
                        .any(|w| w.to_ascii_lowercase().starts_with(&name))
                })
        })
    }

    /// Exit of a room.
    #[must_use]
    pub fn exit(&self, room: RoomId, dir: Direction) -> Option<&Exit> {
        self.room(room)?.exits.get(&dir)
    }

    /// Mutable exit of a room.
    pub fn exit_mut(&mut self, room: RoomId, dir: Direction) -> Option<&mut Exit> {
        self.rooms.get_mut(&room)?.exits.get_mut(&dir)
    }

    /// Whether a character can pass through the exit: it exists, its
    /// destination exists and it is not closed.
    #[must_use]
    pub fn can_go(&self, ch: CharId, dir: Direction) -> bool {
        let Some(c) = self.character(ch) else {
            return false;
        };
        self.exit(c.room, dir).is_some_and(|e| {
            !e.flags.contains(ExitFlags::CLOSED) && self.rooms.contains_key(&e.to_room)
        })
    }

    fn detach_object(&mut self, id: ObjId) -> Result<()> {
        let location = self
            .objects
            .get(&id)
            .ok_or(CombatError::ObjectNotFound(id))?
            .location;
        match location {
            ObjectLocation::Nowhere => {}
            ObjectLocation::Room(room) => {
                if let Some(r) = self.rooms.get_mut(&room) {
                    r.contents.retain(|&o| o != id);
                }
            }
            ObjectLocation::Carried(ch) => {
                if let Some(c) = self.characters.get_mut(&ch) {
                    c.carrying.retain(|&o| o != id);
                }
            }
            ObjectLocation::Worn(ch, slot) => {
                if let Some(c) = self.characters.get_mut(&ch) {
                    if c.equipment.get(&slot) == Some(&id) {
                        c.equipment.remove(&slot);
                    }
                }
            }
            ObjectLocation::Inside(container) => {
                if let Some(o) = self.objects.get_mut(&container) {
                    o.contents.retain(|&x| x != id);
                }
            }
        }
        Ok(())
    }

    /// Move an object, keeping both the old and the new holder consistent.
    pub fn move_object(&mut self, id: ObjId, to: ObjectLocation) -> Result<()> {
        self.detach_object(id)?;
        match to {
            ObjectLocation::Nowhere => {}
            ObjectLocation::Room(room) => {
                self.rooms
                    .get_mut(&room)
                    .ok_or(CombatError::RoomNotFound(room))?
                    .contents
                    .push(id);
            }
            ObjectLocation::Carried(ch) => {
                self.require_mut(ch)?.carrying.push(id);
            }
            ObjectLocation::Worn(ch, slot) => {
                let previous = self.require_mut(ch)?.equipment.insert(slot, id);
                if let Some(prev) = previous.filter(|&p| p != id) {
                    self.move_object(prev, ObjectLocation::Carried(ch))?;
                }
            }
            ObjectLocation::Inside(container) => {
                if container == id {
                    return Err(CombatError::InvalidState(format!(
                        "{id} cannot contain itself"
                    )));
                }
                self.objects
                    .get_mut(&container)
                    .ok_or(CombatError::ObjectNotFound(container))?
                    .contents
                    .push(id);
            }
        }
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.location = to;
        }
        Ok(())
    }

    /// Remove an object and everything inside it.
    pub fn extract_object(&mut self, id: ObjId) -> Result<()> {
        self.detach_object(id)?;
        if let Some(obj) = self.objects.remove(&id) {
            for inner in obj.contents {
                if let Some(o) = self.objects.get_mut(&inner) {
                    o.location = ObjectLocation::Nowhere;
                }
                self.extract_object(inner)?;
            }
        }
        Ok(())
    }

    /// Move a character to another room.
    pub fn move_character(&mut self, id: CharId, room: RoomId) -> Result<()> {
        if !self.rooms.contains_key(&room) {
            return Err(CombatError::RoomNotFound(room));
        }
        self.require_mut(id)?.room = room;
        Ok(())
    }

    /// Remove a character from the world. Belongings still held drop to the
    /// floor; links other characters hold to it are cleared.
    pub fn extract_character(&mut self, id: CharId) -> Result<Character> {
        let (room, held) = {
            let ch = self.require(id)?;
            let mut held: Vec<ObjId> = ch.carrying.clone();
            held.extend(ch.equipment.values().copied());
            (ch.room, held)
        };
        for obj in held {
            let dest = if self.rooms.contains_key(&room) {
                ObjectLocation::Room(room)
            } else {
                ObjectLocation::Nowhere
            };
            self.move_object(obj, dest)?;
        }
        for other in self.characters.values_mut() {
            if other.fighting == Some(id) {
                other.fighting = None;
            }
            if other.master == Some(id) {
                other.master = None;
            }
            if other.group_leader == Some(id) {
                other.group_leader = None;
            }
            if other.mount == Some(id) {
                other.mount = None;
            }
            other.memory.remove(&id);
        }
        self.characters
            .remove(&id)
            .ok_or(CombatError::CharacterNotFound(id))
    }

    /// Queue a message for one character.
    pub fn direct_message(&mut self, to: CharId, text: impl Into<String>) {
        self.outbox.push(Message {
            pulse: self.pulse,
            recipient: Recipient::Character(to),
            text: text.into(),
        });
    }

    /// Queue a message for a room.
    pub fn room_broadcast(&mut self, room: RoomId, text: impl Into<String>, exclude: &[CharId]) {
        self.outbox.push(Message {
            pulse: self.pulse,
            recipient: Recipient::Room {
                room,
                exclude: exclude.to_vec(),
            },
            text: text.into(),
        });
    }

    /// Take every queued message.
    pub fn drain_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    /// Queued messages.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.outbox
    }

    /// Record that a character's state was persisted.
    pub fn persist(&mut self, id: CharId) {
        tracing::debug!(character = %id, "Persisting character");
        self.saved.push(id);
    }

    /// Characters persisted so far, in order.
    #[must_use]
    pub fn persisted(&self) -> &[CharId] {
        &self.saved
    }

    /// Append an audit record.
    pub fn record_audit(&mut self, victim: &str, kind: AuditKind) {
        self.audit.push(AuditRecord {
            pulse: self.pulse,
            victim: victim.to_string(),
            kind,
        });
    }

    /// Audit records so far.
    #[must_use]
    pub fn audit_log(&self) -> &[AuditRecord] {
        &self.audit
    }
}
