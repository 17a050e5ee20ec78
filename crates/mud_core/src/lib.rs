//! # MUD Core
//!
//! Deterministic melee combat core for a tick-driven multi-user text game.
//!
//! This crate contains **only** deterministic logic:
//! - No networking or session IO
//! - No system randomness (a seeded [`rng::GameRng`] drives every roll)
//! - Deterministic iteration (ordered maps, insertion-ordered roster)
//!
//! This separation enables:
//! - Headless scenario runs and balance batches
//! - Snapshot/restore of a live fight
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`engine`] - The combat service object and per-pulse tick driver
//! - [`hit`] - Hit resolution (accuracy, dodge, parry, evasion, riposte)
//! - [`damage`] - Damage pipeline from raw damage to vitality loss
//! - [`death`] - Corpses, rewards and respawn placement
//! - [`wait_list`] - Per-character delayed actions
//! - [`roster`] - Characters currently engaged in melee
//! - [`commands`] - Player-facing combat actions
//! - [`world`] - Rooms, objects and characters the fight reads and mutates

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod affects;
pub mod attack;
pub mod body;
pub mod character;
pub mod commands;
pub mod config;
pub mod damage;
pub mod death;
pub mod engine;
pub mod error;
pub mod hit;
pub mod hooks;
pub mod ids;
pub mod messages;
pub mod objects;
pub mod position;
pub mod rng;
pub mod roster;
pub mod wait_list;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::affects::{Affect, AffectKind, AffectSet, ApplyLocation};
    pub use crate::attack::{AttackKind, HitKind, SpellEffect};
    pub use crate::body::BodyType;
    pub use crate::character::{
        Abilities, ActorKind, Character, MobFlags, Profs, Race, Skill, Specialization,
        StatusFlags, Tactics,
    };
    pub use crate::commands::{CombatCommand, CommandOutcome, OrderTarget, Target};
    pub use crate::config::CombatConfig;
    pub use crate::damage::{DamageOutcome, DamageRejection};
    pub use crate::engine::{CombatEngine, TickEvents};
    pub use crate::error::{CombatError, Result};
    pub use crate::hit::HitOutcome;
    pub use crate::hooks::{HookKey, HookRegistry, HookVerdict};
    pub use crate::ids::{CharId, ObjId, RoomId};
    pub use crate::objects::{Object, ObjectKind, WearSlot};
    pub use crate::position::Position;
    pub use crate::world::{Direction, Room, Sector, World};
}
