//! Delayed actions ("wait states").
//!
//! A character has at most one pending entry. Scheduling a new one replaces
//! the old one, which is handed back to the caller so it can be dropped or
//! completed explicitly. Nothing is queued.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::ids::CharId;
use crate::world::Direction;

/// Priority of the delay left by kick, swing and the bear skills. Melee
/// energy keeps regenerating through it.
pub const PRIORITY_ATTACK_SKILL: i32 = 59;
/// Priority of a regeneration-friendly rest delay.
pub const PRIORITY_REGEN: i32 = 29;
/// Priority of the bash wind-up.
pub const PRIORITY_BASH_WINDUP: i32 = 50;
/// Priority of being knocked down or disengaging.
pub const PRIORITY_STAGGERED: i32 = 80;
/// Wheel-locked delays at or below this priority break when damaged.
pub const PRIORITY_WHEEL_BREAK: i32 = 40;

/// Whether melee keeps running for a character delayed at `priority`.
#[must_use]
pub const fn allows_regen(priority: i32) -> bool {
    priority == PRIORITY_REGEN || priority == PRIORITY_ATTACK_SKILL
}

bitflags! {
    /// Flags describing what a delay means for its owner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
    pub struct DelayFlags: u8 {
        /// The owner is busy.
        const WAITING = 0x01;
        /// Preparation that damage can interrupt.
        const WAIT_WHEEL = 0x02;
        /// The owner has been knocked down.
        const BASHED = 0x04;
    }
}

/// Phase of a bash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BashPhase {
    /// Wind-up finished: resolve against the target character.
    Resolve,
    /// Knock-down over: stand back up.
    Recover,
    /// Wind-up finished: throw oneself at the door.
    BreakDoor,
    /// The owner is being removed; undo everything.
    Emergency,
}

/// What runs when a delay completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DelayedCommand {
    /// Nothing; the owner simply waited.
    #[default]
    Wait,
    /// A bash phase.
    Bash(BashPhase),
}

/// Target captured when the delay was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DelayTarget {
    /// No target.
    #[default]
    None,
    /// A character, re-validated on completion.
    Character(CharId),
    /// A door in the owner's room.
    Door(Direction),
}

/// One pending delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelayEntry {
    /// Pulses left.
    pub cycles: i32,
    /// Completion.
    pub command: DelayedCommand,
    /// Priority class.
    pub priority: i32,
    /// Captured target.
    pub target: DelayTarget,
    /// Flags.
    pub flags: DelayFlags,
}

impl DelayEntry {
    /// Plain busy delay.
    #[must_use]
    pub const fn wait(cycles: i32) -> Self {
        Self {
            cycles,
            command: DelayedCommand::Wait,
            priority: 0,
            target: DelayTarget::None,
            flags: DelayFlags::WAITING,
        }
    }

    /// Delay with a completion.
    #[must_use]
    pub const fn new(
        cycles: i32,
        command: DelayedCommand,
        priority: i32,
        target: DelayTarget,
        flags: DelayFlags,
    ) -> Self {
        Self {
            cycles,
            command,
            priority,
            target,
            flags,
        }
    }

    /// Whether completion runs a handler.
    #[must_use]
    pub const fn has_completion(&self) -> bool {
        !matches!(self.command, DelayedCommand::Wait)
    }
}

/// Pending delays of every character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitList {
    entries: BTreeMap<CharId, DelayEntry>,
}

impl WaitList {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `entry`, returning the entry it supersedes.
    pub fn schedule(&mut self, ch: CharId, entry: DelayEntry) -> Option<DelayEntry> {
        self.entries.insert(ch, entry)
    }

    /// Plain busy delay of `cycles` pulses.
    pub fn wait_state(&mut self, ch: CharId, cycles: i32) -> Option<DelayEntry> {
        self.schedule(ch, DelayEntry::wait(cycles))
    }

    /// Drop the pending entry without running it. Idempotent.
    pub fn abort(&mut self, ch: CharId) -> Option<DelayEntry> {
        self.entries.remove(&ch)
    }

    /// Pending entry.
    #[must_use]
    pub fn get(&self, ch: CharId) -> Option<&DelayEntry> {
        self.entries.get(&ch)
    }

    /// Whether the character has a pending entry.
    #[must_use]
    pub fn contains(&self, ch: CharId) -> bool {
        self.entries.contains_key(&ch)
    }

    /// Whether the character is busy.
    #[must_use]
    pub fn is_waiting(&self, ch: CharId) -> bool {
        self.has_flag(ch, DelayFlags::WAITING)
    }

    /// Priority of the pending entry, 0 when none.
    #[must_use]
    pub fn priority(&self, ch: CharId) -> i32 {
        self.get(ch).map_or(0, |e| e.priority)
    }

    /// Remaining pulses, 0 when none.
    #[must_use]
    pub fn cycles(&self, ch: CharId) -> i32 {
        self.get(ch).map_or(0, |e| e.cycles)
    }

    /// Whether the pending entry carries a flag.
    #[must_use]
    pub fn has_flag(&self, ch: CharId, flag: DelayFlags) -> bool {
        self.get(ch).is_some_and(|e| e.flags.contains(flag))
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance every countdown by one pulse. Entries that run out are
    /// removed and returned in id order for the caller to complete.
    pub fn tick(&mut self) -> Vec<(CharId, DelayEntry)> {
        let mut due = Vec::new();
        for (&ch, entry) in &mut self.entries {
            entry.cycles -= 1;
            if entry.cycles <= 0 {
                due.push(ch);
            }
        }
        due.into_iter()
            .filter_map(|ch| self.entries.remove(&ch).map(|e| (ch, e)))
            .collect()
    }

    /// Forget a character entirely.
    pub fn remove_character(&mut self, ch: CharId) {
        self.entries.remove(&ch);
    }
}
