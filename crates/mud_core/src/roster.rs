//! Characters currently engaged in melee.
//!
//! Newly engaged characters go to the front. The tick driver walks the
//! roster with a cursor that always points at the next member to visit, so
//! members engaging or leaving mid-walk never derail it.

use serde::{Deserialize, Serialize};

use crate::ids::CharId;

/// Ordered set of engaged characters with a removal-safe walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatRoster {
    members: Vec<CharId>,
    #[serde(skip)]
    cursor: Option<usize>,
}

impl CombatRoster {
    /// Empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the character is a member.
    #[must_use]
    pub fn contains(&self, ch: CharId) -> bool {
        self.members.contains(&ch)
    }

    /// Add a character at the front. Returns false if already present.
    ///
    /// A member added during a walk is not visited by that walk.
    pub fn engage(&mut self, ch: CharId) -> bool {
        if self.contains(ch) {
            return false;
        }
        self.members.insert(0, ch);
        if let Some(cursor) = self.cursor.as_mut() {
            *cursor += 1;
        }
        true
    }

    /// Remove a character. Returns false if it was not a member.
    pub fn remove(&mut self, ch: CharId) -> bool {
        let Some(idx) = self.members.iter().position(|&m| m == ch) else {
            return false;
        };
        self.members.remove(idx);
        if let Some(cursor) = self.cursor.as_mut() {
            if idx < *cursor {
                *cursor -= 1;
            }
        }
        true
    }

    /// Members in walk order.
    #[must_use]
    pub fn members(&self) -> &[CharId] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is engaged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Start a walk from the front.
    pub fn begin_walk(&mut self) {
        self.cursor = Some(0);
    }

    /// Next member of the current walk. The cursor moves past it before it
    /// is returned.
    pub fn next_in_walk(&mut self) -> Option<CharId> {
        let cursor = self.cursor.as_mut()?;
        let ch = *self.members.get(*cursor)?;
        *cursor += 1;
        Some(ch)
    }

    /// Finish the walk.
    pub fn end_walk(&mut self) {
        self.cursor = None;
    }
}
