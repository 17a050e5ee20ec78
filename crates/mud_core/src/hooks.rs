//! Extension points for scripted behaviour.
//!
//! NPC special procedures and triggers plug in here as trait objects keyed
//! by NPC prototype. Every method defaults to [`HookVerdict::Proceed`], so
//! an implementation only overrides the events it cares about.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::character::{ActorKind, Character};
use crate::ids::CharId;
use crate::world::World;

/// Answer of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HookVerdict {
    /// Let the default behaviour run.
    #[default]
    Proceed,
    /// Stop the default behaviour.
    Veto,
}

impl HookVerdict {
    /// Whether the hook stopped the default behaviour.
    #[must_use]
    pub const fn is_veto(self) -> bool {
        matches!(self, HookVerdict::Veto)
    }
}

/// What a hook sees: read-only world, the subject and the other party.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    /// World at the time of the event.
    pub world: &'a World,
    /// Character the hook is attached to.
    pub subject: CharId,
    /// The other party, if any.
    pub other: Option<CharId>,
}

/// Death triggers.
pub trait OnDeath: Send + Sync {
    /// About to die; `Veto` keeps the subject alive.
    fn on_die(&self, _ctx: HookContext<'_>) -> HookVerdict {
        HookVerdict::Proceed
    }

    /// About to be turned into a corpse; `Veto` means the hook disposed of
    /// the body itself.
    fn on_raw_kill(&self, _ctx: HookContext<'_>) -> HookVerdict {
        HookVerdict::Proceed
    }
}

/// Damage triggers.
pub trait OnDamage: Send + Sync {
    /// The subject is about to strike `other`, who is not fighting it yet.
    /// `Veto` intercepts the blow.
    fn special_damage(&self, _ctx: HookContext<'_>) -> HookVerdict {
        HookVerdict::Proceed
    }

    /// The subject is about to take damage from `other`. `Veto` cancels it.
    fn on_damage(&self, _ctx: HookContext<'_>) -> HookVerdict {
        HookVerdict::Proceed
    }
}

/// Command triggers.
pub trait OnCommand: Send + Sync {
    /// The subject is about to run `command`. `Veto` swallows the command.
    fn on_command(&self, _ctx: HookContext<'_>, _command: &str) -> HookVerdict {
        HookVerdict::Proceed
    }
}

/// Which characters a hook applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HookKey {
    /// NPCs of one prototype.
    Npc(u32),
    /// Every character.
    Any,
}

impl HookKey {
    fn matches(self, ch: &Character) -> bool {
        match self {
            HookKey::Any => true,
            HookKey::Npc(vnum) => matches!(ch.kind, ActorKind::Npc { vnum: v, .. } if v == vnum),
        }
    }
}

/// Registered hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    death: BTreeMap<HookKey, Vec<Arc<dyn OnDeath>>>,
    damage: BTreeMap<HookKey, Vec<Arc<dyn OnDamage>>>,
    command: BTreeMap<HookKey, Vec<Arc<dyn OnCommand>>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("death", &self.death.keys().collect::<Vec<_>>())
            .field("damage", &self.damage.keys().collect::<Vec<_>>())
            .field("command", &self.command.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn first_veto<T: ?Sized>(
    map: &BTreeMap<HookKey, Vec<Arc<T>>>,
    ctx: HookContext<'_>,
    call: impl Fn(&T, HookContext<'_>) -> HookVerdict,
) -> HookVerdict {
    let Some(subject) = ctx.world.character(ctx.subject) else {
        return HookVerdict::Proceed;
    };
    let vetoed = map
        .iter()
        .filter(|(key, _)| key.matches(subject))
        .flat_map(|(_, hooks)| hooks.iter())
        .any(|hook| call(hook, ctx).is_veto());
    if vetoed {
        HookVerdict::Veto
    } else {
        HookVerdict::Proceed
    }
}

impl HookRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a death hook.
    pub fn on_death(&mut self, key: HookKey, hook: Arc<dyn OnDeath>) {
        self.death.entry(key).or_default().push(hook);
    }

    /// Register a damage hook.
    pub fn on_damage(&mut self, key: HookKey, hook: Arc<dyn OnDamage>) {
        self.damage.entry(key).or_default().push(hook);
    }

    /// Register a command hook.
    pub fn on_command(&mut self, key: HookKey, hook: Arc<dyn OnCommand>) {
        self.command.entry(key).or_default().push(hook);
    }

    /// Run death triggers.
    #[must_use]
    pub fn die(&self, ctx: HookContext<'_>) -> HookVerdict {
        first_veto(&self.death, ctx, |h, c| h.on_die(c))
    }

    /// Run corpse-disposal triggers.
    #[must_use]
    pub fn raw_kill(&self, ctx: HookContext<'_>) -> HookVerdict {
        first_veto(&self.death, ctx, |h, c| h.on_raw_kill(c))
    }

    /// Run attacker-side special damage procedures.
    #[must_use]
    pub fn special_damage(&self, ctx: HookContext<'_>) -> HookVerdict {
        first_veto(&self.damage, ctx, |h, c| h.special_damage(c))
    }

    /// Run victim-side damage triggers.
    #[must_use]
    pub fn damage(&self, ctx: HookContext<'_>) -> HookVerdict {
        first_veto(&self.damage, ctx, |h, c| h.on_damage(c))
    }

    /// Run command triggers.
    #[must_use]
    pub fn command(&self, ctx: HookContext<'_>, command: &str) -> HookVerdict {
        first_veto(&self.command, ctx, |h, c| h.on_command(c, command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RoomId;
    use crate::world::Room;

    struct Immortal;

    impl OnDeath for Immortal {
        fn on_die(&self, _ctx: HookContext<'_>) -> HookVerdict {
            HookVerdict::Veto
        }
    }

    #[test]
    fn test_hooks_match_by_prototype() {
        let mut world = World::new();
        world.add_room(Room::new(RoomId(1), "Hall"));
        let balrog = world.add_character(Character::npc("balrog", 666, 50));
        let orc = world.add_character(Character::npc("orc", 100, 5));

        let mut hooks = HookRegistry::new();
        hooks.on_death(HookKey::Npc(666), Arc::new(Immortal));

        let ctx = |subject| HookContext {
            world: &world,
            subject,
            other: None,
        };
        assert_eq!(hooks.die(ctx(balrog)), HookVerdict::Veto);
        assert_eq!(hooks.die(ctx(orc)), HookVerdict::Proceed);
        // default methods never veto
        assert_eq!(hooks.raw_kill(ctx(balrog)), HookVerdict::Proceed);
    }

    #[test]
    fn test_empty_registry_proceeds() {
        let mut world = World::new();
        let id = world.add_character(Character::player("Luthien", 1, 10));
        let hooks = HookRegistry::default();
        let ctx = HookContext {
            world: &world,
            subject: id,
            other: None,
        };
        assert_eq!(hooks.damage(ctx), HookVerdict::Proceed);
        assert_eq!(hooks.command(ctx, "kick"), HookVerdict::Proceed);
    }
}
