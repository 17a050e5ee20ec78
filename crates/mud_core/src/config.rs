//! Tunable constants of the combat rules.
//!
//! Every field has a default matching the live game, so a RON file only
//! needs to name what it overrides:
//!
//! ```
//! use mud_core::config::CombatConfig;
//!
//! let config = CombatConfig::from_ron_str("(overkill_threshold: 5)").unwrap();
//! assert_eq!(config.overkill_threshold, 5);
//! assert_eq!(config.energy_to_hit, 1200);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::character::Race;
use crate::error::{CombatError, Result};
use crate::ids::RoomId;

/// Combat rule constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Action energy spent by one melee swing.
    pub energy_to_hit: i32,
    /// Length of a combat round in delay cycles.
    pub pulse_violence: i32,
    /// Most vitality a single damage call may remove.
    pub max_damage: i32,
    /// Raw damage above this is reported as an overflow.
    pub overflow_log_threshold: i32,
    /// Player attackers tolerated on one player before blows get crowded out.
    pub overkill_threshold: usize,
    /// Parry meter recovery per pulse.
    pub parry_recovery: i32,
    /// Parry meter ceiling.
    pub parry_cap: i32,
    /// Vitality a non-NPC attacker pushes a downed victim to.
    pub pvp_floor: i32,
    /// Lower bound of the mental delay counter.
    pub mental_delay_floor: i32,
    /// Mental delay installed after a mental action.
    pub mental_delay_cycles: i32,
    /// Decay timer of an NPC corpse.
    pub npc_corpse_time: i32,
    /// Decay timer of a player corpse.
    pub pc_corpse_time: i32,
    /// Extra decay time for corpses of orc-friendly NPCs.
    pub friendly_corpse_bonus: i32,
    /// First immortal level.
    pub level_immortal: i32,
    /// Level required to slay.
    pub level_god: i32,
    /// Respawn room per race.
    pub race_start_rooms: BTreeMap<Race, RoomId>,
    /// Respawn room for races without an entry.
    pub default_start_room: RoomId,
    /// Respawn room for immortals.
    pub immortal_room: RoomId,
    /// Average NPC lifetime in mud hours, used by the age experience curve.
    pub average_mob_life: i32,
    /// Pulses per mud hour.
    pub pulses_per_mud_hour: u64,
    /// Real seconds per mud hour; scales maul durations.
    pub secs_per_mud_hour: i32,
    /// Pulses between affect and skill-timer updates.
    pub pulse_fast_update: i32,
    /// Bare-handed player damage before the x10 scale.
    pub barehanded_damage: i32,
    /// Wind-up of a bash in delay cycles.
    pub bash_beats: i32,
    /// Skill timer installed by defend.
    pub defend_timer: i32,
    /// Duration of the defend stance in fast updates.
    pub defend_duration: i32,
    /// Alignment bounds for races on the good side.
    pub good_alignment_bounds: (i32, i32),
    /// Alignment bounds for every other race.
    pub evil_alignment_bounds: (i32, i32),
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            energy_to_hit: 1200,
            pulse_violence: 12,
            max_damage: 200,
            overflow_log_threshold: 230,
            overkill_threshold: 3,
            parry_recovery: 3,
            parry_cap: 100,
            pvp_floor: -20,
            mental_delay_floor: -120,
            mental_delay_cycles: 12,
            npc_corpse_time: 5,
            pc_corpse_time: 10,
            friendly_corpse_bonus: 15,
            level_immortal: 91,
            level_god: 95,
            race_start_rooms: BTreeMap::new(),
            default_start_room: RoomId(1),
            immortal_room: RoomId(2),
            average_mob_life: 14,
            pulses_per_mud_hour: 240,
            secs_per_mud_hour: 60,
            pulse_fast_update: 12,
            barehanded_damage: 2,
            bash_beats: 12,
            defend_timer: 12,
            defend_duration: 2,
            good_alignment_bounds: (-1000, 1000),
            evil_alignment_bounds: (-1000, 0),
        }
    }
}

impl CombatConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| CombatError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load a configuration from a RON file.
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

    /// Respawn room for a mortal of the given race.
    #[must_use]
    pub fn start_room(&self, race: Race) -> RoomId {
        self.race_start_rooms
            .get(&race)
            .copied()
            .unwrap_or(self.default_start_room)
    }

    /// Alignment bounds for a race.
    #[must_use]
    pub fn alignment_bounds(&self, race: Race) -> (i32, i32) {
        if race.is_good() {
            self.good_alignment_bounds
        } else {
            self.evil_alignment_bounds
        }
    }
}
