//! JSON protocol for headless combat sessions.
//!
//! The session communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses and fight state
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","pulse":0}`
//! 2. Controller sends commands as JSON lines
//! 3. Runner reports events after each `pulse`, outcomes after each `act`
//! 4. `quit` ends the session with `{"type":"bye"}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","pulse":0}
//! -> {"cmd":"act","actor":"Beleg","command":{"Kick":{"Name":"orc"}}}
//! <- {"type":"outcome","actor":"Beleg","command":"kick","outcome":{"Scheduled":{"cycles":17}}}
//! -> {"cmd":"pulse","count":12}
//! <- {"type":"events","pulse":12,"hits":1,"landed":1,"damage":14,"deaths":[]}
//! -> {"cmd":"hash"}
//! <- {"type":"state_hash","pulse":12,"hash":1234567890}
//! ```

use mud_core::commands::{CombatCommand, CommandOutcome};
use serde::{Deserialize, Serialize};

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands that can be sent to the headless session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the fight by N pulses (default: 1).
    Pulse {
        /// Pulses to run.
        #[serde(default = "default_pulse_count")]
        count: u32,
    },

    /// Issue a combat command for a named combatant.
    Act {
        /// Combatant name as given in the scenario.
        actor: String,
        /// The command.
        command: CombatCommand,
    },

    /// Query the fight state without advancing time.
    Query,

    /// Report the current state hash.
    Hash,

    /// Replace the fight with a scenario file.
    Load {
        /// Scenario path.
        path: String,
        /// Seed; the scenario's own when absent.
        #[serde(default)]
        seed: Option<u64>,
    },

    /// End the session.
    Quit,
}

fn default_pulse_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent from the headless session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Session is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current pulse.
        pulse: u64,
    },

    /// Acknowledgment of a command.
    Ack {
        /// Command name.
        cmd: String,
    },

    /// Error processing a command.
    Error {
        /// What went wrong.
        message: String,
        /// Command name, when the line parsed.
        cmd: Option<String>,
    },

    /// Result of an `act` command.
    Outcome {
        /// Issuer.
        actor: String,
        /// Command name.
        command: String,
        /// What the engine did.
        outcome: CommandOutcome,
        /// Messages the issuer received.
        messages: Vec<String>,
    },

    /// Summary of the pulses just run.
    Events {
        /// Pulse reached.
        pulse: u64,
        /// Swings resolved.
        hits: usize,
        /// Swings that landed.
        landed: usize,
        /// Vitality removed in total.
        damage: i64,
        /// Who died.
        deaths: Vec<String>,
    },

    /// Current fight state.
    State {
        /// Current pulse.
        pulse: u64,
        /// Every combatant still in the world.
        combatants: Vec<CombatantState>,
        /// Roster size.
        engaged: usize,
        /// State hash.
        hash: u64,
    },

    /// State hash for determinism verification.
    StateHash {
        /// Current pulse.
        pulse: u64,
        /// Hash.
        hash: u64,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// State of a single combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantState {
    /// Name.
    pub name: String,
    /// Vitality.
    pub hit: i32,
    /// Maximum vitality.
    pub max_hit: i32,
    /// Movement points.
    pub moves: i32,
    /// Readiness, lowercase.
    pub position: String,
    /// Room number.
    pub room: u32,
    /// Opponent's name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fighting: Option<String>,
    /// Pending delay, in pulses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<i32>,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(pulse: u64) -> Self {
        Self::Ready {
            version: "1.0".to_string(),
            pulse,
        }
    }

    /// Create an acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pulse { .. } => "pulse",
            Self::Act { .. } => "act",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Load { .. } => "load",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mud_core::commands::Target;

    #[test]
    fn test_parse_pulse_command() {
        let cmd = Command::from_json(r#"{"cmd":"pulse","count":60}"#).unwrap();
        assert!(matches!(cmd, Command::Pulse { count: 60 }));
    }

    #[test]
    fn test_default_pulse_count() {
        let cmd = Command::from_json(r#"{"cmd":"pulse"}"#).unwrap();
        assert!(matches!(cmd, Command::Pulse { count: 1 }));
    }

    #[test]
    fn test_parse_act_command() {
        let json = r#"{"cmd":"act","actor":"Beleg","command":{"Hit":{"Name":"orc"}}}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(
            cmd,
            Command::Act { actor, command }
                if actor == "Beleg" && command == CombatCommand::Hit(Target::Name("orc".into()))
        ));
    }

    #[test]
    fn test_parse_unit_command() {
        let json = r#"{"cmd":"act","actor":"Beleg","command":"Flee"}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(cmd.name(), "act");
        assert!(matches!(cmd, Command::Act { command: CombatCommand::Flee, .. }));
    }

    #[test]
    fn test_unknown_command_fails() {
        assert!(Command::from_json(r#"{"cmd":"dance"}"#).is_err());
    }

    #[test]
    fn test_serialize_state_response() {
        let resp = Response::State {
            pulse: 100,
            combatants: vec![CombatantState {
                name: "orc".into(),
                hit: 40,
                max_hit: 150,
                moves: 100,
                position: "fighting".into(),
                room: 10,
                fighting: None,
                delay: None,
            }],
            engaged: 0,
            hash: 12345,
        };
        let json = resp.to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"state""#));
        assert!(json.contains(r#""pulse":100"#));
        assert!(!json.contains("fighting\":null"));
    }
}
