//! Headless fight runner.
//!
//! Two ways to drive a scenario: a JSON-lines session where a controller
//! issues commands and advances time, and a straight run to completion that
//! produces a [`RunReport`].

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use mud_core::engine::TickEvents;
use mud_core::hit::HitOutcome;
use mud_core::ids::CharId;
use mud_core::world::Recipient;
use serde::{Deserialize, Serialize};

use crate::protocol::{CombatantState, Command, Response};
use crate::scenario::{BuiltScenario, Scenario, ScenarioError};

// ============================================================================
// Interactive session
// ============================================================================

/// A scenario driven one command at a time.
pub struct HeadlessRunner {
    fight: BuiltScenario,
    script_cursor: usize,
    running: bool,
}

impl HeadlessRunner {
    /// Start a session on a built scenario.
    #[must_use]
    pub fn new(fight: BuiltScenario) -> Self {
        Self {
            fight,
            script_cursor: 0,
            running: true,
        }
    }

    /// Build `scenario` with `seed` and start a session on it.
    pub fn from_scenario(scenario: &Scenario, seed: u64) -> Result<Self, ScenarioError> {
        Ok(Self::new(scenario.build(seed)?))
    }

    /// The fight being driven.
    #[must_use]
    pub fn fight(&self) -> &BuiltScenario {
        &self.fight
    }

    /// Whether `quit` has not been received yet.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Handle one command.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        let name = command.name();
        tracing::debug!(cmd = name, "Handling command");
        match command {
            Command::Pulse { count } => vec![self.advance(count)],
            Command::Act { actor, command } => {
                let Some(&id) = self.fight.names.get(&actor) else {
                    return vec![Response::error(
                        format!("Unknown combatant '{actor}'"),
                        Some(name),
                    )];
                };
                let verb = command.name().to_string();
                match self.fight.engine.execute(id, command) {
                    Ok(outcome) => vec![Response::Outcome {
                        actor,
                        command: verb,
                        outcome,
                        messages: self.messages_for(id),
                    }],
                    Err(e) => vec![Response::error(e.to_string(), Some(name))],
                }
            }
            Command::Query => vec![self.state()],
            Command::Hash => vec![Response::StateHash {
                pulse: self.fight.engine.pulse_count(),
                hash: self.fight.engine.state_hash(),
            }],
            Command::Load { path, seed } => match Scenario::load(&path).and_then(|scenario| {
                let seed = seed.unwrap_or(scenario.seed);
                scenario.build(seed)
            }) {
                Ok(fight) => {
                    tracing::info!(path = %path, "Scenario loaded");
                    self.fight = fight;
                    self.script_cursor = 0;
                    vec![Response::ack(name), Response::ready(0)]
                }
                Err(e) => vec![Response::error(e.to_string(), Some(name))],
            },
            Command::Quit => {
                self.running = false;
                vec![Response::Bye]
            }
        }
    }

    /// Serve a session: read command lines from `input`, write responses to
    /// `output` until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        let ready = Response::ready(self.fight.engine.pulse_count());
        output.write_all(ready.to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let responses = match Command::from_json(line) {
                Ok(command) => self.handle(command),
                Err(e) => vec![Response::error(format!("Invalid command: {e}"), None)],
            };
            for response in responses {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;

            if !self.running {
                break;
            }
        }

        tracing::info!(pulse = self.fight.engine.pulse_count(), "Session ended");
        Ok(())
    }

    fn advance(&mut self, count: u32) -> Response {
        let (mut hits, mut landed, mut damage) = (0, 0, 0i64);
        let mut deaths = Vec::new();
        for _ in 0..count {
            let events = step(&mut self.fight, &mut self.script_cursor);
            hits += events.hits.len();
            landed += events
                .hits
                .iter()
                .filter(|h| matches!(h.outcome, HitOutcome::Landed { .. }))
                .count();
            damage += events
                .damage
                .iter()
                .map(|d| i64::from(d.outcome.applied()))
                .sum::<i64>();
            deaths.extend(events.deaths.into_iter().map(|d| d.name));
        }
        self.fight.engine.world_mut().drain_messages();
        Response::Events {
            pulse: self.fight.engine.pulse_count(),
            hits,
            landed,
            damage,
            deaths,
        }
    }

    fn state(&self) -> Response {
        let engine = &self.fight.engine;
        let world = engine.world();
        let combatants = world
            .characters()
            .map(|c| CombatantState {
                name: c.name.clone(),
                hit: c.hit,
                max_hit: c.max_hit,
                moves: c.moves,
                position: format!("{:?}", c.position).to_lowercase(),
                room: c.room.0,
                fighting: c
                    .fighting
                    .and_then(|f| world.character(f))
                    .map(|f| f.name.clone()),
                delay: engine.waits().get(c.id).map(|e| e.cycles),
            })
            .collect();
        Response::State {
            pulse: engine.pulse_count(),
            combatants,
            engaged: engine.roster().len(),
            hash: engine.state_hash(),
        }
    }

    /// Take the pending messages, returning the texts addressed to `id`.
    fn messages_for(&mut self, id: CharId) -> Vec<String> {
        self.fight
            .engine
            .world_mut()
            .drain_messages()
            .into_iter()
            .filter(|m| m.recipient == Recipient::Character(id))
            .map(|m| m.text)
            .collect()
    }
}

/// Issue the script commands due at the current pulse, then run one pulse.
fn step(fight: &mut BuiltScenario, cursor: &mut usize) -> TickEvents {
    let now = fight.engine.pulse_count();
    while let Some((at, actor, command)) = fight.script.get(*cursor) {
        if *at > now {
            break;
        }
        let (actor, command) = (*actor, command.clone());
        *cursor += 1;
        if fight.engine.world().contains(actor) {
            match fight.engine.execute(actor, command) {
                Ok(outcome) => tracing::trace!(%actor, ?outcome, "Script command"),
                Err(e) => tracing::debug!(%actor, error = %e, "Script command failed"),
            }
        }
    }
    fight.engine.pulse()
}

// ============================================================================
// Run to completion
// ============================================================================

/// A death during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathRecord {
    /// Pulse of death.
    pub pulse: u64,
    /// Who died.
    pub victim: String,
    /// Fatal attack, debug formatted.
    pub kind: String,
}

/// Final state of a combatant still in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survivor {
    /// Name.
    pub name: String,
    /// Vitality.
    pub hit: i32,
    /// Maximum vitality.
    pub max_hit: i32,
    /// Readiness, lowercase.
    pub position: String,
    /// Room number.
    pub room: u32,
}

/// Outcome of running a scenario to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Pulses run.
    pub pulses: u64,
    /// State hash at the end.
    pub final_hash: u64,
    /// Deaths in order.
    pub deaths: Vec<DeathRecord>,
    /// Combatants still in the world.
    pub survivors: Vec<Survivor>,
    /// Swings resolved.
    pub swings: u64,
    /// Swings that landed.
    pub landed: u64,
    /// Vitality removed, by attacker name.
    pub damage_dealt: BTreeMap<String, i64>,
}

impl RunReport {
    /// Whether the named combatant died at least once.
    #[must_use]
    pub fn died(&self, name: &str) -> bool {
        self.deaths.iter().any(|d| d.victim == name)
    }
}

/// Run `scenario` with `seed` until nobody is fighting and the script is
/// spent, or until its pulse limit.
pub fn run_scenario(scenario: &Scenario, seed: u64) -> Result<RunReport, ScenarioError> {
    let mut fight = scenario.build(seed)?;
    let mut cursor = 0;
    let mut deaths = Vec::new();
    let (mut swings, mut landed) = (0u64, 0u64);
    let mut damage_dealt: BTreeMap<String, i64> = BTreeMap::new();

    while fight.engine.pulse_count() < scenario.max_pulses {
        let events = step(&mut fight, &mut cursor);
        fight.engine.world_mut().drain_messages();

        swings += events.hits.len() as u64;
        landed += events
            .hits
            .iter()
            .filter(|h| matches!(h.outcome, HitOutcome::Landed { .. }))
            .count() as u64;
        for d in &events.damage {
            let applied = i64::from(d.outcome.applied());
            if applied > 0 {
                *damage_dealt.entry(fight.name_of(d.attacker)).or_default() += applied;
            }
        }
        for d in events.deaths {
            tracing::debug!(pulse = events.pulse, victim = %d.name, "Death");
            deaths.push(DeathRecord {
                pulse: events.pulse,
                victim: d.name,
                kind: format!("{:?}", d.kind),
            });
        }

        if fight.engine.roster().is_empty() && cursor >= fight.script.len() {
            break;
        }
    }

    let world = fight.engine.world();
    let survivors = world
        .characters()
        .map(|c| Survivor {
            name: c.name.clone(),
            hit: c.hit,
            max_hit: c.max_hit,
            position: format!("{:?}", c.position).to_lowercase(),
            room: c.room.0,
        })
        .collect();

    let report = RunReport {
        scenario: scenario.name.clone(),
        seed,
        pulses: fight.engine.pulse_count(),
        final_hash: fight.engine.state_hash(),
        deaths,
        survivors,
        swings,
        landed,
        damage_dealt,
    };
    tracing::info!(
        scenario = %report.scenario,
        seed,
        pulses = report.pulses,
        deaths = report.deaths.len(),
        "Run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mud_core::commands::{CombatCommand, CommandOutcome, Target};
    use std::io::Cursor;

    fn session() -> HeadlessRunner {
        HeadlessRunner::from_scenario(&Scenario::duel(), 7).unwrap()
    }

    fn lines(output: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(output)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_pulse_advances_time() {
        let mut runner = session();
        let responses = runner.handle(Command::Pulse { count: 24 });
        assert!(matches!(responses[..], [Response::Events { pulse: 24, .. }]));
        assert_eq!(runner.fight().engine.pulse_count(), 24);
    }

    #[test]
    fn test_act_unknown_actor() {
        let mut runner = session();
        let responses = runner.handle(Command::Act {
            actor: "Turin".into(),
            command: CombatCommand::Flee,
        });
        assert!(matches!(&responses[..], [Response::Error { cmd: Some(c), .. }] if c == "act"));
    }

    #[test]
    fn test_act_reports_outcome() {
        let mut runner = session();
        let responses = runner.handle(Command::Act {
            actor: "Beleg".into(),
            command: CombatCommand::Hit(Target::Name("nobody".into())),
        });
        match &responses[..] {
            [Response::Outcome { actor, command, outcome, .. }] => {
                assert_eq!(actor, "Beleg");
                assert_eq!(command, "hit");
                assert!(matches!(outcome, CommandOutcome::Rejected(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_query_lists_combatants() {
        let mut runner = session();
        match &runner.handle(Command::Query)[..] {
            [Response::State { combatants, engaged, .. }] => {
                assert_eq!(combatants.len(), 2);
                assert_eq!(*engaged, 2);
                assert_eq!(combatants[0].fighting.as_deref(), Some("orc"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_session_over_json_lines() {
        let mut runner = session();
        let input = "{\"cmd\":\"pulse\",\"count\":3}\n\nnot json\n{\"cmd\":\"hash\"}\n{\"cmd\":\"quit\"}\n{\"cmd\":\"query\"}\n";
        let mut output = Vec::new();
        runner.run(Cursor::new(input), &mut output).unwrap();

        let replies = lines(&output);
        let kinds: Vec<_> = replies.iter().map(|r| r["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, ["ready", "events", "error", "state_hash", "bye"]);
        assert_eq!(replies[3]["pulse"], 3);
        assert!(!runner.is_running());
    }

    #[test]
    fn test_same_seed_same_report() {
        let scenario = Scenario::duel();
        let a = run_scenario(&scenario, 99).unwrap();
        let b = run_scenario(&scenario, 99).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duel_ends_in_a_death() {
        let report = run_scenario(&Scenario::duel(), 5).unwrap();
        assert_eq!(report.deaths.len(), 1);
        assert!(report.died("Beleg") || report.died("orc"));
        assert!(report.landed <= report.swings);
        assert!(report.pulses < Scenario::duel().max_pulses);
    }

    #[test]
    fn test_pulse_limit_stops_run() {
        let mut scenario = Scenario::duel();
        scenario.max_pulses = 10;
        let report = run_scenario(&scenario, 1).unwrap();
        assert_eq!(report.pulses, 10);
        assert!(report.deaths.is_empty());
        assert_eq!(report.survivors.len(), 2);
    }
}
