//! Integration tests for the headless runner.

use std::io::{Cursor, Write};
use std::path::PathBuf;

use mud_headless::batch::{run_batch, BatchConfig, BatchResults};
use mud_headless::protocol::{Command, Response};
use mud_headless::runner::{run_scenario, HeadlessRunner};
use mud_headless::scenario::{Scenario, ScenarioError};
use mud_test_utils::determinism::verify_determinism;
use tempfile::{tempdir, NamedTempFile};

fn shipped(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

#[test]
fn test_shipped_scenarios_build() {
    for file in ["duel.ron", "gate.ron"] {
        let scenario = Scenario::load(shipped(file)).unwrap();
        let built = scenario.build(scenario.seed).unwrap();
        assert_eq!(built.names.len(), scenario.combatants.len(), "{file}");
        assert!(built.engine.roster_invariant_holds());
    }
}

#[test]
fn test_duel_file_matches_builtin() {
    let from_file = Scenario::load(shipped("duel.ron")).unwrap();
    let a = run_scenario(&from_file, 11).unwrap();
    let b = run_scenario(&Scenario::duel(), 11).unwrap();
    assert_eq!(a.final_hash, b.final_hash);
    assert_eq!(a.deaths, b.deaths);
}

#[test]
fn test_missing_scenario_file() {
    let dir = tempdir().unwrap();
    let result = Scenario::load(dir.path().join("nowhere.ron"));
    assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
}

#[test]
fn test_scenario_from_temp_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"(
            name: "Ambush",
            rooms: [(id: 1, name: "Temple"), (id: 2, name: "Void"), (id: 40, name: "Glade")],
            combatants: [
                (name: "Beren", controller: Player(idnum: 3), level: 15, room: 40, vitality: 180, ob: 40),
                (name: "wolf", controller: Npc(vnum: 700), level: 10, room: 40, vitality: 80, ob: 30),
            ],
            fights: [("wolf", "Beren")],
            max_pulses: 500,
        )"#
    )
    .unwrap();

    let scenario = Scenario::load(file.path()).unwrap();
    let report = run_scenario(&scenario, 4).unwrap();
    assert_eq!(report.scenario, "Ambush");
    assert!(report.pulses <= 500);
    assert!(report.swings > 0);
}

#[test]
fn test_gate_script_is_issued() {
    let scenario = Scenario::load(shipped("gate.ron")).unwrap();
    let mut runner = HeadlessRunner::from_scenario(&scenario, 17).unwrap();
    runner.handle(Command::Pulse { count: 1 });

    // The opening bash has been scheduled on the wait-list.
    let hurin = runner.fight().names["Hurin"];
    assert!(runner.fight().engine.waits().get(hurin).is_some());
}

#[test]
fn test_session_load_command() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("duel.ron");
    std::fs::copy(shipped("duel.ron"), &path).unwrap();

    let mut runner = HeadlessRunner::from_scenario(&Scenario::duel(), 0).unwrap();
    runner.handle(Command::Pulse { count: 30 });
    let responses = runner.handle(Command::Load {
        path: path.display().to_string(),
        seed: Some(2),
    });
    assert!(matches!(
        responses[..],
        [Response::Ack { .. }, Response::Ready { pulse: 0, .. }]
    ));
    assert_eq!(runner.fight().engine.pulse_count(), 0);

    let bad = runner.handle(Command::Load {
        path: dir.path().join("missing.ron").display().to_string(),
        seed: None,
    });
    assert!(matches!(bad[..], [Response::Error { .. }]));
}

#[test]
fn test_session_hash_matches_engine() {
    let built = Scenario::duel().build(8).unwrap();
    let mut engine = built.engine.clone();
    for _ in 0..40 {
        engine.pulse();
    }

    let mut runner = HeadlessRunner::new(built);
    let input = "{\"cmd\":\"pulse\",\"count\":40}\n{\"cmd\":\"hash\"}\n";
    let mut output = Vec::new();
    runner.run(Cursor::new(input), &mut output).unwrap();

    let last = String::from_utf8(output)
        .unwrap()
        .lines()
        .last()
        .map(str::to_string)
        .unwrap();
    let reply: serde_json::Value = serde_json::from_str(&last).unwrap();
    assert_eq!(reply["type"], "state_hash");
    assert_eq!(reply["hash"], engine.state_hash());
}

#[test]
fn test_built_scenario_is_deterministic() {
    let scenario = Scenario::load(shipped("gate.ron")).unwrap();
    let result = verify_determinism(
        3,
        400,
        || scenario.build(17).unwrap().engine,
        |engine| {
            engine.pulse();
        },
        |engine| engine.state_hash(),
    );
    result.assert_deterministic();
}

#[test]
fn test_batch_results_round_trip_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out").join("batch.json");
    let results = run_batch(&Scenario::duel(), BatchConfig::new(3).with_seed(5));
    results.save(&path).unwrap();

    let loaded = BatchResults::load(&path).unwrap();
    assert_eq!(loaded.runs, results.runs);
    assert_eq!(loaded.summary.fights, 3);
}
