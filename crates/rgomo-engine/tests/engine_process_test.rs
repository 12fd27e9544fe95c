//! Test through actual engine processes (scripted with /bin/sh)

#![cfg(unix)]

mod common;

use std::path::Path;
use std::time::{Duration, Instant};

use common::{
    EXITS_ON_EOF, FakeEngine, LATE_TELEMETRY, SHORT_LIVED, SILENT_THINKER, STUBBORN, T_MOVE_MS,
    T_READY, T_SHORT, WELL_BEHAVED, wait_until,
};
use rgomo_engine::protocol::gomocup::CATEGORY_MESSAGE;
use rgomo_engine::{
    EngineError, EngineProcess, Move, ProtocolFactory, SessionState, Stone, StoneOwner,
};

#[test]
fn handshake_then_play_returns_move_and_latest_telemetry() {
    let fake = FakeEngine::new(WELL_BEHAVED);
    let mut config = fake.config();
    config.options.insert("timeout_turn".to_string(), toml::Value::Integer(1000));
    config.options.insert("rule".to_string(), toml::Value::Integer(1));

    let mut engine = EngineProcess::start_with(&config, &ProtocolFactory::default()).unwrap();
    assert_eq!(engine.dialect(), "gomocup");
    assert!(engine.is_running());
    assert!(engine.handshake(&config).unwrap());
    assert_eq!(engine.state(), SessionState::Ready);

    let result = engine.play(Move::parse("h8").unwrap(), T_MOVE_MS).unwrap();
    assert_eq!(result.mv(), Move::new(8, 8));

    // 2 行の MESSAGE のうち最新だけが残る
    let telemetry = result.telemetry();
    assert_eq!(telemetry.evaluation.as_ref().map(|e| e.as_str()), Some("120"));
    assert_eq!(telemetry.nodes, Some(1_000_000));
    assert_eq!(telemetry.pv, vec![Move::new(0, 0), Move::new(1, 1)]);
    assert!(result.info().starts_with("message depth 1-5"));

    let received = fake.received();
    assert_eq!(
        received,
        vec!["START 15", "INFO timeout_turn 1000", "INFO rule 1", "INFO time_left 3000", "TURN 7,7"]
    );

    engine.terminate();
    assert!(!engine.is_running());
    assert_eq!(engine.state(), SessionState::Stopped);
    assert!(fake.received().contains(&"END".to_string()));
}

#[test]
fn begin_and_board_wait_like_play() {
    let fake = FakeEngine::new(WELL_BEHAVED);
    let config = fake.config();
    let mut engine = EngineProcess::start_with(&config, &ProtocolFactory::default()).unwrap();
    assert!(engine.is_ready(15, T_READY).unwrap());

    let first = engine.begin(T_MOVE_MS).unwrap();
    assert_eq!(first.mv(), Move::new(7, 7));
    assert_eq!(first.telemetry().time_ms, Some(1));

    let stones = [
        Stone::new(Move::new(7, 7), StoneOwner::Own),
        Stone::new(Move::new(8, 8), StoneOwner::Opponent),
    ];
    let answer = engine.load_board(&stones, T_MOVE_MS).unwrap();
    assert_eq!(answer.mv(), Move::new(9, 9));
    assert!(answer.telemetry().is_empty());

    let received = fake.received();
    let board_at = received.iter().position(|l| l == "BOARD").unwrap();
    assert_eq!(received[board_at..], ["BOARD", "7,7,1", "8,8,2", "DONE"]);
}

#[test]
fn play_timeout_sends_exactly_one_stop() {
    let fake = FakeEngine::new(SILENT_THINKER);
    let mut engine = EngineProcess::start_with(&fake.config(), &ProtocolFactory::default()).unwrap();
    assert!(engine.is_ready(15, T_READY).unwrap());

    let result = engine.play(Move::new(7, 7), 200);
    assert!(matches!(result, Err(EngineError::Timeout { waited_ms: 200 })));
    assert_eq!(engine.state(), SessionState::Ready);

    assert!(fake.wait_received("STOP", 1, T_READY));
    std::thread::sleep(T_SHORT);
    assert_eq!(fake.received().iter().filter(|l| *l == "STOP").count(), 1);

    // 応答が遅いだけでプロセスは生きている
    assert!(engine.is_running());
    assert_eq!(
        engine.receive(CATEGORY_MESSAGE, true, T_READY).unwrap().as_deref(),
        Some("message stopped")
    );
}

#[test]
fn refused_start_and_ignored_end_fall_back_to_kill() {
    let fake = FakeEngine::new(STUBBORN);
    let mut engine = EngineProcess::start_with(&fake.config(), &ProtocolFactory::default()).unwrap();

    // ERROR 行はどのカテゴリにも入らないので、待ち切って false
    assert!(!engine.is_ready(15, Duration::from_millis(300)).unwrap());
    assert_eq!(engine.state(), SessionState::Unstarted);

    let start = Instant::now();
    engine.terminate();
    assert!(!engine.is_running());
    // 猶予を使い切ってから kill している
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(engine.is_reader_finished());
    assert!(fake.received().contains(&"END".to_string()));

    engine.terminate();
    assert!(matches!(engine.send(&["start", "15"]), Err(EngineError::EngineTerminated)));
}

#[test]
fn missing_executable_is_engine_not_found() {
    let result = EngineProcess::start("/nonexistent/pbrain-missing", "gomocup");
    assert!(matches!(
        result,
        Err(EngineError::EngineNotFound { ref path, .. }) if path == Path::new("/nonexistent/pbrain-missing")
    ));
}

#[test]
fn unknown_dialect_is_rejected_before_spawning() {
    // 実行ファイルが無くても、先にダイアレクトで失敗する
    let result = EngineProcess::start("/nonexistent/pbrain-missing", "uci");
    assert!(matches!(result, Err(EngineError::UnsupportedDialect(ref name)) if name == "uci"));
}

#[test]
fn send_after_exit_is_engine_terminated() {
    let fake = FakeEngine::new(SHORT_LIVED);
    let mut engine = EngineProcess::start_with(&fake.config(), &ProtocolFactory::default()).unwrap();
    assert!(wait_until(T_READY, || !engine.is_running()));

    assert!(matches!(engine.send(&["start", "15"]), Err(EngineError::EngineTerminated)));
    assert!(matches!(engine.play(Move::new(7, 7), 100), Err(EngineError::EngineTerminated)));
    // 終端後のキューは空のまま
    assert_eq!(engine.receive("output", false, T_SHORT).unwrap(), None);
}

#[test]
fn drop_sends_end() {
    let fake = FakeEngine::new(WELL_BEHAVED);
    let engine = EngineProcess::start_with(&fake.config(), &ProtocolFactory::default()).unwrap();
    drop(engine);
    assert!(fake.wait_received("END", 1, T_READY));
}

#[test]
fn raw_move_and_command_reach_the_engine() {
    let fake = FakeEngine::new(WELL_BEHAVED);
    let mut engine = EngineProcess::start_with(&fake.config(), &ProtocolFactory::default()).unwrap();
    assert!(engine.is_ready(15, T_READY).unwrap());

    engine.send_move(Move::new(3, 4)).unwrap();
    engine.send_command(&["info", "rule", "1"]).unwrap();
    assert!(fake.wait_received("INFO rule 1", 1, T_READY));
    assert_eq!(fake.received()[1..], ["TURN 3,4", "INFO rule 1"]);

    engine.terminate();
    assert!(matches!(engine.send_move(Move::new(3, 4)), Err(EngineError::EngineTerminated)));
    assert!(matches!(engine.send_command(&["stop"]), Err(EngineError::EngineTerminated)));
    assert!(matches!(engine.stop(), Err(EngineError::EngineTerminated)));
}

#[test]
fn terminate_closes_stdin_and_reaps_the_reader() {
    let fake = FakeEngine::new(EXITS_ON_EOF);
    let mut config = fake.config();
    config.quit_grace_ms = 5_000;
    let mut engine = EngineProcess::start_with(&config, &ProtocolFactory::default()).unwrap();
    assert!(engine.is_ready(15, T_READY).unwrap());

    // END は無視されるが、stdin の EOF で終了するので猶予を待ち切らない
    let start = Instant::now();
    engine.terminate();
    assert!(start.elapsed() < Duration::from_secs(3), "{:?}", start.elapsed());
    assert!(!engine.is_running());
    assert!(engine.is_reader_finished());
    assert_eq!(fake.received(), vec!["START 15", "END"]);
}

#[test]
fn configured_telemetry_window_catches_late_message() {
    let fake = FakeEngine::new(LATE_TELEMETRY);
    let mut config = fake.config();
    config.telemetry_window_ms = Some(2_000);
    let mut engine = EngineProcess::start_with(&config, &ProtocolFactory::default()).unwrap();
    assert!(engine.is_ready(15, T_READY).unwrap());

    let result = engine.play(Move::new(7, 7), T_MOVE_MS).unwrap();
    assert_eq!(result.mv(), Move::new(8, 8));
    assert_eq!(result.telemetry().nodes, Some(1_000_000));
}
