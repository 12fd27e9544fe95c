//! Common test utilities: scripted `/bin/sh` engines

#![allow(dead_code)] // These utilities may be used by various test files

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rgomo_engine::EngineConfig;
use rgomo_engine::config::StderrMode;
use tempfile::TempDir;

pub const T_READY: Duration = Duration::from_secs(5);
pub const T_MOVE_MS: u64 = 3_000;
pub const T_SHORT: Duration = Duration::from_millis(100);

/// Answers START with OK, BEGIN/TURN with two MESSAGE lines and a move.
/// Every received line is appended to the log file given as `$1`.
pub const WELL_BEHAVED: &str = r#"
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$1"
  case "$line" in
    START*) echo OK ;;
    BEGIN) echo "MESSAGE depth 1-2 ev 5 n 1k nps 10 tm 1 pv h8"; echo "7,7" ;;
    TURN*)
      echo "MESSAGE depth 1-3 ev 40 n 2k nps 20 tm 2 pv a1"
      echo "MESSAGE depth 1-5 ev 120 n 1000k nps 500 tm 30 pv a1 b2"
      echo "8,8" ;;
    BOARD) ;;
    DONE) echo "9,9" ;;
    END) exit 0 ;;
  esac
done
"#;

/// Answers START with OK, never answers TURN, reports STOP.
pub const SILENT_THINKER: &str = r#"
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$1"
  case "$line" in
    START*) echo OK ;;
    STOP) echo "MESSAGE stopped" ;;
    END) exit 0 ;;
  esac
done
"#;

/// Refuses START, ignores END and keeps running after stdin is closed.
pub const STUBBORN: &str = r#"
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$1"
  case "$line" in
    START*) echo "ERROR unsupported size" ;;
  esac
done
exec sleep 60
"#;

/// Answers TURN with a move and reports telemetry 300 ms later.
pub const LATE_TELEMETRY: &str = r#"
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$1"
  case "$line" in
    START*) echo OK ;;
    TURN*)
      echo "8,8"
      sleep 0.3
      echo "MESSAGE depth 1-5 ev 120 n 1000k nps 500 tm 30 pv a1 b2" ;;
    END) exit 0 ;;
  esac
done
"#;

/// Ignores END but exits once stdin is closed.
pub const EXITS_ON_EOF: &str = r#"
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$1"
  case "$line" in
    START*) echo OK ;;
  esac
done
exit 0
"#;

/// Exits right away.
pub const SHORT_LIVED: &str = "exit 0\n";

/// A scripted engine plus the log of what it received.
///
/// The script runs through `/bin/sh` so the test never executes a file it just wrote.
pub struct FakeEngine {
    dir: TempDir,
    script: PathBuf,
    log: PathBuf,
}

impl FakeEngine {
    pub fn new(body: &str) -> FakeEngine {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let script = dir.path().join("engine.sh");
        let log = dir.path().join("received.log");
        fs::write(&script, body).expect("Failed to write engine script");
        fs::write(&log, "").expect("Failed to create log");
        FakeEngine { dir, script, log }
    }

    /// Launch configuration with short shutdown waits
    pub fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::new("/bin/sh");
        config.args = vec![path_arg(&self.script), path_arg(&self.log)];
        config.quit_grace_ms = 200;
        config.kill_wait_ms = 500;
        config.stderr = StderrMode::Null;
        config
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Lines the engine has received so far
    pub fn received(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .expect("Failed to read log")
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Waits until the engine has received `count` lines equal to `line`.
    pub fn wait_received(&self, line: &str, count: usize, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.received().iter().filter(|l| *l == line).count() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
