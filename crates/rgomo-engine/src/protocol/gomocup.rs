//! Gomocup プロトコル
//!
//! 受信行は次の 3 カテゴリに振り分ける（登録順 = 優先順）。
//!
//! - `coord`: `7,7` のような着手座標（スワップ系の複数ペアを含む）
//! - `message`: `MESSAGE ...` の探索テレメトリ
//! - `output`: `ERROR` で始まらないその他の応答（`OK` など）

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use log::{debug, warn};
use regex::Regex;

use super::{Dialect, Protocol, SessionState, Stone, Transport};
use crate::demux::CategoryTable;
use crate::error::{EngineError, Result};
use crate::types::{Move, PlayResult};

pub const DIALECT_NAME: &str = "gomocup";

pub const CATEGORY_COORD: &str = "coord";
pub const CATEGORY_MESSAGE: &str = "message";
pub const CATEGORY_OUTPUT: &str = "output";

/// 着手座標を受け取った後、テレメトリを待つ上限
pub const DEFAULT_TELEMETRY_WINDOW: Duration = Duration::from_millis(100);

/// `INFO time_left` のキー
const TIME_LEFT_KEY: &str = "time_left";

static COORD_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\s*,\s*\d+(\s+\d+\s*,\s*\d+)*$").expect("invalid COORD_LINE_RE pattern")
});

/// Gomocup ダイアレクト
#[derive(Debug, Clone)]
pub struct GomocupDialect {
    telemetry_window: Duration,
}

impl GomocupDialect {
    pub fn new() -> Self {
        Self { telemetry_window: DEFAULT_TELEMETRY_WINDOW }
    }

    pub fn with_telemetry_window(mut self, window: Duration) -> Self {
        self.telemetry_window = window;
        self
    }
}

impl Default for GomocupDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for GomocupDialect {
    fn name(&self) -> &str {
        DIALECT_NAME
    }

    fn categories(&self) -> Result<CategoryTable> {
        let mut table = CategoryTable::new();
        table.register(CATEGORY_COORD, |line| COORD_LINE_RE.is_match(line))?;
        table.register(CATEGORY_MESSAGE, |line| line.starts_with("message"))?;
        table.register(CATEGORY_OUTPUT, |line| !line.starts_with("error"))?;
        Ok(table)
    }

    fn create(&self, transport: Arc<dyn Transport>) -> Box<dyn Protocol> {
        Box::new(GomocupProtocol::new(transport).with_telemetry_window(self.telemetry_window))
    }
}

/// Gomocup セッション
pub struct GomocupProtocol {
    transport: Arc<dyn Transport>,
    state: SessionState,
    telemetry_window: Duration,
}

impl GomocupProtocol {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: SessionState::Unstarted,
            telemetry_window: DEFAULT_TELEMETRY_WINDOW,
        }
    }

    pub fn with_telemetry_window(mut self, window: Duration) -> Self {
        self.telemetry_window = window;
        self
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Stopped {
            return Err(EngineError::EngineTerminated);
        }
        Ok(())
    }

    fn push_time_left(&self, time_left_ms: u64) -> Result<()> {
        let time_left = time_left_ms.to_string();
        self.transport.send(&["info", TIME_LEFT_KEY, time_left.as_str()])
    }

    /// 着手座標を待ち、続けてテレメトリを最新 1 件に畳んで読む。
    fn await_move(&mut self, time_left_ms: u64) -> Result<PlayResult> {
        self.state = SessionState::Thinking;
        let budget = Duration::from_millis(time_left_ms);
        let start = Instant::now();

        let coord = self.transport.receive(CATEGORY_COORD, false, budget);
        self.state = SessionState::Ready;
        let Some(coord) = coord? else {
            warn!("gomocup: no move within {time_left_ms}ms, sending STOP");
            if let Err(e) = self.stop() {
                debug!("gomocup: STOP not delivered: {e}");
            }
            return Err(EngineError::Timeout { waited_ms: time_left_ms });
        };

        let window = budget.saturating_sub(start.elapsed()).min(self.telemetry_window);
        let info = match self.transport.receive(CATEGORY_MESSAGE, true, window) {
            Ok(Some(line)) => line,
            Ok(None) => String::new(),
            Err(e) => {
                debug!("gomocup: telemetry unavailable: {e}");
                String::new()
            }
        };
        debug!("gomocup: move {coord} ({} ms)", start.elapsed().as_millis());
        PlayResult::new(&coord, &info)
    }
}

impl Protocol for GomocupProtocol {
    fn state(&self) -> SessionState {
        self.state
    }

    fn is_ready(&mut self, board_size: u32, timeout: Duration) -> Result<bool> {
        self.ensure_open()?;
        let size = board_size.to_string();
        self.transport.send(&["start", size.as_str()])?;
        let reply = self.transport.receive(CATEGORY_OUTPUT, true, timeout)?;
        let ready = reply.as_deref() == Some("ok");
        if ready {
            self.state = SessionState::Ready;
        } else {
            debug!("gomocup: START {board_size} answered with {reply:?}");
        }
        Ok(ready)
    }

    fn play(&mut self, last_move: Move, time_left_ms: u64) -> Result<PlayResult> {
        self.ensure_open()?;
        self.push_time_left(time_left_ms)?;
        let coord = last_move.to_strnum();
        self.transport.send(&["turn", coord.as_str()])?;
        self.await_move(time_left_ms)
    }

    fn begin(&mut self, time_left_ms: u64) -> Result<PlayResult> {
        self.ensure_open()?;
        self.push_time_left(time_left_ms)?;
        self.transport.send(&["begin"])?;
        self.await_move(time_left_ms)
    }

    fn load_board(&mut self, stones: &[Stone], time_left_ms: u64) -> Result<PlayResult> {
        self.ensure_open()?;
        self.push_time_left(time_left_ms)?;
        self.transport.send(&["board"])?;
        for stone in stones {
            let entry = format!("{},{}", stone.mv.to_strnum(), stone.owner as u8);
            self.transport.send(&[entry.as_str()])?;
        }
        self.transport.send(&["done"])?;
        self.await_move(time_left_ms)
    }

    fn send_move(&mut self, mv: Move) -> Result<()> {
        self.ensure_open()?;
        let coord = mv.to_strnum();
        self.transport.send(&["turn", coord.as_str()])
    }

    fn stop(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.transport.send(&["stop"])
    }

    fn quit(&mut self) -> Result<()> {
        if self.state == SessionState::Stopped {
            return Ok(());
        }
        self.state = SessionState::Stopped;
        self.transport.send(&["end"])
    }

    fn configure(&mut self, options: &[(String, String)]) -> Result<()> {
        self.ensure_open()?;
        for (key, value) in options {
            self.transport.send(&["info", key.as_str(), value.as_str()])?;
        }
        Ok(())
    }

    fn send_command(&mut self, parts: &[&str]) -> Result<()> {
        self.ensure_open()?;
        self.transport.send(parts)
    }

    fn set_telemetry_window(&mut self, window: Duration) {
        self.telemetry_window = window;
    }
}
