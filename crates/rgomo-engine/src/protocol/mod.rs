//! エンジンとの通信プロトコル
//!
//! プロトコル（ダイアレクト）は [`Transport`] が提供する送受信プリミティブの上に
//! 要求・応答の意味づけを載せる。エンジンプロセスの管理とは独立しているため、
//! テストでは台本どおりに応答する Transport を差し込める。

pub mod factory;
pub mod gomocup;

use std::sync::Arc;
use std::time::Duration;

use crate::demux::CategoryTable;
use crate::error::Result;
use crate::types::{Move, PlayResult};

pub use factory::ProtocolFactory;
pub use gomocup::{GomocupDialect, GomocupProtocol};

/// エンジンへの送信と、カテゴリ別の受信
pub trait Transport: Send + Sync {
    /// 1 コマンドを送る。先頭トークンは動詞として大文字化される。
    fn send(&self, parts: &[&str]) -> Result<()>;

    /// カテゴリから 1 行取り出す。`reset` なら最新以外を捨ててから待つ。
    fn receive(&self, category: &str, reset: bool, timeout: Duration) -> Result<Option<String>>;
}

/// 送信行の組み立て: 空白区切りで連結し、先頭トークンのみ大文字化する。
pub fn format_command(parts: &[&str]) -> String {
    let mut line = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            line.push_str(&part.to_uppercase());
        } else {
            line.push(' ');
            line.push_str(part);
        }
    }
    line
}

/// セッション状態
///
/// `Unstarted → Ready → Thinking → Ready → … → Stopped`
///
/// 着手要求（`play` / `begin` / `load_board`）は `Unstarted` からも受け付け、
/// 応答後は `Ready` になる。`START` を省略して起動するエンジンもあるため。
/// `Stopped` からの要求はすべて `EngineTerminated`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Ready,
    Thinking,
    Stopped,
}

/// 盤上の石の持ち主（Gomocup `BOARD` の field 値）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoneOwner {
    Own = 1,
    Opponent = 2,
    /// 連続対局モードで相手が直前に置いた石
    Continuous = 3,
}

/// 一括読み込み用の石
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stone {
    pub mv: Move,
    pub owner: StoneOwner,
}

impl Stone {
    pub const fn new(mv: Move, owner: StoneOwner) -> Stone {
        Stone { mv, owner }
    }
}

/// 1 ダイアレクト分の要求・応答
///
/// 同時に処理中の要求は 1 つまで（`&mut self` で保証）。
pub trait Protocol: Send {
    fn state(&self) -> SessionState;

    /// 盤サイズを通知して準備完了を確認する。否定応答・タイムアウトは `Ok(false)`。
    fn is_ready(&mut self, board_size: u32, timeout: Duration) -> Result<bool>;

    /// 相手の着手を伝えて応手を待つ。`time_left_ms` 内に座標が来なければ
    /// 停止コマンドを送ったうえで `Timeout`。
    fn play(&mut self, last_move: Move, time_left_ms: u64) -> Result<PlayResult>;

    /// エンジンの先手番として着手を要求する。
    fn begin(&mut self, time_left_ms: u64) -> Result<PlayResult>;

    /// 局面を一括で読み込ませ、手番側の着手を待つ。
    fn load_board(&mut self, stones: &[Stone], time_left_ms: u64) -> Result<PlayResult>;

    /// 着手を伝えるだけで応答は待たない。
    fn send_move(&mut self, mv: Move) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// セッションを終了する。以後の要求（`stop` / `send_command` を含む）は
    /// `EngineTerminated`。2 回目以降は何も送らない。
    fn quit(&mut self) -> Result<()>;

    /// オプションを渡された順に 1 つずつ送る。
    fn configure(&mut self, options: &[(String, String)]) -> Result<()>;

    fn send_command(&mut self, parts: &[&str]) -> Result<()>;

    /// 着手受信後にテレメトリを待つ上限（残り持ち時間でも頭打ち）
    fn set_telemetry_window(&mut self, window: Duration);
}

/// ダイアレクト定義: 受信カテゴリとプロトコル実装の組
pub trait Dialect: Send + Sync {
    fn name(&self) -> &str;

    /// このダイアレクトが必要とする受信カテゴリ（登録順が分類優先順）
    fn categories(&self) -> Result<CategoryTable>;

    fn create(&self, transport: Arc<dyn Transport>) -> Box<dyn Protocol>;
}
