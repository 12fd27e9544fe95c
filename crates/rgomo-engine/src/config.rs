//! エンジン起動設定
//!
//! TOML で記述する。`path` 以外は省略可能。
//!
//! ```toml
//! path = "engines/pbrain-embryo.exe"
//! dialect = "gomocup"
//! board_size = 15
//! ready_timeout_ms = 5000
//!
//! # 記述順のまま INFO コマンドとして送られる
//! [options]
//! timeout_turn = 5000
//! rule = 1
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::protocol::gomocup::DIALECT_NAME;

pub const DEFAULT_BOARD_SIZE: u32 = 15;
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 5_000;
/// `END` 送信後に自発的な終了を待つ時間
pub const DEFAULT_QUIT_GRACE_MS: u64 = 1_000;
/// 強制終了後に終了を確認する時間
pub const DEFAULT_KILL_WAIT_MS: u64 = 1_000;

/// エンジンの stderr の扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrMode {
    #[default]
    Inherit,
    Null,
}

impl StderrMode {
    pub(crate) fn to_stdio(self) -> Stdio {
        match self {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Null => Stdio::null(),
        }
    }
}

/// エンジンプロセス起動時の設定
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// 未指定なら呼び出し元のカレントディレクトリ
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_dialect")]
    pub dialect: String,
    #[serde(default = "default_board_size")]
    pub board_size: u32,
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    #[serde(default = "default_quit_grace_ms")]
    pub quit_grace_ms: u64,
    #[serde(default = "default_kill_wait_ms")]
    pub kill_wait_ms: u64,
    #[serde(default)]
    pub stderr: StderrMode,
    /// 着手受信後にテレメトリを待つ上限。未指定ならダイアレクトの既定値
    #[serde(default)]
    pub telemetry_window_ms: Option<u64>,
    /// 起動直後に送るエンジンオプション（記述順）
    #[serde(default)]
    pub options: toml::Table,
}

fn default_dialect() -> String {
    DIALECT_NAME.to_string()
}

fn default_board_size() -> u32 {
    DEFAULT_BOARD_SIZE
}

fn default_ready_timeout_ms() -> u64 {
    DEFAULT_READY_TIMEOUT_MS
}

fn default_quit_grace_ms() -> u64 {
    DEFAULT_QUIT_GRACE_MS
}

fn default_kill_wait_ms() -> u64 {
    DEFAULT_KILL_WAIT_MS
}

impl EngineConfig {
    /// 既定値で埋めた設定
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            working_dir: None,
            dialect: default_dialect(),
            board_size: DEFAULT_BOARD_SIZE,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            quit_grace_ms: DEFAULT_QUIT_GRACE_MS,
            kill_wait_ms: DEFAULT_KILL_WAIT_MS,
            stderr: StderrMode::default(),
            telemetry_window_ms: None,
            options: toml::Table::new(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }

    pub fn kill_wait(&self) -> Duration {
        Duration::from_millis(self.kill_wait_ms)
    }

    pub fn telemetry_window(&self) -> Option<Duration> {
        self.telemetry_window_ms.map(Duration::from_millis)
    }

    /// `[options]` を (キー, 値) の列にする。真偽値は `1` / `0`。
    pub fn info_options(&self) -> Vec<(String, String)> {
        self.options.iter().map(|(k, v)| (k.clone(), option_value(v))).collect()
    }
}

fn option_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
        other => other.to_string(),
    }
}
