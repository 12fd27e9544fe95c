//! エンジン制御のエラー型
//!
//! 起動失敗・プロセス死亡・応答タイムアウトといった実行時エラーと、
//! 未知のダイアレクトやカテゴリ重複のようなセットアップ時のエラーを同じ enum で扱う。

use std::path::PathBuf;

/// エンジン制御で発生するエラー
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// 実行ファイルを起動できなかった
    #[error("failed to launch engine at {}: {source}", path.display())]
    EngineNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 送信時点でエンジンプロセスが終了していた
    #[error("engine process has terminated")]
    EngineTerminated,

    /// 持ち時間内に着手が返らなかった（再試行可能）
    #[error("engine did not return a move within {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// 着手文字列の形式不正
    #[error("invalid move: {0:?}")]
    InvalidMove(String),

    /// 詰みスコア文字列の形式不正
    #[error("invalid evaluation: {0:?}")]
    InvalidEvaluation(String),

    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("category {0:?} is already registered")]
    DuplicateCategory(String),

    #[error("unknown category {name:?} (valid: {valid})")]
    UnknownCategory { name: String, valid: String },

    /// カスタム抽出でキー数と捕獲グループ数が一致しない
    #[error("pattern has {actual} capture groups but {expected} keys were given")]
    PatternKeys { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

/// エンジン制御の Result 型
pub type Result<T> = std::result::Result<T, EngineError>;
