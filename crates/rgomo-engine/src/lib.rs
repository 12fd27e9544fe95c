//! 外部の五目並べエンジンを stdin/stdout 経由で操作するライブラリ
//!
//! - [`demux`]: エンジン出力を行単位でカテゴリ別キューへ振り分ける
//! - [`engine`]: エンジンプロセスの起動・送受信・終了
//! - [`protocol`]: ダイアレクト（現状 Gomocup のみ）ごとの要求・応答
//! - [`types`]: 着手・評価値・テレメトリなどの値型
//!
//! ```no_run
//! use rgomo_engine::{EngineProcess, Move};
//! use std::time::Duration;
//!
//! let mut engine = EngineProcess::start("pbrain-embryo", "gomocup")?;
//! if engine.is_ready(15, Duration::from_secs(5))? {
//!     let result = engine.play(Move::parse("h8")?, 5_000)?;
//!     println!("{} ({:?})", result.mv(), result.telemetry().evaluation);
//! }
//! # Ok::<(), rgomo_engine::EngineError>(())
//! ```

pub mod config;
pub mod demux;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::EngineConfig;
pub use engine::EngineProcess;
pub use error::{EngineError, Result};
pub use protocol::{Protocol, ProtocolFactory, SessionState, Stone, StoneOwner};
pub use types::{Evaluation, Mate, Move, PlayResult, Score, Telemetry};
