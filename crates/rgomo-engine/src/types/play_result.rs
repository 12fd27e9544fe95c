//! 着手要求の結果とテレメトリ
//!
//! Gomocup エンジンは着手座標とは別に `MESSAGE` 行で探索情報を報告する。
//! 書式はエンジンごとに揺れるため、解析できない行は空の [`Telemetry`] として扱い、
//! 呼び出し側は「不明」とみなす。

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::evaluation::Evaluation;
use super::moves::Move;
use crate::error::{EngineError, Result};

/// `MESSAGE depth 1-5 ev 120 n 1000k nps 500 tm 30 pv a1 b2` 形式の探索情報
static TELEMETRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)depth ([0-9]+)-([0-9]+) ev ([+-]?[a-z]?[0-9]+) n ([0-9]+)([kmg]?)\S* \S+ ([0-9]+)([kmg]?)\S* tm ([0-9]+)\S* pv ((?:[a-z][0-9]+\s*)*)",
    )
    .expect("invalid TELEMETRY_RE pattern")
});

/// 座標行の先頭ペア（`"7,7"` / `"7 , 7 8,8"`）
static COORD_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+)\s*,\s*([0-9]+)").expect("invalid COORD_PAIR_RE pattern")
});

/// 探索深さの範囲（`depth 1-5`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: u32,
    pub max: u32,
}

/// 探索テレメトリ。すべて欠損し得る。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<DepthRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pv: Vec<Move>,
}

impl Telemetry {
    /// MESSAGE 行を解析する。パターンに一致しなければ空のレコードを返す。
    pub fn parse(line: &str) -> Telemetry {
        let Some(caps) = TELEMETRY_RE.captures(line) else {
            return Telemetry::default();
        };
        let depth = match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            (Ok(min), Ok(max)) => Some(DepthRange { min, max }),
            _ => None,
        };
        Telemetry {
            depth,
            evaluation: Some(Evaluation::new(&caps[3])),
            nodes: scaled_count(&caps[4], &caps[5]),
            nps: scaled_count(&caps[6], &caps[7]),
            time_ms: caps[8].parse().ok(),
            pv: caps[9].split_whitespace().filter_map(|m| Move::parse(m).ok()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_none()
            && self.evaluation.is_none()
            && self.nodes.is_none()
            && self.nps.is_none()
            && self.time_ms.is_none()
            && self.pv.is_empty()
    }
}

/// `1000k` のような単位付きカウントを展開する。
fn scaled_count(digits: &str, unit: &str) -> Option<u64> {
    let value = digits.parse::<u64>().ok()?;
    let scale: u64 = match unit.to_ascii_lowercase().as_str() {
        "k" => 1_000,
        "m" => 1_000_000,
        "g" => 1_000_000_000,
        _ => 1,
    };
    Some(value.saturating_mul(scale))
}

/// 着手要求の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayResult {
    #[serde(rename = "move")]
    mv: Move,
    telemetry: Telemetry,
    /// 解析前の MESSAGE 行（無ければ空文字列）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    info: String,
}

impl PlayResult {
    /// 座標行と MESSAGE 行から組み立てる。
    ///
    /// 座標行に複数のペアが並ぶ場合（スワップ系ルールの応答）は先頭を採用する。
    /// 座標が読めなければ `InvalidMove`。MESSAGE 行の不正はエラーにしない。
    pub fn new(coord_line: &str, info: &str) -> Result<PlayResult> {
        let caps = COORD_PAIR_RE
            .captures(coord_line)
            .ok_or_else(|| EngineError::InvalidMove(coord_line.to_string()))?;
        let col = caps[1].parse().map_err(|_| EngineError::InvalidMove(coord_line.to_string()))?;
        let row = caps[2].parse().map_err(|_| EngineError::InvalidMove(coord_line.to_string()))?;
        Ok(PlayResult {
            mv: Move::new(col, row),
            telemetry: Telemetry::parse(info),
            info: info.to_string(),
        })
    }

    #[inline]
    pub fn mv(&self) -> Move {
        self.mv
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    /// 独自書式の MESSAGE 行から値を取り出す。
    ///
    /// `keys` は捕獲グループと同じ順・同じ数で渡す。数が合わなければ `PatternKeys`。
    /// 一致しなければ空のマップ、一致したが参加しなかったグループはキーごと省く。
    pub fn extract(&self, pattern: &Regex, keys: &[&str]) -> Result<BTreeMap<String, String>> {
        let groups = pattern.captures_len() - 1;
        if groups != keys.len() {
            return Err(EngineError::PatternKeys { expected: keys.len(), actual: groups });
        }
        let mut out = BTreeMap::new();
        if let Some(caps) = pattern.captures(&self.info) {
            for (idx, key) in keys.iter().enumerate() {
                if let Some(m) = caps.get(idx + 1) {
                    out.insert((*key).to_string(), m.as_str().to_string());
                }
            }
        }
        Ok(out)
    }
}
