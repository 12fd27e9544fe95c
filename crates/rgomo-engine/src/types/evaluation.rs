//! 評価値（Evaluation）
//!
//! エンジンが `ev` として報告するスコア文字列を保持する。
//! 数値スコア（例: `"120"`, `"-35"`）と詰みスコア（例: `"+m5"`, `"-m3"`）の 2 系統がある。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// ロジスティック変換のスケール。スコア 200 で勝率 ≈ 73%。
pub const WINRATE_SCALE: f64 = 200.0;

/// 詰み勝率の立ち上がりの鋭さ。大きいほど短手数の詰みが 1 に近づく。
const MATE_WINRATE_SHARPNESS: f64 = 1000.0;

/// 詰みスコア（`+mN` / `-mN`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mate {
    winning: bool,
    steps: u32,
}

impl Mate {
    /// `"+m5"` / `"-m3"` 形式を解析する。
    pub fn parse(text: &str) -> Result<Mate> {
        let invalid = || EngineError::InvalidEvaluation(text.to_string());
        let (winning, digits) = if let Some(rest) = text.strip_prefix("+m") {
            (true, rest)
        } else if let Some(rest) = text.strip_prefix("-m") {
            (false, rest)
        } else {
            return Err(invalid());
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let steps = digits.parse().map_err(|_| invalid())?;
        Ok(Mate { winning, steps })
    }

    /// 詰みまでの手数
    #[inline]
    pub const fn step(self) -> u32 {
        self.steps
    }

    /// 手番側が詰ます側か
    #[inline]
    pub const fn is_winning(self) -> bool {
        self.winning
    }

    /// 詰み勝率
    ///
    /// 勝ち側は `1 - 1 / (2 + K / (N + 1))`。N が小さいほど 1 に近づき、
    /// N → ∞ で 0.5 に近づく。負け側はその補数。値域は開区間 (0, 1)。
    pub fn winrate(self) -> f64 {
        let n = f64::from(self.steps);
        let win = 1.0 - 1.0 / (2.0 + MATE_WINRATE_SHARPNESS / (n + 1.0));
        if self.winning { win } else { 1.0 - win }
    }
}

impl fmt::Display for Mate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.winning { '+' } else { '-' };
        write!(f, "{sign}m{}", self.steps)
    }
}

/// 評価値の解釈結果
#[derive(Debug, Clone, PartialEq)]
pub enum Score {
    Numeric(f64),
    Mate(Mate),
    /// 数値にも詰みにも解釈できない生文字列
    Unknown(String),
}

/// エンジンの評価値文字列
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evaluation(String);

impl Evaluation {
    pub fn new(value: impl Into<String>) -> Evaluation {
        Evaluation(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// スコアとして解釈する。`m` を含まなければ数値、含めば詰みとして扱う。
    pub fn score(&self) -> Score {
        if !self.0.contains('m') {
            return match self.0.parse::<f64>() {
                Ok(v) if v.is_finite() => Score::Numeric(v),
                _ => Score::Unknown(self.0.clone()),
            };
        }
        match Mate::parse(&self.0) {
            Ok(mate) => Score::Mate(mate),
            Err(_) => Score::Unknown(self.0.clone()),
        }
    }

    /// 手番側の勝率 [0, 1]
    ///
    /// 数値スコアは `1 / (1 + e^(-score / 200))`、詰みスコアは [`Mate::winrate`]、
    /// 解釈不能な値は 0.5。
    pub fn winrate(&self) -> f64 {
        match self.score() {
            Score::Numeric(v) => logistic(v),
            Score::Mate(mate) => mate.winrate(),
            Score::Unknown(_) => 0.5,
        }
    }

    /// 勝ちの詰みスコアか（`+m` 接頭辞）
    pub fn is_winning(&self) -> bool {
        self.0.starts_with("+m")
    }

    /// 負けの詰みスコアか（`-m` 接頭辞）
    pub fn is_losing(&self) -> bool {
        self.0.starts_with("-m")
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn logistic(score: f64) -> f64 {
    1.0 / (1.0 + (-score / WINRATE_SCALE).exp())
}
