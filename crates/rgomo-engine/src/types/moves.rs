//! 着手（Move）
//!
//! 盤上の交点を 0 始まりの (列, 行) で表す。テキスト表現は次の 3 形式を受け付ける。
//!
//! - `"C,R"`: 列・行をそのまま書いた数値ペア（空白可）。Gomocup の通信形式。
//! - `"<letter><number>"`: 列を英字（`a` = 0）、行を 1 始まりの数値で書く代数表記。
//! - `(u32, u32)`: ネイティブのペア。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// 代数表記で表現できる列数（`a`〜`z`）
pub const ALGEBRAIC_COLUMNS: u32 = 26;

/// 着手
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Move {
    col: u32,
    row: u32,
}

impl Move {
    #[inline]
    pub const fn new(col: u32, row: u32) -> Move {
        Move { col, row }
    }

    #[inline]
    pub const fn col(self) -> u32 {
        self.col
    }

    #[inline]
    pub const fn row(self) -> u32 {
        self.row
    }

    /// 文字列から生成する。
    ///
    /// カンマを含めば数値ペア、含まなければ代数表記として解釈する。
    /// どちらにも当てはまらない場合は `InvalidMove`。
    pub fn parse(text: &str) -> Result<Move> {
        let invalid = || EngineError::InvalidMove(text.to_string());
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

        if let Some((col, row)) = compact.split_once(',') {
            let col = parse_index(col).ok_or_else(invalid)?;
            let row = parse_index(row).ok_or_else(invalid)?;
            return Ok(Move::new(col, row));
        }

        let mut chars = compact.chars();
        let letter = chars.next().filter(char::is_ascii_alphabetic).ok_or_else(invalid)?;
        let rank = parse_index(chars.as_str()).ok_or_else(invalid)?;
        // 行は 1 始まり。"a0" は盤外
        let row = rank.checked_sub(1).ok_or_else(invalid)?;
        let col = u32::from(letter.to_ascii_lowercase() as u8 - b'a');
        Ok(Move::new(col, row))
    }

    /// (列, 行) のペア
    #[inline]
    pub const fn to_num(self) -> (u32, u32) {
        (self.col, self.row)
    }

    /// `"C,R"` 形式
    pub fn to_strnum(self) -> String {
        format!("{},{}", self.col, self.row)
    }

    /// 代数表記（`"a1"` 形式）。列が `z` を超える場合は `None`。
    pub fn to_algebraic(self) -> Option<String> {
        if self.col >= ALGEBRAIC_COLUMNS {
            return None;
        }
        let letter = char::from(b'a' + self.col as u8);
        Some(format!("{}{}", letter, u64::from(self.row) + 1))
    }
}

/// 符号なし 10 進数のみを受け付ける（`u32::from_str` は `+` を許すため自前で弾く）。
fn parse_index(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl From<(u32, u32)> for Move {
    fn from((col, row): (u32, u32)) -> Self {
        Move::new(col, row)
    }
}

impl FromStr for Move {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Move::parse(s)
    }
}

impl TryFrom<String> for Move {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Move::parse(&value)
    }
}

impl From<Move> for String {
    fn from(mv: Move) -> Self {
        mv.to_strnum()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_algebraic() {
            Some(alg) => f.write_str(&alg),
            None => write!(f, "{},{}", self.col, self.row),
        }
    }
}
