//! I/O を持たない値型

mod evaluation;
mod moves;
mod play_result;

pub use evaluation::{Evaluation, Mate, Score, WINRATE_SCALE};
pub use moves::{ALGEBRAIC_COLUMNS, Move};
pub use play_result::{DepthRange, PlayResult, Telemetry};
