//! Medeb 彩票池抽奖核心
//!
//! 实现奖金分配与可验证的中奖者选择，服务端在开奖时调用。
//! 算法只依赖公开数据（种子、参与者名单），任何人都可以独立复算结果。

pub mod prize;
pub mod selection;
pub mod types;

pub use selection::{generate_seed, run_draw, verify};
pub use types::{DrawOutcome, DrawnWinner, Entrant, SELECTION_ALGORITHM};
