//! 抽奖核心类型定义

use serde::{Deserialize, Serialize};

/// 选择算法标识，随结果一同公示，便于第三方复算
pub const SELECTION_ALGORITHM: &str = "sha256-seeded-shuffle-v1";

/// 抽奖参与者
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entrant {
    /// 参与者ID
    pub user_id: String,
    /// 展示用户名
    pub username: String,
}

/// 中奖者（含名次与奖金）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawnWinner {
    pub user_id: String,
    pub username: String,
    /// 名次，从1开始
    pub position: u32,
    /// 奖金（单位：分）
    pub prize_amount: u64,
}

/// 一次完整抽奖的结果，字段全部可公示、可复算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawOutcome {
    /// 中奖者列表，按名次排序
    pub winners: Vec<DrawnWinner>,
    /// 随机种子（32字节的hex编码）
    pub seed: String,
    /// 参与者集合哈希，绑定结果与确切的参与者名单
    pub entrants_hash: String,
    /// 选择证明，覆盖种子、名单哈希与逐个中奖者
    pub proof: String,
    /// 选择算法标识
    pub algorithm: String,
    /// 抽奖时间戳（秒）
    pub timestamp: u64,
}
