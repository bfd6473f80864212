//! 可验证的中奖者选择
//!
//! 选择过程完全由公开种子决定：SHA-256(seed) 作为 StdRng 种子，
//! 对参与者名单做确定性洗牌后取前 k 名。持有公示数据的任何人都可以
//! 复算名单哈希、重放选择并核对证明。

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use crate::prize;
use crate::types::{DrawOutcome, DrawnWinner, Entrant, SELECTION_ALGORITHM};

/// 生成一个新的随机种子（32字节，hex编码）
pub fn generate_seed() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 由种子派生确定性随机数生成器
fn create_rng(seed: &str) -> StdRng {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let hash = hasher.finalize();
    let seed_array: [u8; 32] = hash.into();
    StdRng::from_seed(seed_array)
}

/// 计算参与者名单哈希：对有序的参与者ID做SHA-256
pub fn entrants_hash(entrants: &[Entrant]) -> String {
    let mut hasher = Sha256::new();
    for entrant in entrants {
        hasher.update(entrant.user_id.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// 生成选择证明：覆盖种子、名单哈希与逐个中奖者的ID和名次
pub fn generate_proof(seed: &str, entrants_hash: &str, winners: &[DrawnWinner]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(entrants_hash.as_bytes());
    for winner in winners {
        hasher.update(winner.user_id.as_bytes());
        hasher.update(winner.position.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// 执行确定性选择，返回 `min(winner_count, 参与者数)` 名中奖者
///
/// 返回的中奖者按名次排列，奖金字段为0，由 [`run_draw`] 填充。
pub fn select(entrants: &[Entrant], winner_count: u32, seed: &str) -> Result<Vec<DrawnWinner>, String> {
    if entrants.is_empty() {
        return Err("没有可参与抽奖的用户".to_string());
    }
    let mut ids = HashSet::new();
    for entrant in entrants {
        if !ids.insert(&entrant.user_id) {
            return Err(format!("参与者ID重复: {}", entrant.user_id));
        }
    }

    let mut shuffled: Vec<Entrant> = entrants.to_vec();
    let mut rng = create_rng(seed);
    shuffled.shuffle(&mut rng);

    let k = (winner_count as usize).min(entrants.len());
    Ok(shuffled
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, entrant)| DrawnWinner {
            user_id: entrant.user_id,
            username: entrant.username,
            position: (i + 1) as u32,
            prize_amount: 0,
        })
        .collect())
}

/// 执行一次完整抽奖：选择中奖者、分配奖金并生成证明
pub fn run_draw(
    entrants: &[Entrant],
    winner_count: u32,
    total_prize: u64,
    seed: &str,
) -> Result<DrawOutcome, String> {
    if winner_count == 0 {
        return Err("中奖人数必须至少为1".to_string());
    }
    let mut winners = select(entrants, winner_count, seed)?;
    let amounts = prize::distribute(total_prize, winners.len() as u32)?;
    for (winner, amount) in winners.iter_mut().zip(amounts) {
        winner.prize_amount = amount;
    }

    let entrants_hash = entrants_hash(entrants);
    let proof = generate_proof(seed, &entrants_hash, &winners);
    Ok(DrawOutcome {
        winners,
        seed: seed.to_string(),
        entrants_hash,
        proof,
        algorithm: SELECTION_ALGORITHM.to_string(),
        timestamp: now_secs(),
    })
}

/// 验证一次抽奖结果
///
/// 依次核对：名单哈希、从种子重放选择得到的中奖者（ID与名次）、
/// 中奖者唯一性、奖金分配、选择证明。任一不符返回 `false`。
pub fn verify(outcome: &DrawOutcome, entrants: &[Entrant]) -> bool {
    // 名单哈希
    if entrants_hash(entrants) != outcome.entrants_hash {
        return false;
    }

    // 从种子重放选择
    let replayed = match select(entrants, outcome.winners.len() as u32, &outcome.seed) {
        Ok(replayed) => replayed,
        Err(_) => return false,
    };
    if replayed.len() != outcome.winners.len() {
        return false;
    }
    for (expected, actual) in replayed.iter().zip(&outcome.winners) {
        if expected.user_id != actual.user_id || expected.position != actual.position {
            return false;
        }
    }

    // 中奖者唯一性
    let mut winner_ids = HashSet::new();
    for winner in &outcome.winners {
        if !winner_ids.insert(&winner.user_id) {
            return false;
        }
    }

    // 奖金分配与总额一致
    let total: u64 = outcome.winners.iter().map(|w| w.prize_amount).sum();
    let amounts = match prize::distribute(total, outcome.winners.len() as u32) {
        Ok(amounts) => amounts,
        Err(_) => return false,
    };
    for (winner, amount) in outcome.winners.iter().zip(amounts) {
        if winner.prize_amount != amount {
            return false;
        }
    }

    // 选择证明
    let expected_proof = generate_proof(&outcome.seed, &outcome.entrants_hash, &outcome.winners);
    expected_proof == outcome.proof
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
