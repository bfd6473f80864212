//! 奖金分配计算
//!
//! 所有金额以整数"分"（1 ETB = 100 分）表示，比例以基点（1/10000）计算，
//! 余数统一计入第一名，保证分配结果精确等于奖池总额。

/// 基点分母
pub const BPS_DENOMINATOR: u64 = 10_000;
/// 报名费进入奖池的比例（90%）
pub const PRIZE_POOL_BPS: u64 = 9_000;
/// 平台佣金比例（10%）
pub const COMMISSION_BPS: u64 = 1_000;

/// 单笔报名费中进入奖池的份额
pub fn prize_pool_share(entry_fee: u64) -> u64 {
    (entry_fee as u128 * PRIZE_POOL_BPS as u128 / BPS_DENOMINATOR as u128) as u64
}

/// 单笔报名费中的平台佣金份额，与奖池份额之和恒等于报名费
pub fn commission_share(entry_fee: u64) -> u64 {
    entry_fee - prize_pool_share(entry_fee)
}

/// 按固定档位计算各名次奖金
///
/// - 1 名：100%
/// - 2 名：70% / 30%
/// - 3 名：50% / 30% / 20%
/// - 超过 3 名：第一名 40%，剩余 60% 在其余名次间均分
///
/// 返回向量按名次排列且总和精确等于 `total_prize`。
pub fn distribute(total_prize: u64, winner_count: u32) -> Result<Vec<u64>, String> {
    if winner_count == 0 {
        return Err("中奖人数必须至少为1".to_string());
    }
    let k = winner_count as usize;
    let total = total_prize as u128;
    let pct = |bps: u128| -> u64 { (total * bps / BPS_DENOMINATOR as u128) as u64 };

    let mut amounts: Vec<u64> = match winner_count {
        1 => vec![total_prize],
        2 => vec![pct(7_000), pct(3_000)],
        3 => vec![pct(5_000), pct(3_000), pct(2_000)],
        _ => {
            let first = pct(4_000);
            let share = (total_prize - first) / (k as u64 - 1);
            let mut v = Vec::with_capacity(k);
            v.push(first);
            v.extend(std::iter::repeat(share).take(k - 1));
            v
        }
    };

    // 整数截断产生的余数计入第一名
    let assigned: u64 = amounts.iter().sum();
    amounts[0] += total_prize - assigned;
    Ok(amounts)
}
