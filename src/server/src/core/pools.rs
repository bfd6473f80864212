//! 彩池生命周期：创建、报名、封池、开奖与结算
//!
//! 状态机：active -> closed -> completed（active 可直接 completed）。
//! 报名在彩池写锁内完成余额扣减与人数/奖池累计，保证两者一致；
//! 锁序固定为先彩池后钱包。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use medeb_lottery_draw::prize;
use medeb_lottery_draw::selection;
use medeb_lottery_draw::types::{Entrant, SELECTION_ALGORITHM};

use crate::core::users::User;
use crate::core::wallet::WalletService;
use crate::types::now_secs;
use crate::utils::new_id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Active,
    Closed,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub name: String,
    pub description: String,
    /// 报名费（分）
    pub entry_fee: u64,
    pub min_participants: u32,
    pub max_participants: u32,
    pub winner_count: u32,
    pub status: PoolStatus,
    /// 开奖时间（秒）
    pub draw_at: u64,
    pub created_by: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub current_participants: u32,
    /// 累计奖池（报名费的90%）
    pub total_prize: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub pool_id: String,
    pub user_id: String,
    pub username: String,
    pub joined_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub pool_id: String,
    pub user_id: String,
    pub username: String,
    pub position: u32,
    pub prize_amount: u64,
    pub created_at: u64,
}

/// 开奖记录；未达最低人数的退款结算没有种子与证明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawRecord {
    pub pool_id: String,
    pub below_minimum: bool,
    pub seed: Option<String>,
    pub entrants_hash: String,
    pub proof: Option<String>,
    pub algorithm: String,
    pub drawn_at: u64,
}

/// 创建彩池的参数
#[derive(Debug, Clone)]
pub struct CreatePoolSpec {
    pub name: String,
    pub description: String,
    pub entry_fee: u64,
    pub min_participants: u32,
    pub max_participants: u32,
    pub winner_count: u32,
    pub draw_at: u64,
}

#[derive(Default)]
struct PoolStore {
    pools: HashMap<String, Pool>,
    participants: Vec<Participant>,
    winners: Vec<Winner>,
    draws: HashMap<String, DrawRecord>,
    // 创建顺序
    order: Vec<String>,
}

#[derive(Clone, Default)]
pub struct PoolService {
    inner: Arc<RwLock<PoolStore>>,
}

impl PoolService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建彩池（管理员操作）
    pub async fn create(&self, created_by: &str, spec: CreatePoolSpec) -> Result<Pool, String> {
        if spec.name.trim().is_empty() || spec.description.trim().is_empty() {
            return Err("All fields are required".to_string());
        }
        if spec.entry_fee < 100 {
            return Err("Entry fee must be at least 1 ETB".to_string());
        }
        if spec.min_participants < 2 || spec.max_participants < spec.min_participants {
            return Err("Invalid participant limits".to_string());
        }
        if spec.winner_count < 1 || spec.winner_count > spec.max_participants {
            return Err("Invalid winner count".to_string());
        }
        let now = now_secs();
        if spec.draw_at <= now {
            return Err("Draw time must be in the future".to_string());
        }
        let pool = Pool {
            id: new_id("pool"),
            name: spec.name.trim().to_string(),
            description: spec.description.trim().to_string(),
            entry_fee: spec.entry_fee,
            min_participants: spec.min_participants,
            max_participants: spec.max_participants,
            winner_count: spec.winner_count,
            status: PoolStatus::Active,
            draw_at: spec.draw_at,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            current_participants: 0,
            total_prize: 0,
        };
        let mut store = self.inner.write().await;
        store.order.push(pool.id.clone());
        store.pools.insert(pool.id.clone(), pool.clone());
        Ok(pool)
    }

    /// 报名：校验、扣费、记佣金并更新人数与奖池，全程持有彩池写锁
    pub async fn join(
        &self,
        wallet: &WalletService,
        pool_id: &str,
        user: &User,
    ) -> Result<(Pool, String), String> {
        let now = now_secs();
        let mut guard = self.inner.write().await;
        let store = &mut *guard;
        let pool = store
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| "Pool not found".to_string())?;
        if pool.status != PoolStatus::Active || now >= pool.draw_at {
            return Err("Pool is no longer active".to_string());
        }
        if pool.current_participants >= pool.max_participants {
            return Err("Pool is full".to_string());
        }
        if store
            .participants
            .iter()
            .any(|p| p.pool_id == pool_id && p.user_id == user.id)
        {
            return Err("You have already joined this pool".to_string());
        }

        wallet
            .debit_pool_entry(&user.id, pool_id, &pool.name, pool.entry_fee)
            .await?;
        let commission = prize::commission_share(pool.entry_fee);
        wallet.book_commission(pool_id, &pool.name, commission).await;

        pool.current_participants += 1;
        pool.total_prize += prize::prize_pool_share(pool.entry_fee);
        pool.updated_at = now;
        store.participants.push(Participant {
            pool_id: pool_id.to_string(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            joined_at: now,
        });
        let message = format!("Successfully joined {}!", pool.name);
        Ok((pool.clone(), message))
    }

    /// 封池，阻止后续报名
    pub async fn close(&self, pool_id: &str) -> Result<Pool, String> {
        let mut guard = self.inner.write().await;
        let pool = guard
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| "Pool not found".to_string())?;
        validate_transition(&pool.status, &PoolStatus::Closed)?;
        pool.status = PoolStatus::Closed;
        pool.updated_at = now_secs();
        Ok(pool.clone())
    }

    /// 开奖并结算
    ///
    /// 已封池的彩池随时可开；活跃彩池到达开奖时间后可开，
    /// `force` 允许管理员提前开奖。未达最低人数时全额退款（含佣金冲销），
    /// 不产生中奖者。
    pub async fn draw(
        &self,
        wallet: &WalletService,
        pool_id: &str,
        force: bool,
    ) -> Result<(Pool, Vec<Winner>, DrawRecord), String> {
        let now = now_secs();
        let mut guard = self.inner.write().await;
        let store = &mut *guard;
        let pool = store
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| "Pool not found".to_string())?;
        if pool.status == PoolStatus::Completed || store.draws.contains_key(pool_id) {
            return Err("Pool has already been drawn".to_string());
        }
        if pool.status == PoolStatus::Active && !force && now < pool.draw_at {
            return Err("Draw time has not been reached".to_string());
        }
        validate_transition(&pool.status, &PoolStatus::Completed)?;

        let entrants: Vec<Entrant> = store
            .participants
            .iter()
            .filter(|p| p.pool_id == pool_id)
            .map(|p| Entrant {
                user_id: p.user_id.clone(),
                username: p.username.clone(),
            })
            .collect();

        if (entrants.len() as u32) < pool.min_participants {
            // 人数不足：退还全部报名费并冲销佣金
            for entrant in &entrants {
                wallet
                    .refund_pool_entry(&entrant.user_id, pool_id, &pool.name, pool.entry_fee)
                    .await;
            }
            if !entrants.is_empty() {
                let commission = prize::commission_share(pool.entry_fee) * entrants.len() as u64;
                wallet.reverse_commission(pool_id, &pool.name, commission).await;
            }
            pool.total_prize = 0;
            pool.status = PoolStatus::Completed;
            pool.updated_at = now;
            let record = DrawRecord {
                pool_id: pool_id.to_string(),
                below_minimum: true,
                seed: None,
                entrants_hash: selection::entrants_hash(&entrants),
                proof: None,
                algorithm: SELECTION_ALGORITHM.to_string(),
                drawn_at: now,
            };
            store.draws.insert(pool_id.to_string(), record.clone());
            return Ok((pool.clone(), Vec::new(), record));
        }

        let seed = selection::generate_seed();
        let outcome = medeb_lottery_draw::run_draw(&entrants, pool.winner_count, pool.total_prize, &seed)?;

        let mut winners = Vec::with_capacity(outcome.winners.len());
        for drawn in &outcome.winners {
            wallet
                .credit_prize(&drawn.user_id, pool_id, &pool.name, drawn.prize_amount, drawn.position)
                .await;
            winners.push(Winner {
                pool_id: pool_id.to_string(),
                user_id: drawn.user_id.clone(),
                username: drawn.username.clone(),
                position: drawn.position,
                prize_amount: drawn.prize_amount,
                created_at: outcome.timestamp,
            });
        }
        pool.status = PoolStatus::Completed;
        pool.updated_at = now;
        let record = DrawRecord {
            pool_id: pool_id.to_string(),
            below_minimum: false,
            seed: Some(outcome.seed.clone()),
            entrants_hash: outcome.entrants_hash.clone(),
            proof: Some(outcome.proof.clone()),
            algorithm: outcome.algorithm.clone(),
            drawn_at: outcome.timestamp,
        };
        store.winners.extend(winners.iter().cloned());
        store.draws.insert(pool_id.to_string(), record.clone());
        Ok((pool.clone(), winners, record))
    }

    pub async fn get(&self, pool_id: &str) -> Option<(Pool, Vec<Participant>)> {
        let store = self.inner.read().await;
        let pool = store.pools.get(pool_id)?.clone();
        let participants = store
            .participants
            .iter()
            .filter(|p| p.pool_id == pool_id)
            .cloned()
            .collect();
        Some((pool, participants))
    }

    /// 活跃彩池，按开奖时间升序
    pub async fn list_active(&self) -> Vec<Pool> {
        let store = self.inner.read().await;
        let mut pools: Vec<Pool> = store
            .pools
            .values()
            .filter(|p| p.status == PoolStatus::Active)
            .cloned()
            .collect();
        pools.sort_by_key(|p| p.draw_at);
        pools
    }

    /// 全部彩池，按创建时间倒序（管理端）
    pub async fn list_all(&self) -> Vec<Pool> {
        let store = self.inner.read().await;
        store
            .order
            .iter()
            .rev()
            .filter_map(|id| store.pools.get(id).cloned())
            .collect()
    }

    pub async fn recent_pools(&self, limit: usize) -> Vec<Pool> {
        let mut pools = self.list_all().await;
        pools.truncate(limit);
        pools
    }

    pub async fn count_active(&self) -> usize {
        let store = self.inner.read().await;
        store
            .pools
            .values()
            .filter(|p| p.status == PoolStatus::Active)
            .count()
    }

    pub async fn winners_of_pool(&self, pool_id: &str) -> Vec<Winner> {
        let store = self.inner.read().await;
        let mut winners: Vec<Winner> = store
            .winners
            .iter()
            .filter(|w| w.pool_id == pool_id)
            .cloned()
            .collect();
        winners.sort_by_key(|w| w.position);
        winners
    }

    pub async fn draw_record(&self, pool_id: &str) -> Option<DrawRecord> {
        self.inner.read().await.draws.get(pool_id).cloned()
    }

    /// 用户的全部中奖记录，按时间倒序
    pub async fn wins_of(&self, user_id: &str) -> Vec<(Winner, Pool)> {
        let store = self.inner.read().await;
        let mut wins: Vec<(Winner, Pool)> = store
            .winners
            .iter()
            .filter(|w| w.user_id == user_id)
            .filter_map(|w| store.pools.get(&w.pool_id).map(|p| (w.clone(), p.clone())))
            .collect();
        wins.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
        wins
    }

    /// 用户的全部报名记录，按时间倒序
    pub async fn entries_of(&self, user_id: &str) -> Vec<(Participant, Pool)> {
        let store = self.inner.read().await;
        let mut entries: Vec<(Participant, Pool)> = store
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| store.pools.get(&p.pool_id).map(|pool| (p.clone(), pool.clone())))
            .collect();
        entries.sort_by(|a, b| b.0.joined_at.cmp(&a.0.joined_at));
        entries
    }

    /// 最近的中奖者（公示页），按时间倒序
    pub async fn recent_winners(&self, limit: usize) -> Vec<(Winner, Pool)> {
        let store = self.inner.read().await;
        let mut winners: Vec<(Winner, Pool)> = store
            .winners
            .iter()
            .filter_map(|w| store.pools.get(&w.pool_id).map(|p| (w.clone(), p.clone())))
            .collect();
        winners.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at).then(a.0.position.cmp(&b.0.position)));
        winners.truncate(limit);
        winners
    }

    /// 到期待开奖的彩池（后台扫描用）
    pub async fn due_for_draw(&self, now: u64) -> Vec<String> {
        let store = self.inner.read().await;
        store
            .pools
            .values()
            .filter(|p| p.status != PoolStatus::Completed && p.draw_at <= now)
            .map(|p| p.id.clone())
            .collect()
    }
}

fn validate_transition(from: &PoolStatus, to: &PoolStatus) -> Result<(), String> {
    use PoolStatus::*;
    let ok = matches!((from, to), (Active, Closed) | (Active, Completed) | (Closed, Completed));
    if ok {
        Ok(())
    } else {
        Err(format!("非法状态转换: {:?} -> {:?}", from, to))
    }
}
