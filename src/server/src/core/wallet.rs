//! 钱包与交易流水
//!
//! 余额表和流水账在同一把锁下变更，任何一条流水都对应一次余额变动。
//! 金额以分为单位，流水金额带符号（入账为正、出账为负）。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::now_secs;
use crate::utils::{fmt_etb, new_id};

/// 充值下限：10 ETB
pub const MIN_DEPOSIT: u64 = 1_000;
/// 充值上限：10,000 ETB
pub const MAX_DEPOSIT: u64 = 1_000_000;
/// 提现下限：50 ETB
pub const MIN_WITHDRAWAL: u64 = 5_000;
/// 平台佣金账户
pub const PLATFORM_ACCOUNT: &str = "platform";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Deposit,
    Withdrawal,
    PoolEntry,
    PrizeWin,
    Commission,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    /// 带符号金额（分）
    pub amount: i64,
    pub description: String,
    pub pool_id: Option<String>,
    pub status: TxStatus,
    pub created_at: u64,
}

#[derive(Default)]
struct WalletStore {
    balances: HashMap<String, u64>,
    ledger: Vec<Transaction>,
}

impl WalletStore {
    fn record(
        &mut self,
        user_id: &str,
        kind: TxKind,
        amount: i64,
        description: String,
        pool_id: Option<String>,
        status: TxStatus,
    ) -> Transaction {
        let txn = Transaction {
            id: new_id("txn"),
            user_id: user_id.to_string(),
            kind,
            amount,
            description,
            pool_id,
            status,
            created_at: now_secs(),
        };
        self.ledger.push(txn.clone());
        txn
    }
}

#[derive(Clone, Default)]
pub struct WalletService {
    inner: Arc<RwLock<WalletStore>>,
}

impl WalletService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn balance(&self, user_id: &str) -> u64 {
        let store = self.inner.read().await;
        *store.balances.get(user_id).unwrap_or(&0)
    }

    /// 充值（支付网关为外部系统，这里直接入账）
    pub async fn deposit(&self, user_id: &str, amount: u64) -> Result<Transaction, String> {
        if !(MIN_DEPOSIT..=MAX_DEPOSIT).contains(&amount) {
            return Err("Amount must be between 10 and 10,000 ETB".to_string());
        }
        let mut store = self.inner.write().await;
        let balance = store.balances.entry(user_id.to_string()).or_insert(0);
        *balance = balance.saturating_add(amount);
        Ok(store.record(
            user_id,
            TxKind::Deposit,
            amount as i64,
            "Wallet deposit".to_string(),
            None,
            TxStatus::Completed,
        ))
    }

    /// 提现：余额即时扣减，流水保持pending等待外部打款
    pub async fn withdraw(&self, user_id: &str, amount: u64) -> Result<Transaction, String> {
        if amount < MIN_WITHDRAWAL {
            return Err("Minimum withdrawal amount is 50 ETB".to_string());
        }
        let mut store = self.inner.write().await;
        let balance = store.balances.entry(user_id.to_string()).or_insert(0);
        if *balance < amount {
            return Err("Insufficient balance".to_string());
        }
        *balance -= amount;
        Ok(store.record(
            user_id,
            TxKind::Withdrawal,
            -(amount as i64),
            "Wallet withdrawal".to_string(),
            None,
            TxStatus::Pending,
        ))
    }

    /// 扣除彩池报名费
    pub async fn debit_pool_entry(
        &self,
        user_id: &str,
        pool_id: &str,
        pool_name: &str,
        entry_fee: u64,
    ) -> Result<Transaction, String> {
        let mut store = self.inner.write().await;
        let balance = store.balances.entry(user_id.to_string()).or_insert(0);
        if *balance < entry_fee {
            return Err("Insufficient wallet balance".to_string());
        }
        *balance -= entry_fee;
        Ok(store.record(
            user_id,
            TxKind::PoolEntry,
            -(entry_fee as i64),
            format!("Entry fee for {}", pool_name),
            Some(pool_id.to_string()),
            TxStatus::Completed,
        ))
    }

    /// 将报名费退回（彩池未达最低人数时的结算路径）
    pub async fn refund_pool_entry(
        &self,
        user_id: &str,
        pool_id: &str,
        pool_name: &str,
        entry_fee: u64,
    ) -> Transaction {
        let mut store = self.inner.write().await;
        let balance = store.balances.entry(user_id.to_string()).or_insert(0);
        *balance = balance.saturating_add(entry_fee);
        store.record(
            user_id,
            TxKind::PoolEntry,
            entry_fee as i64,
            format!("Refund for {}", pool_name),
            Some(pool_id.to_string()),
            TxStatus::Completed,
        )
    }

    /// 发放奖金
    pub async fn credit_prize(
        &self,
        user_id: &str,
        pool_id: &str,
        pool_name: &str,
        amount: u64,
        position: u32,
    ) -> Transaction {
        let mut store = self.inner.write().await;
        let balance = store.balances.entry(user_id.to_string()).or_insert(0);
        *balance = balance.saturating_add(amount);
        store.record(
            user_id,
            TxKind::PrizeWin,
            amount as i64,
            format!("Prize for position {} in {}", position, pool_name),
            Some(pool_id.to_string()),
            TxStatus::Completed,
        )
    }

    /// 记账平台佣金
    pub async fn book_commission(&self, pool_id: &str, pool_name: &str, amount: u64) -> Transaction {
        let mut store = self.inner.write().await;
        let balance = store.balances.entry(PLATFORM_ACCOUNT.to_string()).or_insert(0);
        *balance = balance.saturating_add(amount);
        store.record(
            PLATFORM_ACCOUNT,
            TxKind::Commission,
            amount as i64,
            format!("Commission from {}", pool_name),
            Some(pool_id.to_string()),
            TxStatus::Completed,
        )
    }

    /// 冲销平台佣金（退款结算时）
    pub async fn reverse_commission(&self, pool_id: &str, pool_name: &str, amount: u64) -> Transaction {
        let mut store = self.inner.write().await;
        let balance = store.balances.entry(PLATFORM_ACCOUNT.to_string()).or_insert(0);
        *balance = balance.saturating_sub(amount);
        store.record(
            PLATFORM_ACCOUNT,
            TxKind::Commission,
            -(amount as i64),
            format!("Commission reversal for {}", pool_name),
            Some(pool_id.to_string()),
            TxStatus::Completed,
        )
    }

    /// 用户流水，按时间倒序
    pub async fn transactions(&self, user_id: &str) -> Vec<Transaction> {
        let store = self.inner.read().await;
        let mut list: Vec<Transaction> = store
            .ledger
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        list.reverse();
        list
    }

    /// 平台净佣金收入（含冲销）
    pub async fn total_commission(&self) -> i64 {
        let store = self.inner.read().await;
        store
            .ledger
            .iter()
            .filter(|t| t.kind == TxKind::Commission)
            .map(|t| t.amount)
            .sum()
    }

    /// 已发放奖金总额
    pub async fn total_prizes_paid(&self) -> u64 {
        let store = self.inner.read().await;
        store
            .ledger
            .iter()
            .filter(|t| t.kind == TxKind::PrizeWin)
            .map(|t| t.amount.max(0) as u64)
            .sum()
    }
}

/// 充值成功的提示文案
pub fn deposit_message(amount: u64) -> String {
    format!("Successfully deposited {} ETB to your wallet", fmt_etb(amount))
}

/// 提现受理的提示文案
pub fn withdrawal_message(amount: u64) -> String {
    format!("Withdrawal of {} ETB is being processed", fmt_etb(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    #[tokio::test]
    async fn test_deposit_limits() {
        let wallet = WalletService::new();
        assert!(wallet.deposit("u1", 999).await.is_err());
        assert!(wallet.deposit("u1", 1_000_001).await.is_err());
        let txn = wallet.deposit("u1", MIN_DEPOSIT).await.unwrap();
        assert_eq!(txn.kind, TxKind::Deposit);
        assert_eq!(txn.status, TxStatus::Completed);
        assert_eq!(wallet.balance("u1").await, MIN_DEPOSIT);
    }

    #[tokio::test]
    async fn test_withdraw_limits_and_pending_status() {
        let wallet = WalletService::new();
        wallet.deposit("u1", 100_000).await.unwrap();

        let err = wallet.withdraw("u1", 4_999).await.err().unwrap();
        assert_eq!(err, "Minimum withdrawal amount is 50 ETB");

        let err = wallet.withdraw("u1", 200_000).await.err().unwrap();
        assert_eq!(err, "Insufficient balance");

        let txn = wallet.withdraw("u1", 30_000).await.unwrap();
        assert_eq!(txn.status, TxStatus::Pending);
        assert_eq!(txn.amount, -30_000);
        assert_eq!(wallet.balance("u1").await, 70_000);
    }

    #[tokio::test]
    async fn test_pool_entry_debit_and_refund() {
        let wallet = WalletService::new();
        wallet.deposit("u1", 10_000).await.unwrap();

        let err = wallet.debit_pool_entry("u2", "pool-1", "Daily Lucky 50", 5_000).await.err().unwrap();
        assert_eq!(err, "Insufficient wallet balance");

        wallet.debit_pool_entry("u1", "pool-1", "Daily Lucky 50", 5_000).await.unwrap();
        assert_eq!(wallet.balance("u1").await, 5_000);

        wallet.refund_pool_entry("u1", "pool-1", "Daily Lucky 50", 5_000).await;
        assert_eq!(wallet.balance("u1").await, 10_000);

        let txns = wallet.transactions("u1").await;
        assert_eq!(txns.len(), 3);
        // 倒序：最近的退款在最前
        assert_eq!(txns[0].amount, 5_000);
        assert_eq!(txns[1].amount, -5_000);
        assert!(txns.iter().all(|t| t.kind != TxKind::Withdrawal));
    }

    #[tokio::test]
    async fn test_commission_booking_and_reversal() {
        let wallet = WalletService::new();
        wallet.book_commission("pool-1", "Daily Lucky 50", 500).await;
        wallet.book_commission("pool-2", "Weekly Mega 100", 1_000).await;
        assert_eq!(wallet.balance(PLATFORM_ACCOUNT).await, 1_500);
        assert_eq!(wallet.total_commission().await, 1_500);

        wallet.reverse_commission("pool-1", "Daily Lucky 50", 500).await;
        assert_eq!(wallet.balance(PLATFORM_ACCOUNT).await, 1_000);
        assert_eq!(wallet.total_commission().await, 1_000);
    }

    #[tokio::test]
    async fn test_prize_credit_tracked_in_totals() {
        let wallet = WalletService::new();
        wallet.credit_prize("u1", "pool-1", "Daily Lucky 50", 45_000, 1).await;
        wallet.credit_prize("u2", "pool-1", "Daily Lucky 50", 27_000, 2).await;
        assert_eq!(wallet.total_prizes_paid().await, 72_000);
        assert_eq!(wallet.balance("u1").await, 45_000);
        let txns = wallet.transactions("u1").await;
        assert_eq!(txns[0].kind, TxKind::PrizeWin);
        assert!(txns[0].description.contains("position 1"));
    }

    #[tokio::test]
    async fn test_concurrent_deposits_stay_consistent() {
        let wallet = WalletService::new();
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let wallet = wallet.clone();
                tokio::spawn(async move { wallet.deposit("u1", 1_000).await })
            })
            .collect();
        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }
        // 余额与流水严格一致
        assert_eq!(wallet.balance("u1").await, 50_000);
        let txns = wallet.transactions("u1").await;
        assert_eq!(txns.len(), 50);
        let ledger_sum: i64 = txns.iter().map(|t| t.amount).sum();
        assert_eq!(ledger_sum, 50_000);
    }

    #[tokio::test]
    async fn test_messages() {
        assert_eq!(deposit_message(5_000), "Successfully deposited 50 ETB to your wallet");
        assert_eq!(withdrawal_message(12_550), "Withdrawal of 125.50 ETB is being processed");
    }
}
