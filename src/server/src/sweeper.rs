//! 到期开奖扫描器
//!
//! 定期扫描到期未开奖的彩池并自动开奖。单个彩池开奖失败只记日志，
//! 不影响其余彩池。

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::state::ServerState;
use crate::types::now_secs;
use crate::utils::bump_metric;

pub struct DrawSweeper {
    state: Arc<ServerState>,
    check_interval: Duration,
}

impl DrawSweeper {
    pub fn new(state: Arc<ServerState>, check_interval_secs: u64) -> Self {
        Self {
            state,
            check_interval: Duration::from_secs(check_interval_secs),
        }
    }

    /// 启动后台扫描任务
    pub fn start(&self) {
        let state = Arc::clone(&self.state);
        let check_interval = self.check_interval;

        tokio::spawn(async move {
            loop {
                if let Err(e) = Self::sweep_due_pools(&state).await {
                    error!("扫描到期彩池失败: {}", e);
                }

                tokio::time::sleep(check_interval).await;
            }
        });
    }

    /// 对所有到期彩池执行开奖
    pub async fn sweep_due_pools(state: &Arc<ServerState>) -> Result<usize, String> {
        let due = state.pools.due_for_draw(now_secs()).await;
        let mut drawn = 0;
        for pool_id in due {
            match state.pools.draw(&state.wallet, &pool_id, false).await {
                Ok((pool, winners, record)) => {
                    drawn += 1;
                    bump_metric(state, "draws_total").await;
                    if record.below_minimum {
                        info!("彩池 {} 未达最低人数，已全额退款", pool.name);
                    } else {
                        info!("彩池 {} 开奖完成，中奖 {} 人", pool.name, winners.len());
                    }
                }
                Err(e) => {
                    warn!("彩池 {} 开奖失败: {}", pool_id, e);
                }
            }
        }
        Ok(drawn)
    }
}
