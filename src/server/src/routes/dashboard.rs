//! 仪表盘路由：当前用户的参与统计
//!
//! 响应字段用 camelCase，直接供前端渲染。

use std::sync::Arc;

use warp::http::{HeaderMap, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::state::ServerState;
use crate::utils::{reply_err, reply_ok, session_user, with_state};

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardStatsResponse {
    total_winnings: u64,
    pools_joined: usize,
    pools_won: usize,
    /// 中奖率（百分比）
    win_rate: f64,
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let stats_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "dashboard" / "stats")
            .and(warp::get())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                stats_impl(state, headers).await
            })
            .boxed()
    };

    stats_route.boxed()
}

async fn stats_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    let wins = state.pools.wins_of(&user.id).await;
    let total_winnings: u64 = wins.iter().map(|(w, _)| w.prize_amount).sum();
    let pools_won = wins.len();
    let pools_joined = state.pools.entries_of(&user.id).await.len();
    let win_rate = if pools_joined == 0 {
        0.0
    } else {
        pools_won as f64 * 100.0 / pools_joined as f64
    };
    Ok(reply_ok(DashboardStatsResponse {
        total_winnings,
        pools_joined,
        pools_won,
        win_rate,
    }))
}
