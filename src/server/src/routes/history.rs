//! 历史记录路由：我的中奖与我的参与

use std::collections::HashMap;
use std::sync::Arc;

use warp::http::{HeaderMap, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::core::pools::PoolStatus;
use crate::state::ServerState;
use crate::utils::{reply_err, reply_ok, session_user, with_state};

#[derive(Debug, serde::Serialize)]
struct WinRow {
    pool_id: String,
    pool_name: String,
    position: u32,
    prize_amount: u64,
    participants_count: u32,
    draw_date: u64,
}

#[derive(Debug, serde::Serialize)]
struct EntryRow {
    pool_id: String,
    pool_name: String,
    entry_fee: u64,
    joined_at: u64,
    status: PoolStatus,
    /// won / lost / pending / refunded
    result: &'static str,
    prize_amount: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
struct WinsResponse {
    wins: Vec<WinRow>,
}

#[derive(Debug, serde::Serialize)]
struct EntriesResponse {
    pools: Vec<EntryRow>,
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let wins_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "history" / "wins")
            .and(warp::get())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                wins_impl(state, headers).await
            })
            .boxed()
    };

    let entries_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "history" / "pools")
            .and(warp::get())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                entries_impl(state, headers).await
            })
            .boxed()
    };

    wins_route.or(entries_route).boxed()
}

async fn wins_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    let wins = state
        .pools
        .wins_of(&user.id)
        .await
        .into_iter()
        .map(|(winner, pool)| WinRow {
            pool_id: pool.id,
            pool_name: pool.name,
            position: winner.position,
            prize_amount: winner.prize_amount,
            participants_count: pool.current_participants,
            draw_date: winner.created_at,
        })
        .collect();
    Ok(reply_ok(WinsResponse { wins }))
}

async fn entries_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    // pool_id -> 奖金，用于标记已中奖的参与记录
    let prize_by_pool: HashMap<String, u64> = state
        .pools
        .wins_of(&user.id)
        .await
        .into_iter()
        .map(|(winner, _)| (winner.pool_id, winner.prize_amount))
        .collect();
    let mut pools = Vec::new();
    for (entry, pool) in state.pools.entries_of(&user.id).await {
        let prize = prize_by_pool.get(&pool.id).copied();
        let result = if pool.status != PoolStatus::Completed {
            "pending"
        } else if prize.is_some() {
            "won"
        } else if matches!(state.pools.draw_record(&pool.id).await, Some(r) if r.below_minimum) {
            // 人数不足的结算：报名费已退回
            "refunded"
        } else {
            "lost"
        };
        pools.push(EntryRow {
            pool_id: pool.id,
            pool_name: pool.name,
            entry_fee: pool.entry_fee,
            joined_at: entry.joined_at,
            status: pool.status,
            result,
            prize_amount: prize,
        });
    }
    Ok(reply_ok(EntriesResponse { pools }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::otp::OtpConfig;
    use crate::core::pools::CreatePoolSpec;
    use crate::types::now_secs;
    use warp::Reply;

    #[tokio::test]
    async fn test_history_after_draw() {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let pool = state
            .pools
            .create(
                "admin",
                CreatePoolSpec {
                    name: "Weekly Mega 100".to_string(),
                    description: "Weekly draw".to_string(),
                    entry_fee: 10_000,
                    min_participants: 2,
                    max_participants: 10,
                    winner_count: 1,
                    draw_at: now_secs() + 3_600,
                },
            )
            .await
            .unwrap();
        let mut headers_of = Vec::new();
        for i in 0..3 {
            let user = state
                .users
                .register(&format!("+25191100010{}", i), None, None)
                .await
                .unwrap();
            state.wallet.deposit(&user.id, 50_000).await.unwrap();
            state.pools.join(&state.wallet, &pool.id, &user).await.unwrap();
            let token = state.sessions.create(&user.id).await;
            let mut headers = HeaderMap::new();
            headers.insert("x-session-token", token.parse().unwrap());
            headers_of.push(headers);
        }
        state.pools.draw(&state.wallet, &pool.id, true).await.unwrap();

        // 每个参与者都有一条参与记录，且恰有一人中奖
        let mut winners = 0;
        for headers in &headers_of {
            let resp = entries_impl(Arc::clone(&state), headers.clone())
                .await
                .unwrap()
                .into_response();
            assert_eq!(resp.status(), StatusCode::OK);
            let body = warp::hyper::body::to_bytes(resp.into_body()).await.unwrap();
            let entries: serde_json::Value = serde_json::from_slice(&body).unwrap();
            let row = &entries["data"]["pools"][0];
            assert!(row["result"] == "won" || row["result"] == "lost");

            let wins_resp = wins_impl(Arc::clone(&state), headers.clone())
                .await
                .unwrap()
                .into_response();
            assert_eq!(wins_resp.status(), StatusCode::OK);
            let body = warp::hyper::body::to_bytes(wins_resp.into_body()).await.unwrap();
            let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
            let wins = parsed["data"]["wins"].as_array().unwrap();
            if !wins.is_empty() {
                assert_eq!(wins[0]["participants_count"], serde_json::json!(3));
            }
            winners += wins.len();
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_refunded_pool_marked_in_history() {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let pool = state
            .pools
            .create(
                "admin",
                CreatePoolSpec {
                    name: "Premium 200".to_string(),
                    description: "Needs eight players".to_string(),
                    entry_fee: 20_000,
                    min_participants: 8,
                    max_participants: 30,
                    winner_count: 2,
                    draw_at: now_secs() + 3_600,
                },
            )
            .await
            .unwrap();
        let user = state.users.register("+251911000110", None, None).await.unwrap();
        state.wallet.deposit(&user.id, 30_000).await.unwrap();
        state.pools.join(&state.wallet, &pool.id, &user).await.unwrap();
        let token = state.sessions.create(&user.id).await;
        let mut headers = HeaderMap::new();
        headers.insert("x-session-token", token.parse().unwrap());

        // 开奖前：pending
        let resp = entries_impl(Arc::clone(&state), headers.clone())
            .await
            .unwrap()
            .into_response();
        let body = warp::hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["data"]["pools"][0]["result"], serde_json::json!("pending"));

        // 人数不足的结算后：refunded
        state.pools.draw(&state.wallet, &pool.id, true).await.unwrap();
        let resp = entries_impl(Arc::clone(&state), headers).await.unwrap().into_response();
        let body = warp::hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["data"]["pools"][0]["result"], serde_json::json!("refunded"));
        assert_eq!(state.wallet.balance(&user.id).await, 30_000);
    }

    #[tokio::test]
    async fn test_history_requires_session() {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let resp = wins_impl(state, HeaderMap::new()).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
