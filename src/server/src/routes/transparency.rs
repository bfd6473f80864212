//! 公示路由：中奖名单与开奖验证
//!
//! 开奖结果全部可复核：公示种子、参与者集合哈希与选取证明，
//! 任何人都能离线重放选取过程。中奖名单走Redis缓存（可选）。

use std::sync::Arc;

use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use medeb_lottery_draw::prize;
use medeb_lottery_draw::selection;
use medeb_lottery_draw::types::{DrawOutcome, DrawnWinner, Entrant};

use crate::core::pools::Pool;
use crate::state::ServerState;
use crate::utils::{reply_err, reply_ok, with_state};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PublicWinnerRow {
    pool_id: String,
    pool_name: String,
    username: String,
    position: u32,
    prize_amount: u64,
    draw_date: u64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PublicWinnersResponse {
    winners: Vec<PublicWinnerRow>,
}

#[derive(Debug, serde::Serialize)]
struct TransparencyWinnerRow {
    user_hash: String,
    username: String,
    position: u32,
    prize_amount: u64,
}

#[derive(Debug, serde::Serialize)]
struct DrawDisclosure {
    below_minimum: bool,
    seed: Option<String>,
    entrants_hash: String,
    proof: Option<String>,
    algorithm: String,
    drawn_at: u64,
}

#[derive(Debug, serde::Serialize)]
struct VerificationCheck {
    name: String,
    passed: bool,
}

#[derive(Debug, serde::Serialize)]
struct VerificationReport {
    is_verified: bool,
    checks: Vec<VerificationCheck>,
}

#[derive(Debug, serde::Serialize)]
struct TransparencyResponse {
    pool: Pool,
    draw: DrawDisclosure,
    participant_count: usize,
    winners: Vec<TransparencyWinnerRow>,
    verification: VerificationReport,
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let winners_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "public" / "winners")
            .and(warp::get())
            .and(with_state(state))
            .and_then(|state: Arc<ServerState>| async move { public_winners_impl(state).await })
            .boxed()
    };

    let transparency_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "transparency" / String)
            .and(warp::get())
            .and(with_state(state))
            .and_then(|pool_id: String, state: Arc<ServerState>| async move {
                transparency_impl(pool_id, state).await
            })
            .boxed()
    };

    winners_route.or(transparency_route).boxed()
}

/// 最近中奖名单（无须登录）
async fn public_winners_impl(state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    // 尝试从Redis读取
    if let Some(redis_lock) = &state.redis {
        let mut conn = redis_lock.write().await;
        if let Ok(s) = conn.get::<_, String>("public:winners").await {
            if let Ok(cached) = serde_json::from_str::<PublicWinnersResponse>(&s) {
                return Ok(reply_ok(cached));
            }
        }
    }
    let winners: Vec<PublicWinnerRow> = state
        .pools
        .recent_winners(50)
        .await
        .into_iter()
        .map(|(winner, pool)| PublicWinnerRow {
            pool_id: pool.id,
            pool_name: pool.name,
            username: winner.username,
            position: winner.position,
            prize_amount: winner.prize_amount,
            draw_date: winner.created_at,
        })
        .collect();
    let payload = PublicWinnersResponse { winners };
    // 写入Redis（可选）
    if let Some(redis_lock) = &state.redis {
        let mut conn = redis_lock.write().await;
        let _: Result<(), _> = conn
            .set_ex(
                "public:winners",
                serde_json::to_string(&payload).unwrap_or_default(),
                std::env::var("PUBLIC_WINNERS_CACHE_TTL")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60),
            )
            .await;
    }
    Ok(reply_ok(payload))
}

/// 单个彩池的开奖公示与逐项复核
async fn transparency_impl(pool_id: String, state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    let (pool, participants) = match state.pools.get(&pool_id).await {
        Some(found) => found,
        None => return Ok(reply_err(StatusCode::NOT_FOUND, "Pool not found")),
    };
    let record = match state.pools.draw_record(&pool_id).await {
        Some(record) => record,
        None => return Ok(reply_err(StatusCode::BAD_REQUEST, "Pool has not been drawn yet")),
    };
    let entrants: Vec<Entrant> = participants
        .iter()
        .map(|p| Entrant { user_id: p.user_id.clone(), username: p.username.clone() })
        .collect();
    let winners = state.pools.winners_of_pool(&pool_id).await;

    let mut checks = Vec::new();
    let entrants_ok = selection::entrants_hash(&entrants) == record.entrants_hash;
    checks.push(VerificationCheck { name: "entrants_hash".to_string(), passed: entrants_ok });

    let is_verified = if record.below_minimum {
        // 退款结算没有选取过程，只需集合哈希吻合
        entrants_ok
    } else {
        let outcome = DrawOutcome {
            winners: winners
                .iter()
                .map(|w| DrawnWinner {
                    user_id: w.user_id.clone(),
                    username: w.username.clone(),
                    position: w.position,
                    prize_amount: w.prize_amount,
                })
                .collect(),
            seed: record.seed.clone().unwrap_or_default(),
            entrants_hash: record.entrants_hash.clone(),
            proof: record.proof.clone().unwrap_or_default(),
            algorithm: record.algorithm.clone(),
            timestamp: record.drawn_at,
        };
        let selection_ok = match selection::select(&entrants, pool.winner_count, &outcome.seed) {
            Ok(replay) => {
                replay.len() == outcome.winners.len()
                    && replay
                        .iter()
                        .zip(outcome.winners.iter())
                        .all(|(a, b)| a.user_id == b.user_id && a.position == b.position)
            }
            Err(_) => false,
        };
        checks.push(VerificationCheck { name: "winner_selection".to_string(), passed: selection_ok });

        let total: u64 = outcome.winners.iter().map(|w| w.prize_amount).sum();
        let prizes_ok = match prize::distribute(total, outcome.winners.len() as u32) {
            Ok(expected) => {
                outcome.winners.iter().map(|w| w.prize_amount).collect::<Vec<u64>>() == expected
            }
            Err(_) => false,
        };
        checks.push(VerificationCheck { name: "prize_distribution".to_string(), passed: prizes_ok });

        let proof_ok =
            selection::generate_proof(&outcome.seed, &outcome.entrants_hash, &outcome.winners)
                == outcome.proof;
        checks.push(VerificationCheck { name: "proof".to_string(), passed: proof_ok });

        medeb_lottery_draw::verify(&outcome, &entrants)
    };

    let winners = winners
        .into_iter()
        .map(|w| TransparencyWinnerRow {
            user_hash: user_hash(&w.user_id),
            username: w.username,
            position: w.position,
            prize_amount: w.prize_amount,
        })
        .collect();
    Ok(reply_ok(TransparencyResponse {
        pool,
        draw: DrawDisclosure {
            below_minimum: record.below_minimum,
            seed: record.seed,
            entrants_hash: record.entrants_hash,
            proof: record.proof,
            algorithm: record.algorithm,
            drawn_at: record.drawn_at,
        },
        participant_count: participants.len(),
        winners,
        verification: VerificationReport { is_verified, checks },
    }))
}

/// 公示页不暴露用户ID，只给出哈希指纹
fn user_hash(user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(16);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::otp::OtpConfig;
    use crate::core::pools::CreatePoolSpec;
    use crate::types::now_secs;
    use warp::Reply;

    async fn drawn_pool_state() -> (Arc<ServerState>, String) {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let pool = state
            .pools
            .create(
                "admin",
                CreatePoolSpec {
                    name: "Premium 200".to_string(),
                    description: "Premium draw".to_string(),
                    entry_fee: 20_000,
                    min_participants: 2,
                    max_participants: 30,
                    winner_count: 2,
                    draw_at: now_secs() + 3_600,
                },
            )
            .await
            .unwrap();
        for i in 0..5 {
            let user = state
                .users
                .register(&format!("+25191100020{}", i), None, None)
                .await
                .unwrap();
            state.wallet.deposit(&user.id, 50_000).await.unwrap();
            state.pools.join(&state.wallet, &pool.id, &user).await.unwrap();
        }
        state.pools.draw(&state.wallet, &pool.id, true).await.unwrap();
        (state, pool.id)
    }

    #[tokio::test]
    async fn test_transparency_verifies_genuine_draw() {
        let (state, pool_id) = drawn_pool_state().await;
        let resp = transparency_impl(pool_id, state).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = warp::hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["data"]["verification"]["is_verified"], serde_json::json!(true));
        let checks = parsed["data"]["verification"]["checks"].as_array().unwrap();
        assert_eq!(checks.len(), 4);
        assert!(checks.iter().all(|c| c["passed"] == serde_json::json!(true)));
        // 公示不泄露用户ID
        assert!(parsed["data"]["winners"][0]["user_id"].is_null());
        assert_eq!(parsed["data"]["winners"][0]["user_hash"].as_str().unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_transparency_unknown_and_undrawn() {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let resp = transparency_impl("pool-missing".to_string(), Arc::clone(&state))
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let pool = state
            .pools
            .create(
                "admin",
                CreatePoolSpec {
                    name: "Premium 200".to_string(),
                    description: "Premium draw".to_string(),
                    entry_fee: 20_000,
                    min_participants: 2,
                    max_participants: 30,
                    winner_count: 2,
                    draw_at: now_secs() + 3_600,
                },
            )
            .await
            .unwrap();
        let resp = transparency_impl(pool.id, state).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_public_winners_without_redis() {
        let (state, _) = drawn_pool_state().await;
        let resp = public_winners_impl(state).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = warp::hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["data"]["winners"].as_array().unwrap().len(), 2);
    }
}
