//! 彩池路由：浏览、详情与报名

use std::sync::Arc;

use warp::http::{HeaderMap, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::core::pools::{Participant, Pool};
use crate::state::ServerState;
use crate::utils::{bump_metric, push_audit, reply_err, reply_ok, session_user, with_state};

#[derive(Debug, serde::Serialize)]
struct PoolListResponse {
    pools: Vec<Pool>,
}

#[derive(Debug, serde::Serialize)]
struct PoolDetailResponse {
    pool: Pool,
    participants: Vec<Participant>,
}

#[derive(Debug, serde::Serialize)]
struct JoinResponse {
    pool: Pool,
    message: String,
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let list_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "pools")
            .and(warp::get())
            .and(with_state(state))
            .and_then(|state: Arc<ServerState>| async move { list_impl(state).await })
            .boxed()
    };

    let detail_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "pools" / String)
            .and(warp::get())
            .and(with_state(state))
            .and_then(|pool_id: String, state: Arc<ServerState>| async move {
                detail_impl(pool_id, state).await
            })
            .boxed()
    };

    let join_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "pools" / String / "join")
            .and(warp::post())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|pool_id: String, state: Arc<ServerState>, headers: HeaderMap| async move {
                join_impl(pool_id, state, headers).await
            })
            .boxed()
    };

    list_route.or(detail_route).or(join_route).boxed()
}

/// 开放中的彩池，按开奖时间排序
async fn list_impl(state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    let pools = state.pools.list_active().await;
    Ok(reply_ok(PoolListResponse { pools }))
}

async fn detail_impl(pool_id: String, state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    match state.pools.get(&pool_id).await {
        Some((pool, participants)) => Ok(reply_ok(PoolDetailResponse { pool, participants })),
        None => Ok(reply_err(StatusCode::NOT_FOUND, "Pool not found")),
    }
}

async fn join_impl(
    pool_id: String,
    state: Arc<ServerState>,
    headers: HeaderMap,
) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    match state.pools.join(&state.wallet, &pool_id, &user).await {
        Ok((pool, message)) => {
            bump_metric(&state, "pool_joins_total").await;
            push_audit(&state, "pool_join".to_string(), user.id, format!("pool={}", pool_id)).await;
            Ok(reply_ok(JoinResponse { pool, message }))
        }
        Err(e) if e == "Pool not found" => Ok(reply_err(StatusCode::NOT_FOUND, &e)),
        Err(e) => Ok(reply_err(StatusCode::BAD_REQUEST, &e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::otp::OtpConfig;
    use crate::core::pools::CreatePoolSpec;
    use crate::types::now_secs;
    use warp::Reply;

    async fn seeded_state() -> (Arc<ServerState>, String, HeaderMap) {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let pool = state
            .pools
            .create(
                "admin",
                CreatePoolSpec {
                    name: "Daily Lucky 50".to_string(),
                    description: "Daily draw".to_string(),
                    entry_fee: 5_000,
                    min_participants: 2,
                    max_participants: 20,
                    winner_count: 1,
                    draw_at: now_secs() + 3_600,
                },
            )
            .await
            .unwrap();
        let user = state.users.register("+251911000003", None, None).await.unwrap();
        state.wallet.deposit(&user.id, 20_000).await.unwrap();
        let token = state.sessions.create(&user.id).await;
        let mut headers = HeaderMap::new();
        headers.insert("x-session-token", token.parse().unwrap());
        (state, pool.id, headers)
    }

    #[tokio::test]
    async fn test_join_and_detail() {
        let (state, pool_id, headers) = seeded_state().await;
        let resp = join_impl(pool_id.clone(), Arc::clone(&state), headers.clone())
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        // 重复报名被拒
        let resp = join_impl(pool_id.clone(), Arc::clone(&state), headers)
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = detail_impl(pool_id, state).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_join_requires_session() {
        let (state, pool_id, _) = seeded_state().await;
        let resp = join_impl(pool_id, state, HeaderMap::new()).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_detail_unknown_pool() {
        let (state, _, _) = seeded_state().await;
        let resp = detail_impl("pool-missing".to_string(), state)
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
