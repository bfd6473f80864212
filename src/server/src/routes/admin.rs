//! 管理路由：平台统计、用户与彩池管理、审计日志
//!
//! 所有端点要求管理员会话；非管理员一律 403。

use std::collections::HashMap;
use std::sync::Arc;

use warp::http::{HeaderMap, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::core::pools::{CreatePoolSpec, DrawRecord, Pool, Winner};
use crate::core::users::User;
use crate::state::ServerState;
use crate::types::{now_secs, AuditEvent, CreatePoolRequest};
use crate::utils::{bump_metric, push_audit, reply_err, reply_ok, session_user, with_state};

#[derive(Debug, serde::Serialize)]
struct RecentPoolRow {
    id: String,
    name: String,
    participants: u32,
    status: crate::core::pools::PoolStatus,
    created_at: u64,
}

#[derive(Debug, serde::Serialize)]
struct RecentUserRow {
    id: String,
    username: String,
    phone_number: String,
    created_at: u64,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminStatsResponse {
    total_users: usize,
    active_pools: usize,
    /// 平台净佣金收入（分）
    total_revenue: i64,
    total_prizes_paid: u64,
    active_sessions: usize,
    recent_pools: Vec<RecentPoolRow>,
    recent_users: Vec<RecentUserRow>,
}

#[derive(Debug, serde::Serialize)]
struct AdminUserRow {
    #[serde(flatten)]
    user: User,
    wallet_balance: u64,
    pools_joined: usize,
    total_winnings: u64,
}

#[derive(Debug, serde::Serialize)]
struct UsersResponse {
    users: Vec<AdminUserRow>,
}

#[derive(Debug, serde::Serialize)]
struct PoolsResponse {
    pools: Vec<Pool>,
}

#[derive(Debug, serde::Serialize)]
struct DrawResponse {
    pool: Pool,
    winners: Vec<Winner>,
    draw: DrawRecord,
}

#[derive(Debug, serde::Serialize)]
struct AuditListResponse {
    events: Vec<AuditEvent>,
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let stats_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "admin" / "stats")
            .and(warp::get())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                stats_impl(state, headers).await
            })
            .boxed()
    };

    let users_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "admin" / "users")
            .and(warp::get())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                users_impl(state, headers).await
            })
            .boxed()
    };

    let pools_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "admin" / "pools")
            .and(warp::get())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                pools_impl(state, headers).await
            })
            .boxed()
    };

    let create_pool_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "admin" / "pools")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|req: CreatePoolRequest, state: Arc<ServerState>, headers: HeaderMap| async move {
                create_pool_impl(req, state, headers).await
            })
            .boxed()
    };

    let close_pool_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "admin" / "pools" / String / "close")
            .and(warp::post())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|pool_id: String, state: Arc<ServerState>, headers: HeaderMap| async move {
                close_pool_impl(pool_id, state, headers).await
            })
            .boxed()
    };

    let draw_pool_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "admin" / "pools" / String / "draw")
            .and(warp::post())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|pool_id: String, state: Arc<ServerState>, headers: HeaderMap| async move {
                draw_pool_impl(pool_id, state, headers).await
            })
            .boxed()
    };

    let audit_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "admin" / "audit")
            .and(warp::get())
            .and(warp::query::<HashMap<String, String>>())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|q: HashMap<String, String>, state: Arc<ServerState>, headers: HeaderMap| async move {
                let limit = q.get("limit").and_then(|v| v.parse::<usize>().ok());
                audit_impl(limit, state, headers).await
            })
            .boxed()
    };

    stats_route
        .or(users_route)
        .or(pools_route)
        .or(create_pool_route)
        .or(close_pool_route)
        .or(draw_pool_route)
        .or(audit_route)
        .boxed()
}

async fn require_admin(
    state: &Arc<ServerState>,
    headers: &HeaderMap,
) -> Result<User, warp::reply::WithStatus<warp::reply::Json>> {
    match session_user(state, headers).await {
        None => Err(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
        Some(user) if !user.is_admin => {
            Err(reply_err(StatusCode::FORBIDDEN, "Admin access required"))
        }
        Some(user) => Ok(user),
    }
}

async fn stats_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    if let Err(resp) = require_admin(&state, &headers).await {
        return Ok(resp);
    }
    let recent_pools = state
        .pools
        .recent_pools(5)
        .await
        .into_iter()
        .map(|p| RecentPoolRow {
            id: p.id,
            name: p.name,
            participants: p.current_participants,
            status: p.status,
            created_at: p.created_at,
        })
        .collect();
    let mut users = state.users.list().await;
    users.truncate(5);
    let recent_users = users
        .into_iter()
        .map(|u| RecentUserRow {
            id: u.id,
            username: u.username,
            phone_number: u.phone_number,
            created_at: u.created_at,
        })
        .collect();
    Ok(reply_ok(AdminStatsResponse {
        total_users: state.users.count().await,
        active_pools: state.pools.count_active().await,
        total_revenue: state.wallet.total_commission().await,
        total_prizes_paid: state.wallet.total_prizes_paid().await,
        active_sessions: state.sessions.active_count().await,
        recent_pools,
        recent_users,
    }))
}

async fn users_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    if let Err(resp) = require_admin(&state, &headers).await {
        return Ok(resp);
    }
    let mut users = Vec::new();
    for user in state.users.list().await {
        let wallet_balance = state.wallet.balance(&user.id).await;
        let pools_joined = state.pools.entries_of(&user.id).await.len();
        let total_winnings = state
            .pools
            .wins_of(&user.id)
            .await
            .iter()
            .map(|(w, _)| w.prize_amount)
            .sum();
        users.push(AdminUserRow { user, wallet_balance, pools_joined, total_winnings });
    }
    Ok(reply_ok(UsersResponse { users }))
}

async fn pools_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    if let Err(resp) = require_admin(&state, &headers).await {
        return Ok(resp);
    }
    let pools = state.pools.list_all().await;
    Ok(reply_ok(PoolsResponse { pools }))
}

async fn create_pool_impl(
    req: CreatePoolRequest,
    state: Arc<ServerState>,
    headers: HeaderMap,
) -> Result<impl Reply, Rejection> {
    let admin = match require_admin(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    if req.draw_hours < 1 {
        return Ok(reply_err(
            StatusCode::BAD_REQUEST,
            "Draw time must be at least 1 hour from now",
        ));
    }
    let spec = CreatePoolSpec {
        name: req.name,
        description: req.description,
        entry_fee: req.entry_fee,
        min_participants: req.min_participants,
        max_participants: req.max_participants,
        winner_count: req.winner_count,
        draw_at: now_secs() + req.draw_hours * 3_600,
    };
    let pool = match state.pools.create(&admin.id, spec).await {
        Ok(pool) => pool,
        Err(e) => return Ok(reply_err(StatusCode::BAD_REQUEST, &e)),
    };
    push_audit(
        &state,
        "pool_create".to_string(),
        admin.id,
        format!("pool={} name={}", pool.id, pool.name),
    )
    .await;
    Ok(reply_ok(pool))
}

async fn close_pool_impl(
    pool_id: String,
    state: Arc<ServerState>,
    headers: HeaderMap,
) -> Result<impl Reply, Rejection> {
    let admin = match require_admin(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let pool = match state.pools.close(&pool_id).await {
        Ok(pool) => pool,
        Err(e) if e == "Pool not found" => return Ok(reply_err(StatusCode::NOT_FOUND, &e)),
        Err(e) => return Ok(reply_err(StatusCode::BAD_REQUEST, &e)),
    };
    push_audit(&state, "pool_close".to_string(), admin.id, format!("pool={}", pool_id)).await;
    Ok(reply_ok(pool))
}

async fn draw_pool_impl(
    pool_id: String,
    state: Arc<ServerState>,
    headers: HeaderMap,
) -> Result<impl Reply, Rejection> {
    let admin = match require_admin(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    // 管理端开奖不受开奖时间约束
    let (pool, winners, draw) = match state.pools.draw(&state.wallet, &pool_id, true).await {
        Ok(done) => done,
        Err(e) if e == "Pool not found" => return Ok(reply_err(StatusCode::NOT_FOUND, &e)),
        Err(e) => return Ok(reply_err(StatusCode::BAD_REQUEST, &e)),
    };
    bump_metric(&state, "draws_total").await;
    push_audit(
        &state,
        "pool_draw".to_string(),
        admin.id,
        format!("pool={} winners={} below_minimum={}", pool_id, winners.len(), draw.below_minimum),
    )
    .await;
    Ok(reply_ok(DrawResponse { pool, winners, draw }))
}

async fn audit_impl(
    limit: Option<usize>,
    state: Arc<ServerState>,
    headers: HeaderMap,
) -> Result<impl Reply, Rejection> {
    if let Err(resp) = require_admin(&state, &headers).await {
        return Ok(resp);
    }
    let logs = state.audit_logs.read().await;
    let n = limit.unwrap_or(100);
    let start = logs.len().saturating_sub(n);
    let events = logs[start..].to_vec();
    Ok(reply_ok(AuditListResponse { events }))
}
