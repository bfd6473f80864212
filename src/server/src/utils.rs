use std::convert::Infallible;
use std::sync::Arc;

use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use warp::http::{HeaderMap, StatusCode};
use warp::Filter;

use crate::core::users::User;
use crate::state::ServerState;
use crate::types::{header_token, now_secs, ApiResponse};

pub fn with_state(state: Arc<ServerState>) -> impl Filter<Extract = (Arc<ServerState>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&state))
}

pub async fn push_audit(state: &Arc<ServerState>, action: String, actor: String, details: String) {
    let mut audit_log = state.audit_logs.write().await;
    audit_log.push(crate::types::AuditEvent {
        timestamp: now_secs(),
        action,
        actor,
        details,
    });
}

pub async fn bump_metric(state: &Arc<ServerState>, key: &str) {
    let mut sm = state.state_metrics.write().await;
    let v = sm.entry(key.to_string()).or_insert(0);
    *v = v.saturating_add(1);
}

/// 解析请求头中的会话令牌，返回对应的用户
pub async fn session_user(state: &Arc<ServerState>, headers: &HeaderMap) -> Option<User> {
    let token = header_token(headers)?;
    let user_id = state.sessions.resolve(&token).await?;
    state.users.get(&user_id).await
}

/// 生成带前缀的唯一ID：随机32字节 + 时间戳做哈希后截断
pub fn new_id(prefix: &str) -> String {
    let mut rng_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut rng_bytes);
    let mut hasher = Sha256::new();
    hasher.update(rng_bytes);
    hasher.update(now_secs().to_le_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(12);
    format!("{}-{}", prefix, digest)
}

/// 以ETB为单位格式化分金额（整数ETB省略小数）
pub fn fmt_etb(santim: u64) -> String {
    if santim % 100 == 0 {
        format!("{}", santim / 100)
    } else {
        format!("{}.{:02}", santim / 100, santim % 100)
    }
}

pub fn reply_ok<T: Serialize>(data: T) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ApiResponse::success(data)), StatusCode::OK)
}

pub fn reply_err(code: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ApiResponse::<()>::error(message.to_string())), code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_shape_and_uniqueness() {
        let a = new_id("pool");
        let b = new_id("pool");
        assert!(a.starts_with("pool-"));
        assert_eq!(a.len(), "pool-".len() + 12);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fmt_etb() {
        assert_eq!(fmt_etb(5_000), "50");
        assert_eq!(fmt_etb(1_000_000), "10000");
        assert_eq!(fmt_etb(12_345), "123.45");
        assert_eq!(fmt_etb(105), "1.05");
    }
}
