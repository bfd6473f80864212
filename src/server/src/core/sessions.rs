//! 会话令牌
//!
//! 登录后签发不透明令牌，请求经 x-session-token 头携带。
//! 过期在解析时惰性清理。

use std::collections::HashMap;
use std::sync::Arc;

use rand::RngCore;
use tokio::sync::RwLock;

use crate::types::now_secs;

#[derive(Debug, Clone)]
struct SessionRecord {
    user_id: String,
    expires_at: u64,
}

#[derive(Clone)]
pub struct SessionService {
    inner: Arc<RwLock<HashMap<String, SessionRecord>>>,
    ttl_secs: u64,
}

impl SessionService {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl_secs,
        }
    }

    /// 为用户创建会话，返回令牌
    pub async fn create(&self, user_id: &str) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let mut map = self.inner.write().await;
        map.insert(
            token.clone(),
            SessionRecord {
                user_id: user_id.to_string(),
                expires_at: now_secs() + self.ttl_secs,
            },
        );
        token
    }

    /// 解析令牌对应的用户ID，过期令牌随手清理
    pub async fn resolve(&self, token: &str) -> Option<String> {
        let mut map = self.inner.write().await;
        let record = map.get(token)?.clone();
        if now_secs() > record.expires_at {
            map.remove(token);
            return None;
        }
        Some(record.user_id)
    }

    pub async fn destroy(&self, token: &str) -> bool {
        self.inner.write().await.remove(token).is_some()
    }

    pub async fn active_count(&self) -> usize {
        let now = now_secs();
        let map = self.inner.read().await;
        map.values().filter(|r| now <= r.expires_at).count()
    }
}
