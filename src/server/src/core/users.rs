//! 用户目录
//!
//! 手机号为唯一登录标识，未显式提供时默认用户名取手机号末8位数字。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::now_secs;
use crate::utils::new_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub phone_number: String,
    pub username: String,
    pub email: Option<String>,
    pub is_verified: bool,
    pub is_admin: bool,
    pub created_at: u64,
}

#[derive(Default)]
struct UserStore {
    by_id: HashMap<String, User>,
    // phone -> user_id
    phone_index: HashMap<String, String>,
    // 注册顺序，用于最近用户列表
    order: Vec<String>,
}

#[derive(Clone, Default)]
pub struct UserService {
    inner: Arc<RwLock<UserStore>>,
}

impl UserService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新用户，手机号必须唯一
    pub async fn register(
        &self,
        phone_number: &str,
        username: Option<String>,
        email: Option<String>,
    ) -> Result<User, String> {
        let phone = phone_number.trim().to_string();
        if phone.is_empty() {
            return Err("Phone number is required".to_string());
        }
        let mut store = self.inner.write().await;
        if store.phone_index.contains_key(&phone) {
            return Err("An account with this phone number already exists".to_string());
        }
        let username = match username.map(|u| u.trim().to_string()) {
            Some(u) if !u.is_empty() => u,
            _ => default_username(&phone),
        };
        let user = User {
            id: new_id("user"),
            phone_number: phone.clone(),
            username,
            email: email.filter(|e| !e.trim().is_empty()),
            is_verified: true,
            is_admin: false,
            created_at: now_secs(),
        };
        store.phone_index.insert(phone, user.id.clone());
        store.order.push(user.id.clone());
        store.by_id.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> Option<User> {
        let store = self.inner.read().await;
        store.by_id.get(user_id).cloned()
    }

    pub async fn find_by_phone(&self, phone_number: &str) -> Option<User> {
        let store = self.inner.read().await;
        let id = store.phone_index.get(phone_number.trim())?;
        store.by_id.get(id).cloned()
    }

    /// 全部用户，按注册时间倒序
    pub async fn list(&self) -> Vec<User> {
        let store = self.inner.read().await;
        store
            .order
            .iter()
            .rev()
            .filter_map(|id| store.by_id.get(id).cloned())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    /// 确保运营账号存在且具有管理员权限（启动时调用）
    pub async fn ensure_admin(&self, phone_number: &str) -> Result<User, String> {
        if let Some(existing) = self.find_by_phone(phone_number).await {
            if existing.is_admin {
                return Ok(existing);
            }
            let mut store = self.inner.write().await;
            let user = store
                .by_id
                .get_mut(&existing.id)
                .ok_or_else(|| "User not found".to_string())?;
            user.is_admin = true;
            return Ok(user.clone());
        }
        let registered = self.register(phone_number, Some("admin".to_string()), None).await?;
        let mut store = self.inner.write().await;
        let user = store
            .by_id
            .get_mut(&registered.id)
            .ok_or_else(|| "User not found".to_string())?;
        user.is_admin = true;
        Ok(user.clone())
    }
}

/// 默认用户名：手机号中数字的末8位
fn default_username(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(8);
    digits[start..].to_string()
}
