use serde::{Deserialize, Serialize};
use warp::http::HeaderMap;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    pub fn error(err: String) -> Self {
        Self { success: false, data: None, error: Some(err) }
    }
}

// 认证相关类型
#[derive(Debug, Serialize, Deserialize)]
pub struct SendOtpRequest {
    pub phone_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub otp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub phone_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRegistrationRequest {
    pub phone_number: String,
    pub otp: String,
    pub username: Option<String>,
    pub email: Option<String>,
}

// 钱包相关类型
#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub amount: u64,
}

// 彩池管理相关类型
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePoolRequest {
    pub name: String,
    pub description: String,
    /// 报名费（单位：分）
    pub entry_fee: u64,
    pub min_participants: u32,
    pub max_participants: u32,
    pub winner_count: u32,
    /// 距开奖的小时数
    pub draw_hours: u64,
}

// 通用消息响应
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// 审计事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: u64,
    pub action: String,
    pub actor: String,
    pub details: String,
}

// 工具函数
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// 从请求头提取会话令牌
pub fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-session-token")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
