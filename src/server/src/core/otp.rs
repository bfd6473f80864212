//! 一次性验证码
//!
//! 验证码有过期时间、重发间隔与失败次数上限。短信投递是外部系统，
//! 这里只负责生成与校验；开发环境可用 OTP_FIXED_CODE 固定验证码。

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::RwLock;

use crate::types::now_secs;

/// OTP服务配置
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// 验证码有效期（秒）
    pub ttl_secs: u64,
    /// 两次发送的最小间隔（秒）
    pub resend_secs: u64,
    /// 失败尝试上限，达到后验证码作废
    pub max_attempts: u32,
    /// 固定验证码（仅用于开发/测试环境）
    pub fixed_code: Option<String>,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            resend_secs: 60,
            max_attempts: 5,
            fixed_code: None,
        }
    }
}

#[derive(Debug, Clone)]
struct OtpRecord {
    code: String,
    issued_at: u64,
    expires_at: u64,
    attempts: u32,
}

#[derive(Clone)]
pub struct OtpService {
    inner: Arc<RwLock<HashMap<String, OtpRecord>>>,
    config: OtpConfig,
}

impl OtpService {
    pub fn new(config: OtpConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// 为手机号签发验证码，返回明文码（由调用方负责投递）
    pub async fn issue(&self, phone_number: &str) -> Result<String, String> {
        let now = now_secs();
        let mut map = self.inner.write().await;
        if let Some(existing) = map.get(phone_number) {
            if now < existing.issued_at + self.config.resend_secs {
                return Err("Please wait before requesting a new code".to_string());
            }
        }
        let code = match &self.config.fixed_code {
            Some(fixed) => fixed.clone(),
            None => format!("{}", rand::thread_rng().gen_range(100_000..1_000_000)),
        };
        map.insert(
            phone_number.to_string(),
            OtpRecord {
                code: code.clone(),
                issued_at: now,
                expires_at: now + self.config.ttl_secs,
                attempts: 0,
            },
        );
        Ok(code)
    }

    /// 校验验证码，成功后立即作废
    pub async fn verify(&self, phone_number: &str, code: &str) -> Result<(), String> {
        let now = now_secs();
        let mut map = self.inner.write().await;
        let record = match map.get(phone_number) {
            Some(r) => r.clone(),
            None => return Err("Invalid OTP".to_string()),
        };
        if now > record.expires_at {
            map.remove(phone_number);
            return Err("OTP has expired".to_string());
        }
        if record.attempts >= self.config.max_attempts {
            map.remove(phone_number);
            return Err("Too many failed attempts".to_string());
        }
        if record.code != code {
            if let Some(r) = map.get_mut(phone_number) {
                r.attempts += 1;
            }
            return Err("Invalid OTP".to_string());
        }
        map.remove(phone_number);
        Ok(())
    }
}
