use std::collections::HashMap;
use std::sync::Arc;

use redis::aio::ConnectionManager as RedisConnManager;
use tokio::sync::RwLock;

use crate::core::otp::{OtpConfig, OtpService};
use crate::core::pools::PoolService;
use crate::core::sessions::SessionService;
use crate::core::users::UserService;
use crate::core::wallet::WalletService;
use crate::types::AuditEvent;

/// 服务器状态：各业务服务加共享的审计与指标存储
#[derive(Clone)]
pub struct ServerState {
    pub(crate) users: UserService,
    pub(crate) otp: OtpService,
    pub(crate) sessions: SessionService,
    pub(crate) wallet: WalletService,
    pub(crate) pools: PoolService,
    // 管理操作审计日志
    pub(crate) audit_logs: Arc<RwLock<Vec<AuditEvent>>>,
    // 简单运行时状态指标
    pub(crate) state_metrics: Arc<RwLock<HashMap<String, u64>>>,
    // 可选：Redis缓存连接
    pub(crate) redis: Option<Arc<RwLock<RedisConnManager>>>,
}

impl ServerState {
    /// 创建新的服务器状态实例，配置取自环境变量
    pub async fn new() -> Result<Self, String> {
        // 可选初始化Redis
        let redis = if let Ok(url) = std::env::var("REDIS_URL") {
            match redis::Client::open(url) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(manager) => Some(Arc::new(RwLock::new(manager))),
                    Err(e) => {
                        tracing::error!("初始化 Redis 失败: {}", e);
                        None
                    }
                },
                Err(e) => {
                    tracing::error!("创建 Redis 客户端失败: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let otp_config = OtpConfig {
            ttl_secs: env_u64("OTP_TTL_SECS", 300),
            resend_secs: env_u64("OTP_RESEND_SECS", 60),
            fixed_code: std::env::var("OTP_FIXED_CODE")
                .ok()
                .filter(|code| !code.trim().is_empty()),
            ..OtpConfig::default()
        };
        let session_ttl = env_u64("SESSION_TTL_SECS", 7 * 24 * 3_600);

        let mut state = Self::with_config(otp_config, session_ttl);
        state.redis = redis;
        Ok(state)
    }

    /// 从显式配置构建，不读环境变量也不连接Redis
    pub fn with_config(otp_config: OtpConfig, session_ttl_secs: u64) -> Self {
        ServerState {
            users: UserService::new(),
            otp: OtpService::new(otp_config),
            sessions: SessionService::new(session_ttl_secs),
            wallet: WalletService::new(),
            pools: PoolService::new(),
            audit_logs: Arc::new(RwLock::new(Vec::new())),
            state_metrics: Arc::new(RwLock::new(HashMap::new())),
            redis: None,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .unwrap_or_default()
        .parse::<u64>()
        .unwrap_or(default)
}
