//! 启动期初始化：管理员账户与演示彩池

use std::sync::Arc;

use tracing::info;

use crate::core::pools::CreatePoolSpec;
use crate::core::users::User;
use crate::state::ServerState;
use crate::types::now_secs;
use crate::utils::push_audit;

/// 确保管理员账户存在，存在则原地提权
pub async fn bootstrap_admin(state: &Arc<ServerState>, phone_number: &str) -> Result<User, String> {
    let admin = state.users.ensure_admin(phone_number).await?;
    push_audit(
        state,
        "admin_bootstrap".to_string(),
        admin.id.clone(),
        format!("phone={}", phone_number),
    )
    .await;
    info!("管理员账户就绪: {}", admin.username);
    Ok(admin)
}

/// 注入演示彩池（SEED_DEMO_DATA=1 时）
pub async fn seed_demo_pools(state: &Arc<ServerState>, admin_id: &str) -> Result<usize, String> {
    let now = now_secs();
    let specs = vec![
        CreatePoolSpec {
            name: "Daily Lucky 50".to_string(),
            description: "Entry 50 ETB, one winner takes the pot every day".to_string(),
            entry_fee: 5_000,
            min_participants: 5,
            max_participants: 20,
            winner_count: 1,
            draw_at: now + 24 * 3_600,
        },
        CreatePoolSpec {
            name: "Weekly Mega 100".to_string(),
            description: "Entry 100 ETB, three winners split the weekly pot".to_string(),
            entry_fee: 10_000,
            min_participants: 10,
            max_participants: 50,
            winner_count: 3,
            draw_at: now + 7 * 24 * 3_600,
        },
        CreatePoolSpec {
            name: "Premium 200".to_string(),
            description: "Entry 200 ETB, two winners, draw in three days".to_string(),
            entry_fee: 20_000,
            min_participants: 8,
            max_participants: 30,
            winner_count: 2,
            draw_at: now + 72 * 3_600,
        },
    ];
    let mut created = 0;
    for spec in specs {
        let pool = state.pools.create(admin_id, spec).await?;
        info!("演示彩池已创建: {} ({})", pool.name, pool.id);
        created += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::otp::OtpConfig;

    #[tokio::test]
    async fn test_bootstrap_and_seed() {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let admin = bootstrap_admin(&state, "+251900000000").await.unwrap();
        assert!(admin.is_admin);
        // 幂等
        let again = bootstrap_admin(&state, "+251900000000").await.unwrap();
        assert_eq!(admin.id, again.id);

        let created = seed_demo_pools(&state, &admin.id).await.unwrap();
        assert_eq!(created, 3);
        assert_eq!(state.pools.count_active().await, 3);
    }
}
