//! 服务进程入口：装配状态、管理员、扫描器与HTTP服务

use std::sync::Arc;

use tracing::{error, info};

use medeb_lottery_server::create_routes;
use medeb_lottery_server::seed;
use medeb_lottery_server::state::ServerState;
use medeb_lottery_server::sweeper::DrawSweeper;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("启动彩票池服务器...");

    let state = match ServerState::new().await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("初始化服务器状态失败: {}", e);
            std::process::exit(1);
        }
    };

    // 管理员账户
    let admin_phone =
        std::env::var("ADMIN_PHONE").unwrap_or_else(|_| "+251900000000".to_string());
    let admin = match seed::bootstrap_admin(&state, &admin_phone).await {
        Ok(admin) => admin,
        Err(e) => {
            error!("初始化管理员失败: {}", e);
            std::process::exit(1);
        }
    };

    // 演示数据（可选）
    if std::env::var("SEED_DEMO_DATA").unwrap_or_default() == "1" {
        match seed::seed_demo_pools(&state, &admin.id).await {
            Ok(n) => info!("已注入 {} 个演示彩池", n),
            Err(e) => error!("注入演示数据失败: {}", e),
        }
    }

    // 到期开奖扫描（DRAW_SWEEP_SECS=0 关闭）
    let sweep_secs = std::env::var("DRAW_SWEEP_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse::<u64>()
        .unwrap_or(60);
    if sweep_secs > 0 {
        DrawSweeper::new(Arc::clone(&state), sweep_secs).start();
        info!("到期开奖扫描已启动，间隔 {} 秒", sweep_secs);
    }

    let routes = create_routes(state);

    // 获取端口配置
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or_else(|e| {
            error!("端口解析失败: {}", e);
            std::process::exit(1);
        });

    info!("服务器启动在端口 {}", port);

    warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}
