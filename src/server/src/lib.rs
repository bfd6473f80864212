#![recursion_limit = "1024"]
//! Medeb 彩票池服务端
//!
//! 提供钱包、彩池报名、定时开奖与开奖公示的HTTP API。

use std::sync::Arc;

use warp::{Filter, Reply};

pub mod core;
pub mod errors;
pub mod routes;
pub mod seed;
pub mod state;
pub mod sweeper;
pub mod types;
pub mod utils;

use state::ServerState;

/// 组装全部路由并挂上错误恢复与CORS
pub fn create_routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let public_group = routes::health::routes(Arc::clone(&state))
        .or(routes::pools::routes(Arc::clone(&state)))
        .or(routes::transparency::routes(Arc::clone(&state)))
        .boxed();

    let account_group = routes::auth::routes(Arc::clone(&state))
        .or(routes::wallet::routes(Arc::clone(&state)))
        .or(routes::dashboard::routes(Arc::clone(&state)))
        .or(routes::history::routes(Arc::clone(&state)))
        .boxed();

    let admin_group = routes::admin::routes(state);

    let app = public_group.or(account_group).or(admin_group).boxed();

    app.recover(errors::handle_rejection)
        .with(warp::cors().allow_any_origin())
        .boxed()
}
