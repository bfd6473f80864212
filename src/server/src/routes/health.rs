use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::state::ServerState;
use crate::types::now_secs;
use crate::utils::with_state;

#[derive(Debug, serde::Serialize)]
struct HealthResponse {
    status: String,
    timestamp: u64,
    version: String,
}

async fn health_check() -> Result<impl Reply, Rejection> {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: now_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Ok(warp::reply::json(&response))
}

/// 以Prometheus文本格式输出运行时计数器
async fn metrics(state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    let sm = state.state_metrics.read().await;
    let mut keys: Vec<&String> = sm.keys().collect();
    keys.sort();
    let mut out = String::new();
    for key in keys {
        let value = sm.get(key).copied().unwrap_or(0);
        out.push_str(&format!("# TYPE {} counter\n{} {}\n", key, key, value));
    }
    Ok(warp::reply::with_header(
        out,
        "content-type",
        "text/plain; version=0.0.4; charset=utf-8",
    ))
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let health_route = warp::path!("health")
        .and(warp::get())
        .and_then(|| async { health_check().await })
        .boxed();

    let metrics_route = {
        let state = Arc::clone(&state);
        warp::path!("metrics")
            .and(warp::get())
            .and(with_state(state))
            .and_then(|state: Arc<ServerState>| async move { metrics(state).await })
            .boxed()
    };

    health_route.or(metrics_route).boxed()
}
