//! 钱包路由：余额、充值、提现与流水
//!
//! 支付网关对接不在本服务内：充值视为已确认入账，提现标记
//! 处理中并立即扣减余额，防止重复支用。

use std::sync::Arc;

use warp::http::{HeaderMap, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::core::wallet::{self, Transaction};
use crate::state::ServerState;
use crate::types::{DepositRequest, WithdrawRequest};
use crate::utils::{bump_metric, push_audit, reply_err, reply_ok, session_user, with_state};

#[derive(Debug, serde::Serialize)]
struct BalanceResponse {
    balance: u64,
    currency: String,
}

#[derive(Debug, serde::Serialize)]
struct WalletChangeResponse {
    balance: u64,
    transaction: Transaction,
    message: String,
}

#[derive(Debug, serde::Serialize)]
struct TransactionsResponse {
    transactions: Vec<Transaction>,
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let balance_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "wallet" / "balance")
            .and(warp::get())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                balance_impl(state, headers).await
            })
            .boxed()
    };

    let deposit_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "wallet" / "deposit")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|req: DepositRequest, state: Arc<ServerState>, headers: HeaderMap| async move {
                deposit_impl(req, state, headers).await
            })
            .boxed()
    };

    let withdraw_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "wallet" / "withdraw")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|req: WithdrawRequest, state: Arc<ServerState>, headers: HeaderMap| async move {
                withdraw_impl(req, state, headers).await
            })
            .boxed()
    };

    let transactions_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "wallet" / "transactions")
            .and(warp::get())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                transactions_impl(state, headers).await
            })
            .boxed()
    };

    balance_route
        .or(deposit_route)
        .or(withdraw_route)
        .or(transactions_route)
        .boxed()
}

async fn balance_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    let balance = state.wallet.balance(&user.id).await;
    Ok(reply_ok(BalanceResponse { balance, currency: "ETB".to_string() }))
}

async fn deposit_impl(
    req: DepositRequest,
    state: Arc<ServerState>,
    headers: HeaderMap,
) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    let transaction = match state.wallet.deposit(&user.id, req.amount).await {
        Ok(tx) => tx,
        Err(e) => return Ok(reply_err(StatusCode::BAD_REQUEST, &e)),
    };
    bump_metric(&state, "deposits_total").await;
    push_audit(&state, "deposit".to_string(), user.id.clone(), format!("amount={}", req.amount)).await;
    let balance = state.wallet.balance(&user.id).await;
    Ok(reply_ok(WalletChangeResponse {
        balance,
        transaction,
        message: wallet::deposit_message(req.amount),
    }))
}

async fn withdraw_impl(
    req: WithdrawRequest,
    state: Arc<ServerState>,
    headers: HeaderMap,
) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    let transaction = match state.wallet.withdraw(&user.id, req.amount).await {
        Ok(tx) => tx,
        Err(e) => return Ok(reply_err(StatusCode::BAD_REQUEST, &e)),
    };
    bump_metric(&state, "withdrawals_total").await;
    push_audit(&state, "withdraw".to_string(), user.id.clone(), format!("amount={}", req.amount)).await;
    let balance = state.wallet.balance(&user.id).await;
    Ok(reply_ok(WalletChangeResponse {
        balance,
        transaction,
        message: wallet::withdrawal_message(req.amount),
    }))
}

async fn transactions_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    let transactions = state.wallet.transactions(&user.id).await;
    Ok(reply_ok(TransactionsResponse { transactions }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::otp::OtpConfig;
    use warp::Reply;

    async fn state_with_session() -> (Arc<ServerState>, HeaderMap) {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let user = state.users.register("+251911000002", None, None).await.unwrap();
        let token = state.sessions.create(&user.id).await;
        let mut headers = HeaderMap::new();
        headers.insert("x-session-token", token.parse().unwrap());
        (state, headers)
    }

    #[tokio::test]
    async fn test_balance_requires_session() {
        let state = Arc::new(ServerState::with_config(OtpConfig::default(), 3_600));
        let resp = balance_impl(state, HeaderMap::new()).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deposit_then_withdraw() {
        let (state, headers) = state_with_session().await;
        let resp = deposit_impl(
            DepositRequest { amount: 20_000 },
            Arc::clone(&state),
            headers.clone(),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = withdraw_impl(
            WithdrawRequest { amount: 5_000 },
            Arc::clone(&state),
            headers.clone(),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = transactions_impl(Arc::clone(&state), headers).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_deposit_out_of_range() {
        let (state, headers) = state_with_session().await;
        let resp = deposit_impl(DepositRequest { amount: 500 }, state, headers)
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
