//! 认证路由：OTP登录、注册与会话管理
//!
//! 登录与注册都走两步：先发验证码，再凭验证码换会话令牌。
//! 短信网关不在本服务内，验证码经日志输出供开发环境取用。

use std::sync::Arc;

use warp::http::{HeaderMap, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::core::users::User;
use crate::state::ServerState;
use crate::types::{
    header_token, MessageResponse, RegisterRequest, SendOtpRequest, VerifyOtpRequest,
    VerifyRegistrationRequest,
};
use crate::utils::{bump_metric, push_audit, reply_err, reply_ok, session_user, with_state};

#[derive(Debug, serde::Serialize)]
struct AuthResponse {
    token: String,
    user: User,
}

pub fn routes(state: Arc<ServerState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let send_otp_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "auth" / "send-otp")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_state(state))
            .and_then(|req: SendOtpRequest, state: Arc<ServerState>| async move {
                send_otp_impl(req, state).await
            })
            .boxed()
    };

    let verify_otp_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "auth" / "verify-otp")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_state(state))
            .and_then(|req: VerifyOtpRequest, state: Arc<ServerState>| async move {
                verify_otp_impl(req, state).await
            })
            .boxed()
    };

    let register_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "auth" / "register")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_state(state))
            .and_then(|req: RegisterRequest, state: Arc<ServerState>| async move {
                register_impl(req, state).await
            })
            .boxed()
    };

    let verify_registration_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "auth" / "verify-registration")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_state(state))
            .and_then(|req: VerifyRegistrationRequest, state: Arc<ServerState>| async move {
                verify_registration_impl(req, state).await
            })
            .boxed()
    };

    let logout_route = {
        let state = Arc::clone(&state);
        warp::path!("api" / "auth" / "logout")
            .and(warp::post())
            .and(with_state(state))
            .and(warp::header::headers_cloned())
            .and_then(|state: Arc<ServerState>, headers: HeaderMap| async move {
                logout_impl(state, headers).await
            })
            .boxed()
    };

    send_otp_route
        .or(verify_otp_route)
        .or(register_route)
        .or(verify_registration_route)
        .or(logout_route)
        .boxed()
}

/// 登录第一步：向已注册手机号发送验证码
async fn send_otp_impl(req: SendOtpRequest, state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    let phone = req.phone_number.trim().to_string();
    if phone.is_empty() {
        return Ok(reply_err(StatusCode::BAD_REQUEST, "Phone number is required"));
    }
    if state.users.find_by_phone(&phone).await.is_none() {
        return Ok(reply_err(
            StatusCode::NOT_FOUND,
            "No account found for this phone number",
        ));
    }
    let code = match state.otp.issue(&phone).await {
        Ok(code) => code,
        Err(e) => return Ok(reply_err(StatusCode::TOO_MANY_REQUESTS, &e)),
    };
    tracing::info!("向 {} 发送OTP: {}", phone, code);
    bump_metric(&state, "otp_issued_total").await;
    Ok(reply_ok(MessageResponse {
        message: "OTP sent successfully".to_string(),
    }))
}

/// 登录第二步：校验验证码并换取会话令牌
async fn verify_otp_impl(req: VerifyOtpRequest, state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    let phone = req.phone_number.trim().to_string();
    let otp = req.otp.trim().to_string();
    if phone.is_empty() || otp.is_empty() {
        return Ok(reply_err(
            StatusCode::BAD_REQUEST,
            "Phone number and OTP are required",
        ));
    }
    let user = match state.users.find_by_phone(&phone).await {
        Some(user) => user,
        None => {
            return Ok(reply_err(
                StatusCode::NOT_FOUND,
                "No account found for this phone number",
            ))
        }
    };
    if let Err(e) = state.otp.verify(&phone, &otp).await {
        return Ok(reply_err(StatusCode::BAD_REQUEST, &e));
    }
    let token = state.sessions.create(&user.id).await;
    bump_metric(&state, "sessions_created_total").await;
    push_audit(&state, "login".to_string(), user.id.clone(), format!("phone={}", phone)).await;
    Ok(reply_ok(AuthResponse { token, user }))
}

/// 注册第一步：确认手机号未占用并发送验证码
async fn register_impl(req: RegisterRequest, state: Arc<ServerState>) -> Result<impl Reply, Rejection> {
    let phone = req.phone_number.trim().to_string();
    if phone.is_empty() {
        return Ok(reply_err(StatusCode::BAD_REQUEST, "Phone number is required"));
    }
    if state.users.find_by_phone(&phone).await.is_some() {
        return Ok(reply_err(
            StatusCode::BAD_REQUEST,
            "An account with this phone number already exists",
        ));
    }
    let code = match state.otp.issue(&phone).await {
        Ok(code) => code,
        Err(e) => return Ok(reply_err(StatusCode::TOO_MANY_REQUESTS, &e)),
    };
    tracing::info!("向 {} 发送注册OTP: {}", phone, code);
    bump_metric(&state, "otp_issued_total").await;
    Ok(reply_ok(MessageResponse {
        message: "OTP sent successfully".to_string(),
    }))
}

/// 注册第二步：校验验证码、建档并换取会话令牌
async fn verify_registration_impl(
    req: VerifyRegistrationRequest,
    state: Arc<ServerState>,
) -> Result<impl Reply, Rejection> {
    let phone = req.phone_number.trim().to_string();
    let otp = req.otp.trim().to_string();
    if phone.is_empty() || otp.is_empty() {
        return Ok(reply_err(
            StatusCode::BAD_REQUEST,
            "Phone number and OTP are required",
        ));
    }
    if let Err(e) = state.otp.verify(&phone, &otp).await {
        return Ok(reply_err(StatusCode::BAD_REQUEST, &e));
    }
    let user = match state.users.register(&phone, req.username, req.email).await {
        Ok(user) => user,
        Err(e) => return Ok(reply_err(StatusCode::BAD_REQUEST, &e)),
    };
    let token = state.sessions.create(&user.id).await;
    bump_metric(&state, "sessions_created_total").await;
    push_audit(&state, "register".to_string(), user.id.clone(), format!("phone={}", phone)).await;
    Ok(reply_ok(AuthResponse { token, user }))
}

async fn logout_impl(state: Arc<ServerState>, headers: HeaderMap) -> Result<impl Reply, Rejection> {
    let user = match session_user(&state, &headers).await {
        Some(user) => user,
        None => return Ok(reply_err(StatusCode::UNAUTHORIZED, "Unauthorized")),
    };
    if let Some(token) = header_token(&headers) {
        state.sessions.destroy(&token).await;
    }
    push_audit(&state, "logout".to_string(), user.id, String::new()).await;
    Ok(reply_ok(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::otp::OtpConfig;
    use warp::Reply;

    fn test_state() -> Arc<ServerState> {
        let otp = OtpConfig {
            fixed_code: Some("123456".to_string()),
            resend_secs: 0,
            ..OtpConfig::default()
        };
        Arc::new(ServerState::with_config(otp, 3_600))
    }

    #[tokio::test]
    async fn test_registration_flow() {
        let state = test_state();
        let resp = register_impl(
            RegisterRequest { phone_number: "+251911223344".to_string() },
            Arc::clone(&state),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = verify_registration_impl(
            VerifyRegistrationRequest {
                phone_number: "+251911223344".to_string(),
                otp: "123456".to_string(),
                username: Some("abebe".to_string()),
                email: None,
            },
            Arc::clone(&state),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        // 手机号已占用
        let resp = register_impl(
            RegisterRequest { phone_number: "+251911223344".to_string() },
            Arc::clone(&state),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_flow() {
        let state = test_state();
        state
            .users
            .register("+251911000001", None, None)
            .await
            .unwrap();

        let resp = send_otp_impl(
            SendOtpRequest { phone_number: "+251911000001".to_string() },
            Arc::clone(&state),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        // 错误验证码
        let resp = verify_otp_impl(
            VerifyOtpRequest {
                phone_number: "+251911000001".to_string(),
                otp: "000000".to_string(),
            },
            Arc::clone(&state),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = verify_otp_impl(
            VerifyOtpRequest {
                phone_number: "+251911000001".to_string(),
                otp: "123456".to_string(),
            },
            Arc::clone(&state),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_send_otp_unknown_phone() {
        let state = test_state();
        let resp = send_otp_impl(
            SendOtpRequest { phone_number: "+251900000009".to_string() },
            state,
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout_requires_session() {
        let state = test_state();
        let resp = logout_impl(state, HeaderMap::new()).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
