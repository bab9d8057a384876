use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::Server;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::reply::Reply;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub expires_at: DateTime<Utc>,
    pub principal: serde_json::Value,
}

impl From<AuthenticatedSession> for SessionResponse {
    fn from(session: AuthenticatedSession) -> Self {
        SessionResponse {
            user_id: session.user_id,
            tenant_id: session.tenant_id,
            expires_at: session.expires_at,
            principal: session.principal,
        }
    }
}

/// `GET /api/v1/session` -- validate the request's session cookie and report
/// the principal. Rotation happens as a side effect; the refreshed cookie
/// rides back on this response.
pub async fn current_session(
    server: Arc<Server>,
    decision: AuthDecision,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mut response = match decision.outcome {
        AuthOutcome::Authenticated(session) => {
            let body = ApiResponse::ok(SessionResponse::from(session));
            warp::reply::with_status(warp::reply::json(&body), StatusCode::OK).into_response()
        }
        AuthOutcome::Unauthenticated => {
            let code = ApiErrorCode::NotAuthenticated;
            let body = ApiResponse::<SessionResponse>::err(code.clone(), code.to_string());
            warp::reply::with_status(warp::reply::json(&body), StatusCode::UNAUTHORIZED)
                .into_response()
        }
        AuthOutcome::Rejected(_) => {
            let code = ApiErrorCode::TenantForbidden;
            let body = ApiResponse::<SessionResponse>::err(code.clone(), code.to_string());
            warp::reply::with_status(warp::reply::json(&body), StatusCode::FORBIDDEN)
                .into_response()
        }
    };
    apply_cookie(&mut response, &decision.cookie, &server.cookie_name);
    Ok(response)
}

/// `POST /api/v1/logout` -- drop the session from every tier and clear the
/// cookie. Idempotent: a missing cookie still clears.
pub async fn logout(
    server: Arc<Server>,
    cookie_header: Option<String>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if let Some(token) = cookie_header
        .as_deref()
        .and_then(|header| session_cookie(header, &server.cookie_name))
    {
        server
            .gate
            .logout(&token)
            .await
            .map_err(ApiErrorCode::from)
            .map_err(reject::custom)?;
    }

    let body = ApiResponse::ok(());
    let mut response =
        warp::reply::with_status(warp::reply::json(&body), StatusCode::OK).into_response();
    apply_cookie(&mut response, &CookieDirective::Clear, &server.cookie_name);
    Ok(response)
}

/// Pull the session token out of a raw `Cookie` header.
pub fn session_cookie(header: &str, name: &str) -> Option<SessionToken> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| SessionToken(value.to_string()))
}

fn apply_cookie(response: &mut warp::reply::Response, directive: &CookieDirective, name: &str) {
    let header = match directive {
        CookieDirective::Keep => return,
        CookieDirective::Set { token, expires_at } => format!(
            "{}={}; Path=/; Expires={}; Secure; HttpOnly; SameSite=Lax",
            name,
            token.as_str(),
            expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        ),
        CookieDirective::Clear => format!(
            "{}=; Path=/; Max-Age=0; Secure; HttpOnly; SameSite=Lax",
            name
        ),
    };
    if let Ok(value) = HeaderValue::from_str(&header) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}
