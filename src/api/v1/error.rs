use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<ApiErrorCode>() {
        let status = match err {
            ApiErrorCode::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiErrorCode::TenantForbidden => StatusCode::FORBIDDEN,
            // the store failed on the cold path: it is unknown whether the
            // user is logged in, so never answer 401 here
            ApiErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let json = warp::reply::json(&ApiResponse::<()>::err(err.clone(), err.to_string()));
        Ok(warp::reply::with_status(json, status))
    } else {
        let json = warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: ApiErrorCode::InternalError,
                message: format!("Unhandled error: {:?}", err),
            }),
        });
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Session is not valid for this tenant")]
    TenantForbidden,
    #[error("Session store unavailable")]
    StoreUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl reject::Reject for ApiErrorCode {}

impl From<GateError> for ApiErrorCode {
    fn from(error: GateError) -> Self {
        match error {
            GateError::StoreUnavailable(e) => {
                warn!("Store unavailable: {}", e);
                ApiErrorCode::StoreUnavailable
            }
        }
    }
}
