use super::error::*;
use super::handler;
use crate::application_port::AuthDecision;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let session = warp::get()
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(with(server.clone()))
        .and(with_decision(server.clone()))
        .and_then(handler::current_session);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(with(server.clone()))
        .and(warp::header::optional::<String>("cookie"))
        .and_then(handler::logout);

    session.or(logout)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Runs the gatekeeper for the request: session cookie plus the hostname's
/// resolved tenant in, decision (including any cookie side effect) out.
fn with_decision(
    server: Arc<Server>,
) -> impl Filter<Extract = (AuthDecision,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("cookie")
        .and(warp::header::optional::<String>("host"))
        .and(with(server))
        .and_then(
            |cookie_header: Option<String>, host: Option<String>, server: Arc<Server>| async move {
                let tenant = server
                    .tenant_resolver
                    .resolve(host.as_deref().unwrap_or_default());
                let token = cookie_header
                    .as_deref()
                    .and_then(|header| handler::session_cookie(header, &server.cookie_name));
                server
                    .gate
                    .authenticate(token.as_ref(), &tenant)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)
            },
        )
}
