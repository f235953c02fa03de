use std::{future::Future, net::SocketAddr};

use axum::{
    Router,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ApiError;

pub const HEALTHZ_PATH: &str = "/healthz";

/// Routes:
/// - GET /healthz - `200 text/plain "ok"`
///
/// Every other path or method, `HEAD` included, is `404`.
pub fn router() -> Router {
    Router::new()
        .route(HEALTHZ_PATH, any(healthz))
        .fallback(not_found)
}

/// Bind `addr` and return the bound address with the server future.
///
/// The future resolves once `shutdown` is cancelled and in-flight requests are answered.
pub async fn serve(
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(SocketAddr, impl Future<Output = Result<(), ApiError>>), ApiError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ApiError::Bind { addr, source })?;
    let bound = listener
        .local_addr()
        .map_err(|source| ApiError::Bind { addr, source })?;
    info!(addr = %bound, "liveness listener bound");

    let fut = async move {
        axum::serve(listener, router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;
        Ok::<(), ApiError>(())
    };
    Ok((bound, fut))
}

/// GET /healthz
async fn healthz(method: Method) -> Response {
    if method == Method::GET {
        "ok".into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
