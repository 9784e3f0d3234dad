//! Minimal hyper-based HTTP front-end for the JSON API
//!
//! Each connection is served with hyper's HTTP/1 builder. Request handling
//! blocks on upstream fetches, so every request is moved onto tokio's
//! blocking pool before it reaches the router.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::routes::{self, ApiRequest, ApiResponse, Services};

type RespBody = Full<Bytes>;

/// Largest request body accepted (only `/echo` reads bodies)
const MAX_BODY_BYTES: usize = 64 * 1024;

fn build_response(api: ApiResponse) -> Response<RespBody> {
    let mut resp = Response::new(Full::new(Bytes::from(api.body)));
    *resp.status_mut() =
        StatusCode::from_u16(api.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(api.content_type));
    resp
}

async fn handle(
    req: Request<Incoming>,
    services: Arc<Services>,
) -> Result<Response<RespBody>, Infallible> {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(build_response(ApiResponse::error(
                400,
                format!("failed to read request body: {}", e),
            )))
        }
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let request = ApiRequest {
            method: &method,
            path: &path,
            query: query.as_deref(),
            body: &body,
        };
        routes::handle(&services, &request)
    })
    .await;

    let api = outcome.unwrap_or_else(|err| {
        tracing::error!(?err, "request handler panicked");
        ApiResponse::error(500, "request handler failed")
    });
    Ok(build_response(api))
}

/// Binds `addr` and serves until `shutdown` resolves
pub async fn serve(
    addr: SocketAddr,
    services: Arc<Services>,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, services, shutdown).await
}

/// Serves connections from an already bound listener until `shutdown` resolves
///
/// Connections accepted before shutdown keep running on the runtime.
pub async fn serve_listener(
    listener: TcpListener,
    services: Arc<Services>,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "listening");
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(?err, "failed to accept connection");
                    continue;
                }
            },
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, no longer accepting connections");
                return Ok(());
            }
        };

        let io = TokioIo::new(stream);
        let services = Arc::clone(&services);
        let service = service_fn(move |req| handle(req, Arc::clone(&services)));
        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(?err, %peer, "connection error");
            }
        });
    }
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for Ctrl-C");
        // Never resolve rather than shutting down immediately
        std::future::pending::<()>().await;
    }
}
