//! Hyper-based HTTP Server
//!
//! Direct Hyper implementation with match-based routing:
//! - `GET  /healthz`   - liveness, always `ok\n`
//! - `POST /embedding` - embed `text` with the model named by `model_name`

use std::convert::Infallible;
use std::sync::Arc;
use hyper::{Body, Request, Response, Server, Method, StatusCode};
use hyper::service::{make_service_fn, service_fn};
use hyper::body::to_bytes;
use tokio::net::TcpSocket;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::models::ModelCache;
use crate::protocol::http::{HttpEmbedRequest, HttpEmbedResponse, HttpErrorResponse};
use crate::server::config::ServerConfig;

/// Shared state for Hyper server
#[derive(Clone)]
pub struct ServerState {
    cache: Arc<ModelCache>,
}

impl ServerState {
    pub fn new(cache: Arc<ModelCache>) -> Self {
        Self { cache }
    }
}

/// Start the Hyper HTTP server and serve until the process stops
pub async fn start_hyper_http_server(
    config: Arc<ServerConfig>,
    cache: Arc<ModelCache>,
) -> Result<(), Box<dyn std::error::Error>> {
    let bind_address = config.network.bind_address.clone();

    info!("🚀 Starting Hyper HTTP Server");
    info!("📡 Binding to {}", bind_address);

    let state = ServerState::new(cache);

    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                handle_request(req, state)
            }))
        }
    });

    let addr: std::net::SocketAddr = bind_address.parse()?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_nodelay(true)?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;

    let server = Server::from_tcp(listener.into_std()?)?
        .http1_keepalive(true)
        .tcp_nodelay(true)
        .tcp_sleep_on_accept_errors(true)
        .serve(make_svc);

    info!("✅ HTTP server listening on {}", bind_address);
    info!("📍 Endpoints:");
    info!("   POST /embedding  - Generate embeddings");
    info!("   GET  /healthz    - Health check");

    server.await?;

    Ok(())
}

/// Route one request
pub async fn handle_request(
    req: Request<Body>,
    state: ServerState,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = info_span!("request", id = %Uuid::new_v4(), %method, %path);

    let response = async {
        match (&method, path.as_str()) {
            (&Method::GET, "/healthz") => handle_health(),
            (&Method::POST, "/embedding") => handle_embedding(req, state).await,
            _ => error_response(StatusCode::NOT_FOUND, HttpErrorResponse::not_found()),
        }
    }
    .instrument(span)
    .await;

    Ok(response)
}

/// Health check endpoint
fn handle_health() -> Response<Body> {
    debug!("🏥 Health check requested");
    build_response(StatusCode::OK, "text/plain", Body::from("ok\n"))
}

/// Embedding endpoint
async fn handle_embedding(req: Request<Body>, state: ServerState) -> Response<Body> {
    let start_time = std::time::Instant::now();

    let body_bytes = match to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                HttpErrorResponse::new(format!("Failed to read request body: {}", e)),
            );
        }
    };

    let request = HttpEmbedRequest::from_body(&body_bytes);
    let (text, model_name) = match request.validate() {
        Ok(fields) => fields,
        Err(error) => {
            debug!("Rejected request: {}", error.error);
            return error_response(StatusCode::BAD_REQUEST, error);
        }
    };

    let model = match state.cache.get_or_load(model_name).await {
        Ok(model) => model,
        Err(e) => {
            error!("❌ Loading model '{}' failed: {}", model_name, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, HttpErrorResponse::new(e.to_string()));
        }
    };

    match model.embed_text(text).await {
        Ok(embedding) => {
            debug!("Embedded {} bytes into {} dimensions in {:?}", text.len(), embedding.len(), start_time.elapsed());
            json_response(StatusCode::OK, &HttpEmbedResponse::new(embedding))
        }
        Err(e) => {
            error!("❌ Embedding generation failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, HttpErrorResponse::new(e.to_string()))
        }
    }
}

fn error_response(status: StatusCode, error: HttpErrorResponse) -> Response<Body> {
    json_response(status, &error)
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => build_response(status, "application/json", Body::from(body)),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            build_response(StatusCode::INTERNAL_SERVER_ERROR, "application/json", Body::from(r#"{"error":"Internal Server Error"}"#))
        }
    }
}

fn build_response(status: StatusCode, content_type: &'static str, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static(content_type));
    response
}
