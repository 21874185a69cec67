//! HTTP surface: health, readiness, invoke and metrics routes.

use crate::function::HandlerLoader;
use crate::http::{normalize, HostResponse};
use crate::metrics;
use crate::runtime::{HostConfig, InvocationEngine, RuntimeState};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How long in-flight connections get to finish once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves one loaded function over HTTP/1.
pub struct HostServer {
    config: HostConfig,
    engine: InvocationEngine,
}

impl HostServer {
    /// Build a server around an already constructed state.
    pub fn new(config: HostConfig, state: Arc<RuntimeState>) -> Self {
        let engine = InvocationEngine::new(state).with_timeout(config.timeout());
        Self { config, engine }
    }

    /// Load the configured handler and build the server. Loading itself
    /// cannot fail; only metrics setup can.
    pub fn from_config(config: HostConfig) -> Result<Self, BoxError> {
        let loaded = HandlerLoader::new(&config.code_path, &config.handler).load();
        let state = RuntimeState::new(loaded)?.with_function_name(config.function_name.clone());
        Ok(Self::new(config, Arc::new(state)))
    }

    pub fn state(&self) -> Arc<RuntimeState> {
        self.engine.state().clone()
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn run(self) -> Result<(), BoxError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()>,
    {
        let addr: SocketAddr = self.config.bind_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Accept connections on `listener` until `shutdown` resolves, then
    /// wait up to [`DRAIN_TIMEOUT`] for accepted connections to finish
    /// their in-flight requests before returning.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()>,
    {
        info!("fnhost listening on {}", listener.local_addr()?);
        info!(
            "Function: {}",
            self.engine.state().function_name().unwrap_or("<unnamed>")
        );
        info!("Handler: {}", self.config.handler);

        let config = Arc::new(self.config);
        let engine = self.engine;
        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => break,
            };
            let io = TokioIo::new(stream);

            let engine = engine.clone();
            let config = config.clone();

            let service = service_fn(move |req| {
                let engine = engine.clone();
                let config = config.clone();
                async move {
                    Ok::<_, Infallible>(handle_request(req, &engine, &config, Some(remote_addr)).await)
                }
            });
            let conn = graceful.watch(http1::Builder::new().serve_connection(io, service));

            tokio::task::spawn(async move {
                if let Err(err) = conn.await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }

        info!("fnhost stopped accepting connections, draining");
        tokio::select! {
            _ = graceful.shutdown() => info!("All connections closed"),
            _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
                warn!("Connections still open after {:?}, giving up", DRAIN_TIMEOUT)
            }
        }
        Ok(())
    }
}

/// Route one request.
pub async fn handle_request<B>(
    req: Request<B>,
    engine: &InvocationEngine,
    config: &HostConfig,
    remote_addr: Option<SocketAddr>,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!(
        "Handling request: {} {} from {}",
        method,
        path,
        remote_addr.map_or_else(|| "-".to_string(), |a| a.to_string())
    );

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") => HostResponse::json(StatusCode::OK, &json!({"status": "healthy"})),
        (&Method::GET, "/ready") => HostResponse::json(
            StatusCode::OK,
            &json!({"status": "ready", "coldStart": engine.state().is_cold()}),
        ),
        (&Method::GET, "/metrics") => HostResponse::text(
            StatusCode::OK,
            metrics::CONTENT_TYPE,
            engine.state().metrics().render(),
        ),
        (&Method::POST, "/") => invoke(req, engine, config).await,
        (_, "/health" | "/ready" | "/metrics" | "/") => HostResponse::error(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("method {} not allowed on {}", method, path),
        ),
        _ => HostResponse::error(StatusCode::NOT_FOUND, format!("no route for {}", path)),
    };

    response.into_hyper()
}

async fn invoke<B>(req: Request<B>, engine: &InvocationEngine, config: &HostConfig) -> HostResponse
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, config.max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!("Rejected request body over {} bytes", config.max_body_size);
            return HostResponse::error(StatusCode::PAYLOAD_TOO_LARGE, e.to_string());
        }
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return HostResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let event = normalize(&parts, &body);
    let invocation = engine.invoke(event).await;

    let status = StatusCode::from_u16(invocation.result.status_code).unwrap_or_else(|_| {
        warn!(
            "Invalid status code {}, falling back to 500 Internal Server Error",
            invocation.result.status_code
        );
        StatusCode::INTERNAL_SERVER_ERROR
    });

    HostResponse::json(status, &invocation.result.body)
        .header(
            "x-function-duration",
            invocation.elapsed.as_secs_f64().to_string(),
        )
        .header("x-cold-start", invocation.was_cold_start.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{EchoHandler, HandlerKind, LoadedHandler};

    fn engine() -> InvocationEngine {
        let state = RuntimeState::new(LoadedHandler {
            handler: Arc::new(EchoHandler),
            kind: HandlerKind::Echo,
        })
        .unwrap();
        InvocationEngine::new(Arc::new(state))
    }

    async fn send(
        engine: &InvocationEngine,
        config: &HostConfig,
        method: Method,
        uri: &str,
        body: &'static str,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        let response = handle_request(req, engine, config, None).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, body) =
            send(&engine(), &HostConfig::new(), Method::GET, "/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let config = HostConfig::new();
        let engine = engine();

        let (status, _) = send(&engine, &config, Method::GET, "/", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = send(&engine, &config, Method::POST, "/health", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(engine.state().is_cold());
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let config = HostConfig::new().max_body_size(8);
        let (status, body) =
            send(&engine(), &config, Method::POST, "/", r#"{"too": "large"}"#).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].is_string());
    }
}
