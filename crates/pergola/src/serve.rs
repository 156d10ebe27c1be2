//! Serving entry point: hands the composed handler to an HTTP server
//! adapter.

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use pergola_telemetry::{init_logging, LogFormat, TelemetryConfig};

use crate::app::App;
use crate::env::Env;
use crate::response::Response;

/// The default server adapter.
pub const DEFAULT_SERVER: &str = "hyper";
/// The default listen port.
pub const DEFAULT_PORT: u16 = 5252;
/// The default bind address (all interfaces).
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Options for [`App::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Server adapter name. Unknown names fall back to the default
    /// with a warning.
    pub server: String,
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Log level filter.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

/// Errors produced by the serving entry point.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The host/port pair does not form a valid socket address.
    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

impl App {
    /// Serve the application until the process exits.
    ///
    /// Initializes structured logging (a no-op if the host program
    /// already installed a subscriber), binds a listener, and serves
    /// http1 connections, dispatching each request through
    /// [`App::call`].
    pub async fn run(self, opts: RunOptions) -> Result<(), ServeError> {
        let telemetry = TelemetryConfig::new()
            .with_log_level(&opts.log_level)
            .with_log_format(opts.log_format);
        let _ = init_logging(&telemetry);

        if opts.server != DEFAULT_SERVER {
            warn!(server = %opts.server, "unknown server adapter, using {DEFAULT_SERVER}");
        }

        let listen = format!("{}:{}", opts.host, opts.port);
        let addr: SocketAddr = listen
            .parse()
            .map_err(|_| ServeError::InvalidAddress(listen.clone()))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;

        info!(%addr, routes = self.route_count(), "pergola: listening");

        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            };

            let app = self.clone();
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let app = app.clone();
                    async move { Ok::<_, Infallible>(app.handle(req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = %e, "connection error");
                }
            });
        }
    }

    /// Convert one hyper request into a descriptor, dispatch it, and
    /// convert the result back.
    async fn handle(&self, req: Request<Incoming>) -> hyper::Response<Full<Bytes>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let headers = req.headers().clone();

        let body = match req.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!(error = %e, "failed to read request body");
                return into_hyper(Response::text(StatusCode::BAD_REQUEST, "bad request"));
            }
        };

        let mut env = Env::new(method, path);
        env.headers = headers;
        env.body = body;

        into_hyper(self.call(&mut env))
    }
}

/// Convert a dispatch response into a hyper response.
fn into_hyper(resp: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(resp.status);
    for (name, value) in &resp.headers {
        builder = builder.header(name, value);
    }
    let body = resp.body_bytes();
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        error!(error = %e, "failed to build response");
        hyper::Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::new()))
            .expect("empty 500 response is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_options_defaults() {
        let opts = RunOptions::default();
        assert_eq!(opts.server, "hyper");
        assert_eq!(opts.host, "0.0.0.0");
        assert_eq!(opts.port, 5252);
    }

    #[test]
    fn into_hyper_preserves_status_headers_and_body() {
        let resp = Response::ok("hello").with_header("X-Cascade", "pass");
        let hyper_resp = into_hyper(resp);

        assert_eq!(hyper_resp.status(), StatusCode::OK);
        assert_eq!(
            hyper_resp
                .headers()
                .get("x-cascade")
                .and_then(|v| v.to_str().ok()),
            Some("pass")
        );
    }

    #[test]
    fn into_hyper_survives_bad_header_values() {
        let resp = Response::ok("x").with_header("Bad Header Name", "value");
        let hyper_resp = into_hyper(resp);
        assert_eq!(hyper_resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
