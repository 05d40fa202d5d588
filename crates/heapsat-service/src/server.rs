//! HTTP surface for the solve pipeline.
//!
//! A small hyper server that keeps the request path thin: parse the wire
//! shape, hand the synchronous solve pipeline to a blocking worker, write
//! the session log, serialize the outcome. The wire never carries a crash:
//! handler-level faults fold into UNKNOWN responses, and a cancelled worker
//! surfaces as an error status rather than a fabricated verdict.

use anyhow::{anyhow, Result};
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

use heapsat_solver::{
    ConversationLogEntry, Orchestrator, SolveOutcome, SolveRequestV1, SolverConfig,
};

use crate::backend::{BackendConfig, ChatBackend};
use crate::session_log::{SessionLogger, SessionRecord};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen: SocketAddr,
    pub log_dir: Option<PathBuf>,
    /// Reference information prepended to every solve prompt.
    pub context: String,
    pub max_retries: u32,
}

struct ServiceState {
    config: ServiceConfig,
    logger: Option<SessionLogger>,
    started: Instant,
}

pub async fn serve(config: ServiceConfig) -> Result<()> {
    let logger = match config.log_dir.as_deref() {
        Some(dir) => Some(SessionLogger::new(dir)?),
        None => None,
    };
    let state = Arc::new(ServiceState {
        config,
        logger,
        started: Instant::now(),
    });

    let listener = TcpListener::bind(state.config.listen)
        .await
        .map_err(|e| anyhow!("failed to bind {}: {e}", state.config.listen))?;
    let bound = listener
        .local_addr()
        .map_err(|e| anyhow!("failed to read bound addr: {e}"))?;
    tracing::info!(%bound, "listening");
    eprintln!("heapsat-service: listening on http://{bound}");

    loop {
        let (stream, _peer) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("accept failed: {e}"))?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, "connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServiceState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = match (method, path.as_str()) {
        (Method::GET, "/healthz") => text_response(StatusCode::OK, "ok\n"),
        (Method::GET, "/status") => json_response(StatusCode::OK, &status_payload(&state)),
        (Method::POST, "/solve") => {
            let body = req.into_body().collect().await?.to_bytes().to_vec();
            let parsed: SolveRequestV1 = match serde_json::from_slice(&body) {
                Ok(v) => v,
                Err(e) => {
                    return Ok(json_error(
                        StatusCode::BAD_REQUEST,
                        &format!("failed to parse solve request JSON: {e}"),
                    ));
                }
            };
            handle_solve(&state, parsed).await
        }
        _ => json_error(StatusCode::NOT_FOUND, "no such endpoint"),
    };
    Ok(resp)
}

async fn handle_solve(state: &Arc<ServiceState>, request: SolveRequestV1) -> Response<Full<Bytes>> {
    let started_at = Utc::now();
    let context = state.config.context.clone();
    let max_retries = state.config.max_retries;
    let worker_request = request.clone();

    let joined =
        tokio::task::spawn_blocking(move || run_solve(&worker_request, &context, max_retries))
            .await;
    let ended_at = Utc::now();

    let (response_value, transcript, status) = match joined {
        Ok(Ok((outcome, transcript))) => {
            let value = serde_json::to_value(&outcome).unwrap_or_else(
                |_| serde_json::json!({"result": "UNKNOWN", "error": "serialize"}),
            );
            (value, transcript, StatusCode::OK)
        }
        Ok(Err(e)) => {
            // Backend/configuration fault: degraded answer, not a crash.
            tracing::warn!(error = %e, "solve degraded to UNKNOWN");
            let value = serde_json::json!({"result": "UNKNOWN", "error": e.to_string()});
            (value, Vec::new(), StatusCode::OK)
        }
        Err(e) => {
            // The worker was cancelled or panicked; report the failure
            // rather than inventing a verdict.
            tracing::error!(error = %e, "solver worker failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("solver worker failed: {e}"),
            );
        }
    };

    if let Some(logger) = state.logger.as_ref() {
        let record = SessionRecord::new(
            started_at,
            ended_at,
            request,
            response_value.clone(),
            transcript,
        );
        if let Err(e) = logger.write(&record) {
            tracing::warn!(error = %e, "failed to write session log");
        }
    }

    json_response(status, &response_value)
}

/// Build the oracles and run one solve on the current (blocking) thread.
fn run_solve(
    request: &SolveRequestV1,
    default_context: &str,
    max_retries: u32,
) -> Result<(SolveOutcome, Vec<ConversationLogEntry>)> {
    let base = BackendConfig::from_env()?
        .override_temperature(request.temperature)
        .override_max_tokens(request.max_tokens);
    // Corrections are pinned to temperature zero regardless of the request.
    let refiner_config = base.clone().override_temperature(Some(0.0));

    let solver_oracle = Arc::new(ChatBackend::new(base)?);
    let refiner_oracle = Arc::new(ChatBackend::new(refiner_config)?);

    let mut orchestrator = Orchestrator::new(solver_oracle, SolverConfig { max_retries })
        .with_refiner_oracle(refiner_oracle);
    let task = request.to_task(default_context);
    let outcome = orchestrator.solve(&task);
    Ok((outcome, orchestrator.transcript().to_vec()))
}

fn status_payload(state: &ServiceState) -> Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "max_retries": state.config.max_retries,
        "session_logs": state.config.log_dir.as_ref().map(|d| d.display().to_string()),
        "uptime_secs": state.started.elapsed().as_secs(),
    })
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}"))))
}

fn json_error(status: StatusCode, msg: &str) -> Response<Full<Bytes>> {
    let v = serde_json::json!({ "error": msg });
    json_response(status, &v)
}
