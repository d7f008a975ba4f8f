use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::tenant::forwarded_host;
use crate::context::{ActiveTransaction, AppState, PendingTasks, RequestInfo};
use crate::error::{ApiError, Failure};
use crate::worker::{panic_message, rollback};

/// Opens the request transaction and closes it once the handler is done:
/// error responses and panics roll back, everything else commits. Tasks
/// queued by the request are published only after a successful commit.
pub async fn web_setup(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let context_id = Uuid::new_v4().simple().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "request",
        context_id = %context_id,
        method = %method,
        path = %path,
        tenant_id = tracing::field::Empty,
        user_id = tracing::field::Empty,
    );

    let info = RequestInfo {
        context_id,
        scheme: scheme(&request),
        host: forwarded_host(request.headers()).unwrap_or_default(),
        path,
    };

    async move {
        let started = Instant::now();
        tracing::info!("request started");

        let trx = match state.db.begin().await {
            Ok(trx) => trx,
            Err(err) => {
                tracing::error!(error = %err, "could not begin transaction");
                return ApiError::service_unavailable("Database unavailable").into_response();
            }
        };

        let tasks = PendingTasks::default();
        request.extensions_mut().insert(ActiveTransaction(trx.clone()));
        request.extensions_mut().insert(tasks.clone());
        request.extensions_mut().insert(info);

        let outcome = AssertUnwindSafe(next.run(request)).catch_unwind().await;

        let response = match outcome {
            Ok(response) if response.extensions().get::<Failure>().is_some() => {
                rollback(trx.as_ref()).await;
                response
            }
            Ok(response) => match trx.commit().await {
                Ok(()) => {
                    for message in tasks.take() {
                        state.queue.publish(message);
                    }
                    response
                }
                Err(err) => {
                    tracing::error!(error = %err, "commit failed");
                    ApiError::internal(err).into_response()
                }
            },
            Err(payload) => {
                rollback(trx.as_ref()).await;
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, backtrace = %Backtrace::force_capture(), "request panicked");
                ApiError::internal(anyhow::anyhow!("handler panicked: {}", message)).into_response()
            }
        };

        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request finished"
        );
        response
    }
    .instrument(span)
    .await
}

fn scheme(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .or_else(|| request.uri().scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string())
}
