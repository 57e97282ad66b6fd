use crate::meals;
use crate::state::AppState;
use axum::{
    http::{Request, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tracing::{field::Empty, Span};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn build_app(state: AppState) -> Router {
    let store = state.store.clone();
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(meals::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                        status = Empty,
                        revision = Empty,
                    )
                })
                .on_response(move |res: &Response<_>, latency: Duration, span: &Span| {
                    // revision after the handler ran, so mutating requests show their bump
                    span.record("status", res.status().as_u16());
                    span.record("revision", store.revision());
                    if res.status().is_server_error() {
                        tracing::error!(?latency, "response");
                    } else {
                        tracing::debug!(?latency, "response");
                    }
                }),
        )
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr()?;
    let store = state.store.clone();
    let app = build_app(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close();
    tracing::info!("meal store closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed; shutting down");
    }
}
