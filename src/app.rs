use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::{
    config::{AppConfig, CorsConfig},
    error::ok,
    state::AppState,
    storage::FILES_PREFIX,
    themes, users,
};

pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();
    Router::new()
        .route("/", get(|| async { ok() }))
        .merge(users::router())
        .merge(themes::router())
        .nest_service(FILES_PREFIX, ServeDir::new(&config.files_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let headers: Vec<HeaderName> = cfg
        .allow_headers
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .filter_map(|h| match HeaderName::try_from(h) {
            Ok(name) => Some(name),
            Err(_) => {
                warn!(header = %h, "ignoring invalid CORS header name");
                None
            }
        })
        .collect();

    let allow_origin = match cfg.origins() {
        Ok(None) => AllowOrigin::from(Any),
        Ok(Some(list)) => AllowOrigin::list(list),
        Err(e) => {
            // AppConfig::from_env already refuses this, only hand-built configs get here
            error!(error = %e, "no usable CORS origin; cross-origin requests will be refused");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(headers)
}

pub async fn serve(config: &AppConfig, app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
