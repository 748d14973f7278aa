use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imaging_client::ImagingClient;
use registry_client::RegistryClient;
use timeline_common::Config;
use timeline_engine::{
    SourceTimeouts, TimelineDeps, TimelineService, Unrestricted, VisibilityPolicy, VisibilityTable,
};
use vitals_client::VitalsClient;

mod rest;

pub const ROLE_HEADER: &str = "x-user-role";

pub struct AppState {
    pub service: TimelineService,
}

/// Routes plus the HTTP layers every response goes through.
pub fn router(state: Arc<AppState>, allowed_origins: &[String]) -> Result<Router> {
    let origins = allowed_origins
        .iter()
        .map(|o| o.parse::<HeaderValue>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/timeline", get(rest::api_timeline))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET])
                .allow_headers([HeaderName::from_static(ROLE_HEADER), header::CONTENT_TYPE]),
        )
        // Clinical data: never cache
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Method + path only; query strings carry patient ids
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );
    Ok(app)
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("timeline=info".parse()?);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn load_policy(config: &Config) -> Result<Arc<dyn VisibilityPolicy>> {
    match &config.visibility_policy_path {
        Some(path) => {
            let table = VisibilityTable::from_file(path)?;
            info!(path = %path.display(), "Loaded role visibility table");
            Ok(Arc::new(table))
        }
        None => {
            info!("No visibility table configured, timelines are unredacted");
            Ok(Arc::new(Unrestricted))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = Config::from_env()?;
    config.log_redacted();

    let registry = RegistryClient::connect_lazy(&config.registry_database_url, config.registry_timeout)?;
    let imaging = ImagingClient::new(&config.imaging_archive_url, config.imaging_timeout)?;
    let vitals = VitalsClient::new(&config.vitals_service_url, config.vitals_timeout)?;

    let deps = TimelineDeps::builder()
        .registry(Arc::new(registry))
        .imaging(Arc::new(imaging))
        .vitals(Arc::new(vitals))
        .timeouts(SourceTimeouts {
            registry: config.registry_timeout,
            imaging: config.imaging_timeout,
            vitals: config.vitals_timeout,
        })
        .policy(load_policy(&config)?)
        .build();

    let state = Arc::new(AppState {
        service: TimelineService::new(deps),
    });
    let app = router(state, &config.cors_allowed_origins)?;

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Timeline API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
