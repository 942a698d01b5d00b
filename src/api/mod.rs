use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

use crate::registration::{
    otp::DEFAULT_OTP_TTL_SECONDS, pincode::DEFAULT_PINCODE_API_URL, Collaborators, LogOtpSender,
    MemoryOtpStore, PgSubmissionSink, PincodeClient,
};

pub mod error;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

const REQUEST_ID: &str = "x-request-id";

/// Settings for the HTTP server beyond port and database.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    frontend_url: String,
    otp_ttl_seconds: u64,
    pincode_api_url: String,
}

impl ServerConfig {
    #[must_use]
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into(),
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            pincode_api_url: DEFAULT_PINCODE_API_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: u64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_pincode_api_url(mut self, url: impl Into<String>) -> Self {
        self.pincode_api_url = url.into();
        self
    }

    #[must_use]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.otp_ttl_seconds)
    }

    #[must_use]
    pub fn pincode_api_url(&self) -> &str {
        &self.pincode_api_url
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("*")
    }
}

/// Build the application: API routes, docs, middleware and shared state.
///
/// # Errors
/// Returns an error if the frontend URL cannot be turned into a CORS origin.
pub fn router(
    collaborators: Collaborators,
    pincode: PincodeClient,
    pool: PgPool,
    frontend_url: &str,
) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(allow_origin(frontend_url)?);

    let api = Router::new()
        .route("/generate-otp", post(handlers::otp::generate_otp))
        .route("/verify-otp", post(handlers::otp::verify_otp))
        .route("/submit", post(handlers::submit::submit))
        .route("/schema", get(handlers::schema::schema))
        .route("/pincode/:pin", get(handlers::pincode::lookup));

    let app = Router::new()
        .nest("/api", api)
        .route("/", get(handlers::root::root))
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(collaborators))
                .layer(Extension(pincode))
                .layer(Extension(pool)),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if the database is unreachable or the listener fails
pub async fn new(port: u16, dsn: &str, config: ServerConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    let collaborators = Collaborators::new(
        Arc::new(MemoryOtpStore::new(config.otp_ttl())),
        Arc::new(LogOtpSender),
        Arc::new(PgSubmissionSink::new(pool.clone())),
    );
    let pincode = PincodeClient::new(config.pincode_api_url())?;

    let app = router(collaborators, pincode, pool, config.frontend_url())?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// `*` allows any origin; anything else must be a URL and is reduced to its
/// `scheme://host[:port]` origin.
fn allow_origin(frontend_url: &str) -> Result<AllowOrigin> {
    if frontend_url.trim() == "*" {
        return Ok(AllowOrigin::from(Any));
    }

    let parsed = Url::parse(frontend_url)
        .with_context(|| format!("Invalid frontend URL: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend URL must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);

    let origin = HeaderValue::from_str(&origin).context("Failed to build frontend origin header")?;
    Ok(AllowOrigin::exact(origin))
}
