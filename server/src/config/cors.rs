use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::Config;

// Storefront and admin dashboard dev servers.
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

pub fn create_cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins = allowed_origins(
        config
            .cors_allowed_origins
            .as_deref()
            .unwrap_or(DEFAULT_ALLOWED_ORIGINS),
    );

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

fn parse_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::debug!(origin, "CORS: allowing origin");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(origin, error = %e, "CORS: invalid origin");
                None
            }
        })
        .collect()
}

fn allowed_origins(origins: &str) -> AllowOrigin {
    let origins = parse_origins(origins);

    // Credentials are allowed, so a wildcard origin is not an option; an empty list
    // falls back to the dev defaults instead.
    if origins.is_empty() {
        tracing::warn!("CORS: no valid origins configured, using development defaults");
        AllowOrigin::list(parse_origins(DEFAULT_ALLOWED_ORIGINS))
    } else {
        tracing::info!(count = origins.len(), "CORS: configured allowed origins");
        AllowOrigin::list(origins)
    }
}
