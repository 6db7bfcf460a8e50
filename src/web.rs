//! Redirect HTTP endpoint
//!
//! `GET /go?f=<token>` answers with a 302 to the link's target while the link
//! is alive and a plain-text 404 otherwise.

use crate::links::{LinkError, LinkStore};
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Route serving redirects
pub const REDIRECT_PATH: &str = "/go";
/// Query parameter carrying the token
pub const TOKEN_PARAM: &str = "f";
/// Route reporting liveness
pub const HEALTH_PATH: &str = "/health";

/// Body for unknown or missing tokens ("invalid or expired link")
pub const INVALID_LINK_MESSAGE: &str = "❌ لینک نامعتبر یا منقضی شده";
/// Body for tokens found expired on access ("link expired")
pub const EXPIRED_LINK_MESSAGE: &str = "❌ لینک منقضی شده";

/// Build the router with the redirect and health routes.
pub fn build_router(store: Arc<LinkStore>) -> Router {
    Router::new()
        .route(REDIRECT_PATH, get(redirect))
        .route(HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Serve `router` on `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Redirect endpoint listening on {addr}");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

/// GET /go?f=<token>
async fn redirect(
    State(store): State<Arc<LinkStore>>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(token) = query.as_deref().and_then(first_token) else {
        return (StatusCode::NOT_FOUND, INVALID_LINK_MESSAGE).into_response();
    };

    match store.resolve(&token).await {
        Ok(target) => match HeaderValue::try_from(target) {
            Ok(location) => {
                debug!(token = %token, "Redirecting");
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            Err(e) => {
                warn!(token = %token, "Stored target is not a valid Location header: {e}");
                (StatusCode::NOT_FOUND, INVALID_LINK_MESSAGE).into_response()
            }
        },
        Err(LinkError::Expired) => (StatusCode::NOT_FOUND, EXPIRED_LINK_MESSAGE).into_response(),
        Err(LinkError::NotFound) => (StatusCode::NOT_FOUND, INVALID_LINK_MESSAGE).into_response(),
    }
}

/// First non-empty value of the token parameter; repeats are ignored
fn first_token(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// GET /health
async fn health(State(store): State<Arc<LinkStore>>) -> String {
    format!("ok\nlinks: {}\n", store.len().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{Clock, ManualClock, TemporaryLink};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn setup() -> (Arc<ManualClock>, Arc<LinkStore>, Router) {
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let store = Arc::new(LinkStore::new(clock.clone(), 100));
        store
            .insert(TemporaryLink {
                token: "42".to_string(),
                target_url: "https://cdn.example/file.mkv".to_string(),
                expires_at: clock.now() + Duration::seconds(600),
            })
            .await;
        let router = build_router(store.clone());
        (clock, store, router)
    }

    async fn get(router: Router, uri: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        router.oneshot(request).await.expect("response")
    }

    async fn body_text(response: Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn test_valid_token_redirects() {
        let (_, _, router) = setup().await;
        let response = get(router, "/go?f=42").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
            Some("https://cdn.example/file.mkv")
        );
    }

    #[tokio::test]
    async fn test_unknown_or_missing_token_is_404() {
        let (_, _, router) = setup().await;

        let response = get(router.clone(), "/go?f=bogus").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, INVALID_LINK_MESSAGE);

        let response = get(router.clone(), "/go").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get(router, "/go?f=").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_repeated_token_param_uses_first_value() {
        let (_, _, router) = setup().await;

        let response = get(router.clone(), "/go?f=bogus&f=bogus").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, INVALID_LINK_MESSAGE);

        let response = get(router.clone(), "/go?f=42&f=1").await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let response = get(router, "/go?f=%ZZ").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expired_token_is_404_then_forgotten() {
        let (clock, store, router) = setup().await;
        clock.advance(Duration::seconds(600));

        let response = get(router.clone(), "/go?f=42").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, EXPIRED_LINK_MESSAGE);
        assert!(store.is_empty().await);

        let response = get(router, "/go?f=42").await;
        assert_eq!(body_text(response).await, INVALID_LINK_MESSAGE);
    }

    #[tokio::test]
    async fn test_health_reports_link_count() {
        let (_, _, router) = setup().await;
        let response = get(router, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("links: 1"));
    }
}
