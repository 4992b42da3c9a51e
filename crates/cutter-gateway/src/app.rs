use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    delete_user_urls_handler, list_user_urls_handler, ping_handler, redirect_handler,
    shorten_batch_handler, shorten_json_handler, shorten_text_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", post(shorten_text_handler))
            .route("/ping", get(ping_handler))
            .route("/{id}", get(redirect_handler))
            .nest(
                "/api",
                Router::new()
                    .route("/shorten", post(shorten_json_handler))
                    .route("/shorten/batch", post(shorten_batch_handler))
                    .route(
                        "/user/urls",
                        get(list_user_urls_handler).delete(delete_user_urls_handler),
                    ),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::USER_ID_HEADER;
    use crate::model::{BatchResponseEntry, ShortenResponse, UserUrl};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use cutter_core::{Registry, ShortCode};
    use cutter_generator::SeqGenerator;
    use cutter_shortener::{DeletionQueue, ShortenerService};
    use cutter_storage::VolatileRegistry;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const BASE_URL: &str = "http://localhost:8080";

    struct TestApp {
        router: Router,
        registry: Arc<VolatileRegistry>,
    }

    fn test_app(queue_capacity: usize) -> TestApp {
        let registry = Arc::new(VolatileRegistry::new());
        let service =
            ShortenerService::new(Arc::clone(&registry), SeqGenerator::with_prefix("cu"));
        let (deletions, _worker) = DeletionQueue::spawn(Arc::clone(&registry), queue_capacity);
        let state = AppState::new(Arc::new(service), deletions, BASE_URL);
        TestApp {
            router: App::router(state),
            registry,
        }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    fn text_post(owner: &str, body: &str) -> Request<Body> {
        Request::post("/")
            .header(USER_ID_HEADER, owner)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, owner: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, owner)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, owner: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(owner) = owner {
            builder = builder.header(USER_ID_HEADER, owner);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn text_shorten_then_redirect() {
        let app = test_app(8);

        let response = app.send(text_post("u1", "https://example.com/a")).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_bytes(response).await,
            b"http://localhost:8080/cu000000".to_vec()
        );

        let response = app.send(get("/cu000000", None)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://example.com/a"
        );
    }

    #[tokio::test]
    async fn repeated_url_returns_conflict_with_existing_code() {
        let app = test_app(8);
        app.send(text_post("u1", "https://example.com/a")).await;

        let response = app.send(text_post("u2", "https://example.com/a")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_bytes(response).await,
            b"http://localhost:8080/cu000000".to_vec()
        );

        let response = app
            .send(json_request(
                "POST",
                "/api/shorten",
                "u2",
                serde_json::json!({ "url": "https://example.com/a" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: ShortenResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.result, "http://localhost:8080/cu000000");
    }

    #[tokio::test]
    async fn json_shorten_validates_input() {
        let app = test_app(8);

        let response = app
            .send(json_request(
                "POST",
                "/api/shorten",
                "u1",
                serde_json::json!({ "url": "https://example.com" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .send(json_request(
                "POST",
                "/api/shorten",
                "u1",
                serde_json::json!({ "url": "" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(json_request(
                "POST",
                "/api/shorten",
                "u1",
                serde_json::json!({ "link": "https://example.com" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_owner_is_unauthorized() {
        let app = test_app(8);

        let request = Request::post("/")
            .body(Body::from("https://example.com"))
            .unwrap();
        assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            app.send(get("/api/user/urls", None)).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn redirect_rejects_unknown_and_malformed_codes() {
        let app = test_app(8);

        assert_eq!(
            app.send(get("/unknown1", None)).await.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            app.send(get("/a!", None)).await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn batch_returns_short_urls_by_correlation_id() {
        let app = test_app(8);

        let response = app
            .send(json_request(
                "POST",
                "/api/shorten/batch",
                "u1",
                serde_json::json!([
                    { "correlation_id": "x", "original_url": "https://a.example" },
                    { "correlation_id": "y", "original_url": "https://b.example" }
                ]),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Vec<BatchResponseEntry> =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].correlation_id, "x");
        assert_eq!(body[0].short_url, "http://localhost:8080/cu000000");
        assert_eq!(body[1].correlation_id, "y");

        let response = app
            .send(json_request(
                "POST",
                "/api/shorten/batch",
                "u1",
                serde_json::json!([
                    { "correlation_id": "z", "original_url": "" }
                ]),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listing_is_scoped_to_owner() {
        let app = test_app(8);
        app.send(text_post("u1", "https://a.example")).await;
        app.send(text_post("u2", "https://b.example")).await;

        let response = app.send(get("/api/user/urls", Some("u1"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Vec<UserUrl> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].original_url, "https://a.example");
        assert_eq!(body[0].short_url, "http://localhost:8080/cu000000");

        let response = app.send(get("/api/user/urls", Some("nobody"))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn delete_is_accepted_and_applied_in_background() {
        let app = test_app(8);
        app.send(text_post("u1", "https://a.example")).await;

        let response = app
            .send(json_request(
                "DELETE",
                "/api/user/urls",
                "u1",
                serde_json::json!(["cu000000"]),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let code = ShortCode::new_unchecked("cu000000");
        let mut deleted = false;
        for _ in 0..50 {
            if app.registry.resolve(&code).await.unwrap().deleted {
                deleted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(deleted, "deletion was never applied");

        assert_eq!(
            app.send(get("/cu000000", None)).await.status(),
            StatusCode::GONE
        );
    }

    #[tokio::test]
    async fn delete_rejects_malformed_codes() {
        let app = test_app(8);

        let response = app
            .send(json_request(
                "DELETE",
                "/api/user/urls",
                "u1",
                serde_json::json!(["ok-code", "no"]),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ping_reports_healthy_backend() {
        let app = test_app(8);
        assert_eq!(app.send(get("/ping", None)).await.status(), StatusCode::OK);
    }
}
