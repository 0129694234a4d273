use crate::controller::{broadcast_controller, health_check_controller};
use crate::push::handler::sse_handler;
use crate::socket::handler::ws_handler;
use axum::{
    routing::{get, post},
    Router,
};
use service::AppState;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(sse_routes(app_state.clone()))
        .merge(socket_routes(app_state.clone()))
        .merge(broadcast_routes(app_state))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sse/updates", get(sse_handler))
        .with_state(app_state)
}

fn socket_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws/updates", get(ws_handler))
        .with_state(app_state)
}

fn broadcast_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sse/broadcast", post(broadcast_controller::broadcast))
        .route("/api/sse/heartbeat", get(broadcast_controller::heartbeat))
        .route("/api/sse/stats", get(broadcast_controller::stats))
        .route(
            "/api/sse/force-refresh",
            post(broadcast_controller::force_refresh),
        )
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use clap::Parser;
    use serde_json::{json, Value};
    use service::config::Config;
    use sse::{Manager, OutboundFrame};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<Manager>) {
        let config = Config::parse_from(["prefect_sync"]);
        let manager = Arc::new(Manager::new());
        let app_state = AppState::new(config, &manager);
        (define_routes(app_state), manager)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    fn connect(
        manager: &Manager,
        session: &str,
        page: events::Page,
    ) -> mpsc::UnboundedReceiver<OutboundFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.register_connection(session.to_string(), page, tx);
        rx
    }

    #[tokio::test]
    async fn health_check_responds_healthy() {
        let (app, _) = test_app();

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body_bytes[..], b"healthy");
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone_but_the_origin() {
        let (app, manager) = test_app();
        let mut own = connect(&manager, "user_1_aaa", events::Page::Dashboard);
        let mut other = connect(&manager, "user_2_bbb", events::Page::Events);

        let request = post_json(
            "/api/sse/broadcast",
            json!({
                "type": "attendance-added",
                "userId": "user_1_aaa",
                "timestamp": 1_700_000_000_000i64,
                "data": { "eventName": "Sports Day" }
            }),
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body, json!({ "success": true, "broadcastTo": 1 }));

        let frame = other.try_recv().unwrap();
        assert_eq!(frame.event_type, "attendance-added");
        assert!(own.try_recv().is_err());
        assert_eq!(manager.recent_len(), 1);
    }

    #[tokio::test]
    async fn broadcast_rejects_malformed_bodies() {
        let (app, manager) = test_app();

        let request = post_json("/api/sse/broadcast", json!({ "data": {} }));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(manager.recent_len(), 0);
    }

    #[tokio::test]
    async fn client_heartbeats_are_accepted_without_publishing() {
        let (app, manager) = test_app();

        let request = post_json(
            "/api/sse/broadcast",
            json!({ "type": "heartbeat", "userId": "user_1_aaa", "data": { "page": "events" } }),
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["broadcastTo"], 0);
        assert_eq!(manager.recent_len(), 0);
    }

    #[tokio::test]
    async fn force_refresh_targets_one_page() {
        let (app, manager) = test_app();
        let mut events_page = connect(&manager, "user_1_aaa", events::Page::Events);
        let mut dashboard = connect(&manager, "user_2_bbb", events::Page::Dashboard);

        let request = post_json(
            "/api/sse/force-refresh",
            json!({ "page": "events", "message": "Roll call changed" }),
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["refreshedClients"], 1);
        assert_eq!(body["targetPage"], "events");

        let frame = events_page.try_recv().unwrap();
        assert_eq!(frame.event_type, "force-refresh");
        assert!(frame.data.contains("Roll call changed"));
        assert!(dashboard.try_recv().is_err());
    }

    #[tokio::test]
    async fn force_refresh_without_a_body_targets_all_pages() {
        let (app, manager) = test_app();
        let _a = connect(&manager, "user_1_aaa", events::Page::Events);
        let _b = connect(&manager, "user_2_bbb", events::Page::Cetus);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/sse/force-refresh")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let body = json_body(response).await;
        assert_eq!(body["refreshedClients"], 2);
        assert_eq!(body["targetPage"], "all");
    }

    #[tokio::test]
    async fn stats_count_clients_by_page() {
        let (app, manager) = test_app();
        let _a = connect(&manager, "user_1_aaa", events::Page::Events);
        let _b = connect(&manager, "user_2_bbb", events::Page::Events);

        let request = Request::builder()
            .uri("/api/sse/stats")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["connectedClients"], 2);
        assert_eq!(body["clientsByPage"]["events"], 2);
    }

    #[tokio::test]
    async fn heartbeat_pings_connected_clients() {
        let (app, manager) = test_app();
        let mut rx = connect(&manager, "user_1_aaa", events::Page::Main);

        let request = Request::builder()
            .uri("/api/sse/heartbeat")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["connectedClients"], 1);
        assert_eq!(rx.try_recv().unwrap().event_type, "heartbeat");
    }

    #[tokio::test]
    async fn push_stream_responds_with_an_event_stream() {
        let (app, manager) = test_app();

        let request = Request::builder()
            .uri("/api/sse/updates?userId=user_1_aaa&page=ursa&timestamp=1700000000000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(manager.connected_clients(), 1);

        drop(response);
        assert_eq!(manager.connected_clients(), 0);
    }
}
