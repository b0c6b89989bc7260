//! HTTP and WebSocket routes in front of the hub.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::QueryRejection,
        ws::{WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    client::{Client, ClientKey},
    config::RelayConfig,
    error::RelayError,
    hub::HubHandle,
    message::ChatMessage,
    pump,
    room::{ClientInfo, RoomInfo, RoomStats},
};

/// Query string of a join request.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinParams {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
}

/// The identity a connection is bound to for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

/// Turns a join request into a verified identity.
///
/// Credential checks live with the login service; implementations here only
/// decide whether the identity carried by the request can be trusted.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, params: &JoinParams) -> Result<Identity, RelayError>;
}

/// Trusts the identity asserted in the query string.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerAsserted;

impl Authenticator for CallerAsserted {
    fn authenticate(&self, params: &JoinParams) -> Result<Identity, RelayError> {
        if params.user_id.trim().is_empty() {
            return Err(RelayError::Unauthorized("userId is required".into()));
        }
        if params.username.trim().is_empty() {
            return Err(RelayError::Unauthorized("username is required".into()));
        }
        Ok(Identity {
            user_id: params.user_id.clone(),
            username: params.username.clone(),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    hub: HubHandle,
    config: RelayConfig,
    auth: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(hub: HubHandle, config: RelayConfig) -> Self {
        Self::with_authenticator(hub, config, CallerAsserted)
    }

    pub fn with_authenticator(
        hub: HubHandle,
        config: RelayConfig,
        auth: impl Authenticator,
    ) -> Self {
        Self {
            hub,
            config,
            auth: Arc::new(auth),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/create-room", post(create_room))
        .route("/ws/join-room/:room_id", get(join_room))
        .route("/ws/get-client/:room_id", get(get_clients))
        .route("/ws/get-room", get(get_rooms))
        .route("/ws/room-stats/:room_id", get(room_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Accepts the body whatever its content type; only unparsable JSON is
/// rejected.
async fn create_room(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RoomInfo>, RelayError> {
    let request: RoomInfo = serde_json::from_slice(&body)
        .map_err(|err| RelayError::BadRequest(format!("invalid room: {err}")))?;
    let room = state.hub.create_room(request).await?;
    Ok(Json(room))
}

async fn get_clients(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ClientInfo>>, RelayError> {
    Ok(Json(state.hub.list_clients(&room_id).await?))
}

async fn get_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomInfo>>, RelayError> {
    Ok(Json(state.hub.list_rooms().await?))
}

async fn room_stats(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomStats>, RelayError> {
    match state.hub.room_stats(&room_id).await? {
        Some(stats) => Ok(Json(stats)),
        None => Err(RelayError::RoomNotFound(room_id)),
    }
}

async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    query: Result<Query<JoinParams>, QueryRejection>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, RelayError> {
    let Query(params) = query.map_err(|rejection| RelayError::BadRequest(rejection.body_text()))?;
    let identity = state.auth.authenticate(&params)?;
    let upgrade = upgrade.map_err(|rejection| RelayError::BadRequest(rejection.body_text()))?;

    let key = ClientKey::new(identity.user_id, identity.username, room_id);
    Ok(upgrade
        .on_upgrade(move |socket| connect(socket, key, state))
        .into_response())
}

async fn connect(socket: WebSocket, key: ClientKey, state: AppState) {
    info!(room = %key.room_id, client = %key.id, username = %key.username, "client connected");

    let (client, outbound) = Client::channel(key.clone(), state.config.outbound_capacity);
    if let Err(err) = state.hub.register(client).await {
        warn!(client = %key.id, error = %err, "failed to register client");
        return;
    }
    let notice = ChatMessage::joined(&key.username, &key.room_id);
    if let Err(err) = state.hub.broadcast(notice).await {
        warn!(client = %key.id, error = %err, "failed to announce client");
    }

    let (sink, stream) = socket.split();
    pump::serve_connection(sink, stream, outbound, key, state.hub).await;
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::hub::Hub;

    fn app() -> Router {
        let config = RelayConfig::default();
        router(AppState::new(Hub::spawn(&config), config))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn create_room_echoes_body_and_lists_it() {
        let app = app();

        let (status, body) = send(
            &app,
            post_json("/ws/create-room", r#"{"id":"r1","name":"General"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"id": "r1", "name": "General"}));

        let (status, body) = send(&app, get_request("/ws/get-room")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([{"id": "r1", "name": "General"}]));

        let (status, body) = send(&app, get_request("/ws/get-client/r1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn create_room_ignores_content_type_and_defaults_name() {
        let app = app();

        let untyped = Request::post("/ws/create-room")
            .body(Body::from(r#"{"id":"r1","name":"General"}"#))
            .expect("request");
        let (status, body) = send(&app, untyped).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"id": "r1", "name": "General"}));

        let (status, body) = send(&app, post_json("/ws/create-room", r#"{"id":"r2"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"id": "r2", "name": ""}));

        let (status, body) = send(&app, get_request("/ws/get-client/r2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn malformed_create_room_is_rejected() {
        let app = app();

        let (status, body) = send(&app, post_json("/ws/create-room", r#"{"id":"r1""#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (_, rooms) = send(&app, get_request("/ws/get-room")).await;
        assert_eq!(rooms, serde_json::json!([]));
    }

    #[tokio::test]
    async fn unknown_room_lists_no_clients_and_has_no_stats() {
        let app = app();

        let (status, body) = send(&app, get_request("/ws/get-client/nowhere")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));

        let (status, body) = send(&app, get_request("/ws/room-stats/nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown room: nowhere");
    }

    #[tokio::test]
    async fn join_without_identity_or_upgrade_is_a_client_error() {
        let app = app();

        let (status, body) = send(&app, get_request("/ws/join-room/r1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(&app, get_request("/ws/join-room/r1?userId=&username=Alice")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, body) = send(&app, get_request("/ws/join-room/r1?userId=u1&username=Alice")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[test]
    fn caller_asserted_identity_is_passed_through() {
        let params = JoinParams {
            user_id: "u1".into(),
            username: "Alice".into(),
        };
        assert_eq!(
            CallerAsserted.authenticate(&params).expect("identity"),
            Identity {
                user_id: "u1".into(),
                username: "Alice".into()
            }
        );
    }
}
