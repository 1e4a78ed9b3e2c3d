use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::engine::EngineError;
use crate::engine::HvacMode;
use crate::engine::ToIntegrationMessage;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

/// Body of every non-2xx response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SetTemperatureRequest {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct SetHvacModeRequest {
    hvac_mode: HvacMode,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// A command the engine refused to route
struct CommandError(EngineError);

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            EngineError::UnknownEntity(_) => StatusCode::NOT_FOUND,
            EngineError::IntegrationNotFound(_) | EngineError::IntegrationStopped(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Commands are queued for the owning integration; the outcome shows up in
/// the entity's state once the integration has handled them.
fn accepted(result: Result<(), EngineError>) -> Result<StatusCode, CommandError> {
    result.map(|_| StatusCode::ACCEPTED).map_err(CommandError)
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for GET /v1/state
#[tracing::instrument(skip(state))]
async fn engine_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(snapshot.as_ref().clone()))
}

/// Handler for GET /v1/climate/:entity_id
#[tracing::instrument(skip(state))]
async fn climate(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Response {
    let snapshot = state.engine.state_snapshot();
    match snapshot.climates.get(&entity_id) {
        Some(climate) => (StatusCode::OK, Json(climate.clone())).into_response(),
        None => CommandError(EngineError::UnknownEntity(entity_id)).into_response(),
    }
}

/// Handler for POST /v1/climate/:entity_id/temperature
#[tracing::instrument(skip(state))]
async fn set_temperature(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(body): Json<SetTemperatureRequest>,
) -> Result<StatusCode, CommandError> {
    accepted(
        state
            .engine
            .set_climate_temperature(entity_id, body.temperature),
    )
}

/// Handler for POST /v1/climate/:entity_id/hvac_mode
#[tracing::instrument(skip(state))]
async fn set_hvac_mode(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(body): Json<SetHvacModeRequest>,
) -> Result<StatusCode, CommandError> {
    accepted(state.engine.set_climate_hvac_mode(entity_id, body.hvac_mode))
}

/// Handler for POST /v1/climate/:entity_id/turn_on
#[tracing::instrument(skip(state))]
async fn turn_on(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<StatusCode, CommandError> {
    accepted(
        state
            .engine
            .send_command(ToIntegrationMessage::ClimateTurnOn { entity_id }),
    )
}

/// Handler for POST /v1/climate/:entity_id/turn_off
#[tracing::instrument(skip(state))]
async fn turn_off(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<StatusCode, CommandError> {
    accepted(
        state
            .engine
            .send_command(ToIntegrationMessage::ClimateTurnOff { entity_id }),
    )
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/state", get(engine_state))
        .route("/v1/climate/:entity_id", get(climate))
        .route("/v1/climate/:entity_id/temperature", post(set_temperature))
        .route("/v1/climate/:entity_id/hvac_mode", post(set_hvac_mode))
        .route("/v1/climate/:entity_id/turn_on", post(turn_on))
        .route("/v1/climate/:entity_id/turn_off", post(turn_off))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// This function will bind to the specified address and serve the API endpoints.
/// It will run until the provided shutdown signal is triggered.
///
/// # Arguments
/// * `listen` - The IP address to listen on (e.g., "127.0.0.1")
/// * `port` - The port to listen on (e.g., 8565)
/// * `engine` - The engine whose state is served and which routes commands
/// * `shutdown_rx` - A oneshot receiver that will trigger graceful shutdown
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::error::Error;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::ClimateState;
    use crate::engine::FromIntegrationMessage;
    use crate::engine::FromIntegrationSender;
    use crate::engine::Integration;
    use crate::engine::state::HvacAction;
    use crate::engine::state::OnOff;
    use crate::engine::state::TemperatureUnit;

    const ENTITY_ID: &str = "climate.test_heater";

    /// Integration that reports one heater and forwards every command it gets
    struct RecordingIntegration {
        commands: mpsc::UnboundedSender<ToIntegrationMessage>,
    }

    fn heater_state() -> ClimateState {
        ClimateState {
            name: "Pool Heater".to_string(),
            available: true,
            temperature_unit: TemperatureUnit::Fahrenheit,
            min_temp: 65,
            max_temp: 104,
            target_temperature: Some(84),
            current_temperature: Some(78),
            hvac_mode: HvacMode::Heat,
            hvac_action: HvacAction::Heating,
            hvac_modes: vec![HvacMode::Off, HvacMode::Heat],
            current_operation: OnOff::On,
            supported_features: vec![],
            attributes: BTreeMap::new(),
        }
    }

    #[async_trait]
    impl Integration for RecordingIntegration {
        fn name(&self) -> &str {
            "recording"
        }

        async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
            tx.send(FromIntegrationMessage::EntityDiscovered {
                entity_id: ENTITY_ID.to_string(),
                integration_name: "recording".to_string(),
            })
            .await
            .unwrap();
            tx.send(FromIntegrationMessage::ClimateStateChanged {
                entity_id: ENTITY_ID.to_string(),
                state: Box::new(heater_state()),
            })
            .await
            .unwrap();
            Ok(())
        }

        async fn handle_message(
            &mut self,
            msg: ToIntegrationMessage,
        ) -> Result<(), Box<dyn Error + Send>> {
            self.commands.send(msg).unwrap();
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
            Ok(())
        }
    }

    async fn test_router() -> (Router, mpsc::UnboundedReceiver<ToIntegrationMessage>) {
        let engine = Arc::new(Engine::new());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        engine.register_integration(
            "recording".to_string(),
            Box::new(RecordingIntegration { commands }),
        );

        let runner = engine.clone();
        tokio::spawn(async move { runner.run().await });

        tokio::time::timeout(Duration::from_secs(5), async {
            while !engine.state_snapshot().climates.contains_key(ENTITY_ID) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let state = Arc::new(AppState {
            version: "test",
            engine,
        });
        (create_router(state), commands_rx)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let (router, _rx) = test_router().await;
        let response = router
            .oneshot(Request::get("/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_info() {
        let (router, _rx) = test_router().await;
        let response = router
            .oneshot(Request::get("/v1/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["version"], "test");
    }

    #[tokio::test]
    async fn test_get_climate() {
        let (router, _rx) = test_router().await;
        let response = router
            .oneshot(
                Request::get("/v1/climate/climate.test_heater")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["hvac_mode"], "heat");
        assert_eq!(body["temperature_unit"], "°F");
        assert_eq!(body["target_temperature"], 84);
    }

    #[tokio::test]
    async fn test_get_state() {
        let (router, _rx) = test_router().await;
        let response = router
            .oneshot(Request::get("/v1/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["climates"][ENTITY_ID]["name"], "Pool Heater");
    }

    #[tokio::test]
    async fn test_set_temperature_is_routed() {
        let (router, mut rx) = test_router().await;
        let response = router
            .oneshot(post_json(
                "/v1/climate/climate.test_heater/temperature",
                serde_json::json!({ "temperature": 86.5 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            rx.recv().await.unwrap(),
            ToIntegrationMessage::ClimateSetTemperature {
                entity_id: ENTITY_ID.to_string(),
                temperature: 86.5,
            }
        );
    }

    #[tokio::test]
    async fn test_set_hvac_mode_is_routed() {
        let (router, mut rx) = test_router().await;
        let response = router
            .oneshot(post_json(
                "/v1/climate/climate.test_heater/hvac_mode",
                serde_json::json!({ "hvac_mode": "off" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            rx.recv().await.unwrap(),
            ToIntegrationMessage::ClimateSetHvacMode {
                entity_id: ENTITY_ID.to_string(),
                hvac_mode: HvacMode::Off,
            }
        );
    }

    #[tokio::test]
    async fn test_turn_on_is_routed() {
        let (router, mut rx) = test_router().await;
        let response = router
            .oneshot(
                Request::post("/v1/climate/climate.test_heater/turn_on")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            rx.recv().await.unwrap(),
            ToIntegrationMessage::ClimateTurnOn {
                entity_id: ENTITY_ID.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_mode_is_rejected_by_the_body_parser() {
        let (router, _rx) = test_router().await;
        let response = router
            .oneshot(post_json(
                "/v1/climate/climate.test_heater/hvac_mode",
                serde_json::json!({ "hvac_mode": "warm" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_entity() {
        let (router, _rx) = test_router().await;
        let response = router
            .clone()
            .oneshot(post_json(
                "/v1/climate/climate.spa/temperature",
                serde_json::json!({ "temperature": 100 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"],
            "No integration found for entity: climate.spa"
        );

        let response = router
            .oneshot(
                Request::get("/v1/climate/climate.spa")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
