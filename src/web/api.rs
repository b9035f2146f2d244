//! Defines the Axum API routes and handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use tokio::sync::broadcast;

use crate::engine::EngineError;
use crate::profile::Profile;
use crate::roaster::{RoasterHandle, ServiceError, StopReport};
use crate::storage::{ProfileStore, RoastLogStore, StorageError};
use crate::web::models::{LogResponse, LogsResponse, MessageResponse, PreheatResponse, ProfilesResponse};
use crate::web::ws::ws_handler;

#[derive(Clone)]
pub struct AppState {
    pub roaster: RoasterHandle,
    pub logs: RoastLogStore,
    pub profiles: ProfileStore,
    /// Closes open WebSockets when the host shuts down.
    pub shutdown: broadcast::Sender<()>,
}

/// Helper to create a JSON error response with a message and status code
fn json_error(message: &str, status: StatusCode) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn service_error(e: ServiceError) -> axum::response::Response {
    let status = match &e {
        ServiceError::Engine(EngineError::InvalidProfile(_)) => StatusCode::BAD_REQUEST,
        ServiceError::Engine(err) if err.is_state_violation() => StatusCode::CONFLICT,
        ServiceError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Storage(err) => return storage_error(err),
        ServiceError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    json_error(&e.to_string(), status)
}

fn storage_error(e: &StorageError) -> axum::response::Response {
    let status = match e {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::InvalidName(_) | StorageError::InvalidProfile(_) => StatusCode::BAD_REQUEST,
        _ => {
            tracing::error!("Storage failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(&e.to_string(), status)
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/start_preheat", post(start_preheat))
        .route("/start_roast", post(start_roast))
        .route("/stop_roast", get(stop_roast).post(stop_roast))
        .route("/reset", post(reset))
        .route("/current_profile", put(load_profile))
        .route("/status", get(get_status))
        .route("/roast_logs", get(list_logs))
        .route("/roast_log/{filename}", get(get_log))
        .route("/profiles", get(list_profiles))
        .route(
            "/profiles/{name}",
            get(get_profile).put(save_profile).delete(delete_profile),
        )
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn start_preheat(State(state): State<AppState>) -> axum::response::Response {
    match state.roaster.start_preheat().await {
        Ok(target_temperature) => (
            StatusCode::OK,
            Json(PreheatResponse {
                message: "Preheating started".to_string(),
                target_temperature,
            }),
        )
            .into_response(),
        Err(e) => service_error(e),
    }
}

/// Body: `{"setpoints": [{"time": 0, "temperature": 200}, ...]}`.
async fn start_roast(State(state): State<AppState>, Json(profile): Json<Profile>) -> axum::response::Response {
    match state.roaster.start_roast(profile).await {
        Ok(start) => (StatusCode::OK, Json(start)).into_response(),
        Err(e) => service_error(e),
    }
}

async fn stop_roast(State(state): State<AppState>) -> axum::response::Response {
    match state.roaster.stop_roast().await {
        Ok(StopReport::Stopped { log }) => {
            (StatusCode::OK, Json(MessageResponse::new("Roast stopped").with_log(Some(log)))).into_response()
        }
        Ok(StopReport::NoRoastInProgress) => {
            (StatusCode::OK, Json(MessageResponse::new("No roast in progress"))).into_response()
        }
        Err(e) => service_error(e),
    }
}

async fn reset(State(state): State<AppState>) -> axum::response::Response {
    match state.roaster.reset().await {
        Ok(log) => (StatusCode::OK, Json(MessageResponse::new("Roaster reset").with_log(log))).into_response(),
        Err(e) => service_error(e),
    }
}

async fn load_profile(State(state): State<AppState>, Json(profile): Json<Profile>) -> axum::response::Response {
    match state.roaster.load_profile(profile).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("Profile loaded"))).into_response(),
        Err(e) => service_error(e),
    }
}

async fn get_status(State(state): State<AppState>) -> axum::response::Response {
    match state.roaster.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => service_error(e),
    }
}

async fn list_logs(State(state): State<AppState>) -> axum::response::Response {
    match state.logs.list().await {
        Ok(logs) => (StatusCode::OK, Json(LogsResponse { logs })).into_response(),
        Err(e) => storage_error(&e),
    }
}

async fn get_log(State(state): State<AppState>, Path(filename): Path<String>) -> axum::response::Response {
    match state.logs.read(&filename).await {
        Ok(data) => (StatusCode::OK, Json(LogResponse { data })).into_response(),
        Err(StorageError::NotFound(_)) => json_error("Log file not found", StatusCode::NOT_FOUND),
        Err(e) => storage_error(&e),
    }
}

async fn list_profiles(State(state): State<AppState>) -> axum::response::Response {
    match state.profiles.list().await {
        Ok(profiles) => (StatusCode::OK, Json(ProfilesResponse { profiles })).into_response(),
        Err(e) => storage_error(&e),
    }
}

async fn get_profile(State(state): State<AppState>, Path(name): Path<String>) -> axum::response::Response {
    match state.profiles.fetch(&name).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => storage_error(&e),
    }
}

async fn save_profile(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(profile): Json<Profile>,
) -> axum::response::Response {
    match state.profiles.save(&name, &profile).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("Profile saved"))).into_response(),
        Err(e) => storage_error(&e),
    }
}

async fn delete_profile(State(state): State<AppState>, Path(name): Path<String>) -> axum::response::Response {
    match state.profiles.delete(&name).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::new("Profile deleted"))).into_response(),
        Err(e) => storage_error(&e),
    }
}
