use axum::{
    Json, Router,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, header},
    routing::get,
};
use log::{error, info, warn};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, is_write_request};
use crate::response::{ApiError, Response};
use crate::saving;
use crate::spreadsheet::MemoryWorkbook;

pub struct AppState {
    dispatcher: Mutex<Dispatcher<MemoryWorkbook>>,
    data_file: Option<PathBuf>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher<MemoryWorkbook>, data_file: Option<PathBuf>) -> Self {
        AppState {
            dispatcher: Mutex::new(dispatcher),
            data_file,
        }
    }
}

/// Both transports share one path: `GET /` takes the request as query
/// parameters, `POST /` as a JSON object or an array of objects.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_get).post(handle_post))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let auth = config.load_auth()?;
    for name in auth.unsafe_users() {
        warn!("user {:?} has an unsafe key; use it for prototyping only", name);
    }

    let workbook = config.load_workbook()?;
    let dispatcher = Dispatcher::new(workbook, auth).with_config(config.dispatch_config());
    let app_state = Arc::new(AppState::new(dispatcher, config.data.clone()));

    let app = router(app_state);

    let listener = TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_get(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Json<Value> {
    let request = match parse_query(query.as_deref().unwrap_or("")) {
        Ok(params) => Value::Object(params),
        Err(err) => return Json(Response::from(err).to_json()),
    };
    Json(dispatch(&state, &request))
}

async fn handle_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    match serde_json::from_slice::<Value>(&body) {
        Ok(request) => Json(dispatch(&state, &request)),
        Err(err) => {
            warn!("rejected POST body: {}", err);
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let response: Response = ApiError::new(
                400,
                "invalid_post_payload",
                json!({
                    "payload": String::from_utf8_lossy(&body),
                    "type": content_type,
                }),
            )
            .into();
            Json(response.to_json())
        }
    }
}

/// Decode a query string into request fields. `+` stands for a space.
fn parse_query(query: &str) -> Result<Map<String, Value>, ApiError> {
    let mut params = Map::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_component(name)?, Value::String(decode_component(value)?));
    }
    Ok(params)
}

fn decode_component(raw: &str) -> Result<String, ApiError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|s| s.into_owned())
        .map_err(|e| ApiError::internal(e.to_string()))
}

fn dispatch(state: &AppState, request: &Value) -> Value {
    let mut dispatcher = match state.dispatcher.lock() {
        Ok(dispatcher) => dispatcher,
        Err(_) => return Response::from(ApiError::internal("dispatcher lock poisoned")).to_json(),
    };

    let response = dispatcher.handle_body(request);

    if let Some(path) = &state.data_file {
        if is_write_request(request) {
            if let Err(err) = saving::save_workbook(dispatcher.workbook(), path) {
                error!("failed to save workbook to {}: {}", path.display(), err);
            }
        }
    }

    response
}
