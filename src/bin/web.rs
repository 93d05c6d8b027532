use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ligue1_predictor::{Config, Prediction, PredictionRequest, Predictor, PredictorError};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Artifacts are loaded once at startup and never mutated
type SharedPredictor = Arc<Predictor>;

enum ApiError {
    /// Body was not a well-formed prediction request
    Body(JsonRejection),
    Prediction(PredictorError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl From<PredictorError> for ApiError {
    fn from(err: PredictorError) -> Self {
        ApiError::Prediction(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Body(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::Prediction(err) => {
                let status = match &err {
                    e if e.is_invalid_input() => StatusCode::BAD_REQUEST,
                    PredictorError::UnknownTeam(_) => StatusCode::NOT_FOUND,
                    PredictorError::IncompleteProfile { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!("Prediction failed: {}", err);
                }
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn health(State(predictor): State<SharedPredictor>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model_trained_at": predictor.model().trained_at,
        "last_update": predictor
            .last_update()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string()),
    }))
}

async fn teams(State(predictor): State<SharedPredictor>) -> impl IntoResponse {
    Json(json!({ "teams": predictor.teams() }))
}

async fn predict(
    State(predictor): State<SharedPredictor>,
    payload: std::result::Result<Json<PredictionRequest>, JsonRejection>,
) -> std::result::Result<Json<Prediction>, ApiError> {
    let Json(request) = payload?;
    let prediction = predictor.predict(&request)?;
    Ok(Json(prediction))
}

fn app(predictor: SharedPredictor) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/teams", get(teams))
        .route("/api/predict", post(predict))
        .layer(TraceLayer::new_for_http())
        .with_state(predictor)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let predictor = Predictor::load(&config.model_path, &config.stats_path).with_context(|| {
        format!(
            "Model or statistics file not found ({} / {}) - run `cli train` first",
            config.model_path.display(),
            config.stats_path.display()
        )
    })?;

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid HOST:PORT configuration")?;

    tracing::info!("Prediction service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(Arc::new(predictor))).await?;

    Ok(())
}
