//! HTTP surface for the carbon pipeline.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::covariates::CovariateGatherer;
use crate::error::PipelineError;
use crate::estimator::{
    compute_agb_carbon, compute_soil_carbon, AgbCarbonResult, AgbInput, CarbonEstimate,
    EstimationRequest, SoilCarbonResult, SoilInput,
};
use crate::pipeline::{CarbonPipeline, ExampleInput, IngestAck, Prediction, TrainingReport};
use crate::repository::SqliteModelRepository;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CarbonPipeline>,
}

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    request: Option<EstimationRequest>,
    #[serde(default)]
    features: Option<Vec<f64>>,
    label: f64,
    #[serde(default)]
    meta: Value,
}

struct ServerError(PipelineError);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::InvalidInput(_) | PipelineError::DimensionMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::InsufficientData { .. } => StatusCode::CONFLICT,
            PipelineError::NoModel { .. } => StatusCode::NOT_FOUND,
            PipelineError::Training(_) | PipelineError::Storage(_) => {
                error!("Carbon pipeline failure: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut body = json!({ "error": self.0.to_string() });
        if let PipelineError::InsufficientData { count, required } = &self.0 {
            body["count"] = json!(count);
            body["required"] = json!(required);
        }
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for ServerError where E: Into<PipelineError> {
    fn from(err: E) -> Self { Self(err.into()) }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/estimate", post(estimate_handler))
        .route("/soil-carbon", post(soil_carbon_handler))
        .route("/agb-carbon", post(agb_carbon_handler))
        .route("/examples", post(ingest_handler))
        .route("/train", post(train_handler))
        .route("/model", get(model_info_handler))
        .route("/predict", post(predict_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: PipelineConfig) -> Result<()> {
    info!("🌱 Starting Carbon Estimation Server...");

    let repository = Arc::new(SqliteModelRepository::new(&config.db_path).await?);
    let gatherer = CovariateGatherer::default()
        .with_timeout(config.fetch_timeout)
        .with_window_days(config.covariate_window_days);
    let pipeline = CarbonPipeline::from_config(&config, repository, gatherer);

    let app = router(AppState {
        pipeline: Arc::new(pipeline),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    info!("🚀 Carbon Server listening at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn estimate_handler(
    State(state): State<AppState>,
    Json(request): Json<EstimationRequest>,
) -> Result<Json<CarbonEstimate>, ServerError> {
    Ok(Json(state.pipeline.estimate(&request)?))
}

async fn soil_carbon_handler(Json(input): Json<SoilInput>) -> Json<SoilCarbonResult> {
    Json(compute_soil_carbon(&input))
}

async fn agb_carbon_handler(Json(input): Json<AgbInput>) -> Json<AgbCarbonResult> {
    Json(compute_agb_carbon(&input))
}

async fn ingest_handler(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> Result<Json<IngestAck>, ServerError> {
    let input = match (payload.request, payload.features) {
        (Some(request), None) => ExampleInput::Request(request),
        (None, Some(features)) => ExampleInput::Features(features),
        _ => {
            return Err(PipelineError::invalid(
                "supply exactly one of 'request' or 'features'",
            )
            .into())
        }
    };
    let ack = state
        .pipeline
        .ingest_example(input, payload.label, payload.meta)
        .await?;
    Ok(Json(ack))
}

async fn train_handler(State(state): State<AppState>) -> Result<Json<TrainingReport>, ServerError> {
    Ok(Json(state.pipeline.train().await?))
}

async fn model_info_handler(State(state): State<AppState>) -> Result<Response, ServerError> {
    let response = match state.pipeline.model_info().await? {
        Some(info) => Json(info).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no model found for '{}'", state.pipeline.model_name()) })),
        )
            .into_response(),
    };
    Ok(response)
}

async fn predict_handler(
    State(state): State<AppState>,
    Json(request): Json<EstimationRequest>,
) -> Result<Json<Prediction>, ServerError> {
    Ok(Json(state.pipeline.predict(&request).await?))
}
