//! HTTP surface of the packer: one-shot and streamed packing, strategy
//! comparison, and the OpenAPI document. CORS is open to any origin.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::dataset::{self, DatasetKind};
use crate::grid::GridStatistics;
use crate::model::{Box3D, ContainerSpec, ValidationError};
use crate::optimizer::{
    ComparisonReport, PackingConfig, PackingResult, Strategy, StrategyRun, compare_strategies,
    pack_objects_with_config, pack_objects_with_progress,
};
use crate::types::{Dimensional, Positioned};

/// Upper bound for generated comparison data sets.
const MAX_GENERATED_OBJECTS: usize = 5000;

#[derive(Clone)]
struct ApiState {
    optimizer_config: OptimizerConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>grid_packer API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Container of a request, given either by `dims` or by a `preset` name
/// (`small`, `medium`, `sea_container`). Omitting `max_weight` means no
/// weight limit.
#[derive(Deserialize, Clone, ToSchema)]
pub struct ContainerRequest {
    #[serde(default)]
    #[schema(value_type = [f64; 3], nullable = true, example = json!([50.0, 40.0, 30.0]))]
    pub dims: Option<(f64, f64, f64)>,
    #[serde(default)]
    #[schema(nullable = true, example = "sea_container")]
    pub preset: Option<String>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub max_weight: Option<f64>,
}

impl ContainerRequest {
    fn into_spec(self) -> Result<ContainerSpec, ValidationError> {
        let dims = match (self.dims, self.preset.as_deref()) {
            (Some(dims), None) => dims,
            (None, Some(name)) => dataset::preset_container(name).ok_or_else(|| {
                ValidationError::InvalidConfiguration(format!("unknown container preset '{}'", name))
            })?,
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidConfiguration(
                    "give either dims or preset, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(ValidationError::InvalidConfiguration(
                    "container needs dims or a preset".to_string(),
                ));
            }
        };
        ContainerSpec::new(dims, self.max_weight)
    }
}

/// Box of a request. Omitting `weight` uses a weight of 1.
#[derive(Deserialize, Clone, ToSchema)]
pub struct ObjectRequest {
    pub id: usize,
    #[schema(value_type = [f64; 3], example = json!([10.0, 8.0, 6.0]))]
    pub dims: (f64, f64, f64),
    #[serde(default)]
    #[schema(nullable = true)]
    pub weight: Option<f64>,
}

impl ObjectRequest {
    fn into_box(self) -> Result<Box3D, ValidationError> {
        Box3D::new(
            self.id,
            self.dims,
            self.weight.unwrap_or(Box3D::DEFAULT_WEIGHT),
        )
    }
}

fn validate_objects(objects: Vec<ObjectRequest>) -> Result<Vec<Box3D>, ValidationError> {
    objects.into_iter().map(ObjectRequest::into_box).collect()
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "dims": [50.0, 40.0, 30.0], "max_weight": 500.0 },
        "objects": [
            { "id": 1, "dims": [10.0, 8.0, 6.0], "weight": 5.0 },
            { "id": 2, "dims": [15.0, 12.0, 10.0] }
        ],
        "strategy": "pruned",
        "allow_rotations": true
    })
)]
pub struct PackRequest {
    pub container: ContainerRequest,
    pub objects: Vec<ObjectRequest>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotations: Option<bool>,
    /// Smallest box dimension to size the grid for; derived from the container when omitted.
    #[serde(default)]
    #[schema(nullable = true)]
    pub expected_min_box_dim: Option<f64>,
}

#[derive(Debug)]
struct ValidatedPackRequest {
    spec: ContainerSpec,
    objects: Vec<Box3D>,
    strategy: Strategy,
    allow_rotations: Option<bool>,
    expected_min_box_dim: Option<f64>,
}

impl ValidatedPackRequest {
    /// Applies the request-level overrides to the service configuration.
    fn packing_config(&self, base: PackingConfig) -> Result<PackingConfig, ValidationError> {
        let mut config = base;
        if let Some(allow_rotations) = self.allow_rotations {
            config.allow_item_rotation = allow_rotations;
        }
        if self.expected_min_box_dim.is_some() {
            config.expected_min_box_dim = self.expected_min_box_dim;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug)]
enum RequestValidationError {
    InvalidContainer(ValidationError),
    InvalidObject(ValidationError),
    InvalidInput(String),
}

impl PackRequest {
    fn into_validated(self) -> Result<ValidatedPackRequest, RequestValidationError> {
        let spec = self
            .container
            .into_spec()
            .map_err(RequestValidationError::InvalidContainer)?;
        let objects =
            validate_objects(self.objects).map_err(RequestValidationError::InvalidObject)?;

        Ok(ValidatedPackRequest {
            spec,
            objects,
            strategy: self.strategy.unwrap_or_default(),
            allow_rotations: self.allow_rotations,
            expected_min_box_dim: self.expected_min_box_dim,
        })
    }
}

/// Parameters for a generated data set.
#[derive(Deserialize, Clone, ToSchema)]
pub struct GenerateRequest {
    pub kind: DatasetKind,
    pub count: usize,
    #[serde(default)]
    #[schema(nullable = true)]
    pub seed: Option<u64>,
}

/// Request for the strategy comparison. Exactly one of `objects` and `generate` must be set.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "dims": [100.0, 80.0, 60.0] },
        "generate": { "kind": "uniform", "count": 200, "seed": 42 }
    })
)]
pub struct CompareRequest {
    pub container: ContainerRequest,
    #[serde(default)]
    #[schema(nullable = true)]
    pub objects: Option<Vec<ObjectRequest>>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub generate: Option<GenerateRequest>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotations: Option<bool>,
}

impl CompareRequest {
    fn into_validated(
        self,
    ) -> Result<(ContainerSpec, Vec<Box3D>, Option<bool>), RequestValidationError> {
        let spec = self
            .container
            .into_spec()
            .map_err(RequestValidationError::InvalidContainer)?;

        let objects = match (self.objects, self.generate) {
            (Some(objects), None) => {
                validate_objects(objects).map_err(RequestValidationError::InvalidObject)?
            }
            (None, Some(generate)) => {
                if generate.count > MAX_GENERATED_OBJECTS {
                    return Err(RequestValidationError::InvalidInput(format!(
                        "count must not exceed {}, got: {}",
                        MAX_GENERATED_OBJECTS, generate.count
                    )));
                }
                dataset::generate(
                    generate.kind,
                    generate.count,
                    generate.seed.unwrap_or(dataset::DEFAULT_SEED),
                )
                .map_err(RequestValidationError::InvalidObject)?
            }
            _ => {
                return Err(RequestValidationError::InvalidInput(
                    "Exactly one of 'objects' and 'generate' must be specified".to_string(),
                ));
            }
        };

        Ok((spec, objects, self.allow_rotations))
    }
}

/// Response of the packing endpoint.
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub strategy: Strategy,
    #[schema(value_type = [f64; 3], example = json!([50.0, 40.0, 30.0]))]
    pub dims: (f64, f64, f64),
    /// `null` when the weight is not limited.
    pub max_weight: Option<f64>,
    pub placed: Vec<PackedObject>,
    pub unplaced: Vec<PackedUnplacedObject>,
    pub is_complete: bool,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    pub total_weight: f64,
    pub positions_examined: u64,
    pub elapsed_ms: f64,
    pub grid: Option<GridStatistics>,
}

/// Single placed box in the response.
///
/// # Fields
/// * `id` - Box ID
/// * `pos` - Minimum corner (x, y, z) in the container
/// * `dims` - Extents under the chosen orientation
/// * `original_dims` - Dimensions as requested
/// * `orientation` - Index of the chosen orientation (0 to 5)
#[derive(Serialize, ToSchema)]
pub struct PackedObject {
    pub id: usize,
    #[schema(value_type = [f64; 3], example = json!([0.0, 0.0, 0.0]))]
    pub pos: (f64, f64, f64),
    #[schema(value_type = [f64; 3], example = json!([10.0, 8.0, 6.0]))]
    pub dims: (f64, f64, f64),
    #[schema(value_type = [f64; 3], example = json!([10.0, 8.0, 6.0]))]
    pub original_dims: (f64, f64, f64),
    pub orientation: usize,
    pub weight: f64,
}

#[derive(Serialize, ToSchema)]
pub struct PackedUnplacedObject {
    pub id: usize,
    pub weight: f64,
    #[schema(value_type = [f64; 3], example = json!([200.0, 5.0, 5.0]))]
    pub dims: (f64, f64, f64),
    pub reason_code: String,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn container_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Container rejected",
        details,
    )
}

fn task_failed_error(err: tokio::task::JoinError) -> Response {
    eprintln!("❌ Packing task failed: {err}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Packing failed",
        err.to_string(),
    )
}

fn request_error_response(err: RequestValidationError) -> Response {
    match err {
        RequestValidationError::InvalidContainer(err) => container_config_error(err.to_string()),
        RequestValidationError::InvalidObject(err) => validation_error(err.to_string()),
        RequestValidationError::InvalidInput(details) => validation_error(details),
    }
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
    base: PackingConfig,
) -> Result<(ValidatedPackRequest, PackingConfig), Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    let request = payload.into_validated().map_err(request_error_response)?;
    let config = request
        .packing_config(base)
        .map_err(|err| container_config_error(err.to_string()))?;
    Ok((request, config))
}

impl PackResponse {
    /// Creates a PackResponse from a PackingResult.
    pub fn from_packing_result(result: PackingResult) -> Self {
        let PackingResult {
            strategy,
            spec,
            placed,
            unplaced,
            volume_utilization,
            weight_utilization,
            total_weight,
            positions_examined,
            elapsed,
            grid,
            statistics: _,
        } = result;

        let is_complete = unplaced.is_empty();

        Self {
            strategy,
            dims: spec.dims,
            max_weight: spec.has_weight_limit().then_some(spec.max_weight),
            placed: placed
                .into_iter()
                .map(|b| PackedObject {
                    id: b.id,
                    pos: b.position().as_tuple(),
                    dims: b.dimensions().as_tuple(),
                    original_dims: b.dims,
                    orientation: b.orientation().index(),
                    weight: b.weight,
                })
                .collect(),
            unplaced: unplaced
                .into_iter()
                .map(|entry| PackedUnplacedObject {
                    id: entry.object.id,
                    weight: entry.object.weight,
                    dims: entry.object.dims,
                    reason_code: entry.reason.code().to_string(),
                    reason: entry.reason.to_string(),
                })
                .collect(),
            is_complete,
            volume_utilization,
            weight_utilization,
            total_weight,
            positions_examined,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            grid,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_pack, handle_pack_stream, handle_compare),
    components(
        schemas(
            PackRequest,
            ContainerRequest,
            ObjectRequest,
            PackResponse,
            PackedObject,
            PackedUnplacedObject,
            CompareRequest,
            GenerateRequest,
            DatasetKind,
            ComparisonReport,
            StrategyRun,
            Strategy,
            GridStatistics,
            ErrorResponse
        )
    ),
    tags((name = "packing", description = "Endpoints for single-container packing"))
)]
struct ApiDoc;

/// Builds the application router.
pub fn router(optimizer_config: OptimizerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/compare", post(handle_compare))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { optimizer_config })
}

/// Starts the API server and blocks until it terminates.
///
/// # Errors
/// Returns the I/O error if the listener cannot be bound or the server fails.
pub async fn start_api_server(
    config: ApiConfig,
    optimizer_config: OptimizerConfig,
) -> std::io::Result<()> {
    let app = router(optimizer_config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let display_host = config.display_host().to_string();
    println!(
        "🚀 Grid packer listening on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        println!("💡 Local access: http://localhost:{}", config.port());
    }
    println!("📦 Routes:");
    println!("   - POST /pack");
    println!("   - POST /pack_stream");
    println!("   - POST /compare");
    println!("📑 OpenAPI:");
    println!("   - GET /docs");
    println!("   - GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// `POST /pack`: packs all objects and answers once the run is finished.
///
/// Packs the boxes, in request order, into the given container.
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Packing finished", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Request failed validation",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Packing task failed", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (request, config) =
        match parse_pack_request(payload, state.optimizer_config.packing_config()) {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };

    let ValidatedPackRequest {
        spec,
        objects,
        strategy,
        ..
    } = request;
    println!(
        "📥 New pack request: {} objects, strategy {}",
        objects.len(),
        strategy
    );

    let outcome = tokio::task::spawn_blocking(move || {
        pack_objects_with_config(objects, spec, strategy, config)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            println!(
                "📦 Result: {} placed, {} unplaced, {:.1}% volume",
                result.placed_count(),
                result.unplaced_count(),
                result.volume_utilization * 100.0
            );
            let response = PackResponse::from_packing_result(result);
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Err(err)) => container_config_error(err.to_string()),
        Err(err) => task_failed_error(err),
    }
}

/// `POST /pack_stream`: the same run, reported event by event.
///
/// Each SSE `data` line carries one `PackEvent` as JSON.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "One PackEvent per SSE message",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Request failed validation",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (request, config) =
        match parse_pack_request(payload, state.optimizer_config.packing_config()) {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };

    let ValidatedPackRequest {
        spec,
        objects,
        strategy,
        ..
    } = request;

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let outcome = pack_objects_with_progress(objects, spec, strategy, config, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver only means the client went away.
                let _ = tx.blocking_send(json);
            }
        });
        if let Err(err) = outcome {
            eprintln!("❌ Streaming pack failed: {err}");
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// `POST /compare`: runs every strategy on the same boxes.
///
/// Runs the pruned, brute-force and baseline strategies on the same boxes.
#[utoipa::path(
    post,
    path = "/compare",
    request_body = CompareRequest,
    responses(
        (status = 200, description = "Comparison finished", body = ComparisonReport),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Request failed validation",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Comparison task failed", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_compare(
    State(state): State<ApiState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    let (spec, objects, allow_rotations) = match payload.into_validated() {
        Ok(parts) => parts,
        Err(err) => return request_error_response(err),
    };

    let mut config = state.optimizer_config.packing_config();
    if let Some(allow_rotations) = allow_rotations {
        config.allow_item_rotation = allow_rotations;
    }

    println!("📥 New compare request: {} objects", objects.len());
    let outcome =
        tokio::task::spawn_blocking(move || compare_strategies(&objects, spec, config)).await;

    match outcome {
        Ok(Ok(report)) => {
            if let Some(speedup) = report.speedup {
                println!("📊 Pruned search {:.1}x faster than brute force", speedup);
            }
            (StatusCode::OK, Json(report)).into_response()
        }
        Ok(Err(err)) => container_config_error(err.to_string()),
        Err(err) => task_failed_error(err),
    }
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
