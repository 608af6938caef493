//! HTTP surface for pdfocr.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /ocr` – Upload a PDF as multipart form data (`file`, optional `language`, `optimize`,
//!   `force_ocr`) and receive the extracted text plus job metrics.
//! - `GET /languages` – List the OCR languages offered to callers.
//! - `GET /health` – Liveness probe with a timestamp and toolchain availability.
//! - `GET /metrics` – Observe job and page counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::config::get_config;
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    ExtractionApi, ExtractionOptions, JobReport, JobRequest, Language, ProcessingError,
    SUPPORTED_LANGUAGES,
};
use crate::toolchain::ToolchainStatus;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::Field},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Build the HTTP router exposing the extraction API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ExtractionApi + 'static,
{
    let config = get_config();
    Router::new()
        .route("/ocr", post(extract_document::<S>))
        .route("/languages", get(list_languages))
        .route("/health", get(health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(config.cors_origins.as_deref()))
        .with_state(service)
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        tracing::debug!("CORS allows all origins");
        layer.allow_origin(Any)
    } else {
        tracing::debug!(count = origins.len(), "CORS restricted to configured origins");
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Run one extraction Job for an uploaded PDF.
///
/// Accepts multipart form data with a required `file` part and optional `language`,
/// `optimize`, and `force_ocr` (or `forceOcr`) text parts. Unknown parts are ignored.
async fn extract_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<JobReport>, AppError>
where
    S: ExtractionApi,
{
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut options = ExtractionOptions::default();

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(invalid)?;
                upload = Some((filename, bytes.to_vec()));
            }
            "language" => options.language = field_text(field).await?,
            "optimize" => options.optimize = parse_flag(&name, &field_text(field).await?)?,
            "force_ocr" | "forceOcr" => {
                options.force_ocr = parse_flag(&name, &field_text(field).await?)?;
            }
            _ => {}
        }
    }

    let Some((filename, bytes)) = upload else {
        return Err(AppError(ProcessingError::InvalidInput(
            "No file provided".to_string(),
        )));
    };

    let report = service
        .extract(JobRequest {
            filename,
            bytes,
            options,
        })
        .await?;
    tracing::info!(
        job_id = %report.job_id,
        strategy = %report.metrics.strategy_used,
        pages = report.metrics.page_count,
        "OCR request completed"
    );
    Ok(Json(report))
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(invalid)
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(AppError(ProcessingError::InvalidInput(format!(
            "Invalid boolean for {name}: {other}"
        )))),
    }
}

fn invalid(error: impl std::fmt::Display) -> AppError {
    AppError(ProcessingError::InvalidInput(error.to_string()))
}

/// Response body for `GET /languages`.
#[derive(Serialize)]
struct LanguagesResponse {
    languages: &'static [Language],
}

async fn list_languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: SUPPORTED_LANGUAGES,
    })
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    toolchain: ToolchainStatus,
}

async fn health<S>(State(service): State<Arc<S>>) -> Json<HealthResponse>
where
    S: ExtractionApi,
{
    let now = OffsetDateTime::now_utc();
    let timestamp = now
        .format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    Json(HealthResponse {
        status: "healthy",
        timestamp,
        toolchain: service.toolchain_status(),
    })
}

/// Return the job and page counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: ExtractionApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ocr",
                method: "POST",
                path: "/ocr",
                description: "Extract text from an uploaded PDF (multipart form data). Response returns { \"success\": true, \"text\": string, \"processing_info\": { \"strategy_used\": string, ... } }.",
                request_example: Some(json!({
                    "file": "document.pdf",
                    "language": "eng",
                    "optimize": "true",
                    "force_ocr": "false"
                })),
            },
            CommandDescriptor {
                name: "languages",
                method: "GET",
                path: "/languages",
                description: "Return the OCR language codes offered by this server.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Report liveness and which external tools are installed.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return job and page counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

struct AppError(ProcessingError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ProcessingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProcessingError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ProcessingError::Workspace { .. } | ProcessingError::InvalidState(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body = Json(json!({ "success": false, "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self(inner)
    }
}
