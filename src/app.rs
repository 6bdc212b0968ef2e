use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use handlebars::Handlebars;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::assembler::{AssemblyRequest, MissingFragment};
use crate::config::ProposalConfig;
use crate::history::HistoryStore;
use crate::proposal::ProposalBuilder;
use crate::upload::{ScopedImage, UploadPolicy};

const FORM_TEMPLATE: &str = "form";

pub struct AppState {
    /// Read by handlers that never create proposals.
    config: ProposalConfig,
    /// Proposals are created one at a time.
    builder: Mutex<ProposalBuilder>,
    history: HistoryStore,
    policy: UploadPolicy,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(config: ProposalConfig) -> Result<Self, handlebars::TemplateError> {
        let mut templates = Handlebars::new();
        templates.register_template_string(FORM_TEMPLATE, include_str!("./static/form.hbs"))?;

        Ok(AppState {
            history: HistoryStore::new(config.output.history_file.clone()),
            policy: UploadPolicy::from(&config.uploads),
            builder: Mutex::new(ProposalBuilder::new(config.clone())),
            config,
            templates,
        })
    }
}

#[derive(Serialize, Default)]
struct ProposalResponse {
    status: String,
    filename: Option<String>,
    download_url: Option<String>,
    missing: Vec<MissingFragment>,
    message: Option<String>,
}

impl ProposalResponse {
    fn error(status: StatusCode, message: impl Into<String>) -> Response {
        let body = ProposalResponse {
            status: "error".to_string(),
            message: Some(message.into()),
            ..Default::default()
        };
        (status, Json(body)).into_response()
    }
}

pub async fn run(config: ProposalConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config)?;
    // Room for two maximal images plus the text fields.
    let body_limit = usize::try_from(state.policy.max_bytes.saturating_mul(2))
        .unwrap_or(usize::MAX)
        .saturating_add(1024 * 1024);
    let bind = state.config.server.bind.clone();
    let output_dir = state.config.output.dir.clone();
    std::fs::create_dir_all(&output_dir)?;

    let app_state = Arc::new(state);

    // Build router
    let app = Router::new()
        .route("/", get(serve_form))
        .route("/api/proposals", post(create_proposal))
        .route("/api/submissions", get(list_submissions))
        .nest_service("/files", ServeDir::new(output_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state);

    // Start server
    let listener = TcpListener::bind(&bind).await?;
    info!("listening on http://{bind}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_form(State(state): State<Arc<AppState>>) -> Response {
    let config = &state.config;
    let data = serde_json::json!({
        "technologies": config.catalog.technologies,
        "models": config.catalog.models,
        "max_size_mb": config.uploads.max_size_mb,
        "allowed_types": config.uploads.allowed_types.join(", "),
        "accept": config
            .uploads
            .allowed_types
            .iter()
            .map(|t| format!(".{t}"))
            .collect::<Vec<_>>()
            .join(","),
    });

    match state.templates.render(FORM_TEMPLATE, &data) {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!("failed to render form: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn create_proposal(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut request = AssemblyRequest::default();

    // Process the multipart form data
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return ProposalResponse::error(StatusCode::BAD_REQUEST, e.to_string()),
        };
        let name = field.name().unwrap_or("unknown").to_string();

        match name.as_str() {
            "logo" | "topology" => {
                let field_name = if name == "logo" { "logo" } else { "topology" };
                let original_name = field.file_name().unwrap_or_default().to_string();
                let declared_type = field.content_type().map(str::to_string);
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(e) => return ProposalResponse::error(StatusCode::BAD_REQUEST, e.to_string()),
                };
                // Browsers send an empty part for an untouched file input.
                if bytes.is_empty() && original_name.is_empty() {
                    continue;
                }
                let image = match ScopedImage::from_bytes(
                    field_name,
                    &original_name,
                    declared_type.as_deref(),
                    &bytes,
                    &state.policy,
                ) {
                    Ok(Ok(image)) => image,
                    Ok(Err(e)) => return ProposalResponse::error(StatusCode::BAD_REQUEST, e.to_string()),
                    Err(e) => {
                        error!("failed to store {field_name} upload: {e}");
                        return ProposalResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
                    }
                };
                if field_name == "logo" {
                    request.logo = Some(image);
                } else {
                    request.topology = Some(image);
                }
            }
            _ => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => return ProposalResponse::error(StatusCode::BAD_REQUEST, e.to_string()),
                };
                match name.as_str() {
                    "customer" => request.customer = value,
                    "project" => request.project = value,
                    "design_description" => request.design_description = value,
                    "technologies" => request.technologies.push(value),
                    "models" => request.models.push(value),
                    other => warn!("ignoring unknown form field {other:?}"),
                }
            }
        }
    }

    let worker_state = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || {
        let builder = worker_state.builder.lock().unwrap_or_else(|e| e.into_inner());
        builder.create(request)
    })
    .await;

    match outcome {
        Ok(Ok(report)) => {
            let body = ProposalResponse {
                status: if report.is_complete() { "ok" } else { "partial" }.to_string(),
                download_url: Some(format!("/files/{}", urlencoding::encode(&report.filename))),
                filename: Some(report.filename),
                missing: report.missing,
                message: None,
            };
            Json(body).into_response()
        }
        Ok(Err(e)) if e.is_validation() => ProposalResponse::error(StatusCode::BAD_REQUEST, e.to_string()),
        Ok(Err(e)) => {
            error!("proposal failed: {e}");
            ProposalResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!("proposal worker panicked: {e}");
            ProposalResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn list_submissions(State(state): State<Arc<AppState>>) -> Response {
    match state.history.load() {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!("failed to read history: {e}");
            ProposalResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
