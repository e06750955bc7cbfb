mod api;
mod cache;
mod config;
mod error;
mod image_processing;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use groundfinder_core::{
    analyze, classify_mask, palette::DEFAULT_MATCHES, render_view, AnalysisConfig, GroundPalette,
    PigmentLibrary, RegionMap, Temperature, TemperatureParams, View,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};
use uuid::Uuid;

use crate::api::{
    AnalyzeResponse, ClusterBody, ColorRequest, GroundInsideRequest, MaskModeBody, MaskRequest,
    MatchColorResponse, PigmentMatchResponse,
};
use crate::cache::{AnalysisEntry, AnalysisStore, SharedEntry};
use crate::config::ServerConfig;
use crate::error::AppError;

/// Ground suggestions included in every analysis summary
const SUGGESTION_COUNT: usize = 3;

/// How often expired analyses are dropped
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    store: Arc<AnalysisStore>,
    pigments: Arc<PigmentLibrary>,
    palette: Arc<GroundPalette>,
    config: Arc<ServerConfig>,
}

impl AppState {
    fn new(config: ServerConfig) -> Result<Self, AppError> {
        Ok(Self {
            store: Arc::new(AnalysisStore::new(config.analysis_ttl)),
            pigments: Arc::new(PigmentLibrary::standard()?),
            palette: Arc::new(GroundPalette::standard()?),
            config: Arc::new(config),
        })
    }

    async fn entry(&self, analysis_id: &str) -> Result<SharedEntry, AppError> {
        let id = Uuid::parse_str(analysis_id)
            .map_err(|e| AppError::InvalidRequest(format!("malformed analysis id: {}", e)))?;
        self.store
            .get(&id)
            .await
            .ok_or_else(|| AppError::AnalysisNotFound(analysis_id.to_string()))
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "GroundFinder API",
        description = "Perceptual color analysis, selection masks and paint-mixing recipes",
        version = "0.1.0"
    ),
    tags(
        (name = "Analysis", description = "Image statistics and selection overlays"),
        (name = "Color", description = "Single-color matching against grounds and pigments")
    ),
    paths(health, analyze_image, mask_image, ground_inside, match_color, match_pigments),
    components(schemas(
        AnalyzeResponse,
        ClusterBody,
        MaskRequest,
        MaskModeBody,
        GroundInsideRequest,
        ColorRequest,
        MatchColorResponse,
        PigmentMatchResponse
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!("Configuration: {:?}", config);

    // Pigment candidates and palette Lab values are computed once, up front
    let state = AppState::new(config)?;
    tracing::info!(
        "Pigment library ready: {} pigments, {} candidate mixtures",
        state.pigments.pigments().len(),
        state.pigments.candidate_count()
    );

    let store = state.store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                tracing::info!("Purged {} expired analyses", purged);
            }
        }
    });

    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = router(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze_image))
        .route("/mask/{view}", post(mask_image))
        .route("/ground-inside", post(ground_inside))
        .route("/match-color", post(match_color))
        .route("/match-pigments", post(match_pigments))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .route("/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
async fn health() -> &'static str {
    "ok"
}

/// Get OpenAPI JSON specification
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Analyze an image
///
/// Accepts raw image bytes (PNG, JPEG). Returns histograms, ranked clusters,
/// the detected ground and an id for follow-up requests.
#[utoipa::path(
    post,
    path = "/analyze",
    tag = "Analysis",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Analysis summary", body = AnalyzeResponse),
        (status = 400, description = "Body is not a decodable image")
    )
)]
async fn analyze_image(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let max_edge = state.config.max_analysis_edge;
    let palette = state.palette.clone();

    let (prepared, analysis, suggestions) = tokio::task::spawn_blocking(move || {
        let prepared = image_processing::prepare(&body, max_edge)?;
        let analysis = analyze(&prepared.working, &AnalysisConfig::default())?;
        let suggestions = analysis.ground_suggestions(&palette, SUGGESTION_COUNT);
        Ok::<_, AppError>((prepared, analysis, suggestions))
    })
    .await??;

    let params = analysis.config().temperature;
    let response = AnalyzeResponse {
        analysis_id: String::new(),
        width: analysis.width(),
        height: analysis.height(),
        original_width: prepared.original.width(),
        original_height: prepared.original.height(),
        scale: prepared.scale,
        value_histogram: analysis.value_histogram().bins.clone(),
        hue_histogram: analysis.hue_histogram().bins.clone(),
        hue_neutral: analysis.hue_histogram().neutral,
        value_mode: analysis.value_mode(),
        clusters: analysis
            .clusters()
            .iter()
            .enumerate()
            .map(|(rank, cluster)| ClusterBody::new(rank, cluster, &params))
            .collect(),
        detected_ground: analysis.detected_ground(),
        temperature: analysis.temperature_counts(),
        ground_suggestions: suggestions,
    };

    let id = state
        .store
        .insert(AnalysisEntry::new(prepared.original, prepared.working, analysis))
        .await;
    tracing::info!(
        "Analysis {}: {}x{}, detected ground {:?}",
        id,
        response.width,
        response.height,
        response.detected_ground
    );

    Ok(Json(AnalyzeResponse {
        analysis_id: id.to_string(),
        ..response
    }))
}

/// Render a selection mask
///
/// Classifies pixels of a stored analysis and renders the chosen view at the
/// original upload resolution.
#[utoipa::path(
    post,
    path = "/mask/{view}",
    tag = "Analysis",
    params(
        ("view" = String, Path, description = "highlight, wash or extract")
    ),
    request_body = MaskRequest,
    responses(
        (status = 200, description = "RGBA overlay", content_type = "image/png"),
        (status = 400, description = "Invalid view or mode parameters"),
        (status = 404, description = "Analysis not found or expired")
    )
)]
async fn mask_image(
    State(state): State<AppState>,
    Path(view): Path<String>,
    Json(request): Json<MaskRequest>,
) -> Result<Response, AppError> {
    let view: View = view.parse()?;
    let shared = state.entry(&request.analysis_id).await?;

    // Held for the whole request so work on one analysis is serialized
    let entry = shared.lock().await;
    let analysis = entry.analysis.clone();
    let original = entry.original.clone();

    let png_data = tokio::task::spawn_blocking(move || {
        let mode = request.mode.into_mode(&analysis)?;
        let mask = classify_mask(&analysis, &mode)?;
        tracing::info!(
            "Mask {} on {}: {} of {} pixels",
            mode.name(),
            request.analysis_id,
            mask.count(),
            analysis.planes().len()
        );
        image_processing::encode_rgba_png(&render_view(&original, &mask, view))
    })
    .await??;
    drop(entry);

    Ok(png_response(png_data, []))
}

/// Ground inside forms
///
/// Highlights ground-colored pixels enclosed by detected contours. Coverage
/// (highlighted over enclosed pixels) and the highlighted count are returned
/// in headers.
#[utoipa::path(
    post,
    path = "/ground-inside",
    tag = "Analysis",
    request_body = GroundInsideRequest,
    responses(
        (status = 200, description = "Highlight overlay", content_type = "image/png",
            headers(
                ("x-ground-coverage" = String, description = "Coverage in 0..=1"),
                ("x-ground-pixels" = String, description = "Highlighted pixel count")
            )
        ),
        (status = 400, description = "No ground detected or invalid parameters"),
        (status = 404, description = "Analysis not found or expired")
    )
)]
async fn ground_inside(
    State(state): State<AppState>,
    Json(request): Json<GroundInsideRequest>,
) -> Result<Response, AppError> {
    let shared = state.entry(&request.analysis_id).await?;
    let mut entry = shared.lock().await;

    let analysis = entry.analysis.clone();
    let original = entry.original.clone();
    let working = entry.working.clone();
    let cached = entry.regions.clone();
    let mode = request.mode();

    let (regions, coverage, pixels, png_data) = tokio::task::spawn_blocking(move || {
        let regions = match cached {
            Some(regions) => regions,
            None => Arc::new(RegionMap::from_image(&working, &Default::default())),
        };
        let ground = classify_mask(&analysis, &mode)?;
        let inside = regions.ground_inside(&ground)?;
        let png_data = image_processing::encode_rgba_png(&render_view(
            &original,
            &inside.mask,
            View::Highlight,
        ))?;
        Ok::<_, AppError>((regions, inside.coverage, inside.pixels, png_data))
    })
    .await??;

    entry.regions = Some(regions);
    drop(entry);

    tracing::info!(
        "Ground inside forms on {}: coverage {:.4}, {} pixels",
        request.analysis_id,
        coverage,
        pixels
    );

    let coverage = HeaderValue::try_from(format!("{:.6}", coverage))
        .map_err(|e| AppError::ImageProcessing(format!("coverage header: {}", e)))?;

    Ok(png_response(
        png_data,
        [
            (HeaderName::from_static("x-ground-coverage"), coverage),
            (HeaderName::from_static("x-ground-pixels"), HeaderValue::from(pixels)),
        ],
    ))
}

/// Describe a color and find the closest curated grounds
#[utoipa::path(
    post,
    path = "/match-color",
    tag = "Color",
    request_body = ColorRequest,
    responses(
        (status = 200, description = "Swatch and palette matches", body = MatchColorResponse),
        (status = 400, description = "Missing or malformed color")
    )
)]
async fn match_color(
    State(state): State<AppState>,
    Json(request): Json<ColorRequest>,
) -> Result<Json<MatchColorResponse>, AppError> {
    let rgb = request.color()?;
    let lab = rgb.to_lab();
    let lch = lab.to_lch();
    let top = request.top.unwrap_or(DEFAULT_MATCHES);

    Ok(Json(MatchColorResponse {
        rgb: rgb.as_array(),
        hex: rgb.to_hex(),
        lab: lab.as_array(),
        lch: lch.as_array(),
        temperature: Temperature::classify(&lch, &TemperatureParams::default()).to_string(),
        palette_matches: state.palette.match_palette(lab, top),
    }))
}

/// Find a pigment recipe for a color
#[utoipa::path(
    post,
    path = "/match-pigments",
    tag = "Color",
    request_body = ColorRequest,
    responses(
        (status = 200, description = "Closest mixture", body = PigmentMatchResponse),
        (status = 400, description = "Missing or malformed color")
    )
)]
async fn match_pigments(
    State(state): State<AppState>,
    Json(request): Json<ColorRequest>,
) -> Result<Json<PigmentMatchResponse>, AppError> {
    let target = request.color()?;
    let library = state.pigments.clone();

    let found = tokio::task::spawn_blocking(move || library.match_pigments(target)).await??;
    tracing::info!(
        "Pigment match for {}: {} ({:.1}%)",
        target.to_hex(),
        found.recipe,
        found.similarity
    );

    Ok(Json(PigmentMatchResponse::new(target, found)))
}

fn png_response<const N: usize>(
    png_data: Vec<u8>,
    extra: [(HeaderName, HeaderValue); N],
) -> Response {
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png_data,
    )
        .into_response();

    for (name, value) in extra {
        response.headers_mut().insert(name, value);
    }
    response
}
