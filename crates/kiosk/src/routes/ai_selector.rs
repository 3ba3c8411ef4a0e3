//! AI selector route handlers.
//!
//! The page owns the camera and microphone. It reports each `getUserMedia`
//! outcome to `/ai-selector/open`, posts the captured blob to
//! `/ai-selector/capture` and follows the `redirect` of a successful
//! status. Every endpoint answers with the workflow status as JSON.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Multipart, Query, State},
    response::IntoResponse,
};
use nutrition_kiosk_core::{
    CaptureKind, CapturedMedia, DialSlot, SelectorCategory, dial_layout,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::capture::CaptureStatus;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::media::DeviceReport;
use crate::state::AppState;

/// Multipart field carrying the captured payload.
const FILE_FIELD: &str = "file";

/// Multipart field naming the capture kind.
const KIND_FIELD: &str = "kind";

/// Dial entry display data for templates.
#[derive(Clone)]
pub struct DialSlotView {
    pub index: usize,
    pub title: &'static str,
    pub image_slug: &'static str,
    pub position: &'static str,
    pub active: bool,
}

impl From<DialSlot> for DialSlotView {
    fn from(slot: DialSlot) -> Self {
        Self {
            index: slot.index,
            title: slot.category.title(),
            image_slug: slot.category.image_slug(),
            position: slot.position.as_str(),
            active: slot.is_active(),
        }
    }
}

/// Selector query parameters.
#[derive(Debug, Deserialize)]
pub struct SelectorQuery {
    pub active: Option<usize>,
}

/// AI selector page template.
#[derive(Template, WebTemplate)]
#[template(path = "ai_selector.html")]
pub struct AiSelectorTemplate {
    pub slots: Vec<DialSlotView>,
    pub active_title: &'static str,
    pub previous: usize,
    pub next: usize,
    pub status: CaptureStatus,
    pub cart_count: u64,
}

/// Device report posted by the page after calling `getUserMedia`.
#[derive(Debug, Deserialize)]
pub struct OpenForm {
    pub kind: String,
    #[serde(default)]
    pub granted: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Workflow status plus the number of device tracks still held.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: CaptureStatus,
    pub active_tracks: usize,
}

impl StatusResponse {
    fn new(state: &AppState, status: CaptureStatus) -> Json<Self> {
        Json(Self {
            status,
            active_tracks: state.media().active_tracks(),
        })
    }
}

/// Display the selector dial and capture panel.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Query(query): Query<SelectorQuery>,
) -> impl IntoResponse {
    let n = SelectorCategory::ALL.len();
    let active = query.active.unwrap_or(SelectorCategory::DEFAULT_ACTIVE) % n;
    let slots: Vec<DialSlotView> = dial_layout(active).into_iter().map(Into::into).collect();
    let active_title = slots
        .iter()
        .find(|slot| slot.active)
        .map_or_else(|| SelectorCategory::MusclePick.title(), |slot| slot.title);

    AiSelectorTemplate {
        slots,
        active_title,
        previous: (active + n - 1) % n,
        next: (active + 1) % n,
        status: state.capture().status(),
        cart_count: state.cart().total_items(),
    }
}

/// Record the page's device outcome and open the device.
#[instrument(skip(state, form), fields(kind = %form.kind, granted = form.granted))]
pub async fn open(
    State(state): State<AppState>,
    Form(form): Form<OpenForm>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&form.kind)?;
    let report = DeviceReport::from_page(
        kind,
        form.granted,
        form.error.as_deref(),
        form.message.as_deref(),
    );
    state.media().report(kind, report);

    add_breadcrumb("capture", "Opening device", Some(&[("kind", kind.as_str())]));
    let status = state.capture().open(kind).await?;
    Ok(StatusResponse::new(&state, status))
}

/// Accept a captured payload and run the analysis.
///
/// Responds once the upload settles; a failed analysis is a normal
/// `failed` status, not an HTTP error.
#[instrument(skip(state, multipart))]
pub async fn capture(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut kind = None;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(KIND_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
                kind = Some(parse_kind(&text)?);
            }
            Some(FILE_FIELD) => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
                upload = Some((filename, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let Some((filename, content_type, bytes)) = upload else {
        return Err(AppError::BadRequest("Missing capture file".to_string()));
    };
    let Some(kind) = kind
        .or_else(|| content_type.as_deref().and_then(kind_from_content_type))
        .or_else(|| state.capture().status().kind())
    else {
        return Err(AppError::BadRequest("Missing capture kind".to_string()));
    };

    let media = CapturedMedia::new(kind, filename, content_type, bytes);
    tracing::info!(kind = %kind, bytes = media.len(), "Capture received");
    add_breadcrumb("capture", "Submitting capture", Some(&[("kind", kind.as_str())]));

    let status = state.capture().capture_and_submit(media).await?;
    Ok(StatusResponse::new(&state, status))
}

/// Re-acquire the device after a success or failure.
#[instrument(skip(state))]
pub async fn retry(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let status = state.capture().retry().await?;
    Ok(StatusResponse::new(&state, status))
}

/// Release the device and return to idle.
#[instrument(skip(state))]
pub async fn close(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.capture().close();
    StatusResponse::new(&state, status)
}

/// Current workflow status.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.capture().status();
    StatusResponse::new(&state, status)
}

fn parse_kind(raw: &str) -> Result<CaptureKind> {
    raw.parse::<CaptureKind>()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

fn kind_from_content_type(content_type: &str) -> Option<CaptureKind> {
    let content_type = content_type.trim().to_ascii_lowercase();
    if content_type.starts_with("image/") {
        Some(CaptureKind::Camera)
    } else if content_type.starts_with("audio/") {
        Some(CaptureKind::Microphone)
    } else {
        None
    }
}
