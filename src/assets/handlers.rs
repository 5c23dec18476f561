use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::UploadResponse,
    mime::content_type_for,
    services::{load_asset, store_upload, UploadItem},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

const ASSET_CACHE_CONTROL: &str = "public, max-age=31536000";

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_file))
        // multipart framing on top of the file itself
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
}

pub fn asset_routes() -> Router<AppState> {
    Router::new().route("/assets/*path", get(serve_asset))
}

/// POST /upload (multipart, field `file`)
#[instrument(skip(state, auth, mp), fields(user_id = auth.id))]
pub async fn upload_file(
    State(state): State<AppState>,
    auth: AuthUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut item: Option<UploadItem> = None;
    while let Some(field) = mp.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let original_filename = field.file_name().unwrap_or_default().to_string();
        if original_filename.is_empty() {
            return Err(AppError::BadRequest("No file selected".into()));
        }
        let body = field.bytes().await?;
        if body.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::PayloadTooLarge("File exceeds the upload size limit".into()));
        }
        item = Some(UploadItem {
            body,
            original_filename,
        });
        break;
    }

    let item = item.ok_or_else(|| AppError::BadRequest("No file provided".into()))?;
    let stored = store_upload(&state, item).await?;

    info!(
        filename = %stored.filename,
        path = %stored.path,
        size = stored.size,
        "file uploaded"
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "File uploaded successfully".into(),
            filename: stored.filename,
            path: stored.path,
            size: stored.size,
            original_filename: stored.original_filename,
        }),
    ))
}

/// GET /assets/*path, proxied from remote storage. CORS is permissive on
/// this router (see `app::build_app`).
#[instrument(skip(state))]
pub async fn serve_asset(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<Response> {
    let bytes = load_asset(&state, &path)
        .await
        .inspect_err(|e| warn!(error = %e, %path, "asset fetch failed"))?;

    let len = bytes.len();
    let mut resp = Response::new(Body::from(bytes));
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&path)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(ASSET_CACHE_CONTROL));
    Ok(resp)
}
