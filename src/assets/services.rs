use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::StorageError;

const MAX_EXTENSION_LEN: usize = 16;

pub struct UploadItem {
    pub body: Bytes,
    pub original_filename: String,
}

pub struct StoredAsset {
    pub filename: String,
    pub path: String,
    pub size: usize,
    pub original_filename: String,
}

/// Stores one uploaded file under a fresh `<uuid>.<ext>` name.
pub async fn store_upload(st: &AppState, item: UploadItem) -> Result<StoredAsset, StorageError> {
    let original_filename = sanitize_filename(&item.original_filename);
    let filename = stored_name(&original_filename);
    let size = item.body.len();

    let path = st.storage.put_object(&filename, item.body).await?;
    debug!(%filename, %path, size, "asset stored");

    Ok(StoredAsset {
        filename,
        path,
        size,
        original_filename,
    })
}

/// Loads the asset published under `/api/assets/<path>`.
pub async fn load_asset(st: &AppState, path: &str) -> AppResult<Bytes> {
    let key = asset_key(path).ok_or_else(|| AppError::NotFound("Asset not found".into()))?;
    Ok(st.storage.get_object(&key).await?)
}

/// Reduces a client-supplied filename to a safe basename: path components
/// are dropped, whitespace becomes `_`, anything outside `[A-Za-z0-9._-]` is
/// removed and leading/trailing dots and underscores are trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Lowercased extension after the final dot, if it is short and alphanumeric.
pub fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn stored_name(original_filename: &str) -> String {
    let id = Uuid::new_v4();
    match extension_of(original_filename) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

/// Maps a public asset path to a storage key relative to the upload
/// directory. Returns `None` for anything that could escape it.
pub fn asset_key(path: &str) -> Option<String> {
    let path = path.trim_start_matches('/');
    if path.is_empty() || path.contains('\\') || path.contains('\0') {
        return None;
    }
    let valid = path
        .split('/')
        .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    valid.then(|| path.to_string())
}
