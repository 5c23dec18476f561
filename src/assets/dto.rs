use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub path: String,
    pub size: usize,
    #[serde(rename = "originalFilename")]
    pub original_filename: String,
}
