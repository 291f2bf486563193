//! Image uploads for records with an `image_url`.

use chrono::Utc;

use crate::backend::{BackendError, FileStore};

/// Upload `bytes` under a unique, timestamped path and return its public url.
///
/// The original file name is kept (sanitized) as the suffix so stored
/// objects stay recognizable.
pub async fn upload_public(
    store: &dyn FileStore,
    bucket: &str,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<String, BackendError> {
    if bytes.is_empty() {
        return Err(BackendError::Rejected(format!("{} is empty", file_name)));
    }
    let path = format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        &uuid::Uuid::new_v4().simple().to_string()[..8],
        sanitize(file_name)
    );
    let stored = store.upload(bucket, &path, bytes).await?;
    tracing::debug!(bucket, path = %stored, "uploaded");
    Ok(store.public_url(bucket, &stored))
}

fn sanitize(file_name: &str) -> String {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.trim_matches(['-', '.']).is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
