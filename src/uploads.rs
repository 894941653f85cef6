// src/uploads.rs

use std::collections::HashMap;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// A fully-read multipart form: text fields plus non-empty file parts.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else { continue };
            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.files.insert(name, Upload { file_name, bytes });
                    }
                }
                None => {
                    form.fields.insert(name, field.text().await?);
                }
            }
        }
        Ok(form)
    }

    /// Text field, trimmed; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.text(name), Some("true" | "1" | "on" | "yes"))
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

fn image_extension(file_name: &str) -> AppResult<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AppError::bad_request(format!("Unsupported image type '{file_name}'")))
    }
}

/// Writes an image under `<media_root>/<folder>/` and returns its public URL.
pub async fn store_image(media_root: &Path, folder: &str, upload: &Upload) -> AppResult<String> {
    let ext = image_extension(&upload.file_name)?;
    let dir = media_root.join(folder);
    tokio::fs::create_dir_all(&dir).await?;

    let name = format!("{}.{ext}", Uuid::new_v4());
    tokio::fs::write(dir.join(&name), &upload.bytes).await?;
    debug!(folder, file = %name, size = upload.bytes.len(), "stored upload");

    Ok(format!("/media/{folder}/{name}"))
}

/// Removes a file previously returned by [`store_image`]. Failures are logged,
/// not returned: the caller is already unwinding another error.
pub async fn discard_image(media_root: &Path, url: &str) {
    let Some(rel) = url.strip_prefix("/media/") else {
        return;
    };
    if let Err(e) = tokio::fs::remove_file(media_root.join(rel)).await {
        warn!(file = %url, error = %e, "could not remove orphaned upload");
    }
}

/// Stores the named file part if the form has one.
pub async fn store_optional(
    media_root: &Path,
    folder: &str,
    form: &mut FormData,
    field: &str,
) -> AppResult<Option<String>> {
    match form.take_file(field) {
        Some(upload) => Ok(Some(store_image(media_root, folder, &upload).await?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_image_extensions() {
        assert_eq!(image_extension("proof.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("a.b.webp").unwrap(), "webp");
        assert!(image_extension("notes.pdf").is_err());
        assert!(image_extension("noext").is_err());
    }

    #[tokio::test]
    async fn stores_under_folder() {
        let root = std::env::temp_dir().join(format!("stayease-upload-{}", Uuid::new_v4()));
        let upload = Upload { file_name: "fan.png".into(), bytes: Bytes::from_static(b"\x89PNG") };

        let url = store_image(&root, "resolutions", &upload).await.unwrap();
        assert!(url.starts_with("/media/resolutions/") && url.ends_with(".png"));

        let on_disk = root.join(url.trim_start_matches("/media/"));
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), b"\x89PNG");
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn discard_removes_stored_file() {
        let root = std::env::temp_dir().join(format!("stayease-upload-{}", Uuid::new_v4()));
        let upload = Upload { file_name: "proof.jpg".into(), bytes: Bytes::from_static(b"jpeg") };

        let url = store_image(&root, "resolution_proofs", &upload).await.unwrap();
        let on_disk = root.join(url.trim_start_matches("/media/"));
        assert!(on_disk.exists());

        discard_image(&root, &url).await;
        assert!(!on_disk.exists());
        // already gone, or not one of ours: nothing to do
        discard_image(&root, &url).await;
        discard_image(&root, "https://elsewhere.test/x.png").await;
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
