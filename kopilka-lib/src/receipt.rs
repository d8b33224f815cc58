use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub const MAX_RECEIPT_SIZE: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Receipt images on disk. Uploads are renamed to `<uuid>.<ext>` so client
/// file names never reach the filesystem.
#[derive(Clone)]
pub struct ReceiptStore {
    upload_dir: PathBuf,
}

impl ReceiptStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Result<ReceiptStore, anyhow::Error> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir)?;
        Ok(ReceiptStore { upload_dir })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Validates and persists an upload, returning the stored file name.
    pub fn save(&self, original_name: &str, data: &[u8]) -> Result<String, ApiError> {
        let extension = allowed_extension(original_name)?;
        if data.len() > MAX_RECEIPT_SIZE {
            return Err(ApiError::validation(
                "Файл слишком большой. Максимальный размер: 5 МБ",
            ));
        }
        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.upload_dir.join(&stored_name);
        std::fs::write(&path, data).map_err(|e| ApiError::internal(e.into()))?;
        Ok(stored_name)
    }

    /// Best-effort removal. A missing file only gets a warning so a deleted
    /// transaction never resurrects over a stray image.
    pub fn delete(&self, stored_name: &str) {
        let path = match self.resolve(stored_name) {
            Some(path) => path,
            None => {
                warn!(file = stored_name, "refusing to delete receipt outside upload dir");
                return;
            }
        };
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(file = stored_name, error = %e, "failed to delete receipt image");
        }
    }

    /// Path of a stored receipt, or `None` for names that would escape the
    /// upload directory.
    pub fn resolve(&self, stored_name: &str) -> Option<PathBuf> {
        let name = Path::new(stored_name);
        if name.components().count() != 1 || stored_name.contains("..") {
            return None;
        }
        Some(self.upload_dir.join(name))
    }
}

fn allowed_extension(file_name: &str) -> Result<String, ApiError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(ApiError::validation(
            "Недопустимый формат файла. Разрешены: jpg, jpeg, png, gif",
        )),
    }
}
