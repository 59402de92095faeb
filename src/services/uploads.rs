//! Cover image storage on the local file system

use std::path::{Component, Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

use crate::{
    config::StorageConfig,
    error::{AppError, AppResult},
};

/// URL prefix under which stored files are served
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

const FALLBACK_EXTENSION: &str = "jpg";

static DATA_URL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/[A-Za-z0-9.+-]+;base64,").expect("data URL pattern is valid")
});

#[derive(Clone)]
pub struct UploadsService {
    dir: PathBuf,
    default_cover: String,
}

impl UploadsService {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            dir: config.uploads_dir.clone(),
            default_cover: config.default_cover.clone(),
        }
    }

    /// Create the upload directory if it does not exist yet
    pub async fn ensure_dir(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn default_cover(&self) -> &str {
        &self.default_cover
    }

    /// Decode and store a cover image, returning its public path.
    pub async fn save_cover(&self, filename: Option<&str>, payload: Option<&str>) -> AppResult<String> {
        let filename = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(AppError::MissingField("filename"))?;
        let payload = payload
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(AppError::MissingField("base64"))?;

        let bytes = STANDARD
            .decode(strip_data_url(payload))
            .map_err(|e| AppError::Validation(format!("Invalid base64 payload: {}", e)))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Empty image payload".to_string()));
        }

        let name = generated_name(&extension_of(filename));
        tokio::fs::write(self.dir.join(&name), &bytes).await?;

        tracing::info!("Stored cover {} ({} bytes)", name, bytes.len());

        Ok(format!("{}{}", UPLOADS_URL_PREFIX, name))
    }

    /// Remove the file behind an uploaded cover. Never fails: problems are logged.
    pub async fn remove_cover(&self, cover: &str) {
        let Some(path) = self.stored_file(cover) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Could not remove cover file {}: {}", path.display(), e);
        }
    }

    /// Local path of an uploaded (non-default) cover, if `cover` names one
    fn stored_file(&self, cover: &str) -> Option<PathBuf> {
        if cover == self.default_cover {
            return None;
        }
        let name = cover.strip_prefix(UPLOADS_URL_PREFIX)?;
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Some(self.dir.join(file)),
            _ => None,
        }
    }
}

/// Drop a leading `data:image/...;base64,` marker
pub fn strip_data_url(payload: &str) -> &str {
    match DATA_URL_PREFIX.find(payload) {
        Some(m) => &payload[m.end()..],
        None => payload,
    }
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// `{unix_millis}-{random}.{ext}`; the random suffix keeps concurrent uploads apart
fn generated_name(extension: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, extension)
}
