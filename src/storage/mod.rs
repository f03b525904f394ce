// src/storage/mod.rs
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, StorageError};

/// MIME types for stored artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Png,
    Json,
}

impl ContentType {
    pub fn as_mime(&self) -> &'static str {
        match self {
            ContentType::Png => "image/png",
            ContentType::Json => "application/json",
        }
    }
}

/// Object storage collaborator. The pipeline writes rendered TOC images,
/// raw and merged mappings, span mappings, and per-section content through
/// this interface and stays oblivious to which backend is active.
pub trait ObjectStore {
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: ContentType,
    ) -> impl std::future::Future<Output = Result<(), StorageError>>;

    /// Materializes an object as a local file and returns its path.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<PathBuf, StorageError>>;
}

/// Filesystem-backed store rooted at an output directory.
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    /// Creates a new LocalStore with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::Io)?;
        }

        Ok(Self {
            base_dir: base_path,
        })
    }
}

impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: ContentType,
    ) -> Result<(), StorageError> {
        let file_path = self.base_dir.join(key);
        if let Some(parent) = file_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(StorageError::Io)?;
            }
        }

        let mut file = fs::File::create(&file_path).map_err(StorageError::Io)?;
        file.write_all(bytes).map_err(StorageError::Io)?;

        tracing::info!("Saved object to {}", file_path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(key);
        if !file_path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(file_path)
    }
}

/// HTTP object-store backend: PUT/GET against a pre-authorized bucket
/// endpoint, no vendor SDK.
pub struct RemoteStore {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl RemoteStore {
    /// Builds the remote store from `BUCKET_URL` (required) and
    /// `BUCKET_TOKEN` (optional bearer token). A missing bucket URL is a
    /// configuration error raised before any document is opened.
    pub fn from_env() -> Result<Self, AppError> {
        let base_url = std::env::var("BUCKET_URL")
            .map_err(|_| AppError::Config("BUCKET_URL environment variable not set".into()))?;
        let token = std::env::var("BUCKET_TOKEN").ok();

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

impl ObjectStore for RemoteStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: ContentType,
    ) -> Result<(), StorageError> {
        let url = self.object_url(key);
        let mut request = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type.as_mime())
            .body(bytes.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("Remote put failed with {} for key {}", status, key);
            return Err(StorageError::Http(status, key.to_string()));
        }

        tracing::info!("Saved object to {}", url);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<PathBuf, StorageError> {
        let url = self.object_url(key);
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Http(status, key.to_string()));
        }

        let bytes = response.bytes().await?;

        // Callers expect a local path; downloads land in a kept temp file.
        let mut tmp = tempfile::NamedTempFile::new().map_err(StorageError::Io)?;
        tmp.write_all(&bytes).map_err(StorageError::Io)?;
        let (_, path) = tmp.keep().map_err(|e| StorageError::Io(e.error))?;

        tracing::info!("Fetched {} to {}", url, path.display());
        Ok(path)
    }
}

/// Computes artifact keys for one manual, partitioned by brand, model
/// number and processing date, with `document_map/` and `sections/`
/// namespaces underneath.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    brand: String,
    model_number: String,
    date: String,
    file_stem: String,
}

impl OutputLayout {
    pub fn new(brand: &str, model_number: &str, file_stem: &str) -> Self {
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        Self::with_date(brand, model_number, file_stem, &date)
    }

    pub fn with_date(brand: &str, model_number: &str, file_stem: &str, date: &str) -> Self {
        Self {
            brand: brand.to_uppercase(),
            model_number: model_number.to_string(),
            date: date.to_string(),
            file_stem: file_stem.to_string(),
        }
    }

    fn root(&self) -> String {
        format!(
            "brand={}/model={}/date={}/{}",
            self.brand, self.model_number, self.date, self.file_stem
        )
    }

    /// Key for a document-map artifact (TOC images, mappings, spans).
    pub fn document_map_key(&self, name: &str) -> String {
        format!("{}/document_map/{}", self.root(), name)
    }

    /// Key for a per-section content artifact.
    pub fn section_key(&self, name: &str) -> String {
        format!("{}/sections/{}", self.root(), name)
    }
}
