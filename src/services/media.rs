//! Image storage for vehicle photos

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::models::UploadedFile;

/// URL prefix under which stored files are served
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

/// Stores uploaded files and hands back public URLs
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist a file, returning its URL
    async fn store(&self, file: &UploadedFile) -> Result<String>;

    /// Remove a file previously returned by [`store`](Self::store)
    async fn remove(&self, url: &str) -> Result<()>;
}

/// Keeps files in a local directory served at `/uploads/`
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, url: &str) -> Result<PathBuf> {
        let name = url
            .strip_prefix(UPLOADS_URL_PREFIX)
            .ok_or_else(|| anyhow!("Not an upload URL: {}", url))?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(anyhow!("Invalid upload file name: {}", name));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, file: &UploadedFile) -> Result<String> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create upload dir: {:?}", self.root))?;

        let ext = file_extension(file.file_name.as_deref(), &file.content_type);
        let name = format!("{}.{}", Uuid::new_v4(), ext);
        fs::write(self.root.join(&name), &file.data)
            .await
            .with_context(|| format!("Failed to save file: {}", name))?;

        tracing::debug!(file = %name, size = file.data.len(), "Stored upload");
        Ok(format!("{}{}", UPLOADS_URL_PREFIX, name))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let path = self.path_for(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(url = %url, "Upload already gone");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to remove file: {:?}", path)),
        }
    }
}

/// Extension from the original file name, else derived from the content type
fn file_extension(file_name: Option<&str>, content_type: &str) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() < 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext.to_lowercase();
    }

    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
    .to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory store that remembers what it holds
    #[derive(Default)]
    pub struct MemoryMediaStore {
        pub stored: Mutex<Vec<String>>,
        pub removed: Mutex<Vec<String>>,
        capacity: Option<usize>,
    }

    impl MemoryMediaStore {
        /// Store that fails once it holds `capacity` files
        pub fn with_capacity(capacity: usize) -> Self {
            Self {
                capacity: Some(capacity),
                ..Default::default()
            }
        }

        pub fn stored(&self) -> Vec<String> {
            self.stored.lock().unwrap().clone()
        }

        pub fn removed(&self) -> Vec<String> {
            self.removed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaStore for MemoryMediaStore {
        async fn store(&self, file: &UploadedFile) -> Result<String> {
            let mut stored = self.stored.lock().unwrap();
            if self.capacity.is_some_and(|cap| stored.len() >= cap) {
                anyhow::bail!("disk full");
            }
            let url = format!(
                "{}{}-{}",
                UPLOADS_URL_PREFIX,
                stored.len(),
                file.file_name.as_deref().unwrap_or("file")
            );
            stored.push(url.clone());
            Ok(url)
        }

        async fn remove(&self, url: &str) -> Result<()> {
            self.removed.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }
}
