use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

/// URL prefix under which the blob directory is served.
pub const FILES_PREFIX: &str = "/files";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `body` under a fresh opaque name and returns its relative path
    /// (`/files/<name>`).
    async fn save(&self, file_name: Option<&str>, content_type: &str, body: Bytes)
        -> anyhow::Result<String>;
    /// Removes a blob previously returned by [`BlobStore::save`]. Missing files are not an error.
    async fn delete(&self, path: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create blob dir {}", root.display()))?;
        Ok(Self { root })
    }

    /// Maps `/files/<name>` back onto the blob directory. Anything that is
    /// not a plain file name directly under the prefix is rejected.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let name = path
            .strip_prefix(FILES_PREFIX)?
            .strip_prefix('/')?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(
        &self,
        file_name: Option<&str>,
        content_type: &str,
        body: Bytes,
    ) -> anyhow::Result<String> {
        let ext = file_name
            .and_then(ext_from_file_name)
            .or_else(|| ext_from_mime(content_type).map(str::to_string))
            .unwrap_or_else(|| "bin".to_string());
        let name = format!("{}.{}", Uuid::new_v4(), ext);

        let tmp = self.root.join(format!(".{name}.part"));
        let dest = self.root.join(&name);
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &dest)
            .await
            .with_context(|| format!("rename into {}", dest.display()))?;

        debug!(blob = %name, bytes = body.len(), "blob saved");
        Ok(format!("{FILES_PREFIX}/{name}"))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let Some(file) = self.resolve(path) else {
            anyhow::bail!("not a blob path: {path}");
        };
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", file.display())),
        }
    }
}

/// Keeps the uploaded extension when it is short and alphanumeric.
fn ext_from_file_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ok = !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    ok.then(|| ext.to_ascii_lowercase())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "application/json" => Some("json"),
        "application/toml" => Some("toml"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}
