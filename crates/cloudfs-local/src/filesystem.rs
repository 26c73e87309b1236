use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use cloudfs_platform::storage::{
    CloudStorage, CopyReceipt, CopyRequest, CreateReceipt, CreateRequest, DirectoryListing,
    FileEntry, Scope, SourcePath,
};
use tokio::fs;
use tracing::{debug, info, warn};

/// Upper bound for fetching an `http(s)` source
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloud storage emulated by a directory tree: `<root>/<scope>/<target path>`
pub struct LocalCloudStorage {
    root: PathBuf,
    http: reqwest::Client,
    download_timeout: Duration,
}

impl LocalCloudStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            http: reqwest::Client::new(),
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scope_root(&self, scope: Scope) -> PathBuf {
        self.root.join(scope.as_str())
    }

    /// Map a target path onto disk. `..` stops at the scope root.
    fn resolve(&self, target_path: &str, scope: Scope) -> PathBuf {
        let mut resolved = self.scope_root(scope);
        for part in normalize(target_path) {
            resolved.push(part);
        }
        resolved
    }

    fn resolve_file(&self, target_path: &str, scope: Scope) -> Result<PathBuf> {
        if normalize(target_path).is_empty() {
            bail!("target path {:?} does not name a file", target_path);
        }
        Ok(self.resolve(target_path, scope))
    }

    async fn to_file_entry(path: &Path) -> Result<FileEntry> {
        let meta = fs::metadata(path)
            .await
            .with_context(|| format!("failed to stat {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Ok(if meta.is_dir() {
            FileEntry::directory(name)
        } else {
            FileEntry::file(name, meta.len())
        })
    }

    async fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create parent dirs for {}", path.display()))?;
        }
        fs::write(path, data)
            .await
            .with_context(|| format!("failed to write file {}", path.display()))
    }

    async fn read_source(&self, source: &SourcePath) -> Result<Vec<u8>> {
        match source {
            SourcePath::LocalPath(path) => fs::read(path)
                .await
                .with_context(|| format!("failed to read source {}", path.display())),
            SourcePath::RemoteUri(uri) => {
                let url = url::Url::parse(uri).with_context(|| format!("invalid uri {}", uri))?;
                match url.scheme() {
                    "file" => {
                        let path = url
                            .to_file_path()
                            .map_err(|_| anyhow::anyhow!("uri {} is not a local file", uri))?;
                        fs::read(&path)
                            .await
                            .with_context(|| format!("failed to read source {}", path.display()))
                    }
                    "http" | "https" => {
                        debug!("downloading {}", url);
                        let resp = self
                            .http
                            .get(url.clone())
                            .timeout(self.download_timeout)
                            .send()
                            .await
                            .with_context(|| format!("failed to fetch {}", uri))?
                            .error_for_status()
                            .with_context(|| format!("failed to fetch {}", uri))?;
                        let body = resp.bytes().await?;
                        Ok(body.to_vec())
                    }
                    other => bail!("unsupported uri scheme {:?} in {}", other, uri),
                }
            }
        }
    }
}

/// Split a target path into components, dropping `.`, empty parts and any
/// `..` that would leave the root.
fn normalize(target_path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = Vec::new();
    for part in target_path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts
}

#[async_trait]
impl CloudStorage for LocalCloudStorage {
    async fn list_files(&self, target_path: &str, scope: Scope) -> Result<DirectoryListing> {
        let dir = self.resolve(target_path, scope);

        // An untouched scope lists as empty rather than failing
        if dir == self.scope_root(scope) {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create scope root {}", dir.display()))?;
        }

        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("failed to read directory {}", target_path))?;

        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(e) => {
                    warn!("skipping dir entry: {}", e);
                    continue;
                }
            };

            match Self::to_file_entry(&entry.path()).await {
                Ok(fe) => files.push(fe),
                Err(e) => {
                    warn!("skipping {}: {:#}", entry.path().display(), e);
                }
            }
        }

        // Sort: directories first, then alphabetically
        files.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        Ok(DirectoryListing {
            path: target_path.to_string(),
            files,
        })
    }

    async fn copy_to_cloud(&self, req: CopyRequest) -> Result<CopyReceipt> {
        let target = self.resolve_file(&req.target_path, req.scope)?;
        let data = self.read_source(&req.source).await?;
        Self::write_bytes(&target, &data).await?;

        let mime_type = req.mime_type.unwrap_or_else(|| {
            mime_guess::from_path(&req.target_path)
                .first_or_octet_stream()
                .to_string()
        });

        info!(
            "copied {} -> {} ({} bytes, {}, scope={})",
            req.source.display_value(),
            req.target_path,
            data.len(),
            mime_type,
            req.scope,
        );

        Ok(CopyReceipt {
            target_path: req.target_path,
            bytes_written: data.len() as u64,
            mime_type,
        })
    }

    async fn create_file(&self, req: CreateRequest) -> Result<CreateReceipt> {
        let target = self.resolve_file(&req.target_path, req.scope)?;
        Self::write_bytes(&target, req.content.as_bytes()).await?;

        info!("created {} ({} bytes, scope={})", req.target_path, req.content.len(), req.scope);

        Ok(CreateReceipt {
            target_path: req.target_path,
            bytes_written: req.content.len() as u64,
        })
    }

    async fn file_exists(&self, target_path: &str, scope: Scope) -> Result<bool> {
        let path = self.resolve(target_path, scope);
        fs::try_exists(&path)
            .await
            .with_context(|| format!("failed to check {}", path.display()))
    }
}
