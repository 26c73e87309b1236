use anyhow::Result;
use cloudfs_platform::storage::{
    CloudStorage, CopyReceipt, CopyRequest, CreateReceipt, CreateRequest, Scope, SourcePath,
};
use tracing::{info, warn};

/// Content written by [`create_demo_file`]
pub const DEMO_FILE_CONTENT: &str = "some file content";

/// A source to save into the cloud, plus whether its target already exists
#[derive(Debug, Clone)]
pub struct UploadSlot {
    pub heading: String,
    pub source: SourcePath,
    pub target_path: String,
    scope: Scope,
    target_exists: bool,
}

impl UploadSlot {
    pub fn new(
        heading: impl Into<String>,
        source: SourcePath,
        target_path: impl Into<String>,
        scope: Scope,
    ) -> Self {
        Self {
            heading: heading.into(),
            source,
            target_path: target_path.into(),
            scope,
            target_exists: false,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Last known existence of the target; `false` until checked
    pub fn target_exists(&self) -> bool {
        self.target_exists
    }

    /// Existence is unknown in the new scope until checked again
    pub fn set_scope(&mut self, scope: Scope) {
        if scope != self.scope {
            self.scope = scope;
            self.target_exists = false;
        }
    }

    pub async fn check_exists(&mut self, storage: &dyn CloudStorage) -> Result<bool> {
        let exists = storage.file_exists(&self.target_path, self.scope).await?;
        self.target_exists = exists;
        Ok(exists)
    }

    /// Copy the source to the target, then refresh the existence flag
    pub async fn copy_to_cloud(
        &mut self,
        storage: &dyn CloudStorage,
        mime_type: Option<String>,
    ) -> Result<CopyReceipt> {
        let req = CopyRequest {
            source: self.source.clone(),
            target_path: self.target_path.clone(),
            mime_type,
            scope: self.scope,
        };

        let receipt = match storage.copy_to_cloud(req).await {
            Ok(r) => r,
            Err(e) => {
                warn!("copy to cloud failed for {}: {:#}", self.target_path, e);
                return Err(e);
            }
        };
        info!(
            "[{}] saved {} to {} ({} bytes)",
            self.heading,
            self.source.display_value(),
            receipt.target_path,
            receipt.bytes_written
        );

        if let Err(e) = self.check_exists(storage).await {
            warn!("existence check failed for {}: {:#}", self.target_path, e);
        }
        Ok(receipt)
    }
}

/// Create a uniquely named text file under `/foo/bar`
pub async fn create_demo_file(storage: &dyn CloudStorage, scope: Scope) -> Result<CreateReceipt> {
    let target_path = format!("/foo/bar/some_file_{}_.txt", uuid::Uuid::new_v4());
    create_file(storage, &target_path, DEMO_FILE_CONTENT, scope).await
}

pub async fn create_file(
    storage: &dyn CloudStorage,
    target_path: &str,
    content: &str,
    scope: Scope,
) -> Result<CreateReceipt> {
    let req = CreateRequest {
        target_path: target_path.to_string(),
        content: content.to_string(),
        scope,
    };
    match storage.create_file(req).await {
        Ok(receipt) => {
            info!("created {} ({} bytes)", receipt.target_path, receipt.bytes_written);
            Ok(receipt)
        }
        Err(e) => {
            warn!("failed to create {}: {:#}", target_path, e);
            Err(e)
        }
    }
}
