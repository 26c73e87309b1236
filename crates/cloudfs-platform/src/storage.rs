use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Partition of remote storage an operation targets.
///
/// Backends decide what a scope means; callers only pass it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Visible,
    Hidden,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Visible => "visible",
            Scope::Hidden => "hidden",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visible" => Ok(Scope::Visible),
            "hidden" => Ok(Scope::Hidden),
            other => anyhow::bail!("unknown scope {:?} (expected visible or hidden)", other),
        }
    }
}

/// One item of a directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
    /// Size in bytes, only present for files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileEntry {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size: None,
        }
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size: Some(size),
        }
    }
}

/// Contents of a single remote directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub path: String,
    pub files: Vec<FileEntry>,
}

/// Where `copy_to_cloud` reads its bytes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourcePath {
    /// Absolute or relative path on the local filesystem
    LocalPath(PathBuf),
    /// `file:`, `http:` or `https:` URI
    RemoteUri(String),
}

impl SourcePath {
    /// Text shown to the user for this source
    pub fn display_value(&self) -> String {
        match self {
            SourcePath::LocalPath(p) => p.display().to_string(),
            SourcePath::RemoteUri(u) => u.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    pub source: SourcePath,
    pub target_path: String,
    /// When absent the backend guesses from the target name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyReceipt {
    pub target_path: String,
    pub bytes_written: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub target_path: String,
    pub content: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceipt {
    pub target_path: String,
    pub bytes_written: u64,
}

#[async_trait]
pub trait CloudStorage: Send + Sync {
    /// List the entries of `target_path` in `scope`
    async fn list_files(&self, target_path: &str, scope: Scope) -> Result<DirectoryListing>;

    /// Copy a local file or URI into the cloud
    async fn copy_to_cloud(&self, req: CopyRequest) -> Result<CopyReceipt>;

    /// Create (or overwrite) a text file
    async fn create_file(&self, req: CreateRequest) -> Result<CreateReceipt>;

    async fn file_exists(&self, target_path: &str, scope: Scope) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry_json_shape() {
        let json = serde_json::to_value(FileEntry::file("a.txt", 12)).unwrap();
        assert_eq!(json["name"], "a.txt");
        assert_eq!(json["isDirectory"], false);
        assert_eq!(json["size"], 12);

        let dir = serde_json::to_value(FileEntry::directory("docs")).unwrap();
        assert_eq!(dir["isDirectory"], true);
        assert!(dir.get("size").is_none());
    }

    #[test]
    fn test_listing_from_collaborator_json() {
        let raw = r#"{"path":".","files":[{"name":"sub","isDirectory":true},{"name":"x.bin","isDirectory":false,"size":2048}]}"#;
        let listing: DirectoryListing = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.path, ".");
        assert_eq!(listing.files[0], FileEntry::directory("sub"));
        assert_eq!(listing.files[1], FileEntry::file("x.bin", 2048));
    }

    #[test]
    fn test_scope_parse_and_display() {
        assert_eq!("visible".parse::<Scope>().unwrap(), Scope::Visible);
        assert_eq!(" Hidden ".parse::<Scope>().unwrap(), Scope::Hidden);
        assert!("public".parse::<Scope>().is_err());
        assert_eq!(Scope::Hidden.to_string(), "hidden");
        assert_eq!(serde_json::to_string(&Scope::Visible).unwrap(), "\"visible\"");
    }

    #[test]
    fn test_source_path_display_value() {
        let local = SourcePath::LocalPath(PathBuf::from("/tmp/test.txt"));
        assert_eq!(local.display_value(), "/tmp/test.txt");
        let uri = SourcePath::RemoteUri("file:///tmp/test.txt".to_string());
        assert_eq!(uri.display_value(), "file:///tmp/test.txt");
    }
}
