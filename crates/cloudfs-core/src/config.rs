use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cloudfs_platform::storage::Scope;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::browser::RetryPolicy;

const CONFIG_FILE_NAME: &str = "cloudfs.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudFsConfig {
    /// Directory backing the local storage (defaults to the platform data dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<PathBuf>,

    /// Scope used when none is given on the command line
    #[serde(default)]
    pub default_scope: Scope,

    /// Extra attempts after a failed listing before giving up
    #[serde(default = "default_list_retry_max")]
    pub list_retry_max: u32,

    /// Retry base delay in milliseconds
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Retry max delay in milliseconds
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

fn default_list_retry_max() -> u32 {
    2
}
fn default_retry_base_delay() -> u64 {
    200
}
fn default_retry_max_delay() -> u64 {
    5000
}

impl Default for CloudFsConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            default_scope: Scope::default(),
            list_retry_max: default_list_retry_max(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

impl CloudFsConfig {
    /// `cloudfs.json` in the platform config dir, or next to the working dir
    pub fn default_file() -> PathBuf {
        match project_dirs() {
            Some(dirs) => dirs.config_dir().join(CONFIG_FILE_NAME),
            None => PathBuf::from(CONFIG_FILE_NAME),
        }
    }

    /// Read `path`, falling back to defaults when it does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read {}", path.display()));
            }
        };

        let config: Self = serde_json::from_slice(&raw)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Write through a sibling temp file so a crash never leaves half a config
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create {}", dir.display()))?;
        }

        let mut json = serde_json::to_vec_pretty(self)?;
        json.push(b'\n');
        let staged = path.with_extension("json.tmp");
        std::fs::write(&staged, &json)
            .with_context(|| format!("cannot write {}", staged.display()))?;
        std::fs::rename(&staged, path)
            .with_context(|| format!("cannot replace {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.retry_base_delay_ms == 0 {
            bail!("retry_base_delay_ms must be positive");
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            bail!(
                "retry_max_delay_ms ({}) is below retry_base_delay_ms ({})",
                self.retry_max_delay_ms,
                self.retry_base_delay_ms
            );
        }
        Ok(())
    }

    /// Root of the local storage tree, falling back to the platform data dir
    pub fn storage_root(&self) -> PathBuf {
        if let Some(root) = &self.storage_root {
            return root.clone();
        }
        if let Some(dirs) = project_dirs() {
            dirs.data_dir().join("storage")
        } else {
            PathBuf::from("cloudfs-storage")
        }
    }

    /// Retry settings for directory listings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.list_retry_max,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "cloudfs", "cloudfs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: CloudFsConfig = serde_json::from_str("{}").unwrap();
        assert!(config.storage_root.is_none());
        assert_eq!(config.default_scope, Scope::Visible);
        assert_eq!(config.list_retry_max, 2);
        assert_eq!(config.retry_base_delay_ms, 200);
        assert_eq!(config.retry_max_delay_ms, 5000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = CloudFsConfig {
            storage_root: Some(dir.path().join("storage")),
            default_scope: Scope::Hidden,
            list_retry_max: 5,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = CloudFsConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.storage_root, config.storage_root);
        assert_eq!(loaded.default_scope, Scope::Hidden);
        assert_eq!(loaded.list_retry_max, 5);
        assert_eq!(loaded.storage_root(), dir.path().join("storage"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CloudFsConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.list_retry_max, 2);
        assert!(CloudFsConfig::default_file().ends_with("cloudfs.json"));
    }

    #[test]
    fn test_inverted_retry_delays_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"retry_base_delay_ms": 900, "retry_max_delay_ms": 100}"#,
        )
        .unwrap();
        let err = CloudFsConfig::load_or_default(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("is below retry_base_delay_ms"));

        let zero = CloudFsConfig {
            retry_base_delay_ms: 0,
            ..Default::default()
        };
        assert!(zero.save(&path).is_err());
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        let err = CloudFsConfig::load_or_default(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid config in"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = CloudFsConfig {
            list_retry_max: 4,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 300,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.delay(1), Duration::from_millis(50));
        assert_eq!(policy.delay(4), Duration::from_millis(300));
        assert_eq!(CloudFsConfig::default().retry_policy(), RetryPolicy::default());
    }
}
