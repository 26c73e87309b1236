use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{info, warn};

use cloudfs_core::uploads::{self, UploadSlot};
use cloudfs_platform::storage::{CloudStorage, Scope, SourcePath};

const DEMO_FILENAME: &str = "my-file.txt";
const README_URL: &str = "https://raw.githubusercontent.com/npomfret/react-native-cloud-fs/master/README.md";

/// Same source file reached three ways, plus one remote document
fn demo_slots(tmp_file: &Path, scope: Scope) -> Result<Vec<UploadSlot>> {
    let file_url = url::Url::from_file_path(tmp_file)
        .map_err(|_| anyhow::anyhow!("{} is not an absolute path", tmp_file.display()))?;

    Ok(vec![
        UploadSlot::new(
            "absolute path",
            SourcePath::LocalPath(tmp_file.to_path_buf()),
            format!("absolute-path-demo/{}", DEMO_FILENAME),
            scope,
        ),
        UploadSlot::new(
            "file url",
            SourcePath::RemoteUri(file_url.to_string()),
            format!("file-url-demo/{}", DEMO_FILENAME),
            scope,
        ),
        UploadSlot::new(
            "url",
            SourcePath::RemoteUri(README_URL.to_string()),
            "web-url-demo/README.md",
            scope,
        ),
    ])
}

pub async fn run_demo(storage: &dyn CloudStorage, scope: Scope) -> Result<()> {
    let tmp_file = std::env::temp_dir().join("cloudfs-demo").join("test.txt");
    write_source_file(&tmp_file).await?;
    info!("demo source written to {}", tmp_file.display());

    println!("operation: create_file");
    match uploads::create_demo_file(storage, scope).await {
        Ok(receipt) => println!("  created {}", receipt.target_path),
        Err(e) => println!("  failed: {:#}", e),
    }

    println!("operation: copy_to_cloud");
    for mut slot in demo_slots(&tmp_file, scope)? {
        println!("  {}: {}", slot.heading, slot.source.display_value());
        if let Err(e) = slot.check_exists(storage).await {
            warn!("existence check failed for {}: {:#}", slot.target_path, e);
        }
        println!("    target: {} (exists before: {})", slot.target_path, slot.target_exists());

        match slot.copy_to_cloud(storage, None).await {
            Ok(receipt) => println!("    saved {} bytes as {}", receipt.bytes_written, receipt.mime_type),
            Err(e) => println!("    failed: {:#}", e),
        }
        println!("    target file exists: {}", slot.target_exists());
    }

    Ok(())
}

async fn write_source_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    tokio::fs::write(path, format!("This is a test file {}", stamp))
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}
