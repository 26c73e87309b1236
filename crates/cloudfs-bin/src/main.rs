use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use cloudfs_core::browser::{Applied, DirectoryBrowser, ROOT_PATH};
use cloudfs_core::config::CloudFsConfig;
use cloudfs_core::uploads::{self, UploadSlot};
use cloudfs_local::LocalCloudStorage;
use cloudfs_platform::storage::{CloudStorage, Scope, SourcePath};

mod browse;
mod demo;

#[derive(Parser, Debug)]
#[command(name = "cloudfs")]
#[command(about = "Browse and populate cloud-backed storage scopes")]
#[command(version)]
struct Cli {
    /// Directory backing the storage
    #[arg(long, env = "CLOUDFS_ROOT", global = true)]
    root: Option<PathBuf>,

    /// Path to config file
    #[arg(long, env = "CLOUDFS_CONFIG_PATH", global = true)]
    config_path: Option<PathBuf>,

    /// Storage scope (visible or hidden)
    #[arg(long, global = true)]
    scope: Option<Scope>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CLOUDFS_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List a directory
    Ls {
        /// Directory to list
        #[arg(default_value = ROOT_PATH)]
        path: String,
    },
    /// Navigate interactively
    Browse,
    /// Create a text file (a uniquely named demo file by default)
    Create {
        #[arg(long)]
        target: Option<String>,
        #[arg(long, default_value = uploads::DEMO_FILE_CONTENT)]
        content: String,
    },
    /// Copy a local file or URI into the cloud
    Copy {
        #[command(flatten)]
        source: SourceArgs,
        /// Target path in the cloud
        target: String,
        /// MIME type, guessed from the target name when omitted
        #[arg(long)]
        mime: Option<String>,
    },
    /// Check whether a target exists
    Exists { target: String },
    /// Run the create and copy demos end to end
    Demo,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Local file to copy
    #[arg(long)]
    path: Option<PathBuf>,
    /// file:, http: or https: URI to copy
    #[arg(long)]
    uri: Option<String>,
}

impl SourceArgs {
    fn into_source(self) -> Result<SourcePath> {
        match (self.path, self.uri) {
            (Some(path), None) => Ok(SourcePath::LocalPath(path)),
            (None, Some(uri)) => Ok(SourcePath::RemoteUri(uri)),
            _ => bail!("exactly one of --path or --uri is required"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    // Load config, defaults when absent
    let config_path = cli.config_path.unwrap_or_else(CloudFsConfig::default_file);
    info!("loading config from {}", config_path.display());
    let mut config = CloudFsConfig::load_or_default(&config_path)?;

    // CLI args override config file
    if let Some(root) = cli.root {
        config.storage_root = Some(root);
    }
    if let Some(scope) = cli.scope {
        config.default_scope = scope;
    }

    let root = config.storage_root();
    info!(
        "cloudfs v{} (root={}, scope={})",
        env!("CARGO_PKG_VERSION"),
        root.display(),
        config.default_scope
    );
    let storage: Arc<dyn CloudStorage> = Arc::new(LocalCloudStorage::new(root));
    let scope = config.default_scope;

    match cli.command {
        Commands::Ls { path } => run_ls(storage, &config, &path, scope).await,
        Commands::Browse => browse::run_browse(storage, config.retry_policy(), scope).await,
        Commands::Create { target, content } => {
            let receipt = match target {
                Some(target) => uploads::create_file(storage.as_ref(), &target, &content, scope).await?,
                None => uploads::create_demo_file(storage.as_ref(), scope).await?,
            };
            println!("created {} ({} bytes)", receipt.target_path, receipt.bytes_written);
            Ok(())
        }
        Commands::Copy { source, target, mime } => {
            let mut slot = UploadSlot::new("copy", source.into_source()?, target, scope);
            let receipt = slot.copy_to_cloud(storage.as_ref(), mime).await?;
            println!(
                "copied {} -> {} ({} bytes, {})",
                slot.source.display_value(),
                receipt.target_path,
                receipt.bytes_written,
                receipt.mime_type
            );
            println!("target file exists: {}", slot.target_exists());
            Ok(())
        }
        Commands::Exists { target } => {
            let exists = storage.file_exists(&target, scope).await?;
            println!("{}", exists);
            Ok(())
        }
        Commands::Demo => demo::run_demo(storage.as_ref(), scope).await,
    }
}

async fn run_ls(
    storage: Arc<dyn CloudStorage>,
    config: &CloudFsConfig,
    path: &str,
    scope: Scope,
) -> Result<()> {
    let mut browser = DirectoryBrowser::new(storage, config.retry_policy(), scope);
    browser.refresh(path, scope);

    match browser.settle().await? {
        Applied::Loaded => {
            browse::print_listing(&browser);
            Ok(())
        }
        _ => bail!("could not list {} ({})", path, scope),
    }
}
