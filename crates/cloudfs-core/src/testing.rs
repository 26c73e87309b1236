// Scriptable in-memory storage for unit tests
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use cloudfs_platform::storage::{
    CloudStorage, CopyReceipt, CopyRequest, CreateReceipt, CreateRequest, DirectoryListing,
    Scope,
};
use tokio::sync::Notify;

#[derive(Default)]
pub(crate) struct MockStorage {
    calls: Mutex<Vec<(String, Scope)>>,
    listings: Mutex<HashMap<String, DirectoryListing>>,
    /// path -> failures left before succeeding
    failures: Mutex<HashMap<String, u32>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    files: Mutex<HashSet<(String, Scope)>>,
    fail_writes: Mutex<bool>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listing(&self, path: &str, listing: DirectoryListing) {
        self.listings.lock().unwrap().insert(path.to_string(), listing);
    }

    pub fn fail_times(&self, path: &str, times: u32) {
        self.failures.lock().unwrap().insert(path.to_string(), times);
    }

    pub fn fail_always(&self, path: &str) {
        self.fail_times(path, u32::MAX);
    }

    pub fn clear_failures(&self, path: &str) {
        self.failures.lock().unwrap().remove(path);
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Hold `list_files(path)` until the returned notify fires
    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(path.to_string(), notify.clone());
        notify
    }

    pub fn calls(&self) -> Vec<(String, Scope)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn has_file(&self, path: &str, scope: Scope) -> bool {
        self.files
            .lock()
            .unwrap()
            .contains(&(path.to_string(), scope))
    }

    fn check_writes(&self) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            bail!("mock write failure");
        }
        Ok(())
    }
}

#[async_trait]
impl CloudStorage for MockStorage {
    async fn list_files(&self, target_path: &str, scope: Scope) -> Result<DirectoryListing> {
        self.calls
            .lock()
            .unwrap()
            .push((target_path.to_string(), scope));

        let gate = self.gates.lock().unwrap().get(target_path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(target_path) {
                if *left > 0 {
                    if *left != u32::MAX {
                        *left -= 1;
                    }
                    bail!("mock failure listing {}", target_path);
                }
            }
        }

        let listing = self.listings.lock().unwrap().get(target_path).cloned();
        Ok(listing.unwrap_or_else(|| DirectoryListing {
            path: target_path.to_string(),
            files: Vec::new(),
        }))
    }

    async fn copy_to_cloud(&self, req: CopyRequest) -> Result<CopyReceipt> {
        self.check_writes()?;
        self.files
            .lock()
            .unwrap()
            .insert((req.target_path.clone(), req.scope));
        Ok(CopyReceipt {
            target_path: req.target_path,
            bytes_written: 0,
            mime_type: req
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        })
    }

    async fn create_file(&self, req: CreateRequest) -> Result<CreateReceipt> {
        self.check_writes()?;
        self.files
            .lock()
            .unwrap()
            .insert((req.target_path.clone(), req.scope));
        Ok(CreateReceipt {
            target_path: req.target_path,
            bytes_written: req.content.len() as u64,
        })
    }

    async fn file_exists(&self, target_path: &str, scope: Scope) -> Result<bool> {
        Ok(self.has_file(target_path, scope))
    }
}
