use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cloudfs_platform::storage::{CloudStorage, DirectoryListing, Scope};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn, Instrument};

use crate::display::{self, DisplayRow};

/// Path the browser starts at
pub const ROOT_PATH: &str = ".";

/// Outcomes buffered between fetch tasks and the browser owner
const OUTCOME_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("{0:?} is not a directory")]
    NotADirectory(String),
    #[error("no failed listing to retry")]
    NoFailedRequest,
    #[error("no listing in flight")]
    NothingPending,
}

/// Identifies one listing fetch. Later requests carry larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// How often and how patiently a failed listing is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based): base * 2^(attempt-1), capped at max
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserPhase {
    /// Nothing requested yet
    Idle,
    Loading { path: String, token: RequestToken },
    Loaded,
    /// Retries exhausted; only `retry()` leaves this state
    Failed { path: String, error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    pub current_path: String,
    pub scope: Scope,
    /// `None` while the first listing is pending
    pub listing: Option<DirectoryListing>,
}

/// Result of one listing fetch, delivered back to the browser owner
#[derive(Debug)]
pub struct FetchOutcome {
    pub token: RequestToken,
    pub path: String,
    pub scope: Scope,
    pub attempts: u32,
    pub result: anyhow::Result<DirectoryListing>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Loaded,
    Failed,
    /// A newer request was issued after this one
    Stale,
}

/// Navigable view of one storage scope.
///
/// Every `refresh` spawns a fetch task on the current tokio runtime. Results
/// come back through [`DirectoryBrowser::next_outcome`] and only the most
/// recently issued request is ever applied to the state.
pub struct DirectoryBrowser {
    storage: Arc<dyn CloudStorage>,
    retry: RetryPolicy,
    state: NavigationState,
    phase: BrowserPhase,
    next_token: u64,
    latest: Arc<AtomicU64>,
    outcome_tx: mpsc::Sender<FetchOutcome>,
    outcome_rx: mpsc::Receiver<FetchOutcome>,
}

impl DirectoryBrowser {
    pub fn new(storage: Arc<dyn CloudStorage>, retry: RetryPolicy, scope: Scope) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_SIZE);
        Self {
            storage,
            retry,
            state: NavigationState {
                current_path: ROOT_PATH.to_string(),
                scope,
                listing: None,
            },
            phase: BrowserPhase::Idle,
            next_token: 0,
            latest: Arc::new(AtomicU64::new(0)),
            outcome_tx,
            outcome_rx,
        }
    }

    /// Reset to the root of `scope` and start loading it
    pub fn initialize(&mut self, scope: Scope) -> RequestToken {
        self.state.current_path = ROOT_PATH.to_string();
        self.state.listing = None;
        self.refresh(ROOT_PATH, scope)
    }

    /// Request the listing of `path`, superseding any fetch still in flight
    pub fn refresh(&mut self, path: impl Into<String>, scope: Scope) -> RequestToken {
        let path = path.into();
        self.next_token += 1;
        let token = RequestToken(self.next_token);
        self.latest.store(token.0, Ordering::SeqCst);

        self.state.scope = scope;
        self.phase = BrowserPhase::Loading {
            path: path.clone(),
            token,
        };

        debug!("listing {} (scope={}, token={})", path, scope, token.0);

        let storage = self.storage.clone();
        let latest = self.latest.clone();
        let tx = self.outcome_tx.clone();
        let retry = self.retry;
        tokio::spawn(
            async move {
                fetch_listing(storage, path, scope, token, retry, latest, tx).await;
            }
            .in_current_span(),
        );

        token
    }

    /// Switch scope. Re-lists whatever is shown or loading; does nothing
    /// when the scope is unchanged or nothing has been requested yet.
    pub fn on_scope_changed(&mut self, scope: Scope) -> Option<RequestToken> {
        if scope == self.state.scope {
            return None;
        }
        self.state.scope = scope;

        if let BrowserPhase::Loading { path, .. } = &self.phase {
            let path = path.clone();
            return Some(self.refresh(path, scope));
        }
        if self.state.listing.is_some() {
            let path = self.state.current_path.clone();
            return Some(self.refresh(path, scope));
        }
        None
    }

    /// Descend into `name` relative to the current path
    pub fn on_directory_selected(&mut self, name: &str) -> Result<RequestToken, BrowserError> {
        if name != display::style().parent_name {
            if let Some(listing) = &self.state.listing {
                let is_file = listing
                    .files
                    .iter()
                    .any(|f| f.name == name && !f.is_directory);
                if is_file {
                    return Err(BrowserError::NotADirectory(name.to_string()));
                }
            }
        }

        let next = format!("{}/{}", self.state.current_path, name);
        Ok(self.refresh(next, self.state.scope))
    }

    /// Re-issue the listing that exhausted its retries
    pub fn retry(&mut self) -> Result<RequestToken, BrowserError> {
        match &self.phase {
            BrowserPhase::Failed { path, .. } => {
                let path = path.clone();
                info!("retrying listing of {}", path);
                Ok(self.refresh(path, self.state.scope))
            }
            _ => Err(BrowserError::NoFailedRequest),
        }
    }

    /// Wait for the next finished fetch (stale ones included). Pends while
    /// nothing is in flight.
    pub async fn next_outcome(&mut self) -> FetchOutcome {
        match self.outcome_rx.recv().await {
            Some(outcome) => outcome,
            // `outcome_tx` is owned by `self`, the channel cannot close first
            None => unreachable!("outcome channel closed while the browser holds its sender"),
        }
    }

    /// Fold a finished fetch into the state unless a newer request exists
    pub fn apply(&mut self, outcome: FetchOutcome) -> Applied {
        let latest = self.latest.load(Ordering::SeqCst);
        if outcome.token.0 != latest {
            debug!(
                "dropping stale listing of {} (token {}, latest {})",
                outcome.path, outcome.token.0, latest
            );
            return Applied::Stale;
        }

        match outcome.result {
            Ok(listing) => {
                for file in &listing.files {
                    debug!("{:?}", file);
                }
                info!(
                    "listed {} ({} entries, scope={})",
                    outcome.path,
                    listing.files.len(),
                    outcome.scope
                );
                self.state.current_path = outcome.path;
                self.state.scope = outcome.scope;
                self.state.listing = Some(listing);
                self.phase = BrowserPhase::Loaded;
                Applied::Loaded
            }
            Err(e) => {
                error!(
                    "list files failed for {} after {} attempt(s): {:#}",
                    outcome.path, outcome.attempts, e
                );
                self.phase = BrowserPhase::Failed {
                    path: outcome.path,
                    error: format!("{:#}", e),
                };
                Applied::Failed
            }
        }
    }

    /// Apply outcomes until the latest request has landed
    pub async fn settle(&mut self) -> Result<Applied, BrowserError> {
        if !self.is_loading() {
            return Err(BrowserError::NothingPending);
        }
        loop {
            let outcome = self.next_outcome().await;
            match self.apply(outcome) {
                Applied::Stale => continue,
                applied => return Ok(applied),
            }
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn phase(&self) -> &BrowserPhase {
        &self.phase
    }

    pub fn current_path(&self) -> &str {
        &self.state.current_path
    }

    pub fn scope(&self) -> Scope {
        self.state.scope
    }

    pub fn listing(&self) -> Option<&DirectoryListing> {
        self.state.listing.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, BrowserPhase::Loading { .. })
    }

    /// Rows to show, or `None` while the first listing is pending
    pub fn rows(&self) -> Option<Vec<DisplayRow>> {
        self.state.listing.as_ref().map(display::rows)
    }
}

async fn fetch_listing(
    storage: Arc<dyn CloudStorage>,
    path: String,
    scope: Scope,
    token: RequestToken,
    retry: RetryPolicy,
    latest: Arc<AtomicU64>,
    tx: mpsc::Sender<FetchOutcome>,
) {
    let mut attempts = 0u32;

    let result = loop {
        attempts += 1;
        match storage.list_files(&path, scope).await {
            Ok(listing) => break Ok(listing),
            Err(e) if attempts <= retry.max_retries => {
                let delay = retry.delay(attempts);
                warn!(
                    "list files failed for {} (attempt {}), retrying in {:.1}s: {:#}",
                    path,
                    attempts,
                    delay.as_secs_f64(),
                    e
                );
                time::sleep(delay).await;

                if latest.load(Ordering::SeqCst) != token.0 {
                    debug!("abandoning retries for {}, superseded", path);
                    return;
                }
            }
            Err(e) => break Err(e),
        }
    };

    let outcome = FetchOutcome {
        token,
        path,
        scope,
        attempts,
        result,
    };
    if tx.send(outcome).await.is_err() {
        debug!("browser dropped before listing completed");
    }
}
