//! Deploy orchestration - drives one publish attempt end to end.
//!
//! A publish runs through four steps:
//! - manifest build (hash the local tree)
//! - site resolution (create a new site or fetch the configured one)
//! - deploy negotiation (submit the manifest, receive the required set)
//! - required uploads (bounded worker pool over the shared HTTP client)
//!
//! The remote side content-addresses files, so only paths in the required
//! set are uploaded; everything else is already stored from earlier deploys.

pub mod state;

use crate::config::Config;
use crate::http::types::Site;
use crate::http::ApiClient;
use crate::manifest::{FileEntry, Manifest};
use crate::utils::errors::{DeployError, Result};
use serde::Serialize;
use state::{DeployPhase, PhaseTracker};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Summary returned after a successful deploy.
#[derive(Debug, Clone, Serialize)]
pub struct DeploySummary {
    pub site_id: String,
    pub deploy_id: String,
    pub url: String,
    pub total_files: usize,
    pub uploaded_files: usize,
    pub skipped_files: usize,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    pub duration_secs: u64,
}

/// Drives publish attempts against the deploy API.
///
/// One `Deployer` tracks one attempt at a time; concurrent `deploy` calls on
/// the same instance would interleave phase reporting.
pub struct Deployer {
    config: Config,
    api: ApiClient,
    cancel: CancellationToken,
    phase: Arc<PhaseTracker>,
}

impl Deployer {
    /// Create a deployer with no cancellation support.
    ///
    /// The configuration is validated here, so a missing credential fails
    /// before any network call is made.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_cancel(config, CancellationToken::new())
    }

    /// Create a deployer whose in-flight work stops when `cancel` triggers.
    pub fn with_cancel(config: Config, cancel: CancellationToken) -> Result<Self> {
        config.validate()?;
        let api = ApiClient::new(&config)?;

        Ok(Self {
            config,
            api,
            cancel,
            phase: Arc::new(PhaseTracker::new()),
        })
    }

    /// Observe the phase transitions of this deployer's attempts.
    pub fn phase(&self) -> watch::Receiver<DeployPhase> {
        self.phase.subscribe()
    }

    /// Publish `dir` and return resource ids, the public URL, and transfer
    /// statistics.
    ///
    /// Negotiation happens exactly once per call. Retrying after a failure
    /// means calling `deploy` again: that starts a fresh attempt and a
    /// fresh remote deploy resource, re-negotiating whatever is still
    /// missing remotely.
    pub async fn deploy(&self, dir: &Path) -> Result<DeploySummary> {
        self.phase.advance(DeployPhase::Building);

        match self.run(dir).await {
            Ok(summary) => {
                self.phase.advance(DeployPhase::Ready);
                Ok(summary)
            }
            Err(e) => {
                self.phase.advance(DeployPhase::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run(&self, dir: &Path) -> Result<DeploySummary> {
        let start_time = Instant::now();

        info!("Building manifest for {}", dir.display());

        // Hash the tree off the async runtime
        let root = dir.to_path_buf();
        let manifest = tokio::task::spawn_blocking(move || Manifest::build(&root))
            .await
            .map_err(|e| DeployError::Io(std::io::Error::other(e)))??;

        if self.cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        if manifest.is_empty() {
            warn!("Manifest is empty; publishing a site with no files");
        }
        info!(
            "Manifest built: {} files, {} bytes",
            manifest.len(),
            manifest.total_bytes()
        );

        self.phase.advance(DeployPhase::Negotiating);

        let site = self.resolve_site().await?;
        let url = site
            .public_url()
            .ok_or_else(|| DeployError::Protocol(format!("site {} has no public URL", site.id)))?
            .to_string();

        let negotiated = self.api.create_deploy(&site.id, manifest.hashes()).await?;

        // The required list is treated as a set; a duplicated path must not
        // be uploaded twice
        let required: BTreeSet<String> = negotiated.required.into_iter().collect();

        // Every required path must come from the submitted manifest. This is
        // checked up front so a bad negotiation aborts before any upload.
        let mut uploads = Vec::with_capacity(required.len());
        for path in &required {
            match manifest.get(path) {
                Some(entry) => uploads.push((path.clone(), entry.clone())),
                None => {
                    return Err(DeployError::Protocol(format!(
                        "remote requires {} which is not in the manifest",
                        path
                    )));
                }
            }
        }

        info!(
            "Deploy {} negotiated: {} of {} files required",
            negotiated.id,
            required.len(),
            manifest.len()
        );

        self.phase.advance(DeployPhase::Uploading {
            remaining: required.len(),
        });

        let uploaded_bytes = self.upload_required(&negotiated.id, uploads).await?;

        let skipped_files = manifest.len() - required.len();
        let duration_secs = start_time.elapsed().as_secs();

        info!(
            "Deploy {} complete: {} files uploaded, {} unchanged, {}s",
            negotiated.id,
            required.len(),
            skipped_files,
            duration_secs
        );

        Ok(DeploySummary {
            site_id: site.id,
            deploy_id: negotiated.id,
            url,
            total_files: manifest.len(),
            uploaded_files: required.len(),
            skipped_files,
            total_bytes: manifest.total_bytes(),
            uploaded_bytes,
            duration_secs,
        })
    }

    /// Fetch the configured site, or create a new one when no id is set.
    ///
    /// Every call without a site id creates a brand-new site resource, so
    /// repeat deploys of the same project should pass the id returned by
    /// the first.
    async fn resolve_site(&self) -> Result<Site> {
        match &self.config.site.id {
            Some(id) => {
                info!("Using existing site {}", id);
                self.api.get_site(id).await
            }
            None => {
                let name = generated_site_name(&self.config.site.name_prefix);
                let site = self.api.create_site(&name).await?;
                info!("Created site {} ({})", site.id, name);
                Ok(site)
            }
        }
    }

    /// Upload every required file through a bounded worker pool.
    ///
    /// Workers share the deployer's HTTP client and its connection pool.
    /// All tasks are awaited even when some fail, so the resulting error
    /// names every failed path. Returns the number of bytes uploaded.
    async fn upload_required(
        &self,
        deploy_id: &str,
        uploads: Vec<(String, FileEntry)>,
    ) -> Result<u64> {
        if uploads.is_empty() {
            return Ok(0);
        }

        let total = uploads.len();
        let semaphore = Arc::new(Semaphore::new(self.config.upload.concurrency));

        // Shared completion tracking; the phase change and the set shrink
        // happen under the same lock so observers see a clean countdown
        let remaining: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(
            uploads.iter().map(|(path, _)| path.clone()).collect(),
        ));

        let mut handles = Vec::with_capacity(total);

        for (path, entry) in uploads {
            let api = self.api.clone();
            let cancel = self.cancel.clone();
            let sem = Arc::clone(&semaphore);
            let remaining = Arc::clone(&remaining);
            let tracker = Arc::clone(&self.phase);
            let deploy_id = deploy_id.to_string();
            let task_path = path.clone();

            let handle = tokio::spawn(async move {
                // Check cancellation before acquiring a permit
                if cancel.is_cancelled() {
                    return Err(DeployError::Cancelled);
                }

                let _permit = tokio::select! {
                    permit = sem.acquire() => permit.map_err(|e| {
                        DeployError::Io(std::io::Error::other(format!("upload pool closed: {}", e)))
                    })?,
                    _ = cancel.cancelled() => return Err(DeployError::Cancelled),
                };

                if cancel.is_cancelled() {
                    return Err(DeployError::Cancelled);
                }

                let bytes = match tokio::fs::read(&entry.source).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        error!("Failed to read {}: {}", entry.source.display(), e);
                        return Err(DeployError::Io(e));
                    }
                };
                let size = bytes.len() as u64;
                let content_type = content_type_for(&task_path);

                let result = tokio::select! {
                    result = api.upload_file(&deploy_id, &task_path, &content_type, bytes) => result,
                    _ = cancel.cancelled() => return Err(DeployError::Cancelled),
                };

                match result {
                    Ok(()) => {
                        {
                            let mut set = remaining.lock().await;
                            set.remove(&task_path);
                            tracker.advance(DeployPhase::Uploading {
                                remaining: set.len(),
                            });
                        }
                        info!("Uploaded {} ({} bytes)", task_path, size);
                        Ok(size)
                    }
                    Err(e) => {
                        error!("Upload failed for {}: {}", task_path, e);
                        Err(e)
                    }
                }
            });

            handles.push((path, handle));
        }

        let mut uploaded_bytes = 0u64;
        let mut failed: Vec<String> = Vec::new();

        for (path, handle) in handles {
            match handle.await {
                Ok(Ok(bytes)) => uploaded_bytes += bytes,
                // Per-file causes are logged inside the task
                Ok(Err(_)) => failed.push(path),
                Err(e) => {
                    error!("Upload task for {} panicked: {}", path, e);
                    failed.push(path);
                }
            }
        }

        if self.cancel.is_cancelled() {
            info!(
                "Deploy cancelled: {} of {} uploads finished",
                total - failed.len(),
                total
            );
            return Err(DeployError::Cancelled);
        }

        if !failed.is_empty() {
            return Err(DeployError::PartialUpload { failed });
        }

        Ok(uploaded_bytes)
    }
}

/// Generate a unique site name: the configured prefix plus a random
/// 8-character hex suffix, so concurrent runs never collide.
fn generated_site_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}

/// Infer the content-type for a manifest path from its extension, falling
/// back to a generic binary type.
fn content_type_for(path: &str) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}
