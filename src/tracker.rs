//! Per-item install status for the content browser.
//!
//! A submission marks its project as `installing`, runs the backend install
//! on a task and flips the status to `success` or `error` when it settles.
//! Settled entries expire after a fixed display window. Progress arrives on a
//! separate stream keyed by instance name and is stored last-write-wins.

use crate::config::TrackerConfig;
use crate::instances::unique_instance_name;
use crate::modrinth::{preferred_game_version, ModrinthProject, ModrinthVersionResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use uuid::Uuid;

pub type InstallFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// The backend command that performs an install. Failures are opaque
/// messages shown to the user as-is.
pub trait InstallBackend: Send + Sync + 'static {
    fn install_modpack(&self, request: InstallRequest) -> InstallFuture;
}

/// Callbacks into the hosting UI. All methods default to doing nothing.
pub trait TrackerListener: Send + Sync + 'static {
    /// Called at submission time with the final instance name, before the
    /// backend has confirmed anything.
    fn instance_named(&self, _project_id: &str, _instance_name: &str) {}

    /// Called after a successful install so the instance list is reloaded.
    fn refresh_instances(&self) {}

    /// `None` means the entry expired.
    fn status_changed(&self, _project_id: &str, _entry: Option<&StatusEntry>) {}

    fn progress_changed(&self, _progress: &InstallProgress) {}
}

/// Listener for hosts that only poll.
pub struct NoopListener;

impl TrackerListener for NoopListener {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRequest {
    /// Catalog slug of the modpack.
    pub project_id: String,
    pub instance_name: String,
    pub version_id: String,
    pub preferred_game_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Installing,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: InstallStatus,
    pub instance_name: String,
    pub error: Option<String>,
    /// Identifies the submission that owns this entry.
    pub ticket: Uuid,
}

/// Inbound progress notification for an in-flight install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallProgress {
    pub instance: String,
    pub progress: u32,
    pub stage: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub statuses: HashMap<String, StatusEntry>,
    pub progress: HashMap<String, InstallProgress>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("{project_id} is already being installed")]
    AlreadyInstalling { project_id: String },
    #[error("install tracker has been shut down")]
    ShutDown,
}

#[derive(Default)]
struct TrackerState {
    // Keyed by project id.
    statuses: HashMap<String, StatusEntry>,
    // Keyed by instance name.
    progress: HashMap<String, InstallProgress>,
}

struct Shared {
    state: Mutex<TrackerState>,
    listener: Arc<dyn TrackerListener>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, project_id: &str, entry: StatusEntry) {
        self.state()
            .statuses
            .insert(project_id.to_string(), entry.clone());
        self.listener.status_changed(project_id, Some(&entry));
    }

    /// Drops the entry only if it still belongs to `ticket`.
    fn expire(&self, project_id: &str, ticket: Uuid) {
        let removed = {
            let mut state = self.state();
            let owned = state
                .statuses
                .get(project_id)
                .map_or(false, |entry| entry.ticket == ticket);
            let entry = if owned {
                state.statuses.remove(project_id)
            } else {
                None
            };
            if let Some(entry) = &entry {
                state.progress.remove(&entry.instance_name);
            }
            entry.is_some()
        };

        if removed {
            log::debug!("Install status for {} expired", project_id);
            self.listener.status_changed(project_id, None);
        }
    }

    fn record_progress(&self, event: InstallProgress) {
        self.state()
            .progress
            .insert(event.instance.clone(), event.clone());
        self.listener.progress_changed(&event);
    }
}

pub struct InstallTracker {
    shared: Arc<Shared>,
    backend: Arc<dyn InstallBackend>,
    config: TrackerConfig,
    preferred_game_version: Option<String>,
    runtime: Handle,
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl InstallTracker {
    /// Must be called from within a Tokio runtime; use [`Self::with_runtime`]
    /// otherwise.
    pub fn new(
        backend: Arc<dyn InstallBackend>,
        listener: Arc<dyn TrackerListener>,
        config: TrackerConfig,
    ) -> Self {
        Self::with_runtime(Handle::current(), backend, listener, config)
    }

    pub fn with_runtime(
        runtime: Handle,
        backend: Arc<dyn InstallBackend>,
        listener: Arc<dyn TrackerListener>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TrackerState::default()),
                listener,
            }),
            backend,
            config,
            preferred_game_version: None,
            runtime,
            tasks: Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Game version to prefer when a pack supports several.
    pub fn with_preferred_game_version(mut self, version: Option<String>) -> Self {
        self.preferred_game_version = version;
        self
    }

    /// Starts installing `version` of `item` as a new instance. The status is
    /// `installing` by the time this returns.
    pub fn submit(
        &self,
        item: &ModrinthProject,
        version: &ModrinthVersionResponse,
        existing_instances: &[String],
    ) -> Result<InstallRequest, TrackerError> {
        let project_id = item.project_id.clone();

        if self.config.dedupe_submissions
            && self.status(&project_id) == Some(InstallStatus::Installing)
        {
            return Err(TrackerError::AlreadyInstalling { project_id });
        }

        let request = InstallRequest {
            project_id: item.slug.clone(),
            instance_name: unique_instance_name(&item.title, existing_instances, chrono::Utc::now()),
            version_id: version.id.clone(),
            preferred_game_version: preferred_game_version(
                version,
                self.preferred_game_version.as_deref(),
            ),
        };
        let ticket = Uuid::new_v4();

        let shared = Arc::clone(&self.shared);

        if self.is_shut_down() {
            return Err(TrackerError::ShutDown);
        }

        // Callbacks and the backend run without the task lock held, so they
        // may call back into the tracker.
        log::info!(
            "Installing {} ({}) as instance {:?}",
            project_id,
            request.version_id,
            request.instance_name
        );
        shared.set_status(
            &project_id,
            StatusEntry {
                status: InstallStatus::Installing,
                instance_name: request.instance_name.clone(),
                error: None,
                ticket,
            },
        );
        shared
            .listener
            .instance_named(&project_id, &request.instance_name);

        let install = self.backend.install_modpack(request.clone());

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // A shutdown from inside a callback drops the install unawaited.
        let tasks = tasks.as_mut().ok_or(TrackerError::ShutDown)?;
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(
            settle_install(
                shared,
                install,
                self.config.clone(),
                project_id,
                request.instance_name.clone(),
                ticket,
            ),
            &self.runtime,
        );

        Ok(request)
    }

    /// Overwrites the progress record for the event's instance.
    pub fn on_progress_event(&self, event: InstallProgress) {
        self.shared.record_progress(event);
    }

    /// Feeds a progress stream into the tracker until the sender side closes.
    pub fn listen(&self, mut events: UnboundedReceiver<InstallProgress>) -> Result<(), TrackerError> {
        let shared = Arc::clone(&self.shared);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let tasks = tasks.as_mut().ok_or(TrackerError::ShutDown)?;

        tasks.spawn_on(
            async move {
                while let Some(event) = events.recv().await {
                    shared.record_progress(event);
                }
                log::debug!("Progress stream closed");
            },
            &self.runtime,
        );
        Ok(())
    }

    pub fn status(&self, project_id: &str) -> Option<InstallStatus> {
        self.shared
            .state()
            .statuses
            .get(project_id)
            .map(|entry| entry.status)
    }

    pub fn entry(&self, project_id: &str) -> Option<StatusEntry> {
        self.shared.state().statuses.get(project_id).cloned()
    }

    pub fn progress(&self, instance_name: &str) -> Option<InstallProgress> {
        self.shared.state().progress.get(instance_name).cloned()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.shared.state();
        TrackerSnapshot {
            statuses: state.statuses.clone(),
            progress: state.progress.clone(),
        }
    }

    /// Aborts every pending install handler, timer and listener. State is left
    /// as it was; no further transitions happen.
    pub fn shutdown(&self) {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut tasks) = tasks {
            if !tasks.is_empty() {
                log::debug!("Aborting {} tracker tasks", tasks.len());
            }
            tasks.abort_all();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for InstallTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn settle_install(
    shared: Arc<Shared>,
    install: InstallFuture,
    config: TrackerConfig,
    project_id: String,
    instance_name: String,
    ticket: Uuid,
) {
    match install.await {
        Ok(()) => {
            log::info!("Installed {} as {:?}", project_id, instance_name);
            shared.set_status(
                &project_id,
                StatusEntry {
                    status: InstallStatus::Success,
                    instance_name,
                    error: None,
                    ticket,
                },
            );

            let refresh = async {
                tokio::time::sleep(config.refresh_delay()).await;
                shared.listener.refresh_instances();
            };
            let expire = async {
                tokio::time::sleep(config.success_display()).await;
                shared.expire(&project_id, ticket);
            };
            tokio::join!(refresh, expire);
        }
        Err(error) => {
            log::error!("Failed to install {}: {}", project_id, error);
            shared.set_status(
                &project_id,
                StatusEntry {
                    status: InstallStatus::Error,
                    instance_name,
                    error: Some(error),
                    ticket,
                },
            );

            tokio::time::sleep(config.error_display()).await;
            shared.expire(&project_id, ticket);
        }
    }
}
