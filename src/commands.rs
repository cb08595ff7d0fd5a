use crate::config::LauncherConfig;
use crate::installer::ModpackInstaller;
use crate::instances::{InstanceStore, InstanceSummary};
use crate::modrinth::{
    find_best_version, mark_installed, ModrinthClient, ModrinthProject, ModrinthSearchResult,
    ModrinthVersionResponse, ProjectType, SearchQuery,
};
use crate::tracker::{
    InstallProgress, InstallRequest, InstallTracker, StatusEntry, TrackerListener,
    TrackerSnapshot,
};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};
use tokio::sync::mpsc;

pub const STATUS_EVENT: &str = "install://status";
pub const PROGRESS_EVENT: &str = "install://progress";
pub const INSTANCE_NAMED_EVENT: &str = "install://instance-named";
pub const REFRESH_EVENT: &str = "instances://refresh";

pub struct AppState {
    pub tracker: InstallTracker,
    pub client: ModrinthClient,
    pub store: InstanceStore,
}

impl AppState {
    pub fn build(app: AppHandle, config: LauncherConfig) -> Result<Self> {
        let store = InstanceStore::open(&config.instances_dir)?;
        let client = ModrinthClient::new(&config.modrinth_api, &config.user_agent);
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let installer = ModpackInstaller::new(client.clone(), store.clone(), progress_tx);

        let tracker = InstallTracker::with_runtime(
            tauri::async_runtime::handle().inner().clone(),
            Arc::new(installer),
            Arc::new(WebviewListener { app }),
            config.tracker.clone(),
        )
        .with_preferred_game_version(config.preferred_game_version.clone());
        tracker.listen(progress_rx)?;

        log::info!("Instances live in {}", store.root().display());
        Ok(Self {
            tracker,
            client,
            store,
        })
    }
}

#[derive(Clone, Serialize)]
struct StatusPayload<'a> {
    project_id: &'a str,
    entry: Option<&'a StatusEntry>,
}

#[derive(Clone, Serialize)]
struct InstanceNamedPayload<'a> {
    project_id: &'a str,
    instance_name: &'a str,
}

/// Forwards tracker changes to the webview as events.
struct WebviewListener {
    app: AppHandle,
}

impl TrackerListener for WebviewListener {
    fn instance_named(&self, project_id: &str, instance_name: &str) {
        let _ = self.app.emit(
            INSTANCE_NAMED_EVENT,
            InstanceNamedPayload {
                project_id,
                instance_name,
            },
        );
    }

    fn refresh_instances(&self) {
        let _ = self.app.emit(REFRESH_EVENT, ());
    }

    fn status_changed(&self, project_id: &str, entry: Option<&StatusEntry>) {
        let _ = self
            .app
            .emit(STATUS_EVENT, StatusPayload { project_id, entry });
    }

    fn progress_changed(&self, progress: &InstallProgress) {
        let _ = self.app.emit(PROGRESS_EVENT, progress);
    }
}

#[tauri::command]
pub async fn search_catalog(
    state: State<'_, AppState>,
    query: SearchQuery,
) -> Result<ModrinthSearchResult, String> {
    let mut result = state
        .client
        .search(&query)
        .await
        .map_err(|e| format!("{:#}", e))?;

    if query.project_type == ProjectType::Modpack {
        let installed: HashSet<String> = state
            .store
            .list()
            .map_err(|e| e.to_string())?
            .into_iter()
            .filter_map(|i| i.managed_pack_id)
            .collect();
        mark_installed(&mut result.hits, &installed);
    }

    Ok(result)
}

#[tauri::command]
pub async fn get_project_versions(
    state: State<'_, AppState>,
    project: String,
    game_version: Option<String>,
    loader: Option<String>,
) -> Result<Vec<ModrinthVersionResponse>, String> {
    state
        .client
        .project_versions(&project, game_version.as_deref(), loader.as_deref())
        .await
        .map_err(|e| format!("{:#}", e))
}

/// Newest version of `project` that supports both the game version and the
/// loader, if any.
#[tauri::command]
pub async fn get_compatible_version(
    state: State<'_, AppState>,
    project: String,
    game_version: String,
    loader: String,
) -> Result<Option<ModrinthVersionResponse>, String> {
    let versions = state
        .client
        .project_versions(&project, None, None)
        .await
        .map_err(|e| format!("{:#}", e))?;
    Ok(find_best_version(&versions, &game_version, &loader).cloned())
}

#[tauri::command]
pub fn list_instances(state: State<'_, AppState>) -> Result<Vec<InstanceSummary>, String> {
    state.store.list().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn installed_mods(state: State<'_, AppState>, instance: String) -> Result<Vec<String>, String> {
    let mut mods: Vec<String> = state
        .store
        .installed_mods(&instance)
        .map_err(|e| e.to_string())?
        .into_iter()
        .collect();
    mods.sort();
    Ok(mods)
}

#[tauri::command]
pub fn submit_install(
    state: State<'_, AppState>,
    project: ModrinthProject,
    version: ModrinthVersionResponse,
) -> Result<InstallRequest, String> {
    let existing = state
        .store
        .taken_names(&project.title)
        .map_err(|e| e.to_string())?;
    state
        .tracker
        .submit(&project, &version, &existing)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_install_state(state: State<'_, AppState>) -> TrackerSnapshot {
    state.tracker.snapshot()
}
