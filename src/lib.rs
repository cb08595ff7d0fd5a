pub mod config;
pub mod installer;
pub mod instances;
pub mod modrinth;
pub mod tracker;

#[cfg(feature = "desktop")]
pub mod commands;

pub use config::{LauncherConfig, TrackerConfig};
pub use installer::{extract_mrpack, safe_join, verify_sha512, ModpackInstaller, ProgressReporter};
pub use instances::{
    extract_mod_name_from_filename, normalize_mod_name, sanitize_dir_name, unique_instance_name,
    write_instance_config, InstanceStore, InstanceSummary,
};
pub use modrinth::{
    find_best_version, mark_installed, preferred_game_version, ModrinthClient,
    ModrinthDependency, ModrinthFile, ModrinthIndex, ModrinthIndexEnv, ModrinthIndexFile,
    ModrinthProject, ModrinthSearchResult, ModrinthVersionResponse, ProjectType, SearchQuery,
};
pub use tracker::{
    InstallBackend, InstallFuture, InstallProgress, InstallRequest, InstallStatus,
    InstallTracker, NoopListener, StatusEntry, TrackerError, TrackerListener, TrackerSnapshot,
};

/// Installs the `env_logger` backend for the `log` macros. `RUST_LOG`
/// overrides the default `info` filter. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    init_logging();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let config = LauncherConfig::load()?;
            let state = commands::AppState::build(app.handle().clone(), config)?;
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::search_catalog,
            commands::get_project_versions,
            commands::get_compatible_version,
            commands::list_instances,
            commands::installed_mods,
            commands::submit_install,
            commands::get_install_state,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
