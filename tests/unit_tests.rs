use modpack_launcher_lib::*;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_search_hit_parsing() {
    let json = r#"{
        "hits": [
            {
                "project_id": "1KVo5zza",
                "slug": "fabulously-optimized",
                "title": "Fabulously Optimized",
                "description": "Improve your graphics and performance",
                "project_type": "modpack",
                "downloads": 5000000,
                "icon_url": "https://cdn.modrinth.com/data/1KVo5zza/icon.png",
                "author": "robotkoer",
                "categories": ["optimization", "fabric"],
                "versions": ["1.20.1", "1.21.1"]
            }
        ],
        "offset": 0,
        "limit": 20,
        "total_hits": 1
    }"#;

    let result: ModrinthSearchResult = serde_json::from_str(json).unwrap();
    let hit = &result.hits[0];

    assert_eq!(hit.project_id, "1KVo5zza");
    assert_eq!(hit.slug, "fabulously-optimized");
    assert_eq!(hit.game_versions, vec!["1.20.1", "1.21.1"]);
    assert!(hit.loaders.is_empty());
    assert!(!hit.installed);
}

#[test]
fn test_project_parses_with_id_field() {
    let json = r#"{"id": "AANobbMI", "slug": "sodium", "title": "Sodium"}"#;
    let project: ModrinthProject = serde_json::from_str(json).unwrap();

    assert_eq!(project.project_id, "AANobbMI");
    assert_eq!(project.downloads, 0);
    assert_eq!(project.icon_url, None);
}

#[test]
fn test_modrinth_index_parsing() {
    let json = r#"{
        "formatVersion": 1,
        "game": "minecraft",
        "versionId": "6.4.0",
        "name": "Fabulously Optimized",
        "files": [
            {
                "path": "mods/sodium.jar",
                "hashes": {"sha1": "abc", "sha512": "def"},
                "env": {"client": "required", "server": "unsupported"},
                "downloads": ["https://cdn.modrinth.com/data/AANobbMI/sodium.jar"],
                "fileSize": 1024
            },
            {
                "path": "mods/server-only.jar",
                "hashes": {"sha1": "123"},
                "env": {"client": "unsupported", "server": "required"},
                "downloads": ["https://example.com/server-only.jar"],
                "fileSize": 2048
            },
            {
                "path": "config/options.txt",
                "hashes": {},
                "downloads": ["https://example.com/options.txt"]
            }
        ],
        "dependencies": {"minecraft": "1.21.1", "fabric-loader": "0.16.14"}
    }"#;

    let index: ModrinthIndex = serde_json::from_str(json).unwrap();

    assert_eq!(index.format_version, 1);
    assert_eq!(index.version_id, "6.4.0");
    assert_eq!(index.minecraft_version(), Some("1.21.1"));
    assert_eq!(index.loader(), Some(("fabric-loader", "0.16.14")));

    let client_files: Vec<&str> = index
        .files
        .iter()
        .filter(|f| f.is_client_file())
        .map(|f| f.path.as_str())
        .collect();
    assert_eq!(client_files, vec!["mods/sodium.jar", "config/options.txt"]);
    assert_eq!(index.files[2].file_size, 0);
}

#[test]
fn test_index_without_loader() {
    let json = r#"{"files": [], "dependencies": {"minecraft": "1.20.1"}}"#;
    let index: ModrinthIndex = serde_json::from_str(json).unwrap();

    assert_eq!(index.minecraft_version(), Some("1.20.1"));
    assert_eq!(index.loader(), None);
}

#[test]
fn test_install_status_serializes_lowercase() {
    assert_eq!(
        serde_json::to_string(&InstallStatus::Installing).unwrap(),
        "\"installing\""
    );
    assert_eq!(
        serde_json::to_string(&InstallStatus::Success).unwrap(),
        "\"success\""
    );
    assert_eq!(
        serde_json::to_string(&InstallStatus::Error).unwrap(),
        "\"error\""
    );
}

#[test]
fn test_progress_event_parsing() {
    let json = r#"{"instance": "Pack", "progress": 42, "stage": "Downloading mods"}"#;
    let event: InstallProgress = serde_json::from_str(json).unwrap();

    assert_eq!(event.instance, "Pack");
    assert_eq!(event.progress, 42);
    assert_eq!(event.stage, "Downloading mods");
}

#[test]
fn test_tracker_config_defaults() {
    let config = TrackerConfig::default();

    assert_eq!(config.success_display(), Duration::from_millis(3000));
    assert_eq!(config.error_display(), Duration::from_millis(5000));
    assert_eq!(config.refresh_delay(), Duration::from_millis(1000));
    assert!(!config.dedupe_submissions);
}

#[test]
fn test_missing_config_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = LauncherConfig::load_from(&temp_dir.path().join("config.toml")).unwrap();

    assert_eq!(config, LauncherConfig::default());
    assert_eq!(config.modrinth_api, "https://api.modrinth.com/v2");
}

#[test]
fn test_partial_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
instances_dir = "/games/instances"
preferred_game_version = "1.20.1"

[tracker]
error_display_ms = 8000
dedupe_submissions = true
"#,
    )
    .unwrap();

    let config = LauncherConfig::load_from(&path).unwrap();

    assert_eq!(config.instances_dir, std::path::PathBuf::from("/games/instances"));
    assert_eq!(config.preferred_game_version.as_deref(), Some("1.20.1"));
    assert_eq!(config.modrinth_api, "https://api.modrinth.com/v2");
    assert_eq!(config.tracker.success_display_ms, 3000);
    assert_eq!(config.tracker.error_display_ms, 8000);
    assert!(config.tracker.dedupe_submissions);
}

#[test]
fn test_malformed_config_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "tracker = [not valid").unwrap();

    let err = LauncherConfig::load_from(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config"));
}

#[test]
fn test_config_save_then_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = LauncherConfig::default();
    config.preferred_game_version = Some("1.21.1".to_string());
    config.tracker.refresh_delay_ms = 250;
    config.save_to(&path).unwrap();

    assert_eq!(LauncherConfig::load_from(&path).unwrap(), config);
}

#[test]
fn test_tracker_error_messages() {
    let err = TrackerError::AlreadyInstalling {
        project_id: "AANobbMI".to_string(),
    };
    assert_eq!(err.to_string(), "AANobbMI is already being installed");
    assert_eq!(
        TrackerError::ShutDown.to_string(),
        "install tracker has been shut down"
    );
}
