use chrono::{TimeZone, Utc};
use modpack_launcher_lib::*;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

// Test helper functions for mod name processing
#[test]
fn test_extract_mod_name_from_filename() {
    let test_cases = vec![
        ("fabric-api-0.91.0+1.21.1.jar", "fabric-api"),
        ("jei-12.3.0.0.jar", "jei"),
        ("modmenu-8.0.0+1.21.1.jar", "modmenu"),
        ("sodium-fabric-mc1.21.1-0.5.8.jar", "sodium"),
        ("iris-mc1.21.1-1.6.4.jar", "iris"),
        ("lithium-fabric-mc1.21.1-0.12.2.jar", "lithium"),
        ("mod_name_v1.2.3_mc1.21.1.jar", "mod-name"),
        ("some-mod-1.0.0-fabric.jar", "some-mod"),
        ("another_mod_2.0.0_neoforge.jar", "another-mod"),
        ("Xaeros_Minimap_24.5.0_Fabric_1.21", "xaeros-minimap"),
    ];

    for (filename, expected) in test_cases {
        let result = extract_mod_name_from_filename(filename);
        assert_eq!(result, expected, "Failed for filename: {}", filename);
    }
}

#[test]
fn test_normalize_mod_name() {
    let test_cases = vec![
        ("Fabric API", "fabricapi"),
        ("JEI", "jei"),
        ("Mod Menu", "modmenu"),
        ("sodium-fabric", "sodiumfabric"),
        ("iris_mc1.21.1", "irismc1.21.1"),
        ("test--mod", "testmod"),
        ("  spaced  mod  ", "spacedmod"),
    ];

    for (input, expected) in test_cases {
        let result = normalize_mod_name(input);
        assert_eq!(result, expected, "Failed for input: '{}'", input);
    }
}

#[test]
fn test_unique_instance_name() {
    let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    let existing = vec!["Pack".to_string(), "Other Pack".to_string()];

    assert_eq!(unique_instance_name("Fresh", &existing, now), "Fresh");
    assert_eq!(unique_instance_name("Pack", &existing, now), "Pack-1700000000123");
    // Only exact matches count
    assert_eq!(unique_instance_name("pack", &existing, now), "pack");
    assert_eq!(unique_instance_name("Pack", &[], now), "Pack");
}

#[test]
fn test_sanitize_dir_name() {
    assert_eq!(sanitize_dir_name("Fabulously Optimized"), "Fabulously Optimized");
    assert_eq!(sanitize_dir_name("a/b\\c:d"), "a_b_c_d");
    assert_eq!(sanitize_dir_name("../escape"), "_escape");
    assert_eq!(sanitize_dir_name("  .. "), "instance");
    assert_eq!(sanitize_dir_name(""), "instance");
}

fn make_instance(root: &std::path::Path, dir: &str, name: Option<&str>) {
    let path = root.join(dir);
    fs::create_dir_all(&path).unwrap();
    let mut cfg = String::from("[General]\nConfigVersion=1.2\nManagedPackID=1KVo5zza\n");
    if let Some(name) = name {
        cfg.push_str(&format!("name={}\n", name));
    }
    fs::write(path.join("instance.cfg"), cfg).unwrap();
}

#[test]
fn test_instance_store_lists_instances() {
    let temp_dir = TempDir::new().unwrap();
    let store = InstanceStore::open(temp_dir.path()).unwrap();

    make_instance(store.root(), "zeta", Some("Zeta Pack"));
    make_instance(store.root(), "alpha", None);
    // Not an instance without instance.cfg
    fs::create_dir_all(store.root().join("downloads")).unwrap();
    fs::write(store.root().join("loose-file.txt"), "x").unwrap();

    let instances = store.list().unwrap();
    let names: Vec<&str> = instances.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Zeta Pack", "alpha"]);
    assert_eq!(instances[0].managed_pack_id.as_deref(), Some("1KVo5zza"));

    assert_eq!(store.names().unwrap(), vec!["Zeta Pack", "alpha"]);
}

#[test]
fn test_taken_names_includes_occupied_directories() {
    let temp_dir = TempDir::new().unwrap();
    let store = InstanceStore::open(temp_dir.path()).unwrap();
    let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

    make_instance(store.root(), "zeta", Some("Zeta Pack"));
    // An install still in progress has no instance.cfg yet
    fs::create_dir_all(store.instance_dir("Pack")).unwrap();
    // "Pack?" and "Pack_" share a directory
    fs::create_dir_all(store.root().join("Pack_")).unwrap();

    let taken = store.taken_names("Pack").unwrap();
    assert_eq!(taken, vec!["Zeta Pack", "Pack"]);
    assert_eq!(unique_instance_name("Pack", &taken, now), "Pack-1700000000123");

    let taken = store.taken_names("Pack?").unwrap();
    assert_eq!(unique_instance_name("Pack?", &taken, now), "Pack?-1700000000123");

    // The directory is "zeta" but its listed name is "Zeta Pack"
    assert_eq!(store.taken_names("zeta").unwrap(), vec!["Zeta Pack", "zeta"]);
    // Listed names are not repeated
    assert_eq!(store.taken_names("Zeta Pack").unwrap(), vec!["Zeta Pack"]);

    let taken = store.taken_names("Fresh").unwrap();
    assert_eq!(unique_instance_name("Fresh", &taken, now), "Fresh");
}

#[test]
fn test_instance_store_missing_root() {
    let temp_dir = TempDir::new().unwrap();
    let store = InstanceStore::new(temp_dir.path().join("does-not-exist"));

    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_installed_mods() {
    let temp_dir = TempDir::new().unwrap();
    let store = InstanceStore::open(temp_dir.path()).unwrap();
    let mods_dir = store.instance_dir("Pack").join(".minecraft").join("mods");
    fs::create_dir_all(&mods_dir).unwrap();

    fs::write(mods_dir.join("sodium-fabric-mc1.21.1-0.5.8.jar"), "jar").unwrap();
    fs::write(mods_dir.join("fabric-api-0.91.0+1.21.1.jar"), "jar").unwrap();
    fs::write(mods_dir.join("notes.txt"), "not a mod").unwrap();

    let mods = store.installed_mods("Pack").unwrap();
    assert_eq!(mods.len(), 2);
    assert!(mods.contains("sodium"));
    assert!(mods.contains("fabricapi"));

    assert!(store.installed_mods("Missing").unwrap().is_empty());
}

#[test]
fn test_write_instance_config() {
    let temp_dir = TempDir::new().unwrap();
    let store = InstanceStore::open(temp_dir.path()).unwrap();
    let instance_dir = store.instance_dir("My Pack");
    fs::create_dir_all(&instance_dir).unwrap();

    let version_info = ModrinthVersionResponse {
        game_versions: vec!["1.21.1".to_string()],
        loaders: vec!["fabric".to_string()],
        id: "iRJMsGhm".to_string(),
        project_id: "1KVo5zza".to_string(),
        name: "Fabulously Optimized".to_string(),
        version_number: "6.4.0".to_string(),
        changelog: None,
        files: vec![],
        dependencies: vec![],
    };
    let index = ModrinthIndex {
        format_version: 1,
        game: "minecraft".to_string(),
        version_id: "6.4.0".to_string(),
        name: "Fabulously Optimized".to_string(),
        files: vec![],
        dependencies: HashMap::from([
            ("minecraft".to_string(), "1.21.1".to_string()),
            ("fabric-loader".to_string(), "0.16.14".to_string()),
        ]),
    };

    write_instance_config(&instance_dir, "My Pack", &version_info, &index).unwrap();

    let cfg = fs::read_to_string(instance_dir.join("instance.cfg")).unwrap();
    assert!(cfg.contains("name=My Pack"));
    assert!(cfg.contains("ManagedPackID=1KVo5zza"));
    assert!(cfg.contains("ManagedPackVersionName=6.4.0"));

    let pack: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(instance_dir.join("mmc-pack.json")).unwrap())
            .unwrap();
    let components = pack["components"].as_array().unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(components[0]["uid"], "net.minecraft");
    assert_eq!(components[0]["version"], "1.21.1");
    assert_eq!(components[1]["uid"], "net.fabricmc.fabric-loader");
    assert_eq!(components[1]["version"], "0.16.14");

    let instances = store.list().unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].name, "My Pack");
    assert_eq!(instances[0].managed_pack_version.as_deref(), Some("6.4.0"));
}
