use crate::modrinth::{ModrinthIndex, ModrinthVersionResponse};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const INSTANCE_CFG: &str = "instance.cfg";
const MMC_PACK: &str = "mmc-pack.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceSummary {
    pub name: String,
    pub path: PathBuf,
    pub managed_pack_id: Option<String>,
    pub managed_pack_version: Option<String>,
}

/// The directory holding all local instances.
#[derive(Debug, Clone)]
pub struct InstanceStore {
    root: PathBuf,
}

impl InstanceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root if needed and canonicalizes it.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create instances dir {}", root.display()))?;
        let root = dunce::canonicalize(root)
            .with_context(|| format!("Failed to resolve instances dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_dir_name(name))
    }

    /// All instances, sorted by name. A directory counts once it has an
    /// `instance.cfg`.
    pub fn list(&self) -> Result<Vec<InstanceSummary>> {
        let mut instances = Vec::new();

        if !self.root.exists() {
            return Ok(instances);
        }

        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read {}", self.root.display()))?;

        for entry in entries {
            let path = entry.context("Failed to read directory entry")?.path();
            let cfg_path = path.join(INSTANCE_CFG);
            if !path.is_dir() || !cfg_path.exists() {
                continue;
            }

            let cfg = match fs::read_to_string(&cfg_path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("Skipping {}: {}", cfg_path.display(), e);
                    continue;
                }
            };

            let dir_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            instances.push(InstanceSummary {
                name: cfg_value(&cfg, "name").unwrap_or(dir_name),
                managed_pack_id: cfg_value(&cfg, "ManagedPackID"),
                managed_pack_version: cfg_value(&cfg, "ManagedPackVersionName"),
                path,
            });
        }

        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instances)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.list()?.into_iter().map(|i| i.name).collect())
    }

    /// Normalized names of the mods installed in an instance.
    pub fn installed_mods(&self, name: &str) -> Result<HashSet<String>> {
        let mods_dir = self.instance_dir(name).join(".minecraft").join("mods");
        get_existing_mod_names(&mods_dir)
    }

    /// Names a new instance called `title` has to avoid: every listed
    /// instance, plus `title` itself when its directory is already occupied
    /// (an install still running, or a different title mapping to the same
    /// directory).
    pub fn taken_names(&self, title: &str) -> Result<Vec<String>> {
        let mut names = self.names()?;
        if self.instance_dir(title).exists() && !names.iter().any(|n| n == title) {
            names.push(title.to_string());
        }
        Ok(names)
    }
}

fn cfg_value(cfg: &str, key: &str) -> Option<String> {
    cfg.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim().to_string())
    })
}

/// Returns `title` unless an instance already uses it, in which case the
/// current unix time in milliseconds is appended.
pub fn unique_instance_name(title: &str, existing: &[String], now: DateTime<Utc>) -> String {
    if existing.iter().any(|name| name == title) {
        format!("{}-{}", title, now.timestamp_millis())
    } else {
        title.to_string()
    }
}

/// Directory name for an instance; characters that are invalid in paths on
/// some platform become `_`.
pub fn sanitize_dir_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "instance".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Writes `instance.cfg` and `mmc-pack.json` for a freshly installed modpack.
pub fn write_instance_config(
    instance_dir: &Path,
    instance_name: &str,
    version_info: &ModrinthVersionResponse,
    index: &ModrinthIndex,
) -> Result<()> {
    log::info!("Creating instance configuration files in {}", instance_dir.display());

    let instance_cfg = format!(
        r#"[General]
ConfigVersion=1.2
ManagedPack=true
iconKey=modrinth_{0}
ManagedPackID={0}
ManagedPackType=modrinth
ManagedPackName={1}
ManagedPackVersionID={2}
ManagedPackVersionName={3}
name={4}
InstanceType=OneSix
"#,
        version_info.project_id,
        version_info.name,
        version_info.id,
        version_info.version_number,
        instance_name
    );

    fs::write(instance_dir.join(INSTANCE_CFG), instance_cfg)
        .context("Failed to write instance.cfg")?;

    let minecraft_version = index
        .minecraft_version()
        .or_else(|| version_info.game_versions.first().map(String::as_str))
        .ok_or_else(|| anyhow!("No game version found"))?;

    let mut components = vec![serde_json::json!({
        "cachedName": "Minecraft",
        "cachedVersion": minecraft_version,
        "important": true,
        "uid": "net.minecraft",
        "version": minecraft_version
    })];

    if let Some((loader, loader_version)) = index.loader() {
        let (uid, name) = match loader {
            "fabric-loader" => ("net.fabricmc.fabric-loader", "Fabric Loader"),
            "quilt-loader" => ("org.quiltmc.quilt-loader", "Quilt Loader"),
            "neoforge" => ("net.neoforged", "NeoForge"),
            _ => ("net.minecraftforge", "Forge"),
        };
        components.push(serde_json::json!({
            "cachedName": name,
            "cachedVersion": loader_version,
            "uid": uid,
            "version": loader_version
        }));
    }

    let mmc_pack = serde_json::json!({
        "components": components,
        "formatVersion": 1
    });
    fs::write(
        instance_dir.join(MMC_PACK),
        serde_json::to_string_pretty(&mmc_pack)?,
    )
    .context("Failed to write mmc-pack.json")?;

    Ok(())
}

fn get_existing_mod_names(mods_dir: &Path) -> Result<HashSet<String>> {
    let mut existing_mods = HashSet::new();

    if !mods_dir.exists() {
        return Ok(existing_mods);
    }

    log::debug!("Scanning existing mods in: {}", mods_dir.display());

    let entries = fs::read_dir(mods_dir).context("Failed to read mods directory")?;

    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();

        if path.is_file() && path.extension().map_or(false, |ext| ext == "jar") {
            if let Some(file_str) = path.file_stem().and_then(|n| n.to_str()) {
                let mod_name = extract_mod_name_from_filename(file_str);
                existing_mods.insert(normalize_mod_name(&mod_name));
            }
        }
    }

    log::debug!("Found {} existing mod files", existing_mods.len());
    Ok(existing_mods)
}

/// Strips loader tags and version numbers from a jar file name:
/// `sodium-fabric-mc1.21.1-0.5.8.jar` becomes `sodium`.
pub fn extract_mod_name_from_filename(filename: &str) -> String {
    let mut name = filename.to_lowercase();
    if let Some(stripped) = name.strip_suffix(".jar") {
        name = stripped.to_string();
    }

    let loader_patterns = [
        "_fabric_", "_forge_", "_neoforge_", "_quilt_", "-fabric-", "-forge-", "-neoforge-",
        "-quilt-", "_fabric", "_forge", "_neoforge", "_quilt", "-fabric", "-forge", "-neoforge",
        "-quilt",
    ];
    if let Some(pos) = loader_patterns.iter().find_map(|p| name.find(p)) {
        name.truncate(pos);
    }

    let version_patterns = ["_v", "_mc", "-v", "-mc", "+v", "+mc"];
    if let Some(pos) = version_patterns.iter().find_map(|p| name.find(p)) {
        name.truncate(pos);
    }

    // Stop at the first part that looks like a version number.
    let clean_parts: Vec<&str> = name
        .split(&['-', '_', '+'][..])
        .filter(|part| !part.is_empty())
        .take_while(|part| {
            !(part.starts_with(|c: char| c.is_ascii_digit())
                || part.chars().all(|c| c.is_ascii_digit() || c == '.'))
        })
        .collect();

    clean_parts.join("-")
}

/// Lowercases and drops separators so differently spelled names compare equal.
pub fn normalize_mod_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect()
}
