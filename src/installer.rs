use crate::instances::{write_instance_config, InstanceStore};
use crate::modrinth::{ModrinthClient, ModrinthIndex, ModrinthIndexFile};
use crate::tracker::{InstallBackend, InstallFuture, InstallProgress, InstallRequest};
use anyhow::{anyhow, bail, Context, Result};
use sha2::{Digest, Sha512};
use std::fs::{self, File};
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use zip::ZipArchive;

const INDEX_FILE: &str = "modrinth.index.json";
const OVERRIDE_PREFIXES: [&str; 2] = ["overrides/", "client-overrides/"];

/// Reports progress for one instance onto the tracker's progress stream.
#[derive(Clone)]
pub struct ProgressReporter {
    instance: String,
    sender: UnboundedSender<InstallProgress>,
}

impl ProgressReporter {
    pub fn new(instance: impl Into<String>, sender: UnboundedSender<InstallProgress>) -> Self {
        Self {
            instance: instance.into(),
            sender,
        }
    }

    pub fn report(&self, progress: u32, stage: impl Into<String>) {
        // Nobody listening is fine, the install itself carries on.
        let _ = self.sender.send(InstallProgress {
            instance: self.instance.clone(),
            progress: progress.min(100),
            stage: stage.into(),
        });
    }
}

/// Installs Modrinth modpacks as new instances.
#[derive(Clone)]
pub struct ModpackInstaller {
    client: ModrinthClient,
    store: InstanceStore,
    progress: UnboundedSender<InstallProgress>,
}

impl ModpackInstaller {
    pub fn new(
        client: ModrinthClient,
        store: InstanceStore,
        progress: UnboundedSender<InstallProgress>,
    ) -> Self {
        Self {
            client,
            store,
            progress,
        }
    }

    pub async fn install(&self, request: &InstallRequest) -> Result<PathBuf> {
        let instance_dir = self.store.instance_dir(&request.instance_name);
        fs::create_dir_all(self.store.root())
            .with_context(|| format!("Failed to create {}", self.store.root().display()))?;

        // Claimed atomically. Only a directory claimed here is rolled back.
        match fs::create_dir(&instance_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => bail!(
                "Instance directory already exists: {}",
                instance_dir.display()
            ),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to create {}", instance_dir.display())
                })
            }
        }

        match self.install_into(request, &instance_dir).await {
            Ok(()) => Ok(instance_dir),
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&instance_dir) {
                    log::warn!(
                        "Failed to clean up {} after failed install: {}",
                        instance_dir.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    async fn install_into(&self, request: &InstallRequest, instance_dir: &Path) -> Result<()> {
        let progress = ProgressReporter::new(&request.instance_name, self.progress.clone());

        progress.report(0, "Fetching modpack info");
        let version_info = self.client.version(&request.version_id).await?;
        if version_info.project_id != request.project_id {
            log::debug!(
                "Version {} belongs to project {} (requested {})",
                version_info.id,
                version_info.project_id,
                request.project_id
            );
        }

        let mrpack_file = version_info
            .primary_mrpack()
            .ok_or_else(|| anyhow!("No .mrpack file found in version {}", version_info.id))?;

        log::info!(
            "Found mrpack file: {} ({} bytes)",
            mrpack_file.filename,
            mrpack_file.size
        );

        progress.report(10, format!("Downloading {}", mrpack_file.filename));
        let mrpack_bytes = self.client.download(&mrpack_file.url).await?;
        if let Some(expected) = mrpack_file.hashes.get("sha512") {
            verify_sha512(&mrpack_bytes, expected)
                .with_context(|| format!("Corrupt download: {}", mrpack_file.filename))?;
        }

        progress.report(20, "Extracting modpack");
        let minecraft_dir = instance_dir.join(".minecraft");
        fs::create_dir_all(&minecraft_dir)
            .with_context(|| format!("Failed to create {}", minecraft_dir.display()))?;
        let index = extract_mrpack(&mrpack_bytes, &minecraft_dir)?;

        let files: Vec<&ModrinthIndexFile> =
            index.files.iter().filter(|f| f.is_client_file()).collect();
        log::info!("Downloading {} mod files", files.len());

        for (i, file) in files.iter().enumerate() {
            let percent = 30 + (i * 65 / files.len().max(1)) as u32;
            progress.report(
                percent,
                format!("Downloading mods ({}/{}): {}", i + 1, files.len(), file.path),
            );
            self.download_index_file(file, &minecraft_dir).await?;
        }

        progress.report(98, "Writing instance config");
        write_instance_config(instance_dir, &request.instance_name, &version_info, &index)?;

        progress.report(100, "Done");
        log::info!(
            "Installed {} v{} into {}",
            version_info.name,
            version_info.version_number,
            instance_dir.display()
        );
        Ok(())
    }

    /// Tries each mirror in order until one yields a file with the right hash.
    async fn download_index_file(&self, file: &ModrinthIndexFile, minecraft_dir: &Path) -> Result<()> {
        let dest = safe_join(minecraft_dir, &file.path)?;
        let mut last_error = None;

        for url in &file.downloads {
            let attempt = async {
                let bytes = self.client.download(url).await?;
                if let Some(expected) = file.hashes.get("sha512") {
                    verify_sha512(&bytes, expected)?;
                }
                Ok::<_, anyhow::Error>(bytes)
            };

            match attempt.await {
                Ok(bytes) => {
                    if let Some(parent) = dest.parent() {
                        fs::create_dir_all(parent)
                            .with_context(|| format!("Failed to create {}", parent.display()))?;
                    }
                    fs::write(&dest, &bytes)
                        .with_context(|| format!("Failed to write {}", dest.display()))?;
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Failed to download {} from {}: {:#}", file.path, url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("No download URLs"))
            .context(format!("Failed to download {}", file.path)))
    }
}

impl InstallBackend for ModpackInstaller {
    fn install_modpack(&self, request: InstallRequest) -> InstallFuture {
        let installer = self.clone();
        Box::pin(async move {
            installer
                .install(&request)
                .await
                .map(|_| ())
                .map_err(|e| format!("{:#}", e))
        })
    }
}

/// Unpacks an `.mrpack`: override folders go into `minecraft_dir`, the index
/// is parsed and returned.
pub fn extract_mrpack(bytes: &[u8], minecraft_dir: &Path) -> Result<ModrinthIndex> {
    let mut zip =
        ZipArchive::new(Cursor::new(bytes)).context("Failed to open mrpack as zip")?;
    let mut index_content = None;

    log::debug!("Extracting mrpack with {} files", zip.len());

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let file_name = file.name().to_string();

        if file_name == INDEX_FILE {
            let mut content = String::new();
            file.read_to_string(&mut content)
                .context("Failed to read modrinth.index.json")?;
            index_content = Some(content);
            continue;
        }

        let Some(relative) = OVERRIDE_PREFIXES
            .iter()
            .find_map(|prefix| file_name.strip_prefix(prefix))
        else {
            continue;
        };
        if relative.is_empty() {
            continue;
        }

        let output_path = safe_join(minecraft_dir, relative)?;
        if file.is_dir() {
            fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut output_file = File::create(&output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            std::io::copy(&mut file, &mut output_file)?;
        }
    }

    let index_content = index_content.ok_or_else(|| anyhow!("mrpack has no {}", INDEX_FILE))?;
    serde_json::from_str(&index_content).context("Failed to parse modrinth.index.json")
}

/// Joins a relative archive path onto `base`, refusing anything that could
/// land outside of it.
pub fn safe_join(base: &Path, relative: &str) -> Result<PathBuf> {
    let relative = Path::new(relative);
    let mut joined = base.to_path_buf();

    for component in relative.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => bail!("Refusing unsafe path in modpack: {}", relative.display()),
        }
    }

    if joined == base {
        bail!("Empty path in modpack");
    }
    Ok(joined)
}

pub fn verify_sha512(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = format!("{:x}", Sha512::digest(bytes));
    if !actual.eq_ignore_ascii_case(expected) {
        bail!("Checksum mismatch: expected {}, got {}", expected, actual);
    }
    Ok(())
}
