use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A search hit from the catalog, one entry per browsable project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModrinthProject {
    #[serde(alias = "id")]
    pub project_id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub downloads: u64,
    pub icon_url: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, alias = "versions")]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    // Not part of the API response, filled in by `mark_installed`.
    #[serde(default)]
    pub installed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModrinthSearchResult {
    pub hits: Vec<ModrinthProject>,
    pub offset: u32,
    pub limit: u32,
    pub total_hits: u32,
}

impl ModrinthSearchResult {
    /// Zero-based page index of this result set.
    pub fn page(&self) -> u32 {
        if self.limit == 0 {
            0
        } else {
            self.offset / self.limit
        }
    }

    pub fn page_count(&self) -> u32 {
        if self.limit == 0 {
            0
        } else {
            self.total_hits.div_ceil(self.limit)
        }
    }

    pub fn has_next_page(&self) -> bool {
        self.offset.saturating_add(self.limit) < self.total_hits
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModrinthVersionResponse {
    pub game_versions: Vec<String>,
    pub loaders: Vec<String>,
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub version_number: String,
    pub changelog: Option<String>,
    pub files: Vec<ModrinthFile>,
    #[serde(default)]
    pub dependencies: Vec<ModrinthDependency>,
}

impl ModrinthVersionResponse {
    /// The primary `.mrpack` of a modpack version, falling back to any `.mrpack`.
    pub fn primary_mrpack(&self) -> Option<&ModrinthFile> {
        self.files
            .iter()
            .find(|f| f.primary && f.filename.ends_with(".mrpack"))
            .or_else(|| self.files.iter().find(|f| f.filename.ends_with(".mrpack")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModrinthFile {
    pub hashes: HashMap<String, String>,
    pub url: String,
    pub filename: String,
    pub primary: bool,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModrinthDependency {
    pub version_id: Option<String>,
    pub project_id: Option<String>,
    pub file_name: Option<String>,
    pub dependency_type: String,
}

/// `modrinth.index.json` from inside an `.mrpack`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModrinthIndex {
    #[serde(rename = "formatVersion", default)]
    pub format_version: u32,
    #[serde(default)]
    pub game: String,
    #[serde(rename = "versionId", default)]
    pub version_id: String,
    #[serde(default)]
    pub name: String,
    pub files: Vec<ModrinthIndexFile>,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
}

impl ModrinthIndex {
    pub fn minecraft_version(&self) -> Option<&str> {
        self.dependencies.get("minecraft").map(String::as_str)
    }

    /// The mod loader dependency as `(loader id, version)`.
    pub fn loader(&self) -> Option<(&str, &str)> {
        ["fabric-loader", "quilt-loader", "neoforge", "forge"]
            .into_iter()
            .find_map(|id| self.dependencies.get(id).map(|v| (id, v.as_str())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModrinthIndexFile {
    pub path: String,
    pub hashes: HashMap<String, String>,
    #[serde(default)]
    pub env: Option<ModrinthIndexEnv>,
    pub downloads: Vec<String>,
    #[serde(rename = "fileSize", default)]
    pub file_size: u64,
}

impl ModrinthIndexFile {
    /// Files marked `unsupported` on the client are skipped.
    pub fn is_client_file(&self) -> bool {
        self.env
            .as_ref()
            .map_or(true, |env| env.client != "unsupported")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModrinthIndexEnv {
    pub client: String,
    pub server: String,
}

/// The content tabs of the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Mod,
    Modpack,
    ResourcePack,
    Shader,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProjectType::Mod => "mod",
            ProjectType::Modpack => "modpack",
            ProjectType::ResourcePack => "resourcepack",
            ProjectType::Shader => "shader",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub project_type: ProjectType,
    pub game_version: Option<String>,
    pub loader: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Sort index: relevance, downloads, follows, newest, updated.
    pub index: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, project_type: ProjectType) -> Self {
        Self {
            query: query.into(),
            project_type,
            game_version: None,
            loader: None,
            categories: Vec::new(),
            index: None,
            limit: 20,
            offset: 0,
        }
    }

    /// Jump to a zero-based page, keeping the current limit.
    pub fn with_page(mut self, page: u32) -> Self {
        self.offset = page.saturating_mul(self.limit);
        self
    }

    /// Facet groups for the search endpoint. Groups are ANDed together.
    pub fn facets(&self) -> Vec<Vec<String>> {
        let mut groups = vec![vec![format!("project_type:{}", self.project_type)]];

        if let Some(version) = self.game_version.as_deref().filter(|v| !v.is_empty()) {
            groups.push(vec![format!("versions:{}", version)]);
        }
        if let Some(loader) = self.loader.as_deref().filter(|l| !l.is_empty()) {
            groups.push(vec![format!("categories:{}", loader)]);
        }
        for category in self.categories.iter().filter(|c| !c.is_empty()) {
            groups.push(vec![format!("categories:{}", category)]);
        }

        groups
    }

    fn params(&self) -> Result<Vec<(&'static str, String)>> {
        let mut params = vec![
            ("query", self.query.clone()),
            ("facets", serde_json::to_string(&self.facets())?),
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(index) = self.index.as_deref().filter(|i| !i.is_empty()) {
            params.push(("index", index.to_string()));
        }
        Ok(params)
    }
}

/// Flags every hit whose slug or project id is in `installed`.
pub fn mark_installed(hits: &mut [ModrinthProject], installed: &HashSet<String>) {
    for hit in hits.iter_mut() {
        hit.installed = installed.contains(&hit.slug) || installed.contains(&hit.project_id);
    }
}

/// First version supporting both the game version and the loader. The API
/// returns versions newest first.
pub fn find_best_version<'a>(
    versions: &'a [ModrinthVersionResponse],
    minecraft_version: &str,
    loader: &str,
) -> Option<&'a ModrinthVersionResponse> {
    versions.iter().find(|version| {
        version.game_versions.iter().any(|v| v == minecraft_version)
            && version.loaders.iter().any(|l| l == loader)
    })
}

/// The game version to request for an install: the user's preference when
/// the version supports it, otherwise the first one it lists.
pub fn preferred_game_version(
    version: &ModrinthVersionResponse,
    preferred: Option<&str>,
) -> Option<String> {
    preferred
        .filter(|p| version.game_versions.iter().any(|v| v == p))
        .or_else(|| version.game_versions.first().map(String::as_str))
        .map(str::to_string)
}

#[derive(Clone)]
pub struct ModrinthClient {
    http: reqwest::Client,
    api_base: String,
    user_agent: String,
}

impl ModrinthClient {
    pub fn new(api_base: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<ModrinthSearchResult> {
        let url = format!("{}/search", self.api_base);
        log::debug!("Searching {} for {:?}", url, query.query);

        let response = self
            .http
            .get(&url)
            .query(&query.params()?)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .context("Failed to reach catalog search")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read search response")?;
        if !status.is_success() {
            return Err(anyhow!("Catalog search failed ({}): {}", status, body));
        }

        serde_json::from_str(&body).context("Failed to parse search response")
    }

    pub async fn project_versions(
        &self,
        project: &str,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> Result<Vec<ModrinthVersionResponse>> {
        let url = format!("{}/project/{}/version", self.api_base, project);
        log::debug!("Fetching versions from: {}", url);

        let mut params = Vec::new();
        if let Some(version) = game_version {
            params.push(("game_versions", serde_json::to_string(&[version])?));
        }
        if let Some(loader) = loader {
            params.push(("loaders", serde_json::to_string(&[loader])?));
        }

        let versions: Vec<ModrinthVersionResponse> = self
            .get(&url)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("Failed to fetch versions of {}", project))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Failed to parse versions of {}", project))?;

        log::info!("Found {} versions for {}", versions.len(), project);
        Ok(versions)
    }

    pub async fn version(&self, version_id: &str) -> Result<ModrinthVersionResponse> {
        let url = format!("{}/version/{}", self.api_base, version_id);
        self.get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch version {}", version_id))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Failed to parse version {}", version_id))
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", url))?
            .error_for_status()?
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(bytes.to_vec())
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
    }
}
