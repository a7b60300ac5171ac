//! API client for the Google Drive and People REST APIs.
//!
//! The client is cheap to clone; clones share the connection pool and the
//! in-memory access token.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info, warn};
use url::Url;

use super::discovery::DiscoveryDocument;
use super::ApiError;
use crate::models::{DriveFile, FileList, Folder, Profile, StorageQuota, FOLDER_MIME_TYPE};

// ============================================================================
// Constants
// ============================================================================

/// Drive base URL used until a discovery document says otherwise
const DEFAULT_DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3/";

/// Drive media upload base URL used until a discovery document says otherwise
const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/";

/// People base URL used until a discovery document says otherwise
const DEFAULT_PEOPLE_BASE_URL: &str = "https://people.googleapis.com/";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fields requested for file listings
const FILE_FIELDS: &str = "files(id, name, owners, modifiedTime, size, mimeType)";

/// Fields requested for folder listings
const FOLDER_FIELDS: &str = "files(id, name, owners, modifiedTime)";

const RECENT_FOLDERS_PAGE_SIZE: &str = "4";
const RECENT_FILES_PAGE_SIZE: &str = "10";

const ORDER_BY_MODIFIED: &str = "modifiedTime desc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub drive: String,
    pub upload: String,
    pub people: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            drive: DEFAULT_DRIVE_BASE_URL.to_string(),
            upload: DEFAULT_DRIVE_UPLOAD_URL.to_string(),
            people: DEFAULT_PEOPLE_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point the matching API at the document's base URL. Unknown APIs are ignored.
    fn apply(&mut self, doc: &DiscoveryDocument) {
        match doc.name.as_str() {
            "drive" => {
                self.drive = doc.base_url();
                self.upload = doc.upload_url();
            }
            "people" => self.people = doc.base_url(),
            other => debug!(api = other, version = %doc.version, "Ignoring discovery document"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutResponse {
    storage_quota: Option<StorageQuotaResponse>,
}

#[derive(Debug, Deserialize)]
struct StorageQuotaResponse {
    limit: Option<String>,
    usage: Option<String>,
}

impl From<Option<StorageQuotaResponse>> for StorageQuota {
    fn from(quota: Option<StorageQuotaResponse>) -> Self {
        let parse = |v: Option<String>| v.and_then(|s| s.parse().ok()).unwrap_or(0);
        match quota {
            Some(q) => StorageQuota {
                total: parse(q.limit),
                used: parse(q.usage),
            },
            None => StorageQuota::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: Option<String>,
}

/// Quote a value for use inside a Drive `q` expression
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_key: Option<String>,
    endpoints: Endpoints,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a client with the default endpoints and no token
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key: None,
            endpoints: Endpoints::default(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Create a client and resolve its endpoints from the given discovery documents
    pub async fn load(api_key: &str, discovery_docs: &[String]) -> Result<Self, ApiError> {
        let mut client = Self::new()?.with_api_key(api_key);

        let docs = try_join_all(discovery_docs.iter().map(|url| client.fetch_discovery(url))).await?;
        for doc in &docs {
            client.endpoints.apply(doc);
        }

        info!(apis = docs.len(), "API client initialized");
        Ok(client)
    }

    async fn fetch_discovery(&self, url: &str) -> Result<DiscoveryDocument, ApiError> {
        let mut url = Url::parse(url)?;
        if let Some(ref key) = self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        debug!(host = url.host_str().unwrap_or_default(), path = url.path(), "Fetching discovery document");

        let response = self.client.get(url).send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // ===== In-memory token =====

    /// The access token currently attached to requests
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Remove and return the current token
    pub fn take_token(&self) -> Option<String> {
        self.token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // ===== Request plumbing =====

    fn url(&self, base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = Url::parse(base)?.join(path)?;
        if !query.is_empty() || self.api_key.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
            if let Some(ref key) = self.api_key {
                pairs.append_pair("key", key);
            }
        }
        Ok(url)
    }

    fn drive_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        self.url(&self.endpoints.drive, path, query)
    }

    /// `files/<id>` with the id kept as a single path segment
    fn file_url(&self, file_id: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        if matches!(file_id.trim(), "" | "." | "..") {
            return Err(ApiError::InvalidFileId(file_id.to_string()));
        }
        let mut url = self.drive_url("files", query)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidFileId(file_id.to_string()))?
            .push(file_id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, ApiError> {
        let token = self.token().ok_or(ApiError::NotSignedIn)?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!(path = url.path(), "GET");
        let response = self.request(Method::GET, url)?.send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn created_id(response: Response) -> Result<String, ApiError> {
        let response = Self::check_response(response).await?;
        let created: CreatedFile = response.json().await?;
        created
            .id
            .ok_or_else(|| ApiError::InvalidResponse("created file has no id".to_string()))
    }

    async fn list(&self, query: &[(&str, &str)]) -> Result<Vec<DriveFile>, ApiError> {
        let list: FileList = self.get(self.drive_url("files", query)?).await?;
        Ok(list.files)
    }

    // ===== Drive =====

    /// Total and used bytes of the account's storage quota
    pub async fn storage_quota(&self) -> Result<StorageQuota, ApiError> {
        let about: AboutResponse = self
            .get(self.drive_url("about", &[("fields", "storageQuota")])?)
            .await?;
        Ok(about.storage_quota.into())
    }

    /// Most recently modified folders
    pub async fn recent_folders(&self) -> Result<Vec<DriveFile>, ApiError> {
        let q = format!("mimeType = {}", quote(FOLDER_MIME_TYPE));
        self.list(&[
            ("q", q.as_str()),
            ("orderBy", ORDER_BY_MODIFIED),
            ("fields", FOLDER_FIELDS),
            ("pageSize", RECENT_FOLDERS_PAGE_SIZE),
        ])
        .await
    }

    /// Most recently modified files, folders excluded
    pub async fn recent_files(&self) -> Result<Vec<DriveFile>, ApiError> {
        let q = format!("mimeType != {}", quote(FOLDER_MIME_TYPE));
        self.list(&[
            ("q", q.as_str()),
            ("orderBy", ORDER_BY_MODIFIED),
            ("fields", FILE_FIELDS),
            ("pageSize", RECENT_FILES_PAGE_SIZE),
        ])
        .await
    }

    /// Everything directly under "My Drive"
    pub async fn root_files(&self) -> Result<Vec<DriveFile>, ApiError> {
        self.children("root").await
    }

    async fn children(&self, folder_id: &str) -> Result<Vec<DriveFile>, ApiError> {
        let q = format!("{} in parents", quote(folder_id));
        self.list(&[
            ("q", q.as_str()),
            ("orderBy", ORDER_BY_MODIFIED),
            ("fields", FILE_FIELDS),
        ])
        .await
    }

    /// A folder's name together with its children
    pub async fn folder(&self, folder_id: &str) -> Result<Folder, ApiError> {
        let meta: DriveFile = self
            .get(self.file_url(folder_id, &[("fields", "name")])?)
            .await?;
        let files = self.children(folder_id).await?;
        Ok(Folder {
            name: meta.name.unwrap_or_default(),
            files,
        })
    }

    /// Files whose name contains `query`. An empty query matches nothing.
    pub async fn search(&self, query: &str) -> Result<Vec<DriveFile>, ApiError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let q = format!("name contains {}", quote(query));
        self.list(&[("q", q.as_str()), ("fields", FILE_FIELDS)]).await
    }

    /// Create a folder, under `parent_id` or at the root. Returns the new folder's id.
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String, ApiError> {
        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": parent_id.map(|p| vec![p]).unwrap_or_default(),
        });
        let url = self.drive_url("files", &[("fields", "id")])?;
        let response = self.request(Method::POST, url)?.json(&body).send().await?;
        Self::created_id(response).await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let url = self.file_url(file_id, &[])?;
        let response = self.request(Method::DELETE, url)?.send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Direct download link; Drive omits it for Google Docs formats and folders
    pub async fn download_link(&self, file_id: &str) -> Result<Option<String>, ApiError> {
        let file: DriveFile = self
            .get(self.file_url(file_id, &[("fields", "webContentLink")])?)
            .await?;
        Ok(file.web_content_link)
    }

    /// Upload local files under `parent_id`, or at the root.
    ///
    /// All uploads run concurrently and each one is attempted; if any failed,
    /// the first error is returned once they have all finished. Returns the
    /// new file ids in input order.
    pub async fn upload_files(&self, paths: &[PathBuf], parent_id: Option<&str>) -> Result<Vec<String>, ApiError> {
        let results = join_all(paths.iter().map(|path| self.upload_file(path, parent_id))).await;

        let mut ids = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Upload failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(ids),
        }
    }

    /// Create a folder and upload the files into it. Returns the folder's id.
    pub async fn upload_folder(
        &self,
        name: &str,
        paths: &[PathBuf],
        parent_id: Option<&str>,
    ) -> Result<String, ApiError> {
        let folder_id = self.create_folder(name, parent_id).await?;
        self.upload_files(paths, Some(&folder_id)).await?;
        Ok(folder_id)
    }

    async fn upload_file(&self, path: &Path, parent_id: Option<&str>) -> Result<String, ApiError> {
        let local_error = |source: io::Error| ApiError::LocalFile {
            path: path.display().to_string(),
            source,
        };
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| local_error(io::Error::new(io::ErrorKind::InvalidInput, "not a file name")))?;
        let contents = tokio::fs::read(path).await.map_err(local_error)?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": parent_id.map(|p| vec![p]).unwrap_or_default(),
        });
        debug!(file = %name, bytes = contents.len(), "Uploading");
        let form = Form::new()
            .part("metadata", Part::text(metadata.to_string()).mime_str("application/json")?)
            .part(
                "file",
                Part::bytes(contents)
                    .file_name(name)
                    .mime_str("application/octet-stream")?,
            );

        let url = self.url(
            &self.endpoints.upload,
            "files",
            &[("uploadType", "multipart"), ("fields", "id")],
        )?;
        let response = self.request(Method::POST, url)?.multipart(form).send().await?;
        Self::created_id(response).await
    }

    // ===== People =====

    pub async fn profile(&self) -> Result<Profile, ApiError> {
        let url = self.url(&self.endpoints.people, "v1/people/me", &[("personFields", "photos")])?;
        self.get(url).await
    }

    pub async fn profile_picture(&self) -> Result<Option<String>, ApiError> {
        Ok(self.profile().await?.picture_url().map(str::to_string))
    }
}
