use serde::Deserialize;

/// The subset of a Google API discovery document needed to address the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDocument {
    pub name: String,
    pub version: String,
    pub root_url: String,
    #[serde(default)]
    pub service_path: String,
}

impl DiscoveryDocument {
    /// Base URL that request paths are joined onto; always ends in `/`
    pub fn base_url(&self) -> String {
        let mut base = format!("{}{}", self.root_url, self.service_path);
        if !base.ends_with('/') {
            base.push('/');
        }
        base
    }

    /// Base URL for media uploads, e.g. `https://www.googleapis.com/upload/drive/v3/`
    pub fn upload_url(&self) -> String {
        let mut base = format!("{}upload/{}", self.root_url, self.service_path);
        if !base.ends_with('/') {
            base.push('/');
        }
        base
    }
}
