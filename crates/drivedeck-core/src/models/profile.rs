use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Photo {
    pub url: Option<String>,
}

impl Profile {
    pub fn picture_url(&self) -> Option<&str> {
        self.photos.first().and_then(|p| p.url.as_deref())
    }
}
