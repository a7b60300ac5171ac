use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub modified_time: Option<DateTime<Utc>>,
    /// Drive reports sizes as decimal strings
    pub size: Option<String>,
    #[serde(default)]
    pub owners: Vec<Owner>,
    pub web_content_link: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mime_type(self.mime_type.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(untitled)")
    }

    /// Display name of the first owner, if Drive returned one
    pub fn owner_name(&self) -> Option<&str> {
        self.owners.first().and_then(|o| o.display_name.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub display_name: Option<String>,
    pub email_address: Option<String>,
    pub photo_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Folder,
    Pdf,
    Document,
    Presentation,
    Spreadsheet,
    Other,
}

impl FileKind {
    pub fn from_mime_type(mime_type: Option<&str>) -> Self {
        match mime_type {
            Some(FOLDER_MIME_TYPE) => FileKind::Folder,
            Some("application/pdf") => FileKind::Pdf,
            Some(
                "application/vnd.google-apps.document"
                | "application/msword"
                | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                | "application/vnd.openxmlformats-officedocument.wordprocessingml.template",
            ) => FileKind::Document,
            Some(
                "application/vnd.google-apps.presentation"
                | "application/vnd.ms-powerpoint"
                | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
                | "application/vnd.openxmlformats-officedocument.presentationml.template"
                | "application/vnd.openxmlformats-officedocument.presentationml.slideshow",
            ) => FileKind::Presentation,
            Some(
                "application/vnd.google-apps.spreadsheet"
                | "application/vnd.ms-excel"
                | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "application/vnd.openxmlformats-officedocument.spreadsheetml.template",
            ) => FileKind::Spreadsheet,
            _ => FileKind::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Folder => "folder",
            FileKind::Pdf => "pdf",
            FileKind::Document => "doc",
            FileKind::Presentation => "slides",
            FileKind::Spreadsheet => "sheet",
            FileKind::Other => "file",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

#[derive(Debug, Clone, Default)]
pub struct Folder {
    pub name: String,
    pub files: Vec<DriveFile>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageQuota {
    pub total: u64,
    pub used: u64,
}

impl StorageQuota {
    /// Percentage of the quota in use; 0 when the account reports no limit
    pub fn percent_used(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used as f64 * 100.0 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_list() {
        let json = r#"{"files": [
            {"id": "1", "name": "Report.pdf", "mimeType": "application/pdf", "size": "2048",
             "modifiedTime": "2024-03-01T10:30:00.000Z",
             "owners": [{"displayName": "Ada Lovelace", "emailAddress": "ada@example.com"}]},
            {"id": "2", "name": "Projects", "mimeType": "application/vnd.google-apps.folder"}
        ]}"#;

        let list: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(list.files.len(), 2);

        let report = &list.files[0];
        assert_eq!(report.kind(), FileKind::Pdf);
        assert_eq!(report.size_bytes(), Some(2048));
        assert_eq!(report.owner_name(), Some("Ada Lovelace"));
        assert!(report.modified_time.is_some());

        let folder = &list.files[1];
        assert!(folder.is_folder());
        assert_eq!(folder.size_bytes(), None);
        assert!(folder.owners.is_empty());
    }

    #[test]
    fn test_empty_file_list() {
        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
    }

    #[test]
    fn test_file_kind_from_mime_type() {
        assert_eq!(
            FileKind::from_mime_type(Some("application/vnd.google-apps.spreadsheet")),
            FileKind::Spreadsheet
        );
        assert_eq!(
            FileKind::from_mime_type(Some("application/vnd.ms-powerpoint")),
            FileKind::Presentation
        );
        assert_eq!(FileKind::from_mime_type(Some("application/msword")), FileKind::Document);
        assert_eq!(FileKind::from_mime_type(Some("image/png")), FileKind::Other);
        assert_eq!(FileKind::from_mime_type(None), FileKind::Other);
    }

    #[test]
    fn test_percent_used() {
        let quota = StorageQuota { total: 200, used: 50 };
        assert_eq!(quota.percent_used(), 25.0);
        assert_eq!(StorageQuota::default().percent_used(), 0.0);
    }
}
