//! Data models for Google Drive entities.
//!
//! - `DriveFile`, `Owner`, `FileKind`: files and folders as listed by Drive
//! - `FileList`, `Folder`: list responses and a folder with its children
//! - `StorageQuota`: account storage usage
//! - `Profile`: the signed-in user's People API record

pub mod file;
pub mod profile;

pub use file::{DriveFile, FileKind, FileList, Folder, Owner, StorageQuota, FOLDER_MIME_TYPE};
pub use profile::{Photo, Profile};
