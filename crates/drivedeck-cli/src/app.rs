//! Application state and command execution.
//!
//! `App` owns the `ProviderSession` for the lifetime of the process: it is
//! created at startup, restored from storage, bootstrapped in the
//! background, and shut down on exit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use drivedeck_core::api::{ApiClient, ApiError};
use drivedeck_core::auth::{private_route, public_route, GuardDecision, SessionStore};
use drivedeck_core::models::DriveFile;
use drivedeck_core::provider::{LoginOutcome, ProviderSession};
use drivedeck_core::{Clock, Config, ProviderConfig, SystemClock, Url};
use tracing::{debug, warn};

use crate::cli::Command;
use crate::format::{format_bytes, format_date, truncate};

/// Width of the name column in file listings
const NAME_COLUMN_WIDTH: usize = 40;

/// Width of the owner column in file listings
const OWNER_COLUMN_WIDTH: usize = 20;

fn present_authorize_url(url: &Url) {
    println!("Open this link in your browser to sign in:\n\n  {}\n", url);
}

pub struct App {
    config: Config,
    session: ProviderSession,
    /// Why the provider could not be bootstrapped, if it could not
    provider_error: Option<String>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let storage = config.session_storage()?;
        let store = SessionStore::new(storage, Arc::new(SystemClock));
        Ok(Self {
            config,
            session: ProviderSession::new(store),
            provider_error: None,
        })
    }

    pub fn session(&self) -> &ProviderSession {
        &self.session
    }

    /// Restore any persisted session and start provider initialization
    pub fn start(&mut self) {
        if let Some(session) = self.session.restore() {
            debug!(expires_at = %session.expires_at, "Resuming saved session");
        }

        match ProviderConfig::from_env(&self.config) {
            Ok(provider) => {
                self.session
                    .bootstrap(&provider, Arc::new(present_authorize_url));
            }
            Err(e) => {
                warn!(error = %e, "Provider credentials missing");
                self.provider_error = Some(e.to_string());
            }
        }
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    async fn ensure_ready(&self) -> Result<()> {
        if let Some(ref reason) = self.provider_error {
            bail!("Google APIs are not configured: {}", reason);
        }
        let timeout = Duration::from_secs(self.config.ready_timeout_secs);
        tokio::time::timeout(timeout, self.session.wait_ready())
            .await
            .map_err(|_| anyhow!("Timed out waiting for Google APIs to initialize"))
    }

    /// The API client, for commands that need a signed-in user
    async fn signed_in_api(&self) -> Result<&ApiClient> {
        if private_route(self.session.store()) != GuardDecision::Proceed {
            bail!("Not signed in. Run `login` first.");
        }
        self.ensure_ready().await?;
        self.session
            .api()
            .ok_or_else(|| anyhow!("API client is not initialized"))
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Login => self.login().await,
            Command::Logout => {
                self.logout().await;
                Ok(())
            }
            Command::Status => {
                self.status();
                Ok(())
            }
            Command::Quota => {
                let quota = self.signed_in_api().await?.storage_quota().await?;
                println!(
                    "{} of {} used ({:.1}%)",
                    format_bytes(quota.used),
                    format_bytes(quota.total),
                    quota.percent_used()
                );
                Ok(())
            }
            Command::Ls { folder_id } => {
                let api = self.signed_in_api().await?;
                match folder_id {
                    Some(id) => {
                        let folder = api.folder(&id).await?;
                        println!("{}", folder.name);
                        print_files(&folder.files);
                    }
                    None => {
                        println!("My Drive");
                        print_files(&api.root_files().await?);
                    }
                }
                Ok(())
            }
            Command::Recent { folders } => {
                let api = self.signed_in_api().await?;
                let files = if folders {
                    api.recent_folders().await?
                } else {
                    api.recent_files().await?
                };
                print_files(&files);
                Ok(())
            }
            Command::Search { query } => {
                let files = self.signed_in_api().await?.search(&query).await?;
                if files.is_empty() {
                    println!("No files match '{}'", query);
                } else {
                    print_files(&files);
                }
                Ok(())
            }
            Command::Mkdir { name, parent } => {
                let id = self
                    .signed_in_api()
                    .await?
                    .create_folder(&name, parent.as_deref())
                    .await?;
                println!("Created folder '{}' ({})", name, id);
                Ok(())
            }
            Command::Put { paths, parent } => {
                let ids = self
                    .signed_in_api()
                    .await?
                    .upload_files(&paths, parent.as_deref())
                    .await?;
                println!("Uploaded {} file(s)", ids.len());
                Ok(())
            }
            Command::Upload { dir, name, parent } => {
                let api = self.signed_in_api().await?;
                let name = match name {
                    Some(name) => name,
                    None => dir_name(&dir)?,
                };
                let paths = files_in(&dir).await?;
                let id = api.upload_folder(&name, &paths, parent.as_deref()).await?;
                println!("Uploaded {} file(s) to '{}' ({})", paths.len(), name, id);
                Ok(())
            }
            Command::Rm { file_id } => {
                self.signed_in_api().await?.delete_file(&file_id).await?;
                println!("Deleted {}", file_id);
                Ok(())
            }
            Command::Link { file_id } => {
                match self.signed_in_api().await?.download_link(&file_id).await? {
                    Some(link) => println!("{}", link),
                    None => println!("No download link available for {}", file_id),
                }
                Ok(())
            }
            Command::Whoami => {
                match self.signed_in_api().await?.profile_picture().await? {
                    Some(url) => println!("Profile picture: {}", url),
                    None => println!("No profile picture set"),
                }
                Ok(())
            }
            Command::Shell => {
                println!("Already in the shell.");
                Ok(())
            }
        }
    }

    async fn login(&self) -> Result<()> {
        if public_route(self.session.store()) != GuardDecision::Proceed {
            self.status();
            return Ok(());
        }
        self.ensure_ready().await?;

        let timeout = Duration::from_secs(self.config.login_timeout_secs);
        let outcome = tokio::time::timeout(timeout, self.session.login())
            .await
            .map_err(|_| anyhow!("Sign-in was not completed in time"))??;

        match outcome {
            LoginOutcome::SignedIn(session) => {
                println!(
                    "Signed in. Session expires in {} minutes.",
                    session.minutes_until_expiry(self.session.store().clock().now())
                );
            }
            LoginOutcome::NotReady => {
                println!("Google APIs are still loading. Try again in a moment.")
            }
        }
        Ok(())
    }

    async fn logout(&self) {
        // Revocation needs the provider; local sign-out does not
        if self.provider_error.is_none() {
            if let Err(e) = self.ensure_ready().await {
                warn!(error = %e, "Signing out without revoking the token");
            }
        }
        self.session.logout().await;
        println!("Signed out.");
    }

    pub fn status(&self) {
        let store = self.session.store();
        match store.current() {
            Some(session) => println!(
                "Signed in. Session expires at {} ({} minutes left).",
                format_date(Some(session.expires_at)),
                session.minutes_until_expiry(store.clock().now())
            ),
            None => println!("Signed out."),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.store().is_valid()
    }
}

/// Simplify common error messages for the user
pub fn user_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(e) if e.needs_sign_in() => "Session expired. Please log in again.".to_string(),
        Some(ApiError::RateLimited) => "Server is busy. Please wait a moment and try again.".to_string(),
        Some(ApiError::NetworkError(_)) => "Network error. Check your connection.".to_string(),
        _ => format!("Error: {:#}", err),
    }
}

fn dir_name(dir: &Path) -> Result<String> {
    let absolute = std::path::absolute(dir)
        .with_context(|| format!("Could not resolve {}", dir.display()))?;
    absolute
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} has no name to use for the folder; pass --name", dir.display()))
}

/// Regular files directly inside `dir`, sorted by name
async fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Could not read directory {}", dir.display()))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn print_files(files: &[DriveFile]) {
    if files.is_empty() {
        println!("  (empty)");
        return;
    }
    for file in files {
        let size = file
            .size_bytes()
            .map(format_bytes)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<6} {:<name_w$} {:<owner_w$} {:<24} {:>10}  {}",
            file.kind().label(),
            truncate(file.display_name(), NAME_COLUMN_WIDTH),
            truncate(file.owner_name().unwrap_or("-"), OWNER_COLUMN_WIDTH),
            format_date(file.modified_time),
            size,
            file.id.as_deref().unwrap_or_default(),
            name_w = NAME_COLUMN_WIDTH,
            owner_w = OWNER_COLUMN_WIDTH,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_files_in_lists_only_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let paths = files_in(dir.path()).await.unwrap();
        assert_eq!(paths, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);
    }

    #[test]
    fn test_dir_name_defaults_folder_name() {
        let dir = tempfile::tempdir().unwrap();
        let photos = dir.path().join("Holiday Photos");
        assert_eq!(dir_name(&photos).unwrap(), "Holiday Photos");
    }

    #[test]
    fn test_user_message_simplifies_api_errors() {
        let err = anyhow::Error::from(ApiError::Unauthorized);
        assert_eq!(user_message(&err), "Session expired. Please log in again.");

        let err = anyhow::Error::from(ApiError::RateLimited);
        assert!(user_message(&err).starts_with("Server is busy"));

        let err = anyhow!("Not signed in. Run `login` first.");
        assert_eq!(user_message(&err), "Error: Not signed in. Run `login` first.");
    }
}
