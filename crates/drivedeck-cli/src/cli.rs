//! Command-line arguments. The same `Command` set is accepted by the shell.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use drivedeck_core::StorageBackend;

#[derive(Debug, Parser)]
#[command(name = "drivedeck", version, about = "A command-line file manager for Google Drive")]
pub struct Cli {
    /// Where to keep the signed-in session (file, keyring, memory)
    #[arg(long, global = true)]
    pub storage: Option<StorageBackend>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One line typed into the interactive shell
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in with your Google account
    Login,
    /// Sign out and revoke the access token
    Logout,
    /// Show whether you are signed in
    Status,
    /// Show storage usage
    Quota,
    /// List a folder (default: My Drive)
    Ls {
        folder_id: Option<String>,
    },
    /// Show recently modified files
    Recent {
        /// Show recent folders instead of files
        #[arg(long)]
        folders: bool,
    },
    /// Find files by name
    Search {
        query: String,
    },
    /// Create a folder
    Mkdir {
        name: String,
        /// Parent folder id (default: My Drive)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Upload local files
    Put {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Parent folder id (default: My Drive)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Upload the files of a local directory into a new folder
    Upload {
        dir: PathBuf,
        /// Folder name on Drive (default: the directory's name)
        #[arg(long)]
        name: Option<String>,
        /// Parent folder id (default: My Drive)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete a file or folder
    Rm {
        file_id: String,
    },
    /// Print a file's download link
    Link {
        file_id: String,
    },
    /// Show your profile picture URL
    Whoami,
    /// Interactive shell (default)
    Shell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_storage_flag() {
        let cli = Cli::try_parse_from(["drivedeck", "--storage", "keyring", "status"]).unwrap();
        assert_eq!(cli.storage, Some(StorageBackend::Keyring));
        assert!(matches!(cli.command, Some(Command::Status)));
    }

    #[test]
    fn test_no_subcommand_means_shell() {
        let cli = Cli::try_parse_from(["drivedeck"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_shell_line_parses_without_binary_name() {
        let line = ShellLine::try_parse_from(["mkdir", "Reports 2024", "--parent", "abc"]).unwrap();
        match line.command {
            Command::Mkdir { name, parent } => {
                assert_eq!(name, "Reports 2024");
                assert_eq!(parent.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(ShellLine::try_parse_from(["frobnicate"]).is_err());
    }

    #[test]
    fn test_put_takes_many_paths() {
        let cli = Cli::try_parse_from(["drivedeck", "put", "a.txt", "b.pdf", "--parent", "p1"]).unwrap();
        match cli.command {
            Some(Command::Put { paths, parent }) => {
                assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("b.pdf")]);
                assert_eq!(parent.as_deref(), Some("p1"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["drivedeck", "put"]).is_err());
    }
}
