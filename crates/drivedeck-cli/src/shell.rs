//! Interactive shell.
//!
//! Reads commands from stdin while watching the auth state, so an expired
//! session is reported as soon as it happens rather than on the next command.

use anyhow::Result;
use clap::Parser;
use drivedeck_core::provider::AuthState;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::app::{user_message, App};
use crate::cli::{Command, ShellLine};

const PROMPT_SIGNED_IN: &str = "drive> ";
const PROMPT_SIGNED_OUT: &str = "drive (signed out)> ";

pub async fn run(app: &App) -> Result<()> {
    let mut auth = app.session().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type `help` for commands, `quit` to exit.");
    prompt(app).await?;

    loop {
        tokio::select! {
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = auth.borrow_and_update().clone();
                debug!(?state, "Auth state changed");
                if state == AuthState::Expired {
                    println!("\nSession expired. Please log in again.");
                    prompt(app).await?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let words = split_words(&line);
                match words.first().map(String::as_str) {
                    None => {}
                    Some("quit") | Some("exit") => break,
                    Some(_) => execute(app, &words).await,
                }
                prompt(app).await?;
            }
        }
    }

    Ok(())
}

async fn execute(app: &App, words: &[String]) {
    let command = match ShellLine::try_parse_from(words) {
        Ok(line) => line.command,
        Err(e) => {
            // Help output is delivered through the error path as well
            let _ = e.print();
            return;
        }
    };

    if let Command::Shell = command {
        return;
    }
    if let Err(e) = app.run(command).await {
        println!("{}", user_message(&e));
    }
}

async fn prompt(app: &App) -> Result<()> {
    let text = if app.is_signed_in() {
        PROMPT_SIGNED_IN
    } else {
        PROMPT_SIGNED_OUT
    };
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Split a line on whitespace, keeping double-quoted text together
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_plain() {
        assert_eq!(split_words("  ls   abc "), vec!["ls", "abc"]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_split_words_quoted() {
        assert_eq!(
            split_words(r#"mkdir "Tax Returns 2024" --parent root"#),
            vec!["mkdir", "Tax Returns 2024", "--parent", "root"]
        );
        assert_eq!(split_words(r#"search """#), vec!["search", ""]);
    }

    #[test]
    fn test_split_words_feed_shell_parser() {
        let words = split_words(r#"search "budget q3""#);
        let line = ShellLine::try_parse_from(&words).unwrap();
        assert!(matches!(line.command, Command::Search { query } if query == "budget q3"));
    }
}
