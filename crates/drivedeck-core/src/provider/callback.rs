//! Loopback HTTP listener that receives the OAuth redirect.
//!
//! Only the request head is read. Requests without OAuth parameters (a
//! browser asking for `/favicon.ico`, say) get a 404 and are otherwise
//! ignored; the listener keeps waiting until a real callback arrives.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};
use url::Url;

use super::AuthError;

/// Upper bound on the request head we are willing to buffer
const MAX_REQUEST_HEAD_BYTES: usize = 8 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h3>Signed in to drivedeck.</h3>\
<p>You can close this window.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h3>Sign-in did not complete.</h3>\
<p>Return to drivedeck and try again.</p></body></html>";

const NOT_FOUND_PAGE: &str = "<html><body>Not found</body></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackParams {
    Code { code: String, state: String },
    Error { error: String, state: String },
}

impl CallbackParams {
    fn state(&self) -> &str {
        match self {
            CallbackParams::Code { state, .. } | CallbackParams::Error { state, .. } => state,
        }
    }
}

/// Extract the request target from an HTTP/1.x request head
fn request_target(head: &str) -> Option<&str> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    (method == "GET").then_some(target)
}

/// Parse the OAuth parameters out of a callback request target
pub fn parse_callback(target: &str) -> Option<CallbackParams> {
    let url = Url::parse("http://127.0.0.1").ok()?.join(target).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    let state = state.unwrap_or_default();
    match (code, error) {
        (_, Some(error)) => Some(CallbackParams::Error { error, state }),
        (Some(code), None) => Some(CallbackParams::Code { code, state }),
        (None, None) => None,
    }
}

pub struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackServer {
    /// Listen on an ephemeral loopback port
    pub async fn bind() -> Result<Self, AuthError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        debug!(%addr, "OAuth callback listener bound");
        Ok(Self { listener, addr })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the provider to redirect back with an authorization code.
    ///
    /// Never resolves if the user abandons the flow.
    pub async fn wait_for_code(&self, expected_state: &str) -> Result<String, AuthError> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            let head = match read_head(&mut stream).await {
                Ok(head) => head,
                Err(e) => {
                    warn!(%peer, error = %e, "Failed to read OAuth callback request");
                    continue;
                }
            };

            let params = request_target(&head).and_then(parse_callback);
            let (status, page, outcome) = match params {
                None => ("404 Not Found", NOT_FOUND_PAGE, None),
                Some(ref p) if p.state() != expected_state => {
                    ("400 Bad Request", FAILURE_PAGE, Some(Err(AuthError::StateMismatch)))
                }
                Some(CallbackParams::Code { code, .. }) => ("200 OK", SUCCESS_PAGE, Some(Ok(code))),
                Some(CallbackParams::Error { error, .. }) => {
                    ("200 OK", FAILURE_PAGE, Some(Err(AuthError::Denied(error))))
                }
            };

            if let Err(e) = respond(&mut stream, status, page).await {
                debug!(%peer, error = %e, "Failed to answer OAuth callback request");
            }

            match outcome {
                Some(Err(AuthError::StateMismatch)) => {
                    warn!(%peer, "OAuth callback with unexpected state");
                }
                Some(result) => return result,
                None => debug!(%peer, "Ignoring request without OAuth parameters"),
            }
        }
    }
}

async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_HEAD_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn respond(stream: &mut TcpStream, status: &str, page: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        page.len(),
        page
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
