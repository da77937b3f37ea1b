use std::time::{Duration, Instant};

use tiny_http::{Header, Response, Server};
use tracing::debug;
use url::Url;

const SIGNED_IN_PAGE: &str =
    "<html><body><h3>Signed in to Detecra AI.</h3><p>You can close this window and return to the terminal.</p></body></html>";

/// What an incoming request to the callback listener carried.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CallbackOutcome {
    Code(String),
    Denied(String),
    Ignored,
}

/// Local HTTP listener on the site origin that receives the provider redirect.
pub(crate) struct CallbackListener {
    server: Server,
    origin: Url,
}

impl CallbackListener {
    pub fn bind(origin: &Url) -> anyhow::Result<Self> {
        let host = origin.host_str().ok_or_else(|| anyhow::anyhow!("site origin {origin} has no host"))?;
        let port = origin.port_or_known_default().ok_or_else(|| anyhow::anyhow!("site origin {origin} has no port"))?;

        let server = Server::http((host, port))
            .map_err(|e| anyhow::anyhow!("failed to listen for the sign in callback on {host}:{port}: {e}"))?;
        debug!("listening for the sign in callback on {}:{}.", host, port);

        Ok(Self { server, origin: origin.clone() })
    }

    /// Blocks until a request carrying an authorization code or a provider error arrives.
    pub fn wait_for_code(&self, wait: Duration) -> anyhow::Result<String> {
        let deadline = Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(anyhow::anyhow!("Timed out waiting for the sign in to complete in the browser"));
            }

            let Some(request) = self.server.recv_timeout(remaining)? else {
                continue;
            };

            match parse_callback(&self.origin, request.url()) {
                CallbackOutcome::Code(code) => {
                    let mut response = Response::from_string(SIGNED_IN_PAGE);
                    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
                        response = response.with_header(header);
                    }
                    request.respond(response)?;
                    return Ok(code);
                }
                CallbackOutcome::Denied(reason) => {
                    request.respond(Response::from_string(format!("Sign in failed: {reason}")).with_status_code(400))?;
                    return Err(anyhow::anyhow!("Sign in failed: {reason}"));
                }
                CallbackOutcome::Ignored => {
                    request.respond(Response::empty(404))?;
                }
            }
        }
    }
}

pub(crate) fn parse_callback(origin: &Url, request_url: &str) -> CallbackOutcome {
    let Ok(url) = origin.join(request_url) else {
        return CallbackOutcome::Ignored;
    };

    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    match (code, error) {
        (Some(code), _) if !code.is_empty() => CallbackOutcome::Code(code),
        (_, Some(error)) => CallbackOutcome::Denied(description.unwrap_or(error)),
        _ => CallbackOutcome::Ignored,
    }
}
