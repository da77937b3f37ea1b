use detecra_auth::BackendError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

/// PostgREST: `.single()` matched zero rows.
const NO_ROWS: &str = "PGRST116";
/// Postgres: unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Which API produced an error response. Only the auth API reports user-facing errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Api {
    Auth,
    Rest,
}

/// Union of the error bodies GoTrue and PostgREST send back.
#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => self.error_code.clone(),
        }
    }

    fn message(self) -> Option<String> {
        self.msg.or(self.error_description).or(self.message).or(self.error)
    }
}

pub(crate) fn error_from_response(api: Api, status: StatusCode, body: &str) -> BackendError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    match parsed.code().as_deref() {
        Some(NO_ROWS) => return BackendError::NotFound,
        Some(UNIQUE_VIOLATION) => return BackendError::Conflict,
        _ => {}
    }

    let message = parsed.message().unwrap_or_else(|| body.trim().to_owned());
    if api == Api::Auth && status.is_client_error() {
        BackendError::Auth { message, status: Some(status.as_u16()) }
    } else {
        BackendError::Anyhow(anyhow::anyhow!("{status}: {message}"))
    }
}

pub(crate) async fn check(api: Api, response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.map_err(anyhow::Error::from)?;
    Err(error_from_response(api, status, &body))
}
