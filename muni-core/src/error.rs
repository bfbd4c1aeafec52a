use muni_schema::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("snapshot encoding: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("No refresh token available")]
    NoRefreshToken,
}

impl ApiError {
    /// Builds a 422 error from a response body. Understands both the
    /// `{message, errors}` envelope and the `{detail: [{loc, msg}]}` shape.
    pub fn from_validation_body(body: &Value) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut fields = Vec::new();
        for key in ["detail", "errors"] {
            let Some(entries) = body.get(key).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                let Some(msg) = entry.get("msg").and_then(Value::as_str) else {
                    continue;
                };
                let loc = entry
                    .get("loc")
                    .and_then(Value::as_array)
                    .map(|parts| {
                        parts
                            .iter()
                            .map(|p| match p {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                fields.push(FieldError {
                    loc,
                    msg: msg.to_string(),
                });
            }
        }

        ApiError::Validation { message, fields }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::NoRefreshToken)
    }

    /// Message fit for showing to a user. Field errors on `email` win, then
    /// the server's message, then `fallback`.
    pub fn user_message_or(&self, fallback: &str) -> String {
        match self {
            ApiError::Validation { message, fields } => {
                if let Some(email) = fields
                    .iter()
                    .find(|f| f.loc.iter().any(|part| part == "email"))
                {
                    return email.msg.clone();
                }
                if !message.is_empty() {
                    return message.clone();
                }
                fields
                    .first()
                    .map(|f| f.msg.clone())
                    .unwrap_or_else(|| fallback.to_string())
            }
            ApiError::Schema(SchemaError::InvalidField { reason, .. }) => reason.clone(),
            ApiError::Status { status: 403, .. } => "Site Error. Please refresh.".to_string(),
            ApiError::Status { body, .. } => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| fallback.to_string()),
            _ => fallback.to_string(),
        }
    }
}
