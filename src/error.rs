use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum GateError {
    // Configuration errors
    #[error("Missing required environment variable: {key}")]
    MissingEnv { key: &'static str },

    #[error("Invalid value for {key}: {message}")]
    InvalidEnv { key: &'static str, message: String },

    // Store errors
    #[error("Failed to load verified users from '{path}': {source}")]
    StoreLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse verified users file '{path}': {source}")]
    StoreParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to save verified users to '{path}': {source}")]
    StoreSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("User already recorded: {id}")]
    DuplicateKey { id: String },

    // Verification errors
    #[error("No authorization code received")]
    MissingCode,

    #[error("Token exchange failed: {message}")]
    Auth { message: String },

    #[error("Provisioning incomplete for user {user_id}")]
    ProvisioningIncomplete { user_id: String },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::MissingCode | GateError::Auth { .. } => StatusCode::BAD_REQUEST,
            GateError::Discord { .. } | GateError::ProvisioningIncomplete { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        GateError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<serenity::Error> for GateError {
    fn from(err: serenity::Error) -> Self {
        GateError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        GateError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::Internal {
            message: err.to_string(),
        }
    }
}

/// Client errors are answered in plain text; everything else is logged and
/// answered with a generic message so upstream details do not leak.
impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            GateError::MissingCode => "Error: no code received".to_string(),
            GateError::Auth { .. } => "Error: token error".to_string(),
            GateError::ProvisioningIncomplete { .. } => {
                "Error: could not finish setting up your server membership".to_string()
            }
            GateError::Discord { .. } => "Error: Discord request failed".to_string(),
            _ => "Internal server error".to_string(),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
