//! Wire types for the Discord OAuth and user endpoints

use serde::Deserialize;
use serenity::model::id::UserId;

use crate::error::{GateError, Result};

/// Discord OAuth token response
///
/// Every field is optional: a rejected code comes back as `{"error": ...}`
/// and occasionally as an empty object.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// The access token, or the reason there is none
    pub fn into_access_token(self) -> Result<String> {
        match self.access_token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token),
            None => Err(GateError::Auth {
                message: self
                    .error_description
                    .or(self.error)
                    .unwrap_or_else(|| "response carried no access_token".to_string()),
            }),
        }
    }
}

/// Discord user info from /users/@me
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordProfile {
    pub id: String,
    pub username: String,
    /// Legacy four digit tag, "0" for migrated accounts
    #[serde(default)]
    pub discriminator: String,
}

impl DiscordProfile {
    /// Legacy `username#discriminator` identity
    pub fn display_name(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }

    pub fn user_id(&self) -> Result<UserId> {
        match self.id.parse::<u64>() {
            Ok(id) if id != 0 => Ok(UserId::new(id)),
            _ => Err(GateError::Discord {
                message: format!("profile carried an invalid user id '{}'", self.id),
            }),
        }
    }
}

/// Result of adding a member to the guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// 201: the user was added
    Added,
    /// 204: the user was already a member
    AlreadyMember,
}
