//! Production Discord client
//!
//! OAuth calls and the guild join are made with `reqwest` (they need the
//! user's access token); role and message calls go through serenity's bot
//! HTTP client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};
use std::sync::Arc;
use tracing::debug;

use super::message::ChannelMessage;
use super::types::{DiscordProfile, JoinOutcome, TokenResponse};
use crate::config::{Config, DISCORD_API};
use crate::error::{GateError, Result};

const AUDIT_REASON: &str = "OAuth verification";

/// Outbound Discord calls made during verification
///
/// Each method is a single request: no retry, no backoff.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str) -> Result<String>;

    /// Identity of the access token's owner
    async fn fetch_profile(&self, access_token: &str) -> Result<DiscordProfile>;

    /// Add the user to the guild; adding an existing member is not an error
    async fn join_guild(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        access_token: &str,
    ) -> Result<JoinOutcome>;

    async fn grant_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId) -> Result<()>;

    async fn revoke_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId)
        -> Result<()>;

    async fn post_message(&self, channel_id: ChannelId, message: &ChannelMessage) -> Result<()>;
}

pub struct DiscordClient {
    /// REST base, `DISCORD_API` outside tests
    api_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    bot_token: String,
    http_client: reqwest::Client,
    bot: Arc<Http>,
}

impl DiscordClient {
    pub fn new(config: &Config) -> Self {
        Self {
            api_base: DISCORD_API.to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            bot_token: config.bot_token.clone(),
            http_client: reqwest::Client::new(),
            bot: Arc::new(Http::new(&config.bot_token)),
        }
    }
}

#[async_trait]
impl DiscordApi for DiscordClient {
    async fn exchange_code(&self, code: &str) -> Result<String> {
        let response = self
            .http_client
            .post(format!("{}/oauth2/token", self.api_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        debug!("Token endpoint answered {}", status);

        let token: TokenResponse = response.json().await.map_err(|e| GateError::Auth {
            message: format!("unreadable token response ({}): {}", status, e),
        })?;
        token.into_access_token()
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<DiscordProfile> {
        let response = self
            .http_client
            .get(format!("{}/users/@me", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn join_guild(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        access_token: &str,
    ) -> Result<JoinOutcome> {
        let response = self
            .http_client
            .put(format!(
                "{}/guilds/{}/members/{}",
                self.api_base, guild_id, user_id
            ))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&serde_json::json!({ "access_token": access_token }))
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(JoinOutcome::Added),
            StatusCode::NO_CONTENT => Ok(JoinOutcome::AlreadyMember),
            // Some API versions answer 200 with the member body for an add
            status if status.is_success() => Ok(JoinOutcome::Added),
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(GateError::Discord {
                    message: format!("guild join returned {}: {}", status, text),
                })
            }
        }
    }

    async fn grant_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId) -> Result<()> {
        self.bot
            .add_member_role(guild_id, user_id, role_id, Some(AUDIT_REASON))
            .await?;
        Ok(())
    }

    async fn revoke_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<()> {
        self.bot
            .remove_member_role(guild_id, user_id, role_id, Some(AUDIT_REASON))
            .await?;
        Ok(())
    }

    async fn post_message(&self, channel_id: ChannelId, message: &ChannelMessage) -> Result<()> {
        channel_id
            .send_message(&self.bot, message.to_create_message())
            .await?;
        Ok(())
    }
}
