//! Recording stand-in for [`DiscordApi`] used by workflow and route tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};

use super::client::DiscordApi;
use super::message::ChannelMessage;
use super::types::{DiscordProfile, JoinOutcome, TokenResponse};
use crate::error::{GateError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ExchangeCode(String),
    FetchProfile(String),
    JoinGuild(GuildId, UserId),
    GrantRole(UserId, RoleId),
    RevokeRole(UserId, RoleId),
    PostMessage(ChannelId, ChannelMessage),
}

pub struct FakeDiscord {
    /// Raw token endpoint body, parsed like the real response
    pub token_body: String,
    pub profile: DiscordProfile,
    pub join: JoinOutcome,
    pub fail_join: bool,
    pub fail_roles: bool,
    pub fail_messages: bool,
    pub(crate) calls: Mutex<Vec<Call>>,
}

impl Default for FakeDiscord {
    fn default() -> Self {
        Self {
            token_body: r#"{"access_token":"tok1","token_type":"Bearer"}"#.to_string(),
            profile: DiscordProfile {
                id: "42".to_string(),
                username: "Ann".to_string(),
                discriminator: "0001".to_string(),
            },
            join: JoinOutcome::Added,
            fail_join: false,
            fail_roles: false,
            fail_messages: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeDiscord {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn failure(what: &str) -> GateError {
        GateError::Discord {
            message: format!("{} failed: 403 Missing Permissions", what),
        }
    }
}

#[async_trait]
impl DiscordApi for FakeDiscord {
    async fn exchange_code(&self, code: &str) -> Result<String> {
        self.record(Call::ExchangeCode(code.to_string()));
        let token: TokenResponse = serde_json::from_str(&self.token_body)?;
        token.into_access_token()
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<DiscordProfile> {
        self.record(Call::FetchProfile(access_token.to_string()));
        Ok(self.profile.clone())
    }

    async fn join_guild(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        _access_token: &str,
    ) -> Result<JoinOutcome> {
        self.record(Call::JoinGuild(guild_id, user_id));
        if self.fail_join {
            return Err(Self::failure("guild join"));
        }
        Ok(self.join)
    }

    async fn grant_role(&self, _guild_id: GuildId, user_id: UserId, role_id: RoleId) -> Result<()> {
        self.record(Call::GrantRole(user_id, role_id));
        if self.fail_roles {
            return Err(Self::failure("role grant"));
        }
        Ok(())
    }

    async fn revoke_role(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<()> {
        self.record(Call::RevokeRole(user_id, role_id));
        if self.fail_roles {
            return Err(Self::failure("role revoke"));
        }
        Ok(())
    }

    async fn post_message(&self, channel_id: ChannelId, message: &ChannelMessage) -> Result<()> {
        self.record(Call::PostMessage(channel_id, message.clone()));
        if self.fail_messages {
            return Err(Self::failure("message post"));
        }
        Ok(())
    }
}
