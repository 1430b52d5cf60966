//! Process configuration loaded from the environment
//!
//! Everything the service needs is read once at startup into a [`Config`]
//! value which is then handed to the Discord client, the verifier and the web
//! server. Missing or malformed values fail fast with an error naming the key.

use std::path::PathBuf;

use base64::Engine;
use serenity::model::id::{ChannelId, GuildId, RoleId};

use crate::error::{GateError, Result};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATABASE_PATH: &str = "data/verified_users.json";

/// Base of every Discord REST endpoint the service talks to
pub const DISCORD_API: &str = "https://discord.com/api";

/// Scopes requested on login: identity lookup and joining the guild
pub const OAUTH_SCOPES: &[&str] = &["identify", "guilds.join"];

/// How the log channel notice is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeStyle {
    Embed,
    Text,
}

/// Certificate and key for serving HTTPS directly
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub bot_token: String,
    pub guild_id: GuildId,
    pub redirect_uri: String,
    pub log_channel: Option<ChannelId>,
    pub role_add: RoleId,
    pub role_remove: RoleId,

    pub port: u16,
    pub database_path: PathBuf,
    /// Credential for the admin area. `None` disables it entirely.
    pub admin_token: Option<String>,
    /// Extra `permissions` value for the authorize URL
    pub login_permissions: Option<String>,
    /// Refuse to record users whose provisioning did not fully succeed
    pub require_provisioning: bool,
    pub notice_style: NoticeStyle,
    pub panel_channel: Option<ChannelId>,
    pub post_panel: bool,
    pub tls: Option<TlsPaths>,
}

// Secrets stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("bot_token", &"<redacted>")
            .field("guild_id", &self.guild_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("log_channel", &self.log_channel)
            .field("role_add", &self.role_add)
            .field("role_remove", &self.role_remove)
            .field("port", &self.port)
            .field("database_path", &self.database_path)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("login_permissions", &self.login_permissions)
            .field("require_provisioning", &self.require_provisioning)
            .field("notice_style", &self.notice_style)
            .field("panel_channel", &self.panel_channel)
            .field("post_panel", &self.post_panel)
            .field("tls", &self.tls)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(GateError::MissingEnv { key });

        let client_id = required("CLIENT_ID")?;
        let client_secret = required("CLIENT_SECRET")?;
        let bot_token = required("BOT_TOKEN")?;
        let guild_id = GuildId::new(snowflake("GUILD_ID", &required("GUILD_ID")?)?);
        let redirect_uri = required("REDIRECT_URI")?;
        let role_add = RoleId::new(snowflake("ROLE_ADD", &required("ROLE_ADD")?)?);
        let role_remove = RoleId::new(snowflake("ROLE_REMOVE", &required("ROLE_REMOVE")?)?);

        let log_channel = match get("LOG_CHANNEL") {
            Some(v) => Some(ChannelId::new(snowflake("LOG_CHANNEL", &v)?)),
            None => None,
        };
        let panel_channel = match get("PANEL_CHANNEL") {
            Some(v) => Some(ChannelId::new(snowflake("PANEL_CHANNEL", &v)?)),
            None => log_channel,
        };

        let port = match get("PORT") {
            Some(v) => v.parse::<u16>().map_err(|e| GateError::InvalidEnv {
                key: "PORT",
                message: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let notice_style = match get("LOG_STYLE").as_deref() {
            None | Some("embed") => NoticeStyle::Embed,
            Some("text") => NoticeStyle::Text,
            Some(other) => {
                return Err(GateError::InvalidEnv {
                    key: "LOG_STYLE",
                    message: format!("expected 'embed' or 'text', got '{}'", other),
                })
            }
        };

        let tls = match (get("TLS_CERT_PATH"), get("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(GateError::MissingEnv { key: "TLS_KEY_PATH" }),
            (None, Some(_)) => return Err(GateError::MissingEnv { key: "TLS_CERT_PATH" }),
        };

        Ok(Self {
            client_id,
            client_secret,
            bot_token,
            guild_id,
            redirect_uri,
            log_channel,
            role_add,
            role_remove,
            port,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            admin_token: get("ADMIN_TOKEN"),
            login_permissions: get("LOGIN_PERMISSIONS"),
            require_provisioning: flag("REQUIRE_PROVISIONING", get("REQUIRE_PROVISIONING"))?,
            notice_style,
            panel_channel,
            post_panel: flag("POST_PANEL", get("POST_PANEL"))?,
            tls,
        })
    }

    /// Discord authorize URL the login route redirects to
    pub fn authorize_url(&self) -> String {
        let mut url = format!(
            "{}/oauth2/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}",
            DISCORD_API,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            OAUTH_SCOPES.join("%20"),
        );
        if let Some(permissions) = &self.login_permissions {
            url.push_str("&permissions=");
            url.push_str(&urlencoding::encode(permissions));
        }
        url
    }

    /// Application ID encoded in the first segment of the bot token
    pub fn bot_id_hint(&self) -> Option<String> {
        let segment = self.bot_token.split('.').next()?;
        let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(segment)
            .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(segment))
            .ok()?;
        String::from_utf8(decoded)
            .ok()
            .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
    }
}

fn snowflake(key: &'static str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(0) => Err(GateError::InvalidEnv {
            key,
            message: "snowflake must not be zero".to_string(),
        }),
        Ok(id) => Ok(id),
        Err(e) => Err(GateError::InvalidEnv {
            key,
            message: format!("'{}' is not a Discord ID: {}", value, e),
        }),
    }
}

fn flag(key: &'static str, value: Option<String>) -> Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(GateError::InvalidEnv {
            key,
            message: format!("'{}' is not a boolean", other),
        }),
    }
}
