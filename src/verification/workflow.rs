use std::sync::Arc;

use serenity::model::id::UserId;
use tracing::{debug, error, info, warn};

use super::types::{ProvisioningReport, Stage, StepOutcome, VerificationOutcome};
use crate::config::Config;
use crate::discord::{verification_notice, verification_panel, DiscordApi};
use crate::error::{GateError, Result};
use crate::state::{SharedVerifiedStore, VerifiedUser};

/// Runs the OAuth callback: token exchange, profile lookup, guild join,
/// role swap, persistence and the log channel notice
pub struct Verifier {
    config: Arc<Config>,
    discord: Arc<dyn DiscordApi>,
    store: SharedVerifiedStore,
}

impl Verifier {
    pub fn new(config: Arc<Config>, discord: Arc<dyn DiscordApi>, store: SharedVerifiedStore) -> Self {
        Self {
            config,
            discord,
            store,
        }
    }

    /// Verify the owner of an authorization code.
    ///
    /// Only a missing code, a failed token exchange or a failed profile lookup
    /// abort the flow, plus incomplete provisioning when the config demands
    /// it. Notification failures are logged and reported, never raised.
    pub async fn verify(&self, code: Option<&str>) -> Result<VerificationOutcome> {
        enter(Stage::AwaitingCode);
        let code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(GateError::MissingCode)?;

        enter(Stage::ExchangingToken);
        let access_token = self.discord.exchange_code(code).await.map_err(|e| {
            warn!("Token exchange failed: {}", e);
            e
        })?;

        enter(Stage::FetchingProfile);
        let profile = self.discord.fetch_profile(&access_token).await?;
        let user_id = profile.user_id()?;
        let display_name = profile.display_name();
        if self.store.exists(&profile.id).await {
            info!("Returning user authenticated: {} ({})", display_name, profile.id);
        } else {
            info!("User authenticated: {} ({})", display_name, profile.id);
        }

        enter(Stage::Provisioning);
        let provisioning = self.provision(user_id, &access_token).await;
        if !provisioning.is_complete() {
            warn!(
                "Provisioning incomplete for {}: join {}, add role {}, remove role {}",
                user_id, provisioning.joined, provisioning.role_added, provisioning.role_removed
            );
            if self.config.require_provisioning {
                return Err(GateError::ProvisioningIncomplete {
                    user_id: profile.id,
                });
            }
        }

        enter(Stage::Persisting);
        let candidate = VerifiedUser::new(&profile.id, &display_name);
        let newly_recorded = self.store.insert_if_absent(candidate.clone()).await?;
        let user = if newly_recorded {
            info!("Recorded new verified user {} ({})", display_name, profile.id);
            candidate
        } else {
            debug!("User {} already recorded, keeping existing record", profile.id);
            self.store.get(&profile.id).await.unwrap_or(candidate)
        };

        enter(Stage::Notifying);
        let notified = self.notify(&display_name).await;

        enter(Stage::Completed);
        Ok(VerificationOutcome {
            user,
            newly_recorded,
            provisioning,
            notified,
        })
    }

    /// Join the guild, add `ROLE_ADD`, remove `ROLE_REMOVE`. Every step is
    /// attempted whatever the previous one returned.
    async fn provision(&self, user_id: UserId, access_token: &str) -> ProvisioningReport {
        let guild_id = self.config.guild_id;

        let joined = match self
            .discord
            .join_guild(guild_id, user_id, access_token)
            .await
        {
            Ok(outcome) => StepOutcome::from(outcome),
            Err(e) => failed("guild join", user_id, e),
        };

        let role_added = match self
            .discord
            .grant_role(guild_id, user_id, self.config.role_add)
            .await
        {
            Ok(()) => StepOutcome::Done,
            Err(e) => failed("role grant", user_id, e),
        };

        let role_removed = match self
            .discord
            .revoke_role(guild_id, user_id, self.config.role_remove)
            .await
        {
            Ok(()) => StepOutcome::Done,
            Err(e) => failed("role revoke", user_id, e),
        };

        ProvisioningReport {
            joined,
            role_added,
            role_removed,
        }
    }

    async fn notify(&self, display_name: &str) -> bool {
        let Some(channel_id) = self.config.log_channel else {
            return false;
        };

        let notice = verification_notice(display_name, self.config.notice_style);
        match self.discord.post_message(channel_id, &notice).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to post verification notice to {}: {}", channel_id, e);
                false
            }
        }
    }

    /// Post the verification panel (embed with a login button).
    ///
    /// Returns `false` when no panel channel is configured.
    pub async fn post_panel(&self) -> Result<bool> {
        let Some(channel_id) = self.config.panel_channel else {
            return Ok(false);
        };

        let panel = verification_panel(&self.config.authorize_url());
        self.discord.post_message(channel_id, &panel).await?;
        info!("Posted verification panel to channel {}", channel_id);
        Ok(true)
    }
}

fn enter(stage: Stage) {
    debug!("Verification stage: {}", stage);
}

fn failed(step: &str, user_id: UserId, err: GateError) -> StepOutcome {
    warn!("{} failed for {}: {}", step, user_id, err);
    StepOutcome::Failed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::config::NoticeStyle;
    use crate::discord::fake::{Call, FakeDiscord};
    use crate::discord::JoinOutcome;
    use crate::state::{create_shared_verified_store, VerifiedStore};
    use serenity::model::id::{ChannelId, GuildId, RoleId};

    fn verifier(config: Config, fake: Arc<FakeDiscord>) -> (Verifier, SharedVerifiedStore) {
        let store = create_shared_verified_store(VerifiedStore::in_memory());
        let verifier = Verifier::new(Arc::new(config), fake, store.clone());
        (verifier, store)
    }

    #[tokio::test]
    async fn test_fresh_user_is_recorded_once() {
        let fake = Arc::new(FakeDiscord::default());
        let (verifier, store) = verifier(test_config(), fake.clone());

        let outcome = verifier.verify(Some("abc123")).await.unwrap();

        assert!(outcome.newly_recorded);
        assert!(outcome.notified);
        assert!(outcome.provisioning.is_complete());
        assert_eq!(outcome.user.id, "42");
        assert_eq!(outcome.user.display_name, "Ann#0001");
        assert_eq!(store.list_all().await, vec![outcome.user.clone()]);

        let user = UserId::new(42);
        assert_eq!(
            fake.calls(),
            vec![
                Call::ExchangeCode("abc123".to_string()),
                Call::FetchProfile("tok1".to_string()),
                Call::JoinGuild(GuildId::new(2222), user),
                Call::GrantRole(user, RoleId::new(3333)),
                Call::RevokeRole(user, RoleId::new(4444)),
                Call::PostMessage(
                    ChannelId::new(5555),
                    verification_notice("Ann#0001", NoticeStyle::Embed)
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_reverification_keeps_record_but_repeats_provisioning() {
        let fake = Arc::new(FakeDiscord::default());
        let (verifier, store) = verifier(test_config(), fake.clone());

        let first = verifier.verify(Some("abc123")).await.unwrap();
        let second = verifier.verify(Some("def456")).await.unwrap();

        assert!(first.newly_recorded);
        assert!(!second.newly_recorded);
        assert_eq!(second.user.verified_at, first.user.verified_at);
        assert_eq!(store.count().await, 1);

        assert_eq!(fake.count(|c| matches!(c, Call::GrantRole(..))), 2);
        assert_eq!(fake.count(|c| matches!(c, Call::RevokeRole(..))), 2);
        assert_eq!(fake.count(|c| matches!(c, Call::PostMessage(..))), 2);
    }

    #[tokio::test]
    async fn test_missing_code_touches_nothing() {
        let fake = Arc::new(FakeDiscord::default());
        let (verifier, store) = verifier(test_config(), fake.clone());

        for code in [None, Some(""), Some("   ")] {
            let err = verifier.verify(code).await.unwrap_err();
            assert!(matches!(err, GateError::MissingCode));
        }
        assert!(fake.calls().is_empty());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_access_token_stops_flow() {
        let fake = Arc::new(FakeDiscord {
            token_body: "{}".to_string(),
            ..Default::default()
        });
        let (verifier, store) = verifier(test_config(), fake.clone());

        let err = verifier.verify(Some("expired")).await.unwrap_err();

        assert!(matches!(err, GateError::Auth { .. }));
        assert_eq!(fake.calls(), vec![Call::ExchangeCode("expired".to_string())]);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_provisioning_is_reported_and_still_recorded() {
        let fake = Arc::new(FakeDiscord {
            fail_roles: true,
            join: JoinOutcome::AlreadyMember,
            ..Default::default()
        });
        let (verifier, store) = verifier(test_config(), fake.clone());

        let outcome = verifier.verify(Some("abc123")).await.unwrap();

        assert_eq!(outcome.provisioning.joined, StepOutcome::AlreadyDone);
        assert!(matches!(outcome.provisioning.role_added, StepOutcome::Failed(_)));
        assert!(matches!(outcome.provisioning.role_removed, StepOutcome::Failed(_)));
        assert!(outcome.newly_recorded);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_strict_mode_refuses_incomplete_provisioning() {
        let fake = Arc::new(FakeDiscord {
            fail_join: true,
            ..Default::default()
        });
        let mut config = test_config();
        config.require_provisioning = true;
        let (verifier, store) = verifier(config, fake.clone());

        let err = verifier.verify(Some("abc123")).await.unwrap_err();

        assert!(matches!(err, GateError::ProvisioningIncomplete { ref user_id } if user_id == "42"));
        // Role steps still ran after the failed join
        assert_eq!(fake.count(|c| matches!(c, Call::GrantRole(..))), 1);
        assert_eq!(fake.count(|c| matches!(c, Call::PostMessage(..))), 0);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_no_log_channel_skips_notice() {
        let fake = Arc::new(FakeDiscord::default());
        let mut config = test_config();
        config.log_channel = None;
        let (verifier, _store) = verifier(config, fake.clone());

        let outcome = verifier.verify(Some("abc123")).await.unwrap();

        assert!(!outcome.notified);
        assert_eq!(fake.count(|c| matches!(c, Call::PostMessage(..))), 0);
    }

    #[tokio::test]
    async fn test_notice_failure_does_not_fail_flow() {
        let fake = Arc::new(FakeDiscord {
            fail_messages: true,
            ..Default::default()
        });
        let (verifier, store) = verifier(test_config(), fake.clone());

        let outcome = verifier.verify(Some("abc123")).await.unwrap();

        assert!(!outcome.notified);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_post_panel() {
        let fake = Arc::new(FakeDiscord::default());
        let config = test_config();
        let authorize_url = config.authorize_url();
        let (verifier, _store) = verifier(config, fake.clone());

        assert!(verifier.post_panel().await.unwrap());
        match &fake.calls()[..] {
            [Call::PostMessage(channel, message)] => {
                assert_eq!(*channel, ChannelId::new(5555));
                assert_eq!(message.link_button.as_ref().unwrap().url, authorize_url);
            }
            other => panic!("unexpected calls {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_post_panel_without_channel() {
        let fake = Arc::new(FakeDiscord::default());
        let mut config = test_config();
        config.panel_channel = None;
        let (verifier, _store) = verifier(config, fake.clone());

        assert!(!verifier.post_panel().await.unwrap());
        assert!(fake.calls().is_empty());
    }
}
