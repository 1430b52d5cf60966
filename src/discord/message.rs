//! Channel messages posted by the bot: the verification notice and the panel

use serenity::builder::{
    CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, CreateMessage,
};
use serenity::model::Colour;

use crate::config::NoticeStyle;

/// Discord's "green" embed colour
pub const NOTICE_COLOR: u32 = 5763719;
/// Discord blurple
pub const PANEL_COLOR: u32 = 0x5865F2;

const FOOTER: &str = "guildgate";

#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

/// A message body: plain text, an embed, or both, plus an optional link button
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMessage {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub link_button: Option<LinkButton>,
}

impl ChannelMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    pub fn with_link_button(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.link_button = Some(LinkButton {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    /// Build the serenity request body
    pub fn to_create_message(&self) -> CreateMessage {
        let mut builder = CreateMessage::new();

        if let Some(content) = &self.content {
            builder = builder.content(content);
        }

        if let Some(embed) = &self.embed {
            let mut create_embed = CreateEmbed::new()
                .title(&embed.title)
                .description(&embed.description)
                .colour(Colour::new(embed.color));
            if let Some(footer) = &embed.footer {
                create_embed = create_embed.footer(CreateEmbedFooter::new(footer));
            }
            builder = builder.embed(create_embed);
        }

        if let Some(button) = &self.link_button {
            builder = builder.components(vec![CreateActionRow::Buttons(vec![
                CreateButton::new_link(&button.url).label(&button.label),
            ])]);
        }

        builder
    }
}

/// Log channel notice naming a freshly verified user
pub fn verification_notice(display_name: &str, style: NoticeStyle) -> ChannelMessage {
    match style {
        NoticeStyle::Text => ChannelMessage::text(format!("✅ {} verified successfully", display_name)),
        NoticeStyle::Embed => ChannelMessage::embed(Embed {
            title: "✅ New verification".to_string(),
            description: format!("{} has verified successfully", display_name),
            color: NOTICE_COLOR,
            footer: Some(FOOTER.to_string()),
        }),
    }
}

/// Panel inviting members to verify, linking straight to the authorize URL
pub fn verification_panel(authorize_url: &str) -> ChannelMessage {
    ChannelMessage::embed(Embed {
        title: "Verification".to_string(),
        description: "Click the button below to verify with Discord and unlock the server."
            .to_string(),
        color: PANEL_COLOR,
        footer: Some(FOOTER.to_string()),
    })
    .with_link_button("Verify", authorize_url)
}
