//! Discord implementation of the outbound [`Transport`] boundary.

use std::sync::Arc;

use async_trait::async_trait;
use emojicon_core::Destination;
use emojicon_delivery::{
    split_into_batches, DestinationCapabilities, EmbedPayload, OutboundMessage, SplitMode,
    Transport, TransportError, TransportErrorKind,
};
use serenity::all::{
    Cache, ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, Http, HttpError, UserId,
};

/// Discord JSON error code for "Cannot send messages to this user".
const CANNOT_MESSAGE_USER_CODE: isize = 50007;
const TOO_MANY_REQUESTS_STATUS: u16 = 429;

#[derive(Clone)]
pub struct DiscordTransport {
    http: Arc<Http>,
    cache: Arc<Cache>,
    bot_user_id: UserId,
}

impl DiscordTransport {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, bot_user_id: u64) -> Self {
        Self {
            http,
            cache,
            bot_user_id: UserId::new(bot_user_id),
        }
    }

    /// Cache-first lookups fall back to HTTP only on a miss.
    fn cache_http(&self) -> (&Arc<Cache>, &Http) {
        (&self.cache, self.http.as_ref())
    }

    async fn resolve_channel(&self, destination: Destination) -> Result<ChannelId, TransportError> {
        match destination {
            Destination::Channel(id) => Ok(ChannelId::new(id)),
            Destination::Direct(user_id) => {
                let channel = UserId::new(user_id)
                    .create_dm_channel(self.http.as_ref())
                    .await
                    .map_err(map_serenity_error)?;
                Ok(channel.id)
            }
        }
    }

    async fn post(&self, channel: ChannelId, builder: CreateMessage) -> Result<(), TransportError> {
        channel
            .send_message(self.http.as_ref(), builder)
            .await
            .map(|_| ())
            .map_err(map_serenity_error)
    }
}

#[async_trait]
impl Transport for DiscordTransport {
    #[tracing::instrument(level = "debug", skip(self, message), fields(%destination))]
    async fn send(
        &self,
        destination: Destination,
        message: OutboundMessage,
        split: SplitMode,
    ) -> Result<(), TransportError> {
        let channel = self.resolve_channel(destination).await?;
        match message {
            OutboundMessage::Embed(embed) => {
                self.post(channel, CreateMessage::new().embed(build_embed(&embed)))
                    .await
            }
            OutboundMessage::Text(text) => match split {
                SplitMode::Single => self.post(channel, CreateMessage::new().content(text)).await,
                SplitMode::OnLines { max_chars } => {
                    for chunk in split_into_batches(&text, max_chars) {
                        self.post(channel, CreateMessage::new().content(chunk))
                            .await?;
                    }
                    Ok(())
                }
            },
        }
    }

    async fn capabilities(
        &self,
        destination: Destination,
    ) -> Result<DestinationCapabilities, TransportError> {
        let Destination::Channel(id) = destination else {
            return Ok(DestinationCapabilities::UNRESTRICTED);
        };
        let channel = ChannelId::new(id)
            .to_channel(self.cache_http())
            .await
            .map_err(map_serenity_error)?;
        let Some(guild_channel) = channel.guild() else {
            return Ok(DestinationCapabilities::UNRESTRICTED);
        };
        let permissions = guild_channel
            .permissions_for_user(&self.cache, self.bot_user_id)
            .map_err(map_serenity_error)?;
        Ok(DestinationCapabilities {
            can_send: permissions.send_messages(),
            can_use_external_glyphs: permissions.use_external_emojis(),
        })
    }
}

pub(crate) fn build_embed(payload: &EmbedPayload) -> CreateEmbed {
    let mut embed = CreateEmbed::new();
    if let Some(title) = &payload.title {
        embed = embed.title(title);
    }
    if let Some(description) = &payload.description {
        embed = embed.description(description);
    }
    if let Some(color) = payload.color {
        embed = embed.colour(color);
    }
    for field in &payload.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &payload.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    embed
}

fn map_serenity_error(error: serenity::Error) -> TransportError {
    let kind = match &error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            classify_rejection(response.status_code.as_u16(), response.error.code)
        }
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, error.to_string())
}

pub(crate) fn classify_rejection(status: u16, code: isize) -> TransportErrorKind {
    if code == CANNOT_MESSAGE_USER_CODE {
        TransportErrorKind::PermissionDenied
    } else if status == TOO_MANY_REQUESTS_STATUS {
        TransportErrorKind::RateLimited
    } else {
        TransportErrorKind::Other
    }
}
