//! Serenity gateway adapter: event dispatch, lifecycle telemetry, startup.

use std::sync::{Arc, OnceLock};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use emojicon_core::{AdmissionGate, Destination, MonotonicClock, RequesterId};
use emojicon_delivery::{
    DeliveryScheduler, TelemetryRecord, TelemetrySink, TracingTelemetry, Transport,
};
use emojicon_render::{HttpImageService, ImageService, PaletteResolver};
use serenity::all::{
    ActivityData, Client, ConnectionStage, Context, EventHandler, GatewayIntents, Guild, Message,
    RatelimitInfo, Ready, ResumedEvent, ShardStageUpdateEvent, UnavailableGuild,
};

use crate::discord_telemetry::DiscordTelemetry;
use crate::discord_transport::DiscordTransport;
use crate::notices::{
    connected_telemetry, joined_telemetry, left_telemetry, shard_error_telemetry,
    DISCONNECTED_TELEMETRY, RATE_LIMITED_TELEMETRY, RESUMED_TELEMETRY,
};
use crate::request_handler::{
    Community, InboundRequest, RequestHandler, RequestHandlerConfig, RequestHandlerServices,
    Requester,
};
use crate::runtime_config::{load_runtime_assets, DiscordRuntimeConfig, RuntimeAssets};

const ACTIVITY_TEXT: &str = "with emojis, ping me!";

/// Starts the gateway client and runs until it stops or Ctrl-C is received.
pub async fn run_discord_runtime(config: DiscordRuntimeConfig) -> Result<()> {
    let assets = load_runtime_assets(&config)?;
    let images = HttpImageService::new(config.images.clone())
        .context("failed to create image service")?;
    let token = config.token.clone();
    let gateway = Arc::new(DiscordGateway::new(config, assets, Arc::new(images)));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&token, intents)
        .event_handler_arc(Arc::clone(&gateway))
        .await
        .context("failed to build discord client")?;
    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => {
            if let Err(error) = &result {
                gateway.record(shard_error_telemetry(&error.to_string()));
            }
            result.context("discord gateway stopped")
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            shard_manager.shutdown_all().await;
            Ok(())
        }
    }
}

/// Event handler shared by every shard. The request handler needs the bot's
/// own user id, so it is built on the first `ready` event.
pub struct DiscordGateway {
    config: DiscordRuntimeConfig,
    assets: RuntimeAssets,
    gate: AdmissionGate,
    images: Arc<dyn ImageService>,
    handler: OnceLock<Arc<RequestHandler>>,
    telemetry: OnceLock<Arc<dyn TelemetrySink>>,
}

impl DiscordGateway {
    pub fn new(
        config: DiscordRuntimeConfig,
        assets: RuntimeAssets,
        images: Arc<dyn ImageService>,
    ) -> Self {
        Self {
            config,
            assets,
            gate: AdmissionGate::new(Arc::new(MonotonicClock::new())),
            images,
            handler: OnceLock::new(),
            telemetry: OnceLock::new(),
        }
    }

    fn record(&self, message: String) {
        match self.telemetry.get() {
            Some(sink) => sink.record(TelemetryRecord::new(message)),
            None => TracingTelemetry.record(TelemetryRecord::new(message)),
        }
    }

    fn build_handler(&self, ctx: &Context, bot_user_id: u64) -> Option<Arc<RequestHandler>> {
        let telemetry = self
            .telemetry
            .get_or_init(|| {
                let sink: Arc<dyn TelemetrySink> = Arc::new(DiscordTelemetry::new(
                    Arc::clone(&ctx.http),
                    self.config.log_channel_id,
                ));
                sink
            })
            .clone();
        let transport: Arc<dyn Transport> = Arc::new(DiscordTransport::new(
            Arc::clone(&ctx.http),
            Arc::clone(&ctx.cache),
            bot_user_id,
        ));
        let palette: Arc<dyn PaletteResolver> = Arc::new(self.assets.palette.clone());
        let services = RequestHandlerServices {
            gate: self.gate.clone(),
            palette,
            images: Arc::clone(&self.images),
            scheduler: DeliveryScheduler::new(Arc::clone(&transport), self.config.delivery.clone()),
            transport,
            telemetry,
        };
        let config = RequestHandlerConfig {
            bot_user_id,
            policy: self.config.policy.clone(),
            blank_glyph: self.config.blank_glyph(),
            help: self.assets.help.clone(),
        };
        match RequestHandler::new(config, services) {
            Ok(handler) => Some(Arc::new(handler)),
            Err(error) => {
                tracing::error!(%error, "failed to build request handler");
                None
            }
        }
    }
}

#[async_trait]
impl EventHandler for DiscordGateway {
    async fn ready(&self, ctx: Context, ready: Ready) {
        ctx.set_activity(Some(ActivityData::playing(ACTIVITY_TEXT)));
        if self.handler.get().is_none() {
            if let Some(handler) = self.build_handler(&ctx, ready.user.id.get()) {
                let _ = self.handler.set(handler);
            }
        }
        tracing::info!(
            bot = %ready.user.tag(),
            communities = ready.guilds.len(),
            "gateway ready"
        );
        self.record(connected_telemetry(ready.guilds.len()));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(handler) = self.handler.get() else {
            tracing::debug!("message received before ready; ignoring");
            return;
        };
        let request = inbound_request(&ctx, &msg);
        handler.handle(request).await;
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new == Some(true) {
            self.record(joined_telemetry(&guild.name, guild.member_count));
        }
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, full: Option<Guild>) {
        if incomplete.unavailable {
            tracing::warn!(community = %incomplete.id, "community became unavailable");
            return;
        }
        let (name, member_count) = match full {
            Some(guild) => (guild.name, Some(guild.member_count)),
            None => (incomplete.id.to_string(), None),
        };
        self.record(left_telemetry(&name, member_count));
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        self.record(RESUMED_TELEMETRY.to_string());
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        tracing::debug!(
            shard = ?event.shard_id,
            old = ?event.old,
            new = ?event.new,
            "shard stage changed"
        );
        if matches!(event.new, ConnectionStage::Disconnected) {
            self.record(DISCONNECTED_TELEMETRY.to_string());
        }
    }

    async fn ratelimit(&self, data: RatelimitInfo) {
        tracing::debug!(path = %data.path, timeout = ?data.timeout, "rate limited");
        self.record(RATE_LIMITED_TELEMETRY.to_string());
    }
}

fn inbound_request(ctx: &Context, msg: &Message) -> InboundRequest {
    let origin = match msg.guild_id {
        Some(_) => Destination::Channel(msg.channel_id.get()),
        None => Destination::Direct(msg.author.id.get()),
    };
    let community = msg.guild_id.map(|guild_id| Community {
        id: guild_id.get(),
        name: guild_id.name(&ctx.cache).unwrap_or_default(),
    });
    InboundRequest {
        origin,
        requester: Requester {
            id: RequesterId(msg.author.id.get()),
            tag: msg.author.tag(),
            is_bot: msg.author.bot,
        },
        community,
        content: msg.content.clone(),
        attachment_url: msg
            .attachments
            .first()
            .map(|attachment| attachment.url.clone()),
    }
}
